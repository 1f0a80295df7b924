//! Anthropic-on-Bedrock codec
//!
//! The body is the shared Messages shape with the Bedrock envelope. Two
//! Bedrock-specific layers sit around it: public model ids are remapped to
//! Bedrock's namespaced ids, and streamed frames arrive wrapped as
//! `{"bytes": "<base64>"}` envelopes that decode to ordinary Messages events.
//! Runtime errors use the AWS `{"message": ..., "__type": ...}` shape.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;

use crate::classify::{
    BEDROCK_ERROR_TAGS, ProviderErrorPayload, classify_provider_error, fallback_http_error,
};
use crate::codec::anthropic::{
    AnthropicEnvelope, decode_messages_event, decode_messages_response, encode_messages_request,
};
use crate::codec::{ChatCodec, StreamFrame};
use crate::error::LlmError;
use crate::types::{ChatRequest, ChatResponse};

/// Map a public Anthropic model id to its Bedrock id. Ids without a known
/// mapping pass through unchanged, so already-namespaced ids keep working.
pub fn remap_model(model: &str) -> &str {
    match model {
        "claude-2.0" => "anthropic.claude-v2",
        "claude-2.1" => "anthropic.claude-v2:1",
        "claude-3-sonnet-20240229" => "anthropic.claude-3-sonnet-20240229-v1:0",
        "claude-3-5-sonnet-20240620" => "anthropic.claude-3-5-sonnet-20240620-v1:0",
        "claude-3-5-sonnet-20241022" => "anthropic.claude-3-5-sonnet-20241022-v2:0",
        "claude-3-haiku-20240307" => "anthropic.claude-3-haiku-20240307-v1:0",
        "claude-3-5-haiku-20241022" => "anthropic.claude-3-5-haiku-20241022-v1:0",
        "claude-3-opus-20240229" => "anthropic.claude-3-opus-20240229-v1:0",
        "claude-instant-1.2" => "anthropic.claude-instant-v1",
        other => other,
    }
}

pub struct BedrockAnthropicCodec;

impl ChatCodec for BedrockAnthropicCodec {
    fn provider_id(&self) -> &'static str {
        "anthropic-bedrock"
    }

    fn encode_chat(&self, request: &ChatRequest) -> Result<Value, LlmError> {
        encode_messages_request(request, AnthropicEnvelope::Bedrock)
    }

    fn decode_chat(&self, body: &[u8]) -> Result<ChatResponse, LlmError> {
        decode_messages_response(body)
    }

    fn decode_chunk(&self, frame: &str) -> Result<StreamFrame, LlmError> {
        let value: Value = serde_json::from_str(frame)
            .map_err(|e| LlmError::DecodeError(format!("invalid stream frame: {e}")))?;
        match value.get("bytes").and_then(Value::as_str) {
            Some(encoded) => {
                let raw = BASE64.decode(encoded).map_err(|e| {
                    LlmError::DecodeError(format!("stream frame has invalid base64: {e}"))
                })?;
                let event = String::from_utf8(raw).map_err(|e| {
                    LlmError::DecodeError(format!("stream frame is not UTF-8: {e}"))
                })?;
                decode_messages_event(&event)
            }
            // Some gateways unwrap the event envelope before delivery.
            None => decode_messages_event(frame),
        }
    }

    fn classify_http_error(&self, status: u16, body: &str) -> LlmError {
        let Ok(value) = serde_json::from_str::<Value>(body) else {
            return fallback_http_error(status, body);
        };
        let Some(message) = value.get("message").and_then(Value::as_str) else {
            return fallback_http_error(status, body);
        };
        // "__type" may be namespaced, e.g. "com.amazon...#ThrottlingException".
        let error_type = value
            .get("__type")
            .and_then(Value::as_str)
            .map(|t| t.rsplit('#').next().unwrap_or(t))
            .unwrap_or("unknown");
        classify_provider_error(
            &BEDROCK_ERROR_TAGS,
            status,
            ProviderErrorPayload {
                error_type: error_type.to_string(),
                message: message.to_string(),
            },
        )
    }
}
