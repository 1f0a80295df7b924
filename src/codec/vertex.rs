//! Anthropic-on-Vertex codec
//!
//! Same Messages API body and event grammar as the direct surface; only the
//! envelope differs (no `model` field, `anthropic_version` pin).

use serde_json::Value;

use crate::codec::anthropic::{
    AnthropicEnvelope, classify_messages_http_error, decode_messages_event,
    decode_messages_response, encode_messages_request,
};
use crate::codec::{ChatCodec, StreamFrame};
use crate::error::LlmError;
use crate::types::{ChatRequest, ChatResponse};

pub struct VertexAnthropicCodec;

impl ChatCodec for VertexAnthropicCodec {
    fn provider_id(&self) -> &'static str {
        "anthropic-vertex"
    }

    fn encode_chat(&self, request: &ChatRequest) -> Result<Value, LlmError> {
        encode_messages_request(request, AnthropicEnvelope::Vertex)
    }

    fn decode_chat(&self, body: &[u8]) -> Result<ChatResponse, LlmError> {
        decode_messages_response(body)
    }

    fn decode_chunk(&self, frame: &str) -> Result<StreamFrame, LlmError> {
        decode_messages_event(frame)
    }

    fn classify_http_error(&self, status: u16, body: &str) -> LlmError {
        classify_messages_http_error(status, body)
    }
}
