//! Anthropic Messages API codec
//!
//! One translation core shared by the three Anthropic deployment surfaces.
//! The body shape is identical everywhere; what differs is the envelope:
//! direct carries `model` and `stream`, Vertex and Bedrock identify the model
//! in the URL and carry an `anthropic_version` pin instead, and Bedrock
//! additionally signals streaming by endpoint rather than by body field.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::classify::{ANTHROPIC_ERROR_TAGS, ProviderErrorPayload, classify_provider_error, fallback_http_error};
use crate::codec::{ChatCodec, ChunkDelta, StreamFrame};
use crate::error::LlmError;
use crate::types::{
    ChatChoice, ChatMessage, ChatRequest, ChatResponse, FinishReason, MessageRole, PhaseTiming,
    ToolCall, Usage,
};

const DEFAULT_MAX_TOKENS: u32 = 4096;
const VERTEX_ANTHROPIC_VERSION: &str = "vertex-2023-10-16";
const BEDROCK_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

/// Which deployment surface the encoded body targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AnthropicEnvelope {
    Direct,
    Vertex,
    Bedrock,
}

/// Codec for the Anthropic API served directly at api.anthropic.com.
pub struct AnthropicCodec;

impl ChatCodec for AnthropicCodec {
    fn provider_id(&self) -> &'static str {
        "anthropic"
    }

    fn encode_chat(&self, request: &ChatRequest) -> Result<Value, LlmError> {
        encode_messages_request(request, AnthropicEnvelope::Direct)
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

pub(crate) fn encode_messages_request(
    request: &ChatRequest,
    envelope: AnthropicEnvelope,
) -> Result<Value, LlmError> {
    if request.messages.is_empty() {
        return Err(LlmError::ConfigurationError(
            "request has no messages".to_string(),
        ));
    }
    if envelope == AnthropicEnvelope::Direct && request.model.is_empty() {
        return Err(LlmError::ConfigurationError(
            "request has no model".to_string(),
        ));
    }
    if let Some(t) = request.sampling.temperature
        && !(0.0..=1.0).contains(&t)
    {
        return Err(LlmError::ConfigurationError(format!(
            "temperature {t} out of range [0, 1]"
        )));
    }
    if let Some(p) = request.sampling.top_p
        && !(0.0..=1.0).contains(&p)
    {
        return Err(LlmError::ConfigurationError(format!(
            "top_p {p} out of range [0, 1]"
        )));
    }

    let mut system_parts: Vec<&str> = Vec::new();
    let mut messages: Vec<Value> = Vec::new();
    for message in &request.messages {
        match message.role {
            MessageRole::System => system_parts.push(&message.content),
            MessageRole::Tool => messages.push(encode_tool_result(message)?),
            MessageRole::User | MessageRole::Assistant => {
                messages.push(encode_content_message(message)?)
            }
        }
    }
    if messages.is_empty() {
        return Err(LlmError::ConfigurationError(
            "request has no user or assistant messages".to_string(),
        ));
    }

    let mut body = json!({
        "messages": messages,
        "max_tokens": request.sampling.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
    });
    let obj = body
        .as_object_mut()
        .ok_or_else(|| LlmError::DecodeError("encoded body is not an object".to_string()))?;
    if !system_parts.is_empty() {
        obj.insert("system".to_string(), json!(system_parts.join("\n\n")));
    }
    if let Some(t) = request.sampling.temperature {
        obj.insert("temperature".to_string(), json!(t));
    }
    if let Some(p) = request.sampling.top_p {
        obj.insert("top_p".to_string(), json!(p));
    }
    if let Some(stop) = &request.sampling.stop
        && !stop.is_empty()
    {
        obj.insert("stop_sequences".to_string(), json!(stop));
    }

    match envelope {
        AnthropicEnvelope::Direct => {
            obj.insert("model".to_string(), json!(request.model));
            if request.stream {
                obj.insert("stream".to_string(), json!(true));
            }
        }
        AnthropicEnvelope::Vertex => {
            obj.insert(
                "anthropic_version".to_string(),
                json!(VERTEX_ANTHROPIC_VERSION),
            );
            if request.stream {
                obj.insert("stream".to_string(), json!(true));
            }
        }
        // Bedrock selects streaming by endpoint; neither `model` nor `stream`
        // may appear in the body.
        AnthropicEnvelope::Bedrock => {
            obj.insert(
                "anthropic_version".to_string(),
                json!(BEDROCK_ANTHROPIC_VERSION),
            );
        }
    }

    Ok(body)
}

fn encode_content_message(message: &ChatMessage) -> Result<Value, LlmError> {
    let mut blocks: Vec<Value> = Vec::new();
    if !message.content.is_empty() {
        blocks.push(json!({ "type": "text", "text": message.content }));
    }
    if let Some(tool_calls) = &message.tool_calls {
        for call in tool_calls {
            blocks.push(encode_tool_use(call)?);
        }
    }
    if blocks.is_empty() {
        return Err(LlmError::ConfigurationError(
            "message has no content".to_string(),
        ));
    }
    let role = match message.role {
        MessageRole::Assistant => "assistant",
        _ => "user",
    };
    Ok(json!({ "role": role, "content": blocks }))
}

fn encode_tool_use(call: &ToolCall) -> Result<Value, LlmError> {
    let input: Value = if call.function.arguments.is_empty() {
        json!({})
    } else {
        serde_json::from_str(&call.function.arguments).map_err(|e| {
            LlmError::ConfigurationError(format!(
                "tool call '{}' has non-JSON arguments: {e}",
                call.function.name
            ))
        })?
    };
    Ok(json!({
        "type": "tool_use",
        "id": call.id,
        "name": call.function.name,
        "input": input,
    }))
}

fn encode_tool_result(message: &ChatMessage) -> Result<Value, LlmError> {
    let tool_use_id = message.tool_call_id.as_deref().ok_or_else(|| {
        LlmError::ConfigurationError("tool message is missing tool_call_id".to_string())
    })?;
    Ok(json!({
        "role": "user",
        "content": [{
            "type": "tool_result",
            "tool_use_id": tool_use_id,
            "content": message.content,
        }],
    }))
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "thinking")]
    Thinking { thinking: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl WireUsage {
    fn into_usage(self) -> Usage {
        Usage {
            prompt_tokens: self.input_tokens,
            completion_tokens: self.output_tokens,
            total_tokens: self.input_tokens + self.output_tokens,
        }
    }
}

pub(crate) fn decode_messages_response(body: &[u8]) -> Result<ChatResponse, LlmError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| LlmError::DecodeError(format!("invalid response body: {e}")))?;
    // Deployment proxies sometimes report errors with a 200 status.
    if value.get("type").and_then(Value::as_str) == Some("error") {
        return Err(classify_error_value(&value, 200));
    }

    let response: MessagesResponse = serde_json::from_value(value)
        .map_err(|e| LlmError::DecodeError(format!("unexpected response shape: {e}")))?;

    let mut content = String::new();
    let mut reasoning = String::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();
    for block in response.content {
        match block {
            ContentBlock::Text { text } => content.push_str(&text),
            ContentBlock::Thinking { thinking } => reasoning.push_str(&thinking),
            ContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(ToolCall::function_call(id, name, input.to_string()));
            }
            ContentBlock::Unknown => {}
        }
    }

    let message = ChatMessage {
        role: MessageRole::Assistant,
        content,
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        tool_call_id: None,
        reasoning: (!reasoning.is_empty()).then_some(reasoning),
    };
    Ok(ChatResponse {
        model: response.model,
        choices: vec![ChatChoice {
            index: 0,
            message,
            finish_reason: response.stop_reason.as_deref().map(map_stop_reason),
        }],
        usage: response.usage.map(WireUsage::into_usage),
        timing: PhaseTiming::default(),
    })
}

fn map_stop_reason(reason: &str) -> FinishReason {
    match reason {
        "max_tokens" => FinishReason::Length,
        "tool_use" => FinishReason::ToolCalls,
        "refusal" => FinishReason::ContentFilter,
        // end_turn, stop_sequence, and anything future
        _ => FinishReason::Stop,
    }
}

#[derive(Deserialize)]
struct MessageStart {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum BlockDelta {
    #[serde(rename = "text_delta")]
    Text { text: String },
    #[serde(rename = "thinking_delta")]
    Thinking { thinking: String },
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize)]
struct MessageDeltaBody {
    #[serde(default)]
    stop_reason: Option<String>,
}

pub(crate) fn decode_messages_event(frame: &str) -> Result<StreamFrame, LlmError> {
    let value: Value = serde_json::from_str(frame)
        .map_err(|e| LlmError::DecodeError(format!("invalid stream frame: {e}")))?;
    let event_type = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| LlmError::DecodeError("stream frame has no event type".to_string()))?;

    match event_type {
        "message_start" => {
            let message: MessageStart = field(&value, "message")?;
            Ok(frame_from(ChunkDelta {
                model: message.model,
                usage: message.usage.map(WireUsage::into_usage),
                ..Default::default()
            }))
        }
        "content_block_delta" => {
            let delta: BlockDelta = field(&value, "delta")?;
            let chunk = match delta {
                BlockDelta::Text { text } => ChunkDelta {
                    content: Some(text),
                    ..Default::default()
                },
                BlockDelta::Thinking { thinking } => ChunkDelta {
                    reasoning: Some(thinking),
                    ..Default::default()
                },
                BlockDelta::Unknown => ChunkDelta::default(),
            };
            Ok(frame_from(chunk))
        }
        "message_delta" => {
            let delta: MessageDeltaBody = field(&value, "delta")?;
            let usage: Option<WireUsage> = match value.get("usage") {
                Some(u) => serde_json::from_value(u.clone())
                    .map_err(|e| LlmError::DecodeError(format!("bad usage in message_delta: {e}")))?,
                None => None,
            };
            Ok(frame_from(ChunkDelta {
                usage: usage.map(WireUsage::into_usage),
                finish_reason: delta.stop_reason.as_deref().map(map_stop_reason),
                ..Default::default()
            }))
        }
        "message_stop" => Ok(StreamFrame::Done),
        "error" => Err(classify_error_value(&value, 200)),
        "ping" | "content_block_start" | "content_block_stop" => Ok(StreamFrame::Ignore),
        other => {
            tracing::debug!(event_type = other, "ignoring unrecognized stream event");
            Ok(StreamFrame::Ignore)
        }
    }
}

fn field<T: for<'de> Deserialize<'de>>(value: &Value, name: &str) -> Result<T, LlmError> {
    let inner = value
        .get(name)
        .ok_or_else(|| LlmError::DecodeError(format!("stream frame is missing '{name}'")))?;
    serde_json::from_value(inner.clone())
        .map_err(|e| LlmError::DecodeError(format!("bad '{name}' in stream frame: {e}")))
}

fn frame_from(delta: ChunkDelta) -> StreamFrame {
    if delta.is_empty() {
        StreamFrame::Ignore
    } else {
        StreamFrame::Delta(delta)
    }
}

pub(crate) fn classify_messages_http_error(status: u16, body: &str) -> LlmError {
    match serde_json::from_str::<Value>(body) {
        Ok(value) if value.get("error").is_some() => classify_error_value(&value, status),
        _ => fallback_http_error(status, body),
    }
}

fn classify_error_value(value: &Value, status: u16) -> LlmError {
    let error = &value["error"];
    let Some(error_type) = error.get("type").and_then(Value::as_str) else {
        return fallback_http_error(status, &value.to_string());
    };
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default();
    classify_provider_error(
        &ANTHROPIC_ERROR_TAGS,
        status,
        ProviderErrorPayload {
            error_type: error_type.to_string(),
            message: message.to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiErrorKind;
    use crate::types::SamplingParams;

    fn request() -> ChatRequest {
        ChatRequest::new(
            "claude-3-5-sonnet-20241022",
            vec![
                ChatMessage::system("be brief"),
                ChatMessage::user("hello"),
            ],
        )
    }

    #[test]
    fn encode_extracts_system_and_defaults_max_tokens() {
        let body = encode_messages_request(&request(), AnthropicEnvelope::Direct).unwrap();
        assert_eq!(body["model"], "claude-3-5-sonnet-20241022");
        assert_eq!(body["system"], "be brief");
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"][0]["text"], "hello");
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn encode_envelope_differences() {
        let mut req = request();
        req.stream = true;

        let direct = encode_messages_request(&req, AnthropicEnvelope::Direct).unwrap();
        assert_eq!(direct["stream"], true);
        assert!(direct.get("anthropic_version").is_none());

        let vertex = encode_messages_request(&req, AnthropicEnvelope::Vertex).unwrap();
        assert!(vertex.get("model").is_none());
        assert_eq!(vertex["anthropic_version"], "vertex-2023-10-16");
        assert_eq!(vertex["stream"], true);

        let bedrock = encode_messages_request(&req, AnthropicEnvelope::Bedrock).unwrap();
        assert!(bedrock.get("model").is_none());
        assert!(bedrock.get("stream").is_none());
        assert_eq!(bedrock["anthropic_version"], "bedrock-2023-05-31");
    }

    #[test]
    fn encode_maps_tool_traffic() {
        let mut assistant = ChatMessage::assistant("");
        assistant.tool_calls = Some(vec![ToolCall::function_call(
            "toolu_1",
            "get_weather",
            r#"{"city":"Oslo"}"#,
        )]);
        let mut tool = ChatMessage {
            role: MessageRole::Tool,
            content: "12 degrees".to_string(),
            tool_calls: None,
            tool_call_id: Some("toolu_1".to_string()),
            reasoning: None,
        };
        let req = ChatRequest::new(
            "claude-3-5-sonnet-20241022",
            vec![ChatMessage::user("weather?"), assistant, tool.clone()],
        );
        let body = encode_messages_request(&req, AnthropicEnvelope::Direct).unwrap();
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages[1]["content"][0]["type"], "tool_use");
        assert_eq!(messages[1]["content"][0]["input"]["city"], "Oslo");
        assert_eq!(messages[2]["role"], "user");
        assert_eq!(messages[2]["content"][0]["type"], "tool_result");
        assert_eq!(messages[2]["content"][0]["tool_use_id"], "toolu_1");

        tool.tool_call_id = None;
        let req = ChatRequest::new("m", vec![tool]);
        assert!(matches!(
            encode_messages_request(&req, AnthropicEnvelope::Direct),
            Err(LlmError::ConfigurationError(_))
        ));
    }

    #[test]
    fn encode_rejects_out_of_range_sampling() {
        let req = request().with_sampling(SamplingParams {
            temperature: Some(1.5),
            ..Default::default()
        });
        assert!(matches!(
            encode_messages_request(&req, AnthropicEnvelope::Direct),
            Err(LlmError::ConfigurationError(_))
        ));
    }

    #[test]
    fn decode_response_happy_path() {
        let body = r#"{
            "id": "msg_1",
            "type": "message",
            "model": "claude-3-5-sonnet-20241022",
            "content": [
                {"type": "thinking", "thinking": "let me see"},
                {"type": "text", "text": "Hello"},
                {"type": "text", "text": " there"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }"#;
        let response = decode_messages_response(body.as_bytes()).unwrap();
        assert_eq!(response.content_text(), Some("Hello there"));
        assert_eq!(
            response.choices[0].message.reasoning.as_deref(),
            Some("let me see")
        );
        assert_eq!(response.choices[0].finish_reason, Some(FinishReason::Stop));
        let usage = response.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 10);
        assert_eq!(usage.total_tokens, 15);
    }

    #[test]
    fn decode_response_with_tool_use() {
        let body = r#"{
            "content": [{"type": "tool_use", "id": "toolu_1", "name": "f", "input": {"a": 1}}],
            "stop_reason": "tool_use"
        }"#;
        let response = decode_messages_response(body.as_bytes()).unwrap();
        let calls = response.choices[0].message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "f");
        assert_eq!(calls[0].function.arguments, r#"{"a":1}"#);
        assert_eq!(
            response.choices[0].finish_reason,
            Some(FinishReason::ToolCalls)
        );
    }

    #[test]
    fn decode_response_surfaces_embedded_error() {
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"busy"}}"#;
        let err = decode_messages_response(body.as_bytes()).unwrap_err();
        assert_eq!(err.api_kind(), Some(ApiErrorKind::Overloaded));
    }

    #[test]
    fn decode_event_sequence() {
        let start = r#"{"type":"message_start","message":{"model":"claude-3-5-haiku-20241022","usage":{"input_tokens":7,"output_tokens":1}}}"#;
        match decode_messages_event(start).unwrap() {
            StreamFrame::Delta(d) => {
                assert_eq!(d.model.as_deref(), Some("claude-3-5-haiku-20241022"));
                assert_eq!(d.usage.unwrap().prompt_tokens, 7);
            }
            other => panic!("unexpected frame: {other:?}"),
        }

        let text = r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#;
        match decode_messages_event(text).unwrap() {
            StreamFrame::Delta(d) => assert_eq!(d.content.as_deref(), Some("Hi")),
            other => panic!("unexpected frame: {other:?}"),
        }

        let thinking = r#"{"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"hm"}}"#;
        match decode_messages_event(thinking).unwrap() {
            StreamFrame::Delta(d) => assert_eq!(d.reasoning.as_deref(), Some("hm")),
            other => panic!("unexpected frame: {other:?}"),
        }

        let finish = r#"{"type":"message_delta","delta":{"stop_reason":"max_tokens"},"usage":{"output_tokens":42}}"#;
        match decode_messages_event(finish).unwrap() {
            StreamFrame::Delta(d) => {
                assert_eq!(d.finish_reason, Some(FinishReason::Length));
                assert_eq!(d.usage.unwrap().completion_tokens, 42);
            }
            other => panic!("unexpected frame: {other:?}"),
        }

        assert!(matches!(
            decode_messages_event(r#"{"type":"message_stop"}"#).unwrap(),
            StreamFrame::Done
        ));
        assert!(matches!(
            decode_messages_event(r#"{"type":"ping"}"#).unwrap(),
            StreamFrame::Ignore
        ));
        assert!(matches!(
            decode_messages_event(r#"{"type":"some_future_event","x":1}"#).unwrap(),
            StreamFrame::Ignore
        ));
    }

    #[test]
    fn decode_event_error_and_malformed() {
        let err = decode_messages_event(
            r#"{"type":"error","error":{"type":"rate_limit_error","message":"slow down"}}"#,
        )
        .unwrap_err();
        assert_eq!(err.api_kind(), Some(ApiErrorKind::RateLimited));

        assert!(matches!(
            decode_messages_event("not json"),
            Err(LlmError::DecodeError(_))
        ));
        assert!(matches!(
            decode_messages_event(r#"{"no_type":true}"#),
            Err(LlmError::DecodeError(_))
        ));
    }

    #[test]
    fn classify_http_error_paths() {
        let structured = classify_messages_http_error(
            429,
            r#"{"type":"error","error":{"type":"rate_limit_error","message":"slow down"}}"#,
        );
        assert_eq!(structured.api_kind(), Some(ApiErrorKind::RateLimited));
        assert_eq!(structured.status(), Some(429));

        let raw = classify_messages_http_error(502, "<html>bad gateway</html>");
        assert!(matches!(raw, LlmError::HttpStatusError { status: 502, .. }));
    }
}
