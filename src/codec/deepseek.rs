//! DeepSeek codec
//!
//! OpenAI-compatible chat completions with DeepSeek's `reasoning_content`
//! extension. Streaming uses the OpenAI grammar: JSON chunks with a `delta`
//! per choice, a usage-only final chunk when `stream_options.include_usage`
//! is set, and a literal `[DONE]` terminator.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::classify::{
    OPENAI_COMPAT_ERROR_TAGS, ProviderErrorPayload, classify_provider_error, fallback_http_error,
};
use crate::codec::{ChatCodec, ChunkDelta, StreamFrame};
use crate::error::LlmError;
use crate::types::{
    ChatChoice, ChatMessage, ChatRequest, ChatResponse, FinishReason, MessageRole, PhaseTiming,
    ToolCall, Usage,
};

pub struct DeepSeekCodec;

impl ChatCodec for DeepSeekCodec {
    fn provider_id(&self) -> &'static str {
        "deepseek"
    }

    fn encode_chat(&self, request: &ChatRequest) -> Result<Value, LlmError> {
        if request.model.is_empty() {
            return Err(LlmError::ConfigurationError(
                "request has no model".to_string(),
            ));
        }
        if request.messages.is_empty() {
            return Err(LlmError::ConfigurationError(
                "request has no messages".to_string(),
            ));
        }

        let messages: Vec<Value> = request.messages.iter().map(encode_message).collect();
        let mut body = json!({
            "model": request.model,
            "messages": messages,
        });
        let obj = body
            .as_object_mut()
            .ok_or_else(|| LlmError::DecodeError("encoded body is not an object".to_string()))?;
        if let Some(t) = request.sampling.temperature {
            obj.insert("temperature".to_string(), json!(t));
        }
        if let Some(p) = request.sampling.top_p {
            obj.insert("top_p".to_string(), json!(p));
        }
        if let Some(m) = request.sampling.max_tokens {
            obj.insert("max_tokens".to_string(), json!(m));
        }
        if let Some(stop) = &request.sampling.stop
            && !stop.is_empty()
        {
            obj.insert("stop".to_string(), json!(stop));
        }
        if request.stream {
            obj.insert("stream".to_string(), json!(true));
            obj.insert(
                "stream_options".to_string(),
                json!({ "include_usage": true }),
            );
        }
        Ok(body)
    }

    fn decode_chat(&self, body: &[u8]) -> Result<ChatResponse, LlmError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| LlmError::DecodeError(format!("invalid response body: {e}")))?;
        if value.get("error").is_some() {
            return Err(classify_error_value(&value, 200));
        }

        let response: CompletionResponse = serde_json::from_value(value)
            .map_err(|e| LlmError::DecodeError(format!("unexpected response shape: {e}")))?;
        let choices = response
            .choices
            .into_iter()
            .map(|choice| ChatChoice {
                index: choice.index,
                message: ChatMessage {
                    role: MessageRole::Assistant,
                    content: choice.message.content.unwrap_or_default(),
                    tool_calls: choice.message.tool_calls.map(|calls| {
                        calls.into_iter().map(WireToolCall::into_tool_call).collect()
                    }),
                    tool_call_id: None,
                    reasoning: choice.message.reasoning_content,
                },
                finish_reason: choice.finish_reason.as_deref().map(map_finish_reason),
            })
            .collect();
        Ok(ChatResponse {
            model: response.model,
            choices,
            usage: response.usage,
            timing: PhaseTiming::default(),
        })
    }

    fn decode_chunk(&self, frame: &str) -> Result<StreamFrame, LlmError> {
        if frame.trim() == "[DONE]" {
            return Ok(StreamFrame::Done);
        }
        let value: Value = serde_json::from_str(frame)
            .map_err(|e| LlmError::DecodeError(format!("invalid stream frame: {e}")))?;
        if value.get("error").is_some() {
            return Err(classify_error_value(&value, 200));
        }

        let chunk: CompletionChunk = serde_json::from_value(value)
            .map_err(|e| LlmError::DecodeError(format!("unexpected chunk shape: {e}")))?;
        let mut delta = ChunkDelta {
            model: chunk.model,
            usage: chunk.usage,
            ..Default::default()
        };
        if let Some(choice) = chunk.choices.into_iter().next() {
            delta.content = choice.delta.content.filter(|c| !c.is_empty());
            delta.reasoning = choice.delta.reasoning_content.filter(|r| !r.is_empty());
            delta.finish_reason = choice.finish_reason.as_deref().map(map_finish_reason);
        }
        // Model alone is announcement noise on every chunk; only usage, text,
        // or a finish reason makes a chunk worth publishing.
        if delta.content.is_none()
            && delta.reasoning.is_none()
            && delta.usage.is_none()
            && delta.finish_reason.is_none()
        {
            return Ok(StreamFrame::Ignore);
        }
        Ok(StreamFrame::Delta(delta))
    }

    fn classify_http_error(&self, status: u16, body: &str) -> LlmError {
        match serde_json::from_str::<Value>(body) {
            Ok(value) if value.get("error").is_some() => classify_error_value(&value, status),
            _ => fallback_http_error(status, body),
        }
    }
}

fn encode_message(message: &ChatMessage) -> Value {
    let role = match message.role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::Tool => "tool",
    };
    let mut wire = json!({ "role": role, "content": message.content });
    if let Some(obj) = wire.as_object_mut() {
        if let Some(tool_calls) = &message.tool_calls {
            let calls: Vec<Value> = tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": call.call_type,
                        "function": {
                            "name": call.function.name,
                            "arguments": call.function.arguments,
                        },
                    })
                })
                .collect();
            obj.insert("tool_calls".to_string(), json!(calls));
        }
        if let Some(id) = &message.tool_call_id {
            obj.insert("tool_call_id".to_string(), json!(id));
        }
    }
    wire
}

fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "length" => FinishReason::Length,
        "tool_calls" => FinishReason::ToolCalls,
        "content_filter" => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

fn classify_error_value(value: &Value, status: u16) -> LlmError {
    let error = &value["error"];
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default();
    // `type` is the primary tag; some deployments only fill `code`.
    let error_type = error
        .get("type")
        .and_then(Value::as_str)
        .or_else(|| error.get("code").and_then(Value::as_str))
        .unwrap_or("unknown");
    classify_provider_error(
        &OPENAI_COMPAT_ERROR_TAGS,
        status,
        ProviderErrorPayload {
            error_type: error_type.to_string(),
            message: message.to_string(),
        },
    )
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct WireChoice {
    #[serde(default)]
    index: u32,
    message: WireMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default)]
    call_type: Option<String>,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

impl WireToolCall {
    fn into_tool_call(self) -> ToolCall {
        ToolCall {
            id: self.id,
            call_type: self.call_type.unwrap_or_else(|| "function".to_string()),
            function: crate::types::FunctionCall {
                name: self.function.name,
                arguments: self.function.arguments,
            },
        }
    }
}

#[derive(Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: WireDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiErrorKind;
    use crate::types::SamplingParams;

    #[test]
    fn encode_includes_stream_options_only_when_streaming() {
        let mut req = ChatRequest::new("deepseek-chat", vec![ChatMessage::user("hi")])
            .with_sampling(SamplingParams {
                temperature: Some(0.7),
                max_tokens: Some(256),
                ..Default::default()
            });
        let body = DeepSeekCodec.encode_chat(&req).unwrap();
        assert_eq!(body["model"], "deepseek-chat");
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["max_tokens"], 256);
        assert!(body.get("stream").is_none());
        assert!(body.get("stream_options").is_none());

        req.stream = true;
        let body = DeepSeekCodec.encode_chat(&req).unwrap();
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
    }

    #[test]
    fn decode_response_with_reasoning() {
        let body = r#"{
            "model": "deepseek-reasoner",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "4", "reasoning_content": "2+2"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 9, "completion_tokens": 3, "total_tokens": 12}
        }"#;
        let response = DeepSeekCodec.decode_chat(body.as_bytes()).unwrap();
        assert_eq!(response.content_text(), Some("4"));
        assert_eq!(
            response.choices[0].message.reasoning.as_deref(),
            Some("2+2")
        );
        assert_eq!(response.choices[0].finish_reason, Some(FinishReason::Stop));
        assert_eq!(response.usage.unwrap().total_tokens, 12);
    }

    #[test]
    fn decode_response_surfaces_embedded_error() {
        let body = r#"{"error":{"message":"bad key","type":"authentication_error"}}"#;
        let err = DeepSeekCodec.decode_chat(body.as_bytes()).unwrap_err();
        assert_eq!(err.api_kind(), Some(ApiErrorKind::Auth));
    }

    #[test]
    fn decode_chunk_grammar() {
        assert!(matches!(
            DeepSeekCodec.decode_chunk("[DONE]").unwrap(),
            StreamFrame::Done
        ));

        let content =
            r#"{"model":"deepseek-chat","choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#;
        match DeepSeekCodec.decode_chunk(content).unwrap() {
            StreamFrame::Delta(d) => assert_eq!(d.content.as_deref(), Some("Hel")),
            other => panic!("unexpected frame: {other:?}"),
        }

        let reasoning = r#"{"choices":[{"delta":{"reasoning_content":"hm"}}]}"#;
        match DeepSeekCodec.decode_chunk(reasoning).unwrap() {
            StreamFrame::Delta(d) => assert_eq!(d.reasoning.as_deref(), Some("hm")),
            other => panic!("unexpected frame: {other:?}"),
        }

        let usage_only = r#"{"choices":[],"usage":{"prompt_tokens":9,"completion_tokens":3,"total_tokens":12}}"#;
        match DeepSeekCodec.decode_chunk(usage_only).unwrap() {
            StreamFrame::Delta(d) => assert_eq!(d.usage.unwrap().completion_tokens, 3),
            other => panic!("unexpected frame: {other:?}"),
        }

        let finish = r#"{"choices":[{"delta":{},"finish_reason":"length"}]}"#;
        match DeepSeekCodec.decode_chunk(finish).unwrap() {
            StreamFrame::Delta(d) => assert_eq!(d.finish_reason, Some(FinishReason::Length)),
            other => panic!("unexpected frame: {other:?}"),
        }

        let empty = r#"{"model":"deepseek-chat","choices":[{"delta":{}}]}"#;
        assert!(matches!(
            DeepSeekCodec.decode_chunk(empty).unwrap(),
            StreamFrame::Ignore
        ));

        assert!(matches!(
            DeepSeekCodec.decode_chunk("{truncated"),
            Err(LlmError::DecodeError(_))
        ));
    }

    #[test]
    fn classify_http_error_reads_type_then_code() {
        let by_type = DeepSeekCodec.classify_http_error(
            429,
            r#"{"error":{"message":"slow down","type":"rate_limit_exceeded"}}"#,
        );
        assert_eq!(by_type.api_kind(), Some(ApiErrorKind::RateLimited));

        let by_code = DeepSeekCodec.classify_http_error(
            401,
            r#"{"error":{"message":"bad key","code":"invalid_api_key"}}"#,
        );
        assert_eq!(by_code.api_kind(), Some(ApiErrorKind::Auth));

        let raw = DeepSeekCodec.classify_http_error(500, "oops");
        assert!(matches!(raw, LlmError::HttpStatusError { status: 500, .. }));
    }
}
