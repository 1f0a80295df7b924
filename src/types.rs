//! Canonical request/response/chunk types
//!
//! The provider-agnostic shapes exchanged at the subsystem boundary. Provider
//! wire shapes exist only inside a codec's translation boundary and never
//! escape to callers.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::LlmError;

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    /// Result of a tool invocation, referencing a prior tool call.
    Tool,
}

/// A function invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, kept as a string so partial provider output
    /// round-trips without re-encoding.
    pub arguments: String,
}

/// A tool call attached to an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn function_call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// One message in a canonical conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    /// Tool calls issued by the assistant, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// For [`MessageRole::Tool`] messages, the id of the call being answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Reasoning/thinking content, for models that surface it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            reasoning: None,
        }
    }
}

/// Sampling parameters shared by all providers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SamplingParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

/// Canonical chat-completion request. Immutable once handed to an adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub sampling: SamplingParams,
    #[serde(default)]
    pub stream: bool,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            sampling: SamplingParams::default(),
            stream: false,
        }
    }

    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }
}

/// Token usage counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
}

/// One output choice of a completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: Option<FinishReason>,
}

/// Per-phase timing of a call.
///
/// For streaming, `conn_time` is request-start to stream-open, `duration` is
/// stream-open to the moment the chunk was produced, and `total_time` is their
/// sum. For synchronous calls only `total_time` is populated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTiming {
    pub conn_time: Duration,
    pub duration: Duration,
    pub total_time: Duration,
}

/// Canonical chat-completion response for the synchronous path.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub model: Option<String>,
    pub choices: Vec<ChatChoice>,
    pub usage: Option<Usage>,
    pub timing: PhaseTiming,
}

impl ChatResponse {
    /// Text content of the first choice, if present.
    pub fn content_text(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/// Terminal marker on the last chunk of a stream.
#[derive(Debug)]
pub enum StreamEnd {
    /// The provider closed the stream cleanly.
    Eof,
    /// The stream failed; the classified error.
    Error(LlmError),
}

/// One incremental unit of a streaming response.
///
/// Exactly one chunk per stream carries a [`StreamEnd`] sentinel, emitted
/// strictly after all content chunks. `timing.total_time` is non-decreasing
/// across the chunks of a stream.
#[derive(Debug, Default)]
pub struct ChatStreamChunk {
    pub model: Option<String>,
    /// Incremental text content.
    pub content: Option<String>,
    /// Incremental reasoning/thinking content.
    pub reasoning: Option<String>,
    pub usage: Option<Usage>,
    pub finish_reason: Option<FinishReason>,
    pub timing: PhaseTiming,
    /// Set on the terminal sentinel chunk only.
    pub end: Option<StreamEnd>,
}

impl ChatStreamChunk {
    /// Whether this chunk is the stream-ending sentinel.
    pub fn is_terminal(&self) -> bool {
        self.end.is_some()
    }

    /// The terminal error, if this is a failed sentinel.
    pub fn error(&self) -> Option<&LlmError> {
        match &self.end {
            Some(StreamEnd::Error(e)) => Some(e),
            _ => None,
        }
    }
}
