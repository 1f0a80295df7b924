//! # unichat
//!
//! A unified chat-completion interface over multiple LLM providers: the
//! Anthropic API (direct, via Vertex AI, and via Amazon Bedrock) and
//! DeepSeek's OpenAI-compatible API.
//!
//! Callers build canonical [`ChatRequest`]s and receive canonical
//! [`ChatResponse`]s or [`ChatStreamChunk`]s; provider wire formats never
//! escape the codec layer. All providers share one error taxonomy
//! ([`LlmError`]) and per-phase timing ([`types::PhaseTiming`]).
//!
//! ## Example
//!
//! ```no_run
//! use unichat::{
//!     AdapterConfig, AnthropicAdapter, ChatAdapter, ChatMessage, ChatRequest, Credential,
//! };
//!
//! # async fn run() -> Result<(), unichat::LlmError> {
//! let adapter = AnthropicAdapter::new(AdapterConfig::new(
//!     "claude-3-5-sonnet-20241022",
//!     Credential::api_key("sk-..."),
//! ))?;
//!
//! // Synchronous completion.
//! let response = adapter
//!     .chat_completions(ChatRequest::new("", vec![ChatMessage::user("Hello!")]))
//!     .await?;
//! println!("{}", response.content_text().unwrap_or_default());
//!
//! // Streaming: every stream ends with exactly one terminal chunk.
//! let mut stream = adapter
//!     .chat_completions_stream(ChatRequest::new("", vec![ChatMessage::user("Hello!")]))
//!     .await?;
//! while let Some(chunk) = stream.recv().await {
//!     if let Some(text) = &chunk.content {
//!         print!("{text}");
//!     }
//!     if chunk.is_terminal() {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod classify;
pub mod codec;
pub mod config;
pub mod error;
mod executor;
pub mod streaming;
mod transport;
pub mod types;

pub use adapters::{
    AnthropicAdapter, BedrockAnthropicAdapter, ChatAdapter, DeepSeekAdapter, VertexAnthropicAdapter,
};
pub use config::{AdapterConfig, Credential};
pub use error::{ApiErrorKind, LlmError};
pub use streaming::{ChatStream, StreamOptions};
pub use types::{
    ChatMessage, ChatRequest, ChatResponse, ChatStreamChunk, FinishReason, MessageRole,
    SamplingParams, StreamEnd, Usage,
};
