//! Provider codecs
//!
//! A codec is a bidirectional translator between the canonical model and one
//! provider's wire shapes: request encoding, full-body response decoding, and
//! per-frame stream decoding. Encode/decode is all-or-nothing per call — a
//! codec never partially translates a message. Dispatch is static per adapter
//! instance; no call site switches on provider type at runtime.

use crate::error::LlmError;
use crate::types::{ChatRequest, ChatResponse, FinishReason, Usage};

pub mod anthropic;
pub mod bedrock;
pub mod deepseek;
pub mod vertex;

pub use anthropic::AnthropicCodec;
pub use bedrock::BedrockAnthropicCodec;
pub use deepseek::DeepSeekCodec;
pub use vertex::VertexAnthropicCodec;

/// Incremental payload decoded from one provider stream frame.
#[derive(Debug, Default)]
pub struct ChunkDelta {
    pub model: Option<String>,
    pub content: Option<String>,
    pub reasoning: Option<String>,
    pub usage: Option<Usage>,
    pub finish_reason: Option<FinishReason>,
}

impl ChunkDelta {
    /// True when the frame carried nothing the canonical model surfaces.
    pub fn is_empty(&self) -> bool {
        self.model.is_none()
            && self.content.is_none()
            && self.reasoning.is_none()
            && self.usage.is_none()
            && self.finish_reason.is_none()
    }
}

/// Outcome of decoding one stream frame.
#[derive(Debug)]
pub enum StreamFrame {
    /// Incremental payload to publish.
    Delta(ChunkDelta),
    /// Bookkeeping frame (pings, block start/stop) with nothing to surface.
    Ignore,
    /// The provider signalled clean end-of-stream.
    Done,
}

/// Translator between the canonical model and one provider's wire format.
///
/// Implementations also own the interpretation of that provider's error
/// payloads, so HTTP-level failures are classified where the shape is known.
pub trait ChatCodec: Send + Sync + 'static {
    fn provider_id(&self) -> &'static str;

    /// Canonical request to provider wire request.
    fn encode_chat(&self, request: &ChatRequest) -> Result<serde_json::Value, LlmError>;

    /// Full provider response body to canonical response. Bodies that
    /// self-report an error (even with 200 status) yield the classified error.
    fn decode_chat(&self, body: &[u8]) -> Result<ChatResponse, LlmError>;

    /// One provider stream frame to a canonical outcome. A malformed frame is
    /// an error — it terminates the stream rather than being dropped.
    fn decode_chunk(&self, frame: &str) -> Result<StreamFrame, LlmError>;

    /// Classify a non-2xx HTTP response using this provider's error shape,
    /// falling back to a generic status error for unparseable bodies.
    fn classify_http_error(&self, status: u16, body: &str) -> LlmError;
}
