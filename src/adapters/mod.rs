//! Provider adapters
//!
//! One adapter struct per deployment surface, all exposing the same
//! [`ChatAdapter`] trait. Adapters are immutable after construction and safe
//! to share across concurrent calls.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::LlmError;
use crate::streaming::ChatStream;
use crate::types::{ChatRequest, ChatResponse};

mod anthropic;
mod deepseek;

pub use anthropic::{AnthropicAdapter, BedrockAnthropicAdapter, VertexAnthropicAdapter};
pub use deepseek::DeepSeekAdapter;

/// Uniform chat-completion surface over all providers.
#[async_trait]
pub trait ChatAdapter: Send + Sync {
    fn provider_id(&self) -> &'static str;

    /// Full completion in one exchange.
    async fn chat_completions(&self, request: ChatRequest) -> Result<ChatResponse, LlmError>;

    /// Streaming completion. A returned stream always ends with exactly one
    /// terminal chunk; failures to even open the stream surface here instead.
    async fn chat_completions_stream(&self, request: ChatRequest) -> Result<ChatStream, LlmError>;
}

/// Insert a header, marking credential-bearing values sensitive so they stay
/// out of client debug output.
pub(crate) fn insert_header(
    headers: &mut HeaderMap,
    name: &str,
    value: &str,
    sensitive: bool,
) -> Result<(), LlmError> {
    let name = HeaderName::try_from(name)
        .map_err(|e| LlmError::ConfigurationError(format!("invalid header name '{name}': {e}")))?;
    let mut value = HeaderValue::try_from(value)
        .map_err(|e| LlmError::ConfigurationError(format!("invalid value for header '{name}': {e}")))?;
    value.set_sensitive(sensitive);
    headers.insert(name, value);
    Ok(())
}

/// Merge caller-supplied extra headers after the provider defaults, so callers
/// can override or extend (e.g. externally signed authorization headers).
pub(crate) fn apply_extra_headers(
    headers: &mut HeaderMap,
    extra: &std::collections::HashMap<String, String>,
) -> Result<(), LlmError> {
    for (name, value) in extra {
        insert_header(headers, name, value, false)?;
    }
    Ok(())
}

/// Pick the effective model: the request's own, or the adapter default.
pub(crate) fn resolve_model(request: &mut ChatRequest, default_model: &str) {
    if request.model.is_empty() {
        request.model = default_model.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_header_rejects_invalid_names() {
        let mut headers = HeaderMap::new();
        assert!(insert_header(&mut headers, "x ok", "v", false).is_err());
        assert!(insert_header(&mut headers, "x-ok", "v", false).is_ok());
        assert_eq!(headers["x-ok"], "v");
    }

    #[test]
    fn sensitive_headers_are_marked() {
        let mut headers = HeaderMap::new();
        insert_header(&mut headers, "x-api-key", "sk-secret", true).unwrap();
        assert!(headers["x-api-key"].is_sensitive());
    }

    #[test]
    fn resolve_model_prefers_request_model() {
        let mut request = ChatRequest::new("explicit", vec![]);
        resolve_model(&mut request, "default");
        assert_eq!(request.model, "explicit");

        let mut request = ChatRequest::new("", vec![]);
        resolve_model(&mut request, "default");
        assert_eq!(request.model, "default");
    }
}
