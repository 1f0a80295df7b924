//! Unified error taxonomy
//!
//! Every failure mode in the adapter layer — transport faults, non-2xx HTTP
//! responses, provider-reported API errors, malformed payloads, and broken
//! streams — is expressed as one [`LlmError`] value, constructed once at the
//! detection site and propagated as data.

/// Canonical classification of a provider-reported error.
///
/// The per-provider tag tables in [`crate::classify`] map provider error-type
/// strings into these kinds. Tables are open: tags they do not recognize map
/// to [`ApiErrorKind::Unknown`], never to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// The provider rejected the call due to rate or quota limits.
    RateLimited,
    /// The request was malformed or referenced something that does not exist.
    InvalidRequest,
    /// Authentication or authorization failed.
    Auth,
    /// The provider is temporarily overloaded.
    Overloaded,
    /// Anything the tag tables do not recognize.
    Unknown,
}

/// Unified error type for all adapter operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Network/DNS/timeout failure before any usable response arrived.
    #[error("transport error: {0}")]
    TransportError(String),

    /// Non-2xx HTTP response whose body did not match the provider's
    /// structured error shape. Carries a bounded excerpt for diagnostics.
    #[error("HTTP status {status}: {body_excerpt}")]
    HttpStatusError {
        /// The raw HTTP status code.
        status: u16,
        /// Length-bounded excerpt of the response body.
        body_excerpt: String,
    },

    /// A provider payload that self-reports an error, classified through the
    /// provider's tag table. Emitted both for non-2xx responses with a
    /// recognizable body and for 200-status bodies that encode an error.
    #[error("provider API error ({error_type}): {message}")]
    ProviderApiError {
        /// Canonical classification of the provider tag.
        kind: ApiErrorKind,
        /// HTTP status the error arrived with (200 for apply-level errors).
        status: u16,
        /// The provider-reported error-type tag, verbatim.
        error_type: String,
        /// The provider-reported message.
        message: String,
    },

    /// Malformed or schema-mismatched payload or stream frame.
    #[error("decode error: {0}")]
    DecodeError(String),

    /// The connection dropped mid-stream before a clean end-of-stream signal,
    /// the stream stalled past its read timeout, or the caller canceled.
    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),

    /// Invalid adapter configuration or request parameters.
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}

impl LlmError {
    /// HTTP status associated with this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatusError { status, .. } | Self::ProviderApiError { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Canonical kind for provider-reported errors.
    pub fn api_kind(&self) -> Option<ApiErrorKind> {
        match self {
            Self::ProviderApiError { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether a caller-side retry policy could reasonably retry this error.
    ///
    /// This crate never retries; the flag is advisory for the layer above.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::TransportError(_) | Self::StreamInterrupted(_) => true,
            Self::HttpStatusError { status, .. } => *status == 429 || *status >= 500,
            Self::ProviderApiError { kind, .. } => {
                matches!(kind, ApiErrorKind::RateLimited | ApiErrorKind::Overloaded)
            }
            Self::DecodeError(_) | Self::ConfigurationError(_) => false,
        }
    }
}

/// Upper bound on raw-body excerpts carried inside errors.
pub(crate) const BODY_EXCERPT_MAX: usize = 2048;

/// Bound a raw response body for inclusion in an error, respecting UTF-8
/// boundaries.
pub(crate) fn body_excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= BODY_EXCERPT_MAX {
        return trimmed.to_string();
    }
    let mut cut = BODY_EXCERPT_MAX;
    while !trimmed.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}… (truncated)", &trimmed[..cut])
}
