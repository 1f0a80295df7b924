//! Error classification
//!
//! Maps provider-reported error payloads into the canonical taxonomy. Each
//! provider carries an open lookup table keyed by its error-type tag; tags the
//! table does not know map to [`ApiErrorKind::Unknown`] rather than failing,
//! since providers add error types faster than these tables are updated.

use crate::error::{ApiErrorKind, LlmError, body_excerpt};

/// Open lookup table from provider error-type tags to canonical kinds.
pub struct ErrorTagTable {
    entries: &'static [(&'static str, ApiErrorKind)],
}

impl ErrorTagTable {
    pub const fn new(entries: &'static [(&'static str, ApiErrorKind)]) -> Self {
        Self { entries }
    }

    /// Look up a tag; unrecognized tags yield [`ApiErrorKind::Unknown`].
    pub fn lookup(&self, tag: &str) -> ApiErrorKind {
        self.entries
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, kind)| *kind)
            .unwrap_or(ApiErrorKind::Unknown)
    }
}

/// Anthropic Messages API error tags (`{"type":"error","error":{"type":...}}`).
pub static ANTHROPIC_ERROR_TAGS: ErrorTagTable = ErrorTagTable::new(&[
    ("rate_limit_error", ApiErrorKind::RateLimited),
    ("authentication_error", ApiErrorKind::Auth),
    ("permission_error", ApiErrorKind::Auth),
    ("invalid_request_error", ApiErrorKind::InvalidRequest),
    ("not_found_error", ApiErrorKind::InvalidRequest),
    ("request_too_large", ApiErrorKind::InvalidRequest),
    ("overloaded_error", ApiErrorKind::Overloaded),
]);

/// OpenAI-compatible error tags (`{"error":{"type":...,"code":...}}`), used by
/// DeepSeek.
pub static OPENAI_COMPAT_ERROR_TAGS: ErrorTagTable = ErrorTagTable::new(&[
    ("rate_limit_exceeded", ApiErrorKind::RateLimited),
    ("insufficient_quota", ApiErrorKind::RateLimited),
    ("invalid_request_error", ApiErrorKind::InvalidRequest),
    ("invalid_api_key", ApiErrorKind::Auth),
    ("authentication_error", ApiErrorKind::Auth),
    ("server_overloaded", ApiErrorKind::Overloaded),
]);

/// Amazon Bedrock runtime error tags (`{"message":...,"__type":...}`; the
/// `__type` value may carry a `namespace#` prefix, stripped before lookup).
pub static BEDROCK_ERROR_TAGS: ErrorTagTable = ErrorTagTable::new(&[
    ("ThrottlingException", ApiErrorKind::RateLimited),
    ("TooManyRequestsException", ApiErrorKind::RateLimited),
    ("ValidationException", ApiErrorKind::InvalidRequest),
    ("ResourceNotFoundException", ApiErrorKind::InvalidRequest),
    ("AccessDeniedException", ApiErrorKind::Auth),
    ("UnrecognizedClientException", ApiErrorKind::Auth),
    ("ExpiredTokenException", ApiErrorKind::Auth),
    ("ServiceUnavailableException", ApiErrorKind::Overloaded),
    ("ModelNotReadyException", ApiErrorKind::Overloaded),
]);

/// A provider error payload reduced to its tag and message, shape-agnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderErrorPayload {
    pub error_type: String,
    pub message: String,
}

/// Classify a parsed provider error payload against the provider's table.
pub fn classify_provider_error(
    table: &ErrorTagTable,
    status: u16,
    payload: ProviderErrorPayload,
) -> LlmError {
    let kind = table.lookup(&payload.error_type);
    if kind == ApiErrorKind::Unknown {
        tracing::warn!(
            error_type = %payload.error_type,
            status,
            "unrecognized provider error tag, classifying as unknown"
        );
    }
    LlmError::ProviderApiError {
        kind,
        status,
        error_type: payload.error_type,
        message: payload.message,
    }
}

/// Fallback for non-2xx responses whose body did not parse as the provider's
/// structured error shape: preserve the raw status and a bounded excerpt.
pub fn fallback_http_error(status: u16, body: &str) -> LlmError {
    LlmError::HttpStatusError {
        status,
        body_excerpt: body_excerpt(body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_map_known_tags() {
        assert_eq!(
            ANTHROPIC_ERROR_TAGS.lookup("rate_limit_error"),
            ApiErrorKind::RateLimited
        );
        assert_eq!(
            ANTHROPIC_ERROR_TAGS.lookup("overloaded_error"),
            ApiErrorKind::Overloaded
        );
        assert_eq!(
            BEDROCK_ERROR_TAGS.lookup("ThrottlingException"),
            ApiErrorKind::RateLimited
        );
        assert_eq!(
            OPENAI_COMPAT_ERROR_TAGS.lookup("invalid_api_key"),
            ApiErrorKind::Auth
        );
    }

    #[test]
    fn unknown_tags_never_fail_closed() {
        assert_eq!(
            ANTHROPIC_ERROR_TAGS.lookup("brand_new_error_type"),
            ApiErrorKind::Unknown
        );
        let err = classify_provider_error(
            &ANTHROPIC_ERROR_TAGS,
            400,
            ProviderErrorPayload {
                error_type: "brand_new_error_type".to_string(),
                message: "?".to_string(),
            },
        );
        assert_eq!(err.api_kind(), Some(ApiErrorKind::Unknown));
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn fallback_preserves_status_and_excerpt() {
        let err = fallback_http_error(500, "<html>internal error</html>");
        match err {
            LlmError::HttpStatusError {
                status,
                body_excerpt,
            } => {
                assert_eq!(status, 500);
                assert!(body_excerpt.contains("internal error"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
