//! End-to-end synchronous calls against a mock HTTP server.

use std::time::Duration;

use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use unichat::{
    AdapterConfig, AnthropicAdapter, ApiErrorKind, BedrockAnthropicAdapter, ChatAdapter,
    ChatMessage, ChatRequest, Credential, DeepSeekAdapter, LlmError, VertexAnthropicAdapter,
};

fn user_request(model: &str) -> ChatRequest {
    ChatRequest::new(model, vec![ChatMessage::user("hello")])
}

#[tokio::test]
async fn anthropic_sync_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "sk-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(serde_json::json!({
            "model": "claude-3-5-sonnet-20241022",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "msg_1",
            "type": "message",
            "model": "claude-3-5-sonnet-20241022",
            "content": [{"type": "text", "text": "hello back"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 4, "output_tokens": 3}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = AnthropicAdapter::new(
        AdapterConfig::new("claude-3-5-sonnet-20241022", Credential::api_key("sk-test"))
            .with_base_url(server.uri()),
    )
    .unwrap();

    let response = adapter.chat_completions(user_request("")).await.unwrap();
    assert_eq!(response.content_text(), Some("hello back"));
    assert_eq!(response.usage.unwrap().total_tokens, 7);
    assert!(response.timing.total_time > Duration::ZERO);
    assert_eq!(response.timing.conn_time, Duration::ZERO);
}

#[tokio::test]
async fn anthropic_rate_limit_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
            "type": "error",
            "error": {"type": "rate_limit_error", "message": "slow down"}
        })))
        .mount(&server)
        .await;

    let adapter = AnthropicAdapter::new(
        AdapterConfig::new("claude-3-5-sonnet-20241022", Credential::api_key("sk-test"))
            .with_base_url(server.uri()),
    )
    .unwrap();

    let err = adapter.chat_completions(user_request("")).await.unwrap_err();
    assert_eq!(err.api_kind(), Some(ApiErrorKind::RateLimited));
    assert_eq!(err.status(), Some(429));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn unparseable_server_error_keeps_status_and_excerpt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<html>boom</html>"))
        .mount(&server)
        .await;

    let adapter = AnthropicAdapter::new(
        AdapterConfig::new("claude-3-5-sonnet-20241022", Credential::api_key("sk-test"))
            .with_base_url(server.uri()),
    )
    .unwrap();

    match adapter.chat_completions(user_request("")).await.unwrap_err() {
        LlmError::HttpStatusError {
            status,
            body_excerpt,
        } => {
            assert_eq!(status, 500);
            assert!(body_excerpt.contains("boom"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn deepseek_sync_round_trip_with_bearer_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-ds"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "deepseek-reasoner",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "4",
                    "reasoning_content": "2+2=4"
                },
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = DeepSeekAdapter::new(
        AdapterConfig::new("deepseek-reasoner", Credential::api_key("sk-ds"))
            .with_base_url(server.uri()),
    )
    .unwrap();

    let response = adapter.chat_completions(user_request("")).await.unwrap();
    assert_eq!(response.content_text(), Some("4"));
    assert_eq!(
        response.choices[0].message.reasoning.as_deref(),
        Some("2+2=4")
    );
}

#[tokio::test]
async fn vertex_sync_round_trip_uses_raw_predict_verb() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(
            "/projects/proj-1/locations/us-east5/publishers/anthropic/models/claude-3-5-sonnet-20241022:rawPredict",
        ))
        .and(header("authorization", "Bearer gcp-token"))
        .and(body_partial_json(serde_json::json!({
            "anthropic_version": "vertex-2023-10-16",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": [{"type": "text", "text": "from vertex"}],
            "stop_reason": "end_turn"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = VertexAnthropicAdapter::new(
        AdapterConfig::new("claude-3-5-sonnet-20241022", Credential::bearer("gcp-token"))
            .with_base_url(server.uri())
            .with_project("proj-1"),
    )
    .unwrap();

    let response = adapter.chat_completions(user_request("")).await.unwrap();
    assert_eq!(response.content_text(), Some("from vertex"));
}

#[tokio::test]
async fn bedrock_sync_round_trip_remaps_model_in_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(
            "/model/anthropic.claude-3-5-sonnet-20241022-v2:0/invoke",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": [{"type": "text", "text": "from bedrock"}],
            "stop_reason": "end_turn"
        })))
        .expect(1)
        .mount(&server)
        .await;

    // Bearer credential keeps signing out of the test; the path layout is the
    // same as with SigV4-signed requests.
    let adapter = BedrockAnthropicAdapter::new(
        AdapterConfig::new("claude-3-5-sonnet-20241022", Credential::bearer("gw-token"))
            .with_base_url(server.uri()),
    )
    .unwrap();

    let response = adapter.chat_completions(user_request("")).await.unwrap();
    assert_eq!(response.content_text(), Some("from bedrock"));
}

#[tokio::test]
async fn bedrock_throttle_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
            "message": "Too many requests",
            "__type": "com.amazonaws.bedrock#ThrottlingException"
        })))
        .mount(&server)
        .await;

    let adapter = BedrockAnthropicAdapter::new(
        AdapterConfig::new("claude-3-5-sonnet-20241022", Credential::bearer("gw-token"))
            .with_base_url(server.uri()),
    )
    .unwrap();

    let err = adapter.chat_completions(user_request("")).await.unwrap_err();
    assert_eq!(err.api_kind(), Some(ApiErrorKind::RateLimited));
}
