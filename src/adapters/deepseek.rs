//! DeepSeek adapter.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::sync::Arc;

use crate::adapters::{ChatAdapter, apply_extra_headers, insert_header, resolve_model};
use crate::codec::DeepSeekCodec;
use crate::config::AdapterConfig;
use crate::error::LlmError;
use crate::executor::ChatHttpExecutor;
use crate::streaming::{ChatStream, StreamOptions};
use crate::transport::{HttpTransport, join_url};
use crate::types::{ChatRequest, ChatResponse};

const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";

pub struct DeepSeekAdapter {
    executor: ChatHttpExecutor,
    default_model: String,
}

impl DeepSeekAdapter {
    pub fn new(config: AdapterConfig) -> Result<Self, LlmError> {
        // API key and bearer are the same thing here; both land in the
        // Authorization header.
        let token = config
            .credential
            .expose_api_key()
            .or_else(|| config.credential.expose_bearer())
            .ok_or_else(|| {
                LlmError::ConfigurationError(
                    "DeepSeek adapter requires an API key or bearer credential".to_string(),
                )
            })?;
        let mut headers = HeaderMap::new();
        insert_header(&mut headers, "authorization", &format!("Bearer {token}"), true)?;
        apply_extra_headers(&mut headers, &config.extra_headers)?;

        let base = if config.base_url.is_empty() {
            DEEPSEEK_BASE_URL
        } else {
            &config.base_url
        };
        let path = if config.path.is_empty() {
            "/chat/completions"
        } else {
            &config.path
        };
        let url = join_url(base, path);
        tracing::debug!(provider = "deepseek", url = %url, "constructed adapter");

        let transport = HttpTransport::new(config.timeout, config.proxy.as_deref())?;
        Ok(Self {
            executor: ChatHttpExecutor {
                provider_id: "deepseek",
                codec: Arc::new(DeepSeekCodec),
                transport,
                build_url: Box::new(move |_stream, _model| url.clone()),
                build_headers: Box::new(move || Ok(headers.clone())),
                options: StreamOptions {
                    stall_timeout: config.stall_timeout,
                    channel_capacity: config.channel_capacity,
                },
            },
            default_model: config.model,
        })
    }
}

#[async_trait]
impl ChatAdapter for DeepSeekAdapter {
    fn provider_id(&self) -> &'static str {
        "deepseek"
    }

    async fn chat_completions(&self, mut request: ChatRequest) -> Result<ChatResponse, LlmError> {
        resolve_model(&mut request, &self.default_model);
        self.executor.execute(request).await
    }

    async fn chat_completions_stream(
        &self,
        mut request: ChatRequest,
    ) -> Result<ChatStream, LlmError> {
        resolve_model(&mut request, &self.default_model);
        self.executor.execute_stream(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credential;

    #[test]
    fn defaults_to_chat_completions_endpoint() {
        let adapter = DeepSeekAdapter::new(AdapterConfig::new(
            "deepseek-chat",
            Credential::api_key("sk-test"),
        ))
        .unwrap();
        assert_eq!(
            (adapter.executor.build_url)(false, "deepseek-chat"),
            "https://api.deepseek.com/v1/chat/completions"
        );
    }

    #[test]
    fn accepts_bearer_credential() {
        assert!(DeepSeekAdapter::new(AdapterConfig::new("m", Credential::bearer("tok"))).is_ok());
    }

    #[test]
    fn rejects_aws_credential() {
        let cred = Credential::aws_triple("r|a|s").unwrap();
        assert!(matches!(
            DeepSeekAdapter::new(AdapterConfig::new("m", cred)),
            Err(LlmError::ConfigurationError(_))
        ));
    }
}
