//! Anthropic adapters: direct API, Vertex AI, and Amazon Bedrock.
//!
//! All three speak the same Messages body through the shared codec core;
//! what each adapter owns is endpoint layout and authentication. Vertex and
//! Bedrock put the model in the URL path, so their URL builders take the
//! resolved per-request model.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::sync::Arc;

use crate::adapters::{ChatAdapter, apply_extra_headers, insert_header, resolve_model};
use crate::codec::{AnthropicCodec, BedrockAnthropicCodec, VertexAnthropicCodec};
use crate::codec::bedrock::remap_model;
use crate::config::{AdapterConfig, Credential};
use crate::error::LlmError;
use crate::executor::ChatHttpExecutor;
use crate::streaming::{ChatStream, StreamOptions};
use crate::transport::{HttpTransport, join_url};
use crate::types::{ChatRequest, ChatResponse};

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_API_VERSION: &str = "2023-06-01";
const ANTHROPIC_BETA: &str = "prompt-caching-2024-07-31";
const VERTEX_DEFAULT_LOCATION: &str = "us-east5";
const VERTEX_PATH_TEMPLATE: &str =
    "/projects/{project}/locations/{location}/publishers/anthropic/models/{model}";

fn stream_options(config: &AdapterConfig) -> StreamOptions {
    StreamOptions {
        stall_timeout: config.stall_timeout,
        channel_capacity: config.channel_capacity,
    }
}

/// Adapter for the Anthropic API served at api.anthropic.com.
#[derive(Debug)]
pub struct AnthropicAdapter {
    executor: ChatHttpExecutor,
    default_model: String,
}

impl AnthropicAdapter {
    pub fn new(config: AdapterConfig) -> Result<Self, LlmError> {
        let api_key = config.credential.expose_api_key().ok_or_else(|| {
            LlmError::ConfigurationError(
                "Anthropic adapter requires an API key credential".to_string(),
            )
        })?;
        let mut headers = HeaderMap::new();
        insert_header(&mut headers, "x-api-key", api_key, true)?;
        insert_header(&mut headers, "anthropic-version", ANTHROPIC_API_VERSION, false)?;
        insert_header(&mut headers, "anthropic-beta", ANTHROPIC_BETA, false)?;
        apply_extra_headers(&mut headers, &config.extra_headers)?;

        let base = if config.base_url.is_empty() {
            ANTHROPIC_BASE_URL
        } else {
            &config.base_url
        };
        let path = if config.path.is_empty() {
            "/messages"
        } else {
            &config.path
        };
        let url = join_url(base, path);
        tracing::debug!(provider = "anthropic", url = %url, "constructed adapter");

        let transport = HttpTransport::new(config.timeout, config.proxy.as_deref())?;
        Ok(Self {
            executor: ChatHttpExecutor {
                provider_id: "anthropic",
                codec: Arc::new(AnthropicCodec),
                transport,
                build_url: Box::new(move |_stream, _model| url.clone()),
                build_headers: Box::new(move || Ok(headers.clone())),
                options: stream_options(&config),
            },
            default_model: config.model,
        })
    }
}

#[async_trait]
impl ChatAdapter for AnthropicAdapter {
    fn provider_id(&self) -> &'static str {
        "anthropic"
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

/// Adapter for Anthropic models published through Vertex AI.
///
/// The model lives in the URL path and the call verb selects streaming:
/// `:rawPredict` for synchronous calls, `:streamRawPredict?alt=sse` for
/// streams.
pub struct VertexAnthropicAdapter {
    executor: ChatHttpExecutor,
    default_model: String,
}

impl VertexAnthropicAdapter {
    pub fn new(config: AdapterConfig) -> Result<Self, LlmError> {
        let token = config.credential.expose_bearer().ok_or_else(|| {
            LlmError::ConfigurationError(
                "Vertex adapter requires a bearer token credential".to_string(),
            )
        })?;
        let project = config.project.as_deref().ok_or_else(|| {
            LlmError::ConfigurationError("Vertex adapter requires a project".to_string())
        })?;
        let location = config
            .location
            .clone()
            .unwrap_or_else(|| VERTEX_DEFAULT_LOCATION.to_string());

        let mut headers = HeaderMap::new();
        insert_header(&mut headers, "authorization", &format!("Bearer {token}"), true)?;
        apply_extra_headers(&mut headers, &config.extra_headers)?;

        let base = if config.base_url.is_empty() {
            format!("https://{location}-aiplatform.googleapis.com/v1")
        } else {
            config.base_url.clone()
        };
        let template = if config.path.is_empty() {
            VERTEX_PATH_TEMPLATE
        } else {
            &config.path
        };
        let path = template
            .replace("{project}", project)
            .replace("{location}", &location);
        // Still contains {model}; filled in per request.
        let url_prefix = join_url(&base, &path);
        tracing::debug!(provider = "anthropic-vertex", url = %url_prefix, "constructed adapter");

        let transport = HttpTransport::new(config.timeout, config.proxy.as_deref())?;
        Ok(Self {
            executor: ChatHttpExecutor {
                provider_id: "anthropic-vertex",
                codec: Arc::new(VertexAnthropicCodec),
                transport,
                build_url: Box::new(move |stream, model| {
                    let url = url_prefix.replace("{model}", model);
                    if stream {
                        format!("{url}:streamRawPredict?alt=sse")
                    } else {
                        format!("{url}:rawPredict")
                    }
                }),
                build_headers: Box::new(move || Ok(headers.clone())),
                options: stream_options(&config),
            },
            default_model: config.model,
        })
    }
}

#[async_trait]
impl ChatAdapter for VertexAnthropicAdapter {
    fn provider_id(&self) -> &'static str {
        "anthropic-vertex"
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

/// Adapter for Anthropic models on the Amazon Bedrock runtime.
///
/// Model ids are remapped to Bedrock's namespaced ids and streaming is
/// selected by endpoint (`invoke` vs `invoke-with-response-stream`). Request
/// signing is an external concern: with an AWS credential the region picks
/// the endpoint and signed headers arrive through `extra_headers`; a bearer
/// credential targets gateways that accept token auth.
pub struct BedrockAnthropicAdapter {
    executor: ChatHttpExecutor,
    default_model: String,
}

impl BedrockAnthropicAdapter {
    pub fn new(config: AdapterConfig) -> Result<Self, LlmError> {
        let mut headers = HeaderMap::new();
        let base = match &config.credential {
            Credential::Aws { region, .. } => {
                if config.base_url.is_empty() {
                    format!("https://bedrock-runtime.{region}.amazonaws.com")
                } else {
                    config.base_url.clone()
                }
            }
            Credential::Bearer(_) => {
                let token = config.credential.expose_bearer().ok_or_else(|| {
                    LlmError::ConfigurationError("missing bearer token".to_string())
                })?;
                insert_header(&mut headers, "authorization", &format!("Bearer {token}"), true)?;
                if config.base_url.is_empty() {
                    return Err(LlmError::ConfigurationError(
                        "Bedrock adapter with a bearer credential requires an explicit base URL"
                            .to_string(),
                    ));
                }
                config.base_url.clone()
            }
            Credential::ApiKey(_) => {
                return Err(LlmError::ConfigurationError(
                    "Bedrock adapter requires an AWS or bearer credential".to_string(),
                ));
            }
        };
        apply_extra_headers(&mut headers, &config.extra_headers)?;
        tracing::debug!(provider = "anthropic-bedrock", base = %base, "constructed adapter");

        let base = base.trim_end_matches('/').to_string();
        let transport = HttpTransport::new(config.timeout, config.proxy.as_deref())?;
        Ok(Self {
            executor: ChatHttpExecutor {
                provider_id: "anthropic-bedrock",
                codec: Arc::new(BedrockAnthropicCodec),
                transport,
                build_url: Box::new(move |stream, model| {
                    let verb = if stream {
                        "invoke-with-response-stream"
                    } else {
                        "invoke"
                    };
                    format!("{base}/model/{}/{verb}", remap_model(model))
                }),
                build_headers: Box::new(move || Ok(headers.clone())),
                options: stream_options(&config),
            },
            default_model: config.model,
        })
    }
}

#[async_trait]
impl ChatAdapter for BedrockAnthropicAdapter {
    fn provider_id(&self) -> &'static str {
        "anthropic-bedrock"
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
