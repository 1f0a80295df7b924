//! Chat call execution
//!
//! Shared request pipeline used by every adapter: encode through the codec,
//! send over the transport, decode or hand off to the stream worker. The
//! provider-specific parts arrive as strategy hooks (URL and header builders)
//! so the pipeline itself stays identical across providers.

use reqwest::header::HeaderMap;
use std::sync::Arc;
use std::time::Instant;

use crate::codec::ChatCodec;
use crate::error::LlmError;
use crate::streaming::{ChatStream, StreamClock, StreamOptions, spawn_stream_worker};
use crate::transport::HttpTransport;
use crate::types::{ChatRequest, ChatResponse};

/// URL for a call; the arguments are (streaming, resolved model id).
pub(crate) type UrlFn = Box<dyn Fn(bool, &str) -> String + Send + Sync>;
pub(crate) type HeaderFn = Box<dyn Fn() -> Result<HeaderMap, LlmError> + Send + Sync>;

pub(crate) struct ChatHttpExecutor {
    pub(crate) provider_id: &'static str,
    pub(crate) codec: Arc<dyn ChatCodec>,
    pub(crate) transport: HttpTransport,
    pub(crate) build_url: UrlFn,
    pub(crate) build_headers: HeaderFn,
    pub(crate) options: StreamOptions,
}

impl std::fmt::Debug for ChatHttpExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatHttpExecutor")
            .field("provider_id", &self.provider_id)
            .finish_non_exhaustive()
    }
}

impl ChatHttpExecutor {
    /// Synchronous completion. `total_time` covers encode through decode.
    pub(crate) async fn execute(&self, mut request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let started = Instant::now();
        request.stream = false;
        let body = self.codec.encode_chat(&request)?;
        let url = (self.build_url)(false, &request.model);
        let headers = (self.build_headers)()?;

        tracing::debug!(
            provider = self.provider_id,
            model = %request.model,
            "sending chat completion request"
        );
        let bytes = self
            .transport
            .post_json(&url, headers, &body, |status, body| {
                self.codec.classify_http_error(status, body)
            })
            .await?;
        let mut response = self.codec.decode_chat(&bytes)?;
        response.timing.total_time = started.elapsed();
        tracing::info!(
            provider = self.provider_id,
            model = %request.model,
            total_ms = response.timing.total_time.as_millis() as u64,
            "chat completion finished"
        );
        Ok(response)
    }

    /// Streaming completion. Fails synchronously when the stream cannot be
    /// opened (connect error or non-2xx); once a stream is returned, all
    /// further failures arrive as its terminal chunk.
    pub(crate) async fn execute_stream(
        &self,
        mut request: ChatRequest,
    ) -> Result<ChatStream, LlmError> {
        let started = Instant::now();
        request.stream = true;
        let body = self.codec.encode_chat(&request)?;
        let url = (self.build_url)(true, &request.model);
        let headers = (self.build_headers)()?;

        tracing::debug!(
            provider = self.provider_id,
            model = %request.model,
            "opening chat completion stream"
        );
        let source = self
            .transport
            .open_sse(&url, headers, &body, |status, body| {
                self.codec.classify_http_error(status, body)
            })
            .await?;
        let clock = StreamClock::new(started);
        Ok(spawn_stream_worker(
            self.provider_id,
            self.codec.clone(),
            source,
            clock,
            self.options,
        ))
    }
}
