//! HTTP transport primitives
//!
//! Thin wrapper over `reqwest` exposing the two operations the adapter layer
//! contracts on: a JSON POST returning the full body, and an SSE stream opener
//! yielding raw event frames. Both honor the configured timeout and optional
//! proxy, and route non-2xx responses through a provider-supplied error
//! handler so classification happens at the detection site.

use async_trait::async_trait;
use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures_util::{Stream, StreamExt};
use reqwest::header::HeaderMap;
use std::pin::Pin;
use std::time::Duration;

use crate::error::LlmError;

/// Join a base URL and a path without doubling slashes.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Source of raw stream frames, exclusively owned by the stream's producer
/// task for its entire lifetime.
#[async_trait]
pub trait FrameSource: Send {
    /// Next raw frame payload. `Ok(None)` signals clean end-of-stream.
    async fn recv(&mut self) -> Result<Option<String>, LlmError>;

    /// Release the underlying connection. Idempotent.
    fn close(&mut self);
}

type SseInner = Pin<Box<dyn Stream<Item = Result<Event, EventStreamError<reqwest::Error>>> + Send>>;

/// SSE-backed frame source over a streaming HTTP response body.
pub struct SseSource {
    inner: Option<SseInner>,
}

#[async_trait]
impl FrameSource for SseSource {
    async fn recv(&mut self) -> Result<Option<String>, LlmError> {
        let Some(stream) = self.inner.as_mut() else {
            return Ok(None);
        };
        loop {
            match stream.next().await {
                Some(Ok(event)) => {
                    if event.data.trim().is_empty() {
                        continue;
                    }
                    return Ok(Some(event.data));
                }
                Some(Err(e)) => {
                    return Err(LlmError::StreamInterrupted(format!("SSE read error: {e}")));
                }
                None => return Ok(None),
            }
        }
    }

    fn close(&mut self) {
        self.inner = None;
    }
}

/// HTTP transport bound to one adapter's timeout and proxy settings.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a client with the given total-call timeout and optional proxy.
    ///
    /// The client timeout bounds the whole exchange including streaming body
    /// reads; read-stall detection is layered on top by the stream producer.
    pub fn new(timeout: Duration, proxy: Option<&str>) -> Result<Self, LlmError> {
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if let Some(proxy_url) = proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| LlmError::ConfigurationError(format!("invalid proxy URL: {e}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| LlmError::ConfigurationError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// POST a JSON body and return the full response bytes.
    ///
    /// Non-2xx responses are handed to `on_http_error` with the raw status and
    /// body; its result is returned instead of attempting to decode a success
    /// payload.
    pub async fn post_json<F>(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &serde_json::Value,
        on_http_error: F,
    ) -> Result<Vec<u8>, LlmError>
    where
        F: Fn(u16, &str) -> LlmError,
    {
        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::TransportError(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(on_http_error(status.as_u16(), &text));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| LlmError::TransportError(format!("failed to read response body: {e}")))?;
        Ok(bytes.to_vec())
    }

    /// POST a JSON body and open the response as an SSE frame stream.
    ///
    /// Fails synchronously on connection errors and on non-2xx status (routed
    /// through `on_http_error`); on success the returned source owns the
    /// connection.
    pub async fn open_sse<F>(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &serde_json::Value,
        on_http_error: F,
    ) -> Result<SseSource, LlmError>
    where
        F: Fn(u16, &str) -> LlmError,
    {
        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::TransportError(format!("failed to open stream: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(on_http_error(status.as_u16(), &text));
        }

        let stream = response.bytes_stream().eventsource();
        Ok(SseSource {
            inner: Some(Box::pin(stream)),
        })
    }
}
