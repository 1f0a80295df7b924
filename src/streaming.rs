//! Stream orchestration
//!
//! Each streaming call gets one producer task that owns the frame source for
//! the whole stream lifetime: it reads raw frames, decodes them through the
//! provider codec, stamps timing, and publishes canonical chunks over a
//! bounded channel. Every stream ends with exactly one terminal chunk
//! carrying a [`StreamEnd`] sentinel, published strictly after all content
//! chunks. The only case with no terminal chunk is a caller that dropped the
//! receiver, in which case nobody is listening.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::codec::{ChatCodec, StreamFrame};
use crate::error::LlmError;
use crate::transport::FrameSource;
use crate::types::{ChatStreamChunk, PhaseTiming, StreamEnd};

/// Bound on how long the producer blocks publishing the terminal chunk into a
/// full channel before giving up on a stalled consumer.
const TERMINAL_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Knobs for one stream's producer task.
#[derive(Debug, Clone, Copy)]
pub struct StreamOptions {
    /// Bound on the gap between consecutive provider frames.
    pub stall_timeout: Duration,
    /// Capacity of the chunk channel; a slow consumer backpressures the
    /// producer rather than buffering without bound.
    pub channel_capacity: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            stall_timeout: Duration::from_secs(60),
            channel_capacity: 32,
        }
    }
}

/// Timing anchor for one streaming call.
///
/// `started` is when the caller issued the request, `connected` is when the
/// stream opened. Every chunk's timing derives from these two instants, so
/// `total_time` is non-decreasing across the chunks of a stream.
pub(crate) struct StreamClock {
    started: Instant,
    connected: Instant,
}

impl StreamClock {
    pub(crate) fn new(started: Instant) -> Self {
        Self {
            started,
            connected: Instant::now(),
        }
    }

    fn timing(&self) -> PhaseTiming {
        let conn_time = self.connected.duration_since(self.started);
        let duration = self.connected.elapsed();
        PhaseTiming {
            conn_time,
            duration,
            total_time: conn_time + duration,
        }
    }
}

/// Consumer handle for one streaming call.
///
/// Dropping the handle cancels the producer task, which releases the
/// underlying connection.
#[derive(Debug)]
pub struct ChatStream {
    receiver: mpsc::Receiver<ChatStreamChunk>,
    cancel: CancellationToken,
}

impl ChatStream {
    /// Next chunk. `None` only after the terminal chunk has been consumed (or
    /// the producer observed cancellation before it could publish one).
    pub async fn recv(&mut self) -> Option<ChatStreamChunk> {
        self.receiver.recv().await
    }

    /// Cancel the stream. The producer publishes an interrupted terminal
    /// chunk and releases the connection.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for ChatStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawn the producer task for one stream and hand back the consumer side.
pub(crate) fn spawn_stream_worker<S>(
    provider_id: &'static str,
    codec: Arc<dyn ChatCodec>,
    source: S,
    clock: StreamClock,
    options: StreamOptions,
) -> ChatStream
where
    S: FrameSource + 'static,
{
    let (tx, rx) = mpsc::channel(options.channel_capacity.max(1));
    let cancel = CancellationToken::new();
    let worker_cancel = cancel.clone();

    tokio::spawn(async move {
        let mut source = source;
        let end = drive_stream(
            provider_id,
            codec.as_ref(),
            &mut source,
            &clock,
            options.stall_timeout,
            &tx,
            &worker_cancel,
        )
        .await;
        // Single release point, whatever path ended the loop.
        source.close();

        let Some(end) = end else {
            return;
        };
        let timing = clock.timing();
        match &end {
            StreamEnd::Eof => tracing::info!(
                provider = provider_id,
                conn_ms = timing.conn_time.as_millis() as u64,
                duration_ms = timing.duration.as_millis() as u64,
                total_ms = timing.total_time.as_millis() as u64,
                "chat completion stream finished"
            ),
            StreamEnd::Error(e) => tracing::warn!(
                provider = provider_id,
                total_ms = timing.total_time.as_millis() as u64,
                error = %e,
                "chat completion stream ended with error"
            ),
        }
        let terminal = ChatStreamChunk {
            timing,
            end: Some(end),
            ..Default::default()
        };
        if tx.send_timeout(terminal, TERMINAL_PUBLISH_TIMEOUT).await.is_err() {
            tracing::debug!(
                provider = provider_id,
                "consumer gone before terminal chunk could be delivered"
            );
        }
    });

    ChatStream {
        receiver: rx,
        cancel,
    }
}

/// Read-decode-publish loop. Returns the terminal sentinel to publish, or
/// `None` when the consumer dropped the receiver and no sentinel is owed.
async fn drive_stream(
    provider_id: &'static str,
    codec: &dyn ChatCodec,
    source: &mut dyn FrameSource,
    clock: &StreamClock,
    stall_timeout: Duration,
    tx: &mpsc::Sender<ChatStreamChunk>,
    cancel: &CancellationToken,
) -> Option<StreamEnd> {
    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Some(StreamEnd::Error(LlmError::StreamInterrupted(
                    "stream canceled".to_string(),
                )));
            }
            read = tokio::time::timeout(stall_timeout, source.recv()) => match read {
                Err(_) => {
                    return Some(StreamEnd::Error(LlmError::StreamInterrupted(format!(
                        "no frame received within {}ms",
                        stall_timeout.as_millis()
                    ))));
                }
                Ok(Err(e)) => return Some(StreamEnd::Error(e)),
                // Connection closed without an explicit done marker; treat as
                // clean end of stream.
                Ok(Ok(None)) => return Some(StreamEnd::Eof),
                Ok(Ok(Some(frame))) => frame,
            },
        };

        match codec.decode_chunk(&frame) {
            Ok(StreamFrame::Delta(delta)) => {
                let chunk = ChatStreamChunk {
                    model: delta.model,
                    content: delta.content,
                    reasoning: delta.reasoning,
                    usage: delta.usage,
                    finish_reason: delta.finish_reason,
                    timing: clock.timing(),
                    end: None,
                };
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return Some(StreamEnd::Error(LlmError::StreamInterrupted(
                            "stream canceled".to_string(),
                        )));
                    }
                    sent = tx.send(chunk) => {
                        if sent.is_err() {
                            tracing::debug!(provider = provider_id, "consumer dropped mid-stream");
                            return None;
                        }
                    }
                }
            }
            Ok(StreamFrame::Ignore) => {}
            Ok(StreamFrame::Done) => return Some(StreamEnd::Eof),
            Err(e) => return Some(StreamEnd::Error(e)),
        }
    }
}
