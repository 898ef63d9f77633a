//! WebSocket stream renderer.
//!
//! Dials the stream endpoint, reads binary chunks, and feeds them to a
//! [`FrameSink`]. Reports through the [`RenderCallbacks`] given at
//! creation:
//!
//! - first chunk the sink reports playable: `first_frame`
//! - no playable chunk within `stall_timeout`: `stall` (control and
//!   text frames do not count)
//! - refused, reset, closed or `{"error": ...}` from the server: transport failure
//! - oversized chunk or sink rejection: decode failure
//!
//! Exactly one terminal report (stall or failure) is emitted per handle,
//! after which the read task exits. Reconnecting is the owner's job.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;

use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::render::{RenderCallbacks, RenderFailure, RenderHandle, RenderOptions, Renderer};

// ── Frame sinks ──────────────────────────────────────────────────────

/// Consumer of raw stream chunks.
pub trait FrameSink: Send {
    /// Feed one chunk.
    ///
    /// `Ok(true)` means the chunk completed something displayable.
    /// `Err` is fatal for this attempt.
    fn push(&mut self, chunk: Bytes) -> Result<bool, String>;
}

/// Sink that drops every chunk and counts the bytes.
///
/// Every non-empty chunk counts as playable.
#[derive(Debug, Clone, Default)]
pub struct DiscardSink {
    received: Arc<AtomicU64>,
}

impl DiscardSink {
    pub fn new(received: Arc<AtomicU64>) -> Self {
        Self { received }
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}

impl FrameSink for DiscardSink {
    fn push(&mut self, chunk: Bytes) -> Result<bool, String> {
        let len = u64::try_from(chunk.len()).unwrap_or(u64::MAX);
        self.received.fetch_add(len, Ordering::Relaxed);
        Ok(!chunk.is_empty())
    }
}

type SinkFactory = dyn Fn() -> Box<dyn FrameSink> + Send + Sync;

// ── Renderer ─────────────────────────────────────────────────────────

/// [`Renderer`] that reads the stream over a WebSocket.
#[derive(Clone)]
pub struct WebSocketRenderer {
    make_sink: Arc<SinkFactory>,
}

impl WebSocketRenderer {
    /// A renderer that builds a fresh sink for every attempt.
    pub fn new<F>(make_sink: F) -> Self
    where
        F: Fn() -> Box<dyn FrameSink> + Send + Sync + 'static,
    {
        Self {
            make_sink: Arc::new(make_sink),
        }
    }

    /// A renderer that discards frames, accumulating byte totals in `received`.
    pub fn discarding(received: Arc<AtomicU64>) -> Self {
        Self::new(move || Box::new(DiscardSink::new(Arc::clone(&received))))
    }
}

impl std::fmt::Debug for WebSocketRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketRenderer").finish_non_exhaustive()
    }
}

impl Renderer for WebSocketRenderer {
    fn create(
        &self,
        endpoint: &Endpoint,
        options: RenderOptions,
    ) -> Result<Box<dyn RenderHandle>, Error> {
        let uri: tungstenite::http::Uri = endpoint
            .connect_url()
            .as_str()
            .parse()
            .map_err(|e: tungstenite::http::uri::InvalidUri| Error::InvalidEndpoint {
                message: e.to_string(),
            })?;

        let mut request = ClientRequestBuilder::new(uri);
        if let Some(value) = endpoint.authorization() {
            request = request.with_header("Authorization", value);
        }

        let cancel = CancellationToken::new();
        let sink = (self.make_sink)();
        let label = endpoint.to_string();
        let task = tokio::spawn(pump(label, request, options, sink, cancel.clone()));

        Ok(Box::new(WebSocketHandle {
            cancel,
            task: Some(task),
        }))
    }
}

// ── Handle ───────────────────────────────────────────────────────────

struct WebSocketHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

#[async_trait]
impl RenderHandle for WebSocketHandle {
    async fn destroy(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::debug!(error = %e, "render task ended abnormally");
            }
        }
    }
}

impl Drop for WebSocketHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Read loop ────────────────────────────────────────────────────────

enum StreamEnd {
    Stalled,
    Failed(RenderFailure),
}

async fn pump(
    label: String,
    request: ClientRequestBuilder,
    options: RenderOptions,
    mut sink: Box<dyn FrameSink>,
    cancel: CancellationToken,
) {
    let callbacks = options.callbacks.clone();
    let end = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            tracing::debug!(endpoint = %label, "render task cancelled");
            return;
        }
        end = connect_and_read(&label, request, &options, sink.as_mut(), &callbacks) => end,
    };

    match end {
        StreamEnd::Stalled => callbacks.on_stall(),
        StreamEnd::Failed(failure) => callbacks.on_error(failure),
    }
}

async fn connect_and_read(
    label: &str,
    request: ClientRequestBuilder,
    options: &RenderOptions,
    sink: &mut dyn FrameSink,
    callbacks: &RenderCallbacks,
) -> StreamEnd {
    tracing::info!(endpoint = %label, attempt = %callbacks.attempt(), "connecting to stream");

    let connect = tokio_tungstenite::connect_async(request);
    let ws_stream = match tokio::time::timeout(options.connect_timeout, connect).await {
        Ok(Ok((ws_stream, _response))) => ws_stream,
        Ok(Err(e)) => return StreamEnd::Failed(RenderFailure::Transport(e.to_string())),
        Err(_) => {
            return StreamEnd::Failed(RenderFailure::Transport(format!(
                "connect timed out after {}ms",
                options.connect_timeout.as_millis()
            )));
        }
    };

    tracing::info!(endpoint = %label, "stream connected");

    let (_write, mut read) = ws_stream.split();
    let mut playing = false;
    // Only playable chunks push the deadline out.
    let mut deadline = Instant::now() + options.stall_timeout;

    loop {
        let Ok(frame) = tokio::time::timeout_at(deadline, read.next()).await else {
            tracing::warn!(
                endpoint = %label,
                timeout = ?options.stall_timeout,
                "no stream data within stall timeout"
            );
            return StreamEnd::Stalled;
        };

        match frame {
            Some(Ok(tungstenite::Message::Binary(chunk))) => {
                if chunk.len() > options.buffer_size {
                    return StreamEnd::Failed(RenderFailure::Decode(format!(
                        "chunk of {} bytes exceeds {} byte buffer",
                        chunk.len(),
                        options.buffer_size
                    )));
                }
                match sink.push(chunk) {
                    Ok(true) => {
                        deadline = Instant::now() + options.stall_timeout;
                        if !playing {
                            playing = true;
                            callbacks.on_first_frame();
                        }
                    }
                    Ok(false) => {}
                    Err(reason) => return StreamEnd::Failed(RenderFailure::Decode(reason)),
                }
            }
            Some(Ok(tungstenite::Message::Text(text))) => {
                if let Some(message) = server_error(&text) {
                    tracing::warn!(endpoint = %label, error = %message, "stream server reported error");
                    return StreamEnd::Failed(RenderFailure::Transport(message));
                }
                tracing::trace!(endpoint = %label, "ignoring text frame");
            }
            Some(Ok(tungstenite::Message::Close(frame))) => {
                let reason = match frame {
                    Some(cf) => format!("closed by server (code {}): {}", cf.code, cf.reason),
                    None => "closed by server".to_owned(),
                };
                tracing::info!(endpoint = %label, %reason, "stream closed");
                return StreamEnd::Failed(RenderFailure::Transport(reason));
            }
            Some(Err(e)) => return StreamEnd::Failed(RenderFailure::Transport(e.to_string())),
            None => {
                tracing::info!(endpoint = %label, "stream ended");
                return StreamEnd::Failed(RenderFailure::Transport("stream ended".to_owned()));
            }
            _ => {
                // Ping, Pong, Frame -- tungstenite answers pings itself
            }
        }
    }
}

/// Error envelope the stream server sends before hanging up.
#[derive(Debug, Deserialize)]
struct ServerError {
    error: String,
}

fn server_error(text: &str) -> Option<String> {
    serde_json::from_str::<ServerError>(text)
        .ok()
        .map(|e| e.error)
}
