//! The rendering capability.
//!
//! A [`Renderer`] turns an [`Endpoint`] into a live [`RenderHandle`].
//! Whatever it does internally, it reports back through the
//! [`RenderCallbacks`] it was handed: the first decoded frame, a stall,
//! or a failure. Every report carries the [`AttemptToken`] of the
//! attempt that produced it so the owner can drop reports from attempts
//! it has already abandoned.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::endpoint::Endpoint;
use crate::error::Error;

/// Identifies one connection attempt of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttemptToken {
    pub session: Uuid,
    pub generation: u64,
}

impl fmt::Display for AttemptToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.session, self.generation)
    }
}

/// What went wrong inside a renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderFailure {
    /// Transport failed: refused, reset, closed, or rejected by the server.
    Transport(String),
    /// Bytes arrived but could not be decoded.
    Decode(String),
}

impl fmt::Display for RenderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(reason) => write!(f, "transport: {reason}"),
            Self::Decode(reason) => write!(f, "decode: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderSignal {
    FirstFrame,
    Stall,
    Failed(RenderFailure),
}

/// A signal tagged with the attempt it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderEvent {
    pub attempt: AttemptToken,
    pub signal: RenderSignal,
}

/// Sender side of the event queue, bound to a single attempt.
#[derive(Debug, Clone)]
pub struct RenderCallbacks {
    attempt: AttemptToken,
    tx: mpsc::UnboundedSender<RenderEvent>,
}

impl RenderCallbacks {
    pub fn new(attempt: AttemptToken, tx: mpsc::UnboundedSender<RenderEvent>) -> Self {
        Self { attempt, tx }
    }

    pub fn attempt(&self) -> AttemptToken {
        self.attempt
    }

    pub fn on_first_frame(&self) {
        self.emit(RenderSignal::FirstFrame);
    }

    pub fn on_stall(&self) {
        self.emit(RenderSignal::Stall);
    }

    pub fn on_error(&self, failure: RenderFailure) {
        self.emit(RenderSignal::Failed(failure));
    }

    fn emit(&self, signal: RenderSignal) {
        // A closed queue means the owner is gone; nobody is left to tell.
        let _ = self.tx.send(RenderEvent {
            attempt: self.attempt,
            signal,
        });
    }
}

/// Options handed to [`Renderer::create`].
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Largest chunk the decoder accepts, in bytes.
    pub buffer_size: usize,
    /// How long the stream may go without data before it counts as stalled.
    pub stall_timeout: Duration,
    /// Upper bound on establishing the transport.
    pub connect_timeout: Duration,
    pub callbacks: RenderCallbacks,
}

impl RenderOptions {
    /// 1 MiB, enough for a keyframe at typical CCTV bitrates.
    pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;
}

/// Something that can start rendering a stream.
pub trait Renderer: Send + Sync {
    /// Start rendering `endpoint`.
    ///
    /// Returning `Err` means no handle exists and no callback will ever
    /// fire for this attempt.
    fn create(
        &self,
        endpoint: &Endpoint,
        options: RenderOptions,
    ) -> Result<Box<dyn RenderHandle>, Error>;
}

/// A live renderer instance.
#[async_trait]
pub trait RenderHandle: Send {
    /// Release everything: transport, decoder, callbacks.
    ///
    /// Once this returns no further callback fires. Calling it again is
    /// a no-op.
    async fn destroy(&mut self);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn callbacks_tag_events_with_their_attempt() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let attempt = AttemptToken {
            session: Uuid::new_v4(),
            generation: 3,
        };
        let callbacks = RenderCallbacks::new(attempt, tx);

        callbacks.on_first_frame();
        callbacks.on_error(RenderFailure::Decode("bad header".into()));

        let first = rx.try_recv().unwrap();
        assert_eq!(first.attempt, attempt);
        assert_eq!(first.signal, RenderSignal::FirstFrame);
        let second = rx.try_recv().unwrap();
        assert_eq!(
            second.signal,
            RenderSignal::Failed(RenderFailure::Decode("bad header".into()))
        );
    }

    #[test]
    fn emitting_after_owner_dropped_is_silent() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let callbacks = RenderCallbacks::new(
            AttemptToken {
                session: Uuid::nil(),
                generation: 1,
            },
            tx,
        );
        callbacks.on_stall();
    }
}
