// ── Stream session ──
//
// One camera, one live connection at a time. All transitions happen on
// the owner's task: renderer callbacks arrive as queued `RenderEvent`s
// and are applied through `handle_event`; reconnect timers are exposed
// as a deadline the owner sleeps on before calling `resume`.
//
// Every connection attempt gets a fresh generation. Leaving an attempt
// (failure, close) bumps it again, so anything the old renderer still
// manages to report is recognised as stale and dropped.

pub mod backoff;
mod state;

use std::sync::Arc;

use camwatch_api::{
    AttemptToken, Endpoint, EndpointFactory, RenderCallbacks, RenderEvent, RenderFailure,
    RenderHandle, RenderOptions, RenderSignal, Renderer,
};
use chrono::Utc;
use secrecy::SecretString;
use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::model::CameraRef;

pub use state::{SessionState, SessionStatus};

/// What a session needs from its owner, shared across sessions.
#[derive(Clone)]
pub struct SessionContext {
    pub renderer: Arc<dyn Renderer>,
    pub endpoints: EndpointFactory,
    pub events: mpsc::UnboundedSender<RenderEvent>,
    pub config: SessionConfig,
}

pub struct StreamSession {
    id: Uuid,
    camera: CameraRef,
    state: SessionState,
    reconnect_attempt: u32,
    decode_failures: u32,
    last_error: Option<SessionError>,
    generation: u64,
    token: Option<SecretString>,
    endpoint: Option<Endpoint>,
    handle: Option<Box<dyn RenderHandle>>,
    retry_at: Option<Instant>,
    context: SessionContext,
}

impl StreamSession {
    pub fn new(camera: CameraRef, context: SessionContext) -> Self {
        Self {
            id: Uuid::new_v4(),
            camera,
            state: SessionState::Idle,
            reconnect_attempt: 0,
            decode_failures: 0,
            last_error: None,
            generation: 0,
            token: None,
            endpoint: None,
            handle: None,
            retry_at: None,
            context,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn camera(&self) -> &CameraRef {
        &self.camera
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn reconnect_attempt(&self) -> u32 {
        self.reconnect_attempt
    }

    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    /// Endpoint of the current or most recent attempt.
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    /// Identity of the current attempt.
    pub fn attempt(&self) -> AttemptToken {
        AttemptToken {
            session: self.id,
            generation: self.generation,
        }
    }

    /// When the pending reconnect is due, while `Reconnecting`.
    pub fn retry_deadline(&self) -> Option<Instant> {
        self.retry_at
    }

    pub fn has_resources(&self) -> bool {
        self.handle.is_some()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            camera: Some(self.camera.clone()),
            state: self.state,
            reconnect_attempt: self.reconnect_attempt,
            last_error: self.last_error.clone(),
            retry_in: self
                .retry_at
                .map(|at| at.saturating_duration_since(Instant::now())),
            changed_at: Utc::now(),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start streaming with `token`.
    ///
    /// Without a token nothing is dialled: the session stays `Idle` and
    /// records [`SessionError::AuthUnavailable`]. Calling `open` on a
    /// session that is already running restarts it.
    pub async fn open(&mut self, token: Option<SecretString>) -> Result<(), SessionError> {
        if self.state.is_live() {
            self.release().await;
        }
        self.reconnect_attempt = 0;
        self.decode_failures = 0;
        self.last_error = None;

        let Some(token) = token else {
            tracing::warn!(camera = %self.camera, session = %self.id, "no bearer token, not connecting");
            self.last_error = Some(SessionError::AuthUnavailable);
            self.set_state(SessionState::Idle);
            return Err(SessionError::AuthUnavailable);
        };

        self.token = Some(token);
        self.connect().await;
        Ok(())
    }

    /// Token for subsequent attempts. The running attempt is not disturbed.
    pub fn renew_token(&mut self, token: SecretString) {
        tracing::debug!(camera = %self.camera, session = %self.id, "token updated for next attempt");
        self.token = Some(token);
    }

    /// Run the scheduled reconnect. Returns `false` when none is pending.
    pub async fn resume(&mut self) -> bool {
        if self.state != SessionState::Reconnecting {
            return false;
        }
        self.connect().await;
        true
    }

    /// Apply one renderer report. Returns whether it changed anything.
    pub async fn handle_event(&mut self, event: RenderEvent) -> bool {
        if event.attempt != self.attempt() {
            tracing::debug!(
                camera = %self.camera,
                session = %self.id,
                event_attempt = %event.attempt,
                current = self.generation,
                "discarding stale render event"
            );
            return false;
        }

        match (self.state, event.signal) {
            (SessionState::Connecting, RenderSignal::FirstFrame) => {
                self.reconnect_attempt = 0;
                self.last_error = None;
                self.set_state(SessionState::Playing);
            }
            (SessionState::Connecting, RenderSignal::Stall) => {
                self.retry(SessionError::ConnectFailed {
                    reason: "no data before first frame".into(),
                })
                .await;
            }
            (SessionState::Connecting, RenderSignal::Failed(RenderFailure::Transport(reason))) => {
                self.retry(SessionError::ConnectFailed { reason }).await;
            }
            (SessionState::Playing, RenderSignal::Stall) => {
                self.set_state(SessionState::Stalled);
                self.retry(SessionError::StallTimeout).await;
            }
            (SessionState::Playing, RenderSignal::Failed(RenderFailure::Transport(reason))) => {
                tracing::warn!(camera = %self.camera, %reason, "transport lost while playing");
                self.set_state(SessionState::Stalled);
                self.retry(SessionError::StallTimeout).await;
            }
            (
                SessionState::Connecting | SessionState::Playing,
                RenderSignal::Failed(RenderFailure::Decode(reason)),
            ) => {
                self.retry(SessionError::DecodeError { reason }).await;
            }
            (state, signal) => {
                tracing::debug!(camera = %self.camera, %state, ?signal, "render event ignored in this state");
                return false;
            }
        }
        true
    }

    /// Tear down. Idempotent; a failed session stays `Failed`.
    ///
    /// On return no renderer resources remain and no callback from any
    /// earlier attempt will be applied.
    pub async fn close(&mut self) {
        match self.state {
            SessionState::Closed => {
                tracing::trace!(camera = %self.camera, "close on closed session");
            }
            SessionState::Failed => self.release().await,
            _ => {
                self.release().await;
                self.set_state(SessionState::Closed);
            }
        }
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn connect(&mut self) {
        let Some(token) = self.token.clone() else {
            self.last_error = Some(SessionError::AuthUnavailable);
            self.set_state(SessionState::Idle);
            return;
        };

        self.generation += 1;
        self.retry_at = None;
        let endpoint = self
            .context
            .endpoints
            .build(self.camera.camera.as_str(), &token);
        self.set_state(SessionState::Connecting);

        let options = RenderOptions {
            buffer_size: self.context.config.buffer_size,
            stall_timeout: self.context.config.stall_timeout,
            connect_timeout: self.context.config.connect_timeout,
            callbacks: RenderCallbacks::new(self.attempt(), self.context.events.clone()),
        };
        tracing::info!(
            camera = %self.camera,
            session = %self.id,
            generation = self.generation,
            endpoint = %endpoint,
            "opening stream"
        );

        let created = self.context.renderer.create(&endpoint, options);
        self.endpoint = Some(endpoint);
        match created {
            Ok(handle) => self.handle = Some(handle),
            Err(e) => {
                self.retry(SessionError::ConnectFailed {
                    reason: e.to_string(),
                })
                .await;
            }
        }
    }

    /// Abandon the current attempt and either schedule another or give up.
    async fn retry(&mut self, cause: SessionError) {
        self.release().await;
        self.set_state(SessionState::Reconnecting);

        if matches!(cause, SessionError::DecodeError { .. }) {
            self.decode_failures += 1;
        } else {
            self.decode_failures = 0;
        }
        self.reconnect_attempt += 1;

        let config = &self.context.config;
        let exhausted = self.reconnect_attempt > config.max_attempts
            || self.decode_failures >= config.max_decode_failures;
        if exhausted {
            tracing::error!(
                camera = %self.camera,
                session = %self.id,
                attempt = self.reconnect_attempt,
                error = %cause,
                "giving up on stream"
            );
            self.last_error = Some(SessionError::MaxRetriesExceeded {
                attempts: self.reconnect_attempt,
                cause: Box::new(cause),
            });
            self.set_state(SessionState::Failed);
            return;
        }

        let delay = backoff::delay_for(self.reconnect_attempt, &config.backoff);
        tracing::info!(
            camera = %self.camera,
            session = %self.id,
            attempt = self.reconnect_attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %cause,
            "reconnect scheduled"
        );
        self.last_error = Some(cause);
        self.retry_at = Some(Instant::now() + delay);
    }

    /// Invalidate the current attempt and destroy its renderer.
    async fn release(&mut self) {
        self.generation += 1;
        self.retry_at = None;
        if let Some(mut handle) = self.handle.take() {
            handle.destroy().await;
            tracing::debug!(camera = %self.camera, session = %self.id, "renderer destroyed");
        }
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state != next {
            tracing::info!(
                camera = %self.camera,
                session = %self.id,
                from = %self.state,
                state = %next,
                "session state changed"
            );
            self.state = next;
        }
    }
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("id", &self.id)
            .field("camera", &self.camera)
            .field("state", &self.state)
            .field("reconnect_attempt", &self.reconnect_attempt)
            .field("generation", &self.generation)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}
