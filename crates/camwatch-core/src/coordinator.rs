// ── Session coordinator ──
//
// Guarantees at most one live `StreamSession`. On every selection change
// the old session is closed, and its renderer destroyed, before a new
// one is opened. Token and catalog changes feed in here too, and the
// current `SessionStatus` is published on a watch channel.

use std::sync::Arc;

use camwatch_api::{EndpointFactory, RenderEvent, Renderer};
use secrecy::SecretString;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::catalog::{Catalog, CatalogTree};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::model::CameraRef;
use crate::selection::{Selection, SelectionChange, SelectionEvents};
use crate::session::{SessionContext, SessionState, SessionStatus, StreamSession};
use crate::token::TokenSource;

pub struct SessionCoordinator {
    catalog: Arc<Catalog>,
    tokens: Arc<dyn TokenSource>,
    context: SessionContext,
    events: mpsc::UnboundedReceiver<RenderEvent>,
    session: Option<StreamSession>,
    selection: Selection,
    status: watch::Sender<SessionStatus>,
}

impl SessionCoordinator {
    pub fn new(
        catalog: Arc<Catalog>,
        tokens: Arc<dyn TokenSource>,
        renderer: Arc<dyn Renderer>,
        endpoints: EndpointFactory,
        config: SessionConfig,
    ) -> Self {
        let (events_tx, events) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(SessionStatus::idle());
        Self {
            catalog,
            tokens,
            context: SessionContext {
                renderer,
                endpoints,
                events: events_tx,
                config,
            },
            events,
            session: None,
            selection: Selection::None,
            status,
        }
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn current_status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn session(&self) -> Option<&StreamSession> {
        self.session.as_ref()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn retry_deadline(&self) -> Option<Instant> {
        self.session.as_ref().and_then(StreamSession::retry_deadline)
    }

    // ── Inputs ───────────────────────────────────────────────────────

    pub async fn on_selection_changed(&mut self, change: SelectionChange) {
        tracing::debug!(from = ?change.previous, to = ?change.selection, "selection changed");
        self.selection = change.selection;
        self.teardown().await;
        if let Selection::Camera(camera) = self.selection.clone() {
            self.open_for(camera).await;
        }
        self.publish();
    }

    /// Renewal opens a session if a camera is waiting for one; revocation
    /// closes whatever is running.
    pub async fn on_token_changed(&mut self, token: Option<SecretString>) {
        match token {
            None => {
                if self.session.is_some() {
                    tracing::info!("token revoked, closing session");
                }
                self.teardown().await;
            }
            Some(token) => {
                let waiting = self
                    .session
                    .as_ref()
                    .is_none_or(|s| s.state() == SessionState::Idle);
                if waiting {
                    if let Selection::Camera(camera) = self.selection.clone() {
                        self.teardown().await;
                        self.open_for(camera).await;
                    }
                } else if let Some(session) = self.session.as_mut() {
                    session.renew_token(token);
                }
            }
        }
        self.publish();
    }

    /// Close the session if its camera disappeared from the catalog.
    pub async fn on_catalog_changed(&mut self, tree: &CatalogTree) {
        let Some(camera) = self.selection.camera() else {
            return;
        };
        if tree.camera(camera).is_some() {
            return;
        }
        tracing::info!(camera = %camera, "selected camera removed from catalog");
        self.selection = Selection::None;
        self.teardown().await;
        self.publish();
    }

    /// Route one renderer report to the session it belongs to.
    pub async fn dispatch(&mut self, event: RenderEvent) -> bool {
        let Some(session) = self.session.as_mut() else {
            tracing::debug!(attempt = %event.attempt, "no session, discarding render event");
            return false;
        };
        let applied = session.handle_event(event).await;
        if applied {
            self.publish();
        }
        applied
    }

    /// Apply every report already queued. Returns how many were applied.
    pub async fn pump_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events.try_recv() {
            if self.dispatch(event).await {
                applied += 1;
            }
        }
        applied
    }

    /// Run the pending reconnect if its deadline has passed.
    pub async fn resume_due(&mut self) -> bool {
        let due = self
            .retry_deadline()
            .is_some_and(|deadline| deadline <= Instant::now());
        if !due {
            return false;
        }
        let resumed = match self.session.as_mut() {
            Some(session) => session.resume().await,
            None => false,
        };
        self.publish();
        resumed
    }

    /// Close the session. The last published status is its `closed` snapshot.
    pub async fn shutdown(&mut self) {
        self.teardown().await;
    }

    /// Drive the coordinator until `cancel` fires or the selection source
    /// goes away, then shut the session down.
    pub async fn run(mut self, mut selections: SelectionEvents, cancel: CancellationToken) {
        let mut tokens = self.tokens.subscribe();
        let mut catalog = self.catalog.subscribe();

        loop {
            let deadline = self.retry_deadline();
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                change = selections.recv() => match change {
                    Some(change) => self.on_selection_changed(change).await,
                    None => break,
                },
                Ok(()) = tokens.changed() => {
                    let token = tokens.borrow_and_update().clone();
                    self.on_token_changed(token).await;
                }
                Some(tree) = catalog.changed() => self.on_catalog_changed(&tree).await,
                Some(event) = self.events.recv() => {
                    self.dispatch(event).await;
                }
                () = sleep_until(deadline) => {
                    self.resume_due().await;
                }
            }
        }

        tracing::debug!("coordinator loop exiting");
        self.shutdown().await;
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn open_for(&mut self, camera: CameraRef) {
        if self.catalog.snapshot().camera(&camera).is_none() {
            tracing::warn!(camera = %camera, "selected camera not in catalog");
            self.selection = Selection::None;
            return;
        }
        let mut session = StreamSession::new(camera, self.context.clone());
        if let Err(SessionError::AuthUnavailable) = session.open(self.tokens.token()).await {
            tracing::warn!(camera = %session.camera(), "waiting for a bearer token");
        }
        self.session = Some(session);
    }

    /// Close and drop the current session, publishing its final status.
    async fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
            self.status.send_replace(session.status());
        }
    }

    fn publish(&self) {
        let status = match &self.session {
            Some(session) => session.status(),
            // A selected camera without a session is waiting for a token.
            None => {
                let camera = self.selection.camera().cloned();
                SessionStatus {
                    last_error: camera.as_ref().map(|_| SessionError::AuthUnavailable),
                    camera,
                    ..SessionStatus::idle()
                }
            }
        };
        self.status.send_replace(status);
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
