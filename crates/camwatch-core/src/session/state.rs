// ── Session state ────────────────────────────────────────────────────

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::SessionError;
use crate::model::CameraRef;

/// Lifecycle of one stream session.
///
/// ```text
/// Idle → Connecting → Playing → Stalled → Reconnecting → Connecting …
///        Connecting → Reconnecting
///                                         Reconnecting → Failed
/// any (except Closed/Failed) → Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Connecting,
    Playing,
    Stalled,
    Reconnecting,
    Closed,
    Failed,
}

impl SessionState {
    /// Holding, or about to hold, transport resources.
    pub fn is_live(self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::Playing | Self::Stalled | Self::Reconnecting
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

/// Observable snapshot of the coordinator's session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub camera: Option<CameraRef>,
    pub state: SessionState,
    pub reconnect_attempt: u32,
    #[serde(serialize_with = "serialize_error")]
    pub last_error: Option<SessionError>,
    /// Time until the next connection attempt, while reconnecting.
    pub retry_in: Option<Duration>,
    pub changed_at: DateTime<Utc>,
}

impl SessionStatus {
    pub fn idle() -> Self {
        Self {
            camera: None,
            state: SessionState::Idle,
            reconnect_attempt: 0,
            last_error: None,
            retry_in: None,
            changed_at: Utc::now(),
        }
    }

    /// The error worth showing the operator, if any.
    pub fn durable_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref().filter(|e| e.is_durable())
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::idle()
    }
}

#[allow(clippy::ref_option)]
fn serialize_error<S: serde::Serializer>(
    error: &Option<SessionError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}
