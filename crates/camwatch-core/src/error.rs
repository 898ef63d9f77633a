// ── Core error types ──
//
// `CoreError` covers catalog and configuration problems a caller can act
// on. `SessionError` is the per-session failure record: it is cloned into
// status snapshots and never crosses an `await` as a `Result`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // ── Catalog lookups ──────────────────────────────────────────────
    #[error("Building not found: {id}")]
    BuildingNotFound { id: String },

    #[error("Floor not found: {floor} in building {building}")]
    FloorNotFound { building: String, floor: String },

    #[error("Camera not found: {camera}")]
    CameraNotFound { camera: String },

    // ── Catalog integrity ────────────────────────────────────────────
    #[error("Inconsistent catalog: {message}")]
    InconsistentCatalog { message: String },

    #[error("Cannot load catalog from {path}: {reason}")]
    CatalogLoad { path: String, reason: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Configuration / transport ────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Stream transport error: {message}")]
    Transport { message: String },
}

impl From<camwatch_api::Error> for CoreError {
    fn from(err: camwatch_api::Error) -> Self {
        match err {
            camwatch_api::Error::InvalidUrl(_)
            | camwatch_api::Error::UnsupportedScheme { .. }
            | camwatch_api::Error::InvalidEndpoint { .. } => CoreError::Config {
                message: err.to_string(),
            },
            camwatch_api::Error::RendererUnavailable { .. } => CoreError::Transport {
                message: err.to_string(),
            },
        }
    }
}

/// Why a stream session is not playing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("No bearer token available")]
    AuthUnavailable,

    #[error("Connection failed: {reason}")]
    ConnectFailed { reason: String },

    #[error("Stream stalled")]
    StallTimeout,

    #[error("Decoder failed: {reason}")]
    DecodeError { reason: String },

    #[error("Gave up after {attempts} failed attempts: {cause}")]
    MaxRetriesExceeded {
        attempts: u32,
        cause: Box<SessionError>,
    },
}

impl SessionError {
    /// Whether the session schedules another attempt after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailed { .. } | Self::StallTimeout | Self::DecodeError { .. }
        )
    }

    /// Whether this error is terminal and should stay visible to the user.
    pub fn is_durable(&self) -> bool {
        matches!(self, Self::AuthUnavailable | Self::MaxRetriesExceeded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_and_durable_are_disjoint() {
        let all = [
            SessionError::AuthUnavailable,
            SessionError::ConnectFailed {
                reason: "refused".into(),
            },
            SessionError::StallTimeout,
            SessionError::DecodeError {
                reason: "bad".into(),
            },
            SessionError::MaxRetriesExceeded {
                attempts: 6,
                cause: Box::new(SessionError::StallTimeout),
            },
        ];
        for err in &all {
            assert_ne!(err.is_retryable(), err.is_durable(), "{err}");
        }
    }

    #[test]
    fn max_retries_message_names_cause() {
        let err = SessionError::MaxRetriesExceeded {
            attempts: 6,
            cause: Box::new(SessionError::ConnectFailed {
                reason: "connection refused".into(),
            }),
        };
        assert_eq!(
            err.to_string(),
            "Gave up after 6 failed attempts: Connection failed: connection refused"
        );
    }

    #[test]
    fn api_endpoint_errors_become_config_errors() {
        let api = camwatch_api::Error::UnsupportedScheme {
            scheme: "ftp".into(),
        };
        assert!(matches!(CoreError::from(api), CoreError::Config { .. }));
    }
}
