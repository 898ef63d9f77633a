// ── Runtime configuration ──
//
// In-memory settings for sessions and endpoints. Never touches disk.
// `camwatch-config` builds these from the TOML file and environment.

use std::time::Duration;

use camwatch_api::{CredentialPlacement, DEFAULT_STREAM_PATH, EndpointFactory, RenderOptions};
use url::Url;

use crate::error::CoreError;

/// Reconnect delay curve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Reconnects allowed before the session fails.
    pub max_attempts: u32,
    /// Consecutive decode failures that fail the session outright.
    pub max_decode_failures: u32,
    pub backoff: BackoffConfig,
    pub stall_timeout: Duration,
    pub connect_timeout: Duration,
    /// Renderer buffer size in bytes.
    pub buffer_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            max_decode_failures: 3,
            backoff: BackoffConfig::default(),
            stall_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            buffer_size: RenderOptions::DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Where the stream server lives.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub base_url: Url,
    pub stream_path: String,
    pub credentials: CredentialPlacement,
}

impl EndpointConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            stream_path: DEFAULT_STREAM_PATH.to_owned(),
            credentials: CredentialPlacement::default(),
        }
    }

    pub fn factory(&self) -> Result<EndpointFactory, CoreError> {
        Ok(EndpointFactory::new(
            &self.base_url,
            self.stream_path.clone(),
            self.credentials,
        )?)
    }
}
