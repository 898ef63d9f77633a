//! Configuration for the camwatch CLI.
//!
//! TOML file + `CAMWATCH_` environment, bearer-token resolution
//! (env var → keyring → plaintext), and translation to the runtime
//! types in `camwatch_core`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use camwatch_api::{CredentialPlacement, DEFAULT_STREAM_PATH, RenderOptions};
use camwatch_core::{BackoffConfig, EndpointConfig, SessionConfig};
use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const KEYRING_SERVICE: &str = "camwatch";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no bearer token configured for profile '{profile}'")]
    NoToken { profile: String },

    #[error("no stream server configured")]
    NoServer,

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<keyring::Error> for ConfigError {
    fn from(err: keyring::Error) -> Self {
        Self::Keyring(err.to_string())
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Name the keyring token is stored under.
    pub profile: Option<String>,
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub session: SessionSettings,
    pub catalog: CatalogSettings,
    pub defaults: Defaults,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Stream server base URL (e.g. "https://nvr.local").
    pub base_url: Option<String>,
    pub stream_path: String,
    /// "query" or "header".
    pub credentials: CredentialPlacement,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            stream_path: DEFAULT_STREAM_PATH.into(),
            credentials: CredentialPlacement::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Bearer token (plaintext -- prefer keyring or env var).
    pub token: Option<String>,
    /// Environment variable holding the bearer token.
    pub token_env: Option<String>,
    /// Consult the system keyring.
    pub keyring: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            token: None,
            token_env: None,
            keyring: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionSettings {
    pub max_attempts: u32,
    pub max_decode_failures: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub stall_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub buffer_size: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            max_decode_failures: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 10_000,
            stall_timeout_secs: 5,
            connect_timeout_secs: 5,
            buffer_size: RenderOptions::DEFAULT_BUFFER_SIZE,
        }
    }
}

impl SessionSettings {
    pub fn to_session_config(&self) -> Result<SessionConfig, ConfigError> {
        if self.max_decode_failures == 0 {
            return Err(validation("session.max_decode_failures", "must be at least 1"));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(validation(
                "session.initial_backoff_ms",
                "must not exceed session.max_backoff_ms",
            ));
        }
        if self.stall_timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(validation("session", "timeouts must be positive"));
        }
        if self.buffer_size == 0 {
            return Err(validation("session.buffer_size", "must be positive"));
        }

        Ok(SessionConfig {
            max_attempts: self.max_attempts,
            max_decode_failures: self.max_decode_failures,
            backoff: BackoffConfig {
                initial_delay: Duration::from_millis(self.initial_backoff_ms),
                max_delay: Duration::from_millis(self.max_backoff_ms),
            },
            stall_timeout: Duration::from_secs(self.stall_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            buffer_size: self.buffer_size,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// JSON seed file: an array of buildings.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Defaults {
    pub output: String,
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: "table".into(),
            color: "auto".into(),
        }
    }
}

impl Config {
    pub fn profile_name(&self) -> &str {
        self.profile.as_deref().unwrap_or("default")
    }

    pub fn endpoint_config(&self) -> Result<EndpointConfig, ConfigError> {
        let raw = self.server.base_url.as_deref().ok_or(ConfigError::NoServer)?;
        let base_url: url::Url = raw.parse().map_err(|_| ConfigError::Validation {
            field: "server.base_url".into(),
            reason: format!("invalid URL: {raw}"),
        })?;
        let config = EndpointConfig {
            base_url,
            stream_path: self.server.stream_path.clone(),
            credentials: self.server.credentials,
        };
        // Surface bad schemes at load time rather than on first connect.
        config
            .factory()
            .map_err(|e| validation("server.base_url", &e.to_string()))?;
        Ok(config)
    }
}

fn validation(field: &str, reason: &str) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "camwatch", "camwatch").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("camwatch");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields defaults.
///
/// Environment keys nest with `__`: `CAMWATCH_SESSION__MAX_ATTEMPTS=3`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(
            Env::prefixed("CAMWATCH_")
                // flat CLI variables, not config keys
                .ignore(&["token", "server", "config", "catalog", "profile"])
                .split("__"),
        );

    let config: Config = figment.extract()?;
    tracing::debug!(path = %path.display(), "configuration loaded");
    Ok(config)
}

pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

/// Serialize to pretty TOML and write to `path`, creating parent dirs.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Token resolution ────────────────────────────────────────────────

/// Resolve the bearer token: `auth.token_env` → keyring → `auth.token`.
pub fn resolve_token(config: &Config) -> Result<SecretString, ConfigError> {
    let profile = config.profile_name();

    // 1. Env var named by the config
    if let Some(ref env_name) = config.auth.token_env {
        if let Ok(val) = std::env::var(env_name) {
            tracing::debug!(source = "env", "bearer token resolved");
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if config.auth.keyring {
        if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile)) {
            if let Ok(secret) = entry.get_password() {
                tracing::debug!(source = "keyring", "bearer token resolved");
                return Ok(SecretString::from(secret));
            }
        }
    }

    // 3. Plaintext in config
    if let Some(ref token) = config.auth.token {
        tracing::debug!(source = "config", "bearer token resolved");
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoToken {
        profile: profile.into(),
    })
}

/// Store a bearer token in the system keyring for `profile`.
pub fn store_token(profile: &str, token: &SecretString) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile))?;
    entry.set_password(token.expose_secret())?;
    Ok(())
}

/// Remove the keyring token for `profile`. A missing entry is not an error.
pub fn delete_token(profile: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile))?;
    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn keyring_user(profile: &str) -> String {
    format!("{profile}/token")
}
