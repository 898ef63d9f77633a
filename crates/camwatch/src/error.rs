//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a stable exit code.

use miette::Diagnostic;
use thiserror::Error;

use camwatch_config::ConfigError;
use camwatch_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CATALOG: i32 = 5;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("No stream server configured")]
    #[diagnostic(
        code(camwatch::no_server),
        help(
            "Pass --server, set CAMWATCH_SERVER, or add server.base_url to\n\
             {path}"
        )
    )]
    NoServer { path: String },

    #[error("No camera catalog configured")]
    #[diagnostic(
        code(camwatch::no_catalog),
        help(
            "Pass --catalog FILE, set CAMWATCH_CATALOG, or add catalog.path to\n\
             {path}"
        )
    )]
    NoCatalog { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(camwatch::config), help("Run: camwatch config show"))]
    Config { message: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(camwatch::validation))]
    Validation { field: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("No bearer token configured for profile '{profile}'")]
    #[diagnostic(
        code(camwatch::no_token),
        help(
            "Store one with: camwatch config set-token --profile {profile}\n\
             Or set CAMWATCH_TOKEN."
        )
    )]
    NoToken { profile: String },

    #[error("Keyring error: {message}")]
    #[diagnostic(
        code(camwatch::keyring),
        help("Set auth.keyring = false and use auth.token_env instead.")
    )]
    Keyring { message: String },

    // ── Catalog ──────────────────────────────────────────────────────
    #[error("Cannot load catalog from {path}")]
    #[diagnostic(
        code(camwatch::catalog_load),
        help("{reason}\nThe catalog is a JSON array of buildings.")
    )]
    CatalogLoad { path: String, reason: String },

    #[error("Inconsistent catalog: {message}")]
    #[diagnostic(
        code(camwatch::inconsistent_catalog),
        help("Each floor must name its building, each camera its building and floor.")
    )]
    InconsistentCatalog { message: String },

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(camwatch::not_found),
        help("Run: camwatch {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Transport ────────────────────────────────────────────────────
    #[error("Stream transport error: {message}")]
    #[diagnostic(
        code(camwatch::transport),
        help("Check that the stream server is reachable: camwatch config show")
    )]
    Transport { message: String },

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Prompt failed: {message}")]
    #[diagnostic(code(camwatch::interactive))]
    Prompt { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON output failed: {0}")]
    #[diagnostic(code(camwatch::json))]
    Json(#[from] serde_json::Error),

    #[error("YAML output failed: {0}")]
    #[diagnostic(code(camwatch::yaml))]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML output failed: {0}")]
    #[diagnostic(code(camwatch::toml))]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoServer { .. }
            | Self::NoCatalog { .. }
            | Self::Validation { .. }
            | Self::Config { .. } => exit_code::USAGE,
            Self::NoToken { .. } | Self::Keyring { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::CatalogLoad { .. } | Self::InconsistentCatalog { .. } => exit_code::CATALOG,
            Self::Transport { .. } => exit_code::CONNECTION,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::BuildingNotFound { id } => CliError::NotFound {
                resource_type: "building".into(),
                identifier: id,
                list_command: "catalog tree".into(),
            },

            CoreError::FloorNotFound { building, floor } => CliError::NotFound {
                resource_type: "floor".into(),
                identifier: format!("{building}/{floor}"),
                list_command: "catalog tree".into(),
            },

            CoreError::CameraNotFound { camera } => CliError::NotFound {
                resource_type: "camera".into(),
                identifier: camera,
                list_command: "catalog cameras".into(),
            },

            CoreError::InconsistentCatalog { message } => CliError::InconsistentCatalog { message },

            CoreError::CatalogLoad { path, reason } => CliError::CatalogLoad { path, reason },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Config { message } => CliError::Config { message },

            CoreError::Transport { message } => CliError::Transport { message },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoToken { profile } => CliError::NoToken { profile },
            ConfigError::NoServer => CliError::NoServer {
                path: camwatch_config::config_path().display().to_string(),
            },
            ConfigError::Keyring(message) => CliError::Keyring { message },
            ConfigError::Io(e) => CliError::Io(e),
            other @ (ConfigError::Serialization(_) | ConfigError::Figment(_)) => {
                CliError::Config {
                    message: other.to_string(),
                }
            }
        }
    }
}
