//! Command handlers and the config/catalog/token plumbing they share.

pub mod catalog;
pub mod config_cmd;
pub mod watch;

use std::path::PathBuf;

use camwatch_config::{Config, ConfigError};
use camwatch_core::{Camera, CameraId, CameraRef, Catalog, CatalogTree};
use secrecy::SecretString;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Shared helpers ───────────────────────────────────────────────────

pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(camwatch_config::config_path)
}

/// Config file + environment, with the global flags layered on top.
pub fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = camwatch_config::load_config_from(&config_file(global))?;
    if let Some(ref profile) = global.profile {
        cfg.profile = Some(profile.clone());
    }
    if let Some(ref server) = global.server {
        cfg.server.base_url = Some(server.clone());
    }
    if let Some(ref path) = global.catalog {
        cfg.catalog.path = Some(path.clone());
    }
    Ok(cfg)
}

pub fn load_catalog(global: &GlobalOpts, cfg: &Config) -> Result<Catalog, CliError> {
    let path = cfg.catalog.path.as_deref().ok_or_else(|| CliError::NoCatalog {
        path: config_file(global).display().to_string(),
    })?;
    Ok(Catalog::load(path)?)
}

/// `--token` first, then the config chain. No token at all is not an error:
/// the watch console can be given one later.
pub fn resolve_token(global: &GlobalOpts, cfg: &Config) -> Result<Option<SecretString>, CliError> {
    if let Some(ref token) = global.token {
        return Ok(Some(SecretString::from(token.clone())));
    }
    match camwatch_config::resolve_token(cfg) {
        Ok(token) => Ok(Some(token)),
        Err(ConfigError::NoToken { .. }) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Look a camera up by id or by its `building/floor/camera` path.
pub fn resolve_camera<'a>(tree: &'a CatalogTree, identifier: &str) -> Result<&'a Camera, CliError> {
    let found = match identifier.split('/').collect::<Vec<_>>().as_slice() {
        [building, floor, camera] => tree.camera(&CameraRef {
            building: (*building).into(),
            floor: (*floor).into(),
            camera: (*camera).into(),
        }),
        [camera] => tree.find_camera(&CameraId::from(*camera)),
        _ => None,
    };
    found.ok_or_else(|| CliError::NotFound {
        resource_type: "camera".into(),
        identifier: identifier.into(),
        list_command: "catalog cameras".into(),
    })
}
