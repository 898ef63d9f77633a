//! Config subcommand handlers.

use dialoguer::{Input, Select};
use secrecy::SecretString;

use camwatch_api::CredentialPlacement;
use camwatch_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::{config_file, load_config};

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Prompt {
        message: e.to_string(),
    }
}

/// Copy of `cfg` safe to print.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    if cfg.auth.token.is_some() {
        cfg.auth.token = Some("********".into());
    }
    cfg
}

fn read_token(given: Option<String>) -> Result<SecretString, CliError> {
    let raw = match given {
        Some(token) => token,
        None => rpassword::prompt_password("Bearer token: ").map_err(prompt_err)?,
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(CliError::Validation {
            field: "token".into(),
            reason: "value cannot be empty".into(),
        });
    }
    Ok(SecretString::from(raw.to_owned()))
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config_file(global).display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = redacted(&load_config(global)?);
            let body = toml::to_string_pretty(&cfg)?;
            let out = output::render_single(
                &global.output,
                &cfg,
                |_| body.trim_end().to_owned(),
                |c| c.profile_name().to_owned(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            let path = config_file(global);
            eprintln!("camwatch configuration wizard");
            eprintln!("   Config path: {}\n", path.display());

            let mut cfg = load_config(global)?;

            let profile: String = Input::new()
                .with_prompt("Profile name")
                .default(cfg.profile_name().to_owned())
                .interact_text()
                .map_err(prompt_err)?;

            let server: String = Input::new()
                .with_prompt("Stream server URL")
                .default(
                    cfg.server
                        .base_url
                        .clone()
                        .unwrap_or_else(|| "https://nvr.local".into()),
                )
                .interact_text()
                .map_err(prompt_err)?;

            let placements = [CredentialPlacement::Query, CredentialPlacement::Header];
            let choices = [
                "access_token query parameter (browser relays)",
                "Authorization header",
            ];
            let picked = Select::new()
                .with_prompt("Send the bearer token as")
                .items(&choices)
                .default(0)
                .interact()
                .map_err(prompt_err)?;

            let catalog: String = Input::new()
                .with_prompt("Catalog JSON file (empty to skip)")
                .allow_empty(true)
                .interact_text()
                .map_err(prompt_err)?;

            cfg.profile = Some(profile);
            cfg.server.base_url = Some(server);
            cfg.server.credentials = placements.get(picked).copied().unwrap_or_default();
            if !catalog.trim().is_empty() {
                cfg.catalog.path = Some(catalog.trim().into());
            }
            // Fail before writing anything the loader would reject.
            cfg.endpoint_config()?;

            let token = rpassword::prompt_password("Bearer token (empty to skip): ")
                .map_err(prompt_err)?;
            if !token.trim().is_empty() {
                camwatch_config::store_token(
                    cfg.profile_name(),
                    &SecretString::from(token.trim().to_owned()),
                )?;
                eprintln!("   ✓ token stored in system keyring");
            }

            camwatch_config::save_config_to(&cfg, &path)?;
            eprintln!("   ✓ wrote {}", path.display());
            Ok(())
        }

        ConfigCommand::SetToken { token } => {
            let cfg = load_config(global)?;
            let token = read_token(token)?;
            camwatch_config::store_token(cfg.profile_name(), &token)?;
            if !global.quiet {
                eprintln!("Token stored for profile '{}'", cfg.profile_name());
            }
            Ok(())
        }

        ConfigCommand::DeleteToken => {
            let cfg = load_config(global)?;
            camwatch_config::delete_token(cfg.profile_name())?;
            if !global.quiet {
                eprintln!("Token removed for profile '{}'", cfg.profile_name());
            }
            Ok(())
        }
    }
}
