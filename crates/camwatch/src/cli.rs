//! Clap derive structures for the `camwatch` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// camwatch -- browse a camera catalog and watch live streams
#[derive(Debug, Parser)]
#[command(
    name = "camwatch",
    version,
    about = "Browse a building camera catalog and watch live camera streams",
    long_about = "Browse and search a building → floor → camera catalog, and keep one\n\
        live stream session open for the selected camera.\n\n\
        Sessions reconnect with backoff on stalls and transport loss, and at most\n\
        one session is ever connected.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Profile the keyring token is stored under
    #[arg(long, short = 'p', env = "CAMWATCH_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Stream server base URL (overrides config)
    #[arg(long, short = 's', env = "CAMWATCH_SERVER", global = true)]
    pub server: Option<String>,

    /// Bearer token (overrides env var, keyring and config)
    #[arg(long, env = "CAMWATCH_TOKEN", global = true, hide_env = true)]
    pub token: Option<String>,

    /// Camera catalog JSON file (overrides config)
    #[arg(long, env = "CAMWATCH_CATALOG", global = true)]
    pub catalog: Option<PathBuf>,

    /// Config file to load instead of the platform default
    #[arg(long, env = "CAMWATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "CAMWATCH_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Browse and search the camera catalog
    #[command(alias = "cat")]
    Catalog(CatalogArgs),

    /// Open an interactive console that keeps one camera stream live
    Watch(WatchArgs),

    /// Manage CLI configuration and the stored bearer token
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Catalog ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CatalogArgs {
    #[command(subcommand)]
    pub command: CatalogCommand,
}

#[derive(Debug, Subcommand)]
pub enum CatalogCommand {
    /// Show the building → floor → camera hierarchy
    Tree {
        /// Filter on building, floor and camera names and camera locations
        #[arg(long)]
        search: Option<String>,
    },

    /// List cameras, one row each
    #[command(alias = "ls")]
    Cameras {
        /// Filter on building, floor and camera names and camera locations
        #[arg(long)]
        search: Option<String>,
    },

    /// Show one camera
    Show {
        /// Camera id, or a `building/floor/camera` path
        camera: String,
    },
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Camera to open on start (id or `building/floor/camera` path)
    pub camera: Option<String>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Display current resolved configuration
    Show,

    /// Create the config file with guided setup
    Init,

    /// Store a bearer token in the system keyring
    SetToken {
        /// Token value (prompted for when omitted)
        token: Option<String>,
    },

    /// Remove the bearer token from the system keyring
    DeleteToken,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
