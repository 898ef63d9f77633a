//! Interactive watch console.
//!
//! One command per stdin line drives the selection, the token cell and
//! catalog search. A `SessionCoordinator` task owns the stream session and
//! every status change it publishes is printed as it happens.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytesize::ByteSize;
use owo_colors::OwoColorize;
use secrecy::SecretString;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use camwatch_api::{Renderer, WebSocketRenderer};
use camwatch_core::{
    BuildingId, CameraRef, Catalog, SelectionController, SessionCoordinator, SessionError,
    SessionState, SessionStatus, TokenCell, TokenSource,
};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::{load_catalog, load_config, resolve_camera, resolve_token};

/// How long a selection change may take to show up in the published status.
const ACK_TIMEOUT: Duration = Duration::from_secs(2);

const HELP: &str = "\
Commands:
  camera <id|building/floor/camera>   watch a camera
  building <id>                       select a building (closes the stream)
  clear                               clear the selection
  search [query]                      list matching cameras
  token set <token>                   renew the bearer token
  token revoke                        revoke the bearer token
  status                              show the session status
  help                                show this help
  quit                                close the stream and exit";

// ── Console commands ────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConsoleCommand {
    Camera(String),
    Building(String),
    Clear,
    Search(String),
    TokenSet(SecretString),
    TokenRevoke,
    Status,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(verb, rest)| (verb, rest.trim()));

        let required = |usage: &str| {
            if rest.is_empty() {
                Err(format!("usage: {usage}"))
            } else {
                Ok(rest.to_owned())
            }
        };

        match verb.to_ascii_lowercase().as_str() {
            "camera" | "cam" => required("camera <id|building/floor/camera>").map(Self::Camera),
            "building" => required("building <id>").map(Self::Building),
            "clear" => Ok(Self::Clear),
            "search" | "find" => Ok(Self::Search(rest.to_owned())),
            "token" => match rest.split_once(char::is_whitespace) {
                Some(("set", token)) if !token.trim().is_empty() => {
                    Ok(Self::TokenSet(SecretString::from(token.trim().to_owned())))
                }
                None if rest == "revoke" => Ok(Self::TokenRevoke),
                _ => Err("usage: token set <token> | token revoke".into()),
            },
            "status" => Ok(Self::Status),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            other => Err(format!("unknown command '{other}', try 'help'")),
        }
    }
}

enum Flow {
    Continue,
    Quit,
}

// ── Console ─────────────────────────────────────────────────────────

struct Console {
    catalog: Arc<Catalog>,
    tokens: Arc<TokenCell>,
    selection: SelectionController,
    status: watch::Receiver<SessionStatus>,
    received: Arc<AtomicU64>,
    color: bool,
    last_reported: Option<(Option<CameraRef>, SessionState, u32, Option<SessionError>)>,
}

impl Console {
    async fn execute(&mut self, command: ConsoleCommand) -> Result<Flow, String> {
        match command {
            ConsoleCommand::Camera(identifier) => {
                let tree = self.catalog.snapshot();
                let camera = resolve_camera(&tree, &identifier).map_err(|e| e.to_string())?;
                if self.selection.select_camera(camera) {
                    self.await_selection(Some(camera.camera_ref())).await;
                }
            }

            ConsoleCommand::Building(identifier) => {
                let id = BuildingId::from(identifier.as_str());
                if self.catalog.snapshot().building(&id).is_none() {
                    return Err(format!("building '{identifier}' not found"));
                }
                if self.selection.select_building(id) {
                    self.await_selection(None).await;
                }
            }

            ConsoleCommand::Clear => {
                if self.selection.clear() {
                    self.await_selection(None).await;
                }
            }

            ConsoleCommand::Search(query) => self.print_matches(&query),

            ConsoleCommand::TokenSet(token) => self.tokens.set(token),

            ConsoleCommand::TokenRevoke => self.tokens.revoke(),

            ConsoleCommand::Status => {
                let status = self.status.borrow().clone();
                println!("{}", self.status_detail(&status));
            }

            ConsoleCommand::Help => println!("{HELP}"),

            ConsoleCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    /// Wait for the coordinator to publish a status for `camera`, then print it.
    async fn await_selection(&mut self, camera: Option<CameraRef>) {
        let status = {
            let acknowledged = tokio::time::timeout(
                ACK_TIMEOUT,
                self.status.wait_for(|status| status.camera == camera),
            )
            .await;
            match acknowledged {
                Ok(Ok(status)) => status.clone(),
                Ok(Err(_)) => return,
                Err(_) => {
                    tracing::warn!("coordinator did not acknowledge the selection in time");
                    return;
                }
            }
        };
        self.report(&status);
    }

    /// Print one line per distinct status.
    fn report(&mut self, status: &SessionStatus) {
        let key = (
            status.camera.clone(),
            status.state,
            status.reconnect_attempt,
            status.last_error.clone(),
        );
        if self.last_reported.as_ref() == Some(&key) {
            return;
        }
        self.last_reported = Some(key);

        let camera = status
            .camera
            .as_ref()
            .map_or_else(|| "no camera".to_owned(), ToString::to_string);
        let mut line = format!(
            "[{}] {camera}  {}",
            status
                .changed_at
                .with_timezone(&chrono::Local)
                .format("%H:%M:%S"),
            self.paint_state(status.state)
        );
        if status.state == SessionState::Reconnecting {
            line.push_str(&format!(" (attempt {}", status.reconnect_attempt));
            if let Some(delay) = status.retry_in {
                line.push_str(&format!(", retry in {}", format_delay(delay)));
            }
            line.push(')');
        }
        if let Some(ref error) = status.last_error {
            line.push_str(&format!("  {error}"));
        }
        println!("{line}");
    }

    fn status_detail(&self, status: &SessionStatus) -> String {
        let tree = self.catalog.snapshot();
        let camera = match status.camera {
            Some(ref camera) => match tree.camera(camera) {
                Some(found) => format!("{camera} ({})", found.name),
                None => camera.to_string(),
            },
            None => "-".into(),
        };
        let mut lines = vec![
            format!("Camera:     {camera}"),
            format!("State:      {}", self.paint_state(status.state)),
            format!("Attempt:    {}", status.reconnect_attempt),
        ];
        if let Some(delay) = status.retry_in {
            lines.push(format!("Retry in:   {}", format_delay(delay)));
        }
        lines.push(format!(
            "Last error: {}",
            status
                .last_error
                .as_ref()
                .map_or_else(|| "-".into(), ToString::to_string)
        ));
        lines.push(format!(
            "Received:   {}",
            ByteSize::b(self.received.load(Ordering::Relaxed))
        ));
        lines.push(format!(
            "Token:      {}",
            if self.tokens.is_present() {
                "present"
            } else {
                "absent"
            }
        ));
        lines.join("\n")
    }

    fn print_matches(&self, query: &str) {
        let tree = self.catalog.search(query);
        if tree.camera_count() == 0 {
            println!("no cameras match '{query}'");
            return;
        }
        for building in tree.buildings() {
            for floor in &building.floors {
                for camera in &floor.cameras {
                    println!(
                        "  {}  {}  ({} / {})",
                        camera.camera_ref(),
                        camera.name,
                        building.name,
                        floor.name
                    );
                }
            }
        }
    }

    fn paint_state(&self, state: SessionState) -> String {
        let label = state.to_string();
        if !self.color {
            return label;
        }
        match state {
            SessionState::Playing => label.green().to_string(),
            SessionState::Connecting | SessionState::Reconnecting => label.yellow().to_string(),
            SessionState::Stalled => label.magenta().to_string(),
            SessionState::Failed => label.red().to_string(),
            SessionState::Idle | SessionState::Closed => label.dimmed().to_string(),
        }
    }
}

fn format_delay(delay: Duration) -> String {
    let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    humantime::format_duration(Duration::from_millis(millis)).to_string()
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = load_config(global)?;
    let catalog = Arc::new(load_catalog(global, &cfg)?);
    let endpoints = cfg.endpoint_config()?.factory()?;
    let session_config = cfg.session.to_session_config()?;
    let tokens = Arc::new(TokenCell::new(resolve_token(global, &cfg)?));

    let received = Arc::new(AtomicU64::new(0));
    let renderer: Arc<dyn Renderer> =
        Arc::new(WebSocketRenderer::discarding(Arc::clone(&received)));
    let token_source: Arc<dyn TokenSource> = tokens.clone();

    let (selection, selections) = SelectionController::new();
    let coordinator = SessionCoordinator::new(
        Arc::clone(&catalog),
        token_source,
        renderer,
        endpoints,
        session_config,
    );
    let status = coordinator.status();
    let cancel = CancellationToken::new();
    let driver = tokio::spawn(coordinator.run(selections, cancel.clone()));

    let mut console = Console {
        catalog,
        tokens,
        selection,
        status,
        received,
        color: output::should_color(&global.color),
        last_reported: None,
    };

    if !global.quiet {
        eprintln!(
            "camwatch: {} cameras loaded, type 'help' for commands",
            console.catalog.snapshot().camera_count()
        );
    }

    if let Some(camera) = args.camera {
        if let Err(message) = console.execute(ConsoleCommand::Camera(camera)).await {
            eprintln!("error: {message}");
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,

            changed = console.status.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = console.status.borrow_and_update().clone();
                console.report(&status);
            }

            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "stdin read failed");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                let flow = match line.parse::<ConsoleCommand>() {
                    Ok(command) => console.execute(command).await,
                    Err(message) => Err(message),
                };
                match flow {
                    Ok(Flow::Quit) => break,
                    Ok(Flow::Continue) => {}
                    Err(message) => eprintln!("error: {message}"),
                }
            }
        }
    }

    cancel.cancel();
    if let Err(e) = driver.await {
        tracing::warn!(error = %e, "coordinator task ended abnormally");
    }
    let last = console.status.borrow().clone();
    console.report(&last);
    Ok(())
}
