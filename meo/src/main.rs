//! meo: mark up a markdown document into chunks, have an agent rewrite the
//! editable ones, then review the result chunk by chunk.
//!
//! `meo edit <file>` and `meo review <session>` open the TUI. The other
//! subcommands are plain listings on stdout.
//!
//! # Startup sequence for the TUI
//!
//! 1. Load the config, the document, its sidecar and the presets. Everything
//!    that can fail happens before the terminal is touched.
//! 2. `install_panic_hook()` so a panic restores the terminal first.
//! 3. `register_sigterm()`, polled by the loop's 50 ms heartbeat.
//! 4. `init_tui()`, then the event task.
//!
//! `restore_tui()` runs at the single exit point after the loop; draw errors
//! break out of the loop instead of returning early.

mod agent;
mod app;
mod config;
mod event;
mod highlight;
mod presets;
mod theme;
mod tui;
mod ui;

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use meo_core::lifecycle::Lifecycle;
use meo_core::session::SessionStore;
use meo_core::sidecar;

use crate::config::Config;
use crate::event::AppEvent;
use crate::ui::keybindings::{self, KeyAction};

#[derive(Parser)]
#[command(name = "meo", version, about = "Chunk-addressed, agent-assisted document rewriting")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Use FOLDER as the document folder (writes ./.meo/config.toml)
    Init { folder: PathBuf },
    /// Open a document in the editor
    Edit {
        /// Markdown file, relative to the configured folder or absolute
        file: PathBuf,
    },
    /// Reopen a session to review it or resume its pending chunks
    Review {
        /// Session id, as listed by `meo sessions`
        id: String,
    },
    /// List rewrite sessions, newest first
    Sessions {
        /// Delete the session with this id instead of listing
        #[arg(long, value_name = "ID")]
        delete: Option<String>,
    },
    /// List the built-in direction presets
    Presets,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("meo: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Init { folder }) => {
            init_stderr_logging();
            init(&folder)
        }
        Some(Commands::Edit { file }) => {
            let config = load_config()?;
            init_file_logging(&config)?;
            let lifecycle = open_document(&config, &file)?;
            run_editor(&config, lifecycle).await
        }
        Some(Commands::Review { id }) => {
            let config = load_config()?;
            init_file_logging(&config)?;
            let lifecycle = open_session(&config, &id)?;
            run_editor(&config, lifecycle).await
        }
        Some(Commands::Sessions { delete }) => {
            init_stderr_logging();
            sessions(&load_config()?, delete.as_deref())
        }
        Some(Commands::Presets) => list_presets(),
        None => {
            init_stderr_logging();
            list_documents(&load_config()?)
        }
    }
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_env("MEO_LOG").unwrap_or_else(|_| EnvFilter::new(default))
}

/// Listing commands log warnings to stderr.
fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter("warn"))
        .with_writer(std::io::stderr)
        .init();
}

/// The TUI owns the terminal, so it logs to `<folder>/.meo/meo.log`.
fn init_file_logging(config: &Config) -> Result<()> {
    let path = config.log_path();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter("info"))
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

fn load_config() -> Result<Config> {
    let cwd = std::env::current_dir().context("cannot read the current directory")?;
    Config::load(&config::config_path(&cwd))
}

fn init(folder: &Path) -> Result<()> {
    let folder = folder
        .canonicalize()
        .with_context(|| format!("cannot resolve {}", folder.display()))?;
    if !folder.is_dir() {
        bail!("{} is not a directory", folder.display());
    }
    let cwd = std::env::current_dir().context("cannot read the current directory")?;
    let path = config::config_path(&cwd);

    let config = Config::new(&folder);
    config.save(&path)?;
    std::fs::create_dir_all(config.sessions_dir())
        .with_context(|| format!("failed to create {}", config.sessions_dir().display()))?;

    let count = config.markdown_files()?.len();
    tracing::info!(folder = %folder.display(), config = %path.display(), "initialised");
    println!("Using {} ({count} markdown files)", folder.display());
    println!("Config written to {}", path.display());
    Ok(())
}

fn list_documents(config: &Config) -> Result<()> {
    let files = config.markdown_files()?;
    if files.is_empty() {
        println!("No markdown files in {}", config.folder.display());
        return Ok(());
    }
    for file in files {
        let name = file.strip_prefix(&config.folder).unwrap_or(&file);
        let marked = match sidecar::load_sidecar(&file) {
            Ok(Some(project)) => format!("  ({} chunks)", project.list_chunks().len()),
            Ok(None) => String::new(),
            Err(err) => {
                tracing::warn!(file = %file.display(), error = %err, "unreadable sidecar");
                "  (unreadable sidecar)".to_owned()
            }
        };
        println!("{}{marked}", name.display());
    }
    Ok(())
}

fn sessions(config: &Config, delete: Option<&str>) -> Result<()> {
    let store = SessionStore::new(config.sessions_dir());
    if let Some(id) = delete {
        store.delete(id).with_context(|| format!("failed to delete session {id}"))?;
        println!("Deleted session {id}");
        return Ok(());
    }
    let sessions = store.list().context("failed to list sessions")?;
    if sessions.is_empty() {
        println!("No sessions");
        return Ok(());
    }
    let width = sessions.iter().map(|s| s.id.len()).max().unwrap_or(0);
    for meta in sessions {
        println!(
            "{:<width$}  {:<10}  {}  {}",
            meta.id,
            meta.status.label(),
            meta.created_at.format("%Y-%m-%d %H:%M"),
            meta.source_file.display(),
        );
    }
    Ok(())
}

fn list_presets() -> Result<()> {
    let catalog = presets::builtin().context("built-in presets are invalid")?;
    let width = catalog.iter().map(|p| p.id.len()).max().unwrap_or(0);
    for preset in catalog.iter() {
        let categories: Vec<&str> = preset.categories.iter().map(|c| c.label()).collect();
        println!(
            "{:<width$}  {:<16}  {}  [{}]",
            preset.id,
            preset.name,
            preset.description,
            categories.join(", "),
        );
    }
    Ok(())
}

/// Builds the lifecycle for `file` from its sidecar (or a fresh chunk set).
fn open_document(config: &Config, file: &Path) -> Result<Lifecycle> {
    let source = config.resolve_document(file);
    let document = std::fs::read_to_string(&source)
        .with_context(|| format!("failed to read {}", source.display()))?;
    let project = sidecar::load_or_create(&source, &document)
        .with_context(|| format!("failed to load the sidecar of {}", source.display()))?;
    let catalog = presets::builtin().context("built-in presets are invalid")?;
    tracing::info!(
        file = %source.display(),
        chunks = project.list_chunks().len(),
        "document opened"
    );
    Ok(Lifecycle::new(
        source,
        document,
        project,
        catalog,
        SessionStore::new(config.sessions_dir()),
        config.session_settings(),
    ))
}

/// Builds the lifecycle for the source of session `id` and resumes it.
fn open_session(config: &Config, id: &str) -> Result<Lifecycle> {
    let session = SessionStore::new(config.sessions_dir())
        .open(id)
        .with_context(|| format!("failed to open session {id}"))?;
    let source = session.meta().source_file.clone();
    let mut lifecycle = open_document(config, &source)?;
    lifecycle
        .resume(session)
        .with_context(|| format!("cannot resume session {id}"))?;
    Ok(lifecycle)
}

async fn run_editor(config: &Config, lifecycle: Lifecycle) -> Result<()> {
    let theme = theme::Theme::from_name(&config.theme);

    tui::install_panic_hook();
    let term_flag = tui::register_sigterm();
    let mut terminal = tui::init_tui().context("failed to initialise the terminal")?;

    let handler = event::EventHandler::new();
    event::spawn_event_task(handler.tx.clone());
    let mut rx = handler.rx;
    let mut app = app::App::new(lifecycle, config.agent.clone(), handler.tx.clone());
    highlight::warm_up();

    let mut outcome = Ok(());
    'event_loop: loop {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(50)) => {
                if term_flag.load(Ordering::Relaxed) {
                    break 'event_loop;
                }
            }
            maybe_event = rx.recv() => {
                match maybe_event {
                    Some(AppEvent::Render) => {
                        if let Err(err) = terminal.draw(|frame| ui::render(frame, &mut app, &theme)) {
                            outcome = Err(err).context("failed to draw");
                            break 'event_loop;
                        }
                    }
                    Some(AppEvent::Key(key)) => {
                        if keybindings::handle_key(key, &mut app) == KeyAction::Quit {
                            break 'event_loop;
                        }
                    }
                    Some(AppEvent::Mouse(mouse)) => {
                        keybindings::handle_mouse(mouse, &mut app);
                    }
                    Some(AppEvent::Tick) => app.on_tick(),
                    Some(AppEvent::Processing(event)) => app.on_processing_event(event),
                    // ratatui picks up the new size on the next draw.
                    Some(AppEvent::Resize(..)) => {}
                    None => break 'event_loop,
                }
                if term_flag.load(Ordering::Relaxed) {
                    break 'event_loop;
                }
            }
        }
    }

    tui::restore_tui().context("failed to restore the terminal")?;
    app.save_sidecar();
    tracing::info!("editor closed");
    outcome
}
