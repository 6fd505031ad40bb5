//! Mystery interrogation TUI application.
//!
//! A vim-style terminal interface for questioning AI-played suspects,
//! collecting evidence and naming the culprit.
//!
//! # Headless Mode
//!
//! Run with `--headless` for a line-oriented interface suitable for scripting:
//!
//! ```bash
//! cargo run -p mystery -- --headless --scenario scenarios/case1.json
//! ```

mod app;
mod events;
mod headless;
mod ui;

use std::fs::{self, OpenOptions};
use std::io::{self, stdout};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use mystery_core::{
    ChatBackend, ChatError, GameSession, PendingReply, ScriptedBackend, SessionConfig,
    SessionError,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use app::App;
use events::{handle_event, EventResult};
use ui::render::render;

/// How often time clues are re-evaluated.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// What suspects say when no collaborator is configured.
const OFFLINE_REPLY: &str = "(They look at you and say nothing.)";

#[derive(Parser, Debug)]
#[command(
    name = "mystery",
    about = "Question the suspects, gather the evidence, name the culprit",
    version
)]
struct Cli {
    /// Scenario file to play
    #[arg(short, long, default_value = "scenarios/case1.json")]
    scenario: PathBuf,

    /// Directory holding the save files
    #[arg(long, default_value = "saves")]
    save_dir: PathBuf,

    /// Claude model used for the suspects
    #[arg(long)]
    model: Option<String>,

    /// Maximum tokens per reply
    #[arg(long, default_value_t = 1024)]
    max_tokens: usize,

    /// Sampling temperature
    #[arg(long)]
    temperature: Option<f32>,

    /// Override the API base URL
    #[arg(long)]
    api_base: Option<String>,

    /// Run the line-oriented interface instead of the TUI
    #[arg(long)]
    headless: bool,

    /// Play without calling the API
    #[arg(long)]
    offline: bool,

    /// Erase saved progress before starting
    #[arg(long)]
    reset: bool,

    /// Log file for the TUI (default: <save-dir>/mystery.log)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::new(&self.scenario)
            .with_save_dir(&self.save_dir)
            .with_max_tokens(self.max_tokens);
        if let Some(model) = &self.model {
            config = config.with_model(model);
        }
        if let Some(temperature) = self.temperature {
            config = config.with_temperature(temperature);
        }
        if let Some(base_url) = &self.api_base {
            let chat = config.chat.clone().with_base_url(base_url);
            config = config.with_chat(chat);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_file = if cli.headless {
        None
    } else {
        Some(
            cli.log_file
                .clone()
                .unwrap_or_else(|| cli.save_dir.join("mystery.log")),
        )
    };
    init_tracing(log_file.as_deref())?;

    let config = cli.session_config();

    let backend: Arc<dyn ChatBackend> = if cli.offline {
        tracing::info!("offline mode: suspects will not answer");
        Arc::new(ScriptedBackend::new().with_default_reply(OFFLINE_REPLY))
    } else {
        match config.claude_backend() {
            Ok(backend) => Arc::new(backend),
            Err(SessionError::NoApiKey) => {
                eprintln!("Error: ANTHROPIC_API_KEY environment variable not set.");
                eprintln!("Please set it in .env file or with: export ANTHROPIC_API_KEY=your_key_here");
                eprintln!("Or run with --offline to explore the case without the API.");
                std::process::exit(1);
            }
            Err(e) => return Err(e).context("failed to create chat backend"),
        }
    };

    let mut session = match GameSession::from_config(&config).await {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Failed to load scenario {}: {e}", config.scenario_path.display());
            std::process::exit(1);
        }
    };

    if cli.reset {
        session.reset().await.context("failed to reset saved game")?;
    }

    if cli.headless {
        return headless::run_headless(session, backend).await;
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let terminal_backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(terminal_backend)?;

    // Run app
    let result = run_app(&mut terminal, App::new(session, backend)).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {e}");
    }

    Ok(())
}

/// Install the tracing subscriber.
///
/// The TUI owns the terminal, so it logs to a file; headless mode logs to stderr.
fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(io::stderr)
                .compact()
                .init();
        }
    }

    Ok(())
}

type ReplyMessage = (PendingReply, Result<String, ChatError>);

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
) -> io::Result<()> {
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<ReplyMessage>();
    let mut last_tick = Instant::now();

    loop {
        // Render
        terminal.draw(|f| render(f, &app))?;

        // Apply replies that arrived since the last frame
        while let Ok((pending, result)) = reply_rx.try_recv() {
            let outcome = app.session.finish_send(pending, result).await;
            app.apply_outcome(outcome);
        }

        // Time clues
        if last_tick.elapsed() >= TICK_INTERVAL {
            let events = app.session.tick().await;
            app.note_unlocks(&events);
            last_tick = Instant::now();
        }
        app.check_persist_error();

        // Poll for events with timeout for animations
        if event::poll(Duration::from_millis(100))? {
            let ev = event::read()?;

            match handle_event(&mut app, ev) {
                EventResult::Quit => {
                    return Ok(());
                }
                EventResult::Send(text) => {
                    if let Some(pending) = app.session.begin_send(&text).await {
                        app.mark_awaiting(&pending.character_id);
                        let backend = Arc::clone(&app.backend);
                        let tx = reply_tx.clone();
                        tokio::spawn(async move {
                            let result = pending.request(backend.as_ref()).await;
                            // The receiver only goes away when the app quits.
                            let _ = tx.send((pending, result));
                        });
                    }
                }
                EventResult::Open(character_id) => {
                    app.open_conversation(&character_id).await;
                }
                EventResult::Reset => {
                    app.reset_game().await;
                }
                EventResult::NeedsRedraw | EventResult::Continue => {
                    // Just continue the loop
                }
            }
        } else {
            // Tick animations
            app.tick();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
