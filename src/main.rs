use std::sync::Mutex;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod app;
mod client;
mod config;
mod format;
mod handler;
mod stream;
mod tui;
mod ui;

use app::App;
use client::ApiClient;
use config::Config;

const DEFAULT_SERVER_URL: &str = "http://localhost:5000";
const DEFAULT_MODEL: &str = "llama3.2";

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Terminal chat client for a streaming LLM backend")]
struct Cli {
    /// Base URL of the chat backend
    #[arg(long, env = "PARLEY_SERVER")]
    server: Option<String>,

    /// Model shown as selected at startup
    #[arg(long, env = "PARLEY_MODEL")]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;

    // Load config; CLI flags win over the saved defaults
    let config = Config::load().unwrap_or_else(|_| Config::new());
    let server_url = cli
        .server
        .or_else(|| config.server_url.clone())
        .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
    let selected_model = cli
        .model
        .or_else(|| config.default_model.clone())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let client = ApiClient::new(&server_url)?;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();
    let mut app = App::new(client, selected_model, events.sender());

    tracing::info!(%server_url, "parley started");
    let result = run(&mut terminal, &mut events, &mut app).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, events: &mut tui::EventHandler, app: &mut App) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }
    Ok(())
}

/// The TUI owns the terminal, so log lines go to a file under the user
/// data directory instead. Without a data directory, logging stays off.
fn init_logging() -> Result<()> {
    let Some(data_dir) = dirs::data_local_dir() else {
        return Ok(());
    };

    let log_dir = data_dir.join("parley");
    std::fs::create_dir_all(&log_dir)?;
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("parley.log"))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("parley=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();

    Ok(())
}
