use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use kelvin_core::export::write_transcript;
use kelvin_core::{
    ChatClient, ChatSession, Config, FileStore, KeyValueStore, LoadOutcome, Overrides, Settings,
};

mod app;
mod handler;
mod markup;
mod theme;
mod tui;
mod ui;

use app::App;

#[derive(Parser)]
#[command(name = "kelvin")]
#[command(version, about = "Terminal chat client for a chat-completion endpoint")]
struct Cli {
    /// Chat endpoint URL
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Model name sent with each request
    #[arg(long, global = true)]
    model: Option<String>,

    /// Where the conversation, theme and log are kept
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log at debug level regardless of KELVIN_LOG
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the stored conversation as a Markdown transcript
    Export {
        /// Directory to write into
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Reset the stored conversation to the greeting
    Clear,
    /// Print the resolved settings
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let overrides = Overrides {
        endpoint: cli.endpoint.clone(),
        model: cli.model.clone(),
        data_dir: cli.data_dir.clone(),
        export_dir: None,
    }
    .with_env();
    let settings = Settings::resolve(Config::load()?, overrides)?;

    init_logging(&settings, cli.debug)?;
    info!(endpoint = %settings.endpoint, model = %settings.model, "starting");

    match cli.command {
        None => run_tui(settings).await,
        Some(Commands::Export { out }) => export(&settings, out),
        Some(Commands::Clear) => clear(&settings),
        Some(Commands::Config) => print_config(&settings),
    }
}

/// Logs go to `<data dir>/kelvin.log`; the terminal belongs to the TUI.
fn init_logging(settings: &Settings, debug: bool) -> Result<()> {
    std::fs::create_dir_all(&settings.data_dir)
        .with_context(|| format!("Failed to create {}", settings.data_dir.display()))?;
    let log_path = settings.log_path();
    let log_file = open_log(&log_path)?;

    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("KELVIN_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}

/// Append so a TUI session's log survives later `export`/`config` runs.
fn open_log(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))
}

fn open_session(settings: &Settings) -> (ChatSession<Box<dyn KeyValueStore>>, LoadOutcome) {
    let store: Box<dyn KeyValueStore> = Box::new(FileStore::new(&settings.data_dir));
    ChatSession::load(store)
}

async fn run_tui(settings: Settings) -> Result<()> {
    let (session, outcome) = open_session(&settings);
    info!(?outcome, messages = session.messages().len(), "conversation loaded");

    let client = ChatClient::new(&settings.endpoint, &settings.model);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new(settings.pattern_period);
    let mut app = App::new(session, Arc::new(client), settings, events.sender());

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            if let Some(event) = events.next().await {
                handler::handle_event(&mut app, event).await?;
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    result
}

fn export(settings: &Settings, out: Option<PathBuf>) -> Result<()> {
    let (session, _) = open_session(settings);
    let dir = out.unwrap_or_else(|| settings.export_dir.clone());
    let path = write_transcript(session.messages(), &dir)?;
    println!("Exported {} messages to {}", session.messages().len(), path.display());
    Ok(())
}

fn clear(settings: &Settings) -> Result<()> {
    let (mut session, _) = open_session(settings);
    session.clear();
    if let Some(error) = session.error() {
        anyhow::bail!("{}", error);
    }
    println!("Conversation cleared");
    Ok(())
}

fn print_config(settings: &Settings) -> Result<()> {
    println!("config file:      {}", Config::get_config_path()?.display());
    println!("endpoint:         {}", settings.endpoint);
    println!("model:            {}", settings.model);
    println!("data dir:         {}", settings.data_dir.display());
    println!("export dir:       {}", settings.export_dir.display());
    println!("log file:         {}", settings.log_path().display());
    println!("reveal interval:  {} ms", settings.reveal_interval.as_millis());
    println!("pattern period:   {} s", settings.pattern_period.as_secs());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["kelvin", "export", "--out", "/tmp", "--model", "m"]);
        assert_eq!(cli.model.as_deref(), Some("m"));
        match cli.command {
            Some(Commands::Export { out }) => assert_eq!(out, Some(PathBuf::from("/tmp"))),
            _ => panic!("expected export"),
        }
    }

    #[test]
    fn test_log_file_is_appended_not_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kelvin.log");

        let mut first = open_log(&path).unwrap();
        first.write_all(b"tui session\n").unwrap();
        drop(first);

        let mut second = open_log(&path).unwrap();
        second.write_all(b"export run\n").unwrap();
        drop(second);

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "tui session\nexport run\n"
        );
    }

    #[test]
    fn test_no_subcommand_runs_tui() {
        let cli = Cli::parse_from(["kelvin", "--debug"]);
        assert!(cli.debug);
        assert!(cli.command.is_none());
    }
}
