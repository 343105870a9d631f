//! `TrollBuddy` CLI entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use trollbuddy_cli::app::{self, AppContext};
use trollbuddy_cli::organizer_cmd::{self, StartArgs};
use trollbuddy_cli::viewer_cmd::{self, CaptureArgs, LinkArgs};
use trollbuddy_core::config::StoreBackend;

#[derive(Parser, Debug)]
#[command(name = "trollbuddy")]
#[command(version, about = "Photo-booth sessions with periodic camera capture", long_about = None)]
struct Cli {
    /// Configuration file (replaces the global and project files)
    #[arg(long, global = true, env = "TROLLBUDDY_CONFIG")]
    config: Option<PathBuf>,

    /// Store backend: memory, sqlite or firebase
    #[arg(long, global = true)]
    store: Option<StoreBackend>,

    /// Signed-in organizer account; omit to act anonymously
    #[arg(long, global = true, env = "TROLLBUDDY_USER")]
    user: Option<String>,

    /// Log level filter (e.g. "info", "debug", "warn")
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long, global = true, env = "TROLLBUDDY_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a session, or resume the existing one
    Start(StartArgs),
    /// Show the existing session of the organizer
    Resume,
    /// End the organizer's session and delete its images
    End,
    /// Resolve a share link
    View(LinkArgs),
    /// List the latest images of the organizer's session
    Images,
    /// Resolve a share link and capture images
    Capture(CaptureArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = app::load_config(cli.config.as_deref())?;
    if let Some(backend) = cli.store {
        config.store.backend = backend;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    trollbuddy_core::tracing_init::init_tracing(&config.log_level, cli.log_json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = ?config.store.backend,
        "Starting trollbuddy"
    );

    let ctx = AppContext::new(config).await?;
    match cli.command {
        Command::Start(args) => organizer_cmd::start(&ctx, cli.user, args).await,
        Command::Resume => organizer_cmd::resume(&ctx, cli.user).await,
        Command::End => organizer_cmd::end(&ctx, cli.user).await,
        Command::Images => organizer_cmd::images(&ctx, cli.user).await,
        Command::View(args) => viewer_cmd::view(&ctx, args).await,
        Command::Capture(args) => viewer_cmd::capture(&ctx, args).await,
    }
}
