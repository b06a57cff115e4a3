//! ClickEat CLI - menu and staff management from the terminal.
//!
//! Talks to the ClickEat REST backend through `clickeat-core`. Credentials are
//! kept between runs (session file by default, OS keychain with `--keyring`);
//! an expired access token is refreshed transparently.

mod commands;
mod format;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use clickeat_core::auth::{FileSessionStore, KeyringSessionStore, SessionStore};
use clickeat_core::{ApiClient, AppConfig, RefreshMode, SessionEvent, SessionEvents};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{CategoryCommands, DishCommands, StaffCommands};

// ============================================================================
// Constants
// ============================================================================

/// Directory for a rolling log file, in addition to stderr
const LOG_DIR_ENV: &str = "CLICKEAT_LOG_DIR";

const LOG_FILE_NAME: &str = "clickeat.log";

/// Extra time allowed for pending notices after the command finishes
const EVENT_GRACE_SECS: u64 = 1;

#[derive(Parser)]
#[command(name = "clickeat")]
#[command(version)]
#[command(about = "ClickEat menu and staff management")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API root, e.g. https://clickeat.example/api/ (overrides CLICKEAT_API_URL)
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    /// Keep credentials in the OS keychain instead of the session file
    #[arg(long, global = true)]
    keyring: bool,

    /// Share one token refresh between concurrent requests
    #[arg(long, global = true)]
    coalesce_refresh: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Log in and store the session
    Login {
        /// Account email (prompted for if omitted)
        #[arg(value_name = "EMAIL")]
        email: Option<String>,
    },
    /// End the session on the server and forget it locally
    Logout,
    /// Show the signed-in account
    Whoami,
    /// Change the signed-in account's password
    Passwd,
    /// Print the menu grouped by category
    Menu,
    /// Manage categories
    Categories {
        #[command(subcommand)]
        command: CategoryCommands,
    },
    /// Manage dishes
    Dishes {
        #[command(subcommand)]
        command: DishCommands,
    },
    /// Manage staff accounts
    Staff {
        #[command(subcommand)]
        command: StaffCommands,
    },
}

/// Initialize the tracing subscriber for logging. The returned guard must be
/// held until exit so the file writer flushes.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=clickeat_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var_os(LOG_DIR_ENV) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

fn build_client(cli: &Cli, app_config: &AppConfig, events: SessionEvents) -> Result<ApiClient> {
    let mut config = app_config.client_config();
    if let Some(url) = &cli.api_url {
        config = clickeat_core::ClientConfig::new(url).with_refresh_mode(config.refresh_mode);
    }
    if cli.coalesce_refresh {
        config = config.with_refresh_mode(RefreshMode::Coalesced);
    }

    let store: Arc<dyn SessionStore> = if cli.keyring {
        Arc::new(KeyringSessionStore::new())
    } else {
        Arc::new(FileSessionStore::new(AppConfig::data_dir()?))
    };

    ApiClient::builder()
        .config(config)
        .store(store)
        .events(events)
        .build()
        .context("Failed to create API client")
}

/// Print notices as they arrive. Ends when every sender is gone, which
/// includes a pending redirect.
async fn report_events(mut rx: broadcast::Receiver<SessionEvent>) {
    loop {
        match rx.recv().await {
            Ok(SessionEvent::Notice(notice)) => eprintln!("{}", notice),
            Ok(SessionEvent::RedirectToLogin) => {
                eprintln!("Run `clickeat login` to sign in again.");
            }
            Ok(event) => debug!(?event, "Session event"),
            Err(RecvError::Lagged(skipped)) => debug!(skipped, "Missed session events"),
            Err(RecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _guard = init_tracing();
    let cli = Cli::parse();
    info!("ClickEat CLI starting");

    let mut app_config = AppConfig::load()?;
    let events = SessionEvents::new();
    let listener = tokio::spawn(report_events(events.subscribe()));
    let client = build_client(&cli, &app_config, events)?;
    let redirect_delay = client.config().redirect_delay;

    let result = match cli.command {
        Commands::Login { email } => commands::login(&client, &mut app_config, email).await,
        Commands::Logout => commands::logout(&client).await,
        Commands::Whoami => commands::whoami(&client).await,
        Commands::Passwd => commands::change_password(&client).await,
        Commands::Menu => commands::menu(&client).await,
        Commands::Categories { command } => commands::categories(&client, command).await,
        Commands::Dishes { command } => commands::dishes(&client, command).await,
        Commands::Staff { command } => commands::staff(&client, command).await,
    };

    // Dropping the client closes the channel once a pending redirect fires
    drop(client);
    let grace = redirect_delay + Duration::from_secs(EVENT_GRACE_SECS);
    if tokio::time::timeout(grace, listener).await.is_err() {
        debug!("Event listener did not finish in time");
    }

    info!("ClickEat CLI shutting down");
    result
}
