//! Taskdesk - a command line console for the project/task administration API.
//!
//! Signs in against the backend, keeps the session in the configured store
//! and exposes the common administration reads plus file transfer.

mod commands;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use taskdesk_core::Config;

#[derive(Parser, Debug)]
#[command(name = "taskdesk", version, about = "Project/task administration console")]
struct Cli {
    /// API base URL (overrides config and TASKDESK_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in and store the session
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Create an account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Verify the stored token with the server and show the user
    Whoami,
    /// Show the local session state without contacting the server
    Status,
    /// List projects
    Projects,
    /// List tasks
    Tasks {
        #[arg(long)]
        project: Option<i64>,
    },
    /// List users
    Users,
    /// List roles
    Roles,
    /// Show recent activity
    Activity {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Upload a file attachment
    Upload {
        file: PathBuf,
        #[arg(long)]
        project: Option<i64>,
        #[arg(long)]
        task: Option<i64>,
    },
    /// Download a file attachment
    Download {
        id: i64,
        name: String,
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// GET any API path and print the raw JSON
    Get { path: String },
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_file: Option<&PathBuf>) -> Result<Option<WorkerGuard>> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Invalid log file path: {}", path.display()))?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            Ok(None)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_file.as_ref())?;

    let mut config = Config::load()?;
    config.apply_env_overrides()?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }
    info!(api = %config.api_base_url, "Taskdesk starting");

    if let Err(e) = commands::run(cli.command, &mut config).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}
