//! # roomsync
//!
//! CLI tool for exercising the roomsync engine against recorded responses.
//!
//! ## Commands
//!
//! - `replay`: Feed recorded sync responses through the engine
//! - `cursor`: Show or reset the persisted cursor
//! - `filter`: Print the sync filter derived from configuration
//!
//! ## Example
//!
//! ```bash
//! # Replay a directory of responses (001.json, 002.json, ...)
//! roomsync replay recordings/ --since s0 > events.ndjson
//!
//! # Inspect where the next sync would resume
//! roomsync cursor
//!
//! # Start over from a bootstrap snapshot
//! roomsync cursor --reset
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{cursor, filter, replay};
use config::CliConfig;

/// CLI tool for the roomsync sync engine.
#[derive(Parser, Debug)]
#[command(name = "roomsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: roomsync.toml in the data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for the cursor store and configuration
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "roomsync_client=trace" (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay recorded sync responses, printing emitted events as JSON lines
    Replay {
        /// Directory of *.json responses, or one newline-delimited JSON file
        recording: PathBuf,

        /// Seed an empty cursor with this token so the first response is
        /// processed instead of discarded as a bootstrap snapshot
        #[arg(long)]
        since: Option<String>,
    },

    /// Show the persisted cursor
    Cursor {
        /// Clear the cursor so the next sync bootstraps
        #[arg(long)]
        reset: bool,
    },

    /// Print the sync filter JSON
    Filter,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;

    let config = CliConfig::load(cli.config.as_deref(), &data_dir)?;

    match cli.command {
        Commands::Replay { recording, since } => {
            replay::run(&config, &data_dir, &recording, since.as_deref()).await?;
        }
        Commands::Cursor { reset } => {
            cursor::run(&config, &data_dir, reset).await?;
        }
        Commands::Filter => {
            filter::run(&config)?;
        }
    }

    Ok(())
}

/// Install the stderr log subscriber.
///
/// `--log-level` wins over `RUST_LOG`; the default is `info`.
fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Get the default data directory for roomsync.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("org", "roomsync", "roomsync")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
