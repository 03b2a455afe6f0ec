//! Evalsync CLI - Command-line driver for the evaluation tracker
//!
//! Replays scripted sessions against an in-memory document host and prints
//! the resulting state as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use evalsync::TrackerConfig;
use evalsync::replay;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "evalsync")]
#[command(about = "Lifecycle tracking for REPL evaluations in live documents", long_about = None)]
struct Cli {
    /// Tracker configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a newline-delimited JSON script
    Replay {
        /// Script to replay
        script: PathBuf,

        /// Print only the requests sent to the backend
        #[arg(long)]
        requests_only: bool,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => TrackerConfig::load(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => TrackerConfig::default(),
    };

    // Initialize tracing
    let level = if config.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    match cli.command {
        Commands::Replay {
            script,
            requests_only,
        } => {
            let report = replay::run_file(&script, config)?;
            let json = if requests_only {
                serde_json::to_string_pretty(&report.requests)?
            } else {
                serde_json::to_string_pretty(&report)?
            };
            println!("{}", json);
        }

        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
