// Copyright (c) 2026 Signal Field Contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Signal Field CLI
//!
//! The `sigfield` binary drives an aggregation field from the command line.
//!
//! ## Commands
//!
//! - `sigfield ingest <FILE>` - Fold a JSON-lines file of signal envelopes
//! - `sigfield replay --log <FILE>` - Recover a field from its event log
//! - `sigfield patterns --log <FILE>` - List tracked patterns of a recovered field
//! - `sigfield config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::{ConfigCommand, IngestArgs, PatternsArgs, ReplayArgs};

/// Signal Field - shared aggregate state over many signal sessions
#[derive(Parser)]
#[command(name = "sigfield")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "SIGNAL_FIELD_CONFIG",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "SIGNAL_FIELD_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fold signal envelopes from a JSON-lines file
    #[command(name = "ingest")]
    Ingest(IngestArgs),

    /// Recover a field from its event log and print the replayed records
    #[command(name = "replay")]
    Replay(ReplayArgs),

    /// List patterns tracked by a recovered field
    #[command(name = "patterns")]
    Patterns(PatternsArgs),

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Ingest(args) => commands::ingest::execute(args, cli.config).await,
        Commands::Replay(args) => commands::replay::execute(args, cli.config).await,
        Commands::Patterns(args) => commands::patterns::execute(args, cli.config).await,
        Commands::Config { command } => commands::config::handle_command(command, cli.config).await,
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    Ok(())
}
