// Copyright (c) 2026 Signal Field Contributors
// SPDX-License-Identifier: AGPL-3.0

//! `sigfield ingest` - fold a JSON-lines file of signal envelopes

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use signal_field_core::application::FieldTasks;
use signal_field_core::{PatternFilter, SignalEnvelope};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use super::{load_config, open_field, print_patterns, print_snapshot};

#[derive(Args)]
pub struct IngestArgs {
    /// JSON-lines file with one signal envelope per line
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Event log to append to (JSON lines); the field is recovered from it first
    #[arg(long, value_name = "FILE")]
    log: Option<PathBuf>,

    /// Print the final snapshot as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Default)]
struct IngestTally {
    accepted: usize,
    rejected: usize,
    degraded: usize,
}

pub async fn execute(args: IngestArgs, config_override: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_override)?;
    let field = open_field(config, args.log.as_deref()).await?;
    let tasks = FieldTasks::start(&field);

    let file = tokio::fs::File::open(&args.input)
        .await
        .with_context(|| format!("Failed to open {}", args.input.display()))?;
    let mut lines = BufReader::new(file).lines();
    let mut tally = IngestTally::default();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        let envelope: SignalEnvelope = match serde_json::from_str(&line) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping malformed envelope");
                tally.rejected += 1;
                continue;
            }
        };

        match field.ingest_envelope(envelope).await {
            Ok(outcome) => {
                tally.accepted += 1;
                if !outcome.degraded.is_empty() {
                    tally.degraded += 1;
                }
            }
            Err(e) => {
                eprintln!("{} line {}: {}", "rejected".yellow(), line_no, e);
                tally.rejected += 1;
            }
        }
    }

    tasks.shutdown().await;
    info!(
        accepted = tally.accepted,
        rejected = tally.rejected,
        degraded = tally.degraded,
        "Ingest finished"
    );

    let snapshot = field.snapshot();
    if args.json {
        println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
        return Ok(());
    }

    println!(
        "{} {} accepted, {} rejected, {} degraded",
        "✓".green(),
        tally.accepted,
        tally.rejected,
        tally.degraded
    );
    let health = field.health();
    if health.store.degraded || health.store.dropped_events > 0 {
        println!(
            "{} event log degraded: {} buffered, {} dropped",
            "!".yellow(),
            health.store.backlog_len,
            health.store.dropped_events
        );
    }
    println!();
    print_snapshot(&snapshot);
    println!();
    print_patterns(&field.patterns(&PatternFilter::all()));

    Ok(())
}
