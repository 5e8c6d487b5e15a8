// Copyright (c) 2026 Signal Field Contributors
// SPDX-License-Identifier: AGPL-3.0

//! `sigfield replay` - recover a field from its event log

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use signal_field_core::StateEventKind;

use super::{load_config, open_field, print_snapshot};

#[derive(Args)]
pub struct ReplayArgs {
    /// Event log written by `sigfield ingest --log`
    #[arg(long, value_name = "FILE")]
    log: PathBuf,

    /// First sequence to print
    #[arg(long, default_value_t = 0)]
    from: u64,

    /// Only print records at or above this significance
    #[arg(long, default_value_t = 0.0)]
    min_significance: f64,
}

pub async fn execute(args: ReplayArgs, config_override: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_override)?;
    let field = open_field(config, Some(&args.log)).await?;

    println!("{}", "Event log:".bold());
    let mut shown = 0usize;
    for event in field.replay(args.from) {
        if event.significance < args.min_significance {
            continue;
        }
        let kind = match event.kind {
            StateEventKind::SignalFolded => event.kind.as_str().cyan(),
            StateEventKind::PatternsPruned => event.kind.as_str().magenta(),
        };
        println!(
            "  #{:<6} {:<16} significance {:.2}  {}",
            event.sequence,
            kind,
            event.significance,
            event.timestamp.to_rfc3339()
        );
        shown += 1;
    }
    if shown == 0 {
        println!("  {}", "(no records)".dimmed());
    }
    println!();

    print_snapshot(&field.snapshot());
    Ok(())
}
