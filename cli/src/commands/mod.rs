// Copyright (c) 2026 Signal Field Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Signal Field CLI

pub mod config;
pub mod ingest;
pub mod patterns;
pub mod replay;

pub use self::config::ConfigCommand;
pub use self::ingest::IngestArgs;
pub use self::patterns::PatternsArgs;
pub use self::replay::ReplayArgs;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use signal_field_core::application::{AggregationField, TrackedPattern};
use signal_field_core::infrastructure::JsonlFileSink;
use signal_field_core::{FieldConfig, FieldSnapshot, SystemClock};

/// Load and validate configuration the way every command does.
pub(crate) fn load_config(config_override: Option<PathBuf>) -> Result<FieldConfig> {
    let config = FieldConfig::load_or_default(config_override).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

/// A field backed by `log`, recovered from whatever the log already holds.
/// Without a log the field lives in memory only.
pub(crate) async fn open_field(config: FieldConfig, log: Option<&Path>) -> Result<Arc<AggregationField>> {
    let clock = Arc::new(SystemClock);
    let field = match log {
        Some(path) => {
            let sink = Arc::new(JsonlFileSink::new(path));
            AggregationField::recover(config, sink, clock)
                .await
                .with_context(|| format!("Failed to recover field from {}", path.display()))?
        }
        None => AggregationField::new(config, None, clock),
    };
    Ok(Arc::new(field))
}

pub(crate) fn print_snapshot(snapshot: &FieldSnapshot) {
    println!("{}", "Field snapshot:".bold());
    println!("  Sequence: {}", snapshot.sequence);
    println!("  Updated: {}", snapshot.updated_at.to_rfc3339());
    println!("  Participants: {}", snapshot.participant_count);
    println!("  Coherence: {:.3}", snapshot.coherence);
    let growth = format!("{:+.4}", snapshot.growth_rate);
    if snapshot.growth_rate >= 0.0 {
        println!("  Growth rate: {}", growth.green());
    } else {
        println!("  Growth rate: {}", growth.red());
    }

    if snapshot.elemental_balance.is_empty() {
        println!("  Balance: {}", "(empty)".dimmed());
    } else {
        println!("  Balance:");
        let dominant = snapshot.dominant_element().map(|(label, _)| label.to_string());
        for (label, weight) in &snapshot.elemental_balance {
            let line = format!("    {:<12} {:.3}", label, weight);
            if dominant.as_deref() == Some(label.as_str()) {
                println!("{}", line.bold());
            } else {
                println!("{}", line);
            }
        }
    }
}

pub(crate) fn print_patterns(patterns: &[TrackedPattern]) {
    if patterns.is_empty() {
        println!("{}", "No tracked patterns above the strength floor".dimmed());
        return;
    }
    println!("{}", "Tracked patterns:".bold());
    for pattern in patterns {
        println!(
            "  {:<20} strength {:.3}  support {:>4}  last seen {}",
            pattern.record.label.bold(),
            pattern.current_strength,
            pattern.record.support_count,
            pattern.record.last_observed.to_rfc3339()
        );
    }
}
