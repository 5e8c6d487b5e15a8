// Copyright (c) 2026 Signal Field Contributors
// SPDX-License-Identifier: AGPL-3.0

//! `sigfield patterns` - list tracked patterns of a recovered field

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use signal_field_core::PatternFilter;

use super::{load_config, open_field, print_patterns};

#[derive(Args)]
pub struct PatternsArgs {
    /// Event log written by `sigfield ingest --log`
    #[arg(long, value_name = "FILE")]
    log: PathBuf,

    /// Only patterns whose label starts with this prefix
    #[arg(long)]
    prefix: Option<String>,

    /// Minimum current strength
    #[arg(long)]
    min_strength: Option<f64>,

    /// Minimum number of supporting matches
    #[arg(long)]
    min_support: Option<u64>,

    /// Print as JSON
    #[arg(long)]
    json: bool,
}

pub async fn execute(args: PatternsArgs, config_override: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_override)?;
    let field = open_field(config, Some(&args.log)).await?;

    let mut filter = PatternFilter::all();
    if let Some(prefix) = args.prefix {
        filter = filter.with_label_prefix(prefix);
    }
    if let Some(strength) = args.min_strength {
        filter = filter.with_min_strength(strength);
    }
    if let Some(support) = args.min_support {
        filter = filter.with_min_support(support);
    }

    let patterns = field.patterns(&filter);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&patterns)?);
    } else {
        print_patterns(&patterns);
    }
    Ok(())
}
