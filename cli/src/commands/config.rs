// Copyright (c) 2026 Signal Field Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use signal_field_core::{FieldConfig, CONFIG_PATH_ENV};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show {
        /// Also list the configuration sources that were checked
        #[arg(long)]
        paths: bool,
    },

    /// Check a configuration file against the field's constraints
    Validate {
        /// File to check (defaults to the discovered one)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Write the default configuration as YAML
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./signal-field.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, force } => generate(output, force).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    if show_paths {
        print_sources(config_override.as_ref());
    }

    let config = FieldConfig::load_or_default(config_override)
        .context("Could not resolve the field configuration")?;
    println!("{}", "Effective field configuration:".bold());
    println!();
    print!("{}", config.to_yaml_string()?);

    Ok(())
}

fn print_sources(explicit: Option<&PathBuf>) {
    println!("{}", "Configuration sources, highest precedence first:".bold());
    match explicit {
        Some(path) => println!("  --config        {}", path.display()),
        None => println!("  --config        {}", "(not given)".dimmed()),
    }
    if std::env::var_os(CONFIG_PATH_ENV).is_none() {
        println!("  {:<15} {}", CONFIG_PATH_ENV, "(not set)".dimmed());
    }
    for candidate in FieldConfig::config_candidates() {
        let marker = if candidate.exists() { "found".green() } else { "absent".dimmed() };
        println!("  {:<15} {} [{}]", "file", candidate.display(), marker);
    }

    let active = explicit.cloned().or_else(FieldConfig::discover_config);
    match active {
        Some(path) => println!("  In effect: {}", path.display().to_string().green()),
        None => println!("  In effect: {}", "built-in defaults".dimmed()),
    }
    println!();
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    let config = FieldConfig::load_or_default(config_path)
        .context("Could not resolve the field configuration")?;
    config.validate().context("Field configuration rejected")?;

    println!(
        "{} backlog {} records, {} cache entries, retention {}",
        "✓ Field configuration accepted:".green(),
        config.backlog_capacity,
        config.cache_capacity,
        humanize(config.retention_age)
    );

    Ok(())
}

fn humanize(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    match secs {
        s if s % 86_400 == 0 && s > 0 => format!("{}d", s / 86_400),
        s if s % 3_600 == 0 && s > 0 => format!("{}h", s / 3_600),
        s if s % 60 == 0 && s > 0 => format!("{}m", s / 60),
        s => format!("{}s", s),
    }
}

async fn generate(output: PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite",
            output.display()
        );
    }

    let sample = FieldConfig::default().to_yaml_string()?;
    tokio::fs::write(&output, sample)
        .await
        .with_context(|| format!("could not write {}", output.display()))?;

    println!("{} {}", "✓ Default field configuration written to".green(), output.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_humanize_picks_largest_whole_unit() {
        assert_eq!(humanize(Duration::from_secs(7 * 86_400)), "7d");
        assert_eq!(humanize(Duration::from_secs(7_200)), "2h");
        assert_eq!(humanize(Duration::from_secs(90)), "90s");
        assert_eq!(humanize(Duration::ZERO), "0s");
    }
}
