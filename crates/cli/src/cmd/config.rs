//! Configuration management command
//!
//! Provides CLI interface to view and edit the timing configuration.

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use vc_core::config::{self, ProvisionConfig};

const KEYS: [&str; 5] = [
    "timing.poll_interval_secs",
    "timing.task_timeout_secs",
    "timing.retry_backoff_secs",
    "timing.duplicate_settle_secs",
    "timing.max_attempts",
];

fn value_of(config: &ProvisionConfig, key: &str) -> Result<String> {
    let timing = &config.timing;
    let value = match key {
        "timing.poll_interval_secs" => timing.poll_interval_secs.to_string(),
        "timing.task_timeout_secs" => timing.task_timeout_secs.to_string(),
        "timing.retry_backoff_secs" => timing.retry_backoff_secs.to_string(),
        "timing.duplicate_settle_secs" => timing.duplicate_settle_secs.to_string(),
        "timing.max_attempts" => timing.max_attempts.to_string(),
        _ => anyhow::bail!(
            "Unknown config key: {}. Use 'vmclone config list' to see available keys.",
            key
        ),
    };
    Ok(value)
}

/// List all configuration values
pub async fn run_list() -> Result<()> {
    let config = config::load()?;
    let config_path = config::config_file_path().context("Could not determine config file path")?;

    println!("{}", "Timing Configuration".bold());
    println!("{}: {}\n", "Location".dimmed(), config_path.display().dimmed());

    println!("{}", "[timing]".yellow());
    for key in KEYS {
        let name = key.trim_start_matches("timing.");
        println!("  {} = {}", name.cyan(), value_of(&config, key)?);
    }

    println!("\n{}", "Valid Ranges:".bold());
    println!("  poll_interval_secs: 1-60 (less than task_timeout_secs)");
    println!("  task_timeout_secs: 10-86400");
    println!("  retry_backoff_secs: 0-3600");
    println!("  duplicate_settle_secs: 0-3600");
    println!("  max_attempts: 1-10");

    Ok(())
}

/// Get a single configuration value
pub async fn run_get(key: &str) -> Result<()> {
    let config = config::load()?;
    println!("{}", value_of(&config, key)?);
    Ok(())
}

/// Set a configuration value
pub async fn run_set(key: &str, value: &str) -> Result<()> {
    let mut config = config::load()?;
    let timing = &mut config.timing;

    match key {
        "timing.poll_interval_secs" => {
            timing.poll_interval_secs = value.parse().context("Invalid value: must be a positive integer")?;
        }
        "timing.task_timeout_secs" => {
            timing.task_timeout_secs = value.parse().context("Invalid value: must be a positive integer")?;
        }
        "timing.retry_backoff_secs" => {
            timing.retry_backoff_secs = value.parse().context("Invalid value: must be a non-negative integer")?;
        }
        "timing.duplicate_settle_secs" => {
            timing.duplicate_settle_secs = value.parse().context("Invalid value: must be a non-negative integer")?;
        }
        "timing.max_attempts" => {
            timing.max_attempts = value.parse().context("Invalid value: must be a positive integer")?;
        }
        _ => anyhow::bail!(
            "Unknown config key: {}. Use 'vmclone config list' to see available keys.",
            key
        ),
    }

    // Validate before saving
    config.validate().context("Invalid configuration value")?;
    config::save(&config)?;

    println!("{} {} = {}", "✓".green(), key.cyan(), value);
    Ok(())
}

/// Show the config file path and optionally create it
pub async fn run_path(create: bool) -> Result<()> {
    let config_path = config::config_file_path().context("Could not determine config file path")?;

    if create && !config_path.exists() {
        config::init_if_missing()?;
        println!("{} Created config file at: {}", "✓".green(), config_path.display());
    } else if config_path.exists() {
        println!("{}", config_path.display());
    } else {
        println!("{}", config_path.display());
        println!("{}", "File does not exist. Use --create to create it.".yellow());
    }

    Ok(())
}

/// Show example configuration
pub async fn run_example() -> Result<()> {
    println!("{}", config::example_config());
    Ok(())
}
