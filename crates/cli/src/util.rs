//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use vc_core::SimulatedVcenter;

/// Load the inventory snapshot backing a command
pub fn load_inventory(path: &Path) -> Result<SimulatedVcenter> {
    debug!("Loading inventory from {}", path.display());
    SimulatedVcenter::load(path).with_context(|| format!("Failed to load inventory from {}", path.display()))
}

/// Write the inventory back when `--save` was given
pub fn finish_inventory(sim: &SimulatedVcenter, path: &Path, save: bool) -> Result<()> {
    if !save {
        debug!("Inventory changes discarded (no --save)");
        return Ok(());
    }
    info!("Saving inventory to {}", path.display());
    sim.save(path)
        .with_context(|| format!("Failed to save inventory to {}", path.display()))?;
    eprintln!("{} Saved inventory to {}", "✓".green(), path.display());
    Ok(())
}

/// Read and parse a JSON file
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Print a result as pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize result")?;
    println!("{}", text);
    Ok(())
}

/// Spinner on stderr; hidden when stderr is not a terminal
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"])
        .template("{spinner} {msg} {elapsed:.dim}")
    {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Split `key=value` arguments
pub fn parse_pairs(values: &[String]) -> Result<Vec<(String, String)>> {
    values
        .iter()
        .map(|item| {
            let (key, value) = item
                .split_once('=')
                .with_context(|| format!("Invalid attribute '{}': expected key=value", item))?;
            if key.trim().is_empty() {
                anyhow::bail!("Invalid attribute '{}': empty key", item);
            }
            Ok((key.trim().to_string(), value.to_string()))
        })
        .collect()
}

/// Print a status line on stderr
pub fn status(changed: bool, message: &str) {
    if changed {
        eprintln!("{} {}", "✓".green(), message);
    } else {
        eprintln!("{} {}", "=".dimmed(), message.dimmed());
    }
}
