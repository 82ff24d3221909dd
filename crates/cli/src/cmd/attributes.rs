//! Set custom attributes on a VM

use crate::util;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use placement::apply_attributes;
use std::path::Path;

pub async fn run(inventory: &Path, guest: &str, values: &[String], save: bool) -> Result<()> {
    let pairs = util::parse_pairs(values)?;
    let sim = util::load_inventory(inventory)?;

    let report = apply_attributes(&sim, &sim, guest, &pairs)
        .await
        .with_context(|| format!("Failed to set attributes on {}", guest))?;

    util::status(report.changed, &format!("{} attribute(s) set on {}", report.changes.len(), guest));
    for failed in &report.failed_keys {
        eprintln!("  {} {}", "✗".red(), failed);
    }

    util::finish_inventory(&sim, inventory, save)?;
    util::print_json(&report)
}
