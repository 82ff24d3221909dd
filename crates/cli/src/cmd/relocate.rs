//! Move VMs into a folder path

use crate::util;
use anyhow::{Context, Result};
use folders::Relocator;
use std::path::Path;

pub async fn run(inventory: &Path, datacenter: &str, folder: &[String], vms: &[String], save: bool) -> Result<()> {
    let config = vc_core::config::load().context("Failed to load configuration")?;
    let sim = util::load_inventory(inventory)?;

    let relocator = Relocator::new(&sim, &sim, &config.timing);

    let pb = util::spinner(&format!("Moving {} VM(s)", vms.len()));
    let result = relocator.relocate(datacenter, folder, vms).await;
    pb.finish_and_clear();

    let report = result.with_context(|| format!("Failed to move VMs into {}", folder.join("/")))?;

    if report.changed {
        util::status(true, &format!("Moved {} into {}", report.moved.join(", "), folder.join("/")));
    } else {
        util::status(false, "Nothing to move");
    }

    util::finish_inventory(&sim, inventory, save)?;
    util::print_json(&report)
}
