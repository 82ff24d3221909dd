//! Provision a guest from a request file

use crate::util;
use anyhow::{Context, Result};
use placement::Provisioner;
use std::path::Path;
use vc_core::ProvisionRequest;

pub async fn run(inventory: &Path, request: &Path, save: bool) -> Result<()> {
    let config = vc_core::config::load().context("Failed to load configuration")?;
    let request: ProvisionRequest = util::read_json(request)?;
    let sim = util::load_inventory(inventory)?;

    let provisioner = Provisioner::new(&sim, &sim, &sim, config.timing);

    let pb = util::spinner(&format!("Provisioning {}", request.guest));
    let result = provisioner.provision(&request).await;
    pb.finish_and_clear();

    let outcome = result.with_context(|| format!("Failed to provision {}", request.guest))?;

    if outcome.changed {
        util::status(true, &format!("Provisioned {}", outcome.vm));
    } else {
        util::status(false, &format!("{} already exists", outcome.vm));
    }

    util::finish_inventory(&sim, inventory, save)?;
    util::print_json(&outcome)
}
