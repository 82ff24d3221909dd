//! Resolve a folder path under a datacenter

use crate::util;
use anyhow::{Context, Result};
use folders::PathResolver;
use serde::Serialize;
use std::path::Path;
use vc_core::{InventoryProvider, ManagedRef};

#[derive(Serialize)]
struct ResolveOutput {
    folder: ManagedRef,
    children: Vec<ManagedRef>,
    /// Folders created on the way, as `parent/name`
    created: Vec<String>,
}

pub async fn run(inventory: &Path, datacenter: &str, segments: &[String], save: bool) -> Result<()> {
    let sim = util::load_inventory(inventory)?;

    let dc = sim
        .find_datacenter(datacenter)
        .await?
        .with_context(|| format!("Datacenter not found: {}", datacenter))?;
    let base = sim.vm_folder_of(&dc).await?;

    let resolver = PathResolver::new(&sim, base);
    let resolved = resolver
        .resolve_fresh(segments)
        .await
        .with_context(|| format!("Failed to resolve {}", segments.join("/")))?;

    let created: Vec<String> = sim
        .folder_creations()
        .into_iter()
        .map(|(parent, name)| format!("{}/{}", parent, name))
        .collect();
    util::status(!created.is_empty(), &format!("Resolved {} to {}", segments.join("/"), resolved.folder));

    util::finish_inventory(&sim, inventory, save)?;
    util::print_json(&ResolveOutput {
        folder: resolved.folder,
        children: resolved.children,
        created,
    })
}
