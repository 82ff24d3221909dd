//! Move existing VMs into a folder path

use crate::resolver::PathResolver;
use serde::Serialize;
use tracing::{info, warn};
use vc_core::{InventoryProvider, ManagedRef, ProvisionError, Result, TaskPort, TaskWaiter, TimingConfig};

/// Outcome of a relocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelocateReport {
    pub changed: bool,
    /// Names of the VMs that were moved
    pub moved: Vec<String>,
    /// Requested names with no matching VM
    pub missing: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<ManagedRef>,
}

/// Moves VMs into a folder under a named datacenter
pub struct Relocator<'a> {
    inventory: &'a dyn InventoryProvider,
    tasks: &'a dyn TaskPort,
    timing: &'a TimingConfig,
}

impl<'a> Relocator<'a> {
    pub fn new(inventory: &'a dyn InventoryProvider, tasks: &'a dyn TaskPort, timing: &'a TimingConfig) -> Self {
        Self {
            inventory,
            tasks,
            timing,
        }
    }

    /// Move every VM in `vm_names` into `path` below `datacenter`'s VM folder
    ///
    /// The path is created when missing. VMs already in the folder are left
    /// alone; a failing move task is fatal.
    pub async fn relocate(&self, datacenter: &str, path: &[String], vm_names: &[String]) -> Result<RelocateReport> {
        let mut report = RelocateReport::default();

        let mut found: Vec<(String, ManagedRef)> = Vec::new();
        for name in vm_names {
            let vms = self.inventory.find_vms(name).await?;
            if vms.is_empty() {
                warn!("VM '{}' not found, skipping", name);
                report.missing.push(name.clone());
            }
            for vm in vms {
                // Each VM is moved once, however often it was named
                if !found.iter().any(|(_, seen)| seen == &vm) {
                    found.push((name.clone(), vm));
                }
            }
        }
        if found.is_empty() {
            return Ok(report);
        }

        let dc = self
            .inventory
            .find_datacenter(datacenter)
            .await?
            .ok_or_else(|| ProvisionError::DatacenterNotFound(datacenter.to_string()))?;
        let base = self.inventory.vm_folder_of(&dc).await?;

        let resolver = PathResolver::new(self.inventory, base);
        let target = resolver.resolve_fresh(path).await?;
        report.folder = Some(target.folder.clone());

        found.retain(|(_, vm)| !target.children.contains(vm));
        if found.is_empty() {
            return Ok(report);
        }

        let refs: Vec<ManagedRef> = found.iter().map(|(_, vm)| vm.clone()).collect();
        info!("Moving {} VM(s) into {}", refs.len(), target.folder);
        let handle = self.inventory.move_into_folder(&target.folder, &refs).await?;

        let waiter = TaskWaiter::new(self.tasks, self.timing);
        waiter.wait(&handle, "Move VMs").await?;

        for (name, _) in found {
            if !report.moved.contains(&name) {
                report.moved.push(name);
            }
        }
        report.changed = true;
        Ok(report)
    }
}
