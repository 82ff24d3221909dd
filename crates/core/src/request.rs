//! Caller-facing request and outcome types, plus the clone descriptions
//! handed to the placement port

use crate::disk::{DiskDetail, DiskSpec};
use crate::model::ManagedRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Guest OS customization fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestCustomization {
    #[serde(default)]
    pub domain: Option<String>,
    /// OS family, e.g. "linux" or "windows2019"
    #[serde(default)]
    pub os_family: Option<String>,
    #[serde(default)]
    pub windows_product_id: Option<String>,
    #[serde(default)]
    pub windows_organization: Option<String>,
    #[serde(default)]
    pub windows_provisioner_name: Option<String>,
}

impl GuestCustomization {
    pub fn is_windows(&self) -> bool {
        self.os_family
            .as_deref()
            .map(|family| family.to_ascii_lowercase().contains("windows"))
            .unwrap_or(false)
    }
}

/// Network adapter request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NicSpec {
    /// Port group / network name
    pub name: String,
    pub position: u32,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub netmask: Option<String>,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub dns: Vec<String>,
}

/// Everything the caller asks for when provisioning a guest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionRequest {
    /// Name of the VM (or template) to create
    pub guest: String,
    /// Name of the template to clone from
    pub template: String,
    /// Compute cluster to place the guest on
    pub cluster: String,
    /// Disks keyed by label; `os_disk` is the OS disk
    #[serde(default)]
    pub disks: BTreeMap<String, DiskSpec>,
    /// Ordered destination folder path below the datacenter VM folder
    #[serde(default)]
    pub folder_path: Option<Vec<String>>,
    #[serde(default)]
    pub nics: BTreeMap<String, NicSpec>,
    #[serde(default)]
    pub cpu: Option<u32>,
    #[serde(default)]
    pub memory_mb: Option<u64>,
    #[serde(default)]
    pub customization: GuestCustomization,
    /// Create a template instead of a powered-on VM
    #[serde(default)]
    pub create_template: bool,
}

impl ProvisionRequest {
    /// NICs sorted by position
    pub fn ordered_nics(&self) -> Vec<NicSpec> {
        let mut nics: Vec<NicSpec> = self.nics.values().cloned().collect();
        nics.sort_by_key(|nic| nic.position);
        nics
    }
}

/// Typed clone description; turning it into a provider payload is the port's job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneSpec {
    pub template: ManagedRef,
    pub cluster: String,
    /// Datastore for the OS disk when not placed by a storage cluster
    pub datastore: Option<String>,
    pub disks: Vec<DiskDetail>,
    pub nics: Vec<NicSpec>,
    pub cpu: Option<u32>,
    pub memory_mb: Option<u64>,
    /// `None` when creating a template
    pub customization: Option<GuestCustomization>,
    pub power_on: bool,
    pub mark_as_template: bool,
}

/// Storage placement request for a clone into a storage cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementSpec {
    pub clone_name: String,
    pub folder: ManagedRef,
    /// Storage cluster of the OS disk
    pub storage_pod: String,
    pub clone: CloneSpec,
}

/// Result of a provisioning run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionOutcome {
    /// Requested guest name
    pub vm: String,
    /// Created VM, absent when nothing new was reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_ref: Option<ManagedRef>,
    /// Data disk details keyed by label
    pub disk: BTreeMap<String, DiskDetail>,
    pub changed: bool,
}

impl ProvisionOutcome {
    /// Outcome for a guest that already existed
    pub fn unchanged(vm: &str) -> Self {
        Self {
            vm: vm.to_string(),
            vm_ref: None,
            disk: BTreeMap::new(),
            changed: false,
        }
    }
}
