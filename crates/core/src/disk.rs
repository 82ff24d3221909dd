//! Disk plan derived from the caller's disk map
//!
//! The caller supplies disks keyed by label. The label `os_disk` describes
//! where the cloned OS disk goes; every other label is an additional data
//! disk. Data disks are numbered in sorted label order and receive negative
//! placeholder device keys, which is how the storage scheduler refers to
//! not-yet-created disks in its recommendations.

use crate::error::{ProvisionError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Label of the OS disk entry
pub const OS_DISK_LABEL: &str = "os_disk";

/// Disk provisioning type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiskType {
    Thin,
    Thick,
    Eager,
}

/// Disk entry as supplied by the caller; every field is optional until validated
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskSpec {
    #[serde(default)]
    pub datastore: Option<String>,
    #[serde(default)]
    pub datastore_cluster: Option<String>,
    #[serde(default)]
    pub size_gb: Option<u64>,
    #[serde(default, rename = "type")]
    pub disk_type: Option<DiskType>,
    #[serde(default)]
    pub mount_point: Option<String>,
    #[serde(default)]
    pub fs_type: Option<String>,
}

/// Validated data disk, reported back to the caller on success
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskDetail {
    pub label: String,
    pub datastore: Option<String>,
    pub datastore_cluster: Option<String>,
    pub size_gb: u64,
    #[serde(rename = "type")]
    pub disk_type: DiskType,
    pub mount_point: String,
    pub fs_type: String,
    /// 1-based unit number on the added controller
    pub drive_id: String,
    /// Placeholder device key used in placement recommendations
    pub device_key: i32,
}

impl DiskDetail {
    fn from_spec(label: &str, spec: &DiskSpec, index: usize) -> Result<Self> {
        let missing = |field: &str| ProvisionError::InvalidDisk {
            label: label.to_string(),
            reason: format!("{} not specified", field),
        };

        if spec.datastore.is_none() && spec.datastore_cluster.is_none() {
            return Err(ProvisionError::InvalidDisk {
                label: label.to_string(),
                reason: "did not find datastore or datastore_cluster".to_string(),
            });
        }

        // A named datastore wins over a cluster for data disks
        let (datastore, datastore_cluster) = match &spec.datastore {
            Some(ds) => (Some(ds.clone()), None),
            None => (None, spec.datastore_cluster.clone()),
        };

        let position = index as i32 + 1;
        Ok(Self {
            label: label.to_string(),
            datastore,
            datastore_cluster,
            size_gb: spec.size_gb.ok_or_else(|| missing("size_gb"))?,
            disk_type: spec.disk_type.ok_or_else(|| missing("type"))?,
            mount_point: spec.mount_point.clone().ok_or_else(|| missing("mount_point"))?,
            fs_type: spec.fs_type.clone().ok_or_else(|| missing("fs_type"))?,
            drive_id: position.to_string(),
            device_key: -position,
        })
    }
}

/// Everything the orchestrator needs to know about disks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskPlan {
    /// Datastore for the OS disk, when pinned to one
    pub os_datastore: Option<String>,
    /// Storage cluster for the OS disk; `Some` means placement is required
    pub storage_pod: Option<String>,
    /// Data disks to add, in device-key order
    pub data_disks: Vec<DiskDetail>,
    /// Number of placement groups the selector may use
    pub required_groups: usize,
}

impl DiskPlan {
    /// Build the plan from the caller's disk map
    ///
    /// Template creation skips the data disks and always needs a single
    /// placement group.
    pub fn build(disks: &BTreeMap<String, DiskSpec>, creating_template: bool) -> Result<Self> {
        let os_disk = disks.get(OS_DISK_LABEL);

        let data_disks = if creating_template {
            Vec::new()
        } else {
            disks
                .iter()
                .filter(|(label, _)| label.as_str() != OS_DISK_LABEL)
                .enumerate()
                .map(|(index, (label, spec))| DiskDetail::from_spec(label, spec, index))
                .collect::<Result<Vec<_>>>()?
        };

        let (os_datastore, storage_pod) = match os_disk {
            Some(spec) => match (&spec.datastore_cluster, &spec.datastore) {
                (Some(cluster), _) => (None, Some(cluster.clone())),
                (None, Some(ds)) => (Some(ds.clone()), None),
                (None, None) => (None, None),
            },
            None => (None, None),
        };

        // Clusters the disks actually land on, after pinned datastores win
        let required_groups = if creating_template {
            1
        } else {
            storage_pod
                .iter()
                .chain(data_disks.iter().filter_map(|d| d.datastore_cluster.as_ref()))
                .collect::<BTreeSet<_>>()
                .len()
        };

        Ok(Self {
            os_datastore,
            storage_pod,
            data_disks,
            required_groups,
        })
    }

    /// Whether the clone goes through storage-cluster placement
    pub fn needs_placement(&self) -> bool {
        self.storage_pod.is_some()
    }

    /// Device keys of the data disks placed by the storage scheduler
    ///
    /// This is the selector's outstanding set. Disks pinned to a named
    /// datastore never appear in recommendations.
    pub fn disk_ids(&self) -> Vec<i32> {
        self.data_disks
            .iter()
            .filter(|d| d.datastore_cluster.is_some())
            .map(|d| d.device_key)
            .collect()
    }

    /// Data disk details keyed by caller label
    pub fn detail_map(&self) -> BTreeMap<String, DiskDetail> {
        self.data_disks
            .iter()
            .map(|d| (d.label.clone(), d.clone()))
            .collect()
    }
}
