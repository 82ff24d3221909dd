//! Inventory and placement data model
//!
//! These are immutable snapshots handed out by the remote API. Nothing in
//! the resolver or orchestrator mutates a record after it is received.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type of a managed entity in the remote inventory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Folder,
    VirtualMachine,
    Datacenter,
    Datastore,
    StoragePod,
    ClusterComputeResource,
    ResourcePool,
    Network,
    Task,
}

/// Opaque reference to a managed entity (type + server-assigned id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ManagedRef {
    pub kind: EntityKind,
    pub value: String,
}

impl ManagedRef {
    pub fn new(kind: EntityKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn folder(value: impl Into<String>) -> Self {
        Self::new(EntityKind::Folder, value)
    }

    pub fn vm(value: impl Into<String>) -> Self {
        Self::new(EntityKind::VirtualMachine, value)
    }

    pub fn datacenter(value: impl Into<String>) -> Self {
        Self::new(EntityKind::Datacenter, value)
    }
}

impl fmt::Display for ManagedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{}", self.kind, self.value)
    }
}

/// One folder as reported by the inventory snapshot
///
/// `name` is not globally unique: the same display name may appear at
/// several nesting levels or in sibling branches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRecord {
    /// Reference to this folder
    pub folder: ManagedRef,
    /// Display name
    pub name: String,
    /// Direct children (folders, VMs, ...) in provider order
    pub children: Vec<ManagedRef>,
    /// Parent entity (folder or datacenter), if any
    pub parent: Option<ManagedRef>,
}

impl FolderRecord {
    /// Check whether `entity` is a direct child of this folder
    pub fn contains(&self, entity: &ManagedRef) -> bool {
        self.children.iter().any(|child| child == entity)
    }

    /// Whether this folder holds virtual machines
    ///
    /// Host, datastore and network folders are filtered out of inventory
    /// listings: a VM folder is empty or starts with a folder or a VM.
    pub fn is_vm_folder(&self) -> bool {
        match self.children.first() {
            None => true,
            Some(first) => matches!(
                first.kind,
                EntityKind::Folder | EntityKind::VirtualMachine
            ),
        }
    }
}

/// Per-disk relocation target inside a recommendation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskRelocation {
    pub disk_id: i32,
    pub datastore: ManagedRef,
}

/// A single relocation step proposed by the storage scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelocationAction {
    /// Places individual disks on datastores
    Disks { disks: Vec<DiskRelocation> },
    /// Moves the whole entity, no disk-level detail
    WholeEntity {
        #[serde(default)]
        datastore: Option<ManagedRef>,
    },
}

impl RelocationAction {
    /// Disk relocations carried by this action (empty for whole-entity moves)
    pub fn disks(&self) -> &[DiskRelocation] {
        match self {
            RelocationAction::Disks { disks } => disks,
            RelocationAction::WholeEntity { .. } => &[],
        }
    }
}

/// Placement recommendation, identified by an opaque key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub key: String,
    pub actions: Vec<RelocationAction>,
}

impl Recommendation {
    /// All disk ids targeted by any action, in action order
    pub fn disk_ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.actions
            .iter()
            .flat_map(|action| action.disks().iter().map(|d| d.disk_id))
    }

    /// Whether any action carries per-disk detail
    pub fn has_disk_detail(&self) -> bool {
        self.actions.iter().any(|action| !action.disks().is_empty())
    }
}

/// Handle of a remote asynchronous task
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskHandle(pub String);

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Coarse state of a remote task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Success,
    Error,
}
