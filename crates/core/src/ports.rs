//! Ports to the remote virtualization-management API
//!
//! Session bootstrap, credentials and payload construction live behind
//! these traits. Implementations are expected to map provider errors to
//! [`RemoteFault`] with [`RemoteFault::from_message`].

use crate::fault::RemoteFault;
use crate::model::{FolderRecord, ManagedRef, Recommendation, TaskHandle, TaskStatus};
use crate::request::{CloneSpec, PlacementSpec};
use async_trait::async_trait;

/// Result of a single remote call
pub type RemoteResult<T> = std::result::Result<T, RemoteFault>;

/// Read access to the folder inventory plus the folder-level mutations
#[async_trait]
pub trait InventoryProvider: Send + Sync {
    /// Flat listing of every VM folder below `root` (recursive)
    async fn list_folders_under(&self, root: &ManagedRef) -> RemoteResult<Vec<FolderRecord>>;

    /// Create a folder named `name` directly under `parent`
    async fn create_folder(&self, parent: &ManagedRef, name: &str) -> RemoteResult<FolderRecord>;

    /// All virtual machines (and templates) with the given name
    async fn find_vms(&self, name: &str) -> RemoteResult<Vec<ManagedRef>>;

    /// Parent of an entity, `None` at the inventory root
    async fn parent_of(&self, entity: &ManagedRef) -> RemoteResult<Option<ManagedRef>>;

    /// Root VM folder of a datacenter
    async fn vm_folder_of(&self, datacenter: &ManagedRef) -> RemoteResult<ManagedRef>;

    /// Datacenter with the given name
    async fn find_datacenter(&self, name: &str) -> RemoteResult<Option<ManagedRef>>;

    /// Start moving `entities` into `folder`
    async fn move_into_folder(&self, folder: &ManagedRef, entities: &[ManagedRef]) -> RemoteResult<TaskHandle>;
}

/// Clone and storage-placement operations
#[async_trait]
pub trait ClonePlacementPort: Send + Sync {
    /// Ask the storage scheduler for placement recommendations
    async fn recommend_placement(&self, spec: &PlacementSpec) -> RemoteResult<Vec<Recommendation>>;

    /// Apply the selected recommendations; the task result is the new VM
    async fn apply_recommendation(&self, keys: &[String]) -> RemoteResult<TaskHandle>;

    /// Clone without storage-cluster placement
    async fn clone_direct(&self, folder: &ManagedRef, name: &str, spec: &CloneSpec) -> RemoteResult<TaskHandle>;
}

/// Status queries for remote tasks
#[async_trait]
pub trait TaskPort: Send + Sync {
    async fn poll(&self, handle: &TaskHandle) -> RemoteResult<TaskStatus>;

    /// Result entity of a successful task
    async fn result(&self, handle: &TaskHandle) -> RemoteResult<Option<ManagedRef>>;

    /// Fault of a failed task
    async fn error(&self, handle: &TaskHandle) -> RemoteResult<RemoteFault>;
}

/// Custom attribute (custom field) access on virtual machines
#[async_trait]
pub trait AttributePort: Send + Sync {
    /// Attribute names defined for the VM
    async fn available_fields(&self, vm: &ManagedRef) -> RemoteResult<Vec<String>>;

    async fn set_custom_value(&self, vm: &ManagedRef, key: &str, value: &str) -> RemoteResult<()>;
}
