//! Core types for template-based VM provisioning
//!
//! This crate provides:
//! - Inventory model (managed references, folder records, recommendations)
//! - Error taxonomy and remote fault classification
//! - Async ports to the virtualization-management API
//! - Disk plans, clone requests and outcomes
//! - Task waiting and timing configuration
//! - A simulated in-memory backend

pub mod config;
pub mod disk;
pub mod error;
pub mod fault;
pub mod model;
pub mod ports;
pub mod request;
pub mod sim;
pub mod task;

// Re-exports
pub use config::{ProvisionConfig, TimingConfig};
pub use disk::{DiskDetail, DiskPlan, DiskSpec, DiskType};
pub use error::{ProvisionError, Result};
pub use fault::{FaultKind, RemoteFault};
pub use model::{
    DiskRelocation, EntityKind, FolderRecord, ManagedRef, Recommendation, RelocationAction, TaskHandle, TaskStatus,
};
pub use ports::{AttributePort, ClonePlacementPort, InventoryProvider, RemoteResult, TaskPort};
pub use request::{CloneSpec, GuestCustomization, NicSpec, PlacementSpec, ProvisionOutcome, ProvisionRequest};
pub use sim::{InventorySnapshot, SimulatedVcenter, TaskScript};
pub use task::TaskWaiter;
