//! Clone placement and provisioning
//!
//! This crate provides:
//! - Placement recommendation selection
//! - The clone state machine with retries and duplicate recovery
//! - Custom attribute application

pub mod attributes;
pub mod orchestrator;
pub mod selector;

// Re-exports
pub use attributes::{apply_attributes, AttributeReport};
pub use orchestrator::{CloneJob, CloneState, Provisioner, RetryLedger};
pub use selector::select_recommendations;
