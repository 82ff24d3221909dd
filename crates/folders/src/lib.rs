//! Folder path resolution for the VM inventory
//!
//! This crate provides:
//! - Candidate forest arena for matching name paths
//! - Path resolver with on-demand creation of missing levels
//! - Destination-folder lookup for clones
//! - Relocation of existing VMs into a folder path

pub mod destination;
pub mod forest;
pub mod relocate;
pub mod resolver;

// Re-exports
pub use destination::{datacenter_of, destination_folder};
pub use forest::CandidateForest;
pub use relocate::{RelocateReport, Relocator};
pub use resolver::{clean_segments, match_path, PathResolver, ResolvedFolder};
