//! Error taxonomy for folder resolution and provisioning

use crate::fault::RemoteFault;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while resolving folders or provisioning a clone
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// More than one equally deep folder chain matches the path
    #[error("Found more than one matching folder for structure: {}. Be more unique!", format_path(.path))]
    AmbiguousPath { path: Vec<String>, matches: usize },

    /// No folder chain matches, even after creating the missing levels
    #[error("Could not find any matching folder for structure: {}.", format_path(.path))]
    UnresolvablePath { path: Vec<String> },

    /// The selected recommendations leave some disks without a placement
    #[error("Recommendations cover only part of the requested disks within {required_groups} placement group(s); uncovered disk ids: {uncovered:?}")]
    IncompleteCoverage {
        required_groups: usize,
        uncovered: Vec<i32>,
    },

    /// The provider returned nothing usable to apply
    #[error("No usable placement recommendation was returned")]
    NoRecommendations,

    /// A remote task stayed running past the timeout
    #[error("vCenter Timeout: Task took longer than {} seconds to complete.", secs(.timeout))]
    TaskTimeout { timeout: Duration },

    /// A remote task finished with an error
    #[error("{0}")]
    TaskExecution(RemoteFault),

    /// A remote call was rejected before any task started
    #[error("{0}")]
    Remote(#[from] RemoteFault),

    #[error("Could not find VM Template: {0}")]
    TemplateNotFound(String),

    #[error("Found existing VM with name {0}")]
    VmAlreadyExists(String),

    #[error("Could not find VM: {0}")]
    VmNotFound(String),

    #[error("Could not find datacenter for {0}")]
    DatacenterNotFound(String),

    #[error("Invalid disk '{label}': {reason}")]
    InvalidDisk { label: String, reason: String },

    /// Retry budget exhausted; carries every distinct failure seen
    #[error("Could not clone VM after {attempts} attempts: {}", format_errors(.errors))]
    Exhausted { attempts: u32, errors: Vec<String> },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ProvisionError {
    /// Whether another clone attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProvisionError::TaskTimeout { .. }
                | ProvisionError::TaskExecution(_)
                | ProvisionError::Remote(_)
                | ProvisionError::NoRecommendations
        )
    }

    /// The remote fault behind this error, if any
    pub fn fault(&self) -> Option<&RemoteFault> {
        match self {
            ProvisionError::TaskExecution(fault) | ProvisionError::Remote(fault) => Some(fault),
            _ => None,
        }
    }
}

/// Result type for provisioning operations
pub type Result<T> = std::result::Result<T, ProvisionError>;

fn format_path(path: &[String]) -> String {
    serde_json::to_string(path).unwrap_or_else(|_| path.join(","))
}

fn secs(duration: &Duration) -> u64 {
    duration.as_secs()
}

fn format_errors(errors: &[String]) -> String {
    serde_json::to_string(errors).unwrap_or_else(|_| errors.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_messages() {
        let err = ProvisionError::AmbiguousPath {
            path: vec!["prod".to_string(), "web".to_string()],
            matches: 2,
        };
        assert_eq!(
            err.to_string(),
            r#"Found more than one matching folder for structure: ["prod","web"]. Be more unique!"#
        );

        let err = ProvisionError::UnresolvablePath { path: vec!["prod".to_string()] };
        assert!(err.to_string().contains(r#"["prod"]"#));
    }

    #[test]
    fn test_exhausted_lists_errors() {
        let err = ProvisionError::Exhausted {
            attempts: 3,
            errors: vec!["boom".to_string(), "bang".to_string()],
        };
        assert_eq!(err.to_string(), r#"Could not clone VM after 3 attempts: ["boom","bang"]"#);
    }

    #[test]
    fn test_timeout_message() {
        let err = ProvisionError::TaskTimeout { timeout: Duration::from_secs(600) };
        assert_eq!(
            err.to_string(),
            "vCenter Timeout: Task took longer than 600 seconds to complete."
        );
    }

    #[test]
    fn test_retry_classification() {
        assert!(ProvisionError::TaskTimeout { timeout: Duration::from_secs(1) }.is_retryable());
        assert!(ProvisionError::TaskExecution(RemoteFault::from_message("x")).is_retryable());
        assert!(!ProvisionError::IncompleteCoverage { required_groups: 1, uncovered: vec![-2] }.is_retryable());
        assert!(!ProvisionError::AmbiguousPath { path: vec![], matches: 2 }.is_retryable());
    }

    #[test]
    fn test_fault_access() {
        let err = ProvisionError::TaskExecution(RemoteFault::duplicate_name("web01"));
        assert!(err.fault().map(|f| f.is_duplicate()).unwrap_or(false));
        assert!(ProvisionError::NoRecommendations.fault().is_none());
    }
}
