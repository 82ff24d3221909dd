//! Remote fault adapter
//!
//! Provider errors arrive as free text. This is the only place that looks
//! inside that text; everything downstream matches on [`FaultKind`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fault name the provider uses when an entity with the same name exists
pub const DUPLICATE_NAME_FAULT: &str = "DuplicateName";

/// Structured classification of a remote failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultKind {
    /// The resource being created already exists
    DuplicateName,
    /// Anything else
    Other,
}

/// A failure reported by the remote API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFault {
    pub kind: FaultKind,
    pub message: String,
}

impl RemoteFault {
    /// Build a fault from a provider message, classifying it
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = if is_duplicate_message(&message) {
            FaultKind::DuplicateName
        } else {
            FaultKind::Other
        };
        Self { kind, message }
    }

    /// Fault for an entity name that is already taken
    pub fn duplicate_name(name: &str) -> Self {
        Self {
            kind: FaultKind::DuplicateName,
            message: format!("{}: The name '{}' already exists.", DUPLICATE_NAME_FAULT, name),
        }
    }

    pub fn is_duplicate(&self) -> bool {
        self.kind == FaultKind::DuplicateName
    }
}

impl fmt::Display for RemoteFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for RemoteFault {}

fn is_duplicate_message(message: &str) -> bool {
    message.contains(DUPLICATE_NAME_FAULT) || message.to_ascii_lowercase().contains("already exists")
}
