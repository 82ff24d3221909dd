//! Custom attribute values on an existing VM

use serde::Serialize;
use tracing::{debug, warn};
use vc_core::{AttributePort, InventoryProvider, ProvisionError, Result};

/// What happened to each requested attribute
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttributeReport {
    pub changed: bool,
    /// `key:value` pairs that were set
    pub changes: Vec<String>,
    /// `key:value` pairs the provider refused
    pub failed_keys: Vec<String>,
    /// Keys the VM does not define
    pub skipped: Vec<String>,
}

/// Set `values` on the VM named `guest`
///
/// Unknown keys are skipped and individual failures are collected; only a
/// missing VM or a failed field listing aborts.
pub async fn apply_attributes(
    inventory: &dyn InventoryProvider,
    attributes: &dyn AttributePort,
    guest: &str,
    values: &[(String, String)],
) -> Result<AttributeReport> {
    let vm = inventory
        .find_vms(guest)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ProvisionError::VmNotFound(guest.to_string()))?;

    let available = attributes.available_fields(&vm).await?;
    let mut report = AttributeReport::default();

    for (key, value) in values {
        if !available.contains(key) {
            debug!("{} has no custom field '{}'", guest, key);
            report.skipped.push(key.clone());
            continue;
        }

        match attributes.set_custom_value(&vm, key, value).await {
            Ok(()) => report.changes.push(format!("{}:{}", key, value)),
            Err(fault) => {
                warn!("Failed to set {} on {}: {}", key, guest, fault);
                report.failed_keys.push(format!("{}:{}", key, value));
            }
        }
    }

    report.changed = !report.changes.is_empty();
    Ok(report)
}
