//! Placement recommendation selection
//!
//! Walks the provider's recommendations in order and picks keys until the
//! group budget is spent. First match wins: once a disk is covered, later
//! recommendations targeting it are not considered for that disk.

use std::collections::BTreeSet;
use tracing::debug;
use vc_core::{ProvisionError, Recommendation, Result};

/// Keys to apply, in provider order
///
/// Fails with [`ProvisionError::IncompleteCoverage`] when the chosen keys
/// leave any of `disk_ids` without a placement, and with
/// [`ProvisionError::NoRecommendations`] when nothing could be chosen.
pub fn select_recommendations(
    recommendations: &[Recommendation],
    required_groups: usize,
    disk_ids: &[i32],
) -> Result<Vec<String>> {
    let mut outstanding: BTreeSet<i32> = disk_ids.iter().copied().collect();
    let mut selected: Vec<String> = Vec::new();

    for rec in recommendations {
        if selected.len() >= required_groups {
            break;
        }

        let accepted = if rec.has_disk_detail() {
            let targets: BTreeSet<i32> = rec.disk_ids().collect();
            if targets.iter().any(|id| outstanding.contains(id)) {
                outstanding.retain(|id| !targets.contains(id));
                true
            } else {
                false
            }
        } else {
            // Whole-entity moves take a slot unconditionally
            true
        };

        if accepted && !selected.contains(&rec.key) {
            debug!("Selected recommendation {}", rec.key);
            selected.push(rec.key.clone());
        }
    }

    if !outstanding.is_empty() {
        return Err(ProvisionError::IncompleteCoverage {
            required_groups,
            uncovered: outstanding.into_iter().collect(),
        });
    }
    if selected.is_empty() {
        return Err(ProvisionError::NoRecommendations);
    }
    Ok(selected)
}
