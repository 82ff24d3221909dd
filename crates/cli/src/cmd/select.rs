//! Select placement recommendations from a file

use crate::util;
use anyhow::{Context, Result};
use placement::select_recommendations;
use serde::Serialize;
use std::path::Path;
use vc_core::Recommendation;

#[derive(Serialize)]
struct SelectOutput {
    keys: Vec<String>,
}

pub async fn run(recommendations: &Path, groups: usize, disks: &[i32]) -> Result<()> {
    let recs: Vec<Recommendation> = util::read_json(recommendations)?;

    let keys = select_recommendations(&recs, groups, disks).context("Recommendation selection failed")?;
    util::status(true, &format!("Selected {} of {} recommendation(s)", keys.len(), recs.len()));

    util::print_json(&SelectOutput { keys })
}
