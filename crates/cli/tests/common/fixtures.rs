//! Inventory fixtures for integration tests

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary directory holding an inventory snapshot and request files
pub struct TestInventory {
    dir: TempDir,
}

impl TestInventory {
    /// Datacenter `dc1` with a template folder and a VM carrying custom fields
    pub fn new() -> Result<Self> {
        Self::with_snapshot(json!({
            "datacenters": [{"id": "datacenter-2", "name": "dc1", "vm_folder": "group-v3"}],
            "folders": [
                {"id": "group-v10", "name": "templates", "parent": "group-v3"},
                {"id": "group-v11", "name": "prod", "parent": "group-v3"}
            ],
            "vms": [
                {"id": "vm-20", "name": "rhel9-base", "parent": "group-v10", "template": true},
                {
                    "id": "vm-21",
                    "name": "app01",
                    "parent": "group-v11",
                    "custom_fields": ["owner", "backup"],
                    "locked_fields": ["backup"]
                }
            ]
        }))
    }

    pub fn with_snapshot(snapshot: Value) -> Result<Self> {
        let dir = TempDir::new().context("Failed to create temp dir")?;
        let inventory = Self { dir };
        inventory.write_json("inventory.json", &snapshot)?;
        Ok(inventory)
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Snapshot path as a string argument
    pub fn inventory_arg(&self) -> String {
        self.path("inventory.json").display().to_string()
    }

    pub fn write_json(&self, name: &str, value: &Value) -> Result<PathBuf> {
        let path = self.path(name);
        std::fs::write(&path, serde_json::to_string_pretty(value)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    pub fn write_file(&self, name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.path(name);
        std::fs::write(&path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Current snapshot on disk
    pub fn snapshot(&self) -> Result<Value> {
        let text = std::fs::read_to_string(self.path("inventory.json"))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Names of all folders in the snapshot on disk
    pub fn folder_names(&self) -> Result<Vec<String>> {
        let snapshot = self.snapshot()?;
        Ok(snapshot["folders"]
            .as_array()
            .map(|folders| {
                folders
                    .iter()
                    .filter_map(|f| f["name"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }
}
