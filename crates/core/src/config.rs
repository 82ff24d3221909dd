//! Timing configuration
//!
//! Stored as TOML at `$VMCLONE_CONFIG`, or `<config dir>/vmclone/config.toml`
//! when the variable is unset. A missing file means defaults.

use crate::error::{ProvisionError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "VMCLONE_CONFIG";

/// Poll interval while waiting on a remote task
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;
/// Longest a single remote task may run before the attempt is abandoned
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 600;
/// Pause between failed clone attempts
pub const DEFAULT_RETRY_BACKOFF_SECS: u64 = 60;
/// Pause after a duplicate-name failure while creating a template, letting
/// the concurrent creation finish
pub const DEFAULT_DUPLICATE_SETTLE_SECS: u64 = 360;
/// Total clone attempts, including the first
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Timing knobs for task polling and the retry loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub poll_interval_secs: u64,
    pub task_timeout_secs: u64,
    pub retry_backoff_secs: u64,
    pub duplicate_settle_secs: u64,
    pub max_attempts: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            task_timeout_secs: DEFAULT_TASK_TIMEOUT_SECS,
            retry_backoff_secs: DEFAULT_RETRY_BACKOFF_SECS,
            duplicate_settle_secs: DEFAULT_DUPLICATE_SETTLE_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl TimingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    pub fn duplicate_settle(&self) -> Duration {
        Duration::from_secs(self.duplicate_settle_secs)
    }

    /// Check every value against its allowed range
    pub fn validate(&self) -> Result<()> {
        check_range("timing.poll_interval_secs", self.poll_interval_secs, 1, 60)?;
        check_range("timing.task_timeout_secs", self.task_timeout_secs, 10, 86_400)?;
        check_range("timing.retry_backoff_secs", self.retry_backoff_secs, 0, 3_600)?;
        check_range("timing.duplicate_settle_secs", self.duplicate_settle_secs, 0, 3_600)?;
        check_range("timing.max_attempts", u64::from(self.max_attempts), 1, 10)?;

        if self.poll_interval_secs >= self.task_timeout_secs {
            return Err(ProvisionError::Config(
                "timing.poll_interval_secs must be less than timing.task_timeout_secs".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    pub timing: TimingConfig,
}

impl ProvisionConfig {
    pub fn validate(&self) -> Result<()> {
        self.timing.validate()
    }

    /// Parse and validate TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: ProvisionConfig =
            toml::from_str(text).map_err(|e| ProvisionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ProvisionError::Config(e.to_string()))
    }
}

/// Resolve the config file location
pub fn config_file_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("vmclone").join("config.toml"))
}

/// Load from the default location
pub fn load() -> Result<ProvisionConfig> {
    match config_file_path() {
        Some(path) => load_from(&path),
        None => Ok(ProvisionConfig::default()),
    }
}

/// Load from an explicit path; a missing file yields defaults
pub fn load_from(path: &Path) -> Result<ProvisionConfig> {
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(ProvisionConfig::default());
    }

    let text = std::fs::read_to_string(path)
        .map_err(|e| ProvisionError::Config(format!("{}: {}", path.display(), e)))?;
    ProvisionConfig::from_toml(&text)
}

/// Save to the default location
pub fn save(config: &ProvisionConfig) -> Result<()> {
    let path = config_file_path()
        .ok_or_else(|| ProvisionError::Config("Could not determine config file path".to_string()))?;
    save_to(config, &path)
}

/// Validate and write to an explicit path
pub fn save_to(config: &ProvisionConfig, path: &Path) -> Result<()> {
    config.validate()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ProvisionError::Config(format!("{}: {}", parent.display(), e)))?;
    }

    std::fs::write(path, config.to_toml()?)
        .map_err(|e| ProvisionError::Config(format!("{}: {}", path.display(), e)))
}

/// Write a default config file unless one exists
pub fn init_if_missing() -> Result<PathBuf> {
    let path = config_file_path()
        .ok_or_else(|| ProvisionError::Config("Could not determine config file path".to_string()))?;
    if !path.exists() {
        save_to(&ProvisionConfig::default(), &path)?;
    }
    Ok(path)
}

/// Commented example configuration
pub fn example_config() -> String {
    format!(
        r#"# vmclone configuration

[timing]
# Seconds between task status polls (1-60)
poll_interval_secs = {}
# Seconds before a running task is abandoned (10-86400)
task_timeout_secs = {}
# Seconds to wait before retrying a failed clone (0-3600)
retry_backoff_secs = {}
# Seconds to wait after a duplicate-name failure in template mode (0-3600)
duplicate_settle_secs = {}
# Total clone attempts (1-10)
max_attempts = {}
"#,
        DEFAULT_POLL_INTERVAL_SECS,
        DEFAULT_TASK_TIMEOUT_SECS,
        DEFAULT_RETRY_BACKOFF_SECS,
        DEFAULT_DUPLICATE_SETTLE_SECS,
        DEFAULT_MAX_ATTEMPTS,
    )
}

fn check_range(key: &str, value: u64, min: u64, max: u64) -> Result<()> {
    if value < min || value > max {
        return Err(ProvisionError::Config(format!(
            "{} = {} is outside {}-{}",
            key, value, min, max
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_documented_values() {
        let timing = TimingConfig::default();
        assert_eq!(timing.poll_interval(), Duration::from_secs(2));
        assert_eq!(timing.task_timeout(), Duration::from_secs(600));
        assert_eq!(timing.retry_backoff(), Duration::from_secs(60));
        assert_eq!(timing.duplicate_settle(), Duration::from_secs(360));
        assert_eq!(timing.max_attempts, 3);
        assert!(timing.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ProvisionConfig::from_toml("[timing]\nretry_backoff_secs = 5\n").unwrap();
        assert_eq!(config.timing.retry_backoff_secs, 5);
        assert_eq!(config.timing.task_timeout_secs, 600);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let err = ProvisionConfig::from_toml("[timing]\nmax_attempts = 0\n").unwrap_err();
        assert!(err.to_string().contains("timing.max_attempts"));

        let mut timing = TimingConfig::default();
        timing.poll_interval_secs = 30;
        timing.task_timeout_secs = 20;
        assert!(timing.validate().is_err());
    }

    #[test]
    fn test_example_config_parses() {
        let config = ProvisionConfig::from_toml(&example_config()).unwrap();
        assert_eq!(config, ProvisionConfig::default());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/config.toml");

        let mut config = ProvisionConfig::default();
        config.timing.max_attempts = 5;
        save_to(&config, &path).unwrap();

        let loaded = load_from(&path).unwrap();
        assert_eq!(loaded.timing.max_attempts, 5);
    }

    #[test]
    fn test_missing_file_is_default() {
        let temp_dir = TempDir::new().unwrap();
        let loaded = load_from(&temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded, ProvisionConfig::default());
    }
}
