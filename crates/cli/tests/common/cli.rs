//! CLI command execution helpers
//!
//! Wraps the `vmclone` binary with an isolated config location and
//! convenient assertion methods.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

/// CLI command builder
pub struct VmcloneCommand {
    binary_path: PathBuf,
    working_dir: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
}

impl VmcloneCommand {
    /// Create a new command in the given working directory
    ///
    /// The config file defaults to `<dir>/config.toml` so tests never read
    /// the user's configuration.
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        let working_dir = working_dir.as_ref().to_path_buf();
        let mut env = HashMap::new();
        env.insert(
            "VMCLONE_CONFIG".to_string(),
            working_dir.join("config.toml").display().to_string(),
        );
        Self {
            binary_path: PathBuf::from(env!("CARGO_BIN_EXE_vmclone")),
            working_dir,
            args: Vec::new(),
            env,
        }
    }

    /// Add command arguments
    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    /// Execute command and return its output
    pub fn execute(&self) -> Result<CommandResult> {
        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .current_dir(&self.working_dir)
            .envs(&self.env)
            .env_remove("RUST_LOG")
            .output()
            .context("Failed to execute command")?;

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    /// Execute and assert success
    pub fn assert_success(&self) -> Result<CommandResult> {
        let result = self.execute()?;

        if !result.success() {
            anyhow::bail!(
                "Command failed (exit code: {}):\nArgs: {:?}\nStdout: {}\nStderr: {}",
                result.exit_code,
                self.args,
                result.stdout,
                result.stderr
            );
        }

        Ok(result)
    }

    /// Execute and expect failure
    pub fn assert_failure(&self) -> Result<CommandResult> {
        let result = self.execute()?;

        if result.success() {
            anyhow::bail!(
                "Command should have failed but succeeded:\nArgs: {:?}\nStdout: {}",
                self.args,
                result.stdout
            );
        }

        Ok(result)
    }
}

/// Command execution result
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    /// Check if command succeeded
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Check if stderr contains text
    pub fn contains_stderr(&self, text: &str) -> bool {
        self.stderr.contains(text)
    }

    /// Parse stdout as JSON
    pub fn json(&self) -> Result<serde_json::Value> {
        serde_json::from_str(&self.stdout).with_context(|| format!("stdout is not JSON: {}", self.stdout))
    }
}

/// Macro for convenient command construction
///
/// Usage:
/// ```
/// vmclone!(dir, "select", "--groups", "1").assert_success()?;
/// ```
#[macro_export]
macro_rules! vmclone {
    ($dir:expr, $($arg:expr),*) => {{
        let mut cmd = $crate::common::cli::VmcloneCommand::new($dir);
        cmd.args(&[$($arg),*]);
        cmd
    }};
}
