//! Blocking wait on remote tasks

use crate::config::TimingConfig;
use crate::error::{ProvisionError, Result};
use crate::model::{ManagedRef, TaskHandle, TaskStatus};
use crate::ports::TaskPort;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Polls a task until it finishes or the timeout elapses
pub struct TaskWaiter<'a> {
    tasks: &'a dyn TaskPort,
    poll_interval: Duration,
    timeout: Duration,
}

impl<'a> TaskWaiter<'a> {
    pub fn new(tasks: &'a dyn TaskPort, timing: &TimingConfig) -> Self {
        Self {
            tasks,
            poll_interval: timing.poll_interval(),
            timeout: timing.task_timeout(),
        }
    }

    /// Wait for `handle` to leave the running state
    ///
    /// Returns the task's result entity on success. A task error becomes
    /// [`ProvisionError::TaskExecution`]; running past the timeout becomes
    /// [`ProvisionError::TaskTimeout`].
    pub async fn wait(&self, handle: &TaskHandle, action: &str) -> Result<Option<ManagedRef>> {
        let started = Instant::now();

        loop {
            match self.tasks.poll(handle).await? {
                TaskStatus::Running => {
                    // Timeout is only judged on a fresh poll
                    if started.elapsed() > self.timeout {
                        warn!("{} ({}) still running after {:?}", action, handle, self.timeout);
                        return Err(ProvisionError::TaskTimeout { timeout: self.timeout });
                    }
                    sleep(self.poll_interval).await;
                }
                TaskStatus::Success => {
                    let result = self.tasks.result(handle).await?;
                    match &result {
                        Some(entity) => debug!("{} completed successfully, result: {}", action, entity),
                        None => debug!("{} completed successfully.", action),
                    }
                    return Ok(result);
                }
                TaskStatus::Error => {
                    let fault = self.tasks.error(handle).await?;
                    warn!("{} did not complete successfully: {}", action, fault);
                    return Err(ProvisionError::TaskExecution(fault));
                }
            }
        }
    }
}
