//! Provisioning orchestrator
//!
//! A clone runs as a small state machine:
//!
//! ```text
//! Attempt ──ok──────────────────────────────▶ Success
//!    │ duplicate name while creating a template
//!    ├──────────▶ DuplicateRecovery ─settle─▶ Success
//!    │ retryable error
//!    ├──────────▶ RetryableFailure ─backoff─▶ Attempt
//!    │                   └─ budget spent ───▶ Fatal (Exhausted)
//!    └─ other error ────────────────────────▶ Fatal
//! ```
//!
//! Every remote call is awaited before the next decision. Resources left
//! behind by a failed attempt are not rolled back.

use crate::selector::select_recommendations;
use folders::destination_folder;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use vc_core::{
    ClonePlacementPort, CloneSpec, DiskPlan, InventoryProvider, ManagedRef, PlacementSpec, ProvisionError,
    ProvisionOutcome, ProvisionRequest, RemoteFault, Result, TaskPort, TaskWaiter, TimingConfig,
};

/// State of the clone state machine
#[derive(Debug)]
pub enum CloneState {
    Attempt,
    RetryableFailure { message: String },
    DuplicateRecovery,
    /// Terminal; `None` after duplicate recovery
    Success(Option<ManagedRef>),
    /// Terminal
    Fatal(ProvisionError),
}

/// Attempt counter plus the distinct failure messages seen so far
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryLedger {
    pub attempts: u32,
    pub errors: Vec<String>,
}

impl RetryLedger {
    /// Record a failure; repeats of an earlier message are dropped
    pub fn record(&mut self, message: String) {
        if !self.errors.contains(&message) {
            self.errors.push(message);
        }
    }

    fn exhausted(self) -> ProvisionError {
        ProvisionError::Exhausted {
            attempts: self.attempts,
            errors: self.errors,
        }
    }
}

/// One fully prepared clone
#[derive(Debug, Clone)]
pub struct CloneJob {
    pub name: String,
    pub folder: ManagedRef,
    pub spec: CloneSpec,
    /// Set when a storage cluster places the disks
    pub placement: Option<PlacementSpec>,
    pub required_groups: usize,
    pub disk_ids: Vec<i32>,
    pub creating_template: bool,
}

impl CloneJob {
    pub fn new(request: &ProvisionRequest, template: ManagedRef, folder: ManagedRef, plan: &DiskPlan) -> Self {
        let creating_template = request.create_template;
        let spec = CloneSpec {
            template,
            cluster: request.cluster.clone(),
            datastore: plan.os_datastore.clone(),
            disks: plan.data_disks.clone(),
            nics: request.ordered_nics(),
            cpu: request.cpu,
            memory_mb: request.memory_mb,
            customization: (!creating_template).then(|| request.customization.clone()),
            power_on: !creating_template,
            mark_as_template: creating_template,
        };

        let placement = plan.storage_pod.as_ref().map(|pod| PlacementSpec {
            clone_name: request.guest.clone(),
            folder: folder.clone(),
            storage_pod: pod.clone(),
            clone: spec.clone(),
        });

        Self {
            name: request.guest.clone(),
            folder,
            spec,
            placement,
            required_groups: plan.required_groups,
            disk_ids: plan.disk_ids(),
            creating_template,
        }
    }
}

/// Drives provisioning requests against the remote ports
pub struct Provisioner<'a> {
    inventory: &'a dyn InventoryProvider,
    placement: &'a dyn ClonePlacementPort,
    tasks: &'a dyn TaskPort,
    timing: TimingConfig,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        inventory: &'a dyn InventoryProvider,
        placement: &'a dyn ClonePlacementPort,
        tasks: &'a dyn TaskPort,
        timing: TimingConfig,
    ) -> Self {
        Self {
            inventory,
            placement,
            tasks,
            timing,
        }
    }

    /// Clone `request.template` into `request.guest`
    pub async fn provision(&self, request: &ProvisionRequest) -> Result<ProvisionOutcome> {
        if !self.inventory.find_vms(&request.guest).await?.is_empty() {
            if request.create_template {
                info!("Template {} already exists, nothing to do", request.guest);
                return Ok(ProvisionOutcome::unchanged(&request.guest));
            }
            return Err(ProvisionError::VmAlreadyExists(request.guest.clone()));
        }

        let template = self
            .inventory
            .find_vms(&request.template)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ProvisionError::TemplateNotFound(request.template.clone()))?;

        let plan = DiskPlan::build(&request.disks, request.create_template)?;
        let folder = destination_folder(self.inventory, &template, request.folder_path.as_deref()).await?;
        debug!("Cloning {} from {} into {}", request.guest, template, folder);

        let job = CloneJob::new(request, template, folder, &plan);
        let vm_ref = self.run(&job).await?;

        Ok(ProvisionOutcome {
            vm: request.guest.clone(),
            vm_ref,
            disk: plan.detail_map(),
            changed: true,
        })
    }

    /// Run the clone state machine to a terminal state
    pub async fn run(&self, job: &CloneJob) -> Result<Option<ManagedRef>> {
        let mut ledger = RetryLedger::default();
        let mut state = CloneState::Attempt;

        loop {
            state = match state {
                CloneState::Attempt => {
                    ledger.attempts += 1;
                    info!("Clone attempt {}/{} for {}", ledger.attempts, self.timing.max_attempts, job.name);
                    self.classify(job, self.attempt(job).await)
                }
                CloneState::DuplicateRecovery => {
                    warn!(
                        "{} already exists, waiting {:?} for the concurrent creation to settle",
                        job.name,
                        self.timing.duplicate_settle()
                    );
                    sleep(self.timing.duplicate_settle()).await;
                    CloneState::Success(None)
                }
                CloneState::RetryableFailure { message } => {
                    warn!("Clone attempt {} failed: {}", ledger.attempts, message);
                    ledger.record(message);
                    if ledger.attempts >= self.timing.max_attempts {
                        CloneState::Fatal(ledger.clone().exhausted())
                    } else {
                        debug!("Retrying in {:?}", self.timing.retry_backoff());
                        sleep(self.timing.retry_backoff()).await;
                        CloneState::Attempt
                    }
                }
                CloneState::Success(vm) => return Ok(vm),
                CloneState::Fatal(err) => return Err(err),
            };
        }
    }

    fn classify(&self, job: &CloneJob, outcome: Result<ManagedRef>) -> CloneState {
        match outcome {
            Ok(vm) => {
                info!("Cloned {} as {}", job.name, vm);
                CloneState::Success(Some(vm))
            }
            Err(err) if job.creating_template && err.fault().is_some_and(RemoteFault::is_duplicate) => {
                CloneState::DuplicateRecovery
            }
            Err(err) if err.is_retryable() => CloneState::RetryableFailure {
                message: err.to_string(),
            },
            Err(err) => CloneState::Fatal(err),
        }
    }

    async fn attempt(&self, job: &CloneJob) -> Result<ManagedRef> {
        let handle = match &job.placement {
            Some(placement) => {
                let recommendations = self.placement.recommend_placement(placement).await?;
                let keys = select_recommendations(&recommendations, job.required_groups, &job.disk_ids)?;
                info!("Applying recommendation(s) {:?}", keys);
                self.placement.apply_recommendation(&keys).await?
            }
            None => {
                info!("Cloning {} directly into {}", job.name, job.folder);
                self.placement.clone_direct(&job.folder, &job.name, &job.spec).await?
            }
        };

        TaskWaiter::new(self.tasks, &self.timing)
            .wait(&handle, "Clone VM")
            .await?
            .ok_or_else(|| {
                ProvisionError::TaskExecution(RemoteFault::from_message(format!(
                    "Clone task {} finished without reporting the new VM",
                    handle
                )))
            })
    }
}
