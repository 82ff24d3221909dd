//! In-memory virtualization backend
//!
//! Implements every port against a JSON inventory snapshot. The CLI uses it
//! as an offline backend and the test suites use it as their double: it
//! records folder creations, applied recommendation keys and submitted
//! tasks so callers can assert on side effects.
//!
//! Snapshot format:
//! ```json
//! {
//!   "datacenters": [{"id": "datacenter-2", "name": "dc1", "vm_folder": "group-v3"}],
//!   "folders": [{"id": "group-v10", "name": "prod", "parent": "group-v3"}],
//!   "vms": [{"id": "vm-20", "name": "rhel9-base", "parent": "group-v10", "template": true}],
//!   "recommendations": [],
//!   "task_script": [{"outcome": "fail", "message": "Insufficient disk space"}]
//! }
//! ```
//! The datacenter VM folder is implicit and must not be listed in `folders`.

use crate::error::{ProvisionError, Result};
use crate::fault::RemoteFault;
use crate::model::{
    DiskRelocation, EntityKind, FolderRecord, ManagedRef, Recommendation, RelocationAction, TaskHandle,
    TaskStatus,
};
use crate::ports::{AttributePort, ClonePlacementPort, InventoryProvider, RemoteResult, TaskPort};
use crate::request::{CloneSpec, PlacementSpec};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;

/// Datacenter entry of a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatacenterEntry {
    pub id: String,
    pub name: String,
    /// Id of the datacenter's root VM folder
    pub vm_folder: String,
}

/// Folder entry of a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderEntry {
    pub id: String,
    pub name: String,
    /// Id of the parent folder
    pub parent: String,
}

/// Virtual machine entry of a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmEntry {
    pub id: String,
    pub name: String,
    /// Id of the containing folder
    pub parent: String,
    #[serde(default)]
    pub template: bool,
    /// Custom attribute names defined for this VM
    #[serde(default)]
    pub custom_fields: Vec<String>,
    /// Fields the current user may not change
    #[serde(default)]
    pub locked_fields: Vec<String>,
    #[serde(default)]
    pub custom_values: BTreeMap<String, String>,
}

/// Scripted behavior for the next submitted task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskScript {
    /// Finish successfully after `polls` running polls
    Succeed {
        #[serde(default)]
        polls: u32,
    },
    /// Fail with `message` after `polls` running polls
    Fail {
        message: String,
        #[serde(default)]
        polls: u32,
    },
    /// Never finish
    Hang,
}

/// Serializable inventory snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    #[serde(default)]
    pub datacenters: Vec<DatacenterEntry>,
    #[serde(default)]
    pub folders: Vec<FolderEntry>,
    #[serde(default)]
    pub vms: Vec<VmEntry>,
    /// Canned recommendations; generated per storage cluster when empty
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
    /// Behavior of upcoming tasks; unscripted tasks succeed immediately
    #[serde(default)]
    pub task_script: Vec<TaskScript>,
}

impl InventorySnapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| snapshot_error(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&text).map_err(|e| snapshot_error(format!("{}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).map_err(|e| snapshot_error(e.to_string()))?;
        std::fs::write(path, text).map_err(|e| snapshot_error(format!("{}: {}", path.display(), e)))
    }
}

/// Generated ids start above the ids typically found in snapshots
const FIRST_GENERATED_ID: u64 = 1000;

#[derive(Debug, Clone)]
struct VmState {
    template: bool,
    custom_fields: Vec<String>,
    locked_fields: Vec<String>,
    custom_values: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
struct Entity {
    kind: EntityKind,
    name: String,
    parent: Option<String>,
    children: Vec<String>,
    vm: Option<VmState>,
}

#[derive(Debug, Clone)]
enum TaskEffect {
    CreateVm { folder: String, name: String, template: bool },
    Move { folder: String, entities: Vec<String> },
}

#[derive(Debug)]
struct SimTask {
    script: TaskScript,
    running_polls: u32,
    effect: TaskEffect,
    settled: Option<std::result::Result<Option<ManagedRef>, RemoteFault>>,
}

#[derive(Debug, Default)]
struct SimState {
    entities: BTreeMap<String, Entity>,
    /// Insertion order, for stable listings and snapshots
    order: Vec<String>,
    vm_folders: BTreeMap<String, String>,
    recommendations: Vec<Recommendation>,
    offered_keys: BTreeSet<String>,
    pending_placement: Option<PlacementSpec>,
    script: VecDeque<TaskScript>,
    tasks: BTreeMap<String, SimTask>,
    next_id: u64,
    folder_creations: Vec<(ManagedRef, String)>,
    applied_keys: Vec<Vec<String>>,
    submitted: Vec<TaskHandle>,
}

impl SimState {
    fn fresh_id(&mut self, prefix: &str) -> String {
        loop {
            self.next_id = self.next_id.max(FIRST_GENERATED_ID) + 1;
            let id = format!("{}{}", prefix, self.next_id);
            if !self.entities.contains_key(&id) && !self.tasks.contains_key(&id) {
                return id;
            }
        }
    }

    fn insert(&mut self, id: String, entity: Entity) {
        self.order.push(id.clone());
        self.entities.insert(id, entity);
    }

    fn link(&mut self, parent: &str, child: &str) -> Result<()> {
        let entity = self
            .entities
            .get_mut(parent)
            .ok_or_else(|| snapshot_error(format!("unknown parent '{}' of '{}'", parent, child)))?;
        entity.children.push(child.to_string());
        Ok(())
    }

    fn reference(&self, id: &str) -> Option<ManagedRef> {
        self.entities.get(id).map(|e| ManagedRef::new(e.kind, id))
    }

    fn entity(&self, entity: &ManagedRef) -> RemoteResult<&Entity> {
        self.entities
            .get(&entity.value)
            .filter(|e| e.kind == entity.kind)
            .ok_or_else(|| RemoteFault::from_message(format!("ManagedObjectNotFound: {}", entity)))
    }

    fn folder_record(&self, id: &str) -> Option<FolderRecord> {
        let entity = self.entities.get(id)?;
        Some(FolderRecord {
            folder: ManagedRef::folder(id),
            name: entity.name.clone(),
            children: entity
                .children
                .iter()
                .filter_map(|child| self.reference(child))
                .collect(),
            parent: entity.parent.as_deref().and_then(|p| self.reference(p)),
        })
    }

    fn collect_folders(&self, id: &str, out: &mut Vec<FolderRecord>) {
        let Some(entity) = self.entities.get(id) else {
            return;
        };
        for child in &entity.children {
            if self.entities.get(child).map(|e| e.kind) == Some(EntityKind::Folder) {
                if let Some(record) = self.folder_record(child) {
                    out.push(record);
                }
                self.collect_folders(child, out);
            }
        }
    }

    fn submit(&mut self, effect: TaskEffect) -> TaskHandle {
        let script = self
            .script
            .pop_front()
            .unwrap_or(TaskScript::Succeed { polls: 0 });
        let running_polls = match &script {
            TaskScript::Succeed { polls } | TaskScript::Fail { polls, .. } => *polls,
            TaskScript::Hang => 0,
        };

        let id = self.fresh_id("task-");
        self.tasks.insert(
            id.clone(),
            SimTask {
                script,
                running_polls,
                effect,
                settled: None,
            },
        );
        let handle = TaskHandle(id);
        self.submitted.push(handle.clone());
        handle
    }

    fn apply_effect(&mut self, effect: TaskEffect) -> std::result::Result<Option<ManagedRef>, RemoteFault> {
        match effect {
            TaskEffect::CreateVm { folder, name, template } => {
                let taken = self
                    .entities
                    .get(&folder)
                    .map(|f| {
                        f.children.iter().any(|child| {
                            self.entities
                                .get(child)
                                .map(|e| e.kind == EntityKind::VirtualMachine && e.name == name)
                                .unwrap_or(false)
                        })
                    })
                    .unwrap_or(false);
                if taken {
                    return Err(RemoteFault::duplicate_name(&name));
                }

                let id = self.fresh_id("vm-");
                self.insert(
                    id.clone(),
                    Entity {
                        kind: EntityKind::VirtualMachine,
                        name,
                        parent: Some(folder.clone()),
                        children: Vec::new(),
                        vm: Some(VmState {
                            template,
                            custom_fields: Vec::new(),
                            locked_fields: Vec::new(),
                            custom_values: BTreeMap::new(),
                        }),
                    },
                );
                if let Some(parent) = self.entities.get_mut(&folder) {
                    parent.children.push(id.clone());
                }
                Ok(Some(ManagedRef::vm(id)))
            }
            TaskEffect::Move { folder, entities } => {
                for id in entities {
                    let old_parent = self.entities.get(&id).and_then(|e| e.parent.clone());
                    if let Some(old) = old_parent.and_then(|p| self.entities.get_mut(&p)) {
                        old.children.retain(|child| child != &id);
                    }
                    if let Some(entity) = self.entities.get_mut(&id) {
                        entity.parent = Some(folder.clone());
                    }
                    if let Some(target) = self.entities.get_mut(&folder) {
                        target.children.push(id);
                    }
                }
                Ok(None)
            }
        }
    }

    fn generated_recommendations(spec: &PlacementSpec) -> Vec<Recommendation> {
        let mut clusters: Vec<String> = vec![spec.storage_pod.clone()];
        for disk in &spec.clone.disks {
            if let Some(cluster) = &disk.datastore_cluster {
                if !clusters.contains(cluster) {
                    clusters.push(cluster.clone());
                }
            }
        }

        clusters
            .iter()
            .enumerate()
            .map(|(index, cluster)| {
                let datastore = ManagedRef::new(EntityKind::Datastore, format!("{}-ds1", cluster));
                let disks: Vec<DiskRelocation> = spec
                    .clone
                    .disks
                    .iter()
                    .filter(|d| d.datastore_cluster.as_deref() == Some(cluster.as_str()))
                    .map(|d| DiskRelocation {
                        disk_id: d.device_key,
                        datastore: datastore.clone(),
                    })
                    .collect();
                let action = if disks.is_empty() {
                    RelocationAction::WholeEntity {
                        datastore: Some(datastore),
                    }
                } else {
                    RelocationAction::Disks { disks }
                };
                Recommendation {
                    key: (index + 1).to_string(),
                    actions: vec![action],
                }
            })
            .collect()
    }
}

/// Simulated remote inventory implementing every port
#[derive(Debug, Default)]
pub struct SimulatedVcenter {
    state: Mutex<SimState>,
}

impl SimulatedVcenter {
    /// Empty inventory
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a snapshot, checking every parent reference
    pub fn from_snapshot(snapshot: InventorySnapshot) -> Result<Self> {
        let mut state = SimState::default();

        for dc in &snapshot.datacenters {
            state.insert(
                dc.id.clone(),
                Entity {
                    kind: EntityKind::Datacenter,
                    name: dc.name.clone(),
                    parent: None,
                    children: vec![dc.vm_folder.clone()],
                    vm: None,
                },
            );
            state.insert(
                dc.vm_folder.clone(),
                Entity {
                    kind: EntityKind::Folder,
                    name: "vm".to_string(),
                    parent: Some(dc.id.clone()),
                    children: Vec::new(),
                    vm: None,
                },
            );
            state.vm_folders.insert(dc.id.clone(), dc.vm_folder.clone());
        }

        for folder in &snapshot.folders {
            state.insert(
                folder.id.clone(),
                Entity {
                    kind: EntityKind::Folder,
                    name: folder.name.clone(),
                    parent: Some(folder.parent.clone()),
                    children: Vec::new(),
                    vm: None,
                },
            );
        }

        for vm in &snapshot.vms {
            state.insert(
                vm.id.clone(),
                Entity {
                    kind: EntityKind::VirtualMachine,
                    name: vm.name.clone(),
                    parent: Some(vm.parent.clone()),
                    children: Vec::new(),
                    vm: Some(VmState {
                        template: vm.template,
                        custom_fields: vm.custom_fields.clone(),
                        locked_fields: vm.locked_fields.clone(),
                        custom_values: vm.custom_values.clone(),
                    }),
                },
            );
        }

        // Children are linked in listing order once every id is known
        for folder in &snapshot.folders {
            state.link(&folder.parent, &folder.id)?;
        }
        for vm in &snapshot.vms {
            state.link(&vm.parent, &vm.id)?;
        }

        state.recommendations = snapshot.recommendations;
        state.script = snapshot.task_script.into();

        Ok(Self {
            state: Mutex::new(state),
        })
    }

    /// Load a JSON snapshot from disk
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_snapshot(InventorySnapshot::load(path)?)
    }

    /// Current inventory as a snapshot (pending task script included)
    pub fn snapshot(&self) -> InventorySnapshot {
        let state = self.state.lock();
        let mut snapshot = InventorySnapshot::default();
        let root_folders: BTreeSet<&String> = state.vm_folders.values().collect();

        for id in &state.order {
            let Some(entity) = state.entities.get(id) else {
                continue;
            };
            let parent = entity.parent.clone().unwrap_or_default();
            match entity.kind {
                EntityKind::Datacenter => snapshot.datacenters.push(DatacenterEntry {
                    id: id.clone(),
                    name: entity.name.clone(),
                    vm_folder: state.vm_folders.get(id).cloned().unwrap_or_default(),
                }),
                EntityKind::Folder if !root_folders.contains(&id) => snapshot.folders.push(FolderEntry {
                    id: id.clone(),
                    name: entity.name.clone(),
                    parent,
                }),
                EntityKind::VirtualMachine => {
                    let vm = entity.vm.clone();
                    snapshot.vms.push(VmEntry {
                        id: id.clone(),
                        name: entity.name.clone(),
                        parent,
                        template: vm.as_ref().map(|v| v.template).unwrap_or(false),
                        custom_fields: vm.as_ref().map(|v| v.custom_fields.clone()).unwrap_or_default(),
                        locked_fields: vm.as_ref().map(|v| v.locked_fields.clone()).unwrap_or_default(),
                        custom_values: vm.map(|v| v.custom_values).unwrap_or_default(),
                    })
                }
                _ => {}
            }
        }

        snapshot.recommendations = state.recommendations.clone();
        snapshot.task_script = state.script.iter().cloned().collect();
        snapshot
    }

    /// Write the current inventory back to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        self.snapshot().save(path)
    }

    /// Add a datacenter; returns the datacenter and its VM folder
    pub fn add_datacenter(&self, name: &str) -> (ManagedRef, ManagedRef) {
        let mut state = self.state.lock();
        let dc_id = state.fresh_id("datacenter-");
        let folder_id = state.fresh_id("group-v");
        state.insert(
            dc_id.clone(),
            Entity {
                kind: EntityKind::Datacenter,
                name: name.to_string(),
                parent: None,
                children: vec![folder_id.clone()],
                vm: None,
            },
        );
        state.insert(
            folder_id.clone(),
            Entity {
                kind: EntityKind::Folder,
                name: "vm".to_string(),
                parent: Some(dc_id.clone()),
                children: Vec::new(),
                vm: None,
            },
        );
        state.vm_folders.insert(dc_id.clone(), folder_id.clone());
        (ManagedRef::datacenter(dc_id), ManagedRef::folder(folder_id))
    }

    /// Add a folder without recording it as a creation
    pub fn add_folder(&self, parent: &ManagedRef, name: &str) -> ManagedRef {
        let mut state = self.state.lock();
        let id = state.fresh_id("group-v");
        state.insert(
            id.clone(),
            Entity {
                kind: EntityKind::Folder,
                name: name.to_string(),
                parent: Some(parent.value.clone()),
                children: Vec::new(),
                vm: None,
            },
        );
        if let Some(p) = state.entities.get_mut(&parent.value) {
            p.children.push(id.clone());
        }
        ManagedRef::folder(id)
    }

    /// Add a VM (or template) with optional custom fields
    pub fn add_vm(&self, parent: &ManagedRef, name: &str, custom_fields: &[&str]) -> ManagedRef {
        let mut state = self.state.lock();
        let id = state.fresh_id("vm-");
        state.insert(
            id.clone(),
            Entity {
                kind: EntityKind::VirtualMachine,
                name: name.to_string(),
                parent: Some(parent.value.clone()),
                children: Vec::new(),
                vm: Some(VmState {
                    template: false,
                    custom_fields: custom_fields.iter().map(|f| f.to_string()).collect(),
                    locked_fields: Vec::new(),
                    custom_values: BTreeMap::new(),
                }),
            },
        );
        if let Some(p) = state.entities.get_mut(&parent.value) {
            p.children.push(id.clone());
        }
        ManagedRef::vm(id)
    }

    /// Queue behavior for the next submitted task
    pub fn push_task(&self, script: TaskScript) {
        self.state.lock().script.push_back(script);
    }

    /// Replace the canned recommendations
    pub fn set_recommendations(&self, recommendations: Vec<Recommendation>) {
        self.state.lock().recommendations = recommendations;
    }

    /// Folder creations issued through the port, in order
    pub fn folder_creations(&self) -> Vec<(ManagedRef, String)> {
        self.state.lock().folder_creations.clone()
    }

    /// Key sets passed to `apply_recommendation`, in order
    pub fn applied_keys(&self) -> Vec<Vec<String>> {
        self.state.lock().applied_keys.clone()
    }

    /// Every task handed out so far
    pub fn submitted_tasks(&self) -> Vec<TaskHandle> {
        self.state.lock().submitted.clone()
    }

    /// Parent folder of a VM, looked up by name
    pub fn parent_of_vm(&self, name: &str) -> Option<ManagedRef> {
        let state = self.state.lock();
        state
            .entities
            .values()
            .find(|e| e.kind == EntityKind::VirtualMachine && e.name == name)
            .and_then(|e| e.parent.as_deref())
            .and_then(|p| state.reference(p))
    }

    /// Current value of a custom attribute
    pub fn custom_value(&self, vm: &ManagedRef, key: &str) -> Option<String> {
        let state = self.state.lock();
        state
            .entities
            .get(&vm.value)
            .and_then(|e| e.vm.as_ref())
            .and_then(|v| v.custom_values.get(key).cloned())
    }

    /// Lock a custom field so setting it fails
    pub fn lock_field(&self, vm: &ManagedRef, key: &str) {
        let mut state = self.state.lock();
        if let Some(v) = state.entities.get_mut(&vm.value).and_then(|e| e.vm.as_mut()) {
            v.locked_fields.push(key.to_string());
        }
    }
}

#[async_trait]
impl InventoryProvider for SimulatedVcenter {
    async fn list_folders_under(&self, root: &ManagedRef) -> RemoteResult<Vec<FolderRecord>> {
        let state = self.state.lock();
        state.entity(root)?;

        let mut folders = Vec::new();
        state.collect_folders(&root.value, &mut folders);
        folders.retain(FolderRecord::is_vm_folder);
        Ok(folders)
    }

    async fn create_folder(&self, parent: &ManagedRef, name: &str) -> RemoteResult<FolderRecord> {
        let mut state = self.state.lock();
        let parent_entity = state.entity(parent)?;
        if parent_entity.kind != EntityKind::Folder {
            return Err(RemoteFault::from_message(format!("NotSupported: {} cannot hold folders", parent)));
        }

        let taken = parent_entity.children.iter().any(|child| {
            state
                .entities
                .get(child)
                .map(|e| e.kind == EntityKind::Folder && e.name == name)
                .unwrap_or(false)
        });
        if taken {
            return Err(RemoteFault::duplicate_name(name));
        }

        let id = state.fresh_id("group-v");
        state.insert(
            id.clone(),
            Entity {
                kind: EntityKind::Folder,
                name: name.to_string(),
                parent: Some(parent.value.clone()),
                children: Vec::new(),
                vm: None,
            },
        );
        state.link(&parent.value, &id).map_err(|e| RemoteFault::from_message(e.to_string()))?;
        state.folder_creations.push((parent.clone(), name.to_string()));

        state
            .folder_record(&id)
            .ok_or_else(|| RemoteFault::from_message(format!("folder {} vanished", id)))
    }

    async fn find_vms(&self, name: &str) -> RemoteResult<Vec<ManagedRef>> {
        let state = self.state.lock();
        Ok(state
            .order
            .iter()
            .filter(|id| {
                state
                    .entities
                    .get(*id)
                    .map(|e| e.kind == EntityKind::VirtualMachine && e.name == name)
                    .unwrap_or(false)
            })
            .map(|id| ManagedRef::vm(id.clone()))
            .collect())
    }

    async fn parent_of(&self, entity: &ManagedRef) -> RemoteResult<Option<ManagedRef>> {
        let state = self.state.lock();
        let found = state.entity(entity)?;
        Ok(found.parent.as_deref().and_then(|p| state.reference(p)))
    }

    async fn vm_folder_of(&self, datacenter: &ManagedRef) -> RemoteResult<ManagedRef> {
        let state = self.state.lock();
        state
            .vm_folders
            .get(&datacenter.value)
            .map(|id| ManagedRef::folder(id.clone()))
            .ok_or_else(|| RemoteFault::from_message(format!("ManagedObjectNotFound: {}", datacenter)))
    }

    async fn find_datacenter(&self, name: &str) -> RemoteResult<Option<ManagedRef>> {
        let state = self.state.lock();
        Ok(state
            .order
            .iter()
            .find(|id| {
                state
                    .entities
                    .get(*id)
                    .map(|e| e.kind == EntityKind::Datacenter && e.name == name)
                    .unwrap_or(false)
            })
            .map(|id| ManagedRef::datacenter(id.clone())))
    }

    async fn move_into_folder(&self, folder: &ManagedRef, entities: &[ManagedRef]) -> RemoteResult<TaskHandle> {
        let mut state = self.state.lock();
        state.entity(folder)?;
        for entity in entities {
            state.entity(entity)?;
        }
        Ok(state.submit(TaskEffect::Move {
            folder: folder.value.clone(),
            entities: entities.iter().map(|e| e.value.clone()).collect(),
        }))
    }
}

#[async_trait]
impl ClonePlacementPort for SimulatedVcenter {
    async fn recommend_placement(&self, spec: &PlacementSpec) -> RemoteResult<Vec<Recommendation>> {
        let mut state = self.state.lock();
        state.entity(&spec.folder)?;

        let recommendations = if state.recommendations.is_empty() {
            SimState::generated_recommendations(spec)
        } else {
            state.recommendations.clone()
        };
        state.offered_keys = recommendations.iter().map(|r| r.key.clone()).collect();
        state.pending_placement = Some(spec.clone());
        Ok(recommendations)
    }

    async fn apply_recommendation(&self, keys: &[String]) -> RemoteResult<TaskHandle> {
        let mut state = self.state.lock();
        if let Some(unknown) = keys.iter().find(|k| !state.offered_keys.contains(*k)) {
            return Err(RemoteFault::from_message(format!("InvalidArgument: unknown recommendation key '{}'", unknown)));
        }
        let spec = state
            .pending_placement
            .clone()
            .ok_or_else(|| RemoteFault::from_message("InvalidState: no placement was requested"))?;

        state.applied_keys.push(keys.to_vec());
        Ok(state.submit(TaskEffect::CreateVm {
            folder: spec.folder.value.clone(),
            name: spec.clone_name.clone(),
            template: spec.clone.mark_as_template,
        }))
    }

    async fn clone_direct(&self, folder: &ManagedRef, name: &str, spec: &CloneSpec) -> RemoteResult<TaskHandle> {
        let mut state = self.state.lock();
        state.entity(folder)?;
        state.entity(&spec.template)?;
        Ok(state.submit(TaskEffect::CreateVm {
            folder: folder.value.clone(),
            name: name.to_string(),
            template: spec.mark_as_template,
        }))
    }
}

#[async_trait]
impl TaskPort for SimulatedVcenter {
    async fn poll(&self, handle: &TaskHandle) -> RemoteResult<TaskStatus> {
        let mut state = self.state.lock();
        let task = state
            .tasks
            .get_mut(&handle.0)
            .ok_or_else(|| RemoteFault::from_message(format!("ManagedObjectNotFound: {}", handle)))?;

        if task.settled.is_none() {
            if matches!(task.script, TaskScript::Hang) {
                return Ok(TaskStatus::Running);
            }
            if task.running_polls > 0 {
                task.running_polls -= 1;
                return Ok(TaskStatus::Running);
            }

            let script = task.script.clone();
            let effect = task.effect.clone();
            let settled = match script {
                TaskScript::Fail { message, .. } => Err(RemoteFault::from_message(message)),
                _ => state.apply_effect(effect),
            };
            if let Some(task) = state.tasks.get_mut(&handle.0) {
                task.settled = Some(settled);
            }
        }

        match state.tasks.get(&handle.0).and_then(|t| t.settled.as_ref()) {
            Some(Ok(_)) => Ok(TaskStatus::Success),
            Some(Err(_)) => Ok(TaskStatus::Error),
            None => Ok(TaskStatus::Running),
        }
    }

    async fn result(&self, handle: &TaskHandle) -> RemoteResult<Option<ManagedRef>> {
        let state = self.state.lock();
        match state.tasks.get(&handle.0).and_then(|t| t.settled.as_ref()) {
            Some(Ok(result)) => Ok(result.clone()),
            _ => Err(RemoteFault::from_message(format!("InvalidState: {} has no result", handle))),
        }
    }

    async fn error(&self, handle: &TaskHandle) -> RemoteResult<RemoteFault> {
        let state = self.state.lock();
        match state.tasks.get(&handle.0).and_then(|t| t.settled.as_ref()) {
            Some(Err(fault)) => Ok(fault.clone()),
            _ => Err(RemoteFault::from_message(format!("InvalidState: {} did not fail", handle))),
        }
    }
}

#[async_trait]
impl AttributePort for SimulatedVcenter {
    async fn available_fields(&self, vm: &ManagedRef) -> RemoteResult<Vec<String>> {
        let state = self.state.lock();
        let entity = state.entity(vm)?;
        Ok(entity.vm.as_ref().map(|v| v.custom_fields.clone()).unwrap_or_default())
    }

    async fn set_custom_value(&self, vm: &ManagedRef, key: &str, value: &str) -> RemoteResult<()> {
        let mut state = self.state.lock();
        state.entity(vm)?;
        let vm_state = state
            .entities
            .get_mut(&vm.value)
            .and_then(|e| e.vm.as_mut())
            .ok_or_else(|| RemoteFault::from_message(format!("InvalidArgument: {} is not a VM", vm)))?;

        if vm_state.locked_fields.iter().any(|f| f == key) {
            return Err(RemoteFault::from_message(format!("NoPermission: cannot set field '{}'", key)));
        }
        vm_state.custom_values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

fn snapshot_error(message: String) -> ProvisionError {
    ProvisionError::Config(format!("inventory snapshot: {}", message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_snapshot() -> InventorySnapshot {
        serde_json::from_str(
            r#"{
                "datacenters": [{"id": "datacenter-2", "name": "dc1", "vm_folder": "group-v3"}],
                "folders": [
                    {"id": "group-v10", "name": "prod", "parent": "group-v3"},
                    {"id": "group-v11", "name": "web", "parent": "group-v10"}
                ],
                "vms": [{"id": "vm-20", "name": "rhel9-base", "parent": "group-v10", "template": true}],
                "task_script": [{"outcome": "fail", "message": "boom"}]
            }"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_listing_is_recursive_and_ordered() {
        let sim = SimulatedVcenter::from_snapshot(sample_snapshot()).unwrap();
        let folders = sim.list_folders_under(&ManagedRef::folder("group-v3")).await.unwrap();

        let names: Vec<&str> = folders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["prod", "web"]);
        assert!(folders[0].contains(&ManagedRef::folder("group-v11")));
        assert!(folders[0].contains(&ManagedRef::vm("vm-20")));
    }

    #[tokio::test]
    async fn test_unknown_parent_rejected() {
        let mut snapshot = sample_snapshot();
        snapshot.folders.push(FolderEntry {
            id: "group-v99".to_string(),
            name: "orphan".to_string(),
            parent: "group-missing".to_string(),
        });
        assert!(SimulatedVcenter::from_snapshot(snapshot).is_err());
    }

    #[tokio::test]
    async fn test_create_folder_rejects_duplicates() {
        let sim = SimulatedVcenter::from_snapshot(sample_snapshot()).unwrap();
        let root = ManagedRef::folder("group-v3");

        let created = sim.create_folder(&root, "staging").await.unwrap();
        assert_eq!(created.name, "staging");
        assert_eq!(sim.folder_creations(), vec![(root.clone(), "staging".to_string())]);

        let err = sim.create_folder(&root, "prod").await.unwrap_err();
        assert!(err.is_duplicate());
    }

    #[tokio::test]
    async fn test_scripted_task_failure_then_default_success() {
        let sim = SimulatedVcenter::from_snapshot(sample_snapshot()).unwrap();
        let folder = ManagedRef::folder("group-v11");
        let vm = ManagedRef::vm("vm-20");

        let first = sim.move_into_folder(&folder, &[vm.clone()]).await.unwrap();
        assert_eq!(sim.poll(&first).await.unwrap(), TaskStatus::Error);
        assert_eq!(sim.error(&first).await.unwrap().message, "boom");

        let second = sim.move_into_folder(&folder, &[vm.clone()]).await.unwrap();
        assert_eq!(sim.poll(&second).await.unwrap(), TaskStatus::Success);
        assert_eq!(sim.parent_of(&vm).await.unwrap(), Some(folder));
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip_keeps_new_entities() {
        let sim = SimulatedVcenter::from_snapshot(sample_snapshot()).unwrap();
        sim.create_folder(&ManagedRef::folder("group-v11"), "blue").await.unwrap();

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("inventory.json");
        sim.save(&path).unwrap();

        let reloaded = SimulatedVcenter::load(&path).unwrap();
        let folders = reloaded.list_folders_under(&ManagedRef::folder("group-v3")).await.unwrap();
        assert!(folders.iter().any(|f| f.name == "blue"));
        // The scripted failure has not been consumed yet
        assert_eq!(reloaded.snapshot().task_script.len(), 1);
    }

    #[tokio::test]
    async fn test_generated_recommendations_follow_clusters() {
        use crate::disk::{DiskDetail, DiskType};

        let sim = SimulatedVcenter::from_snapshot(sample_snapshot()).unwrap();
        let disk = |label: &str, key: i32, cluster: &str| DiskDetail {
            label: label.to_string(),
            datastore: None,
            datastore_cluster: Some(cluster.to_string()),
            size_gb: 10,
            disk_type: DiskType::Thin,
            mount_point: "/x".to_string(),
            fs_type: "xfs".to_string(),
            drive_id: (-key).to_string(),
            device_key: key,
        };
        let spec = PlacementSpec {
            clone_name: "web01".to_string(),
            folder: ManagedRef::folder("group-v11"),
            storage_pod: "gold".to_string(),
            clone: CloneSpec {
                template: ManagedRef::vm("vm-20"),
                cluster: "prod-a".to_string(),
                datastore: None,
                disks: vec![disk("a", -1, "silver"), disk("b", -2, "gold")],
                nics: Vec::new(),
                cpu: None,
                memory_mb: None,
                customization: None,
                power_on: true,
                mark_as_template: false,
            },
        };

        let recs = sim.recommend_placement(&spec).await.unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].disk_ids().collect::<Vec<_>>(), vec![-2]);
        assert_eq!(recs[1].disk_ids().collect::<Vec<_>>(), vec![-1]);
    }
}
