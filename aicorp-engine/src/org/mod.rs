//! Organization registry.
//!
//! Owns every division, department head, manager and employee, hands out
//! work, grows skill pools under load and reports statistics.
//!
//! Locking: the registry lock guards entity existence and membership only.
//! Each entity has its own lock for its internals, and deliverables sit
//! behind a third, independent lock. Acquisition order is registry →
//! manager → employee; anything that reads many entities copies the `Arc`
//! list under the registry lock and drops it before touching entities.

mod employee;
mod hierarchy;
mod manager;

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::config::Settings;
use crate::error::{CompletionError, ConfigError, OrgError};
use crate::events::{EventSink, OrgEvent};
use crate::llm::{Completed, Completion, CompletionRequest};
use crate::memory::Store;
use crate::model::{Deliverable, EmployeeStatus, PipelineLink, Skill, WorkItem};
use crate::persona::{Biography, PersonKind};
use crate::seed::CompanySeed;

pub use employee::{Employee, EmployeeSnapshot};
pub use hierarchy::{DepartmentHead, DepartmentSnapshot, Division, DivisionSnapshot};
pub use manager::{parse_review, Manager, ManagerSnapshot, ReviewVerdict, Submission};

/// Capacity of the queue carrying pipeline task completions.
const PACKET_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyStatus {
    Running,
    Paused,
    Stopped,
}

impl std::fmt::Display for CompanyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompanyStatus::Running => write!(f, "running"),
            CompanyStatus::Paused => write!(f, "paused"),
            CompanyStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// An approved pipeline task, forwarded to whoever owns the receiver
/// returned by [`Organization::new`].
#[derive(Debug, Clone)]
pub struct PacketCompletion {
    pub link: PipelineLink,
    pub work_id: Uuid,
    pub employee_id: Uuid,
    pub output: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrgStats {
    pub status: CompanyStatus,
    pub divisions: usize,
    pub managers: usize,
    pub total_employees: usize,
    pub by_status: BTreeMap<EmployeeStatus, usize>,
    pub by_skill: BTreeMap<Skill, usize>,
    pub deliverables: usize,
    pub scale_ups: u64,
    pub assignment_failures: u64,
}

/// State shared by the registry and every worker task.
pub(crate) struct Runtime {
    pub settings: Settings,
    pub completion: Arc<dyn Completion>,
    pub permits: Semaphore,
    pub events: Arc<dyn EventSink>,
    pub store: Option<Arc<dyn Store>>,
    pub deliverables: RwLock<HashMap<Uuid, Deliverable>>,
    pub packet_tx: mpsc::Sender<PacketCompletion>,
    pub paused: AtomicBool,
    pub cancel: CancellationToken,
    pub tasks: TaskTracker,
}

impl Runtime {
    /// Every completion call goes through here: wait for a permit, call
    /// under the configured timeout, release the permit on return.
    pub async fn complete(
        &self,
        cancel: &CancellationToken,
        request: CompletionRequest,
    ) -> Result<Completed, CompletionError> {
        let _permit = tokio::select! {
            _ = cancel.cancelled() => return Err(CompletionError::Cancelled),
            permit = self.permits.acquire() => permit.map_err(|_| CompletionError::Cancelled)?,
        };
        let timeout = self.settings.completion_timeout();
        tokio::select! {
            _ = cancel.cancelled() => Err(CompletionError::Cancelled),
            outcome = tokio::time::timeout(timeout, self.completion.complete(request)) => {
                outcome.unwrap_or(Err(CompletionError::Timeout(timeout)))
            }
        }
    }

    /// Run a store operation on the blocking pool under the store timeout.
    /// Failures are logged and yield `None`.
    pub async fn with_store<T, F>(&self, op: &'static str, f: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Store) -> anyhow::Result<T> + Send + 'static,
    {
        let store = self.store.clone()?;
        let handle = tokio::task::spawn_blocking(move || f(store.as_ref()));
        match tokio::time::timeout(self.settings.store_timeout(), handle).await {
            Ok(Ok(Ok(value))) => Some(value),
            Ok(Ok(Err(e))) => {
                tracing::warn!(op, error = %e, "Persistence failed");
                None
            }
            Ok(Err(e)) => {
                tracing::warn!(op, error = %e, "Persistence task failed");
                None
            }
            Err(_) => {
                tracing::warn!(op, "Persistence timed out");
                None
            }
        }
    }

    /// Store a deliverable in memory now and on disk in the background.
    pub fn record_deliverable(self: &Arc<Self>, deliverable: Deliverable) {
        self.deliverables
            .write()
            .insert(deliverable.id, deliverable.clone());
        if self.store.is_some() {
            let rt = Arc::clone(self);
            self.tasks.spawn(async move {
                rt.with_store("save_deliverable", move |s| s.save_deliverable(&deliverable))
                    .await;
            });
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[derive(Default)]
struct Registry {
    ceo: Option<Arc<DepartmentHead>>,
    divisions: Vec<Arc<Division>>,
    heads: Vec<Arc<DepartmentHead>>,
    managers: Vec<Arc<Manager>>,
    employees: Vec<Arc<Employee>>,
    biographies: HashMap<Uuid, Biography>,
    seed: Option<CompanySeed>,
    hires: u64,
}

/// The simulated company.
pub struct Organization {
    registry: RwLock<Registry>,
    rt: Arc<Runtime>,
    scale_ups: AtomicU64,
    assignment_failures: AtomicU64,
}

impl Organization {
    /// Build an empty organization. The returned receiver yields every
    /// approved pipeline-tagged result.
    pub fn new(
        settings: Settings,
        completion: Arc<dyn Completion>,
        events: Arc<dyn EventSink>,
        store: Option<Arc<dyn Store>>,
    ) -> Result<(Arc<Self>, mpsc::Receiver<PacketCompletion>), ConfigError> {
        settings.validate()?;
        let (packet_tx, packet_rx) = mpsc::channel(PACKET_QUEUE_CAPACITY);
        let rt = Runtime {
            permits: Semaphore::new(settings.completion_permits),
            settings,
            completion,
            events,
            store,
            deliverables: RwLock::new(HashMap::new()),
            packet_tx,
            paused: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            tasks: TaskTracker::new(),
        };
        let org = Arc::new(Self {
            registry: RwLock::new(Registry::default()),
            rt: Arc::new(rt),
            scale_ups: AtomicU64::new(0),
            assignment_failures: AtomicU64::new(0),
        });
        Ok((org, packet_rx))
    }

    pub fn settings(&self) -> &Settings {
        &self.rt.settings
    }

    pub fn events(&self) -> &Arc<dyn EventSink> {
        &self.rt.events
    }

    /// Shutdown signal shared by every worker.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.rt.cancel
    }

    /// Spawn a task that `stop` waits for.
    pub fn spawn<F>(&self, fut: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.rt.tasks.spawn(fut);
    }

    /// Completion call on behalf of the organization itself (seed setup,
    /// pipeline stages). Holds a permit like any worker call.
    pub async fn complete(&self, request: CompletionRequest) -> Result<Completed, CompletionError> {
        self.rt.complete(&self.rt.cancel, request).await
    }

    /// Bootstrap the default CEO, divisions, departments, managers and
    /// standing employee pools. Does nothing if already initialized.
    pub fn initialize_structure(&self) -> Result<(), OrgError> {
        {
            let mut reg = self.registry.write();
            if reg.ceo.is_some() {
                return Ok(());
            }
            reg.ceo = Some(DepartmentHead::ceo());
        }

        for (division_name, description, departments) in hierarchy::DEFAULT_STRUCTURE {
            let division = self.create_division(division_name, description);
            for (department, skills) in departments {
                let head = self.create_department_head(division.id, department)?;
                for skill in skills {
                    let manager = self.create_manager(head.id, skill)?;
                    for _ in 0..self.rt.settings.min_pool_size {
                        self.create_employee(manager.id, skill)?;
                    }
                }
            }
        }

        let reg = self.registry.read();
        tracing::info!(
            divisions = reg.divisions.len(),
            managers = reg.managers.len(),
            employees = reg.employees.len(),
            "Organization structure initialized"
        );
        Ok(())
    }

    pub fn ceo(&self) -> Option<Arc<DepartmentHead>> {
        self.registry.read().ceo.clone()
    }

    pub fn create_division(&self, name: &str, description: &str) -> Arc<Division> {
        let division = Division::new(name, description);
        self.registry.write().divisions.push(Arc::clone(&division));
        tracing::info!(division_id = %division.id, division_name = name, "Division created");
        division
    }

    pub fn create_department_head(
        &self,
        division_id: Uuid,
        department: &str,
    ) -> Result<Arc<DepartmentHead>, OrgError> {
        let mut reg = self.registry.write();
        let division = reg
            .divisions
            .iter()
            .find(|d| d.id == division_id)
            .cloned()
            .ok_or(OrgError::UnknownDivision(division_id))?;
        let head = DepartmentHead::new(division_id, department);
        division.add_head(Arc::clone(&head));
        reg.heads.push(Arc::clone(&head));
        Ok(head)
    }

    pub fn create_manager(&self, head_id: Uuid, specialty: Skill) -> Result<Arc<Manager>, OrgError> {
        let mut reg = self.registry.write();
        let head = reg
            .heads
            .iter()
            .find(|h| h.id == head_id)
            .cloned()
            .ok_or(OrgError::UnknownDepartmentHead(head_id))?;
        let manager = Manager::spawn(&self.rt, head_id, specialty);
        head.add_manager(Arc::clone(&manager));
        reg.managers.push(Arc::clone(&manager));
        Ok(manager)
    }

    pub fn create_employee(&self, manager_id: Uuid, skill: Skill) -> Result<Arc<Employee>, OrgError> {
        let mut reg = self.registry.write();
        let manager = reg
            .managers
            .iter()
            .find(|m| m.id == manager_id)
            .cloned()
            .ok_or(OrgError::UnknownManager(manager_id))?;
        let initial = if self.rt.paused.load(Ordering::SeqCst) {
            EmployeeStatus::Paused
        } else {
            EmployeeStatus::Idle
        };
        let employee = self.hire(&mut reg, &manager, skill, initial);
        tracing::debug!(employee_id = %employee.id, %skill, %manager_id, "Employee created");
        Ok(employee)
    }

    /// Caller holds the registry write lock.
    fn hire(
        &self,
        reg: &mut Registry,
        manager: &Arc<Manager>,
        skill: Skill,
        initial: EmployeeStatus,
    ) -> Arc<Employee> {
        reg.hires += 1;
        let name = format!("{} Worker {}", skill.label(), reg.hires);
        let employee = Employee::spawn(&self.rt, name, skill, manager, initial);
        manager.add_report(Arc::clone(&employee));
        reg.employees.push(Arc::clone(&employee));
        employee
    }

    /// Stop an employee's worker and remove it from the organization.
    pub fn terminate_employee(&self, employee_id: Uuid) -> Result<(), OrgError> {
        let (employee, manager) = {
            let mut reg = self.registry.write();
            let idx = reg
                .employees
                .iter()
                .position(|e| e.id == employee_id)
                .ok_or(OrgError::UnknownEmployee(employee_id))?;
            let employee = reg.employees.remove(idx);
            let manager = reg.managers.iter().find(|m| m.id == employee.manager_id).cloned();
            reg.biographies.remove(&employee_id);
            (employee, manager)
        };
        if let Some(manager) = manager {
            manager.remove_report(employee_id);
        }
        employee.terminate();
        tracing::info!(%employee_id, skill = %employee.skill, "Employee terminated");
        Ok(())
    }

    /// Hand `work` to an idle employee with `skill`, scaling the pool up if
    /// policy allows. Returns the chosen employee's id.
    pub fn assign_work(&self, skill: Skill, work: WorkItem) -> Result<Uuid, OrgError> {
        if self.rt.cancel.is_cancelled() {
            return Err(OrgError::Stopped);
        }
        let candidates = self.employees_with_skill(skill);
        let mut work = work;
        for employee in &candidates {
            match employee.try_assign(work, None) {
                Ok(()) => {
                    tracing::debug!(employee_id = %employee.id, %skill, "Work assigned");
                    return Ok(employee.id);
                }
                Err(back) => work = back,
            }
        }

        if self.should_scale_up(&candidates) {
            if let Some(employee) = self.scale_up(skill) {
                if employee.try_assign(work, None).is_ok() {
                    return Ok(employee.id);
                }
                if self.rt.paused.load(Ordering::SeqCst) {
                    employee.pause_if_idle();
                }
            }
        }

        self.assignment_failures.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(%skill, "No available employees");
        Err(OrgError::NoAvailableEmployees { skill })
    }

    /// Busy means working or dead; a held lock counts as working.
    fn should_scale_up(&self, pool: &[Arc<Employee>]) -> bool {
        let total = pool.len();
        if total == 0 {
            return true;
        }
        if total >= self.rt.settings.max_pool_size {
            return false;
        }
        let busy = pool
            .iter()
            .filter(|e| {
                matches!(
                    e.try_status(),
                    None | Some(EmployeeStatus::Working) | Some(EmployeeStatus::Terminated)
                )
            })
            .count();
        busy as f64 / total as f64 >= self.rt.settings.scale_threshold
    }

    /// Hire one employee under the least-loaded manager of `skill`. The pool
    /// cap is re-checked under the registry write lock. The hire starts Idle
    /// even while paused, since it is hired to take the pending item.
    fn scale_up(&self, skill: Skill) -> Option<Arc<Employee>> {
        let employee = {
            let mut reg = self.registry.write();
            let population = reg.employees.iter().filter(|e| e.skill == skill).count();
            if population >= self.rt.settings.max_pool_size {
                return None;
            }
            let manager = reg
                .managers
                .iter()
                .filter(|m| m.specialty == skill)
                .min_by_key(|m| m.report_count())
                .cloned()?;
            self.hire(&mut reg, &manager, skill, EmployeeStatus::Idle)
        };
        self.scale_ups.fetch_add(1, Ordering::Relaxed);
        tracing::info!(employee_id = %employee.id, %skill, "Scaled up");
        self.rt.events.publish(OrgEvent::ScaledUp {
            employee_id: employee.id,
            skill,
            manager_id: employee.manager_id,
        });
        Some(employee)
    }

    pub fn status(&self) -> CompanyStatus {
        if self.rt.cancel.is_cancelled() {
            CompanyStatus::Stopped
        } else if self.rt.paused.load(Ordering::SeqCst) {
            CompanyStatus::Paused
        } else {
            CompanyStatus::Running
        }
    }

    /// Idle employees become Paused; working ones finish and then settle
    /// into Paused. Returns false if not running.
    pub fn pause(&self) -> bool {
        if self.rt.cancel.is_cancelled() || self.rt.paused.swap(true, Ordering::SeqCst) {
            return false;
        }
        let flipped = self
            .all_employees()
            .iter()
            .filter(|e| e.pause_if_idle())
            .count();
        tracing::info!(paused_employees = flipped, "Organization paused");
        self.rt.events.publish(OrgEvent::StatusChanged {
            status: CompanyStatus::Paused,
        });
        true
    }

    /// Inverse of [`pause`](Self::pause).
    pub fn resume(&self) -> bool {
        if self.rt.cancel.is_cancelled() || !self.rt.paused.swap(false, Ordering::SeqCst) {
            return false;
        }
        let flipped = self
            .all_employees()
            .iter()
            .filter(|e| e.resume_if_paused())
            .count();
        tracing::info!(resumed_employees = flipped, "Organization resumed");
        self.rt.events.publish(OrgEvent::StatusChanged {
            status: CompanyStatus::Running,
        });
        true
    }

    /// Cancel every worker and wait for all spawned tasks to finish.
    pub async fn stop(&self) {
        self.rt.cancel.cancel();
        self.rt.tasks.close();
        self.rt.tasks.wait().await;
        tracing::info!("Organization stopped");
    }

    fn all_employees(&self) -> Vec<Arc<Employee>> {
        self.registry.read().employees.clone()
    }

    pub fn employees_with_skill(&self, skill: Skill) -> Vec<Arc<Employee>> {
        self.registry
            .read()
            .employees
            .iter()
            .filter(|e| e.skill == skill)
            .cloned()
            .collect()
    }

    pub fn employee(&self, id: Uuid) -> Option<Arc<Employee>> {
        self.registry.read().employees.iter().find(|e| e.id == id).cloned()
    }

    pub fn manager(&self, id: Uuid) -> Option<Arc<Manager>> {
        self.registry.read().managers.iter().find(|m| m.id == id).cloned()
    }

    pub fn managers_with_specialty(&self, skill: Skill) -> Vec<Arc<Manager>> {
        self.registry
            .read()
            .managers
            .iter()
            .filter(|m| m.specialty == skill)
            .cloned()
            .collect()
    }

    pub fn employees(&self) -> Vec<EmployeeSnapshot> {
        self.all_employees().iter().map(|e| e.snapshot()).collect()
    }

    pub fn managers(&self) -> Vec<ManagerSnapshot> {
        let managers = self.registry.read().managers.clone();
        managers.iter().map(|m| m.snapshot()).collect()
    }

    pub fn divisions(&self) -> Vec<DivisionSnapshot> {
        let divisions = self.registry.read().divisions.clone();
        divisions.iter().map(|d| d.snapshot()).collect()
    }

    /// Newest first.
    pub fn deliverables(&self) -> Vec<Deliverable> {
        let mut all: Vec<_> = self.rt.deliverables.read().values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    pub fn deliverable(&self, id: Uuid) -> Option<Deliverable> {
        self.rt.deliverables.read().get(&id).cloned()
    }

    /// Snapshot without waiting on any entity lock.
    pub fn stats(&self) -> OrgStats {
        let (divisions, managers, employees) = {
            let reg = self.registry.read();
            (reg.divisions.len(), reg.managers.len(), reg.employees.clone())
        };
        let mut by_status = BTreeMap::new();
        let mut by_skill = BTreeMap::new();
        for employee in &employees {
            let status = employee.try_status().unwrap_or(EmployeeStatus::Working);
            *by_status.entry(status).or_insert(0) += 1;
            *by_skill.entry(employee.skill).or_insert(0) += 1;
        }
        OrgStats {
            status: self.status(),
            divisions,
            managers,
            total_employees: employees.len(),
            by_status,
            by_skill,
            deliverables: self.rt.deliverables.read().len(),
            scale_ups: self.scale_ups.load(Ordering::Relaxed),
            assignment_failures: self.assignment_failures.load(Ordering::Relaxed),
        }
    }

    pub fn seed(&self) -> Option<CompanySeed> {
        self.registry.read().seed.clone()
    }

    pub fn has_seed(&self) -> bool {
        self.registry.read().seed.is_some()
    }

    /// Prompt preamble for the active seed.
    pub fn seed_context(&self) -> String {
        match self.registry.read().seed.as_ref() {
            Some(seed) => seed.context(),
            None => "No business context configured. Operating in general mode.".to_string(),
        }
    }

    /// Activate a seed, generating a missing mission or vision first, and
    /// persist it. Returns the stored seed.
    pub async fn set_seed(&self, mut seed: CompanySeed) -> CompanySeed {
        if seed.mission.is_empty() || seed.vision.is_empty() {
            let request = CompletionRequest::new("", seed.mission_vision_prompt())
                .max_tokens(200)
                .temperature(0.7);
            let response = match self.complete(request).await {
                Ok(done) => Some(done.text),
                Err(e) => {
                    tracing::warn!(error = %e, "Mission/vision generation failed, using defaults");
                    None
                }
            };
            seed.apply_mission_vision(response.as_deref());
        }
        seed.active = true;
        seed.updated_at = chrono::Utc::now();

        if let Some(previous) = self.registry.write().seed.replace(seed.clone()) {
            if previous.id != seed.id {
                tracing::info!(previous = %previous.id, "Replacing active seed");
            }
        }

        let stored = seed.clone();
        self.rt
            .with_store("save_seed", move |s| s.save_seed(&stored))
            .await;
        tracing::info!(
            seed_id = %seed.id,
            company = %seed.company_name,
            sector = %seed.sector,
            "Company seeded"
        );
        seed
    }

    /// Restore the active seed from the store, if one exists.
    pub async fn load_seed(&self) -> Option<CompanySeed> {
        let seed = self.rt.with_store("load_seed", |s| s.load_seed()).await??;
        tracing::info!(
            seed_id = %seed.id,
            company = %seed.company_name,
            sector = %seed.sector,
            "Company seed loaded"
        );
        self.registry.write().seed = Some(seed.clone());
        Some(seed)
    }

    /// Attach a biography and rebuild the person's persona from it.
    pub fn set_biography(&self, mut bio: Biography) -> Result<(), OrgError> {
        let persona = bio.persona();
        match bio.person_kind {
            PersonKind::Employee => self
                .employee(bio.person_id)
                .ok_or(OrgError::UnknownEmployee(bio.person_id))?
                .apply_identity(&bio.name, persona),
            PersonKind::Manager => self
                .manager(bio.person_id)
                .ok_or(OrgError::UnknownManager(bio.person_id))?
                .apply_identity(&bio.name, persona),
        }
        bio.updated_at = chrono::Utc::now();
        tracing::info!(person_id = %bio.person_id, kind = ?bio.person_kind, "Biography updated");
        self.registry.write().biographies.insert(bio.person_id, bio);
        Ok(())
    }

    pub fn biography(&self, person_id: Uuid) -> Option<Biography> {
        self.registry.read().biographies.get(&person_id).cloned()
    }

    pub fn biographies(&self) -> Vec<Biography> {
        self.registry.read().biographies.values().cloned().collect()
    }

    /// Drop a biography and restore the default persona. The name stays.
    pub fn delete_biography(&self, person_id: Uuid) -> Option<Biography> {
        let bio = self.registry.write().biographies.remove(&person_id)?;
        match bio.person_kind {
            PersonKind::Employee => {
                if let Some(employee) = self.employee(person_id) {
                    employee.reset_persona();
                }
            }
            PersonKind::Manager => {
                if let Some(manager) = self.manager(person_id) {
                    manager.reset_persona();
                }
            }
        }
        Some(bio)
    }
}
