//! Employee entity and its worker task.
//!
//! An employee owns a bounded work queue drained by exactly one task. The
//! status moves Idle → Working inside [`Employee::try_assign`], under the
//! same lock that enqueues the item, so an item is accepted by at most one
//! employee and an employee never holds two reservations.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{panic_message, Manager, Runtime, Submission};
use crate::events::OrgEvent;
use crate::format::format_objectives;
use crate::llm::CompletionRequest;
use crate::model::{
    ActivityKind, ActivityLog, ActivityLogEntry, EmployeeStatus, Skill, WorkItem, WorkResult,
};

struct EmployeeState {
    name: String,
    persona: String,
    status: EmployeeStatus,
    current_work: Option<WorkItem>,
    activity: ActivityLog,
    history: Vec<WorkResult>,
}

pub struct Employee {
    pub id: Uuid,
    pub skill: Skill,
    pub manager_id: Uuid,
    pub hired_at: DateTime<Utc>,
    state: RwLock<EmployeeState>,
    work_tx: mpsc::Sender<WorkItem>,
    results: broadcast::Sender<WorkResult>,
    work_count: AtomicU64,
    cancel: CancellationToken,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmployeeSnapshot {
    pub id: Uuid,
    pub name: String,
    pub skill: Skill,
    pub status: EmployeeStatus,
    pub manager_id: Uuid,
    pub current_work: Option<WorkItem>,
    pub work_count: u64,
    pub hired_at: DateTime<Utc>,
}

impl Employee {
    /// Create the employee and start its worker on the runtime's tracker.
    pub(super) fn spawn(
        rt: &Arc<Runtime>,
        name: String,
        skill: Skill,
        manager: &Manager,
        initial: EmployeeStatus,
    ) -> Arc<Self> {
        let (work_tx, work_rx) = mpsc::channel(rt.settings.work_queue_capacity);
        let (results, _) = broadcast::channel(16);
        let mut activity = ActivityLog::default();
        activity.push(ActivityKind::StatusChanged, format!("Hired as {}", skill.label()), None);
        let employee = Arc::new(Self {
            id: Uuid::new_v4(),
            skill,
            manager_id: manager.id,
            hired_at: Utc::now(),
            state: RwLock::new(EmployeeState {
                name,
                persona: skill.persona().to_string(),
                status: initial,
                current_work: None,
                activity,
                history: Vec::new(),
            }),
            work_tx,
            results,
            work_count: AtomicU64::new(0),
            cancel: rt.cancel.child_token(),
        });

        let worker = Arc::clone(&employee);
        let review_tx = manager.review_sender();
        let rt = Arc::clone(rt);
        rt.tasks.clone().spawn(async move {
            let outcome = AssertUnwindSafe(Arc::clone(&worker).run(work_rx, rt, review_tx))
                .catch_unwind()
                .await;
            if let Err(panic) = outcome {
                tracing::error!(
                    employee_id = %worker.id,
                    panic = %panic_message(panic.as_ref()),
                    "Employee worker panicked"
                );
            }
            worker.mark_terminated();
        });
        employee
    }

    pub fn name(&self) -> String {
        self.state.read().name.clone()
    }

    pub fn persona(&self) -> String {
        self.state.read().persona.clone()
    }

    pub fn status(&self) -> EmployeeStatus {
        self.state.read().status
    }

    /// `None` if the state lock is held right now.
    pub fn try_status(&self) -> Option<EmployeeStatus> {
        self.state.try_read().map(|s| s.status)
    }

    pub fn current_work(&self) -> Option<WorkItem> {
        self.state.read().current_work.clone()
    }

    pub fn work_count(&self) -> u64 {
        self.work_count.load(Ordering::Relaxed)
    }

    pub fn activity_log(&self) -> Vec<ActivityLogEntry> {
        self.state.read().activity.to_vec()
    }

    pub fn work_history(&self) -> Vec<WorkResult> {
        self.state.read().history.clone()
    }

    /// Every result this employee produces, as it is produced.
    pub fn subscribe_results(&self) -> broadcast::Receiver<WorkResult> {
        self.results.subscribe()
    }

    pub fn snapshot(&self) -> EmployeeSnapshot {
        let state = self.state.read();
        EmployeeSnapshot {
            id: self.id,
            name: state.name.clone(),
            skill: self.skill,
            status: state.status,
            manager_id: self.manager_id,
            current_work: state.current_work.clone(),
            work_count: self.work_count(),
            hired_at: self.hired_at,
        }
    }

    /// Reserve this employee for `item` and enqueue it. Hands the item back
    /// if the employee is not idle or its queue cannot take it.
    pub fn try_assign(&self, mut item: WorkItem, assigned_by: Option<Uuid>) -> Result<(), WorkItem> {
        let mut state = self.state.write();
        if state.status != EmployeeStatus::Idle {
            return Err(item);
        }
        item.assigned_to = Some(self.id);
        if assigned_by.is_some() {
            item.assigned_by = assigned_by;
        }
        match self.work_tx.try_send(item.clone()) {
            Ok(()) => {
                state.status = EmployeeStatus::Working;
                state
                    .activity
                    .push(ActivityKind::WorkAssigned, format!("Assigned: {}", item.title), Some(item.id));
                state.current_work = Some(item);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) | Err(mpsc::error::TrySendError::Closed(_)) => {
                item.assigned_to = None;
                Err(item)
            }
        }
    }

    /// Idle → Paused. Returns true if the status changed.
    pub(super) fn pause_if_idle(&self) -> bool {
        let mut state = self.state.write();
        if state.status != EmployeeStatus::Idle {
            return false;
        }
        state.status = EmployeeStatus::Paused;
        state.activity.push(ActivityKind::Paused, "Paused", None);
        true
    }

    /// Paused → Idle. Returns true if the status changed.
    pub(super) fn resume_if_paused(&self) -> bool {
        let mut state = self.state.write();
        if state.status != EmployeeStatus::Paused {
            return false;
        }
        state.status = EmployeeStatus::Idle;
        state.activity.push(ActivityKind::Resumed, "Resumed", None);
        true
    }

    pub(super) fn apply_identity(&self, name: &str, persona: String) {
        let mut state = self.state.write();
        state.name = name.to_string();
        state.persona = persona;
    }

    pub(super) fn reset_persona(&self) {
        self.state.write().persona = self.skill.persona().to_string();
    }

    pub(super) fn terminate(&self) {
        self.cancel.cancel();
        self.mark_terminated();
    }

    fn mark_terminated(&self) {
        let mut state = self.state.write();
        if state.status != EmployeeStatus::Terminated {
            state.status = EmployeeStatus::Terminated;
            state.current_work = None;
            state.activity.push(ActivityKind::Terminated, "Terminated", None);
        }
    }

    async fn run(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<WorkItem>,
        rt: Arc<Runtime>,
        review_tx: mpsc::Sender<Submission>,
    ) {
        tracing::debug!(employee_id = %self.id, skill = %self.skill, "Employee started");
        loop {
            let item = tokio::select! {
                _ = self.cancel.cancelled() => break,
                item = rx.recv() => match item {
                    Some(item) => item,
                    None => break,
                },
            };

            let name = self.begin(&item);
            rt.events.publish(OrgEvent::WorkStarted {
                employee_id: self.id,
                employee_name: name.clone(),
                skill: self.skill,
                work_id: item.id,
                work_title: item.title.clone(),
            });

            let result = self.execute(&rt, &item).await;
            let work_count = self.finish(&item, &result, &rt);
            tracing::info!(
                employee_id = %self.id,
                work_id = %item.id,
                duration_ms = result.duration_ms,
                error = result.is_error(),
                "Work completed"
            );
            rt.events.publish(OrgEvent::WorkComplete {
                employee_id: self.id,
                employee_name: name.clone(),
                skill: self.skill,
                work_id: item.id,
                work_title: item.title.clone(),
                result_id: result.id,
                has_error: result.is_error(),
                work_count,
                duration_ms: result.duration_ms,
            });
            // Err only means nobody subscribed.
            let _ = self.results.send(result.clone());

            let submission = Submission {
                work: item,
                result,
                employee_id: self.id,
                employee_name: name,
                skill: self.skill,
            };
            match review_tx.try_send(submission) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(s)) => {
                    tracing::warn!(employee_id = %self.id, work_id = %s.work.id, "Review queue full, result dropped");
                }
                Err(mpsc::error::TrySendError::Closed(s)) => {
                    tracing::warn!(employee_id = %self.id, work_id = %s.work.id, "Manager gone, result dropped");
                }
            }
        }
        tracing::debug!(employee_id = %self.id, "Employee stopped");
    }

    fn begin(&self, item: &WorkItem) -> String {
        let mut state = self.state.write();
        if state.status != EmployeeStatus::Terminated {
            state.status = EmployeeStatus::Working;
        }
        state.current_work = Some(item.clone());
        state
            .activity
            .push(ActivityKind::WorkStarted, format!("Started: {}", item.title), Some(item.id));
        state.name.clone()
    }

    async fn execute(&self, rt: &Runtime, item: &WorkItem) -> WorkResult {
        let started = Instant::now();
        let prompt = format!(
            "TASK: {}\n\nDESCRIPTION: {}\n\nOBJECTIVES:\n{}\n\nComplete this task according to your role and skill. Provide only the output, no explanations.",
            item.title,
            item.description,
            format_objectives(&item.objectives)
        );
        let request = CompletionRequest::new(self.persona(), prompt)
            .max_tokens(2000)
            .temperature(0.7);

        let mut metadata = Map::new();
        let (output, tokens_used) = match rt.complete(&self.cancel, request).await {
            Ok(done) => {
                let tokens = done.tokens();
                (done.text, tokens)
            }
            Err(e) => {
                tracing::warn!(employee_id = %self.id, work_id = %item.id, error = %e, "Completion failed");
                metadata.insert("error".into(), Value::Bool(true));
                metadata.insert("error_message".into(), Value::String(e.to_string()));
                (format!("Error: {e}"), 0)
            }
        };

        WorkResult {
            id: Uuid::new_v4(),
            work_item_id: item.id,
            employee_id: self.id,
            output,
            tokens_used,
            duration_ms: started.elapsed().as_millis() as u64,
            completed_at: Utc::now(),
            metadata,
        }
    }

    /// Settle back to Idle, or Paused if the organization paused meanwhile.
    /// The pause flag is read under the employee lock.
    fn finish(&self, item: &WorkItem, result: &WorkResult, rt: &Runtime) -> u64 {
        let mut state = self.state.write();
        if state.status != EmployeeStatus::Terminated {
            state.status = if rt.paused.load(Ordering::SeqCst) {
                EmployeeStatus::Paused
            } else {
                EmployeeStatus::Idle
            };
        }
        state.current_work = None;
        state.history.push(result.clone());
        state.activity.push(
            ActivityKind::WorkCompleted,
            format!("Completed: {} ({}ms)", item.title, result.duration_ms),
            Some(item.id),
        );
        self.work_count.fetch_add(1, Ordering::Relaxed) + 1
    }
}
