//! Fire-and-forget event publishing.
//!
//! Workers and the pipeline manager report progress through an
//! [`EventSink`]. Publishing never blocks and never fails; a sink that
//! cannot deliver drops the event.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::model::{QualityRating, Skill};
use crate::org::CompanyStatus;
use crate::pipeline::Stage;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrgEvent {
    WorkStarted {
        employee_id: Uuid,
        employee_name: String,
        skill: Skill,
        work_id: Uuid,
        work_title: String,
    },
    WorkComplete {
        employee_id: Uuid,
        employee_name: String,
        skill: Skill,
        work_id: Uuid,
        work_title: String,
        result_id: Uuid,
        has_error: bool,
        work_count: u64,
        duration_ms: u64,
    },
    WorkReviewed {
        manager_id: Uuid,
        work_id: Uuid,
        result_id: Uuid,
        rating: QualityRating,
        approved: bool,
    },
    ScaledUp {
        employee_id: Uuid,
        skill: Skill,
        manager_id: Uuid,
    },
    StatusChanged {
        status: CompanyStatus,
    },
    PipelineCreated {
        pipeline_id: Uuid,
        name: String,
    },
    PipelineUpdate {
        pipeline_id: Uuid,
        name: String,
        stage: Stage,
    },
    PipelineComplete {
        pipeline_id: Uuid,
        name: String,
    },
    PipelineRejected {
        pipeline_id: Uuid,
        name: String,
        revision_count: u32,
    },
}

impl OrgEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            OrgEvent::WorkStarted { .. } => "work_started",
            OrgEvent::WorkComplete { .. } => "work_complete",
            OrgEvent::WorkReviewed { .. } => "work_reviewed",
            OrgEvent::ScaledUp { .. } => "scaled_up",
            OrgEvent::StatusChanged { .. } => "status_changed",
            OrgEvent::PipelineCreated { .. } => "pipeline_created",
            OrgEvent::PipelineUpdate { .. } => "pipeline_update",
            OrgEvent::PipelineComplete { .. } => "pipeline_complete",
            OrgEvent::PipelineRejected { .. } => "pipeline_rejected",
        }
    }
}

pub trait EventSink: Send + Sync {
    fn publish(&self, event: OrgEvent);
}

/// Discards everything.
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: OrgEvent) {}
}

/// Fan-out over a tokio broadcast channel. Slow subscribers lag and lose
/// the oldest events rather than holding up publishers.
pub struct BroadcastSink {
    tx: broadcast::Sender<OrgEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrgEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastSink {
    fn publish(&self, event: OrgEvent) {
        // Err only means nobody is listening.
        let _ = self.tx.send(event);
    }
}
