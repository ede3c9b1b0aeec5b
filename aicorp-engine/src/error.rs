//! Error types at the library boundary.

use uuid::Uuid;

use crate::model::Skill;
use crate::pipeline::Stage;

/// Failures from the completion capability. Always recovered by callers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompletionError {
    #[error("completion timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("completion cancelled")]
    Cancelled,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("empty completion")]
    Empty,
}

#[derive(Debug, thiserror::Error)]
pub enum OrgError {
    #[error("no available employees for skill: {skill}")]
    NoAvailableEmployees { skill: Skill },
    #[error("unknown division {0}")]
    UnknownDivision(Uuid),
    #[error("unknown department head {0}")]
    UnknownDepartmentHead(Uuid),
    #[error("unknown manager {0}")]
    UnknownManager(Uuid),
    #[error("unknown employee {0}")]
    UnknownEmployee(Uuid),
    #[error("organization stopped")]
    Stopped,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("pipeline {0} not found")]
    NotFound(Uuid),
    #[error("illegal stage transition {from} -> {to}")]
    IllegalTransition { from: Stage, to: Stage },
    #[error("company not seeded")]
    NotSeeded,
    #[error(transparent)]
    Completion(#[from] CompletionError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("min pool size {min} exceeds max pool size {max}")]
    PoolBounds { min: usize, max: usize },
    #[error("scale threshold must be in (0, 1], got {0}")]
    Threshold(f64),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}
