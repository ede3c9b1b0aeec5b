//! Board-of-directors collaborator consulted at the `BoardVote` stage.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::ProductPipeline;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardDecision {
    pub approved: bool,
    pub votes_for: u32,
    pub votes_against: u32,
    pub abstentions: u32,
    /// member → comment
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub comments: BTreeMap<String, String>,
    pub decided_at: DateTime<Utc>,
}

impl BoardDecision {
    pub fn new(approved: bool, votes_for: u32, votes_against: u32, abstentions: u32) -> Self {
        Self {
            approved,
            votes_for,
            votes_against,
            abstentions,
            comments: BTreeMap::new(),
            decided_at: Utc::now(),
        }
    }
}

/// Decides whether a reviewed product gets funded. The pipeline awaits the
/// vote inline; implementations own their own timing.
#[async_trait]
pub trait BoardVoter: Send + Sync {
    async fn vote(&self, pipeline: &ProductPipeline) -> BoardDecision;
}

/// Returns the same tally every time.
#[derive(Debug, Clone)]
pub struct FixedBoard {
    approved: bool,
    votes_for: u32,
    votes_against: u32,
    abstentions: u32,
}

impl FixedBoard {
    pub fn approving() -> Self {
        Self {
            approved: true,
            votes_for: 8,
            votes_against: 3,
            abstentions: 1,
        }
    }

    pub fn rejecting() -> Self {
        Self {
            approved: false,
            votes_for: 3,
            votes_against: 8,
            abstentions: 1,
        }
    }
}

impl Default for FixedBoard {
    fn default() -> Self {
        Self::approving()
    }
}

#[async_trait]
impl BoardVoter for FixedBoard {
    async fn vote(&self, pipeline: &ProductPipeline) -> BoardDecision {
        tracing::debug!(pipeline_id = %pipeline.id, approved = self.approved, "Board vote");
        BoardDecision::new(self.approved, self.votes_for, self.votes_against, self.abstentions)
    }
}
