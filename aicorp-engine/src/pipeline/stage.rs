//! Pipeline stages, content payloads and the transition table.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::board::BoardDecision;
use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ideation,
    WorkPacket,
    CsuiteReview,
    BoardVote,
    ExecutionPlan,
    /// Reserved; never entered.
    Production,
    /// Reserved; never entered.
    FinalReview,
    Launched,
    Rejected,
}

impl Stage {
    pub const ALL: [Stage; 9] = [
        Stage::Ideation,
        Stage::WorkPacket,
        Stage::CsuiteReview,
        Stage::BoardVote,
        Stage::ExecutionPlan,
        Stage::Production,
        Stage::FinalReview,
        Stage::Launched,
        Stage::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ideation => "ideation",
            Stage::WorkPacket => "work_packet",
            Stage::CsuiteReview => "csuite_review",
            Stage::BoardVote => "board_vote",
            Stage::ExecutionPlan => "execution_plan",
            Stage::Production => "production",
            Stage::FinalReview => "final_review",
            Stage::Launched => "launched",
            Stage::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Launched | Stage::Rejected)
    }

    /// Edges of the state machine. `ExecutionPlan → Launched` skips the
    /// reserved production stages.
    pub fn can_advance(from: Stage, to: Stage) -> bool {
        matches!(
            (from, to),
            (Stage::Ideation, Stage::WorkPacket)
                | (Stage::WorkPacket, Stage::CsuiteReview)
                | (Stage::CsuiteReview, Stage::BoardVote)
                | (Stage::CsuiteReview, Stage::WorkPacket)
                | (Stage::CsuiteReview, Stage::Rejected)
                | (Stage::BoardVote, Stage::ExecutionPlan)
                | (Stage::BoardVote, Stage::Rejected)
                | (Stage::ExecutionPlan, Stage::Launched)
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdeaContent {
    pub problem: String,
    pub solution: String,
    #[serde(rename = "value_proposition")]
    pub value_prop: String,
    pub target_customer: String,
    pub revenue_model: String,
    pub generated_by: Option<Uuid>,
    pub generated_at: Option<DateTime<Utc>>,
}

/// The work-packet section a pipeline task fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketField {
    MarketResearch,
    CompetitiveAnalysis,
    BusinessPlan,
    FinancialProjections,
    MarketingStrategy,
}

impl PacketField {
    pub const ALL: [PacketField; 5] = [
        PacketField::MarketResearch,
        PacketField::CompetitiveAnalysis,
        PacketField::BusinessPlan,
        PacketField::FinancialProjections,
        PacketField::MarketingStrategy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PacketField::MarketResearch => "market_research",
            PacketField::CompetitiveAnalysis => "competitive_analysis",
            PacketField::BusinessPlan => "business_plan",
            PacketField::FinancialProjections => "financial_projections",
            PacketField::MarketingStrategy => "marketing_strategy",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkPacketContent {
    pub market_research: String,
    pub competitive_analysis: String,
    pub business_plan: String,
    pub financial_projections: String,
    pub marketing_strategy: String,
    pub assembled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub contributors: Vec<Uuid>,
}

impl WorkPacketContent {
    pub fn field(&self, field: PacketField) -> &str {
        match field {
            PacketField::MarketResearch => &self.market_research,
            PacketField::CompetitiveAnalysis => &self.competitive_analysis,
            PacketField::BusinessPlan => &self.business_plan,
            PacketField::FinancialProjections => &self.financial_projections,
            PacketField::MarketingStrategy => &self.marketing_strategy,
        }
    }

    pub fn set(&mut self, field: PacketField, output: String) {
        let slot = match field {
            PacketField::MarketResearch => &mut self.market_research,
            PacketField::CompetitiveAnalysis => &mut self.competitive_analysis,
            PacketField::BusinessPlan => &mut self.business_plan,
            PacketField::FinancialProjections => &mut self.financial_projections,
            PacketField::MarketingStrategy => &mut self.marketing_strategy,
        };
        *slot = output;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewContent {
    pub approved: bool,
    pub feedback: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub concerns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPhase {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub tasks: Vec<String>,
    #[serde(default)]
    pub deliverables: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionPlanContent {
    #[serde(default)]
    pub phases: Vec<ExecutionPhase>,
    #[serde(default)]
    pub timeline: String,
    #[serde(default)]
    pub budget: String,
    #[serde(default)]
    pub team_structure: String,
    #[serde(default)]
    pub kpis: Vec<String>,
    #[serde(default)]
    pub milestones: Vec<String>,
    #[serde(default)]
    pub risk_mitigation: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Outstanding work-packet tasks for the current round.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PacketTracker {
    pub pending_tasks: usize,
    /// Issued task id → section it fills.
    pub task_map: HashMap<Uuid, PacketField>,
}

impl PacketTracker {
    /// Count a completion for `origin`. Unknown or already-counted ids are
    /// ignored. Returns true when this completion drained the round.
    pub fn complete(&mut self, origin: Uuid) -> bool {
        if self.task_map.remove(&origin).is_none() || self.pending_tasks == 0 {
            return false;
        }
        self.pending_tasks -= 1;
        self.pending_tasks == 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductPipeline {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    pub stage: Stage,
    pub target_market: String,
    pub idea: Option<IdeaContent>,
    pub work_packet: Option<WorkPacketContent>,
    pub csuite_review: Option<ReviewContent>,
    pub board_decision: Option<BoardDecision>,
    pub execution_plan: Option<ExecutionPlanContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub final_deliverables: Vec<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revision_count: u32,
    pub tracker: PacketTracker,
}

impl ProductPipeline {
    pub fn new(name: impl Into<String>, description: impl Into<String>, category: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            category: category.into(),
            stage: Stage::Ideation,
            target_market: String::new(),
            idea: None,
            work_packet: None,
            csuite_review: None,
            board_decision: None,
            execution_plan: None,
            final_deliverables: Vec::new(),
            created_by: None,
            created_at: now,
            updated_at: now,
            revision_count: 0,
            tracker: PacketTracker::default(),
        }
    }

    /// Move to `to` if the edge exists and the content it depends on is
    /// present.
    pub fn advance(&mut self, to: Stage) -> Result<(), PipelineError> {
        let from = self.stage;
        let ready = Stage::can_advance(from, to)
            && match to {
                Stage::WorkPacket => self.idea.is_some(),
                Stage::CsuiteReview => self.work_packet.is_some() && self.tracker.pending_tasks == 0,
                Stage::BoardVote => self.csuite_review.as_ref().is_some_and(|r| r.approved),
                Stage::ExecutionPlan => self.board_decision.as_ref().is_some_and(|d| d.approved),
                Stage::Launched => self.execution_plan.is_some(),
                _ => true,
            };
        if !ready {
            return Err(PipelineError::IllegalTransition { from, to });
        }
        self.stage = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        !self.stage.is_terminal()
    }
}
