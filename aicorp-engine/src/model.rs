//! Records exchanged between workers.
//!
//! Skills and statuses are plain `Copy` enums with snake_case wire names.
//! Work flows as `WorkItem` → `WorkResult` → `QualityReview` → `Deliverable`.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Activity entries kept per employee.
pub const ACTIVITY_LOG_LIMIT: usize = 100;

/// `WorkItem::inputs` key carrying the owning pipeline.
pub const INPUT_PIPELINE_ID: &str = "pipeline_id";
/// `WorkItem::inputs` key naming the work-packet field a task fills.
pub const INPUT_FIELD: &str = "field";
/// `WorkItem::inputs` key linking a revision back to the first item of its chain.
pub const INPUT_REVISION_OF: &str = "revision_of";

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseError {
    pub kind: &'static str,
    pub value: String,
}

/// The capability tag that partitions employees and routes work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    Writing,
    Coding,
    Design,
    Research,
    Analysis,
    Marketing,
    Sales,
    Support,
    Qa,
    ProjectManagement,
    DataEntry,
    ContentReview,
}

impl Skill {
    pub const ALL: [Skill; 12] = [
        Skill::Writing,
        Skill::Coding,
        Skill::Design,
        Skill::Research,
        Skill::Analysis,
        Skill::Marketing,
        Skill::Sales,
        Skill::Support,
        Skill::Qa,
        Skill::ProjectManagement,
        Skill::DataEntry,
        Skill::ContentReview,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Skill::Writing => "writing",
            Skill::Coding => "coding",
            Skill::Design => "design",
            Skill::Research => "research",
            Skill::Analysis => "analysis",
            Skill::Marketing => "marketing",
            Skill::Sales => "sales",
            Skill::Support => "support",
            Skill::Qa => "qa",
            Skill::ProjectManagement => "project_management",
            Skill::DataEntry => "data_entry",
            Skill::ContentReview => "content_review",
        }
    }

    /// Human-facing name used in generated titles ("Coding Manager").
    pub fn label(&self) -> &'static str {
        match self {
            Skill::Writing => "Writing",
            Skill::Coding => "Coding",
            Skill::Design => "Design",
            Skill::Research => "Research",
            Skill::Analysis => "Analysis",
            Skill::Marketing => "Marketing",
            Skill::Sales => "Sales",
            Skill::Support => "Support",
            Skill::Qa => "QA",
            Skill::ProjectManagement => "Project Management",
            Skill::DataEntry => "Data Entry",
            Skill::ContentReview => "Content Review",
        }
    }

    /// Default system persona for an employee holding this skill.
    pub fn persona(&self) -> &'static str {
        match self {
            Skill::Writing => {
                "You are a professional writer. You focus exclusively on writing clear, engaging, and well-structured content. You follow style guides and write for the target audience. Output only the written content."
            }
            Skill::Coding => {
                "You are a software developer. You write clean, efficient, well-documented code. You follow established coding standards. Output only the code with minimal comments."
            }
            Skill::Design => {
                "You are a designer. You create visual concepts and design specifications. Describe designs clearly with colors, layouts, and styling. Output design specifications or image generation prompts."
            }
            Skill::Research => {
                "You are a researcher. You gather, analyze, and synthesize information from various sources. Provide factual, well-sourced findings. Output structured research findings."
            }
            Skill::Analysis => {
                "You are a data analyst. You analyze data, identify patterns, and draw insights. Provide clear, actionable analysis with supporting evidence. Output analysis reports."
            }
            Skill::Marketing => {
                "You are a marketing specialist. You create marketing strategies, campaigns, and messaging. Focus on target audience and value proposition. Output marketing plans and copy."
            }
            Skill::Sales => {
                "You are a sales specialist. You craft persuasive pitches, handle objections, and close deals. Focus on customer needs and value. Output sales materials and scripts."
            }
            Skill::Support => {
                "You are a customer support specialist. You help customers solve problems with empathy and efficiency. Provide clear, helpful responses. Output support responses."
            }
            Skill::Qa => {
                "You are a QA specialist. You review work for errors, inconsistencies, and quality issues. Be thorough and constructive. Output detailed QA reports."
            }
            Skill::ProjectManagement => {
                "You are a project manager. You plan, coordinate, and track project progress. Focus on timelines, resources, and deliverables. Output project plans and status reports."
            }
            Skill::DataEntry => {
                "You are a data entry specialist. You accurately input, organize, and format data. Focus on accuracy and consistency. Output structured data."
            }
            Skill::ContentReview => {
                "You are a content reviewer. You review content for accuracy, tone, and quality. Provide constructive feedback. Output review notes."
            }
        }
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Skill {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Skill::ALL
            .into_iter()
            .find(|skill| skill.as_str() == wanted)
            .ok_or(ParseError {
                kind: "skill",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmployeeStatus {
    Idle,
    Working,
    Paused,
    Terminated,
}

impl fmt::Display for EmployeeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmployeeStatus::Idle => write!(f, "idle"),
            EmployeeStatus::Working => write!(f, "working"),
            EmployeeStatus::Paused => write!(f, "paused"),
            EmployeeStatus::Terminated => write!(f, "terminated"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityRating {
    Excellent,
    Good,
    Acceptable,
    NeedsWork,
    Rejected,
}

impl fmt::Display for QualityRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityRating::Excellent => write!(f, "excellent"),
            QualityRating::Good => write!(f, "good"),
            QualityRating::Acceptable => write!(f, "acceptable"),
            QualityRating::NeedsWork => write!(f, "needs_work"),
            QualityRating::Rejected => write!(f, "rejected"),
        }
    }
}

impl FromStr for QualityRating {
    type Err = ParseError;

    /// Lenient: accepts "Needs Work", "needs-work" and "needs_work".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match norm.as_str() {
            "excellent" => Ok(QualityRating::Excellent),
            "good" => Ok(QualityRating::Good),
            "acceptable" => Ok(QualityRating::Acceptable),
            "needs_work" => Ok(QualityRating::NeedsWork),
            "rejected" => Ok(QualityRating::Rejected),
            _ => Err(ParseError {
                kind: "quality rating",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliverableStatus {
    InProgress,
    Completed,
    InReview,
    Approved,
    Rejected,
}

impl DeliverableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliverableStatus::InProgress => "in_progress",
            DeliverableStatus::Completed => "completed",
            DeliverableStatus::InReview => "in_review",
            DeliverableStatus::Approved => "approved",
            DeliverableStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for DeliverableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    WorkAssigned,
    WorkStarted,
    WorkCompleted,
    ReviewGiven,
    ReviewReceived,
    RevisionRequested,
    StatusChanged,
    ScaledUp,
    Paused,
    Resumed,
    Terminated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: ActivityKind,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_id: Option<Uuid>,
}

/// Ring buffer of the newest [`ACTIVITY_LOG_LIMIT`] entries, oldest first.
#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    entries: VecDeque<ActivityLogEntry>,
}

impl ActivityLog {
    pub fn push(&mut self, kind: ActivityKind, description: impl Into<String>, work_id: Option<Uuid>) {
        if self.entries.len() == ACTIVITY_LOG_LIMIT {
            self.entries.pop_front();
        }
        self.entries.push_back(ActivityLogEntry {
            timestamp: Utc::now(),
            kind,
            description: description.into(),
            work_id,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_vec(&self) -> Vec<ActivityLogEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkKind {
    Task,
    Revision,
    PipelineTask,
}

/// A unit of work, consumed exactly once by one employee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: Uuid,
    pub kind: WorkKind,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub objectives: Vec<String>,
    pub priority: u8,
    #[serde(default)]
    pub inputs: Map<String, Value>,
    pub assigned_to: Option<Uuid>,
    pub assigned_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl WorkItem {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: WorkKind::Task,
            title: title.into(),
            description: description.into(),
            objectives: Vec::new(),
            priority: 1,
            inputs: Map::new(),
            assigned_to: None,
            assigned_by: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_kind(mut self, kind: WorkKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_objectives(mut self, objectives: Vec<String>) -> Self {
        self.objectives = objectives;
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_input(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.inputs.insert(key.to_string(), value.into());
        self
    }

    /// Pipeline linkage carried in `inputs`, if any.
    ///
    /// `origin` is the id of the first item in a revision chain, so a
    /// revised result is credited to the task that was originally issued.
    pub fn pipeline_link(&self) -> Option<PipelineLink> {
        let pipeline_id = self
            .inputs
            .get(INPUT_PIPELINE_ID)?
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())?;
        let field = self.inputs.get(INPUT_FIELD)?.as_str()?.to_string();
        let origin = self
            .inputs
            .get(INPUT_REVISION_OF)
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or(self.id);
        Some(PipelineLink {
            pipeline_id,
            field,
            origin,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineLink {
    pub pipeline_id: Uuid,
    pub field: String,
    pub origin: Uuid,
}

/// Output of one executed work item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkResult {
    pub id: Uuid,
    pub work_item_id: Uuid,
    pub employee_id: Uuid,
    pub output: String,
    pub tokens_used: u64,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl WorkResult {
    /// True when the completion call failed and `output` holds the error text.
    pub fn is_error(&self) -> bool {
        matches!(self.metadata.get("error"), Some(Value::Bool(true)))
    }
}

/// A manager's verdict on one result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReview {
    pub id: Uuid,
    pub result_id: Uuid,
    pub reviewer_id: Uuid,
    pub rating: QualityRating,
    pub approved: bool,
    pub feedback: String,
    #[serde(default)]
    pub revisions: Vec<String>,
    pub reviewed_at: DateTime<Utc>,
}

/// Durable record of a reviewed unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deliverable {
    pub id: Uuid,
    pub title: String,
    pub kind: String,
    pub description: String,
    pub output: String,
    pub status: DeliverableStatus,
    pub work_item_id: Uuid,
    pub employee_id: Uuid,
    pub employee_name: String,
    pub skill: Skill,
    pub pipeline_id: Option<Uuid>,
    pub rating: Option<QualityRating>,
    pub review_notes: Option<String>,
    pub reviewer_id: Option<Uuid>,
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skill_names_round_trip() {
        for skill in Skill::ALL {
            assert_eq!(skill.to_string().parse::<Skill>().unwrap(), skill);
            let json = serde_json::to_string(&skill).unwrap();
            assert_eq!(json, format!("\"{}\"", skill.as_str()));
        }
        assert_eq!("Project_Management".parse::<Skill>().unwrap(), Skill::ProjectManagement);
        assert!("juggling".parse::<Skill>().is_err());
    }

    #[test]
    fn rating_parse_is_lenient() {
        assert_eq!("Needs Work".parse::<QualityRating>().unwrap(), QualityRating::NeedsWork);
        assert_eq!("needs-work".parse::<QualityRating>().unwrap(), QualityRating::NeedsWork);
        assert_eq!(" GOOD ".parse::<QualityRating>().unwrap(), QualityRating::Good);
        assert!("meh".parse::<QualityRating>().is_err());
    }

    #[test]
    fn activity_log_keeps_newest_entries() {
        let mut log = ActivityLog::default();
        for i in 0..(ACTIVITY_LOG_LIMIT + 25) {
            log.push(ActivityKind::WorkStarted, format!("entry {i}"), None);
        }
        let entries = log.to_vec();
        assert_eq!(entries.len(), ACTIVITY_LOG_LIMIT);
        assert_eq!(entries[0].description, "entry 25");
        assert_eq!(entries.last().unwrap().description, format!("entry {}", ACTIVITY_LOG_LIMIT + 24));
    }

    #[test]
    fn pipeline_link_prefers_revision_origin() {
        let pipeline = Uuid::new_v4();
        let origin = Uuid::new_v4();
        let item = WorkItem::new("t", "d")
            .with_input(INPUT_PIPELINE_ID, pipeline.to_string())
            .with_input(INPUT_FIELD, "business_plan");
        let link = item.pipeline_link().unwrap();
        assert_eq!(link.origin, item.id);
        assert_eq!(link.field, "business_plan");

        let revision = item.clone().with_input(INPUT_REVISION_OF, origin.to_string());
        assert_eq!(revision.pipeline_link().unwrap().origin, origin);

        assert!(WorkItem::new("plain", "").pipeline_link().is_none());
    }

    #[test]
    fn error_flag_in_metadata() {
        let mut result = WorkResult {
            id: Uuid::new_v4(),
            work_item_id: Uuid::new_v4(),
            employee_id: Uuid::new_v4(),
            output: "Error: timeout".into(),
            tokens_used: 0,
            duration_ms: 0,
            completed_at: Utc::now(),
            metadata: Map::new(),
        };
        assert!(!result.is_error());
        result.metadata.insert("error".into(), Value::Bool(true));
        assert!(result.is_error());
    }
}
