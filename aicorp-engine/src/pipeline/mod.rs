//! Product pipeline manager.
//!
//! Drives each [`ProductPipeline`] from idea to launch. Stages that call
//! out (idea, C-suite review, board vote, execution plan) run as short-lived
//! tasks on the organization's tracker; the work-packet stage fans tasks
//! out to employees and advances when the last approved result comes back
//! through the organization's completion channel.
//!
//! A stage whose completion call fails leaves the pipeline where it is.

mod parse;
mod report;
mod stage;

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::board::BoardVoter;
use crate::error::PipelineError;
use crate::events::OrgEvent;
use crate::format::truncate;
use crate::llm::CompletionRequest;
use crate::model::{Skill, WorkItem, WorkKind, INPUT_FIELD, INPUT_PIPELINE_ID};
use crate::org::{CompanyStatus, Organization, PacketCompletion};

pub use parse::{parse_csuite_review, parse_execution_plan, parse_idea};
pub use report::render_html;
pub use stage::{
    ExecutionPhase, ExecutionPlanContent, IdeaContent, PacketField, PacketTracker, ProductPipeline,
    ReviewContent, Stage, WorkPacketContent,
};

pub struct PipelineManager {
    org: Arc<Organization>,
    board: Arc<dyn BoardVoter>,
    pipelines: RwLock<HashMap<Uuid, ProductPipeline>>,
    started: AtomicU64,
    continuous: Mutex<Option<CancellationToken>>,
}

impl PipelineManager {
    /// Create the manager and start listening for work-packet completions.
    pub fn new(
        org: Arc<Organization>,
        board: Arc<dyn BoardVoter>,
        completions: mpsc::Receiver<PacketCompletion>,
    ) -> Arc<Self> {
        let manager = Arc::new(Self {
            org,
            board,
            pipelines: RwLock::new(HashMap::new()),
            started: AtomicU64::new(0),
            continuous: Mutex::new(None),
        });
        let listener = Arc::clone(&manager);
        manager.org.spawn(listener.listen(completions));
        manager
    }

    async fn listen(self: Arc<Self>, mut completions: mpsc::Receiver<PacketCompletion>) {
        let cancel = self.org.cancellation().clone();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                c = completions.recv() => match c {
                    Some(c) => self.on_work_complete(c),
                    None => break,
                },
            }
        }
        tracing::debug!("Pipeline completion listener stopped");
    }

    pub fn create_pipeline(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        target_market: impl Into<String>,
    ) -> ProductPipeline {
        let mut pipeline = ProductPipeline::new(name, description, category);
        pipeline.target_market = target_market.into();
        pipeline.created_by = self.org.ceo().map(|ceo| ceo.id);
        self.pipelines.write().insert(pipeline.id, pipeline.clone());
        tracing::info!(pipeline_id = %pipeline.id, name = %pipeline.name, "Pipeline created");
        self.org.events().publish(OrgEvent::PipelineCreated {
            pipeline_id: pipeline.id,
            name: pipeline.name.clone(),
        });
        pipeline
    }

    /// Generate the idea and issue the work packet in the background.
    pub fn start_pipeline(self: &Arc<Self>, id: Uuid) {
        let manager = Arc::clone(self);
        self.org.spawn(async move {
            if let Err(e) = manager.generate_idea(id).await {
                tracing::warn!(pipeline_id = %id, error = %e, "Idea generation failed");
                return;
            }
            if let Err(e) = manager.assign_work_packet(id) {
                tracing::warn!(pipeline_id = %id, error = %e, "Work packet assignment failed");
            }
        });
    }

    pub fn pipeline(&self, id: Uuid) -> Option<ProductPipeline> {
        self.pipelines.read().get(&id).cloned()
    }

    /// Newest first.
    pub fn pipelines(&self) -> Vec<ProductPipeline> {
        let mut all: Vec<_> = self.pipelines.read().values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    pub fn active_pipelines(&self) -> Vec<ProductPipeline> {
        let mut active: Vec<_> = self
            .pipelines
            .read()
            .values()
            .filter(|p| p.is_active())
            .cloned()
            .collect();
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        active
    }

    pub fn active_count(&self) -> usize {
        self.pipelines.read().values().filter(|p| p.is_active()).count()
    }

    pub fn stage_counts(&self) -> BTreeMap<Stage, usize> {
        let mut counts = BTreeMap::new();
        for p in self.pipelines.read().values() {
            *counts.entry(p.stage).or_insert(0) += 1;
        }
        counts
    }

    pub fn render_html(&self, id: Uuid) -> Result<String, PipelineError> {
        let pipeline = self.pipeline(id).ok_or(PipelineError::NotFound(id))?;
        let company = self
            .org
            .seed()
            .map(|s| s.company_name)
            .unwrap_or_else(|| "Company".to_string());
        Ok(render_html(&pipeline, &company))
    }

    fn publish_stage(&self, pipeline: &ProductPipeline) {
        tracing::info!(pipeline_id = %pipeline.id, stage = %pipeline.stage, "Pipeline stage changed");
        self.org.events().publish(OrgEvent::PipelineUpdate {
            pipeline_id: pipeline.id,
            name: pipeline.name.clone(),
            stage: pipeline.stage,
        });
    }

    fn existing_ideas(&self, except: Uuid) -> Vec<String> {
        self.pipelines
            .read()
            .values()
            .filter(|p| p.id != except)
            .filter_map(|p| p.idea.as_ref().map(|idea| format!("- {}: {}", p.name, idea.solution)))
            .collect()
    }

    /// Ideation: draft an idea with the CEO and move to `WorkPacket`.
    pub async fn generate_idea(&self, id: Uuid) -> Result<(), PipelineError> {
        let seed = self.org.seed().ok_or(PipelineError::NotSeeded)?;
        let stage = self.pipeline(id).ok_or(PipelineError::NotFound(id))?.stage;
        if stage != Stage::Ideation {
            return Err(PipelineError::IllegalTransition { from: stage, to: Stage::WorkPacket });
        }

        let existing = self.existing_ideas(id);
        let existing_context = if existing.is_empty() {
            String::new()
        } else {
            format!(
                "\nIMPORTANT: We already have these products in development:\n{}\n\n\
                 Generate a DIFFERENT product idea that complements but does NOT overlap with existing products.",
                existing.join("\n")
            )
        };
        let prompt = format!(
            "You are the CEO of {}, a company in the {} sector targeting {}.\n\n\
             Company Mission: {}\nCompany Vision: {}\n{}\n\n\
             Generate ONE innovative, bootstrappable product idea. Requirements:\n\
             - Solves a real urgent problem people will pay to fix\n\
             - Can be built by a small team without massive capital\n\
             - NO AI/ML/LLM features, NO blockchain/crypto/quantum\n\
             - Focus on B2B SaaS or niche vertical solutions\n\n\
             IMPORTANT: Output ONLY the structured response below. Do NOT include any thinking, reasoning, or explanation. Start directly with PROBLEM:\n\n\
             PROBLEM: [Who has this problem and why it matters - 1-2 sentences]\n\
             SOLUTION: [Your product name and what it does - 1-2 sentences]\n\
             VALUE_PROP: [Why customers will pay - 1 sentence]\n\
             TARGET_CUSTOMER: [Buyer persona: role, company size, industry - 1 sentence]\n\
             REVENUE_MODEL: [Pricing strategy - 1 sentence]",
            seed.company_name,
            seed.sector_name(),
            seed.target_market,
            seed.mission,
            seed.vision,
            existing_context
        );
        let request = CompletionRequest::new("", prompt).max_tokens(1000).temperature(0.85);
        let response = self.org.complete(request).await?;

        let mut idea = parse_idea(&response.text);
        if idea.problem.is_empty() || idea.solution.is_empty() {
            tracing::warn!(
                pipeline_id = %id,
                has_problem = !idea.problem.is_empty(),
                has_solution = !idea.solution.is_empty(),
                "Idea is missing critical fields"
            );
        }

        let mut pipelines = self.pipelines.write();
        let pipeline = pipelines.get_mut(&id).ok_or(PipelineError::NotFound(id))?;
        if pipeline.stage != Stage::Ideation {
            return Err(PipelineError::IllegalTransition {
                from: pipeline.stage,
                to: Stage::WorkPacket,
            });
        }
        idea.generated_by = pipeline.created_by;
        pipeline.name = if idea.solution.is_empty() {
            format!("Product Idea {}", &id.to_string()[..8])
        } else {
            idea.solution.chars().take(50).collect()
        };
        pipeline.description = if idea.problem.is_empty() {
            "Product concept in development".to_string()
        } else {
            idea.problem.clone()
        };
        pipeline.idea = Some(idea);
        pipeline.advance(Stage::WorkPacket)?;
        self.publish_stage(pipeline);
        Ok(())
    }

    /// Issue the five work-packet tasks. Returns how many were accepted;
    /// only accepted tasks are waited on. Runs under the pipeline lock so a
    /// fast completion cannot race the bookkeeping.
    pub fn assign_work_packet(&self, id: Uuid) -> Result<usize, PipelineError> {
        let context = self.org.seed_context();
        let mut pipelines = self.pipelines.write();
        let pipeline = pipelines.get_mut(&id).ok_or(PipelineError::NotFound(id))?;
        if pipeline.stage != Stage::WorkPacket {
            return Err(PipelineError::IllegalTransition {
                from: pipeline.stage,
                to: Stage::WorkPacket,
            });
        }
        let Some(idea) = pipeline.idea.clone() else {
            return Err(PipelineError::IllegalTransition {
                from: Stage::Ideation,
                to: Stage::WorkPacket,
            });
        };
        let feedback = pipeline
            .csuite_review
            .as_ref()
            .filter(|r| !r.approved)
            .map(|r| r.feedback.clone());

        let mut tracker = PacketTracker::default();
        for (skill, field, title, brief) in packet_tasks(&pipeline.name, &idea) {
            let mut description = format!("{context}\n\n{brief}");
            if let Some(feedback) = &feedback {
                description.push_str(&format!(
                    "\n\nPREVIOUS EXECUTIVE FEEDBACK (revision {}):\n{feedback}",
                    pipeline.revision_count
                ));
            }
            let work = WorkItem::new(title, description)
                .with_kind(WorkKind::PipelineTask)
                .with_input(INPUT_PIPELINE_ID, id.to_string())
                .with_input(INPUT_FIELD, field.as_str());
            let work_id = work.id;
            match self.org.assign_work(skill, work) {
                Ok(employee_id) => {
                    tracing::debug!(pipeline_id = %id, field = field.as_str(), %employee_id, "Work packet task assigned");
                    tracker.task_map.insert(work_id, field);
                }
                Err(e) => {
                    tracing::warn!(pipeline_id = %id, field = field.as_str(), error = %e, "Work packet task not assigned");
                }
            }
        }
        tracker.pending_tasks = tracker.task_map.len();
        let assigned = tracker.pending_tasks;
        pipeline.tracker = tracker;
        pipeline.work_packet.get_or_insert_with(WorkPacketContent::default);
        pipeline.updated_at = Utc::now();

        if assigned == 0 {
            tracing::warn!(pipeline_id = %id, "No work packet task could be assigned, pipeline stalled");
        } else {
            tracing::info!(pipeline_id = %id, assigned, "Work packet issued");
        }
        Ok(assigned)
    }

    /// Fill a work-packet section. The last outstanding task of the round
    /// moves the pipeline to `CsuiteReview`.
    pub fn on_work_complete(self: &Arc<Self>, completion: PacketCompletion) {
        let PacketCompletion {
            link,
            employee_id,
            output,
            ..
        } = completion;
        let id = link.pipeline_id;
        {
            let mut pipelines = self.pipelines.write();
            let Some(pipeline) = pipelines.get_mut(&id) else {
                return;
            };
            if pipeline.stage != Stage::WorkPacket {
                tracing::debug!(pipeline_id = %id, stage = %pipeline.stage, "Late work packet result ignored");
                return;
            }
            let Some(&field) = pipeline.tracker.task_map.get(&link.origin) else {
                tracing::debug!(pipeline_id = %id, field = %link.field, "Result for a task outside this round ignored");
                return;
            };
            let now = Utc::now();
            let packet = pipeline.work_packet.get_or_insert_with(WorkPacketContent::default);
            packet.set(field, output);
            if !packet.contributors.contains(&employee_id) {
                packet.contributors.push(employee_id);
            }
            pipeline.updated_at = now;
            if !pipeline.tracker.complete(link.origin) {
                return;
            }
            packet_assembled(pipeline);
            if let Err(e) = pipeline.advance(Stage::CsuiteReview) {
                tracing::warn!(pipeline_id = %id, error = %e, "Work packet complete but cannot advance");
                return;
            }
            self.publish_stage(pipeline);
        }

        let manager = Arc::clone(self);
        self.org.spawn(async move { manager.run_csuite_review(id).await });
    }

    /// CsuiteReview: approve to the board, or send the packet back. The
    /// configured number of rejections ends the pipeline.
    pub async fn run_csuite_review(self: &Arc<Self>, id: Uuid) {
        let prompt = {
            let pipelines = self.pipelines.read();
            let Some(p) = pipelines.get(&id) else { return };
            if p.stage != Stage::CsuiteReview {
                return;
            }
            let (Some(idea), Some(packet)) = (&p.idea, &p.work_packet) else {
                return;
            };
            csuite_prompt(&p.name, idea, packet)
        };
        let request = CompletionRequest::new("", prompt).max_tokens(600).temperature(0.3);
        let text = match self.org.complete(request).await {
            Ok(done) => done.text,
            Err(e) => {
                tracing::warn!(pipeline_id = %id, error = %e, "C-suite review failed, pipeline held");
                return;
            }
        };
        let review = parse_csuite_review(&text);
        let max_revisions = self.org.settings().max_csuite_revisions;

        let next = {
            let mut pipelines = self.pipelines.write();
            let Some(pipeline) = pipelines.get_mut(&id) else { return };
            let approved = review.approved;
            pipeline.csuite_review = Some(review);
            let to = if approved {
                Stage::BoardVote
            } else {
                pipeline.revision_count += 1;
                if pipeline.revision_count >= max_revisions {
                    Stage::Rejected
                } else {
                    Stage::WorkPacket
                }
            };
            if let Err(e) = pipeline.advance(to) {
                tracing::warn!(pipeline_id = %id, error = %e, "C-suite outcome not applied");
                return;
            }
            self.publish_stage(pipeline);
            if to == Stage::Rejected {
                tracing::info!(pipeline_id = %id, revisions = pipeline.revision_count, "Pipeline rejected after revisions");
                self.org.events().publish(OrgEvent::PipelineRejected {
                    pipeline_id: id,
                    name: pipeline.name.clone(),
                    revision_count: pipeline.revision_count,
                });
            }
            to
        };

        match next {
            Stage::BoardVote => {
                let manager = Arc::clone(self);
                self.org.spawn(async move { manager.run_board_vote(id).await });
            }
            Stage::WorkPacket => {
                if let Err(e) = self.assign_work_packet(id) {
                    tracing::warn!(pipeline_id = %id, error = %e, "Work packet reissue failed");
                }
            }
            _ => {}
        }
    }

    /// BoardVote: ask the board and route on its decision.
    pub async fn run_board_vote(self: &Arc<Self>, id: Uuid) {
        let Some(snapshot) = self.pipeline(id).filter(|p| p.stage == Stage::BoardVote) else {
            return;
        };
        let decision = self.board.vote(&snapshot).await;
        tracing::info!(
            pipeline_id = %id,
            approved = decision.approved,
            votes_for = decision.votes_for,
            votes_against = decision.votes_against,
            "Board voted"
        );

        let approved = decision.approved;
        {
            let mut pipelines = self.pipelines.write();
            let Some(pipeline) = pipelines.get_mut(&id) else { return };
            pipeline.board_decision = Some(decision);
            let to = if approved { Stage::ExecutionPlan } else { Stage::Rejected };
            if let Err(e) = pipeline.advance(to) {
                tracing::warn!(pipeline_id = %id, error = %e, "Board outcome not applied");
                return;
            }
            self.publish_stage(pipeline);
            if !approved {
                self.org.events().publish(OrgEvent::PipelineRejected {
                    pipeline_id: id,
                    name: pipeline.name.clone(),
                    revision_count: pipeline.revision_count,
                });
            }
        }

        if approved {
            let manager = Arc::clone(self);
            self.org.spawn(async move { manager.generate_execution_plan(id).await });
        }
    }

    /// ExecutionPlan: draft the plan and launch.
    pub async fn generate_execution_plan(&self, id: Uuid) {
        let prompt = {
            let pipelines = self.pipelines.read();
            let Some(p) = pipelines.get(&id) else { return };
            if p.stage != Stage::ExecutionPlan {
                return;
            }
            let Some(idea) = &p.idea else { return };
            plan_prompt(&p.name, idea)
        };
        let request = CompletionRequest::new("", prompt).max_tokens(1500).temperature(0.4);
        let text = match self.org.complete(request).await {
            Ok(done) => done.text,
            Err(e) => {
                tracing::warn!(pipeline_id = %id, error = %e, "Execution plan failed, pipeline held");
                return;
            }
        };
        let plan = parse_execution_plan(&text);
        let deliverables: Vec<Uuid> = self
            .org
            .deliverables()
            .iter()
            .filter(|d| d.pipeline_id == Some(id))
            .map(|d| d.id)
            .collect();

        let mut pipelines = self.pipelines.write();
        let Some(pipeline) = pipelines.get_mut(&id) else { return };
        pipeline.execution_plan = Some(plan);
        pipeline.final_deliverables = deliverables;
        if let Err(e) = pipeline.advance(Stage::Launched) {
            tracing::warn!(pipeline_id = %id, error = %e, "Launch not applied");
            return;
        }
        self.publish_stage(pipeline);
        tracing::info!(pipeline_id = %id, name = %pipeline.name, "Product launched");
        self.org.events().publish(OrgEvent::PipelineComplete {
            pipeline_id: id,
            name: pipeline.name.clone(),
        });
    }

    /// Start the loop that keeps new pipelines coming. Returns false if it
    /// is already running.
    pub fn start_continuous(self: &Arc<Self>) -> bool {
        let mut slot = self.continuous.lock();
        if slot.as_ref().is_some_and(|t| !t.is_cancelled()) {
            return false;
        }
        let token = self.org.cancellation().child_token();
        *slot = Some(token.clone());
        let manager = Arc::clone(self);
        self.org.spawn(manager.run_continuous(token));
        true
    }

    pub fn stop_continuous(&self) {
        if let Some(token) = self.continuous.lock().take() {
            token.cancel();
            tracing::info!("Stopping continuous pipeline operation");
        }
    }

    pub fn is_continuous(&self) -> bool {
        self.continuous
            .lock()
            .as_ref()
            .is_some_and(|t| !t.is_cancelled())
    }

    async fn run_continuous(self: Arc<Self>, token: CancellationToken) {
        let settings = self.org.settings().clone();
        tracing::info!("Continuous pipeline operation started");
        loop {
            let delay = if self.org.status() != CompanyStatus::Running {
                settings.idle_poll()
            } else if self.active_count() >= settings.max_active_pipelines {
                settings.capacity_poll()
            } else if let Some(seed) = self.org.seed() {
                let n = self.started.fetch_add(1, Ordering::Relaxed) + 1;
                let pipeline = self.create_pipeline(
                    format!("{} Product #{n}", seed.company_name),
                    format!("Product idea #{n} for {} sector", seed.sector_name()),
                    seed.sector_name(),
                    seed.target_market.clone(),
                );
                self.start_pipeline(pipeline.id);
                settings.pipeline_interval()
            } else {
                settings.idle_poll()
            };
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        tracing::info!("Continuous pipeline operation stopped");
    }
}

fn packet_assembled(pipeline: &mut ProductPipeline) {
    if let Some(packet) = pipeline.work_packet.as_mut() {
        packet.assembled_at = Some(Utc::now());
    }
}

fn packet_tasks(name: &str, idea: &IdeaContent) -> [(Skill, PacketField, String, String); 5] {
    [
        (
            Skill::Research,
            PacketField::MarketResearch,
            format!("Market Research: {name}"),
            format!(
                "Research the market for: {name}\n\nProblem being solved: {}\nTarget customer: {}\n\n\
                 Provide comprehensive market research including:\n- Market size and growth rate\n- Key market trends\n- Customer pain points\n- Willingness to pay",
                idea.problem, idea.target_customer
            ),
        ),
        (
            Skill::Analysis,
            PacketField::CompetitiveAnalysis,
            format!("Competitive Analysis: {name}"),
            format!(
                "Analyze competitors for: {name}\n\nOur solution: {}\nOur value proposition: {}\n\n\
                 Identify:\n- Direct competitors\n- Indirect competitors\n- Their strengths and weaknesses\n- Our competitive advantage",
                idea.solution, idea.value_prop
            ),
        ),
        (
            Skill::Writing,
            PacketField::BusinessPlan,
            format!("Business Plan: {name}"),
            format!(
                "Write a business plan for: {name}\n\nProblem: {}\nSolution: {}\nRevenue Model: {}\n\n\
                 Include executive summary, value proposition, go-to-market strategy, and operational plan.",
                idea.problem, idea.solution, idea.revenue_model
            ),
        ),
        (
            Skill::Analysis,
            PacketField::FinancialProjections,
            format!("Financial Projections: {name}"),
            format!(
                "Create financial projections for: {name}\n\nRevenue Model: {}\nTarget Customer: {}\n\n\
                 Provide 3-year projections including revenue, costs, and profitability.",
                idea.revenue_model, idea.target_customer
            ),
        ),
        (
            Skill::Marketing,
            PacketField::MarketingStrategy,
            format!("Marketing Strategy: {name}"),
            format!(
                "Develop marketing strategy for: {name}\n\nValue Proposition: {}\nTarget Customer: {}\n\n\
                 Include positioning, messaging, channels, and launch plan.",
                idea.value_prop, idea.target_customer
            ),
        ),
    ]
}

fn csuite_prompt(name: &str, idea: &IdeaContent, packet: &WorkPacketContent) -> String {
    format!(
        "You are the executive team reviewing a product proposal.\n\n\
         PRODUCT: {name}\n\n\
         ORIGINAL IDEA:\nProblem: {}\nSolution: {}\nValue Proposition: {}\n\n\
         WORK PACKET SUMMARY:\n\
         Market Research: {}\n\n\
         Competitive Analysis: {}\n\n\
         Business Plan: {}\n\n\
         Financial Projections: {}\n\n\
         Marketing Strategy: {}\n\n\
         Based on this work packet, decide if this product should go to the Board of Directors for funding approval.\n\n\
         Respond in this EXACT format:\n\
         DECISION: [APPROVED or NEEDS_WORK]\n\
         FEEDBACK: [Your overall assessment]\n\
         CONCERNS: [Comma-separated list of concerns, or \"None\"]\n\
         SUGGESTIONS: [Comma-separated list of suggestions for improvement]",
        idea.problem,
        idea.solution,
        idea.value_prop,
        truncate(packet.field(PacketField::MarketResearch), 500),
        truncate(packet.field(PacketField::CompetitiveAnalysis), 500),
        truncate(packet.field(PacketField::BusinessPlan), 500),
        truncate(packet.field(PacketField::FinancialProjections), 500),
        truncate(packet.field(PacketField::MarketingStrategy), 500),
    )
}

fn plan_prompt(name: &str, idea: &IdeaContent) -> String {
    format!(
        r#"You are the CEO creating an execution plan for an approved product.

PRODUCT: {name}
Problem: {}
Solution: {}
Revenue Model: {}

Create a detailed execution plan.

Respond in this EXACT JSON format:
{{
  "timeline": "6 months",
  "budget": "$500,000",
  "team_structure": "Description of team needed",
  "kpis": ["KPI 1", "KPI 2", "KPI 3"],
  "milestones": ["Month 1: ...", "Month 3: ...", "Month 6: ..."],
  "risk_mitigation": "Key risk mitigation strategies",
  "phases": [
    {{
      "name": "Phase 1: Foundation",
      "description": "Initial setup and development",
      "duration": "2 months",
      "tasks": ["Task 1", "Task 2"],
      "deliverables": ["Deliverable 1", "Deliverable 2"]
    }}
  ]
}}"#,
        idea.problem, idea.solution, idea.revenue_model
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_tasks_cover_every_field_once() {
        let idea = IdeaContent {
            problem: "P".into(),
            solution: "S".into(),
            ..Default::default()
        };
        let tasks = packet_tasks("Widget", &idea);
        let mut fields: Vec<_> = tasks.iter().map(|t| t.1).collect();
        fields.dedup();
        assert_eq!(fields, PacketField::ALL.to_vec());
        assert_eq!(tasks.iter().filter(|t| t.0 == Skill::Analysis).count(), 2);
        assert!(tasks[2].2.starts_with("Business Plan: Widget"));
    }

    #[test]
    fn csuite_prompt_truncates_sections() {
        let idea = IdeaContent::default();
        let packet = WorkPacketContent {
            market_research: "é".repeat(800),
            ..Default::default()
        };
        let prompt = csuite_prompt("Widget", &idea, &packet);
        assert!(prompt.contains(&format!("Market Research: {}...", "é".repeat(500))));
        assert!(!prompt.contains(&"é".repeat(501)));
        assert!(prompt.contains("DECISION: [APPROVED or NEEDS_WORK]"));
    }

    #[test]
    fn plan_prompt_is_recognizable_json_template() {
        let prompt = plan_prompt("Widget", &IdeaContent::default());
        assert!(prompt.contains("\"phases\": ["));
        assert!(prompt.contains("{\n  \"timeline\""));
    }
}
