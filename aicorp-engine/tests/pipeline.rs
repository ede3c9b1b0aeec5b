//! Product pipeline end to end.
//!
//! Tests cover:
//! - A seeded pipeline running Ideation → WorkPacket → CsuiteReview →
//!   BoardVote → ExecutionPlan → Launched
//! - Repeated C-suite rejections ending the pipeline, and board rejection
//! - Pending counts tracking only accepted tasks, stale results ignored
//! - Failed idea generation and unseeded companies
//! - The continuous loop honoring the active pipeline limit and pause
//! - A persisted seed restarting continuous operation

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use aicorp_engine::board::FixedBoard;
use aicorp_engine::events::{NullSink, OrgEvent};
use aicorp_engine::memory::{Memory, Store};
use aicorp_engine::model::{PipelineLink, Skill};
use aicorp_engine::org::PacketCompletion;
use aicorp_engine::pipeline::{PacketField, PipelineManager, Stage};
use aicorp_engine::seed::{BusinessSector, CompanySeed};
use aicorp_engine::{Company, CompletionError, PipelineError};

use common::{settings, small_org, wait_until, Gate, GatedBoard, Recorder, Scripted};

const IDEA_PROMPT: &str = "Generate ONE innovative";
const PLAN_PROMPT: &str = "creating an execution plan";

fn seed() -> CompanySeed {
    CompanySeed::new("Acme", BusinessSector::Saas).with_target_market("Small agencies")
}

fn stage_of(pipelines: &PipelineManager, id: Uuid) -> Stage {
    pipelines.pipeline(id).map(|p| p.stage).unwrap_or(Stage::Rejected)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn saas_pipeline_reaches_launch() {
    let plan_gate = Gate::closed();
    let board_gate = Gate::closed();
    let completion = Arc::new(Scripted::new().gated(PLAN_PROMPT, &plan_gate));
    let board = Arc::new(GatedBoard::new(&board_gate, true));
    let sink = Arc::new(Recorder::default());
    let company = Company::start(settings(), completion, board.clone(), sink.clone(), None)
        .await
        .unwrap();
    assert!(!company.pipelines.is_continuous());
    company.org.set_seed(seed()).await;

    let created = company
        .pipelines
        .create_pipeline("Acme Product #1", "First product", "saas", "Small agencies");
    assert_eq!(created.stage, Stage::Ideation);
    assert_eq!(created.created_by, company.org.ceo().map(|ceo| ceo.id));
    let id = created.id;
    company.pipelines.start_pipeline(id);

    wait_until("board vote", || stage_of(&company.pipelines, id) == Stage::BoardVote).await;
    let p = company.pipelines.pipeline(id).unwrap();
    let idea = p.idea.as_ref().unwrap();
    assert!(idea.solution.starts_with("LedgerLoop"));
    assert_eq!(p.name, idea.solution.chars().take(50).collect::<String>());
    let packet = p.work_packet.as_ref().unwrap();
    for field in PacketField::ALL {
        assert!(!packet.field(field).is_empty(), "{} missing", field.as_str());
    }
    assert!(packet.assembled_at.is_some());
    assert_eq!(packet.contributors.len(), 5);
    assert_eq!(p.tracker.pending_tasks, 0);
    assert!(p.tracker.task_map.is_empty());
    assert!(p.csuite_review.as_ref().unwrap().approved);
    assert_eq!(p.revision_count, 0);

    wait_until("board consulted", || board.votes() == 1).await;
    board_gate.open(1);
    wait_until("execution plan", || stage_of(&company.pipelines, id) == Stage::ExecutionPlan).await;
    assert!(company.pipelines.pipeline(id).unwrap().board_decision.unwrap().approved);

    plan_gate.open(1);
    wait_until("launch", || stage_of(&company.pipelines, id) == Stage::Launched).await;
    let p = company.pipelines.pipeline(id).unwrap();
    let plan = p.execution_plan.as_ref().unwrap();
    assert_eq!(plan.timeline, "6 months");
    assert_eq!(plan.phases[0].name, "Foundation");
    assert_eq!(plan.kpis.len(), 2);
    assert_eq!(p.final_deliverables.len(), 5);
    for d in &p.final_deliverables {
        assert_eq!(company.org.deliverable(*d).unwrap().pipeline_id, Some(id));
    }

    let stages: Vec<_> = sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            OrgEvent::PipelineUpdate { pipeline_id, stage, .. } if pipeline_id == id => Some(stage),
            _ => None,
        })
        .collect();
    assert_eq!(
        stages,
        [
            Stage::WorkPacket,
            Stage::CsuiteReview,
            Stage::BoardVote,
            Stage::ExecutionPlan,
            Stage::Launched
        ]
    );
    assert_eq!(sink.count("pipeline_created"), 1);
    assert_eq!(sink.count("pipeline_complete"), 1);
    assert!(company.pipelines.active_pipelines().is_empty());

    let html = company.pipelines.render_html(id).unwrap();
    assert!(html.contains("<div class=\"company\">Acme</div>"));
    assert!(html.contains("<h2>Execution Plan</h2>"));

    company.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn three_csuite_rejections_reject_the_pipeline() {
    let completion = Arc::new(Scripted::new().on("DECISION:", |_| {
        Ok("DECISION: NEEDS_WORK\nFEEDBACK: Market is too small.\nCONCERNS: Tiny TAM\nSUGGESTIONS: Pick a bigger niche".into())
    }));
    let board = Arc::new(GatedBoard::new(&Gate::closed(), true));
    let sink = Arc::new(Recorder::default());
    let company = Company::start(settings(), completion.clone(), board.clone(), sink.clone(), None)
        .await
        .unwrap();
    company.org.set_seed(seed()).await;

    let id = company.pipelines.create_pipeline("Acme Product #1", "", "saas", "").id;
    company.pipelines.start_pipeline(id);
    wait_until("rejection", || stage_of(&company.pipelines, id) == Stage::Rejected).await;

    let p = company.pipelines.pipeline(id).unwrap();
    assert_eq!(p.revision_count, 3);
    let review = p.csuite_review.unwrap();
    assert!(!review.approved);
    assert_eq!(review.feedback, "Market is too small.");
    assert_eq!(review.concerns, ["Tiny TAM"]);
    assert_eq!(board.votes(), 0);
    assert!(p.execution_plan.is_none());

    // One original round plus two reissues, the reissues carrying feedback.
    assert_eq!(completion.prompts_containing("TASK: Market Research").len(), 3);
    assert_eq!(completion.prompts_containing("PREVIOUS EXECUTIVE FEEDBACK").len(), 10);
    assert_eq!(
        completion
            .prompts_containing("PREVIOUS EXECUTIVE FEEDBACK (revision 2)")
            .len(),
        5
    );
    assert_eq!(sink.count("pipeline_rejected"), 1);

    company.shutdown().await;
}

#[tokio::test]
async fn board_rejection_ends_the_pipeline() {
    let company = Company::start(
        settings(),
        Arc::new(Scripted::new()),
        Arc::new(FixedBoard::rejecting()),
        Arc::new(NullSink),
        None,
    )
    .await
    .unwrap();
    company.org.set_seed(seed()).await;

    let id = company.pipelines.create_pipeline("Acme Product #1", "", "saas", "").id;
    company.pipelines.start_pipeline(id);
    wait_until("rejection", || stage_of(&company.pipelines, id) == Stage::Rejected).await;

    let p = company.pipelines.pipeline(id).unwrap();
    assert!(!p.board_decision.unwrap().approved);
    assert!(p.csuite_review.unwrap().approved);
    assert!(p.execution_plan.is_none());
    assert_eq!(company.pipelines.stage_counts().get(&Stage::Rejected), Some(&1));

    company.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pending_tracks_only_accepted_tasks() {
    let gate = Gate::closed();
    let completion = Arc::new(Scripted::new().gated("TASK: ", &gate));
    let (org, rx) = small_org(
        settings(),
        completion,
        Arc::new(NullSink),
        &[Skill::Research, Skill::Writing],
        1,
    );
    org.set_seed(seed()).await;
    let pipelines = PipelineManager::new(Arc::clone(&org), Arc::new(FixedBoard::approving()), rx);
    let id = pipelines.create_pipeline("Partial", "", "saas", "").id;

    pipelines.generate_idea(id).await.unwrap();
    assert_eq!(stage_of(&pipelines, id), Stage::WorkPacket);
    // No Analysis or Marketing managers: three of five tasks are refused.
    assert_eq!(pipelines.assign_work_packet(id).unwrap(), 2);
    assert_eq!(pipelines.pipeline(id).unwrap().tracker.pending_tasks, 2);

    // A result for a task outside the round changes nothing.
    pipelines.on_work_complete(PacketCompletion {
        link: PipelineLink {
            pipeline_id: id,
            field: PacketField::MarketResearch.as_str().to_string(),
            origin: Uuid::new_v4(),
        },
        work_id: Uuid::new_v4(),
        employee_id: Uuid::new_v4(),
        output: "stale".into(),
    });
    let p = pipelines.pipeline(id).unwrap();
    assert_eq!(p.tracker.pending_tasks, 2);
    assert!(p.work_packet.unwrap().market_research.is_empty());

    gate.open_wide();
    wait_until("launch", || stage_of(&pipelines, id) == Stage::Launched).await;
    let p = pipelines.pipeline(id).unwrap();
    assert_eq!(p.tracker.pending_tasks, 0);
    let packet = p.work_packet.unwrap();
    assert!(!packet.market_research.is_empty());
    assert!(!packet.business_plan.is_empty());
    assert!(packet.competitive_analysis.is_empty());

    org.stop().await;
}

#[tokio::test]
async fn packet_with_no_accepted_tasks_stalls() {
    let (org, rx) = small_org(settings(), Arc::new(Scripted::new()), Arc::new(NullSink), &[], 0);
    org.set_seed(seed()).await;
    let pipelines = PipelineManager::new(Arc::clone(&org), Arc::new(FixedBoard::approving()), rx);
    let id = pipelines.create_pipeline("Nobody home", "", "saas", "").id;
    pipelines.generate_idea(id).await.unwrap();

    assert_eq!(pipelines.assign_work_packet(id).unwrap(), 0);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(stage_of(&pipelines, id), Stage::WorkPacket);
    assert_eq!(pipelines.active_count(), 1);
}

#[tokio::test]
async fn failed_idea_keeps_pipeline_in_ideation() {
    let completion = Arc::new(
        Scripted::new().on(IDEA_PROMPT, |_| Err(CompletionError::Transport("dns failure".into()))),
    );
    let (org, rx) = small_org(settings(), completion, Arc::new(NullSink), &[], 0);
    org.set_seed(seed()).await;
    let pipelines = PipelineManager::new(Arc::clone(&org), Arc::new(FixedBoard::approving()), rx);
    let id = pipelines.create_pipeline("Doomed", "", "saas", "").id;

    let err = pipelines.generate_idea(id).await.unwrap_err();

    assert!(matches!(err, PipelineError::Completion(CompletionError::Transport(_))));
    let p = pipelines.pipeline(id).unwrap();
    assert_eq!(p.stage, Stage::Ideation);
    assert!(p.idea.is_none());
    assert!(matches!(
        pipelines.assign_work_packet(id),
        Err(PipelineError::IllegalTransition { from: Stage::Ideation, .. })
    ));
}

#[tokio::test]
async fn idea_is_not_regenerated_after_ideation() {
    let drafts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&drafts);
    let completion = Arc::new(Scripted::new().on(IDEA_PROMPT, move |_| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "PROBLEM: Agencies lose invoices {n}\nSOLUTION: Solution{n} does things\n\
             VALUE_PROP: Saves time\nTARGET_CUSTOMER: Agency owners\nREVENUE_MODEL: Monthly plan"
        ))
    }));
    let (org, rx) = small_org(settings(), completion.clone(), Arc::new(NullSink), &[], 0);
    org.set_seed(seed()).await;
    let pipelines = PipelineManager::new(Arc::clone(&org), Arc::new(FixedBoard::approving()), rx);
    let id = pipelines.create_pipeline("Once", "", "saas", "").id;

    pipelines.generate_idea(id).await.unwrap();
    let before = pipelines.pipeline(id).unwrap();
    assert_eq!(before.name, "Solution0 does things");

    assert!(matches!(
        pipelines.generate_idea(id).await,
        Err(PipelineError::IllegalTransition { from: Stage::WorkPacket, to: Stage::WorkPacket })
    ));
    let after = pipelines.pipeline(id).unwrap();
    assert_eq!(after.stage, Stage::WorkPacket);
    assert_eq!(after.name, before.name);
    assert_eq!(after.description, before.description);
    assert_eq!(after.idea.unwrap().solution, before.idea.unwrap().solution);
    assert_eq!(drafts.load(Ordering::SeqCst), 1, "no second draft requested");
    assert_eq!(completion.prompts_containing(IDEA_PROMPT).len(), 1);
}

#[tokio::test]
async fn unseeded_company_cannot_generate_ideas() {
    let company = Company::start(
        settings(),
        Arc::new(Scripted::new()),
        Arc::new(FixedBoard::approving()),
        Arc::new(NullSink),
        None,
    )
    .await
    .unwrap();
    assert!(!company.pipelines.is_continuous());
    let id = company.pipelines.create_pipeline("Early", "", "saas", "").id;

    assert!(matches!(
        company.pipelines.generate_idea(id).await,
        Err(PipelineError::NotSeeded)
    ));
    company.org.set_seed(seed()).await;
    let missing = Uuid::new_v4();
    assert!(matches!(
        company.pipelines.generate_idea(missing).await,
        Err(PipelineError::NotFound(m)) if m == missing
    ));
    company.shutdown().await;
}

#[tokio::test]
async fn continuous_loop_respects_active_limit() {
    let idea_gate = Gate::closed();
    let completion = Arc::new(Scripted::new().gated(IDEA_PROMPT, &idea_gate));
    let mut s = settings();
    s.max_active_pipelines = 2;
    let company = Company::start(s, completion, Arc::new(FixedBoard::approving()), Arc::new(NullSink), None)
        .await
        .unwrap();

    company.set_seed(seed()).await;
    assert!(company.pipelines.is_continuous());
    assert!(!company.pipelines.start_continuous(), "already running");

    wait_until("two pipelines", || company.pipelines.pipelines().len() == 2).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let all = company.pipelines.pipelines();
    assert_eq!(all.len(), 2);
    assert_eq!(company.pipelines.active_count(), 2);
    let mut names: Vec<_> = all.iter().map(|p| p.name.as_str()).collect();
    names.sort();
    assert_eq!(names, ["Acme Product #1", "Acme Product #2"]);
    assert!(all.iter().all(|p| p.category == "saas" && p.target_market == "Small agencies"));

    company.pipelines.stop_continuous();
    assert!(!company.pipelines.is_continuous());
    company.shutdown().await;
}

#[tokio::test]
async fn paused_company_starts_no_pipelines() {
    let idea_gate = Gate::closed();
    let completion = Arc::new(Scripted::new().gated(IDEA_PROMPT, &idea_gate));
    let company = Company::start(settings(), completion, Arc::new(FixedBoard::approving()), Arc::new(NullSink), None)
        .await
        .unwrap();

    company.org.pause();
    company.set_seed(seed()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(company.pipelines.pipelines().is_empty());

    company.org.resume();
    wait_until("first pipeline", || !company.pipelines.pipelines().is_empty()).await;
    company.shutdown().await;
}

#[tokio::test]
async fn persisted_seed_resumes_continuous_operation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("aicorp.db");
    let idea_gate = Gate::closed();

    let first = Company::start(
        settings(),
        Arc::new(Scripted::new().gated(IDEA_PROMPT, &idea_gate)),
        Arc::new(FixedBoard::approving()),
        Arc::new(NullSink),
        Some(Arc::new(Memory::open(&path).unwrap()) as Arc<dyn Store>),
    )
    .await
    .unwrap();
    assert!(!first.pipelines.is_continuous());
    let stored = first.set_seed(seed()).await;
    first.shutdown().await;
    drop(first);

    let second = Company::start(
        settings(),
        Arc::new(Scripted::new().gated(IDEA_PROMPT, &idea_gate)),
        Arc::new(FixedBoard::approving()),
        Arc::new(NullSink),
        Some(Arc::new(Memory::open(&path).unwrap()) as Arc<dyn Store>),
    )
    .await
    .unwrap();
    assert_eq!(second.org.seed().map(|s| s.id), Some(stored.id));
    assert!(second.pipelines.is_continuous());
    second.shutdown().await;
}
