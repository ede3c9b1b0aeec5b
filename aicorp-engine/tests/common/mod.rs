//! Shared fixtures: a scriptable completion, gates, a recording sink and a
//! polling helper.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use aicorp_engine::board::{BoardDecision, BoardVoter};
use aicorp_engine::events::{EventSink, OrgEvent};
use aicorp_engine::llm::{Completed, Completion, CompletionRequest, EchoCompletion};
use aicorp_engine::org::Organization;
use aicorp_engine::pipeline::ProductPipeline;
use aicorp_engine::{CompletionError, Settings};

type Matcher = Box<dyn Fn(&str) -> bool + Send + Sync>;
type Responder = Box<dyn Fn(&str) -> Result<String, CompletionError> + Send + Sync>;

/// Closed until opened; each pass consumes one permit.
#[derive(Clone)]
pub struct Gate(Arc<Semaphore>);

impl Gate {
    pub fn closed() -> Self {
        Self(Arc::new(Semaphore::new(0)))
    }

    pub fn open(&self, n: usize) {
        self.0.add_permits(n);
    }

    /// Let everything through from now on.
    pub fn open_wide(&self) {
        self.0.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    pub async fn pass(&self) {
        if let Ok(permit) = self.0.acquire().await {
            permit.forget();
        }
    }
}

/// Completion that answers matching prompts from rules and everything else
/// like the echo stand-in. Records prompts and peak concurrency.
pub struct Scripted {
    rules: Vec<(Matcher, Responder)>,
    gates: Vec<(Matcher, Gate)>,
    echo: EchoCompletion,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicU64,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl Scripted {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            gates: Vec::new(),
            echo: EchoCompletion::new(),
            delay: None,
            prompts: Mutex::new(Vec::new()),
            calls: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Answer prompts containing `needle` with `respond`.
    pub fn on<F>(mut self, needle: &'static str, respond: F) -> Self
    where
        F: Fn(&str) -> Result<String, CompletionError> + Send + Sync + 'static,
    {
        self.rules
            .push((Box::new(move |p: &str| p.contains(needle)), Box::new(respond)));
        self
    }

    /// Hold prompts containing `needle` until `gate` lets them through.
    pub fn gated(mut self, needle: &'static str, gate: &Gate) -> Self {
        self.gates
            .push((Box::new(move |p: &str| p.contains(needle)), gate.clone()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn prompts_containing(&self, needle: &str) -> Vec<String> {
        self.prompts
            .lock()
            .iter()
            .filter(|p| p.contains(needle))
            .cloned()
            .collect()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Completion for Scripted {
    async fn complete(&self, request: CompletionRequest) -> Result<Completed, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(request.prompt.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        for (matches, gate) in &self.gates {
            if matches(&request.prompt) {
                gate.pass().await;
            }
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        for (matches, respond) in &self.rules {
            if matches(&request.prompt) {
                return respond(&request.prompt).map(Completed::text);
            }
        }
        self.echo.complete(request).await
    }
}

/// Records every published event.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<OrgEvent>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<OrgEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, event_type: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }
}

impl EventSink for Recorder {
    fn publish(&self, event: OrgEvent) {
        self.events.lock().push(event);
    }
}

/// Board that waits for its gate, then returns a fixed decision.
pub struct GatedBoard {
    gate: Gate,
    approve: bool,
    votes: AtomicUsize,
}

impl GatedBoard {
    pub fn new(gate: &Gate, approve: bool) -> Self {
        Self {
            gate: gate.clone(),
            approve,
            votes: AtomicUsize::new(0),
        }
    }

    pub fn votes(&self) -> usize {
        self.votes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BoardVoter for GatedBoard {
    async fn vote(&self, _pipeline: &ProductPipeline) -> BoardDecision {
        self.votes.fetch_add(1, Ordering::SeqCst);
        self.gate.pass().await;
        if self.approve {
            BoardDecision::new(true, 3, 0, 0)
        } else {
            BoardDecision::new(false, 0, 3, 0)
        }
    }
}

/// Defaults with short loop delays.
pub fn settings() -> Settings {
    Settings {
        pipeline_interval_ms: 10,
        idle_poll_ms: 10,
        capacity_poll_ms: 10,
        completion_timeout_secs: 10,
        ..Settings::default()
    }
}

pub fn review_json(approved: bool) -> String {
    let rating = if approved { "good" } else { "needs_work" };
    format!(
        r#"{{"rating": "{rating}", "approved": {approved}, "feedback": "Second pass needed.", "revisions": ["Cite sources"]}}"#
    )
}

/// Organization with a single division, department and manager of each
/// given skill, and `pool` employees per manager.
pub fn small_org(
    settings: Settings,
    completion: Arc<dyn Completion>,
    events: Arc<dyn EventSink>,
    skills: &[aicorp_engine::model::Skill],
    pool: usize,
) -> (
    Arc<Organization>,
    tokio::sync::mpsc::Receiver<aicorp_engine::org::PacketCompletion>,
) {
    let (org, rx) = Organization::new(settings, completion, events, None).unwrap();
    let division = org.create_division("Test", "Test division");
    let head = org.create_department_head(division.id, "Testing").unwrap();
    for &skill in skills {
        let manager = org.create_manager(head.id, skill).unwrap();
        for _ in 0..pool {
            org.create_employee(manager.id, skill).unwrap();
        }
    }
    (org, rx)
}

/// Poll `cond` until it holds, failing the test after ten seconds.
pub async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
