//! Manager entity and its review loop.
//!
//! Employees push finished results onto the manager's review queue. The
//! manager rates each one, records a deliverable, forwards approved
//! pipeline work and routes rejected work back out as a revision.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{panic_message, Employee, PacketCompletion, Runtime};
use crate::events::OrgEvent;
use crate::format::{extract_json_object, format_revisions, strip_think};
use crate::llm::CompletionRequest;
use crate::model::{
    Deliverable, DeliverableStatus, QualityRating, QualityReview, Skill, WorkItem, WorkKind,
    WorkResult, INPUT_REVISION_OF,
};
use crate::persona::manager_persona;

/// A finished result waiting for review.
#[derive(Debug, Clone)]
pub struct Submission {
    pub work: WorkItem,
    pub result: WorkResult,
    pub employee_id: Uuid,
    pub employee_name: String,
    pub skill: Skill,
}

struct ManagerState {
    name: String,
    persona: String,
    reports: Vec<Arc<Employee>>,
}

pub struct Manager {
    pub id: Uuid,
    pub specialty: Skill,
    pub head_id: Uuid,
    pub max_reports: usize,
    state: RwLock<ManagerState>,
    review_tx: mpsc::Sender<Submission>,
    reviewed: AtomicU64,
    revisions_requested: AtomicU64,
    cancel: CancellationToken,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManagerSnapshot {
    pub id: Uuid,
    pub name: String,
    pub specialty: Skill,
    pub head_id: Uuid,
    pub reports: Vec<Uuid>,
    pub max_reports: usize,
    pub reviewed: u64,
    pub revisions_requested: u64,
}

impl Manager {
    pub(super) fn spawn(rt: &Arc<Runtime>, head_id: Uuid, specialty: Skill) -> Arc<Self> {
        let (review_tx, review_rx) = mpsc::channel(rt.settings.review_queue_capacity);
        let manager = Arc::new(Self {
            id: Uuid::new_v4(),
            specialty,
            head_id,
            max_reports: rt.settings.max_reports,
            state: RwLock::new(ManagerState {
                name: format!("{} Manager", specialty.label()),
                persona: manager_persona(specialty),
                reports: Vec::new(),
            }),
            review_tx,
            reviewed: AtomicU64::new(0),
            revisions_requested: AtomicU64::new(0),
            cancel: rt.cancel.child_token(),
        });

        let worker = Arc::clone(&manager);
        let rt = Arc::clone(rt);
        rt.tasks.clone().spawn(async move {
            let id = worker.id;
            let outcome = AssertUnwindSafe(worker.run(review_rx, rt)).catch_unwind().await;
            if let Err(panic) = outcome {
                tracing::error!(manager_id = %id, panic = %panic_message(panic.as_ref()), "Manager loop panicked");
            }
        });
        manager
    }

    pub fn name(&self) -> String {
        self.state.read().name.clone()
    }

    pub fn persona(&self) -> String {
        self.state.read().persona.clone()
    }

    pub fn reports(&self) -> Vec<Arc<Employee>> {
        self.state.read().reports.clone()
    }

    pub fn report_count(&self) -> usize {
        self.state.read().reports.len()
    }

    pub fn reviewed(&self) -> u64 {
        self.reviewed.load(Ordering::Relaxed)
    }

    pub fn revisions_requested(&self) -> u64 {
        self.revisions_requested.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> ManagerSnapshot {
        let state = self.state.read();
        ManagerSnapshot {
            id: self.id,
            name: state.name.clone(),
            specialty: self.specialty,
            head_id: self.head_id,
            reports: state.reports.iter().map(|e| e.id).collect(),
            max_reports: self.max_reports,
            reviewed: self.reviewed(),
            revisions_requested: self.revisions_requested(),
        }
    }

    pub(super) fn review_sender(&self) -> mpsc::Sender<Submission> {
        self.review_tx.clone()
    }

    pub(super) fn add_report(&self, employee: Arc<Employee>) {
        self.state.write().reports.push(employee);
    }

    pub(super) fn remove_report(&self, employee_id: Uuid) {
        self.state.write().reports.retain(|e| e.id != employee_id);
    }

    pub(super) fn apply_identity(&self, name: &str, persona: String) {
        let mut state = self.state.write();
        state.name = name.to_string();
        state.persona = persona;
    }

    pub(super) fn reset_persona(&self) {
        self.state.write().persona = manager_persona(self.specialty);
    }

    async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<Submission>, rt: Arc<Runtime>) {
        tracing::debug!(manager_id = %self.id, specialty = %self.specialty, "Manager started");
        loop {
            let submission = tokio::select! {
                _ = self.cancel.cancelled() => break,
                s = rx.recv() => match s {
                    Some(s) => s,
                    None => break,
                },
            };

            let review = self.review(&rt, &submission.result).await;
            self.reviewed.fetch_add(1, Ordering::Relaxed);
            tracing::info!(
                manager_id = %self.id,
                work_id = %submission.work.id,
                rating = %review.rating,
                approved = review.approved,
                "Work reviewed"
            );
            rt.events.publish(OrgEvent::WorkReviewed {
                manager_id: self.id,
                work_id: submission.work.id,
                result_id: submission.result.id,
                rating: review.rating,
                approved: review.approved,
            });
            rt.record_deliverable(deliverable(&submission, &review));

            if review.approved {
                self.forward_to_pipeline(&rt, &submission).await;
            } else {
                self.request_revision(&submission, &review);
            }
        }
        tracing::debug!(manager_id = %self.id, "Manager stopped");
    }

    async fn review(&self, rt: &Runtime, result: &WorkResult) -> QualityReview {
        let prompt = format!(
            "Review the following work output:\n\nWORK OUTPUT:\n{}\n\nRate the quality and provide feedback. Respond in JSON format.",
            result.output
        );
        let request = CompletionRequest::new(self.persona(), prompt)
            .max_tokens(500)
            .temperature(0.5);
        let verdict = match rt.complete(&self.cancel, request).await {
            Ok(done) => parse_review(&done.text),
            Err(e) => {
                tracing::warn!(manager_id = %self.id, error = %e, "Review failed, auto-approving");
                ReviewVerdict::fallback("Auto-approved due to review error")
            }
        };
        QualityReview {
            id: Uuid::new_v4(),
            result_id: result.id,
            reviewer_id: self.id,
            rating: verdict.rating,
            approved: verdict.approved,
            feedback: verdict.feedback,
            revisions: verdict.revisions,
            reviewed_at: Utc::now(),
        }
    }

    async fn forward_to_pipeline(&self, rt: &Runtime, submission: &Submission) {
        let Some(link) = submission.work.pipeline_link() else {
            return;
        };
        let completion = PacketCompletion {
            link,
            work_id: submission.work.id,
            employee_id: submission.employee_id,
            output: submission.result.output.clone(),
        };
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            sent = rt.packet_tx.send(completion) => {
                if sent.is_err() {
                    tracing::debug!(work_id = %submission.work.id, "No pipeline listener");
                }
            }
        }
    }

    /// Hand a revision to an idle report, preferring someone other than the
    /// author. Dropped with a warning when nobody is free.
    fn request_revision(&self, submission: &Submission, review: &QualityReview) {
        let mut revision = WorkItem::new(
            format!("Revision Required: {}", submission.work.title),
            format!(
                "Previous work needs revision:\n\nFEEDBACK: {}\n\nREVISIONS NEEDED:\n{}\n\nORIGINAL OUTPUT:\n{}",
                review.feedback,
                format_revisions(&review.revisions),
                submission.result.output
            ),
        )
        .with_kind(WorkKind::Revision)
        .with_objectives(review.revisions.clone())
        .with_priority(2);
        revision.inputs = submission.work.inputs.clone();
        if !revision.inputs.contains_key(INPUT_REVISION_OF) {
            revision
                .inputs
                .insert(INPUT_REVISION_OF.into(), Value::String(submission.work.id.to_string()));
        }

        let reports = self.reports();
        let others = reports.iter().filter(|e| e.id != submission.employee_id);
        let author = reports.iter().filter(|e| e.id == submission.employee_id);
        let mut item = revision;
        for employee in others.chain(author) {
            match employee.try_assign(item, Some(self.id)) {
                Ok(()) => {
                    self.revisions_requested.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(
                        manager_id = %self.id,
                        employee_id = %employee.id,
                        work_id = %submission.work.id,
                        "Revision assigned"
                    );
                    return;
                }
                Err(back) => item = back,
            }
        }
        tracing::warn!(manager_id = %self.id, work_id = %submission.work.id, "No idle employee for revision, dropped");
    }
}

fn deliverable(submission: &Submission, review: &QualityReview) -> Deliverable {
    let now = Utc::now();
    let status = if review.approved && !submission.result.is_error() {
        DeliverableStatus::Completed
    } else {
        DeliverableStatus::Rejected
    };
    Deliverable {
        id: Uuid::new_v4(),
        title: submission.work.title.clone(),
        kind: submission.skill.as_str().to_string(),
        description: submission.work.description.clone(),
        output: submission.result.output.clone(),
        status,
        work_item_id: submission.work.id,
        employee_id: submission.employee_id,
        employee_name: submission.employee_name.clone(),
        skill: submission.skill,
        pipeline_id: submission.work.pipeline_link().map(|l| l.pipeline_id),
        rating: Some(review.rating),
        review_notes: Some(review.feedback.clone()),
        reviewer_id: Some(review.reviewer_id),
        duration_ms: submission.result.duration_ms,
        created_at: now,
        updated_at: now,
    }
}

/// A parsed review verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewVerdict {
    pub rating: QualityRating,
    pub approved: bool,
    pub feedback: String,
    pub revisions: Vec<String>,
}

impl ReviewVerdict {
    fn fallback(feedback: impl Into<String>) -> Self {
        Self {
            rating: QualityRating::Acceptable,
            approved: true,
            feedback: feedback.into(),
            revisions: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
struct RawVerdict {
    rating: Option<String>,
    approved: Option<bool>,
    #[serde(default)]
    feedback: Option<String>,
    #[serde(default)]
    revisions: Option<Vec<String>>,
}

/// Read a reviewer's JSON verdict. Text that holds no parseable object is
/// approved as acceptable with the raw text as feedback.
pub fn parse_review(text: &str) -> ReviewVerdict {
    let cleaned = strip_think(text);
    let raw = extract_json_object(&cleaned).and_then(|s| serde_json::from_str::<RawVerdict>(s).ok());
    let Some(raw) = raw else {
        return ReviewVerdict::fallback(cleaned.trim());
    };

    let rating = raw.rating.as_deref().and_then(|r| r.parse::<QualityRating>().ok());
    let approved = raw.approved.unwrap_or(!matches!(
        rating,
        Some(QualityRating::NeedsWork) | Some(QualityRating::Rejected)
    ));
    let rating = rating.unwrap_or(if approved {
        QualityRating::Acceptable
    } else {
        QualityRating::NeedsWork
    });
    ReviewVerdict {
        rating,
        approved,
        feedback: raw.feedback.unwrap_or_default(),
        revisions: raw.revisions.unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json_verdict() {
        let text = "Here you go:\n```json\n{\"rating\": \"needs_work\", \"approved\": false, \"feedback\": \"Too thin\", \"revisions\": [\"Add sources\"]}\n```";
        let verdict = parse_review(text);
        assert_eq!(verdict.rating, QualityRating::NeedsWork);
        assert!(!verdict.approved);
        assert_eq!(verdict.feedback, "Too thin");
        assert_eq!(verdict.revisions, vec!["Add sources".to_string()]);
    }

    #[test]
    fn non_json_review_is_acceptable() {
        let verdict = parse_review("<think>hmm</think>Looks fine to me.");
        assert_eq!(verdict.rating, QualityRating::Acceptable);
        assert!(verdict.approved);
        assert_eq!(verdict.feedback, "Looks fine to me.");
    }

    #[test]
    fn approval_defaults_from_rating() {
        let verdict = parse_review(r#"{"rating": "Rejected", "feedback": "no"}"#);
        assert!(!verdict.approved);
        assert_eq!(verdict.rating, QualityRating::Rejected);

        let verdict = parse_review(r#"{"approved": false}"#);
        assert_eq!(verdict.rating, QualityRating::NeedsWork);
        assert!(verdict.revisions.is_empty());
    }
}
