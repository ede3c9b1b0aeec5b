//! Parsers for the executive completions: product idea, C-suite verdict
//! and execution plan. All of them accept sloppy formatting.

use chrono::Utc;
use serde::Deserialize;

use super::stage::{ExecutionPhase, ExecutionPlanContent, IdeaContent, ReviewContent};
use crate::format::{extract_json_object, strip_think};

const IDEA_HEADERS: [&str; 5] = [
    "PROBLEM:",
    "SOLUTION:",
    "VALUE_PROP:",
    "TARGET_CUSTOMER:",
    "REVENUE_MODEL:",
];

/// Read `HEADER: value` sections. A value runs until the next header, and
/// continuation lines are joined with spaces. Blank lines and markdown
/// headings inside a value are skipped.
pub fn parse_idea(text: &str) -> IdeaContent {
    let cleaned = strip_think(text).replace("**", "");
    let mut idea = IdeaContent {
        generated_at: Some(Utc::now()),
        ..Default::default()
    };
    let mut current: Option<(&str, String)> = None;

    for line in cleaned.lines().map(str::trim) {
        let header = IDEA_HEADERS
            .iter()
            .find_map(|h| line.strip_prefix(h).map(|rest| (*h, rest.trim().to_string())));
        match header {
            Some(next) => {
                if let Some((h, value)) = current.replace(next) {
                    assign_idea_field(&mut idea, h, value);
                }
            }
            None => {
                if let Some((_, value)) = current.as_mut() {
                    if !line.is_empty() && !line.starts_with('#') {
                        if !value.is_empty() {
                            value.push(' ');
                        }
                        value.push_str(line);
                    }
                }
            }
        }
    }
    if let Some((h, value)) = current {
        assign_idea_field(&mut idea, h, value);
    }
    idea
}

fn assign_idea_field(idea: &mut IdeaContent, header: &str, value: String) {
    let value = value.trim().to_string();
    match header {
        "PROBLEM:" => idea.problem = value,
        "SOLUTION:" => idea.solution = value,
        "VALUE_PROP:" => idea.value_prop = value,
        "TARGET_CUSTOMER:" => idea.target_customer = value,
        "REVENUE_MODEL:" => idea.revenue_model = value,
        _ => {}
    }
}

/// DECISION/FEEDBACK/CONCERNS/SUGGESTIONS lines. Approved only when the
/// decision says APPROVED and does not say NEEDS.
pub fn parse_csuite_review(text: &str) -> ReviewContent {
    let mut review = ReviewContent {
        reviewed_at: Some(Utc::now()),
        ..Default::default()
    };
    for line in strip_think(text).lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("DECISION:") {
            let decision = rest.trim().to_uppercase();
            review.approved = decision.contains("APPROVED") && !decision.contains("NEEDS");
        } else if let Some(rest) = line.strip_prefix("FEEDBACK:") {
            review.feedback = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("CONCERNS:") {
            let rest = rest.trim();
            if rest != "None" {
                review.concerns = split_list(rest);
            }
        } else if let Some(rest) = line.strip_prefix("SUGGESTIONS:") {
            review.suggestions = split_list(rest);
        }
    }
    review
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Deserialize)]
struct RawPlan {
    #[serde(default)]
    timeline: String,
    #[serde(default)]
    budget: String,
    #[serde(default)]
    team_structure: String,
    #[serde(default)]
    kpis: Vec<String>,
    #[serde(default)]
    milestones: Vec<String>,
    #[serde(default)]
    risk_mitigation: String,
    #[serde(default)]
    phases: Vec<ExecutionPhase>,
}

/// The JSON object between the first `{` and the last `}`. Anything that
/// does not parse yields a "6 months" / "TBD" placeholder plan.
pub fn parse_execution_plan(text: &str) -> ExecutionPlanContent {
    let cleaned = strip_think(text);
    let parsed = extract_json_object(&cleaned).map(serde_json::from_str::<RawPlan>);
    match parsed {
        Some(Ok(raw)) => ExecutionPlanContent {
            phases: raw.phases,
            timeline: raw.timeline,
            budget: raw.budget,
            team_structure: raw.team_structure,
            kpis: raw.kpis,
            milestones: raw.milestones,
            risk_mitigation: raw.risk_mitigation,
            created_at: Some(Utc::now()),
        },
        Some(Err(e)) => {
            tracing::warn!(error = %e, "Execution plan is not valid JSON, using placeholder");
            placeholder_plan()
        }
        None => {
            tracing::warn!("Execution plan has no JSON object, using placeholder");
            placeholder_plan()
        }
    }
}

fn placeholder_plan() -> ExecutionPlanContent {
    ExecutionPlanContent {
        timeline: "6 months".to_string(),
        budget: "TBD".to_string(),
        created_at: Some(Utc::now()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn idea_fields_span_lines() {
        let text = "<think>brainstorming</think>\n\
                    **PROBLEM:** Clinics lose\nbookings to no-shows.\n\n\
                    # Notes\n\
                    SOLUTION: SlotSaver fills cancelled appointments\n\
                    VALUE_PROP: Recovers lost revenue\n\
                    TARGET_CUSTOMER: Clinic office managers\n\
                    REVENUE_MODEL: $99/month per location";
        let idea = parse_idea(text);
        assert_eq!(idea.problem, "Clinics lose bookings to no-shows.");
        assert_eq!(idea.solution, "SlotSaver fills cancelled appointments");
        assert_eq!(idea.value_prop, "Recovers lost revenue");
        assert_eq!(idea.target_customer, "Clinic office managers");
        assert_eq!(idea.revenue_model, "$99/month per location");
    }

    #[test]
    fn idea_without_headers_is_empty() {
        let idea = parse_idea("I would build a todo app.");
        assert!(idea.problem.is_empty());
        assert!(idea.solution.is_empty());
    }

    #[test]
    fn needs_work_is_not_approval() {
        let review = parse_csuite_review(
            "DECISION: NEEDS_WORK (not yet APPROVED)\nFEEDBACK: Thin research\nCONCERNS: None\nSUGGESTIONS: Interview users, , Price higher",
        );
        assert!(!review.approved);
        assert_eq!(review.feedback, "Thin research");
        assert!(review.concerns.is_empty());
        assert_eq!(review.suggestions, vec!["Interview users", "Price higher"]);

        let review = parse_csuite_review("DECISION: approved\nCONCERNS: churn, pricing");
        assert!(review.approved);
        assert_eq!(review.concerns, vec!["churn", "pricing"]);
    }

    #[test]
    fn plan_parses_embedded_json() {
        let text = r#"Here is the plan:
```json
{"timeline": "9 months", "budget": "$1M", "kpis": ["MRR"], "phases": [{"name": "Build", "duration": "3 months", "tasks": ["API"]}]}
```"#;
        let plan = parse_execution_plan(text);
        assert_eq!(plan.timeline, "9 months");
        assert_eq!(plan.kpis, vec!["MRR"]);
        assert_eq!(
            plan.phases,
            vec![ExecutionPhase {
                name: "Build".into(),
                duration: "3 months".into(),
                tasks: vec!["API".into()],
                ..Default::default()
            }]
        );
    }

    #[test]
    fn plan_falls_back_on_garbage() {
        let plan = parse_execution_plan("{ not json }");
        assert_eq!(plan.timeline, "6 months");
        assert_eq!(plan.budget, "TBD");
        assert!(parse_execution_plan("no braces").phases.is_empty());
    }
}
