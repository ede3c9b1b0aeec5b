//! Completion capability: turns a persona + prompt into text.
//!
//! The organization only sees the [`Completion`] trait. [`LlmClient`] talks
//! to the Claude Messages API; [`EchoCompletion`] answers offline so the
//! simulation runs without credentials. Cancellation is by dropping the
//! returned future.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::CompletionError;

/// One completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System persona; may be empty.
    pub persona: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(persona: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
            prompt: prompt.into(),
            max_tokens: 1024,
            temperature: 0.7,
        }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Completed {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Completed {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completed, CompletionError>;
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

/// Claude API client.
pub struct LlmClient {
    api_key: String,
    model: String,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            model: "claude-sonnet-4-20250514".to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }
}

#[async_trait]
impl Completion for LlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completed, CompletionError> {
        let messages = [Message {
            role: "user",
            content: &request.prompt,
        }];
        let mut body = serde_json::json!({
            "model": &self.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": messages,
        });
        if !request.persona.is_empty() {
            body["system"] = serde_json::Value::String(request.persona.clone());
        }

        let resp = self
            .http
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CompletionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed = resp
            .json::<ApiResponse>()
            .await
            .map_err(|e| CompletionError::Transport(format!("bad response body: {e}")))?;
        let text = parsed
            .content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");
        if text.trim().is_empty() {
            return Err(CompletionError::Empty);
        }
        let (input_tokens, output_tokens) = parsed
            .usage
            .map(|u| (u.input_tokens, u.output_tokens))
            .unwrap_or_default();
        Ok(Completed {
            text,
            input_tokens,
            output_tokens,
        })
    }
}

/// Offline stand-in. Recognizes each prompt family the organization issues
/// and answers with well-formed content; anything else gets a short draft.
#[derive(Default)]
pub struct EchoCompletion {
    latency: Option<(Duration, Duration)>,
    calls: AtomicU64,
}

impl EchoCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep a random duration in `[min, max]` before each answer.
    pub fn with_latency(mut self, min: Duration, max: Duration) -> Self {
        self.latency = Some((min, max.max(min)));
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn answer(prompt: &str, n: u64) -> String {
        if prompt.contains("Review the following work output") {
            return r#"{"rating": "good", "approved": true, "feedback": "Meets the brief.", "revisions": []}"#.to_string();
        }
        if prompt.contains("MISSION:") && prompt.contains("VISION:") {
            return "MISSION: Make small teams unreasonably effective.\nVISION: Every team runs like a great one.".to_string();
        }
        if prompt.contains("REVENUE_MODEL:") {
            return format!(
                "PROBLEM: Small agencies lose hours every week reconciling client invoices by hand.\n\
                 SOLUTION: LedgerLoop {n} automatically matches payments to invoices and chases late clients.\n\
                 VALUE_PROP: Saves five hours a week per account manager.\n\
                 TARGET_CUSTOMER: Operations leads at agencies with 10-50 staff.\n\
                 REVENUE_MODEL: $49 per seat per month."
            );
        }
        if prompt.contains("DECISION:") {
            return "DECISION: APPROVED\nFEEDBACK: Coherent packet with a credible market.\nCONCERNS: None\nSUGGESTIONS: Validate pricing early, Start with one vertical".to_string();
        }
        if prompt.contains("\"phases\"") {
            return r#"{"timeline": "6 months", "budget": "$250,000", "team_structure": "Two engineers, one designer, one marketer", "kpis": ["Paying customers", "Monthly churn"], "milestones": ["Month 1: MVP", "Month 3: Beta", "Month 6: Launch"], "risk_mitigation": "Ship narrow, talk to customers weekly", "phases": [{"name": "Foundation", "description": "Build the core matching engine", "duration": "2 months", "tasks": ["Data model", "Bank feed import"], "deliverables": ["MVP"]}]}"#.to_string();
        }
        let title = prompt
            .lines()
            .find_map(|l| l.strip_prefix("TASK: "))
            .unwrap_or("task");
        format!("Draft #{n} for {title}: outline, key findings and next steps.")
    }
}

#[async_trait]
impl Completion for EchoCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<Completed, CompletionError> {
        let n = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some((min, max)) = self.latency {
            let delay = {
                let mut rng = rand::thread_rng();
                Duration::from_millis(rng.gen_range(min.as_millis() as u64..=max.as_millis() as u64))
            };
            tokio::time::sleep(delay).await;
        }
        let text = Self::answer(&request.prompt, n);
        Ok(Completed {
            input_tokens: (request.prompt.len() / 4) as u64,
            output_tokens: (text.len() / 4) as u64,
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_text_joins_text_blocks_only() {
        let raw = r#"{"content":[{"type":"text","text":"a"},{"type":"tool_use","id":"x","name":"n","input":{}},{"type":"text","text":"b"}],"usage":{"input_tokens":3,"output_tokens":4}}"#;
        let parsed: ApiResponse = serde_json::from_str(raw).unwrap();
        let texts: Vec<_> = parsed
            .content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect();
        assert_eq!(texts, ["a", "b"]);
        assert_eq!(parsed.usage.unwrap().output_tokens, 4);
    }

    #[tokio::test]
    async fn echo_answers_each_prompt_family() {
        let echo = EchoCompletion::new();
        let review = echo
            .complete(CompletionRequest::new("", "Review the following work output:\n\nx"))
            .await
            .unwrap();
        assert!(review.text.contains("\"approved\": true"));

        let task = echo
            .complete(CompletionRequest::new("", "TASK: Market Research: X\n\nDESCRIPTION: y"))
            .await
            .unwrap();
        assert!(task.text.contains("Market Research: X"));
        assert!(task.tokens() > 0);
        assert_eq!(echo.calls(), 2);
    }
}
