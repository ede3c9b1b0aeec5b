//! System personas and editable biographies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::Skill;

pub const CEO_PERSONA: &str = "You are the CEO. You set direction, approve major initiatives, and ensure all divisions work toward company goals. You delegate to department heads and expect results.";

pub fn head_persona(department: &str) -> String {
    format!(
        "You are the Head of {department}. You set objectives for your department, review manager reports, and ensure your team delivers quality work aligned with division goals."
    )
}

/// Manager persona. The JSON block is the verdict shape `parse_review` reads.
pub fn manager_persona(specialty: Skill) -> String {
    format!(
        r#"You are a {} Manager. You assign work to employees, review their output for quality, and provide constructive feedback. You ensure work meets department standards before presenting to leadership.

When reviewing work, respond in JSON:
{{
  "rating": "excellent|good|acceptable|needs_work|rejected",
  "approved": true|false,
  "feedback": "specific feedback",
  "revisions": ["revision1", "revision2"]
}}"#,
        specialty.label()
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonKind {
    Employee,
    Manager,
}

/// Editable biography for an employee or manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Biography {
    pub person_id: Uuid,
    pub person_kind: PersonKind,
    pub name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub background: String,
    #[serde(default)]
    pub personality: String,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub quirks: Vec<String>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Biography {
    pub fn new(person_id: Uuid, person_kind: PersonKind, name: impl Into<String>) -> Self {
        Self {
            person_id,
            person_kind,
            name: name.into(),
            bio: String::new(),
            background: String::new(),
            personality: String::new(),
            goals: Vec::new(),
            values: Vec::new(),
            quirks: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Render the biography as a system persona.
    pub fn persona(&self) -> String {
        let mut out = format!("You are {}.\n\n", self.name);
        for (heading, text) in [
            ("ABOUT YOU", &self.bio),
            ("BACKGROUND", &self.background),
            ("PERSONALITY", &self.personality),
        ] {
            if !text.is_empty() {
                out.push_str(&format!("{heading}:\n{text}\n\n"));
            }
        }
        for (heading, items) in [
            ("YOUR GOALS", &self.goals),
            ("YOUR VALUES", &self.values),
            ("YOUR QUIRKS", &self.quirks),
        ] {
            if items.is_empty() {
                continue;
            }
            out.push_str(heading);
            out.push_str(":\n");
            for item in items {
                out.push_str(&format!("- {item}\n"));
            }
            out.push('\n');
        }
        out.push_str("Stay in character and make decisions based on your personality, goals, and values.");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persona_skips_empty_sections() {
        let mut bio = Biography::new(Uuid::new_v4(), PersonKind::Employee, "Ada");
        bio.background = "Ten years of market research".into();
        bio.quirks = vec!["Loves spreadsheets".into()];
        let persona = bio.persona();
        assert!(persona.starts_with("You are Ada.\n\n"));
        assert!(persona.contains("BACKGROUND:\nTen years of market research"));
        assert!(persona.contains("YOUR QUIRKS:\n- Loves spreadsheets"));
        assert!(!persona.contains("ABOUT YOU"));
        assert!(!persona.contains("YOUR GOALS"));
        assert!(persona.ends_with("goals, and values."));
    }

    #[test]
    fn manager_persona_asks_for_json() {
        let persona = manager_persona(Skill::Qa);
        assert!(persona.starts_with("You are a QA Manager."));
        assert!(persona.contains("\"approved\": true|false"));
    }
}
