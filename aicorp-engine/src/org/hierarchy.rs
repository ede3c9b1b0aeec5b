//! Divisions and department heads, plus the default company layout.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use super::Manager;
use crate::model::Skill;
use crate::persona::{head_persona, CEO_PERSONA};

/// (division, description, [(department, [manager specialties])])
pub(super) const DEFAULT_STRUCTURE: [(&str, &str, [(&str, [Skill; 2]); 2]); 3] = [
    (
        "Technology",
        "Engineering, R&D, and technical operations",
        [
            ("Engineering", [Skill::Coding, Skill::Qa]),
            ("Research", [Skill::Research, Skill::Analysis]),
        ],
    ),
    (
        "Marketing",
        "Brand, content, and growth",
        [
            ("Content", [Skill::Writing, Skill::Design]),
            ("Growth", [Skill::Marketing, Skill::Analysis]),
        ],
    ),
    (
        "Operations",
        "Day-to-day operations and support",
        [
            ("Customer Success", [Skill::Support, Skill::Sales]),
            ("Project Management", [Skill::ProjectManagement, Skill::DataEntry]),
        ],
    ),
];

pub struct Division {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    heads: RwLock<Vec<Arc<DepartmentHead>>>,
}

impl Division {
    pub(super) fn new(name: &str, description: &str) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
            heads: RwLock::new(Vec::new()),
        })
    }

    pub(super) fn add_head(&self, head: Arc<DepartmentHead>) {
        self.heads.write().push(head);
    }

    pub fn heads(&self) -> Vec<Arc<DepartmentHead>> {
        self.heads.read().clone()
    }

    pub fn snapshot(&self) -> DivisionSnapshot {
        DivisionSnapshot {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            departments: self.heads().iter().map(|h| h.snapshot()).collect(),
        }
    }
}

struct HeadState {
    name: String,
    persona: String,
    objectives: Vec<String>,
    managers: Vec<Arc<Manager>>,
}

/// Department head, or the CEO when `division_id` is `None`.
pub struct DepartmentHead {
    pub id: Uuid,
    pub title: String,
    pub department: String,
    pub division_id: Option<Uuid>,
    state: RwLock<HeadState>,
}

impl DepartmentHead {
    pub(super) fn ceo() -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            title: "Chief Executive Officer".to_string(),
            department: "Executive".to_string(),
            division_id: None,
            state: RwLock::new(HeadState {
                name: "AI Executive".to_string(),
                persona: CEO_PERSONA.to_string(),
                objectives: vec![
                    "Drive company growth".to_string(),
                    "Ensure operational excellence".to_string(),
                    "Maintain strategic vision".to_string(),
                ],
                managers: Vec::new(),
            }),
        })
    }

    pub(super) fn new(division_id: Uuid, department: &str) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            title: format!("Head of {department}"),
            department: department.to_string(),
            division_id: Some(division_id),
            state: RwLock::new(HeadState {
                name: format!("{department} Director"),
                persona: head_persona(department),
                objectives: Vec::new(),
                managers: Vec::new(),
            }),
        })
    }

    pub fn name(&self) -> String {
        self.state.read().name.clone()
    }

    pub fn persona(&self) -> String {
        self.state.read().persona.clone()
    }

    pub fn objectives(&self) -> Vec<String> {
        self.state.read().objectives.clone()
    }

    pub fn set_objectives(&self, objectives: Vec<String>) {
        self.state.write().objectives = objectives;
    }

    pub fn managers(&self) -> Vec<Arc<Manager>> {
        self.state.read().managers.clone()
    }

    pub(super) fn add_manager(&self, manager: Arc<Manager>) {
        self.state.write().managers.push(manager);
    }

    pub fn snapshot(&self) -> DepartmentSnapshot {
        let state = self.state.read();
        DepartmentSnapshot {
            id: self.id,
            department: self.department.clone(),
            name: state.name.clone(),
            title: self.title.clone(),
            objectives: state.objectives.clone(),
            managers: state.managers.iter().map(|m| m.id).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DivisionSnapshot {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub departments: Vec<DepartmentSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DepartmentSnapshot {
    pub id: Uuid,
    pub department: String,
    pub name: String,
    pub title: String,
    pub objectives: Vec<String>,
    pub managers: Vec<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_covers_eleven_skills() {
        let mut skills: Vec<Skill> = DEFAULT_STRUCTURE
            .iter()
            .flat_map(|(_, _, depts)| depts.iter().flat_map(|(_, s)| s.iter().copied()))
            .collect();
        assert_eq!(skills.len(), 12);
        skills.sort();
        skills.dedup();
        // Analysis is staffed by both Research and Growth.
        assert_eq!(skills.len(), 11);
        assert!(!skills.contains(&Skill::ContentReview));
    }

    #[test]
    fn heads_are_named_after_their_department() {
        let head = DepartmentHead::new(Uuid::new_v4(), "Growth");
        assert_eq!(head.name(), "Growth Director");
        assert_eq!(head.title, "Head of Growth");
        assert!(head.persona().contains("Head of Growth"));
        assert!(DepartmentHead::ceo().division_id.is_none());
    }
}
