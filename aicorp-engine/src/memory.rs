//! Durable company memory backed by SQLite.
//!
//! Holds the company seed and every reviewed deliverable so a restarted
//! organization resumes with the same business context. The organization
//! reaches this through the [`Store`] trait, off the async runtime and
//! under a timeout; a failed write is logged, never fatal.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::model::Deliverable;
use crate::seed::CompanySeed;

/// Persistence collaborator.
pub trait Store: Send + Sync {
    fn save_deliverable(&self, deliverable: &Deliverable) -> Result<()>;
    /// Upsert a seed. Saving an active seed deactivates every other one.
    fn save_seed(&self, seed: &CompanySeed) -> Result<()>;
    /// The newest active seed, if any.
    fn load_seed(&self) -> Result<Option<CompanySeed>>;
}

/// SQLite store.
pub struct Memory {
    db: Mutex<Connection>,
}

impl Memory {
    /// Open or create a memory database.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Connection::open(path).context("Failed to open memory database")?;
        db.execute_batch(
            "PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS company_seeds (
                id TEXT PRIMARY KEY,
                sector TEXT NOT NULL,
                custom_sector TEXT NOT NULL DEFAULT '',
                company_name TEXT NOT NULL,
                mission TEXT NOT NULL DEFAULT '',
                vision TEXT NOT NULL DEFAULT '',
                target_market TEXT NOT NULL DEFAULT '',
                initial_budget REAL NOT NULL DEFAULT 0,
                goals_json TEXT NOT NULL DEFAULT '[]',
                constraints_json TEXT NOT NULL DEFAULT '[]',
                active INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_company_seeds_active
                ON company_seeds(active, created_at);

            CREATE TABLE IF NOT EXISTS deliverables (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                status TEXT NOT NULL,
                skill TEXT NOT NULL,
                employee_id TEXT NOT NULL,
                pipeline_id TEXT,
                document_json TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_deliverables_pipeline
                ON deliverables(pipeline_id);",
        )?;
        Ok(Self { db: Mutex::new(db) })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::open(Path::new(":memory:"))
    }

    /// Most recent deliverables first.
    pub fn recent_deliverables(&self, limit: usize) -> Result<Vec<Deliverable>> {
        let db = self.db.lock();
        let mut stmt = db.prepare(
            "SELECT document_json FROM deliverables ORDER BY created_at DESC, rowid DESC LIMIT ?1",
        )?;
        let docs = stmt
            .query_map(params![limit as i64], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        docs.iter()
            .map(|doc| serde_json::from_str(doc).context("Corrupt deliverable document"))
            .collect()
    }

    pub fn deliverables_for_pipeline(&self, pipeline_id: Uuid) -> Result<Vec<Deliverable>> {
        let db = self.db.lock();
        let mut stmt = db.prepare(
            "SELECT document_json FROM deliverables WHERE pipeline_id = ?1 ORDER BY created_at ASC",
        )?;
        let docs = stmt
            .query_map(params![pipeline_id.to_string()], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        docs.iter()
            .map(|doc| serde_json::from_str(doc).context("Corrupt deliverable document"))
            .collect()
    }
}

struct SeedRow {
    id: String,
    sector: String,
    custom_sector: String,
    company_name: String,
    mission: String,
    vision: String,
    target_market: String,
    initial_budget: f64,
    goals_json: String,
    constraints_json: String,
    active: bool,
    created_at: String,
    updated_at: String,
}

impl SeedRow {
    fn into_seed(self) -> Result<CompanySeed> {
        Ok(CompanySeed {
            id: Uuid::parse_str(&self.id).context("Bad seed id")?,
            sector: self.sector.parse()?,
            custom_sector: self.custom_sector,
            company_name: self.company_name,
            mission: self.mission,
            vision: self.vision,
            target_market: self.target_market,
            initial_budget: self.initial_budget,
            goals: serde_json::from_str(&self.goals_json)?,
            constraints: serde_json::from_str(&self.constraints_json)?,
            active: self.active,
            created_at: parse_time(&self.created_at)?,
            updated_at: parse_time(&self.updated_at)?,
        })
    }
}

/// Fixed-width timestamps so text ordering matches time ordering.
fn stamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Bad timestamp {s:?}"))?
        .with_timezone(&Utc))
}

impl Store for Memory {
    fn save_deliverable(&self, deliverable: &Deliverable) -> Result<()> {
        let doc = serde_json::to_string(deliverable)?;
        let db = self.db.lock();
        db.execute(
            "INSERT OR REPLACE INTO deliverables
                (id, title, status, skill, employee_id, pipeline_id, document_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                deliverable.id.to_string(),
                deliverable.title,
                deliverable.status.as_str(),
                deliverable.skill.as_str(),
                deliverable.employee_id.to_string(),
                deliverable.pipeline_id.map(|id| id.to_string()),
                doc,
                stamp(&deliverable.created_at),
            ],
        )?;
        Ok(())
    }

    fn save_seed(&self, seed: &CompanySeed) -> Result<()> {
        let mut db = self.db.lock();
        let tx = db.transaction()?;
        if seed.active {
            tx.execute(
                "UPDATE company_seeds SET active = 0 WHERE id != ?1",
                params![seed.id.to_string()],
            )?;
        }
        tx.execute(
            "INSERT INTO company_seeds (
                id, sector, custom_sector, company_name, mission, vision,
                target_market, initial_budget, goals_json, constraints_json,
                active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(id) DO UPDATE SET
                sector = excluded.sector,
                custom_sector = excluded.custom_sector,
                company_name = excluded.company_name,
                mission = excluded.mission,
                vision = excluded.vision,
                target_market = excluded.target_market,
                initial_budget = excluded.initial_budget,
                goals_json = excluded.goals_json,
                constraints_json = excluded.constraints_json,
                active = excluded.active,
                updated_at = excluded.updated_at",
            params![
                seed.id.to_string(),
                seed.sector.as_str(),
                seed.custom_sector,
                seed.company_name,
                seed.mission,
                seed.vision,
                seed.target_market,
                seed.initial_budget,
                serde_json::to_string(&seed.goals)?,
                serde_json::to_string(&seed.constraints)?,
                seed.active,
                stamp(&seed.created_at),
                stamp(&seed.updated_at),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn load_seed(&self) -> Result<Option<CompanySeed>> {
        let row = {
            let db = self.db.lock();
            db.query_row(
                "SELECT id, sector, custom_sector, company_name, mission, vision,
                        target_market, initial_budget, goals_json, constraints_json,
                        active, created_at, updated_at
                 FROM company_seeds
                 WHERE active = 1
                 ORDER BY created_at DESC
                 LIMIT 1",
                [],
                |row| {
                    Ok(SeedRow {
                        id: row.get(0)?,
                        sector: row.get(1)?,
                        custom_sector: row.get(2)?,
                        company_name: row.get(3)?,
                        mission: row.get(4)?,
                        vision: row.get(5)?,
                        target_market: row.get(6)?,
                        initial_budget: row.get(7)?,
                        goals_json: row.get(8)?,
                        constraints_json: row.get(9)?,
                        active: row.get(10)?,
                        created_at: row.get(11)?,
                        updated_at: row.get(12)?,
                    })
                },
            )
            .optional()?
        };
        row.map(SeedRow::into_seed).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeliverableStatus, QualityRating, Skill};
    use crate::seed::BusinessSector;
    use pretty_assertions::assert_eq;

    fn deliverable(title: &str, pipeline_id: Option<Uuid>) -> Deliverable {
        let now = Utc::now();
        Deliverable {
            id: Uuid::new_v4(),
            title: title.to_string(),
            kind: "research".into(),
            description: "desc".into(),
            output: "findings".into(),
            status: DeliverableStatus::Completed,
            work_item_id: Uuid::new_v4(),
            employee_id: Uuid::new_v4(),
            employee_name: "Research Worker 1".into(),
            skill: Skill::Research,
            pipeline_id,
            rating: Some(QualityRating::Good),
            review_notes: Some("fine".into()),
            reviewer_id: None,
            duration_ms: 12,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn no_seed_in_fresh_db() {
        let mem = Memory::in_memory().unwrap();
        assert!(mem.load_seed().unwrap().is_none());
    }

    #[test]
    fn active_seed_round_trip() {
        let mem = Memory::in_memory().unwrap();
        let mut seed = CompanySeed::new("Acme", BusinessSector::Saas).with_target_market("SMBs");
        seed.goals = vec!["Profit".into()];
        seed.active = true;
        mem.save_seed(&seed).unwrap();

        let loaded = mem.load_seed().unwrap().unwrap();
        assert_eq!(loaded.id, seed.id);
        assert_eq!(loaded.company_name, "Acme");
        assert_eq!(loaded.sector, BusinessSector::Saas);
        assert_eq!(loaded.goals, vec!["Profit".to_string()]);
        assert!(loaded.active);
    }

    #[test]
    fn newer_active_seed_replaces_older() {
        let mem = Memory::in_memory().unwrap();
        let mut first = CompanySeed::new("First", BusinessSector::Retail);
        first.active = true;
        mem.save_seed(&first).unwrap();

        let mut second = CompanySeed::new("Second", BusinessSector::Gaming);
        second.active = true;
        mem.save_seed(&second).unwrap();

        assert_eq!(mem.load_seed().unwrap().unwrap().company_name, "Second");
        let active: i64 = mem
            .db
            .lock()
            .query_row("SELECT COUNT(*) FROM company_seeds WHERE active = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(active, 1);
    }

    #[test]
    fn inactive_seed_is_not_loaded() {
        let mem = Memory::in_memory().unwrap();
        mem.save_seed(&CompanySeed::new("Draft", BusinessSector::Fashion)).unwrap();
        assert!(mem.load_seed().unwrap().is_none());
    }

    #[test]
    fn deliverables_by_pipeline() {
        let mem = Memory::in_memory().unwrap();
        let pipeline = Uuid::new_v4();
        mem.save_deliverable(&deliverable("a", Some(pipeline))).unwrap();
        mem.save_deliverable(&deliverable("b", None)).unwrap();
        let mut updated = deliverable("c", Some(pipeline));
        mem.save_deliverable(&updated).unwrap();
        updated.status = DeliverableStatus::Rejected;
        mem.save_deliverable(&updated).unwrap();

        let for_pipeline = mem.deliverables_for_pipeline(pipeline).unwrap();
        assert_eq!(for_pipeline.len(), 2);
        assert_eq!(for_pipeline[1].status, DeliverableStatus::Rejected);
        assert_eq!(mem.recent_deliverables(10).unwrap().len(), 3);
    }

    #[test]
    fn on_disk_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.db");
        let mut seed = CompanySeed::new("Durable", BusinessSector::Education);
        seed.active = true;
        Memory::open(&path).unwrap().save_seed(&seed).unwrap();

        let reopened = Memory::open(&path).unwrap();
        assert_eq!(reopened.load_seed().unwrap().unwrap().company_name, "Durable");
    }
}
