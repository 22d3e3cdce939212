//! SQLite-backed [`Store`] adapter.
//!
//! Each entity table stores its id column plus a JSON blob of the
//! serialized entity. Runtime `sqlx::query` is used throughout rather
//! than the `query!`/`query_as!` macros, which require a live database
//! connection at build time to verify column types against.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use shared_types::{
    AISolverVerdict, AnswerKey, AnswerKeyId, BubbleReading, InterventionId, InterventionItem,
    InterventionPriority, InterventionStatus, ManualEntry, PaperId, QualityRecord, QuestionPaper,
    Reconciliation, ScoreResult, Sheet, SheetId, SheetStage, StorageError,
};

use crate::domain::journal::PendingTransition;
use crate::ports::inbound::{SheetBundle, Store};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS question_papers (id TEXT PRIMARY KEY, data TEXT NOT NULL);
CREATE TABLE IF NOT EXISTS answer_keys (id TEXT PRIMARY KEY, paper_id TEXT NOT NULL, data TEXT NOT NULL);
CREATE TABLE IF NOT EXISTS sheets (id TEXT PRIMARY KEY, stage TEXT NOT NULL, data TEXT NOT NULL);
CREATE TABLE IF NOT EXISTS quality_records (sheet_id TEXT PRIMARY KEY, data TEXT NOT NULL);
CREATE TABLE IF NOT EXISTS bubble_readings (sheet_id TEXT PRIMARY KEY, data TEXT NOT NULL);
CREATE TABLE IF NOT EXISTS ai_solver_verdicts (sheet_id TEXT PRIMARY KEY, data TEXT NOT NULL);
CREATE TABLE IF NOT EXISTS manual_entries (sheet_id TEXT PRIMARY KEY, data TEXT NOT NULL);
CREATE TABLE IF NOT EXISTS reconciliations (sheet_id TEXT PRIMARY KEY, data TEXT NOT NULL);
CREATE TABLE IF NOT EXISTS score_results (sheet_id TEXT PRIMARY KEY, data TEXT NOT NULL);
CREATE TABLE IF NOT EXISTS interventions (id TEXT PRIMARY KEY, status TEXT NOT NULL, priority TEXT NOT NULL, assignee TEXT, sheet_ref TEXT, data TEXT NOT NULL);
CREATE TABLE IF NOT EXISTS journal (id TEXT PRIMARY KEY, data TEXT NOT NULL);
"#;

/// SQLite-backed store. Durable across restarts; used in production.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to `database_url` (e.g. `sqlite://omr.db`) and ensure the
    /// schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(Self { pool })
    }

    fn row_sheet_ref(entity_ref: &shared_types::InterventionRef) -> Option<String> {
        match entity_ref {
            shared_types::InterventionRef::Sheet(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

fn to_db_err(e: sqlx::Error) -> StorageError {
    StorageError::DatabaseError(e.to_string())
}

fn serialize<T: serde::Serialize>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|e| StorageError::DataCorruption(e.to_string()))
}

fn deserialize<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, StorageError> {
    serde_json::from_str(raw).map_err(|e| StorageError::DataCorruption(e.to_string()))
}

#[async_trait]
impl Store for SqliteStore {
    async fn put_question_paper(&self, paper: QuestionPaper) -> Result<(), StorageError> {
        let data = serialize(&paper)?;
        sqlx::query("INSERT OR REPLACE INTO question_papers (id, data) VALUES (?, ?)")
            .bind(paper.id.to_string())
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(to_db_err)?;
        Ok(())
    }

    async fn get_question_paper(&self, id: PaperId) -> Result<Option<QuestionPaper>, StorageError> {
        let row = sqlx::query("SELECT data FROM question_papers WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(to_db_err)?;
        row.map(|r| deserialize(r.get::<String, _>("data").as_str()))
            .transpose()
    }

    async fn put_answer_key(&self, key: AnswerKey) -> Result<(), StorageError> {
        let data = serialize(&key)?;
        sqlx::query("INSERT OR REPLACE INTO answer_keys (id, paper_id, data) VALUES (?, ?, ?)")
            .bind(key.id.to_string())
            .bind(key.paper_id.to_string())
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(to_db_err)?;
        Ok(())
    }

    async fn get_answer_key(&self, id: AnswerKeyId) -> Result<Option<AnswerKey>, StorageError> {
        let row = sqlx::query("SELECT data FROM answer_keys WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(to_db_err)?;
        row.map(|r| deserialize(r.get::<String, _>("data").as_str()))
            .transpose()
    }

    async fn get_answer_key_by_paper(
        &self,
        paper_id: PaperId,
    ) -> Result<Option<AnswerKey>, StorageError> {
        let row = sqlx::query("SELECT data FROM answer_keys WHERE paper_id = ?")
            .bind(paper_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(to_db_err)?;
        row.map(|r| deserialize(r.get::<String, _>("data").as_str()))
            .transpose()
    }

    async fn put_sheet(&self, sheet: Sheet) -> Result<(), StorageError> {
        let data = serialize(&sheet)?;
        let stage = serialize(&sheet.stage)?;
        sqlx::query("INSERT OR REPLACE INTO sheets (id, stage, data) VALUES (?, ?, ?)")
            .bind(sheet.id.to_string())
            .bind(stage)
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(to_db_err)?;
        Ok(())
    }

    async fn get_sheet_bundle(&self, id: SheetId) -> Result<SheetBundle, StorageError> {
        let sheet_row = sqlx::query("SELECT data FROM sheets WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(to_db_err)?;
        let sheet: Option<Sheet> = sheet_row
            .map(|r| deserialize(r.get::<String, _>("data").as_str()))
            .transpose()?;

        macro_rules! fetch_one {
            ($table:literal) => {{
                let row = sqlx::query(concat!("SELECT data FROM ", $table, " WHERE sheet_id = ?"))
                    .bind(id.to_string())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(to_db_err)?;
                row.map(|r| deserialize(r.get::<String, _>("data").as_str()))
                    .transpose()?
            }};
        }

        let quality = fetch_one!("quality_records");
        let bubbles = fetch_one!("bubble_readings");
        let ai_verdict = fetch_one!("ai_solver_verdicts");
        let manual_entry = fetch_one!("manual_entries");
        let reconciliation = fetch_one!("reconciliations");
        let score = fetch_one!("score_results");

        let intervention_rows = sqlx::query("SELECT data FROM interventions WHERE sheet_ref = ?")
            .bind(id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(to_db_err)?;
        let interventions = intervention_rows
            .into_iter()
            .map(|r| deserialize(r.get::<String, _>("data").as_str()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SheetBundle {
            sheet,
            quality,
            bubbles,
            ai_verdict,
            manual_entry,
            reconciliation,
            score,
            interventions,
        })
    }

    async fn list_sheets_in_stage(&self, stage: SheetStage) -> Result<Vec<Sheet>, StorageError> {
        let stage_json = serialize(&stage)?;
        let rows = sqlx::query("SELECT data FROM sheets WHERE stage = ?")
            .bind(stage_json)
            .fetch_all(&self.pool)
            .await
            .map_err(to_db_err)?;
        rows.into_iter()
            .map(|r| deserialize(r.get::<String, _>("data").as_str()))
            .collect()
    }

    async fn put_quality_record(&self, record: QualityRecord) -> Result<(), StorageError> {
        let data = serialize(&record)?;
        sqlx::query("INSERT OR REPLACE INTO quality_records (sheet_id, data) VALUES (?, ?)")
            .bind(record.sheet_id.to_string())
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(to_db_err)?;
        Ok(())
    }

    async fn put_bubble_reading(&self, reading: BubbleReading) -> Result<(), StorageError> {
        let data = serialize(&reading)?;
        sqlx::query("INSERT OR REPLACE INTO bubble_readings (sheet_id, data) VALUES (?, ?)")
            .bind(reading.sheet_id.to_string())
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(to_db_err)?;
        Ok(())
    }

    async fn put_ai_solver_verdict(&self, verdict: AISolverVerdict) -> Result<(), StorageError> {
        let data = serialize(&verdict)?;
        sqlx::query("INSERT OR REPLACE INTO ai_solver_verdicts (sheet_id, data) VALUES (?, ?)")
            .bind(verdict.sheet_id.to_string())
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(to_db_err)?;
        Ok(())
    }

    async fn put_manual_entry(&self, entry: ManualEntry) -> Result<(), StorageError> {
        let data = serialize(&entry)?;
        sqlx::query("INSERT OR REPLACE INTO manual_entries (sheet_id, data) VALUES (?, ?)")
            .bind(entry.sheet_id.to_string())
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(to_db_err)?;
        Ok(())
    }

    async fn put_reconciliation(&self, reconciliation: Reconciliation) -> Result<(), StorageError> {
        let data = serialize(&reconciliation)?;
        sqlx::query("INSERT OR REPLACE INTO reconciliations (sheet_id, data) VALUES (?, ?)")
            .bind(reconciliation.sheet_id.to_string())
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(to_db_err)?;
        Ok(())
    }

    async fn put_score_result(&self, score: ScoreResult) -> Result<(), StorageError> {
        let data = serialize(&score)?;
        sqlx::query("INSERT OR REPLACE INTO score_results (sheet_id, data) VALUES (?, ?)")
            .bind(score.sheet_id.to_string())
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(to_db_err)?;
        Ok(())
    }

    async fn put_intervention(&self, item: InterventionItem) -> Result<(), StorageError> {
        let data = serialize(&item)?;
        let status = serialize(&item.status)?;
        let priority = serialize(&item.priority)?;
        let sheet_ref = Self::row_sheet_ref(&item.entity_ref);
        sqlx::query(
            "INSERT OR REPLACE INTO interventions (id, status, priority, assignee, sheet_ref, data) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(item.id.to_string())
        .bind(status)
        .bind(priority)
        .bind(item.assignee.clone())
        .bind(sheet_ref)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(to_db_err)?;
        Ok(())
    }

    async fn compare_and_swap_intervention(
        &self,
        id: InterventionId,
        expected_status: InterventionStatus,
        item: InterventionItem,
    ) -> Result<bool, StorageError> {
        let data = serialize(&item)?;
        let new_status = serialize(&item.status)?;
        let priority = serialize(&item.priority)?;
        let sheet_ref = Self::row_sheet_ref(&item.entity_ref);
        let expected = serialize(&expected_status)?;
        // A single UPDATE with the old status in the WHERE clause is
        // SQLite's own compare-and-swap: the statement is atomic with
        // respect to every other connection on the pool, so two
        // concurrent callers racing the same row can never both see
        // `rows_affected() > 0`.
        let result = sqlx::query(
            "UPDATE interventions SET status = ?, priority = ?, assignee = ?, sheet_ref = ?, data = ? \
             WHERE id = ? AND status = ?",
        )
        .bind(new_status)
        .bind(priority)
        .bind(item.assignee.clone())
        .bind(sheet_ref)
        .bind(data)
        .bind(id.to_string())
        .bind(expected)
        .execute(&self.pool)
        .await
        .map_err(to_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_intervention(
        &self,
        id: InterventionId,
    ) -> Result<Option<InterventionItem>, StorageError> {
        let row = sqlx::query("SELECT data FROM interventions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(to_db_err)?;
        row.map(|r| deserialize(r.get::<String, _>("data").as_str()))
            .transpose()
    }

    async fn list_interventions(
        &self,
        status: Option<InterventionStatus>,
        priority: Option<InterventionPriority>,
        assignee: Option<&str>,
    ) -> Result<Vec<InterventionItem>, StorageError> {
        let rows = sqlx::query("SELECT data FROM interventions")
            .fetch_all(&self.pool)
            .await
            .map_err(to_db_err)?;
        let items: Vec<InterventionItem> = rows
            .into_iter()
            .map(|r| deserialize(r.get::<String, _>("data").as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items
            .into_iter()
            .filter(|i| status.map(|s| s == i.status).unwrap_or(true))
            .filter(|i| priority.map(|p| p == i.priority).unwrap_or(true))
            .filter(|i| {
                assignee
                    .map(|a| i.assignee.as_deref() == Some(a))
                    .unwrap_or(true)
            })
            .collect())
    }

    async fn has_open_intervention_for_sheet(&self, sheet_id: SheetId) -> Result<bool, StorageError> {
        let row = sqlx::query(
            "SELECT COUNT(*) as c FROM interventions WHERE sheet_ref = ? AND (status = ? OR status = ?)",
        )
        .bind(sheet_id.to_string())
        .bind(serialize(&InterventionStatus::Open)?)
        .bind(serialize(&InterventionStatus::Claimed)?)
        .fetch_one(&self.pool)
        .await
        .map_err(to_db_err)?;
        Ok(row.get::<i64, _>("c") > 0)
    }

    async fn begin_transition(&self, transition: PendingTransition) -> Result<(), StorageError> {
        let data = serialize(&transition)?;
        sqlx::query("INSERT OR REPLACE INTO journal (id, data) VALUES (?, ?)")
            .bind(transition.id.to_string())
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(to_db_err)?;
        Ok(())
    }

    async fn commit_transition(&self, id: Uuid) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM journal WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(to_db_err)?;
        Ok(())
    }

    async fn pending_transitions(&self) -> Result<Vec<PendingTransition>, StorageError> {
        let rows = sqlx::query("SELECT data FROM journal")
            .fetch_all(&self.pool)
            .await
            .map_err(to_db_err)?;
        rows.into_iter()
            .map(|r| deserialize(r.get::<String, _>("data").as_str()))
            .collect()
    }
}
