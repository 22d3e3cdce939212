//! In-memory [`Store`] adapter for tests and the in-process test harness.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use shared_types::{
    AISolverVerdict, AnswerKey, AnswerKeyId, BubbleReading, InterventionId, InterventionItem,
    InterventionPriority, InterventionStatus, ManualEntry, PaperId, QualityRecord, QuestionPaper,
    Reconciliation, ScoreResult, Sheet, SheetId, SheetStage, StorageError,
};

use crate::domain::journal::PendingTransition;
use crate::ports::inbound::{SheetBundle, Store};

/// All entity tables, guarded independently so readers never block on an
/// unrelated entity's writer.
#[derive(Default)]
struct Tables {
    papers: HashMap<PaperId, QuestionPaper>,
    answer_keys: HashMap<AnswerKeyId, AnswerKey>,
    sheets: HashMap<SheetId, Sheet>,
    quality: HashMap<SheetId, QualityRecord>,
    bubbles: HashMap<SheetId, BubbleReading>,
    ai_verdicts: HashMap<SheetId, AISolverVerdict>,
    manual_entries: HashMap<SheetId, ManualEntry>,
    reconciliations: HashMap<SheetId, Reconciliation>,
    scores: HashMap<SheetId, ScoreResult>,
    interventions: HashMap<InterventionId, InterventionItem>,
    journal: HashMap<Uuid, PendingTransition>,
}

/// In-memory store. Not durable; intended for tests.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables.read().expect("store lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().expect("store lock poisoned")
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn put_question_paper(&self, paper: QuestionPaper) -> Result<(), StorageError> {
        self.write().papers.insert(paper.id, paper);
        Ok(())
    }

    async fn get_question_paper(&self, id: PaperId) -> Result<Option<QuestionPaper>, StorageError> {
        Ok(self.read().papers.get(&id).cloned())
    }

    async fn put_answer_key(&self, key: AnswerKey) -> Result<(), StorageError> {
        self.write().answer_keys.insert(key.id, key);
        Ok(())
    }

    async fn get_answer_key(&self, id: AnswerKeyId) -> Result<Option<AnswerKey>, StorageError> {
        Ok(self.read().answer_keys.get(&id).cloned())
    }

    async fn get_answer_key_by_paper(
        &self,
        paper_id: PaperId,
    ) -> Result<Option<AnswerKey>, StorageError> {
        Ok(self
            .read()
            .answer_keys
            .values()
            .find(|k| k.paper_id == paper_id)
            .cloned())
    }

    async fn put_sheet(&self, sheet: Sheet) -> Result<(), StorageError> {
        self.write().sheets.insert(sheet.id, sheet);
        Ok(())
    }

    async fn get_sheet_bundle(&self, id: SheetId) -> Result<SheetBundle, StorageError> {
        let tables = self.read();
        Ok(SheetBundle {
            sheet: tables.sheets.get(&id).cloned(),
            quality: tables.quality.get(&id).cloned(),
            bubbles: tables.bubbles.get(&id).cloned(),
            ai_verdict: tables.ai_verdicts.get(&id).cloned(),
            manual_entry: tables.manual_entries.get(&id).cloned(),
            reconciliation: tables.reconciliations.get(&id).cloned(),
            score: tables.scores.get(&id).cloned(),
            interventions: tables
                .interventions
                .values()
                .filter(|i| matches!(&i.entity_ref, shared_types::InterventionRef::Sheet(sid) if *sid == id))
                .cloned()
                .collect(),
        })
    }

    async fn list_sheets_in_stage(&self, stage: SheetStage) -> Result<Vec<Sheet>, StorageError> {
        Ok(self
            .read()
            .sheets
            .values()
            .filter(|s| s.stage == stage)
            .cloned()
            .collect())
    }

    async fn put_quality_record(&self, record: QualityRecord) -> Result<(), StorageError> {
        self.write().quality.insert(record.sheet_id, record);
        Ok(())
    }

    async fn put_bubble_reading(&self, reading: BubbleReading) -> Result<(), StorageError> {
        self.write().bubbles.insert(reading.sheet_id, reading);
        Ok(())
    }

    async fn put_ai_solver_verdict(&self, verdict: AISolverVerdict) -> Result<(), StorageError> {
        self.write().ai_verdicts.insert(verdict.sheet_id, verdict);
        Ok(())
    }

    async fn put_manual_entry(&self, entry: ManualEntry) -> Result<(), StorageError> {
        self.write().manual_entries.insert(entry.sheet_id, entry);
        Ok(())
    }

    async fn put_reconciliation(&self, reconciliation: Reconciliation) -> Result<(), StorageError> {
        self.write()
            .reconciliations
            .insert(reconciliation.sheet_id, reconciliation);
        Ok(())
    }

    async fn put_score_result(&self, score: ScoreResult) -> Result<(), StorageError> {
        self.write().scores.insert(score.sheet_id, score);
        Ok(())
    }

    async fn put_intervention(&self, item: InterventionItem) -> Result<(), StorageError> {
        self.write().interventions.insert(item.id, item);
        Ok(())
    }

    async fn compare_and_swap_intervention(
        &self,
        id: InterventionId,
        expected_status: InterventionStatus,
        item: InterventionItem,
    ) -> Result<bool, StorageError> {
        let mut tables = self.write();
        match tables.interventions.get(&id) {
            Some(current) if current.status == expected_status => {
                tables.interventions.insert(id, item);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_intervention(
        &self,
        id: InterventionId,
    ) -> Result<Option<InterventionItem>, StorageError> {
        Ok(self.read().interventions.get(&id).cloned())
    }

    async fn list_interventions(
        &self,
        status: Option<InterventionStatus>,
        priority: Option<InterventionPriority>,
        assignee: Option<&str>,
    ) -> Result<Vec<InterventionItem>, StorageError> {
        Ok(self
            .read()
            .interventions
            .values()
            .filter(|i| status.map(|s| s == i.status).unwrap_or(true))
            .filter(|i| priority.map(|p| p == i.priority).unwrap_or(true))
            .filter(|i| {
                assignee
                    .map(|a| i.assignee.as_deref() == Some(a))
                    .unwrap_or(true)
            })
            .cloned()
            .collect())
    }

    async fn has_open_intervention_for_sheet(&self, sheet_id: SheetId) -> Result<bool, StorageError> {
        Ok(self.read().interventions.values().any(|i| {
            matches!(&i.entity_ref, shared_types::InterventionRef::Sheet(sid) if *sid == sheet_id)
                && matches!(
                    i.status,
                    InterventionStatus::Open | InterventionStatus::Claimed
                )
        }))
    }

    async fn begin_transition(&self, transition: PendingTransition) -> Result<(), StorageError> {
        self.write().journal.insert(transition.id, transition);
        Ok(())
    }

    async fn commit_transition(&self, id: Uuid) -> Result<(), StorageError> {
        self.write().journal.remove(&id);
        Ok(())
    }

    async fn pending_transitions(&self) -> Result<Vec<PendingTransition>, StorageError> {
        Ok(self.read().journal.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use time::OffsetDateTime;

    fn sheet(stage: SheetStage) -> Sheet {
        Sheet {
            id: SheetId::new(),
            exam_id: "exam-1".into(),
            roll_number: "R001".into(),
            source_image_hash: [0u8; 32],
            reconstructed_image_hash: None,
            stage,
            last_block_hash: [0u8; 32],
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn test_put_and_get_sheet_bundle() {
        let store = InMemoryStore::new();
        let s = sheet(SheetStage::Ingested);
        let id = s.id;
        store.put_sheet(s).await.unwrap();

        let bundle = store.get_sheet_bundle(id).await.unwrap();
        assert!(bundle.sheet.is_some());
        assert!(bundle.quality.is_none());
    }

    #[tokio::test]
    async fn test_list_sheets_in_stage() {
        let store = InMemoryStore::new();
        store.put_sheet(sheet(SheetStage::Ingested)).await.unwrap();
        store
            .put_sheet(sheet(SheetStage::QualityAssessed))
            .await
            .unwrap();

        let ingested = store.list_sheets_in_stage(SheetStage::Ingested).await.unwrap();
        assert_eq!(ingested.len(), 1);
    }

    #[tokio::test]
    async fn test_journal_roundtrip() {
        let store = InMemoryStore::new();
        let pending = PendingTransition::new("test", serde_json::json!({}), serde_json::json!({}));
        let id = pending.id;

        store.begin_transition(pending).await.unwrap();
        assert_eq!(store.pending_transitions().await.unwrap().len(), 1);

        store.commit_transition(id).await.unwrap();
        assert_eq!(store.pending_transitions().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_answer_key_marks_is_decimal() {
        let paper_id = PaperId::new();
        let key = AnswerKey {
            id: AnswerKeyId::new(),
            paper_id,
            entries: Default::default(),
            flags: Default::default(),
            status: shared_types::AnswerKeyStatus::Draft,
            last_block_hash: [0u8; 32],
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        };
        let store = InMemoryStore::new();
        store.put_answer_key(key).await.unwrap();

        let found = store.get_answer_key_by_paper(paper_id).await.unwrap();
        assert!(found.is_some());
        let _ = Decimal::new(1, 0);
    }

    fn intervention(status: InterventionStatus) -> InterventionItem {
        InterventionItem {
            id: InterventionId::new(),
            entity_ref: shared_types::InterventionRef::Sheet(SheetId::new()),
            reason: shared_types::InterventionReason::LowConfidence,
            priority: InterventionPriority::Normal,
            status,
            assignee: None,
            resolution_note: None,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn test_compare_and_swap_intervention_rejects_stale_expectation() {
        let store = InMemoryStore::new();
        let item = intervention(InterventionStatus::Open);
        let id = item.id;
        store.put_intervention(item.clone()).await.unwrap();

        let mut claimed = item.clone();
        claimed.status = InterventionStatus::Claimed;
        let won = store
            .compare_and_swap_intervention(id, InterventionStatus::Open, claimed.clone())
            .await
            .unwrap();
        assert!(won, "first swap against the observed status must apply");

        // A second caller racing the same transition with the same stale
        // `Open` expectation must lose, not silently overwrite the winner.
        let mut also_claimed = item;
        also_claimed.status = InterventionStatus::Claimed;
        also_claimed.assignee = Some("grader-2".into());
        let lost = store
            .compare_and_swap_intervention(id, InterventionStatus::Open, also_claimed)
            .await
            .unwrap();
        assert!(!lost, "second swap against a stale expectation must not apply");

        let persisted = store.get_intervention(id).await.unwrap().unwrap();
        assert_eq!(persisted.status, InterventionStatus::Claimed);
        assert_eq!(persisted.assignee, claimed.assignee);
    }
}
