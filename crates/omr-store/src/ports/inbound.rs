//! # Inbound Port: the Persistent Store API (C2)
//!
//! Other components depend on this trait, never on a concrete adapter.

use async_trait::async_trait;

use shared_types::{
    AISolverVerdict, AnswerKey, AnswerKeyId, BubbleReading, InterventionItem, InterventionPriority,
    InterventionStatus, ManualEntry, PaperId, QualityRecord, QuestionPaper, Reconciliation,
    ScoreResult, Sheet, SheetId, SheetStage, StorageError,
};

use crate::domain::journal::PendingTransition;

/// A sheet together with all of its 1:1 relations, as required for
/// orchestrator decisions and API responses.
#[derive(Debug, Clone, Default)]
pub struct SheetBundle {
    pub sheet: Option<Sheet>,
    pub quality: Option<QualityRecord>,
    pub bubbles: Option<BubbleReading>,
    pub ai_verdict: Option<AISolverVerdict>,
    pub manual_entry: Option<ManualEntry>,
    pub reconciliation: Option<Reconciliation>,
    pub score: Option<ScoreResult>,
    pub interventions: Vec<InterventionItem>,
}

/// The persistent store's API: transactional CRUD over every entity in
/// §3, plus the write-ahead journal used to pair mutations with ledger
/// appends.
#[async_trait]
pub trait Store: Send + Sync {
    // -- Question papers / answer keys -------------------------------------

    async fn put_question_paper(&self, paper: QuestionPaper) -> Result<(), StorageError>;
    async fn get_question_paper(&self, id: PaperId) -> Result<Option<QuestionPaper>, StorageError>;

    async fn put_answer_key(&self, key: AnswerKey) -> Result<(), StorageError>;
    async fn get_answer_key(&self, id: AnswerKeyId) -> Result<Option<AnswerKey>, StorageError>;
    /// Look up an answer key by the paper it belongs to.
    async fn get_answer_key_by_paper(
        &self,
        paper_id: PaperId,
    ) -> Result<Option<AnswerKey>, StorageError>;

    // -- Sheets and their 1:1 relations --------------------------------------

    async fn put_sheet(&self, sheet: Sheet) -> Result<(), StorageError>;
    async fn get_sheet_bundle(&self, id: SheetId) -> Result<SheetBundle, StorageError>;
    /// List sheets currently in `stage`, for re-scheduling after restart.
    async fn list_sheets_in_stage(&self, stage: SheetStage) -> Result<Vec<Sheet>, StorageError>;

    async fn put_quality_record(&self, record: QualityRecord) -> Result<(), StorageError>;
    async fn put_bubble_reading(&self, reading: BubbleReading) -> Result<(), StorageError>;
    async fn put_ai_solver_verdict(&self, verdict: AISolverVerdict) -> Result<(), StorageError>;
    async fn put_manual_entry(&self, entry: ManualEntry) -> Result<(), StorageError>;
    async fn put_reconciliation(&self, reconciliation: Reconciliation) -> Result<(), StorageError>;
    async fn put_score_result(&self, score: ScoreResult) -> Result<(), StorageError>;

    // -- Interventions --------------------------------------------------------

    async fn put_intervention(&self, item: InterventionItem) -> Result<(), StorageError>;
    /// Replace the stored intervention with `item` only if its persisted
    /// status is still `expected_status`. Returns `true` if the swap
    /// applied, `false` if another writer already moved the row past
    /// `expected_status` (or it doesn't exist) between the caller's read
    /// and this call (the caller should re-fetch to classify the
    /// conflict). This is `claim`/`resolve`/`cancel`'s sole write path so
    /// two concurrent callers racing the same item can never both
    /// "win".
    async fn compare_and_swap_intervention(
        &self,
        id: shared_types::InterventionId,
        expected_status: InterventionStatus,
        item: InterventionItem,
    ) -> Result<bool, StorageError>;
    async fn get_intervention(
        &self,
        id: shared_types::InterventionId,
    ) -> Result<Option<InterventionItem>, StorageError>;
    /// List interventions by status, priority, and optional assignee.
    async fn list_interventions(
        &self,
        status: Option<InterventionStatus>,
        priority: Option<InterventionPriority>,
        assignee: Option<&str>,
    ) -> Result<Vec<InterventionItem>, StorageError>;
    /// Whether any open or claimed intervention references `sheet_id`.
    async fn has_open_intervention_for_sheet(&self, sheet_id: SheetId) -> Result<bool, StorageError>;

    // -- Write-ahead journal ---------------------------------------------------

    /// Record intent before mutating entity state and calling the ledger.
    async fn begin_transition(
        &self,
        transition: PendingTransition,
    ) -> Result<(), StorageError>;
    /// Clear a journal entry once its paired ledger append has committed.
    async fn commit_transition(&self, id: uuid::Uuid) -> Result<(), StorageError>;
    /// Entries left behind by a crash between mutation and append.
    async fn pending_transitions(&self) -> Result<Vec<PendingTransition>, StorageError>;
}
