//! # Inbound Port: the Orchestrator API (C6)
//!
//! One method per transition of the state machine in §4.6, plus the
//! `workflow/complete` driver and the answer-key/paper lifecycle
//! endpoints of §6.1 that are not part of the per-sheet state machine but
//! still produce ledger blocks: `omr-api` has no other path to the
//! ledger, so every write `omr-api` performs goes through this trait.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared_types::{
    AnswerKey, AnswerKeyEntry, AnswerKeyId, BlockSignature, BubbleReading, InterventionId,
    ManualEntry, PaperId, QuestionPaper, Reconciliation, ScoreResult, Sheet, SheetId, SheetStage,
};

use crate::domain::errors::OrchestratorError;
use crate::domain::stage_result::StageOutcome;

/// Result of driving a sheet through every stage its currently persisted
/// data allows, per the `workflow/complete` endpoint (§4.6, §6.1).
#[derive(Debug, Clone)]
pub struct WorkflowReport {
    pub sheet_id: SheetId,
    pub stage: SheetStage,
    pub opened_interventions: Vec<InterventionId>,
}

#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Create a QuestionPaper, record `content_bytes`' content hash, and
    /// append `QUESTION_PAPER_UPLOAD` (`POST /papers`).
    async fn create_question_paper(
        &self,
        exam_id: String,
        subject: String,
        total_questions: u32,
        max_marks: Decimal,
        content_bytes: &[u8],
    ) -> Result<QuestionPaper, OrchestratorError>;

    /// Submit an AnswerKey draft for `paper_id` (`POST /keys`). No guard,
    /// no ledger effect: a draft is not yet part of the audited history,
    /// matching `verify_answer_key`'s own precondition that it only
    /// operates on a key already in `DRAFT`.
    async fn submit_answer_key(
        &self,
        paper_id: PaperId,
        entries: BTreeMap<u32, AnswerKeyEntry>,
    ) -> Result<AnswerKey, OrchestratorError>;

    /// Human approval with optional per-question corrections.
    /// `AI_VERIFIED` | `FLAGGED` -> `HUMAN_APPROVED`; appends
    /// `ANSWER_KEY_HUMAN_APPROVED` (`POST /keys/{id}/approve`).
    async fn approve_answer_key(
        &self,
        key_id: AnswerKeyId,
        corrections: BTreeMap<u32, AnswerKeyEntry>,
    ) -> Result<StageOutcome<AnswerKey>, OrchestratorError>;

    /// `HUMAN_APPROVED` -> `LOCKED`; appends `ANSWER_KEY_LOCKED`
    /// (`POST /keys/{id}/lock`). A locked key is the `score` transition's
    /// other guard.
    async fn lock_answer_key(
        &self,
        key_id: AnswerKeyId,
    ) -> Result<StageOutcome<AnswerKey>, OrchestratorError>;

    /// Create a Sheet, record `image_bytes`' content hash, and append
    /// `SHEET_INGESTED`. Ingestion has no guard; it is always the first
    /// transition.
    async fn ingest(
        &self,
        exam_id: String,
        roll_number: String,
        image_bytes: &[u8],
    ) -> Result<Sheet, OrchestratorError>;

    /// `INGESTED` -> `QUALITY_ASSESSED`.
    async fn assess_quality(
        &self,
        sheet_id: SheetId,
        image_bytes: &[u8],
    ) -> Result<StageOutcome<Sheet>, OrchestratorError>;

    /// `QUALITY_ASSESSED` -> `RECONSTRUCTED`, guarded on `decision=reconstruct`.
    async fn reconstruct(
        &self,
        sheet_id: SheetId,
        damaged_image_bytes: &[u8],
        expected_rows: u32,
        expected_cols: u32,
    ) -> Result<StageOutcome<Sheet>, OrchestratorError>;

    /// `QUALITY_ASSESSED` (proceed) | `RECONSTRUCTED` -> `BUBBLES_READ`.
    /// Bubble detection itself is an external system (§4.6: "vision
    /// (external, see §6)"); this accepts its already-produced output.
    async fn record_bubbles(
        &self,
        sheet_id: SheetId,
        bubbles: BubbleReading,
    ) -> Result<StageOutcome<Sheet>, OrchestratorError>;

    /// `BUBBLES_READ` -> `AI_SOLVED`. `question_bank` supplies the
    /// question text and subject the solver needs per question; it is not
    /// part of the persisted entity model (§3 does not carry question
    /// text) and is therefore threaded in by the caller.
    async fn ai_solve(
        &self,
        sheet_id: SheetId,
        question_bank: BTreeMap<u32, (String, String)>,
    ) -> Result<StageOutcome<Sheet>, OrchestratorError>;

    /// Any non-terminal stage -> `MANUAL_ENTERED`.
    async fn manual_entry(
        &self,
        sheet_id: SheetId,
        entry: ManualEntry,
    ) -> Result<StageOutcome<Sheet>, OrchestratorError>;

    /// `BUBBLES_READ` | `AI_SOLVED` | `MANUAL_ENTERED` -> `RECONCILED`,
    /// guarded on bubbles present plus at least one of AI/manual (the
    /// reconciliation engine's contract always references the bubble).
    /// `paper_id` locates the sheet's answer key: `Sheet` carries only an
    /// `exam_id`, and the store indexes answer keys by paper, not exam, so
    /// there is no lookup path from one to the other without it.
    async fn reconcile(
        &self,
        sheet_id: SheetId,
        paper_id: PaperId,
    ) -> Result<StageOutcome<Reconciliation>, OrchestratorError>;

    /// `RECONCILED` -> `SCORED`, guarded on no open intervention and a
    /// locked key.
    async fn score(
        &self,
        sheet_id: SheetId,
        paper_id: PaperId,
        manual_marks: Option<rust_decimal::Decimal>,
    ) -> Result<StageOutcome<ScoreResult>, OrchestratorError>;

    /// `SCORED` -> `FINALIZED`, guarded on the multi-signature policy and
    /// no open intervention.
    async fn finalize(
        &self,
        sheet_id: SheetId,
        signatures: Vec<BlockSignature>,
    ) -> Result<StageOutcome<Sheet>, OrchestratorError>;

    /// Request cooperative cancellation of any in-flight stage for `sheet_id`.
    fn cancel(&self, sheet_id: SheetId);

    /// Run every stage `sheet_id`'s currently persisted data allows, until
    /// a gate requires human input. Never holds the per-sheet lock across
    /// a gate (§4.6). Only drives the stages that need no new externally
    /// supplied bytes: `reconcile` and `score`; stages requiring fresh
    /// image bytes, bubble output, or a signature set are left to their
    /// dedicated endpoints.
    async fn workflow_complete(
        &self,
        sheet_id: SheetId,
        paper_id: PaperId,
    ) -> Result<WorkflowReport, OrchestratorError>;

    /// Verify every entry of a draft answer key against an external
    /// verifier, opening interventions for disagreements (`POST
    /// /keys/{id}/verify`, §6.1). Not part of the per-sheet state machine.
    async fn verify_answer_key(
        &self,
        key_id: shared_types::AnswerKeyId,
    ) -> Result<StageOutcome<shared_types::AnswerKey>, OrchestratorError>;
}
