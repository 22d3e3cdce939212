//! The per-sheet pipeline driver (§4.6).
//!
//! Dependencies are wired as trait objects (`Arc<dyn Store>`, `Arc<dyn
//! QualityAssessor>`, ...) rather than generic parameters, unlike
//! `omr_ledger::LedgerService<S: ChainStore>`'s pure-generic style: an
//! orchestrator sitting on top of seven port traits makes a generic
//! parameter list unwieldy, and runtime wiring in `omr-runtime` is
//! simpler against object-safe traits. The ledger is additionally behind
//! a `tokio::sync::Mutex` since `LedgerApi::append` takes `&mut self` and
//! the ledger is this system's single serialization point (§5).
//!
//! Concurrency bound: one `tokio::sync::Semaphore` permit per in-flight
//! stage execution, sized to `OrchestratorConfig::worker_permits`
//! (default 4x CPU cores), the async equivalent of §5's "thread pool or
//! goroutine pool of size W". A per-sheet `tokio::sync::Mutex` registry
//! ensures at most one stage runs per sheet at a time; it is acquired
//! fresh per call and never held across a human gate.
//!
//! The `FINALIZED` multi-signature gate is not reimplemented here: it is
//! delegated entirely to `omr_ledger::LedgerService`'s existing
//! `SignaturePolicy` check inside `append`, which already rejects a
//! `RESULT_FINALIZED` block with `ChainError::SignatureInsufficient` when
//! fewer than three distinct signer kinds are attached.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared_crypto::blake3_hash;
use shared_types::{
    AnswerKey, AnswerKeyEntry, AnswerKeyId, AnswerKeyStatus, BlockKind, BlockSignature,
    BubbleReading, InterventionId, InterventionPriority, InterventionReason, InterventionRef,
    ManualEntry, PaperId, PayloadEntry, QualityDecision, QualityRecord, QuestionPaper,
    Reconciliation, ScoreResult, Sheet, SheetId, SheetStage, SolverAnswer, AISolverVerdict,
};
use time::OffsetDateTime;
use tokio::sync::{Mutex as AsyncMutex, Semaphore};

use omr_adapters::{AnswerKeyVerifier, GatewayError, QualityAssessor, QuestionSolver, Reconstructor};
use omr_ledger::{ChainError, LedgerApi};
use omr_intervention::InterventionQueue;
use omr_reconciliation::ReconciliationEngine;
use omr_store::{PendingTransition, Store};

use crate::cancellation::CancellationRegistry;
use crate::domain::errors::OrchestratorError;
use crate::domain::policy::OrchestratorConfig;
use crate::domain::scoring::{score_sheet, ScoringPolicy};
use crate::domain::stage_result::StageOutcome;
use crate::ports::inbound::{Orchestrator, WorkflowReport};

fn payload_entry(key: &str, value: &impl serde::Serialize) -> PayloadEntry {
    let bytes = serde_json::to_vec(value).expect("domain object always serializes");
    PayloadEntry {
        key: key.to_string(),
        value_hash: blake3_hash(&bytes),
    }
}

pub struct OrchestratorService {
    store: Arc<dyn Store>,
    ledger: Arc<AsyncMutex<dyn LedgerApi + Send>>,
    quality_assessor: Arc<dyn QualityAssessor>,
    reconstructor: Arc<dyn Reconstructor>,
    solver: Arc<dyn QuestionSolver>,
    key_verifier: Arc<dyn AnswerKeyVerifier>,
    reconciliation: Arc<dyn ReconciliationEngine>,
    interventions: Arc<dyn InterventionQueue>,
    cancellation: CancellationRegistry,
    sheet_locks: StdMutex<HashMap<SheetId, Arc<AsyncMutex<()>>>>,
    permits: Arc<Semaphore>,
    config: OrchestratorConfig,
    scoring_policy: ScoringPolicy,
}

impl OrchestratorService {
    pub fn new(
        store: Arc<dyn Store>,
        ledger: Arc<AsyncMutex<dyn LedgerApi + Send>>,
        quality_assessor: Arc<dyn QualityAssessor>,
        reconstructor: Arc<dyn Reconstructor>,
        solver: Arc<dyn QuestionSolver>,
        key_verifier: Arc<dyn AnswerKeyVerifier>,
        reconciliation: Arc<dyn ReconciliationEngine>,
        interventions: Arc<dyn InterventionQueue>,
        config: OrchestratorConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.worker_permits));
        Self {
            store,
            ledger,
            quality_assessor,
            reconstructor,
            solver,
            key_verifier,
            reconciliation,
            interventions,
            cancellation: CancellationRegistry::new(),
            sheet_locks: StdMutex::new(HashMap::new()),
            permits,
            config,
            scoring_policy: ScoringPolicy::default(),
        }
    }

    fn sheet_lock(&self, sheet_id: SheetId) -> Arc<AsyncMutex<()>> {
        self.sheet_locks
            .lock()
            .expect("sheet lock registry poisoned")
            .entry(sheet_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    async fn open_intervention(
        &self,
        entity_ref: InterventionRef,
        reason: InterventionReason,
        priority: InterventionPriority,
    ) -> Result<InterventionId, OrchestratorError> {
        let item = self.interventions.enqueue(entity_ref, reason, priority).await?;
        Ok(item.id)
    }

    async fn open_sheet_ids(&self, sheet_id: SheetId) -> Result<Vec<InterventionId>, OrchestratorError> {
        let all = self
            .store
            .list_interventions(Some(shared_types::InterventionStatus::Open), None, None)
            .await?;
        Ok(all
            .into_iter()
            .filter(|item| matches!(item.entity_ref, InterventionRef::Sheet(id) | InterventionRef::ReconciliationRow { sheet_id: id, .. } if id == sheet_id))
            .map(|item| item.id)
            .collect())
    }

    /// Observe cooperative cancellation, opening a `normal` intervention
    /// and resetting the token if it fired.
    async fn check_cancelled<T>(&self, sheet_id: SheetId) -> Result<Option<StageOutcome<T>>, OrchestratorError> {
        if self.cancellation.is_cancelled(sheet_id) {
            let id = self
                .open_intervention(
                    InterventionRef::Sheet(sheet_id),
                    InterventionReason::OperatorCancelled,
                    InterventionPriority::Normal,
                )
                .await?;
            self.cancellation.reset(sheet_id);
            return Ok(Some(StageOutcome::Cancelled { intervention_id: id }));
        }
        Ok(None)
    }

    /// Observe the per-sheet deadline (§5), opening a `critical`
    /// intervention on expiry. Time spent waiting on a human gate
    /// (an intervention `Open` or `Claimed` against this sheet) does not
    /// count against the budget; only the time the pipeline itself held
    /// the sheet does.
    async fn check_deadline<T>(&self, sheet: &Sheet) -> Result<Option<StageOutcome<T>>, OrchestratorError> {
        if matches!(sheet.stage, SheetStage::Finalized | SheetStage::Rejected) {
            return Ok(None);
        }
        let Ok(budget) = time::Duration::try_from(self.config.sheet_deadline) else {
            return Ok(None);
        };
        let elapsed = OffsetDateTime::now_utc() - sheet.created_at;
        let gate_wait = self.gate_wait_duration(sheet.id).await?;
        if elapsed - gate_wait > budget {
            let id = self
                .open_intervention(
                    InterventionRef::Sheet(sheet.id),
                    InterventionReason::DeadlineExceeded,
                    InterventionPriority::Critical,
                )
                .await?;
            return Ok(Some(StageOutcome::GateBlocked { intervention_ids: vec![id] }));
        }
        Ok(None)
    }

    /// Cumulative wall-clock time this sheet has spent sitting on a
    /// human gate: the span from an intervention's `created_at` to its
    /// `updated_at` if it has reached a terminal status, or to now if
    /// it is still `Open`/`Claimed`. Summed across every intervention
    /// ever raised against the sheet, since a sheet can cycle through
    /// more than one gate on its way to `FINALIZED`.
    async fn gate_wait_duration(&self, sheet_id: SheetId) -> Result<time::Duration, OrchestratorError> {
        let all = self.store.list_interventions(None, None, None).await?;
        let now = OffsetDateTime::now_utc();
        let total = all
            .into_iter()
            .filter(|item| matches!(item.entity_ref, InterventionRef::Sheet(id) | InterventionRef::ReconciliationRow { sheet_id: id, .. } if id == sheet_id))
            .map(|item| {
                let end = match item.status {
                    shared_types::InterventionStatus::Resolved | shared_types::InterventionStatus::Cancelled => item.updated_at,
                    shared_types::InterventionStatus::Open | shared_types::InterventionStatus::Claimed => now,
                };
                end - item.created_at
            })
            .fold(time::Duration::ZERO, |acc, d| acc + d);
        Ok(total)
    }

    async fn adapter_unavailable<T>(
        &self,
        entity_ref: InterventionRef,
        adapter: &'static str,
        err: GatewayError,
    ) -> Result<StageOutcome<T>, OrchestratorError> {
        let id = self
            .open_intervention(entity_ref, InterventionReason::AdapterUnavailable, InterventionPriority::Critical)
            .await?;
        Ok(StageOutcome::AdapterUnavailable {
            adapter,
            reason: err.to_string(),
            intervention_id: id,
        })
    }

    /// Record intent, append a block, and clear the journal entry. Retries
    /// `ChainStale` up to `config.ledger_contention_retries` times before
    /// surfacing `LedgerContention`.
    async fn append_block(
        &self,
        description: String,
        before: serde_json::Value,
        after: serde_json::Value,
        kind: BlockKind,
        payload: Vec<PayloadEntry>,
    ) -> Result<shared_types::LedgerBlock, OrchestratorError> {
        let pending = PendingTransition::new(description, before, after);
        self.store.begin_transition(pending.clone()).await?;

        let mut attempts = 0u32;
        let block = loop {
            let result = {
                let mut ledger = self.ledger.lock().await;
                ledger.append(kind, payload.clone(), Vec::new())
            };
            match result {
                Ok(block) => break block,
                Err(ChainError::ChainStale { .. }) if attempts < self.config.ledger_contention_retries => {
                    attempts += 1;
                    continue;
                }
                Err(ChainError::ChainStale { .. }) => {
                    return Err(OrchestratorError::LedgerContention { attempts });
                }
                Err(other) => return Err(other.into()),
            }
        };

        self.store.commit_transition(pending.id).await?;
        Ok(block)
    }
}

#[async_trait]
impl Orchestrator for OrchestratorService {
    async fn create_question_paper(
        &self,
        exam_id: String,
        subject: String,
        total_questions: u32,
        max_marks: Decimal,
        content_bytes: &[u8],
    ) -> Result<QuestionPaper, OrchestratorError> {
        let _permit = self.permits.acquire().await.expect("semaphore never closes");

        let now = OffsetDateTime::now_utc();
        let mut paper = QuestionPaper {
            id: PaperId::new(),
            exam_id,
            subject,
            total_questions,
            max_marks,
            content_hash: blake3_hash(content_bytes),
            last_block_hash: [0u8; 32],
            created_at: now,
            updated_at: now,
        };

        let after = serde_json::to_value(&paper).expect("QuestionPaper always serializes");
        let block = self
            .append_block(
                format!("paper:{} -> uploaded", paper.id),
                serde_json::Value::Null,
                after,
                BlockKind::QuestionPaperUpload,
                vec![payload_entry("paper", &paper)],
            )
            .await?;

        paper.last_block_hash = block.self_hash;
        self.store.put_question_paper(paper.clone()).await?;
        Ok(paper)
    }

    async fn submit_answer_key(
        &self,
        paper_id: PaperId,
        entries: BTreeMap<u32, AnswerKeyEntry>,
    ) -> Result<AnswerKey, OrchestratorError> {
        let now = OffsetDateTime::now_utc();
        let key = AnswerKey {
            id: AnswerKeyId::new(),
            paper_id,
            entries,
            flags: BTreeMap::new(),
            status: AnswerKeyStatus::Draft,
            last_block_hash: [0u8; 32],
            created_at: now,
            updated_at: now,
        };
        self.store.put_answer_key(key.clone()).await?;
        Ok(key)
    }

    async fn approve_answer_key(
        &self,
        key_id: AnswerKeyId,
        corrections: BTreeMap<u32, AnswerKeyEntry>,
    ) -> Result<StageOutcome<AnswerKey>, OrchestratorError> {
        let mut key = self.store.get_answer_key(key_id).await?.ok_or(OrchestratorError::KeyNotFound(key_id))?;

        if !matches!(key.status, AnswerKeyStatus::AiVerified | AnswerKeyStatus::Flagged) {
            return Ok(StageOutcome::PreconditionFailed {
                current_state: format!("{:?}", key.status),
                expected: "AI_VERIFIED or FLAGGED",
            });
        }

        let before = serde_json::to_value(&key).expect("AnswerKey always serializes");
        for (question_number, entry) in corrections {
            key.entries.insert(question_number, entry);
            key.flags.remove(&question_number);
        }
        key.status = AnswerKeyStatus::HumanApproved;
        key.updated_at = OffsetDateTime::now_utc();
        let after = serde_json::to_value(&key).expect("AnswerKey always serializes");

        let block = self
            .append_block(
                format!("key:{key_id} -> HUMAN_APPROVED"),
                before,
                after,
                BlockKind::AnswerKeyHumanApproved,
                vec![payload_entry("answer_key", &key)],
            )
            .await?;

        key.last_block_hash = block.self_hash;
        self.store.put_answer_key(key.clone()).await?;
        Ok(StageOutcome::Ok(key))
    }

    async fn lock_answer_key(
        &self,
        key_id: AnswerKeyId,
    ) -> Result<StageOutcome<AnswerKey>, OrchestratorError> {
        let mut key = self.store.get_answer_key(key_id).await?.ok_or(OrchestratorError::KeyNotFound(key_id))?;

        if key.status != AnswerKeyStatus::HumanApproved {
            return Ok(StageOutcome::PreconditionFailed {
                current_state: format!("{:?}", key.status),
                expected: "HUMAN_APPROVED",
            });
        }

        let before = serde_json::to_value(&key).expect("AnswerKey always serializes");
        key.status = AnswerKeyStatus::Locked;
        key.updated_at = OffsetDateTime::now_utc();
        let after = serde_json::to_value(&key).expect("AnswerKey always serializes");

        let block = self
            .append_block(
                format!("key:{key_id} -> LOCKED"),
                before,
                after,
                BlockKind::AnswerKeyLocked,
                vec![payload_entry("answer_key", &key)],
            )
            .await?;

        key.last_block_hash = block.self_hash;
        self.store.put_answer_key(key.clone()).await?;
        Ok(StageOutcome::Ok(key))
    }

    async fn ingest(
        &self,
        exam_id: String,
        roll_number: String,
        image_bytes: &[u8],
    ) -> Result<Sheet, OrchestratorError> {
        let _permit = self.permits.acquire().await.expect("semaphore never closes");

        let now = OffsetDateTime::now_utc();
        let mut sheet = Sheet {
            id: SheetId::new(),
            exam_id,
            roll_number,
            source_image_hash: blake3_hash(image_bytes),
            reconstructed_image_hash: None,
            stage: SheetStage::Ingested,
            last_block_hash: [0u8; 32],
            created_at: now,
            updated_at: now,
        };

        let after = serde_json::to_value(&sheet).expect("Sheet always serializes");
        let block = self
            .append_block(
                format!("sheet:{} -> INGESTED", sheet.id),
                serde_json::Value::Null,
                after,
                BlockKind::SheetIngested,
                vec![payload_entry("sheet", &sheet)],
            )
            .await?;

        sheet.last_block_hash = block.self_hash;
        self.store.put_sheet(sheet.clone()).await?;
        Ok(sheet)
    }

    async fn assess_quality(
        &self,
        sheet_id: SheetId,
        image_bytes: &[u8],
    ) -> Result<StageOutcome<Sheet>, OrchestratorError> {
        let _permit = self.permits.acquire().await.expect("semaphore never closes");
        let lock = self.sheet_lock(sheet_id);
        let _guard = lock.lock().await;

        if let Some(outcome) = self.check_cancelled(sheet_id).await? {
            return Ok(outcome);
        }

        let bundle = self.store.get_sheet_bundle(sheet_id).await?;
        let sheet = bundle.sheet.ok_or(OrchestratorError::SheetNotFound(sheet_id))?;

        if let Some(outcome) = self.check_deadline(&sheet).await? {
            return Ok(outcome);
        }
        if sheet.stage != SheetStage::Ingested {
            return Ok(StageOutcome::PreconditionFailed {
                current_state: format!("{:?}", sheet.stage),
                expected: "INGESTED",
            });
        }

        let assessment = match self.quality_assessor.assess_quality(image_bytes).await {
            Ok(a) => a,
            Err(e) => return self.adapter_unavailable(InterventionRef::Sheet(sheet_id), "quality_assessor", e).await,
        };

        if let Some(outcome) = self.check_cancelled(sheet_id).await? {
            return Ok(outcome);
        }

        let next_stage = if assessment.decision == QualityDecision::Reject {
            SheetStage::Rejected
        } else {
            SheetStage::QualityAssessed
        };

        let record = QualityRecord {
            sheet_id,
            score: assessment.score,
            damage: assessment.damage,
            decision: assessment.decision,
            reconstruction_hash: None,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        };

        let mut updated = sheet.clone();
        updated.stage = next_stage;
        updated.updated_at = OffsetDateTime::now_utc();

        let before = serde_json::to_value(&sheet).expect("Sheet always serializes");
        let after = serde_json::to_value(&updated).expect("Sheet always serializes");
        let block = self
            .append_block(
                format!("sheet:{sheet_id} -> {next_stage:?}"),
                before,
                after,
                BlockKind::QualityAssessed,
                vec![payload_entry("quality_record", &record), payload_entry("sheet", &updated)],
            )
            .await?;

        updated.last_block_hash = block.self_hash;
        self.store.put_quality_record(record).await?;
        self.store.put_sheet(updated.clone()).await?;
        Ok(StageOutcome::Ok(updated))
    }

    async fn reconstruct(
        &self,
        sheet_id: SheetId,
        damaged_image_bytes: &[u8],
        expected_rows: u32,
        expected_cols: u32,
    ) -> Result<StageOutcome<Sheet>, OrchestratorError> {
        let _permit = self.permits.acquire().await.expect("semaphore never closes");
        let lock = self.sheet_lock(sheet_id);
        let _guard = lock.lock().await;

        if let Some(outcome) = self.check_cancelled(sheet_id).await? {
            return Ok(outcome);
        }

        let bundle = self.store.get_sheet_bundle(sheet_id).await?;
        let sheet = bundle.sheet.ok_or(OrchestratorError::SheetNotFound(sheet_id))?;

        if let Some(outcome) = self.check_deadline(&sheet).await? {
            return Ok(outcome);
        }

        let reconstructable = sheet.stage == SheetStage::QualityAssessed
            && bundle.quality.as_ref().map(|q| q.decision == QualityDecision::Reconstruct).unwrap_or(false);
        if !reconstructable {
            return Ok(StageOutcome::PreconditionFailed {
                current_state: format!("{:?}", sheet.stage),
                expected: "QUALITY_ASSESSED(decision=reconstruct)",
            });
        }
        let mut quality = bundle.quality.expect("checked above");

        let result = match self
            .reconstructor
            .reconstruct(damaged_image_bytes, expected_rows, expected_cols)
            .await
        {
            Ok(r) => r,
            Err(e) => return self.adapter_unavailable(InterventionRef::Sheet(sheet_id), "reconstructor", e).await,
        };

        if let Some(outcome) = self.check_cancelled(sheet_id).await? {
            return Ok(outcome);
        }

        let reconstruction_hash = blake3_hash(&result.image_bytes);
        quality.reconstruction_hash = Some(reconstruction_hash);
        quality.updated_at = OffsetDateTime::now_utc();

        let mut updated = sheet.clone();
        updated.reconstructed_image_hash = Some(reconstruction_hash);
        updated.stage = SheetStage::Reconstructed;
        updated.updated_at = OffsetDateTime::now_utc();

        let before = serde_json::to_value(&sheet).expect("Sheet always serializes");
        let after = serde_json::to_value(&updated).expect("Sheet always serializes");
        let block = self
            .append_block(
                format!("sheet:{sheet_id} -> RECONSTRUCTED"),
                before,
                after,
                BlockKind::Reconstructed,
                vec![payload_entry("quality_record", &quality), payload_entry("sheet", &updated)],
            )
            .await?;

        updated.last_block_hash = block.self_hash;
        self.store.put_quality_record(quality).await?;
        self.store.put_sheet(updated.clone()).await?;
        Ok(StageOutcome::Ok(updated))
    }

    async fn record_bubbles(
        &self,
        sheet_id: SheetId,
        bubbles: BubbleReading,
    ) -> Result<StageOutcome<Sheet>, OrchestratorError> {
        let _permit = self.permits.acquire().await.expect("semaphore never closes");
        let lock = self.sheet_lock(sheet_id);
        let _guard = lock.lock().await;

        if let Some(outcome) = self.check_cancelled(sheet_id).await? {
            return Ok(outcome);
        }

        let bundle = self.store.get_sheet_bundle(sheet_id).await?;
        let sheet = bundle.sheet.ok_or(OrchestratorError::SheetNotFound(sheet_id))?;

        if let Some(outcome) = self.check_deadline(&sheet).await? {
            return Ok(outcome);
        }

        let ready = match sheet.stage {
            SheetStage::QualityAssessed => {
                bundle.quality.as_ref().map(|q| q.decision == QualityDecision::Proceed).unwrap_or(false)
            }
            SheetStage::Reconstructed => true,
            _ => false,
        };
        if !ready {
            return Ok(StageOutcome::PreconditionFailed {
                current_state: format!("{:?}", sheet.stage),
                expected: "QUALITY_ASSESSED(decision=proceed)|RECONSTRUCTED",
            });
        }

        let mut updated = sheet.clone();
        updated.stage = SheetStage::BubblesRead;
        updated.updated_at = OffsetDateTime::now_utc();

        let before = serde_json::to_value(&sheet).expect("Sheet always serializes");
        let after = serde_json::to_value(&updated).expect("Sheet always serializes");
        let block = self
            .append_block(
                format!("sheet:{sheet_id} -> BUBBLES_READ"),
                before,
                after,
                BlockKind::BubblesRead,
                vec![payload_entry("bubble_reading", &bubbles), payload_entry("sheet", &updated)],
            )
            .await?;

        updated.last_block_hash = block.self_hash;
        self.store.put_bubble_reading(bubbles).await?;
        self.store.put_sheet(updated.clone()).await?;
        Ok(StageOutcome::Ok(updated))
    }

    async fn ai_solve(
        &self,
        sheet_id: SheetId,
        question_bank: BTreeMap<u32, (String, String)>,
    ) -> Result<StageOutcome<Sheet>, OrchestratorError> {
        let _permit = self.permits.acquire().await.expect("semaphore never closes");
        let lock = self.sheet_lock(sheet_id);
        let _guard = lock.lock().await;

        if let Some(outcome) = self.check_cancelled(sheet_id).await? {
            return Ok(outcome);
        }

        let bundle = self.store.get_sheet_bundle(sheet_id).await?;
        let sheet = bundle.sheet.ok_or(OrchestratorError::SheetNotFound(sheet_id))?;

        if let Some(outcome) = self.check_deadline(&sheet).await? {
            return Ok(outcome);
        }
        if sheet.stage != SheetStage::BubblesRead {
            return Ok(StageOutcome::PreconditionFailed {
                current_state: format!("{:?}", sheet.stage),
                expected: "BUBBLES_READ",
            });
        }

        let mut answers = BTreeMap::new();
        for (question_number, (text, subject)) in &question_bank {
            if let Some(outcome) = self.check_cancelled(sheet_id).await? {
                return Ok(outcome);
            }
            match self.solver.solve_question(text, subject).await {
                Ok(outcome) => {
                    answers.insert(
                        *question_number,
                        SolverAnswer { answer: outcome.answer, confidence: outcome.confidence },
                    );
                }
                Err(e) => return self.adapter_unavailable(InterventionRef::Sheet(sheet_id), "question_solver", e).await,
            }
        }

        let verdict = AISolverVerdict { sheet_id, answers, created_at: OffsetDateTime::now_utc() };

        let mut updated = sheet.clone();
        updated.stage = SheetStage::AiSolved;
        updated.updated_at = OffsetDateTime::now_utc();

        let before = serde_json::to_value(&sheet).expect("Sheet always serializes");
        let after = serde_json::to_value(&updated).expect("Sheet always serializes");
        let block = self
            .append_block(
                format!("sheet:{sheet_id} -> AI_SOLVED"),
                before,
                after,
                BlockKind::AiSolved,
                vec![payload_entry("ai_solver_verdict", &verdict), payload_entry("sheet", &updated)],
            )
            .await?;

        updated.last_block_hash = block.self_hash;
        self.store.put_ai_solver_verdict(verdict).await?;
        self.store.put_sheet(updated.clone()).await?;
        Ok(StageOutcome::Ok(updated))
    }

    async fn manual_entry(
        &self,
        sheet_id: SheetId,
        entry: ManualEntry,
    ) -> Result<StageOutcome<Sheet>, OrchestratorError> {
        let _permit = self.permits.acquire().await.expect("semaphore never closes");
        let lock = self.sheet_lock(sheet_id);
        let _guard = lock.lock().await;

        if let Some(outcome) = self.check_cancelled(sheet_id).await? {
            return Ok(outcome);
        }

        let bundle = self.store.get_sheet_bundle(sheet_id).await?;
        let sheet = bundle.sheet.ok_or(OrchestratorError::SheetNotFound(sheet_id))?;

        if let Some(outcome) = self.check_deadline(&sheet).await? {
            return Ok(outcome);
        }
        if matches!(sheet.stage, SheetStage::Finalized | SheetStage::Rejected) {
            return Ok(StageOutcome::PreconditionFailed {
                current_state: format!("{:?}", sheet.stage),
                expected: "any non-terminal stage",
            });
        }

        let mut updated = sheet.clone();
        updated.stage = SheetStage::ManualEntered;
        updated.updated_at = OffsetDateTime::now_utc();

        let before = serde_json::to_value(&sheet).expect("Sheet always serializes");
        let after = serde_json::to_value(&updated).expect("Sheet always serializes");
        let block = self
            .append_block(
                format!("sheet:{sheet_id} -> MANUAL_ENTERED"),
                before,
                after,
                BlockKind::ManualEntered,
                vec![payload_entry("manual_entry", &entry), payload_entry("sheet", &updated)],
            )
            .await?;

        updated.last_block_hash = block.self_hash;
        self.store.put_manual_entry(entry).await?;
        self.store.put_sheet(updated.clone()).await?;
        Ok(StageOutcome::Ok(updated))
    }

    async fn reconcile(
        &self,
        sheet_id: SheetId,
        paper_id: PaperId,
    ) -> Result<StageOutcome<Reconciliation>, OrchestratorError> {
        let _permit = self.permits.acquire().await.expect("semaphore never closes");
        let lock = self.sheet_lock(sheet_id);
        let _guard = lock.lock().await;

        if let Some(outcome) = self.check_cancelled(sheet_id).await? {
            return Ok(outcome);
        }

        let bundle = self.store.get_sheet_bundle(sheet_id).await?;
        let sheet = bundle.sheet.ok_or(OrchestratorError::SheetNotFound(sheet_id))?;

        if let Some(outcome) = self.check_deadline(&sheet).await? {
            return Ok(outcome);
        }
        if !matches!(sheet.stage, SheetStage::BubblesRead | SheetStage::AiSolved | SheetStage::ManualEntered) {
            return Ok(StageOutcome::PreconditionFailed {
                current_state: format!("{:?}", sheet.stage),
                expected: "BUBBLES_READ|AI_SOLVED|MANUAL_ENTERED",
            });
        }
        let Some(bubbles) = bundle.bubbles.clone() else {
            return Ok(StageOutcome::PreconditionFailed {
                current_state: format!("{:?}", sheet.stage),
                expected: "bubble reading present",
            });
        };
        if bundle.ai_verdict.is_none() && bundle.manual_entry.is_none() {
            return Ok(StageOutcome::PreconditionFailed {
                current_state: format!("{:?}", sheet.stage),
                expected: "AI_SOLVED or MANUAL_ENTERED present",
            });
        }
        let Some(key) = self.store.get_answer_key_by_paper(paper_id).await? else {
            return Ok(StageOutcome::PreconditionFailed {
                current_state: "no answer key".to_string(),
                expected: "answer key exists for paper",
            });
        };

        let outcome = self.reconciliation.reconcile(
            sheet_id,
            &bubbles,
            bundle.ai_verdict.as_ref(),
            bundle.manual_entry.as_ref(),
            &key,
        );

        for pending in &outcome.interventions {
            self.open_intervention(
                InterventionRef::ReconciliationRow { sheet_id, question_number: pending.question_number },
                pending.trigger.reason,
                pending.trigger.priority,
            )
            .await?;
        }

        let mut updated = sheet.clone();
        updated.stage = SheetStage::Reconciled;
        updated.updated_at = OffsetDateTime::now_utc();

        let before = serde_json::to_value(&sheet).expect("Sheet always serializes");
        let after = serde_json::to_value(&updated).expect("Sheet always serializes");
        let block = self
            .append_block(
                format!("sheet:{sheet_id} -> RECONCILED"),
                before,
                after,
                BlockKind::Reconciled,
                vec![payload_entry("reconciliation", &outcome.reconciliation), payload_entry("sheet", &updated)],
            )
            .await?;

        updated.last_block_hash = block.self_hash;
        self.store.put_reconciliation(outcome.reconciliation.clone()).await?;
        self.store.put_sheet(updated).await?;
        Ok(StageOutcome::Ok(outcome.reconciliation))
    }

    async fn score(
        &self,
        sheet_id: SheetId,
        paper_id: PaperId,
        manual_marks: Option<Decimal>,
    ) -> Result<StageOutcome<ScoreResult>, OrchestratorError> {
        let _permit = self.permits.acquire().await.expect("semaphore never closes");
        let lock = self.sheet_lock(sheet_id);
        let _guard = lock.lock().await;

        if let Some(outcome) = self.check_cancelled(sheet_id).await? {
            return Ok(outcome);
        }

        let bundle = self.store.get_sheet_bundle(sheet_id).await?;
        let sheet = bundle.sheet.ok_or(OrchestratorError::SheetNotFound(sheet_id))?;

        if let Some(outcome) = self.check_deadline(&sheet).await? {
            return Ok(outcome);
        }
        if sheet.stage != SheetStage::Reconciled {
            return Ok(StageOutcome::PreconditionFailed {
                current_state: format!("{:?}", sheet.stage),
                expected: "RECONCILED",
            });
        }

        let open_ids = self.open_sheet_ids(sheet_id).await?;
        if !open_ids.is_empty() {
            return Ok(StageOutcome::GateBlocked { intervention_ids: open_ids });
        }

        let Some(key) = self.store.get_answer_key_by_paper(paper_id).await? else {
            return Ok(StageOutcome::PreconditionFailed {
                current_state: "no answer key".to_string(),
                expected: "answer key exists for paper",
            });
        };
        if key.status != AnswerKeyStatus::Locked {
            return Ok(StageOutcome::PreconditionFailed {
                current_state: format!("{:?}", key.status),
                expected: "LOCKED",
            });
        }

        let reconciliation = bundle.reconciliation.ok_or_else(|| {
            OrchestratorError::Storage(shared_types::StorageError::DataCorruption(format!(
                "sheet {sheet_id} is RECONCILED but has no stored reconciliation"
            )))
        })?;
        let bubbles = bundle.bubbles.ok_or_else(|| {
            OrchestratorError::Storage(shared_types::StorageError::DataCorruption(format!(
                "sheet {sheet_id} is RECONCILED but has no stored bubble reading"
            )))
        })?;
        let quality = bundle.quality.ok_or_else(|| {
            OrchestratorError::Storage(shared_types::StorageError::DataCorruption(format!(
                "sheet {sheet_id} is RECONCILED but has no stored quality record"
            )))
        })?;

        let result = score_sheet(
            sheet_id,
            &reconciliation,
            &bubbles,
            &quality,
            &key,
            manual_marks,
            false,
            &self.scoring_policy,
        );

        let mut updated = sheet.clone();
        updated.stage = SheetStage::Scored;
        updated.updated_at = OffsetDateTime::now_utc();

        let before = serde_json::to_value(&sheet).expect("Sheet always serializes");
        let after = serde_json::to_value(&updated).expect("Sheet always serializes");
        let block = self
            .append_block(
                format!("sheet:{sheet_id} -> SCORED"),
                before,
                after,
                BlockKind::Scored,
                vec![payload_entry("score_result", &result), payload_entry("sheet", &updated)],
            )
            .await?;

        updated.last_block_hash = block.self_hash;
        self.store.put_score_result(result.clone()).await?;
        self.store.put_sheet(updated).await?;
        Ok(StageOutcome::Ok(result))
    }

    async fn finalize(
        &self,
        sheet_id: SheetId,
        signatures: Vec<BlockSignature>,
    ) -> Result<StageOutcome<Sheet>, OrchestratorError> {
        let _permit = self.permits.acquire().await.expect("semaphore never closes");
        let lock = self.sheet_lock(sheet_id);
        let _guard = lock.lock().await;

        if let Some(outcome) = self.check_cancelled(sheet_id).await? {
            return Ok(outcome);
        }

        let bundle = self.store.get_sheet_bundle(sheet_id).await?;
        let sheet = bundle.sheet.ok_or(OrchestratorError::SheetNotFound(sheet_id))?;

        if let Some(outcome) = self.check_deadline(&sheet).await? {
            return Ok(outcome);
        }
        if sheet.stage != SheetStage::Scored {
            return Ok(StageOutcome::PreconditionFailed {
                current_state: format!("{:?}", sheet.stage),
                expected: "SCORED",
            });
        }

        let open_ids = self.open_sheet_ids(sheet_id).await?;
        if !open_ids.is_empty() {
            return Ok(StageOutcome::GateBlocked { intervention_ids: open_ids });
        }

        // The payload signers attest to is built from `sheet` as it already
        // stood after `SCORED` plus the one bit a caller always knows it is
        // requesting (stage -> FINALIZED), never from a value assigned
        // during this call: a signature collected before the request was
        // sent could never cover a wall-clock timestamp this call hasn't
        // taken yet. `updated_at` is only bumped on the copy persisted
        // after the ledger accepts the block.
        let mut signable_snapshot = sheet.clone();
        signable_snapshot.stage = SheetStage::Finalized;
        let payload = vec![payload_entry("sheet", &signable_snapshot)];

        let mut updated = signable_snapshot.clone();
        updated.updated_at = OffsetDateTime::now_utc();

        let before = serde_json::to_value(&sheet).expect("Sheet always serializes");
        let after = serde_json::to_value(&updated).expect("Sheet always serializes");
        let pending = PendingTransition::new(format!("sheet:{sheet_id} -> FINALIZED"), before, after);
        self.store.begin_transition(pending.clone()).await?;

        let append_result = {
            let mut ledger = self.ledger.lock().await;
            ledger.append(BlockKind::ResultFinalized, payload, signatures)
        };

        let block = match append_result {
            Ok(block) => block,
            Err(ChainError::SignatureInsufficient { present, required }) => {
                // Nothing was mutated; the journal entry can be cleared
                // as if it never happened.
                self.store.commit_transition(pending.id).await?;
                return Ok(StageOutcome::SignatureInsufficient { present, required });
            }
            Err(other) => return Err(other.into()),
        };

        self.store.commit_transition(pending.id).await?;

        updated.last_block_hash = block.self_hash;
        self.store.put_sheet(updated.clone()).await?;
        Ok(StageOutcome::Ok(updated))
    }

    fn cancel(&self, sheet_id: SheetId) {
        self.cancellation.cancel(sheet_id);
    }

    async fn workflow_complete(
        &self,
        sheet_id: SheetId,
        paper_id: PaperId,
    ) -> Result<WorkflowReport, OrchestratorError> {
        let mut opened = Vec::new();

        loop {
            let bundle = self.store.get_sheet_bundle(sheet_id).await?;
            let sheet = bundle.sheet.as_ref().ok_or(OrchestratorError::SheetNotFound(sheet_id))?;

            match sheet.stage {
                SheetStage::BubblesRead | SheetStage::AiSolved | SheetStage::ManualEntered => {
                    match self.reconcile(sheet_id, paper_id).await? {
                        StageOutcome::Ok(_) => continue,
                        StageOutcome::GateBlocked { intervention_ids } => {
                            opened.extend(intervention_ids);
                            break;
                        }
                        StageOutcome::Cancelled { intervention_id } => {
                            opened.push(intervention_id);
                            break;
                        }
                        StageOutcome::AdapterUnavailable { intervention_id, .. } => {
                            opened.push(intervention_id);
                            break;
                        }
                        StageOutcome::PreconditionFailed { .. }
                        | StageOutcome::SignatureInsufficient { .. } => break,
                    }
                }
                SheetStage::Reconciled => {
                    match self.score(sheet_id, paper_id, None).await? {
                        StageOutcome::Ok(_) => continue,
                        StageOutcome::GateBlocked { intervention_ids } => {
                            opened.extend(intervention_ids);
                            break;
                        }
                        StageOutcome::Cancelled { intervention_id } => {
                            opened.push(intervention_id);
                            break;
                        }
                        StageOutcome::AdapterUnavailable { intervention_id, .. } => {
                            opened.push(intervention_id);
                            break;
                        }
                        StageOutcome::PreconditionFailed { .. }
                        | StageOutcome::SignatureInsufficient { .. } => break,
                    }
                }
                _ => break,
            }
        }

        let final_bundle = self.store.get_sheet_bundle(sheet_id).await?;
        let stage = final_bundle.sheet.ok_or(OrchestratorError::SheetNotFound(sheet_id))?.stage;

        Ok(WorkflowReport { sheet_id, stage, opened_interventions: opened })
    }

    async fn verify_answer_key(
        &self,
        key_id: AnswerKeyId,
    ) -> Result<StageOutcome<shared_types::AnswerKey>, OrchestratorError> {
        let mut key = self.store.get_answer_key(key_id).await?.ok_or(OrchestratorError::KeyNotFound(key_id))?;

        if key.status != AnswerKeyStatus::Draft {
            return Ok(StageOutcome::PreconditionFailed {
                current_state: format!("{:?}", key.status),
                expected: "DRAFT",
            });
        }

        let mut flags = BTreeMap::new();
        for (question_number, entry) in &key.entries {
            let verdict = match self
                .key_verifier
                .verify_answer_key(&format!("question {question_number}"), &entry.expected_answer)
                .await
            {
                Ok(v) => v,
                Err(e) => {
                    return self.adapter_unavailable(InterventionRef::AnswerKey(key_id), "answer_key_verifier", e).await
                }
            };

            if !verdict.agrees {
                flags.insert(
                    *question_number,
                    shared_types::AnswerKeyFlag { confidence: verdict.confidence, notes: verdict.notes },
                );
                self.open_intervention(
                    InterventionRef::AnswerKey(key_id),
                    InterventionReason::AnswerKeyFlagged,
                    InterventionPriority::Normal,
                )
                .await?;
            }
        }

        key.flags = flags;
        key.status = if key.flags.is_empty() { AnswerKeyStatus::AiVerified } else { AnswerKeyStatus::Flagged };
        key.updated_at = OffsetDateTime::now_utc();
        self.store.put_answer_key(key.clone()).await?;
        Ok(StageOutcome::Ok(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omr_adapters::{FakeAnswerKeyVerifier, FakeQualityAssessor, FakeQuestionSolver, FakeReconstructor};
    use omr_intervention::InterventionService;
    use omr_ledger::{InMemoryChainStore, LedgerConfig, LedgerService, SignaturePolicy};
    use omr_reconciliation::ReconciliationService;
    use omr_store::InMemoryStore;
    use shared_types::{AnswerKey, AnswerKeyEntry, BubbleDetection, DetectedAnswer, QuestionPaper};

    fn harness() -> (OrchestratorService, Arc<dyn Store>) {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let ledger = Arc::new(AsyncMutex::new(LedgerService::new(
            InMemoryChainStore::new(),
            SignaturePolicy::default(),
            LedgerConfig::default(),
        )));
        let interventions: Arc<dyn InterventionQueue> = Arc::new(InterventionService::new(store.clone()));
        let svc = OrchestratorService::new(
            store.clone(),
            ledger,
            Arc::new(FakeQualityAssessor::always_proceed()),
            Arc::new(FakeReconstructor::scripted(vec![])),
            Arc::new(FakeQuestionSolver::scripted(vec![])),
            Arc::new(FakeAnswerKeyVerifier::scripted(vec![])),
            Arc::new(ReconciliationService::new(Default::default())),
            interventions,
            OrchestratorConfig::default(),
        );
        (svc, store)
    }

    async fn locked_key(store: &Arc<dyn Store>, paper_id: PaperId, answer: &str) -> AnswerKeyId {
        let paper = QuestionPaper {
            id: paper_id,
            exam_id: "exam-1".into(),
            subject: "math".into(),
            total_questions: 1,
            max_marks: Decimal::TWO,
            content_hash: [0u8; 32],
            last_block_hash: [0u8; 32],
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        };
        store.put_question_paper(paper).await.unwrap();

        let key = AnswerKey {
            id: AnswerKeyId::new(),
            paper_id,
            entries: BTreeMap::from([(1, AnswerKeyEntry { expected_answer: answer.to_string(), marks: Decimal::TWO })]),
            flags: BTreeMap::new(),
            status: AnswerKeyStatus::Locked,
            last_block_hash: [0u8; 32],
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        };
        let id = key.id;
        store.put_answer_key(key).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_ingest_creates_sheet_in_ingested_stage() {
        let (svc, _store) = harness();
        let sheet = svc.ingest("exam-1".into(), "roll-1".into(), b"image bytes").await.unwrap();
        assert_eq!(sheet.stage, SheetStage::Ingested);
        assert_ne!(sheet.last_block_hash, [0u8; 32]);
    }

    #[tokio::test]
    async fn test_create_question_paper_appends_upload_block() {
        let (svc, _store) = harness();
        let paper = svc
            .create_question_paper("exam-1".into(), "math".into(), 10, Decimal::new(100, 0), b"paper bytes")
            .await
            .unwrap();
        assert_eq!(paper.total_questions, 10);
        assert_ne!(paper.last_block_hash, [0u8; 32]);
    }

    #[tokio::test]
    async fn test_answer_key_lifecycle_draft_to_locked() {
        let (svc, _store) = harness();
        let paper = svc
            .create_question_paper("exam-1".into(), "math".into(), 1, Decimal::TWO, b"paper bytes")
            .await
            .unwrap();

        let entries = BTreeMap::from([(1, AnswerKeyEntry { expected_answer: "A".into(), marks: Decimal::TWO })]);
        let key = svc.submit_answer_key(paper.id, entries).await.unwrap();
        assert_eq!(key.status, AnswerKeyStatus::Draft);

        // approve is guarded: a draft key cannot be approved directly.
        let rejected = svc.approve_answer_key(key.id, BTreeMap::new()).await.unwrap();
        assert!(matches!(rejected, StageOutcome::PreconditionFailed { .. }));

        // simulate AI verification having run.
        let mut verified = svc.store.get_answer_key(key.id).await.unwrap().unwrap();
        verified.status = AnswerKeyStatus::AiVerified;
        svc.store.put_answer_key(verified).await.unwrap();

        let approved = svc.approve_answer_key(key.id, BTreeMap::new()).await.unwrap().into_ok().unwrap();
        assert_eq!(approved.status, AnswerKeyStatus::HumanApproved);

        let locked = svc.lock_answer_key(key.id).await.unwrap().into_ok().unwrap();
        assert_eq!(locked.status, AnswerKeyStatus::Locked);
    }

    #[tokio::test]
    async fn test_assess_quality_advances_to_quality_assessed() {
        let (svc, _store) = harness();
        let sheet = svc.ingest("exam-1".into(), "roll-1".into(), b"bytes").await.unwrap();

        let outcome = svc.assess_quality(sheet.id, b"bytes").await.unwrap();
        let updated = outcome.into_ok().expect("quality assessor always proceeds");
        assert_eq!(updated.stage, SheetStage::QualityAssessed);
    }

    #[tokio::test]
    async fn test_assess_quality_rejects_wrong_stage() {
        let (svc, _store) = harness();
        let sheet = svc.ingest("exam-1".into(), "roll-1".into(), b"bytes").await.unwrap();
        svc.assess_quality(sheet.id, b"bytes").await.unwrap();

        let outcome = svc.assess_quality(sheet.id, b"bytes").await.unwrap();
        assert!(matches!(outcome, StageOutcome::PreconditionFailed { .. }));
    }

    #[tokio::test]
    async fn test_full_pipeline_reaches_scored() {
        let (svc, store) = harness();
        let paper_id = PaperId::new();
        locked_key(&store, paper_id, "A").await;

        let sheet = svc.ingest("exam-1".into(), "roll-1".into(), b"bytes").await.unwrap();
        svc.assess_quality(sheet.id, b"bytes").await.unwrap().into_ok().unwrap();

        let bubbles = BubbleReading {
            sheet_id: sheet.id,
            answers: BTreeMap::from([(
                1,
                BubbleDetection { detected_answer: DetectedAnswer::Option("A".into()), confidence: Decimal::new(95, 2) },
            )]),
            created_at: OffsetDateTime::now_utc(),
        };
        svc.record_bubbles(sheet.id, bubbles).await.unwrap().into_ok().unwrap();

        let manual = ManualEntry {
            sheet_id: sheet.id,
            answers: BTreeMap::from([(1, "A".to_string())]),
            entered_by: "grader-1".into(),
            entered_at: OffsetDateTime::now_utc(),
        };
        svc.manual_entry(sheet.id, manual).await.unwrap().into_ok().unwrap();

        let reconciliation = svc.reconcile(sheet.id, paper_id).await.unwrap().into_ok().expect("sources agree");
        assert_eq!(reconciliation.questions[&1].r#final, Some("A".to_string()));

        let result = svc.score(sheet.id, paper_id, None).await.unwrap().into_ok().expect("no open intervention");
        assert!(result.is_perfect_evaluation);
        assert_eq!(result.automated_marks, Decimal::TWO);
    }

    #[tokio::test]
    async fn test_finalize_without_signatures_is_signature_insufficient() {
        let (svc, store) = harness();
        let paper_id = PaperId::new();
        locked_key(&store, paper_id, "A").await;

        let sheet = svc.ingest("exam-1".into(), "roll-1".into(), b"bytes").await.unwrap();
        svc.assess_quality(sheet.id, b"bytes").await.unwrap().into_ok().unwrap();
        let bubbles = BubbleReading {
            sheet_id: sheet.id,
            answers: BTreeMap::from([(
                1,
                BubbleDetection { detected_answer: DetectedAnswer::Option("A".into()), confidence: Decimal::new(95, 2) },
            )]),
            created_at: OffsetDateTime::now_utc(),
        };
        svc.record_bubbles(sheet.id, bubbles).await.unwrap().into_ok().unwrap();
        let manual = ManualEntry {
            sheet_id: sheet.id,
            answers: BTreeMap::from([(1, "A".to_string())]),
            entered_by: "grader-1".into(),
            entered_at: OffsetDateTime::now_utc(),
        };
        svc.manual_entry(sheet.id, manual).await.unwrap().into_ok().unwrap();
        svc.reconcile(sheet.id, paper_id).await.unwrap().into_ok().unwrap();
        svc.score(sheet.id, paper_id, None).await.unwrap().into_ok().unwrap();

        let outcome = svc.finalize(sheet.id, vec![]).await.unwrap();
        assert!(matches!(outcome, StageOutcome::SignatureInsufficient { present: 0, required: 3 }));
    }

    #[tokio::test]
    async fn test_score_blocked_by_open_intervention() {
        let (svc, store) = harness();
        let paper_id = PaperId::new();
        locked_key(&store, paper_id, "A").await;

        let sheet = svc.ingest("exam-1".into(), "roll-1".into(), b"bytes").await.unwrap();
        svc.assess_quality(sheet.id, b"bytes").await.unwrap().into_ok().unwrap();

        // Bubble disagrees with manual and there is no AI verdict; low
        // confidence plus disagreement forces a reconciliation dispute.
        let bubbles = BubbleReading {
            sheet_id: sheet.id,
            answers: BTreeMap::from([(
                1,
                BubbleDetection { detected_answer: DetectedAnswer::Option("B".into()), confidence: Decimal::new(50, 2) },
            )]),
            created_at: OffsetDateTime::now_utc(),
        };
        svc.record_bubbles(sheet.id, bubbles).await.unwrap().into_ok().unwrap();
        let manual = ManualEntry {
            sheet_id: sheet.id,
            answers: BTreeMap::from([(1, "A".to_string())]),
            entered_by: "grader-1".into(),
            entered_at: OffsetDateTime::now_utc(),
        };
        svc.manual_entry(sheet.id, manual).await.unwrap().into_ok().unwrap();
        svc.reconcile(sheet.id, paper_id).await.unwrap().into_ok().unwrap();

        let outcome = svc.score(sheet.id, paper_id, None).await.unwrap();
        assert!(matches!(outcome, StageOutcome::GateBlocked { .. }));
    }

    #[tokio::test]
    async fn test_cancel_is_observed_on_next_stage_call() {
        let (svc, _store) = harness();
        let sheet = svc.ingest("exam-1".into(), "roll-1".into(), b"bytes").await.unwrap();

        svc.cancel(sheet.id);
        let outcome = svc.assess_quality(sheet.id, b"bytes").await.unwrap();
        assert!(matches!(outcome, StageOutcome::Cancelled { .. }));

        // The token resets after being observed, so the next call proceeds.
        let retried = svc.assess_quality(sheet.id, b"bytes").await.unwrap();
        assert!(retried.is_ok());
    }

    #[tokio::test]
    async fn test_adapter_failure_opens_critical_intervention() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let ledger = Arc::new(AsyncMutex::new(LedgerService::new(
            InMemoryChainStore::new(),
            SignaturePolicy::default(),
            LedgerConfig::default(),
        )));
        let failing = OrchestratorService::new(
            store.clone(),
            ledger,
            Arc::new(FakeQualityAssessor::scripted(vec![Err(omr_adapters::GatewayError::Permanent {
                adapter: "quality".into(),
                message: "boom".into(),
            })])),
            Arc::new(FakeReconstructor::scripted(vec![])),
            Arc::new(FakeQuestionSolver::scripted(vec![])),
            Arc::new(FakeAnswerKeyVerifier::scripted(vec![])),
            Arc::new(ReconciliationService::new(Default::default())),
            Arc::new(InterventionService::new(store.clone())),
            OrchestratorConfig::default(),
        );

        let sheet = failing.ingest("exam-1".into(), "roll-1".into(), b"bytes").await.unwrap();
        let outcome = failing.assess_quality(sheet.id, b"bytes").await.unwrap();
        match outcome {
            StageOutcome::AdapterUnavailable { adapter, intervention_id, .. } => {
                assert_eq!(adapter, "quality_assessor");
                let item = store.get_intervention(intervention_id).await.unwrap().unwrap();
                assert_eq!(item.priority, InterventionPriority::Critical);
            }
            other => panic!("expected AdapterUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_workflow_complete_drives_reconcile_and_score() {
        let (svc, store) = harness();
        let paper_id = PaperId::new();
        locked_key(&store, paper_id, "A").await;

        let sheet = svc.ingest("exam-1".into(), "roll-1".into(), b"bytes").await.unwrap();
        svc.assess_quality(sheet.id, b"bytes").await.unwrap().into_ok().unwrap();
        let bubbles = BubbleReading {
            sheet_id: sheet.id,
            answers: BTreeMap::from([(
                1,
                BubbleDetection { detected_answer: DetectedAnswer::Option("A".into()), confidence: Decimal::new(95, 2) },
            )]),
            created_at: OffsetDateTime::now_utc(),
        };
        svc.record_bubbles(sheet.id, bubbles).await.unwrap().into_ok().unwrap();
        let manual = ManualEntry {
            sheet_id: sheet.id,
            answers: BTreeMap::from([(1, "A".to_string())]),
            entered_by: "grader-1".into(),
            entered_at: OffsetDateTime::now_utc(),
        };
        svc.manual_entry(sheet.id, manual).await.unwrap().into_ok().unwrap();

        let report = svc.workflow_complete(sheet.id, paper_id).await.unwrap();
        assert_eq!(report.stage, SheetStage::Scored);
        assert!(report.opened_interventions.is_empty());
    }

    #[tokio::test]
    async fn test_deadline_exceeded_opens_critical_intervention() {
        let (svc, store) = harness();
        let sheet = svc.ingest("exam-1".into(), "roll-1".into(), b"bytes").await.unwrap();

        let mut backdated = store.get_sheet_bundle(sheet.id).await.unwrap().sheet.unwrap();
        backdated.created_at = OffsetDateTime::now_utc() - time::Duration::seconds(1_000);
        store.put_sheet(backdated).await.unwrap();

        let outcome = svc.assess_quality(sheet.id, b"bytes").await.unwrap();
        assert!(matches!(outcome, StageOutcome::GateBlocked { .. }));
    }

    #[tokio::test]
    async fn test_deadline_excludes_human_gate_wait_time() {
        let (svc, store) = harness();
        let sheet = svc.ingest("exam-1".into(), "roll-1".into(), b"bytes").await.unwrap();

        let now = OffsetDateTime::now_utc();
        let mut backdated = store.get_sheet_bundle(sheet.id).await.unwrap().sheet.unwrap();
        backdated.created_at = now - time::Duration::seconds(1_000);
        store.put_sheet(backdated).await.unwrap();

        // Most of that elapsed time was spent on a resolved gate, not on
        // the pipeline itself, so it should not count against the budget.
        let gate = shared_types::InterventionItem {
            id: InterventionId::new(),
            entity_ref: InterventionRef::Sheet(sheet.id),
            reason: InterventionReason::LowConfidence,
            priority: InterventionPriority::Normal,
            status: shared_types::InterventionStatus::Resolved,
            assignee: Some("grader-1".into()),
            resolution_note: Some("cleared".into()),
            created_at: now - time::Duration::seconds(990),
            updated_at: now - time::Duration::seconds(10),
        };
        store.put_intervention(gate).await.unwrap();

        let outcome = svc.assess_quality(sheet.id, b"bytes").await.unwrap();
        assert!(outcome.into_ok().is_some(), "gate-wait time must not count against the deadline");
    }
}
