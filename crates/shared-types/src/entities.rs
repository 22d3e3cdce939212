//! # Core Domain Entities
//!
//! Defines the entities of the OMR evaluation pipeline.
//!
//! ## Clusters
//!
//! - **Exam Setup**: `QuestionPaper`, `AnswerKey`
//! - **Sheet Pipeline**: `Sheet`, `QualityRecord`, `BubbleReading`,
//!   `AISolverVerdict`, `ManualEntry`
//! - **Outcome**: `Reconciliation`, `ScoreResult`, `InterventionItem`
//! - **Ledger**: `LedgerBlock`

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A 32-byte BLAKE3 hash.
pub type Hash = [u8; 32];

/// A 64-byte Ed25519 signature.
pub type Signature = [u8; 64];

/// A 32-byte Ed25519 public key.
pub type PublicKey = [u8; 32];

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(PaperId);
uuid_id!(AnswerKeyId);
uuid_id!(SheetId);
uuid_id!(InterventionId);

// =============================================================================
// CLUSTER A: EXAM SETUP
// =============================================================================

/// A question paper, created once per exam.
///
/// Immutable after creation except for links to answer keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionPaper {
    /// Unique identifier.
    pub id: PaperId,
    /// Exam identifier this paper belongs to.
    pub exam_id: String,
    /// Subject name.
    pub subject: String,
    /// Total number of questions on the paper.
    pub total_questions: u32,
    /// Maximum achievable marks.
    pub max_marks: Decimal,
    /// Content hash of the paper's source material.
    pub content_hash: Hash,
    /// Hash of the most recent ledger block that committed a change to this entity.
    pub last_block_hash: Hash,
    /// Creation timestamp.
    pub created_at: OffsetDateTime,
    /// Last update timestamp.
    pub updated_at: OffsetDateTime,
}

/// Lifecycle status of an [`AnswerKey`].
///
/// Only `Locked` keys may be used to score sheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKeyStatus {
    /// Freshly created, not yet reviewed.
    Draft,
    /// Passed automated AI verification.
    AiVerified,
    /// AI verification raised a concern requiring human attention.
    Flagged,
    /// A human reviewer approved the key.
    HumanApproved,
    /// Locked; eligible to score sheets. Terminal.
    Locked,
}

/// Optional per-question annotations raised during verification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnswerKeyFlag {
    /// Confidence in the expected answer (0..1).
    pub confidence: Decimal,
    /// Free-text ambiguity notes, if any.
    pub notes: Option<String>,
}

/// A single expected-answer entry in an [`AnswerKey`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerKeyEntry {
    /// Expected answer text/choice.
    pub expected_answer: String,
    /// Marks awarded for a correct answer to this question.
    pub marks: Decimal,
}

/// The answer key for a [`QuestionPaper`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerKey {
    /// Unique identifier.
    pub id: AnswerKeyId,
    /// The paper this key belongs to.
    pub paper_id: PaperId,
    /// Mapping of question number to expected answer and marks.
    pub entries: std::collections::BTreeMap<u32, AnswerKeyEntry>,
    /// Per-question flags raised during verification.
    pub flags: std::collections::BTreeMap<u32, AnswerKeyFlag>,
    /// Current lifecycle status.
    pub status: AnswerKeyStatus,
    /// Hash of the most recent ledger block that committed a change to this entity.
    pub last_block_hash: Hash,
    /// Creation timestamp.
    pub created_at: OffsetDateTime,
    /// Last update timestamp.
    pub updated_at: OffsetDateTime,
}

// =============================================================================
// CLUSTER B: SHEET PIPELINE
// =============================================================================

/// Pipeline stage of a [`Sheet`], per the orchestrator's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetStage {
    /// Just created; image recorded.
    Ingested,
    /// Quality assessment has run.
    QualityAssessed,
    /// Damaged image was reconstructed.
    Reconstructed,
    /// Bubble detection has run.
    BubblesRead,
    /// Independent AI solver has produced a verdict.
    AiSolved,
    /// Human operator has entered answers manually.
    ManualEntered,
    /// Three-way reconciliation has completed.
    Reconciled,
    /// Marks have been computed.
    Scored,
    /// Terminal: result finalized and signed.
    Finalized,
    /// Terminal: sheet rejected during quality assessment.
    Rejected,
}

/// A scanned answer sheet moving through the evaluation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sheet {
    /// Unique identifier.
    pub id: SheetId,
    /// Exam identifier this sheet belongs to.
    pub exam_id: String,
    /// Student roll number.
    pub roll_number: String,
    /// Content hash of the original source image.
    pub source_image_hash: Hash,
    /// Content hash of the reconstructed image, if reconstruction ran.
    pub reconstructed_image_hash: Option<Hash>,
    /// Current pipeline stage.
    pub stage: SheetStage,
    /// Hash of the most recent ledger block that committed a change to this entity.
    pub last_block_hash: Hash,
    /// Creation timestamp.
    pub created_at: OffsetDateTime,
    /// Last update timestamp.
    pub updated_at: OffsetDateTime,
}

/// Kinds of physical damage a quality assessment may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageKind {
    /// Torn or missing paper.
    Tear,
    /// Liquid or other stain obscuring content.
    Stain,
    /// Scan performed at an angle.
    Skew,
    /// Image is too dark or washed out.
    PoorContrast,
    /// Crease or fold obscuring bubbles.
    Fold,
}

/// Severity of a reported [`DamageKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageSeverity {
    /// Minor damage; generally recoverable.
    Minor,
    /// Moderate damage; may require reconstruction.
    Moderate,
    /// Severe damage; sheet may be unrecoverable.
    Severe,
}

/// A single reported instance of damage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageReport {
    /// The kind of damage observed.
    pub kind: DamageKind,
    /// How severe the damage is.
    pub severity: DamageSeverity,
}

/// The outcome decision of a quality assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityDecision {
    /// Sheet quality is sufficient; continue to bubble reading.
    Proceed,
    /// Sheet is damaged but recoverable; attempt reconstruction.
    Reconstruct,
    /// Sheet is unrecoverable; reject.
    Reject,
    /// Quality is borderline; route to a human reviewer.
    HumanReview,
}

/// The outcome of quality assessment for a [`Sheet`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityRecord {
    /// The sheet this record describes.
    pub sheet_id: SheetId,
    /// Overall quality score in `0.0..=1.0`.
    pub score: Decimal,
    /// Damage instances reported.
    pub damage: Vec<DamageReport>,
    /// The resulting routing decision.
    pub decision: QualityDecision,
    /// Content hash of the reconstruction outcome, when reconstruction ran.
    pub reconstruction_hash: Option<Hash>,
    /// Creation timestamp.
    pub created_at: OffsetDateTime,
    /// Last update timestamp.
    pub updated_at: OffsetDateTime,
}

/// A detected bubble answer for one question.
///
/// `detected_answer` is `None` for a blank bubble and `Some("MULTIPLE")`
/// is represented by [`DetectedAnswer::Multiple`] for a double-mark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectedAnswer {
    /// A single option was marked.
    Option(String),
    /// No option was marked.
    None,
    /// More than one option was marked.
    Multiple,
}

/// One question's bubble-detection result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BubbleDetection {
    /// The detected answer.
    pub detected_answer: DetectedAnswer,
    /// Detector confidence in `0.0..=1.0`.
    pub confidence: Decimal,
}

/// The full set of bubble-detection results for a [`Sheet`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BubbleReading {
    /// The sheet this reading describes.
    pub sheet_id: SheetId,
    /// Per-question detections.
    pub answers: std::collections::BTreeMap<u32, BubbleDetection>,
    /// Creation timestamp.
    pub created_at: OffsetDateTime,
}

/// One question's AI-solver result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverAnswer {
    /// The answer the solver arrived at.
    pub answer: String,
    /// Solver confidence in `0.0..=1.0`.
    pub confidence: Decimal,
}

/// An independent AI solver's verdict for a [`Sheet`], optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AISolverVerdict {
    /// The sheet this verdict describes.
    pub sheet_id: SheetId,
    /// Per-question solver answers.
    pub answers: std::collections::BTreeMap<u32, SolverAnswer>,
    /// Creation timestamp.
    pub created_at: OffsetDateTime,
}

/// A human operator's manually entered answers for a [`Sheet`], optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualEntry {
    /// The sheet this entry describes.
    pub sheet_id: SheetId,
    /// Per-question entered answers.
    pub answers: std::collections::BTreeMap<u32, String>,
    /// Identifier of the operator who entered these answers.
    pub entered_by: String,
    /// When the entry was submitted.
    pub entered_at: OffsetDateTime,
}

// =============================================================================
// CLUSTER C: OUTCOME
// =============================================================================

/// The reconciliation status assigned to a single question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationStatus {
    /// All present sources agree.
    Matched,
    /// Bubble and manual agree; AI disagrees.
    DisputedAi,
    /// Bubble and AI agree; manual disagrees.
    DisputedManual,
    /// All three sources present and mutually disagree.
    ThreeWaySplit,
    /// Cannot decide automatically; needs a human.
    NeedsReview,
    /// A prior `needs_review`/dispute has since been resolved by a human.
    Resolved,
}

/// The reconciled outcome for a single question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionReconciliation {
    /// Bubble-detected answer, if any.
    pub omr: Option<String>,
    /// AI-solver answer, if any.
    pub ai: Option<String>,
    /// Manually entered answer, if any.
    pub manual: Option<String>,
    /// The selected final answer, or `None` while unresolved.
    pub r#final: Option<String>,
    /// The reconciliation status for this question.
    pub status: ReconciliationStatus,
}

/// The full three-way reconciliation outcome for a [`Sheet`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reconciliation {
    /// The sheet this reconciliation describes.
    pub sheet_id: SheetId,
    /// Per-question reconciliation outcomes.
    pub questions: std::collections::BTreeMap<u32, QuestionReconciliation>,
    /// Creation timestamp.
    pub created_at: OffsetDateTime,
    /// Last update timestamp.
    pub updated_at: OffsetDateTime,
}

/// Letter grade bucket assigned to a [`ScoreResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

/// Per-question marks awarded after scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionScore {
    /// Marks awarded for this question (0 or the key's full marks).
    pub marks_awarded: Decimal,
    /// Whether the final reconciled answer matched the answer key.
    pub correct: bool,
}

/// The final scoring outcome for a [`Sheet`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResult {
    /// The sheet this score describes.
    pub sheet_id: SheetId,
    /// Marks computed from the reconciled answers.
    pub automated_marks: Decimal,
    /// Marks independently tallied by a human, if available.
    pub manual_marks: Option<Decimal>,
    /// Whether `manual_marks` agrees with `automated_marks` within tolerance.
    pub marks_match: bool,
    /// True only when every correctness condition in the scoring invariant holds.
    pub is_perfect_evaluation: bool,
    /// Letter grade derived from `automated_marks`.
    pub grade: Grade,
    /// Per-question score breakdown.
    pub breakdown: std::collections::BTreeMap<u32, QuestionScore>,
    /// Creation timestamp.
    pub created_at: OffsetDateTime,
}

/// The kind of entity an [`InterventionItem`] was raised against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionRef {
    /// Raised against a sheet.
    Sheet(SheetId),
    /// Raised against an answer key.
    AnswerKey(AnswerKeyId),
    /// Raised against one question row of a sheet's reconciliation.
    ReconciliationRow {
        /// The sheet whose reconciliation this row belongs to.
        sheet_id: SheetId,
        /// The question number within that reconciliation.
        question_number: u32,
    },
}

/// Why an [`InterventionItem`] was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionReason {
    /// Quality assessment requested human review.
    QualityReview,
    /// Reconciliation could not decide a final answer.
    ReconciliationDispute,
    /// Bubble confidence fell below the configured threshold.
    LowConfidence,
    /// Answer key verification was flagged.
    AnswerKeyFlagged,
    /// An external-service adapter exhausted its retry budget.
    AdapterUnavailable,
    /// A per-sheet deadline expired before reaching `FINALIZED`.
    DeadlineExceeded,
    /// A cooperative cancellation was observed mid-stage.
    OperatorCancelled,
}

/// Priority of an [`InterventionItem`]; also its queue ordering key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionPriority {
    Low,
    Normal,
    High,
    Critical,
}

/// Lifecycle status of an [`InterventionItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionStatus {
    /// Newly raised, unclaimed.
    Open,
    /// Claimed by an assignee, in progress.
    Claimed,
    /// Resolved with a decision. Terminal.
    Resolved,
    /// Abandoned without resolution. Terminal.
    Cancelled,
}

/// A unit of work requiring human attention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionItem {
    /// Unique identifier.
    pub id: InterventionId,
    /// The entity this intervention was raised against.
    pub entity_ref: InterventionRef,
    /// Why it was raised.
    pub reason: InterventionReason,
    /// Queue priority.
    pub priority: InterventionPriority,
    /// Current lifecycle status.
    pub status: InterventionStatus,
    /// The assignee who claimed this item, if any.
    pub assignee: Option<String>,
    /// Free-text resolution note, set when resolved.
    pub resolution_note: Option<String>,
    /// Creation timestamp.
    pub created_at: OffsetDateTime,
    /// Last update timestamp.
    pub updated_at: OffsetDateTime,
}

// =============================================================================
// CLUSTER D: LEDGER
// =============================================================================

/// The kind of event a [`LedgerBlock`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockKind {
    QuestionPaperUpload,
    AnswerKeyAiVerified,
    AnswerKeyHumanApproved,
    AnswerKeyLocked,
    SheetIngested,
    QualityAssessed,
    Reconstructed,
    BubblesRead,
    AiSolved,
    ManualEntered,
    Reconciled,
    Scored,
    InterventionOpened,
    InterventionResolved,
    ResultFinalized,
}

/// The kind of identity a ledger signature was produced by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignerKind {
    AiVerifier,
    HumanVerifier,
    AdminController,
}

/// A single (signer-kind, signer-key, signature) attestation over a block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSignature {
    /// The kind of signer that produced this signature.
    pub signer_kind: SignerKind,
    /// The signer's public key.
    pub signer_key: PublicKey,
    /// The signature bytes.
    pub signature: Signature,
}

/// One (key, value-hash) entry in a block's payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadEntry {
    /// Logical key describing the payload value (e.g. an entity id).
    pub key: String,
    /// Hash of the serialized domain object.
    pub value_hash: Hash,
}

/// An append-only, hash-chained ledger block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerBlock {
    /// Monotonically increasing index, starting at 0 for genesis.
    pub index: u64,
    /// UTC nanosecond timestamp.
    pub timestamp: i128,
    /// The kind of event this block records.
    pub kind: BlockKind,
    /// Ordered payload entries.
    pub payload: Vec<PayloadEntry>,
    /// Merkle root over `payload`.
    pub merkle_root: Hash,
    /// Self-hash of the preceding block; all-zero for genesis.
    pub prev_hash: Hash,
    /// Attached signatures; required for `ResultFinalized`.
    pub signatures: Vec<BlockSignature>,
    /// Nonce chosen so `self_hash` satisfies the difficulty predicate.
    pub nonce: u64,
    /// This block's own hash over all preceding fields.
    pub self_hash: Hash,
}
