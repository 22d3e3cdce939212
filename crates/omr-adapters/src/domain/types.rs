//! Request/response shapes for the four external services in §4.3.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared_types::{DamageReport, QualityDecision};

/// Result of `assess_quality`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub score: Decimal,
    pub damage: Vec<DamageReport>,
    pub decision: QualityDecision,
}

/// Result of `reconstruct`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconstructionResult {
    pub image_bytes: Vec<u8>,
    pub confidence: Decimal,
}

/// Result of `verify_answer_key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerKeyVerification {
    pub agrees: bool,
    pub confidence: Decimal,
    pub notes: Option<String>,
}

/// Result of `solve_question`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverOutcome {
    pub answer: String,
    pub confidence: Decimal,
    pub explanation: Option<String>,
}
