//! Inbound ports: the four external-service contracts the orchestrator
//! (C6) consumes. Concrete adapters live under `adapters`.

use async_trait::async_trait;
use shared_types::GatewayError;

use crate::domain::types::{
    AnswerKeyVerification, QualityAssessment, ReconstructionResult, SolverOutcome,
};

/// Assesses source-image quality and recommends a pipeline decision.
#[async_trait]
pub trait QualityAssessor: Send + Sync {
    async fn assess_quality(&self, image_bytes: &[u8]) -> Result<QualityAssessment, GatewayError>;
}

/// Reconstructs a damaged sheet image into a cleaned-up version.
#[async_trait]
pub trait Reconstructor: Send + Sync {
    async fn reconstruct(
        &self,
        damaged_image_bytes: &[u8],
        expected_rows: u32,
        expected_cols: u32,
    ) -> Result<ReconstructionResult, GatewayError>;
}

/// Checks whether a proposed answer-key entry is correct.
#[async_trait]
pub trait AnswerKeyVerifier: Send + Sync {
    async fn verify_answer_key(
        &self,
        question_text: &str,
        proposed_answer: &str,
    ) -> Result<AnswerKeyVerification, GatewayError>;
}

/// Solves a question independently of the proposed answer key.
#[async_trait]
pub trait QuestionSolver: Send + Sync {
    async fn solve_question(
        &self,
        question_text: &str,
        subject: &str,
    ) -> Result<SolverOutcome, GatewayError>;
}
