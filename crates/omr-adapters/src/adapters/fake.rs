//! Deterministic in-memory adapters for tests: no network, configurable
//! canned responses and failure injection, mirroring the style of the
//! in-memory/mock adapters used elsewhere in this codebase for ports
//! that would otherwise reach an external system.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared_types::{GatewayError, QualityDecision};

use crate::domain::types::{
    AnswerKeyVerification, QualityAssessment, ReconstructionResult, SolverOutcome,
};
use crate::ports::inbound::{AnswerKeyVerifier, QualityAssessor, QuestionSolver, Reconstructor};

/// A queue of canned responses consumed in order; returns the last entry
/// repeatedly once exhausted so tests don't need to size the queue
/// exactly to the number of calls made.
struct Script<T> {
    responses: Mutex<Vec<Result<T, GatewayError>>>,
    calls: AtomicUsize,
}

impl<T: Clone> Script<T> {
    fn new(responses: Vec<Result<T, GatewayError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: AtomicUsize::new(0),
        }
    }

    fn next(&self) -> Result<T, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let responses = self.responses.lock().unwrap();
        let idx = (self.calls.load(Ordering::SeqCst) - 1).min(responses.len().saturating_sub(1));
        responses[idx].clone()
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Fake [`QualityAssessor`] that always proceeds with a perfect score.
pub struct FakeQualityAssessor {
    script: Script<QualityAssessment>,
}

impl FakeQualityAssessor {
    pub fn always_proceed() -> Self {
        Self {
            script: Script::new(vec![Ok(QualityAssessment {
                score: Decimal::ONE,
                damage: vec![],
                decision: QualityDecision::Proceed,
            })]),
        }
    }

    pub fn scripted(responses: Vec<Result<QualityAssessment, GatewayError>>) -> Self {
        Self {
            script: Script::new(responses),
        }
    }

    pub fn call_count(&self) -> usize {
        self.script.call_count()
    }
}

#[async_trait]
impl QualityAssessor for FakeQualityAssessor {
    async fn assess_quality(&self, _image_bytes: &[u8]) -> Result<QualityAssessment, GatewayError> {
        self.script.next()
    }
}

/// Fake [`Reconstructor`].
pub struct FakeReconstructor {
    script: Script<ReconstructionResult>,
}

impl FakeReconstructor {
    pub fn scripted(responses: Vec<Result<ReconstructionResult, GatewayError>>) -> Self {
        Self {
            script: Script::new(responses),
        }
    }

    pub fn call_count(&self) -> usize {
        self.script.call_count()
    }
}

#[async_trait]
impl Reconstructor for FakeReconstructor {
    async fn reconstruct(
        &self,
        _damaged_image_bytes: &[u8],
        _expected_rows: u32,
        _expected_cols: u32,
    ) -> Result<ReconstructionResult, GatewayError> {
        self.script.next()
    }
}

/// Fake [`AnswerKeyVerifier`].
pub struct FakeAnswerKeyVerifier {
    script: Script<AnswerKeyVerification>,
}

impl FakeAnswerKeyVerifier {
    pub fn scripted(responses: Vec<Result<AnswerKeyVerification, GatewayError>>) -> Self {
        Self {
            script: Script::new(responses),
        }
    }

    pub fn call_count(&self) -> usize {
        self.script.call_count()
    }
}

#[async_trait]
impl AnswerKeyVerifier for FakeAnswerKeyVerifier {
    async fn verify_answer_key(
        &self,
        _question_text: &str,
        _proposed_answer: &str,
    ) -> Result<AnswerKeyVerification, GatewayError> {
        self.script.next()
    }
}

/// Fake [`QuestionSolver`].
pub struct FakeQuestionSolver {
    script: Script<SolverOutcome>,
}

impl FakeQuestionSolver {
    pub fn scripted(responses: Vec<Result<SolverOutcome, GatewayError>>) -> Self {
        Self {
            script: Script::new(responses),
        }
    }

    pub fn call_count(&self) -> usize {
        self.script.call_count()
    }
}

#[async_trait]
impl QuestionSolver for FakeQuestionSolver {
    async fn solve_question(
        &self,
        _question_text: &str,
        _subject: &str,
    ) -> Result<SolverOutcome, GatewayError> {
        self.script.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_always_proceed_returns_proceed() {
        let assessor = FakeQualityAssessor::always_proceed();
        let result = assessor.assess_quality(b"irrelevant").await.unwrap();
        assert_eq!(result.decision, QualityDecision::Proceed);
    }

    #[tokio::test]
    async fn test_scripted_repeats_last_response() {
        let solver = FakeQuestionSolver::scripted(vec![Ok(SolverOutcome {
            answer: "B".into(),
            confidence: Decimal::new(9, 1),
            explanation: None,
        })]);
        solver.solve_question("q", "math").await.unwrap();
        let second = solver.solve_question("q", "math").await.unwrap();
        assert_eq!(second.answer, "B");
        assert_eq!(solver.call_count(), 2);
    }

    #[tokio::test]
    async fn test_scripted_permanent_failure_propagates() {
        let verifier = FakeAnswerKeyVerifier::scripted(vec![Err(GatewayError::Permanent {
            adapter: "fake".into(),
            message: "bad key".into(),
        })]);
        let err = verifier.verify_answer_key("q", "A").await.unwrap_err();
        assert!(matches!(err, GatewayError::Permanent { .. }));
    }
}
