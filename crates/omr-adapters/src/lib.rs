//! # External-Service Adapters (C3)
//!
//! Uniform request/response contracts to the vision, LLM-verify, and
//! reconstruction services the orchestrator (C6) depends on, with a
//! shared retry/timeout/rate-limit envelope so no individual adapter
//! re-implements backoff policy.
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain::types` - request/response shapes.
//! - `domain::retry` - the `with_retry` envelope: per-request timeout,
//!   exponential backoff on `Transient`/`Timeout`, no retry on `Permanent`.
//! - `ports::inbound` - the four service traits the orchestrator depends on.
//! - `adapters::http` - `reqwest`-backed implementations.
//! - `adapters::fake` - scripted in-memory implementations for tests.

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::fake::{
    FakeAnswerKeyVerifier, FakeQualityAssessor, FakeQuestionSolver, FakeReconstructor,
};
pub use adapters::http::{
    HttpAnswerKeyVerifier, HttpQualityAssessor, HttpQuestionSolver, HttpReconstructor,
};
pub use domain::errors::GatewayError;
pub use domain::retry::{with_retry, RetryConfig};
pub use domain::types::{
    AnswerKeyVerification, QualityAssessment, ReconstructionResult, SolverOutcome,
};
pub use ports::inbound::{AnswerKeyVerifier, QualityAssessor, QuestionSolver, Reconstructor};
