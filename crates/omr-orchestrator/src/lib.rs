//! # Sheet Pipeline Orchestrator (C6)
//!
//! Drives each [`shared_types::Sheet`] through the state machine of §4.6,
//! gated on quality decisions, three-way reconciliation, and the ledger's
//! multi-signature finalize policy. Every transition is committed through
//! [`omr_store::Store`]'s write-ahead journal paired with an
//! [`omr_ledger::LedgerApi`] append, so a crash between mutating entity
//! state and appending to the ledger is always recoverable at restart.
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain` - config, scoring arithmetic, the stage sum-type result,
//!   and infrastructure errors.
//! - `cancellation` - the per-sheet cooperative cancellation registry.
//! - `ports::inbound` - the [`Orchestrator`] trait `omr-api` depends on.
//! - `service` - [`OrchestratorService`], the concrete driver.

pub mod cancellation;
pub mod domain;
pub mod ports;
pub mod service;

pub use cancellation::CancellationRegistry;
pub use domain::errors::OrchestratorError;
pub use domain::policy::OrchestratorConfig;
pub use domain::scoring::{score_sheet, ScoringPolicy};
pub use domain::stage_result::StageOutcome;
pub use ports::inbound::{Orchestrator, WorkflowReport};
pub use service::OrchestratorService;
