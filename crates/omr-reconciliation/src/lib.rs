//! # Reconciliation Engine (C4)
//!
//! Pure, stateless three-way comparison of bubble, AI-solver, and manual
//! answers against a locked answer key, producing a per-question
//! [`shared_types::ReconciliationStatus`] and, where the sources disagree
//! beyond automatic resolution, a pending intervention.
//!
//! ## Crate Structure
//!
//! - `domain::classify` - the per-question precedence rules.
//! - `domain::policy` - tunable thresholds (low-confidence cutoff).
//! - `ports::inbound` - the [`ReconciliationEngine`] trait.
//! - `service` - the concrete, stateless implementation.

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::classify::{InterventionTrigger, QuestionOutcome};
pub use domain::policy::ReconciliationPolicy;
pub use ports::inbound::{PendingIntervention, ReconciliationEngine, ReconciliationOutcome};
pub use service::ReconciliationService;
