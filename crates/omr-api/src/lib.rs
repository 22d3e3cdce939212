//! # HTTP Surface (C7)
//!
//! REST/JSON over [`omr_orchestrator::Orchestrator`], [`omr_store::Store`],
//! [`omr_ledger::LedgerApi`], and [`omr_intervention::InterventionQueue`],
//! one route per verb+path of §6.1. `router.rs` builds an `axum::Router`
//! directly: every endpoint here maps onto a REST verb+path, with no
//! method-name dispatch layer to thread through.
//!
//! ## Crate Structure
//!
//! - `domain::error` - [`ApiError`], the `{code, message, details?}`
//!   envelope of §6.1/§7, and its HTTP status-code mapping.
//! - `domain::dto` - request/response payload shapes for handlers whose
//!   wire shape differs from the stored entity (image bytes, signatures).
//! - `handlers` - one module per resource (`papers`, `keys`, `sheets`,
//!   `ledger`, `interventions`).
//! - `router` - [`AppState`] and [`build_router`].

pub mod domain;
pub mod handlers;
pub mod router;

pub use domain::error::{ApiError, ErrorKind};
pub use router::{build_router, AppState};
