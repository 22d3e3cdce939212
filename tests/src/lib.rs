//! Cross-crate integration test suite for the OMR evaluation pipeline
//! coordinator.
//!
//! Each crate under `crates/` already carries thorough unit coverage of
//! its own port, including `omr-orchestrator`'s own internal harness
//! exercising the single-sheet happy path, precondition failures,
//! cancellation, and adapter failure. This crate covers what only shows
//! up once multiple components are wired together against real
//! (non-fake) adapters: a fully signed finalize, on-disk ledger tamper
//! detection, crash-injection against file-backed storage, and the
//! finalization gate under randomized intervention/resolve interleaving.

#![allow(clippy::too_many_arguments)]

pub mod harness;
pub mod integration;
