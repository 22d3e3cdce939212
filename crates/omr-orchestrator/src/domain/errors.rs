//! Infrastructure-level orchestrator errors.
//!
//! Expected domain outcomes (precondition failed, gate blocked, adapter
//! unavailable, cancelled) are *not* modeled here: they are values of
//! [`crate::domain::stage_result::StageOutcome`] returned on the `Ok` path
//! of a stage function, per the sum-type pipeline-result design. This enum
//! is reserved for failures a stage function cannot itself interpret:
//! storage, ledger, and intervention-queue plumbing errors, and lookups
//! against an id that does not exist.
//!
//! Manual `Display`/`Error` impl, matching the convention used for crate-
//! internal domain errors elsewhere in this workspace (e.g.
//! `omr-intervention::domain::errors::InterventionError`): `thiserror` is
//! reserved for error types shared across crate boundaries.

use std::fmt;

use omr_intervention::InterventionError;
use omr_ledger::ChainError;
use shared_types::{AnswerKeyId, SheetId, StorageError};

#[derive(Debug, Clone)]
pub enum OrchestratorError {
    /// No Sheet exists with the given id.
    SheetNotFound(SheetId),
    /// No AnswerKey exists with the given id.
    KeyNotFound(AnswerKeyId),
    /// The persistent store failed.
    Storage(StorageError),
    /// The ledger rejected the append outright (not a recoverable
    /// `ChainStale`/`SignatureInsufficient`; those are surfaced as
    /// `StageOutcome` values by the caller).
    Ledger(ChainError),
    /// The intervention queue failed.
    Intervention(InterventionError),
    /// `ChainStale` retries (see §5) were exhausted without success.
    LedgerContention { attempts: u32 },
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestratorError::SheetNotFound(id) => write!(f, "sheet not found: {id}"),
            OrchestratorError::KeyNotFound(id) => write!(f, "answer key not found: {id}"),
            OrchestratorError::Storage(e) => write!(f, "store error: {e}"),
            OrchestratorError::Ledger(e) => write!(f, "ledger error: {e}"),
            OrchestratorError::Intervention(e) => write!(f, "intervention queue error: {e}"),
            OrchestratorError::LedgerContention { attempts } => {
                write!(f, "ledger contention: gave up after {attempts} attempts")
            }
        }
    }
}

impl std::error::Error for OrchestratorError {}

impl From<StorageError> for OrchestratorError {
    fn from(e: StorageError) -> Self {
        OrchestratorError::Storage(e)
    }
}

impl From<ChainError> for OrchestratorError {
    fn from(e: ChainError) -> Self {
        OrchestratorError::Ledger(e)
    }
}

impl From<InterventionError> for OrchestratorError {
    fn from(e: InterventionError) -> Self {
        OrchestratorError::Intervention(e)
    }
}
