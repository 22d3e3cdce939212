//! The stage sum-type result (§9 design note: "Implicit exception flow for
//! pipeline stages").
//!
//! Every stage function returns `Result<StageOutcome<T>, OrchestratorError>`:
//! `Err` is reserved for infrastructure failure the caller cannot interpret
//! (storage/ledger/queue plumbing); the expected domain outcomes a caller
//! *does* branch on (precondition not met, a human/signature gate, an
//! exhausted adapter retry budget, or an observed cancellation) are all
//! values of this enum on the `Ok` path.

use shared_types::InterventionId;

#[derive(Debug, Clone)]
pub enum StageOutcome<T> {
    /// The stage completed and produced `T`.
    Ok(T),
    /// The stage's guard (§4.6) was not satisfied. `current_state` is a
    /// human-readable rendering of whatever state the guard inspected
    /// (commonly a `SheetStage`, occasionally an `AnswerKeyStatus`).
    PreconditionFailed { current_state: String, expected: &'static str },
    /// Progress requires human resolution; carries the blocking intervention ids.
    GateBlocked { intervention_ids: Vec<InterventionId> },
    /// An external-service adapter exhausted its retry budget (§4.3); a
    /// `critical` intervention has been opened.
    AdapterUnavailable { adapter: &'static str, reason: String, intervention_id: InterventionId },
    /// Cooperative cancellation was observed; a `normal` intervention has
    /// been opened and the stage unwound without effect.
    Cancelled { intervention_id: InterventionId },
    /// Finalize was attempted without the required multi-signature set.
    SignatureInsufficient { present: usize, required: usize },
}

impl<T> StageOutcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, StageOutcome::Ok(_))
    }

    pub fn into_ok(self) -> Option<T> {
        match self {
            StageOutcome::Ok(v) => Some(v),
            _ => None,
        }
    }
}
