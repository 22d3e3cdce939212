//! Write-ahead journal for pairing entity mutations with ledger appends.
//!
//! Per §4.2: every state transition is wrapped in a transaction that both
//! mutates entity rows and produces a ledger append, committing only when
//! the append succeeds. Since the entity store and the ledger file are
//! two independent durable resources, a crash between the two could leave
//! them out of sync. The journal closes that gap: record intent, apply
//! the mutation, call append, then clear the journal entry. A crash
//! before the journal is cleared is detected at startup and the pending
//! transition is either completed (if the ledger append in fact
//! succeeded) or rolled back (if it did not).

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A recorded intent to apply an entity mutation paired with a ledger
/// append, not yet known to have committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTransition {
    /// Unique id for this journal entry.
    pub id: Uuid,
    /// Human-readable description of the mutation (e.g. `"sheet:<id> -> QUALITY_ASSESSED"`).
    pub description: String,
    /// Serialized snapshot of the entity state before the mutation, for rollback.
    pub before_snapshot: serde_json::Value,
    /// Serialized snapshot of the entity state the mutation intends to apply.
    pub after_snapshot: serde_json::Value,
    /// When this intent was recorded.
    pub recorded_at: OffsetDateTime,
}

impl PendingTransition {
    /// Record a new pending transition.
    pub fn new(
        description: impl Into<String>,
        before_snapshot: serde_json::Value,
        after_snapshot: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            before_snapshot,
            after_snapshot,
            recorded_at: OffsetDateTime::now_utc(),
        }
    }
}
