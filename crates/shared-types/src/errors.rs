//! # Error Types
//!
//! Error types shared across pipeline components that are not purely
//! internal to a single crate.

use thiserror::Error;

/// Errors surfaced by the persistent store (C2).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Entity not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Journal or entity data failed an integrity check on read.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// A write-ahead journal entry was found uncommitted at startup.
    #[error("unresolved journal entry for {0}")]
    UnresolvedJournal(String),

    /// Underlying database operation failed.
    #[error("database error: {0}")]
    DatabaseError(String),
}

/// Errors surfaced by external-service adapters (C3).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Transient failure; caller should retry with backoff.
    #[error("transient failure calling {adapter}: {message}")]
    Transient {
        /// Which adapter failed.
        adapter: String,
        /// Underlying error message.
        message: String,
    },

    /// Non-retryable failure.
    #[error("permanent failure calling {adapter}: {message}")]
    Permanent {
        /// Which adapter failed.
        adapter: String,
        /// Underlying error message.
        message: String,
    },

    /// The call exceeded its per-request or total retry budget.
    #[error("timeout calling {adapter} after {elapsed_ms}ms")]
    Timeout {
        /// Which adapter timed out.
        adapter: String,
        /// Elapsed time before giving up, in milliseconds.
        elapsed_ms: u64,
    },
}

/// Ledger (C1) integrity and append errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// Another append interleaved with this one.
    #[error("chain stale: expected head index {expected}, found {actual}")]
    ChainStale {
        /// Index this append expected to follow.
        expected: u64,
        /// Index actually found at the head.
        actual: u64,
    },

    /// Nonce search exhausted its configured bound without meeting the
    /// difficulty predicate.
    #[error("mining budget exceeded after {attempts} attempts")]
    MiningBudgetExceeded {
        /// Number of nonce values tried.
        attempts: u64,
    },

    /// Fewer than the policy-required signatures were attached for this
    /// block kind.
    #[error("signature insufficient: {present} of {required} required signatures present")]
    SignatureInsufficient {
        /// Signatures actually attached.
        present: usize,
        /// Signatures required by policy.
        required: usize,
    },

    /// Chain validation found a mismatch at the given block index.
    #[error("chain integrity violation at block {index}: {reason}")]
    IntegrityViolation {
        /// The first offending block index.
        index: u64,
        /// What check failed.
        reason: String,
    },
}
