//! # Inbound Ports (Driving Ports)
//!
//! The primary API other components use to append to and read from the
//! ledger.

use shared_types::{BlockKind, BlockSignature, ChainError, Hash, LedgerBlock, PayloadEntry};

/// Primary API for the hash-chained ledger (C1).
pub trait LedgerApi {
    /// Atomically compute and append a block of `kind` over `payload`,
    /// mining a nonce that meets the configured difficulty and, for
    /// `RESULT_FINALIZED`, enforcing the multi-signature policy.
    ///
    /// ## Errors
    ///
    /// - `ChainStale`: another append interleaved with this one.
    /// - `MiningBudgetExceeded`: nonce search exhausted its bound.
    /// - `SignatureInsufficient`: fewer than the policy-required
    ///   signatures were attached for `kind`.
    fn append(
        &mut self,
        kind: BlockKind,
        payload: Vec<PayloadEntry>,
        signatures: Vec<BlockSignature>,
    ) -> Result<LedgerBlock, ChainError>;

    /// Walk the entire chain, recomputing `merkle_root` and `self_hash`
    /// for each block and checking monotonic indices and linkage.
    ///
    /// Returns the index of the first offending block, if any.
    fn validate(&self) -> Result<(), ChainError>;

    /// Look up a block by its `self_hash`.
    fn get_by_hash(&self, hash: &Hash) -> Option<LedgerBlock>;

    /// Look up a block by its index.
    fn get_by_index(&self, index: u64) -> Option<LedgerBlock>;

    /// The most recently appended block, if any.
    fn head(&self) -> Option<LedgerBlock>;
}
