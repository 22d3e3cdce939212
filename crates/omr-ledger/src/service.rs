//! Application service implementing [`LedgerApi`] over a [`ChainStore`].

use shared_types::{
    BlockKind, BlockSignature, ChainError, Hash, LedgerBlock, PayloadEntry,
};

use crate::domain::merkle::merkle_root;
use crate::domain::mining::{
    block_hash, mine_block, payload_leaf, signable_digest, BlockMaterial, DifficultyConfig,
};
use crate::domain::policy::{verify_signatures, SignaturePolicy};
use crate::ports::inbound::LedgerApi;
use crate::ports::outbound::ChainStore;

/// Configuration for the ledger service.
#[derive(Debug, Clone, Copy)]
pub struct LedgerConfig {
    /// Mining difficulty.
    pub difficulty: DifficultyConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DifficultyConfig::default(),
        }
    }
}

/// Ledger service: a single-writer append-only chain over a [`ChainStore`].
pub struct LedgerService<S: ChainStore> {
    store: S,
    policy: SignaturePolicy,
    config: LedgerConfig,
}

impl<S: ChainStore> LedgerService<S> {
    /// Construct a service over `store` with the given signature policy
    /// and configuration.
    pub fn new(store: S, policy: SignaturePolicy, config: LedgerConfig) -> Self {
        Self {
            store,
            policy,
            config,
        }
    }
}

impl<S: ChainStore> LedgerApi for LedgerService<S> {
    fn append(
        &mut self,
        kind: BlockKind,
        payload: Vec<PayloadEntry>,
        signatures: Vec<BlockSignature>,
    ) -> Result<LedgerBlock, ChainError> {
        let index = self.store.head().map(|b| b.index + 1).unwrap_or(0);
        let prev_hash = self
            .store
            .head()
            .map(|b| b.self_hash)
            .unwrap_or([0u8; 32]);

        let timestamp = time::OffsetDateTime::now_utc().unix_timestamp_nanos();

        let leaves: Vec<Hash> = payload.iter().map(payload_leaf).collect();
        let root = merkle_root(&leaves);

        let material = BlockMaterial {
            index,
            timestamp,
            kind,
            merkle_root: root,
            prev_hash,
            signatures: &signatures,
        };

        let signed_bytes = signable_digest(&BlockMaterial {
            index,
            timestamp,
            kind,
            merkle_root: root,
            prev_hash,
            signatures: &[],
        });
        verify_signatures(&self.policy, kind, &signatures, &signed_bytes)?;

        let (nonce, self_hash) = mine_block(&material, &self.config.difficulty)?;

        let block = LedgerBlock {
            index,
            timestamp,
            kind,
            payload,
            merkle_root: root,
            prev_hash,
            signatures,
            nonce,
            self_hash,
        };

        self.store.append(block.clone())?;
        Ok(block)
    }

    fn validate(&self) -> Result<(), ChainError> {
        let blocks = self.store.iter_all();
        let mut prev_hash = [0u8; 32];

        for (expected_index, block) in blocks.iter().enumerate() {
            if block.index != expected_index as u64 {
                return Err(ChainError::IntegrityViolation {
                    index: block.index,
                    reason: "non-monotonic index".to_string(),
                });
            }
            if block.prev_hash != prev_hash {
                return Err(ChainError::IntegrityViolation {
                    index: block.index,
                    reason: "prev_hash linkage mismatch".to_string(),
                });
            }

            let leaves: Vec<Hash> = block.payload.iter().map(payload_leaf).collect();
            if merkle_root(&leaves) != block.merkle_root {
                return Err(ChainError::IntegrityViolation {
                    index: block.index,
                    reason: "merkle root mismatch".to_string(),
                });
            }

            let material = BlockMaterial {
                index: block.index,
                timestamp: block.timestamp,
                kind: block.kind,
                merkle_root: block.merkle_root,
                prev_hash: block.prev_hash,
                signatures: &block.signatures,
            };
            if block_hash(&material, block.nonce) != block.self_hash {
                return Err(ChainError::IntegrityViolation {
                    index: block.index,
                    reason: "self_hash mismatch".to_string(),
                });
            }

            prev_hash = block.self_hash;
        }

        Ok(())
    }

    fn get_by_hash(&self, hash: &Hash) -> Option<LedgerBlock> {
        self.store.get_by_hash(hash)
    }

    fn get_by_index(&self, index: u64) -> Option<LedgerBlock> {
        self.store.get_by_index(index)
    }

    fn head(&self) -> Option<LedgerBlock> {
        self.store.head()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::outbound::InMemoryChainStore;

    fn service() -> LedgerService<InMemoryChainStore> {
        LedgerService::new(
            InMemoryChainStore::new(),
            SignaturePolicy::default(),
            LedgerConfig::default(),
        )
    }

    #[test]
    fn test_append_and_validate() {
        let mut svc = service();
        svc.append(BlockKind::SheetIngested, vec![], vec![]).unwrap();
        svc.append(BlockKind::QualityAssessed, vec![], vec![])
            .unwrap();

        assert!(svc.validate().is_ok());
        assert_eq!(svc.head().unwrap().index, 1);
    }

    #[test]
    fn test_genesis_has_zero_prev_hash() {
        let mut svc = service();
        let block = svc.append(BlockKind::SheetIngested, vec![], vec![]).unwrap();
        assert_eq!(block.prev_hash, [0u8; 32]);
    }

    #[test]
    fn test_finalized_without_signatures_fails() {
        let mut svc = service();
        let err = svc
            .append(BlockKind::ResultFinalized, vec![], vec![])
            .unwrap_err();
        assert!(matches!(err, ChainError::SignatureInsufficient { .. }));
    }

    #[test]
    fn test_validate_detects_tampering() {
        let mut store = InMemoryChainStore::new();
        let tampered = LedgerBlock {
            index: 0,
            timestamp: 0,
            kind: BlockKind::SheetIngested,
            payload: vec![],
            merkle_root: [0xFFu8; 32],
            prev_hash: [0u8; 32],
            signatures: vec![],
            nonce: 0,
            self_hash: [0xAAu8; 32],
        };
        store.append(tampered).unwrap();

        let svc = LedgerService::new(store, SignaturePolicy::default(), LedgerConfig::default());
        let err = svc.validate().unwrap_err();
        assert!(matches!(err, ChainError::IntegrityViolation { index: 0, .. }));
    }
}
