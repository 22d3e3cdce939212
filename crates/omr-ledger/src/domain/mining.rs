//! Deterministic nonce mining against a leading-hex-zero difficulty predicate.

use shared_crypto::blake3_hash;
use shared_types::{BlockKind, BlockSignature, ChainError, Hash, PayloadEntry};

/// Difficulty configuration: `leading_zero_hex_digits` leading hex digits
/// of `self_hash` must be zero. Must tolerate 0 for tests.
#[derive(Debug, Clone, Copy)]
pub struct DifficultyConfig {
    /// Number of leading hex-zero digits `self_hash` must have.
    pub leading_zero_hex_digits: u8,
    /// Upper bound on nonce attempts before giving up.
    pub max_attempts: u64,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            leading_zero_hex_digits: 0,
            max_attempts: 1_000_000,
        }
    }
}

/// The fields of a [`shared_types::LedgerBlock`] that participate in
/// `self_hash`, excluding `nonce` and `self_hash` themselves.
pub struct BlockMaterial<'a> {
    pub index: u64,
    pub timestamp: i128,
    pub kind: BlockKind,
    pub merkle_root: Hash,
    pub prev_hash: Hash,
    pub signatures: &'a [BlockSignature],
}

/// Compute `self_hash` for a given nonce.
pub fn block_hash(material: &BlockMaterial<'_>, nonce: u64) -> Hash {
    let mut buf = Vec::new();
    buf.extend_from_slice(&material.index.to_be_bytes());
    buf.extend_from_slice(&material.timestamp.to_be_bytes());
    buf.extend_from_slice(&(material.kind as u32).to_be_bytes());
    buf.extend_from_slice(&material.merkle_root);
    buf.extend_from_slice(&material.prev_hash);
    for sig in material.signatures {
        buf.push(sig.signer_kind as u8);
        buf.extend_from_slice(&sig.signer_key);
        buf.extend_from_slice(&sig.signature);
    }
    buf.extend_from_slice(&nonce.to_be_bytes());
    blake3_hash(&buf)
}

/// Check whether `hash` meets the difficulty predicate.
pub fn meets_difficulty(hash: &Hash, config: &DifficultyConfig) -> bool {
    let digits = config.leading_zero_hex_digits as usize;
    if digits == 0 {
        return true;
    }

    let full_bytes = digits / 2;
    if hash[..full_bytes].iter().any(|b| *b != 0) {
        return false;
    }
    if digits % 2 == 1 {
        return hash[full_bytes] & 0xF0 == 0;
    }
    true
}

/// Scan `nonce` from 0 until `self_hash` meets the difficulty predicate.
///
/// Returns `(nonce, self_hash)` or `ChainError::MiningBudgetExceeded` if
/// `max_attempts` is exhausted.
pub fn mine_block(
    material: &BlockMaterial<'_>,
    config: &DifficultyConfig,
) -> Result<(u64, Hash), ChainError> {
    for nonce in 0..config.max_attempts {
        let hash = block_hash(material, nonce);
        if meets_difficulty(&hash, config) {
            return Ok((nonce, hash));
        }
    }
    Err(ChainError::MiningBudgetExceeded {
        attempts: config.max_attempts,
    })
}

/// The digest signers attach their signature to: `index`, `kind`,
/// `merkle_root` and `prev_hash` only, excluding `timestamp` and `nonce`.
/// Unlike `self_hash`, every one of these fields is known to a signer
/// before the block exists (`index`/`prev_hash` from the current chain
/// head, `merkle_root` from the payload the signer is co-signing), so a
/// signature can be produced ahead of the append call that mines and
/// timestamps the block.
pub fn signable_digest(material: &BlockMaterial<'_>) -> Hash {
    let mut buf = Vec::new();
    buf.extend_from_slice(&material.index.to_be_bytes());
    buf.extend_from_slice(&(material.kind as u32).to_be_bytes());
    buf.extend_from_slice(&material.merkle_root);
    buf.extend_from_slice(&material.prev_hash);
    blake3_hash(&buf)
}

/// Serialize payload entries' key order deterministically for merkle leaf
/// construction; the leaf for an entry is `H(key || value_hash)`.
pub fn payload_leaf(entry: &PayloadEntry) -> Hash {
    let mut buf = Vec::new();
    buf.extend_from_slice(entry.key.as_bytes());
    buf.extend_from_slice(&entry.value_hash);
    blake3_hash(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::SignerKind;

    fn material() -> BlockMaterial<'static> {
        BlockMaterial {
            index: 0,
            timestamp: 0,
            kind: BlockKind::SheetIngested,
            merkle_root: [0u8; 32],
            prev_hash: [0u8; 32],
            signatures: &[],
        }
    }

    #[test]
    fn test_zero_difficulty_accepts_nonce_zero() {
        let config = DifficultyConfig {
            leading_zero_hex_digits: 0,
            max_attempts: 10,
        };
        let (nonce, hash) = mine_block(&material(), &config).unwrap();
        assert_eq!(nonce, 0);
        assert_eq!(hash, block_hash(&material(), 0));
    }

    #[test]
    fn test_mining_budget_exceeded() {
        let config = DifficultyConfig {
            leading_zero_hex_digits: 64,
            max_attempts: 5,
        };
        let err = mine_block(&material(), &config).unwrap_err();
        assert!(matches!(err, ChainError::MiningBudgetExceeded { attempts: 5 }));
    }

    #[test]
    fn test_different_signatures_change_hash() {
        let mut m1 = material();
        let sig = BlockSignature {
            signer_kind: SignerKind::AiVerifier,
            signer_key: [1u8; 32],
            signature: [2u8; 64],
        };
        let sigs = [sig];
        m1.signatures = &sigs;
        assert_ne!(block_hash(&m1, 0), block_hash(&material(), 0));
    }
}
