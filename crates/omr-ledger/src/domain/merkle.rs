//! Binary Merkle tree over a block's payload entries.
//!
//! A single-leaf tree duplicates the leaf so every internal level has an
//! even width, keeping the root shape stable regardless of payload size.

use shared_crypto::blake3_hash;
use shared_types::Hash;

/// Compute the Merkle root over an ordered list of leaf hashes.
///
/// Returns the all-zero hash for an empty payload.
pub fn merkle_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return [0u8; 32];
    }

    let mut level: Vec<Hash> = leaves.to_vec();
    if level.len() == 1 {
        level.push(level[0]);
    }

    while level.len() > 1 {
        if level.len() % 2 != 0 {
            level.push(*level.last().unwrap());
        }

        level = level
            .chunks(2)
            .map(|pair| hash_pair(&pair[0], &pair[1]))
            .collect();
    }

    level[0]
}

fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(left);
    buf.extend_from_slice(right);
    blake3_hash(&buf)
}
