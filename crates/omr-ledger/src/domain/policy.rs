//! Multi-signature commitment policy.
//!
//! `RESULT_FINALIZED` blocks must carry at least three signatures with
//! distinct signer-kinds drawn from {ai-verifier, human-verifier,
//! admin-controller}, each verifiable against a signer-kind→public-key
//! registry loaded at startup.

use std::collections::{HashMap, HashSet};

use shared_crypto::{Ed25519PublicKey, Ed25519Signature};
use shared_types::{BlockKind, BlockSignature, ChainError, SignerKind};

/// Registry of public keys authorized to sign for each signer kind.
#[derive(Debug, Clone, Default)]
pub struct SignaturePolicy {
    registry: HashMap<SignerKind, Vec<[u8; 32]>>,
}

impl SignaturePolicy {
    /// Build a policy from a signer-kind → public-key registry.
    pub fn new(registry: HashMap<SignerKind, Vec<[u8; 32]>>) -> Self {
        Self { registry }
    }

    /// Minimum distinct signer-kinds required for `kind`.
    fn required_signer_kinds(kind: BlockKind) -> usize {
        match kind {
            BlockKind::ResultFinalized => 3,
            _ => 0,
        }
    }

    fn is_registered(&self, signer_kind: SignerKind, key: &[u8; 32]) -> bool {
        self.registry
            .get(&signer_kind)
            .map(|keys| keys.iter().any(|k| k == key))
            .unwrap_or(false)
    }
}

/// Verify that `signatures` satisfies the policy for `kind`, including
/// that each attached signature is cryptographically valid over
/// `signed_bytes` and produced by a registered key.
pub fn verify_signatures(
    policy: &SignaturePolicy,
    kind: BlockKind,
    signatures: &[BlockSignature],
    signed_bytes: &[u8],
) -> Result<(), ChainError> {
    let required = SignaturePolicy::required_signer_kinds(kind);

    let mut distinct_kinds = HashSet::new();
    for sig in signatures {
        if !policy.is_registered(sig.signer_kind, &sig.signer_key) {
            continue;
        }
        let Ok(pubkey) = Ed25519PublicKey::from_bytes(sig.signer_key) else {
            continue;
        };
        let signature = Ed25519Signature::from_bytes(sig.signature);
        if pubkey.verify(signed_bytes, &signature).is_err() {
            continue;
        }
        distinct_kinds.insert(sig.signer_kind);
    }

    if distinct_kinds.len() < required {
        return Err(ChainError::SignatureInsufficient {
            present: distinct_kinds.len(),
            required,
        });
    }

    Ok(())
}
