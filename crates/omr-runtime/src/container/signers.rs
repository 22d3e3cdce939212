//! Loads the `signers.registry_path` file (§6.4) into the
//! signer-kind → public-key registry [`omr_ledger::SignaturePolicy`]
//! expects.
//!
//! File format: a JSON object keyed by the kebab-case `SignerKind`
//! variant name, each value a list of hex-encoded Ed25519 public keys
//! authorized to sign for that kind.
//!
//! ```json
//! {
//!   "ai-verifier": ["3a1f..."],
//!   "human-verifier": ["9cab..."],
//!   "admin-controller": ["0def..."]
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use shared_types::SignerKind;

pub fn load_signer_registry(path: &Path) -> Result<HashMap<SignerKind, Vec<[u8; 32]>>, String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read signer registry {}: {e}", path.display()))?;
    let raw: HashMap<SignerKind, Vec<String>> =
        serde_json::from_str(&contents).map_err(|e| format!("failed to parse signer registry: {e}"))?;

    let mut registry = HashMap::new();
    for (kind, hex_keys) in raw {
        let mut keys = Vec::with_capacity(hex_keys.len());
        for hex_key in hex_keys {
            let bytes = hex::decode(&hex_key).map_err(|e| format!("invalid hex key for {kind:?}: {e}"))?;
            let key: [u8; 32] =
                bytes.try_into().map_err(|_| format!("signer key for {kind:?} must be 32 bytes"))?;
            keys.push(key);
        }
        registry.insert(kind, keys);
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_signer_registry_decodes_hex_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signers.json");
        std::fs::write(&path, format!(r#"{{"ai-verifier": ["{}"]}}"#, "11".repeat(32))).unwrap();

        let registry = load_signer_registry(&path).unwrap();
        assert_eq!(registry[&SignerKind::AiVerifier], vec![[0x11u8; 32]]);
    }

    #[test]
    fn test_load_signer_registry_rejects_short_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signers.json");
        std::fs::write(&path, r#"{"ai-verifier": ["abcd"]}"#).unwrap();

        assert!(load_signer_registry(&path).is_err());
    }
}
