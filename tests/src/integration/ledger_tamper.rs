//! On-disk ledger tamper detection: a byte flipped in a persisted block
//! after the fact must be caught by `validate()` on the next load, at
//! the exact index that was altered.

#[cfg(test)]
mod tests {
    use shared_types::BlockKind;

    use omr_ledger::{ChainError, FileChainStore, LedgerApi, LedgerConfig, LedgerService, SignaturePolicy};

    const HASH_HEX_LEN: usize = 64;

    #[tokio::test]
    async fn test_tampered_block_detected_at_its_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.journal");

        {
            let store = FileChainStore::open(&path).unwrap();
            let mut svc = LedgerService::new(store, SignaturePolicy::default(), LedgerConfig::default());
            for _ in 0..10 {
                svc.append(BlockKind::SheetIngested, vec![], vec![]).unwrap();
            }
            assert!(svc.validate().is_ok());
        }

        // Walk the length-prefixed record format to find record 5's
        // body and flip a byte inside its merkle_root, rewriting only
        // that record's length prefix and body in place. The self_hash
        // hex suffix is left untouched, so `open` still succeeds (the
        // suffix still matches the record's unmodified `self_hash`
        // field) and only `validate`'s merkle-root recomputation catches
        // the corruption.
        let bytes = std::fs::read(&path).unwrap();
        let mut cursor = 0usize;
        let mut rewritten = Vec::with_capacity(bytes.len());
        for index in 0..10u64 {
            let body_len =
                u32::from_le_bytes(bytes[cursor..cursor + 4].try_into().unwrap()) as usize;
            let body_start = cursor + 4;
            let hash_start = body_start + body_len;
            let record_end = hash_start + HASH_HEX_LEN;

            if index == 5 {
                let mut victim: serde_json::Value =
                    serde_json::from_slice(&bytes[body_start..hash_start]).unwrap();
                let root = victim["merkle_root"].as_array_mut().unwrap();
                let first = root[0].as_u64().unwrap();
                root[0] = serde_json::Value::from(first ^ 0xFF);
                let new_body = serde_json::to_vec(&victim).unwrap();

                rewritten.extend_from_slice(&(new_body.len() as u32).to_le_bytes());
                rewritten.extend_from_slice(&new_body);
                rewritten.extend_from_slice(&bytes[hash_start..record_end]);
            } else {
                rewritten.extend_from_slice(&bytes[cursor..record_end]);
            }

            cursor = record_end;
        }
        std::fs::write(&path, &rewritten).unwrap();

        let reopened = FileChainStore::open(&path).unwrap();
        let svc = LedgerService::new(reopened, SignaturePolicy::default(), LedgerConfig::default());
        let err = svc.validate().unwrap_err();
        assert!(matches!(err, ChainError::IntegrityViolation { index: 5, .. }));
    }

    #[tokio::test]
    async fn test_reopened_store_replays_every_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.journal");

        let last_hash = {
            let store = FileChainStore::open(&path).unwrap();
            let mut svc = LedgerService::new(store, SignaturePolicy::default(), LedgerConfig::default());
            svc.append(BlockKind::SheetIngested, vec![], vec![]).unwrap();
            svc.append(BlockKind::QualityAssessed, vec![], vec![]).unwrap();
            svc.head().unwrap().self_hash
        };

        let reopened = FileChainStore::open(&path).unwrap();
        let svc = LedgerService::new(reopened, SignaturePolicy::default(), LedgerConfig::default());
        assert_eq!(svc.head().unwrap().self_hash, last_hash);
        assert_eq!(svc.head().unwrap().index, 1);
        assert!(svc.validate().is_ok());
    }
}
