//! Finalization with a real multi-signature set (spec scenario: "three
//! distinct signer kinds, each a valid Ed25519 signature over the
//! pre-known finalize digest, finalizes the sheet").
//!
//! `omr-orchestrator`'s own unit tests already cover the zero-signature
//! `SignatureInsufficient` path; this covers the success path and the
//! two-distinct-kinds rejection, both of which require a populated
//! `SignaturePolicy` the orchestrator's internal harness never builds.

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rust_decimal::Decimal;
    use shared_types::{
        BlockSignature, BubbleDetection, DetectedAnswer, BubbleReading, ManualEntry, PaperId,
        SheetStage, SignerKind,
    };
    use time::OffsetDateTime;

    use omr_ledger::LedgerApi;
    use omr_orchestrator::{Orchestrator, StageOutcome};
    use omr_store::Store;

    use crate::harness::{finalize_digest_for, locked_key, wire_in_memory, Signers};

    async fn score_one_matching_sheet(
        orchestrator: &omr_orchestrator::OrchestratorService,
        store: &std::sync::Arc<dyn omr_store::Store>,
    ) -> (shared_types::Sheet, PaperId) {
        let paper_id = PaperId::new();
        locked_key(store, paper_id, 1, "A").await;

        let sheet = orchestrator.ingest("exam-1".into(), "roll-1".into(), b"bytes").await.unwrap();
        orchestrator.assess_quality(sheet.id, b"bytes").await.unwrap().into_ok().unwrap();

        let bubbles = BubbleReading {
            sheet_id: sheet.id,
            answers: BTreeMap::from([(
                1,
                BubbleDetection { detected_answer: DetectedAnswer::Option("A".into()), confidence: Decimal::new(95, 2) },
            )]),
            created_at: OffsetDateTime::now_utc(),
        };
        orchestrator.record_bubbles(sheet.id, bubbles).await.unwrap().into_ok().unwrap();

        let manual = ManualEntry {
            sheet_id: sheet.id,
            answers: BTreeMap::from([(1, "A".to_string())]),
            entered_by: "grader-1".into(),
            entered_at: OffsetDateTime::now_utc(),
        };
        orchestrator.manual_entry(sheet.id, manual).await.unwrap().into_ok().unwrap();

        orchestrator.reconcile(sheet.id, paper_id).await.unwrap().into_ok().unwrap();
        orchestrator.score(sheet.id, paper_id, None).await.unwrap().into_ok().unwrap();

        // `score` returns a `ScoreResult`, not the `Sheet`; the sheet
        // carried into `finalize` must be re-read so its `updated_at`
        // matches exactly what the digest will be computed over.
        let sheet = store.get_sheet_bundle(sheet.id).await.unwrap().sheet.unwrap();
        (sheet, paper_id)
    }

    #[tokio::test]
    async fn test_finalize_succeeds_with_three_valid_signatures() {
        let signers = Signers::generate();
        let wired = wire_in_memory(&signers);

        let (sheet, _paper_id) = score_one_matching_sheet(&wired.orchestrator, &wired.store).await;

        let digest = finalize_digest_for(&wired.ledger, &sheet).await;
        let signatures = signers.sign_all(&digest);

        let outcome = wired.orchestrator.finalize(sheet.id, signatures).await.unwrap();
        let finalized = outcome.into_ok().expect("three valid distinct-kind signatures finalize the sheet");
        assert_eq!(finalized.stage, SheetStage::Finalized);

        let head = wired.ledger.lock().await.head().unwrap();
        assert_eq!(head.kind, shared_types::BlockKind::ResultFinalized);
        assert_eq!(finalized.last_block_hash, head.self_hash);
    }

    #[tokio::test]
    async fn test_finalize_rejects_two_distinct_signer_kinds() {
        let signers = Signers::generate();
        let wired = wire_in_memory(&signers);

        let (sheet, _paper_id) = score_one_matching_sheet(&wired.orchestrator, &wired.store).await;

        let digest = finalize_digest_for(&wired.ledger, &sheet).await;
        let mut signatures = signers.sign_all(&digest);
        signatures.retain(|s| s.signer_kind != SignerKind::AdminController);
        assert_eq!(signatures.len(), 2);

        let outcome = wired.orchestrator.finalize(sheet.id, signatures).await.unwrap();
        assert!(matches!(
            outcome,
            StageOutcome::SignatureInsufficient { present: 2, required: 3 }
        ));
    }

    #[tokio::test]
    async fn test_finalize_rejects_unregistered_signer() {
        let signers = Signers::generate();
        let wired = wire_in_memory(&signers);

        let (sheet, _paper_id) = score_one_matching_sheet(&wired.orchestrator, &wired.store).await;

        let digest = finalize_digest_for(&wired.ledger, &sheet).await;
        let mut signatures = signers.sign_all(&digest);

        // An otherwise-valid signature from a keypair never added to the
        // registry must not count toward the third distinct kind.
        let impostor = shared_crypto::Ed25519KeyPair::generate();
        signatures[2] = BlockSignature {
            signer_kind: SignerKind::AdminController,
            signer_key: *impostor.public_key().as_bytes(),
            signature: *impostor.sign(&digest).as_bytes(),
        };

        let outcome = wired.orchestrator.finalize(sheet.id, signatures).await.unwrap();
        assert!(matches!(
            outcome,
            StageOutcome::SignatureInsufficient { present: 2, required: 3 }
        ));
    }
}
