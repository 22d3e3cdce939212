//! Shared fixtures for cross-crate scenarios: a fully wired
//! [`OrchestratorService`], signer keypairs registered against a real
//! (non-empty) [`SignaturePolicy`], and the finalize payload
//! reconstruction needed to produce a signature a caller could only have
//! computed from state it already knows.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use shared_crypto::Ed25519KeyPair;
use shared_types::{
    AnswerKey, AnswerKeyEntry, AnswerKeyId, AnswerKeyStatus, BlockKind, BlockSignature, Hash,
    PaperId, PayloadEntry, QuestionPaper, Sheet, SheetStage, SignerKind,
};
use time::OffsetDateTime;
use tokio::sync::Mutex as AsyncMutex;

use omr_adapters::{FakeAnswerKeyVerifier, FakeQualityAssessor, FakeQuestionSolver, FakeReconstructor};
use omr_intervention::InterventionService;
use omr_ledger::{
    domain::mining::{payload_leaf, BlockMaterial},
    merkle_root, signable_digest, ChainStore, InMemoryChainStore, LedgerApi, LedgerConfig,
    LedgerService, SignaturePolicy,
};
use omr_orchestrator::{OrchestratorConfig, OrchestratorService};
use omr_reconciliation::ReconciliationService;
use omr_store::{InMemoryStore, Store};

/// Three registered signers, one per [`SignerKind`], sufficient to
/// satisfy the `RESULT_FINALIZED` multi-signature gate.
pub struct Signers {
    pub ai_verifier: Ed25519KeyPair,
    pub human_verifier: Ed25519KeyPair,
    pub admin_controller: Ed25519KeyPair,
}

impl Signers {
    pub fn generate() -> Self {
        Self {
            ai_verifier: Ed25519KeyPair::generate(),
            human_verifier: Ed25519KeyPair::generate(),
            admin_controller: Ed25519KeyPair::generate(),
        }
    }

    pub fn registry(&self) -> std::collections::HashMap<SignerKind, Vec<[u8; 32]>> {
        std::collections::HashMap::from([
            (SignerKind::AiVerifier, vec![*self.ai_verifier.public_key().as_bytes()]),
            (SignerKind::HumanVerifier, vec![*self.human_verifier.public_key().as_bytes()]),
            (SignerKind::AdminController, vec![*self.admin_controller.public_key().as_bytes()]),
        ])
    }

    /// Sign `digest` with every registered signer, producing a full
    /// three-signer `BlockSignature` set.
    pub fn sign_all(&self, digest: &Hash) -> Vec<BlockSignature> {
        vec![
            BlockSignature {
                signer_kind: SignerKind::AiVerifier,
                signer_key: *self.ai_verifier.public_key().as_bytes(),
                signature: *self.ai_verifier.sign(digest).as_bytes(),
            },
            BlockSignature {
                signer_kind: SignerKind::HumanVerifier,
                signer_key: *self.human_verifier.public_key().as_bytes(),
                signature: *self.human_verifier.sign(digest).as_bytes(),
            },
            BlockSignature {
                signer_kind: SignerKind::AdminController,
                signer_key: *self.admin_controller.public_key().as_bytes(),
                signature: *self.admin_controller.sign(digest).as_bytes(),
            },
        ]
    }
}

/// A wired orchestrator plus the store and ledger underneath it, so
/// tests can inspect persisted state and the chain directly rather than
/// only through the `Orchestrator` trait.
pub struct Wired<C: ChainStore> {
    pub orchestrator: OrchestratorService,
    pub store: Arc<dyn Store>,
    pub ledger: Arc<AsyncMutex<LedgerService<C>>>,
}

/// Build an orchestrator over in-memory store/ledger, with `signers`
/// registered so a `finalize` call can actually be satisfied.
pub fn wire_in_memory(signers: &Signers) -> Wired<InMemoryChainStore> {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let ledger = Arc::new(LedgerService::new(
        InMemoryChainStore::new(),
        SignaturePolicy::new(signers.registry()),
        LedgerConfig::default(),
    ));
    let ledger = Arc::new(AsyncMutex::new(ledger));
    build_with(store, ledger)
}

fn build_with<C: ChainStore + Send + 'static>(
    store: Arc<dyn Store>,
    ledger: Arc<AsyncMutex<LedgerService<C>>>,
) -> Wired<C> {
    let interventions: Arc<dyn omr_intervention::InterventionQueue> =
        Arc::new(InterventionService::new(store.clone()));
    let dyn_ledger: Arc<AsyncMutex<dyn LedgerApi + Send>> = ledger.clone();
    let orchestrator = OrchestratorService::new(
        store.clone(),
        dyn_ledger,
        Arc::new(FakeQualityAssessor::always_proceed()),
        Arc::new(FakeReconstructor::scripted(vec![])),
        Arc::new(FakeQuestionSolver::scripted(vec![])),
        Arc::new(FakeAnswerKeyVerifier::scripted(vec![])),
        Arc::new(ReconciliationService::new(Default::default())),
        interventions,
        OrchestratorConfig::default(),
    );
    Wired { orchestrator, store, ledger }
}

/// Persist a locked answer key for a fresh paper, all questions keyed to
/// `answer` worth two marks each.
pub async fn locked_key(
    store: &Arc<dyn Store>,
    paper_id: PaperId,
    question_count: u32,
    answer: &str,
) -> AnswerKeyId {
    let paper = QuestionPaper {
        id: paper_id,
        exam_id: "exam-1".into(),
        subject: "math".into(),
        total_questions: question_count,
        max_marks: Decimal::from(2 * question_count),
        content_hash: [0u8; 32],
        last_block_hash: [0u8; 32],
        created_at: OffsetDateTime::now_utc(),
        updated_at: OffsetDateTime::now_utc(),
    };
    store.put_question_paper(paper).await.unwrap();

    let entries = (1..=question_count)
        .map(|q| (q, AnswerKeyEntry { expected_answer: answer.to_string(), marks: Decimal::TWO }))
        .collect::<BTreeMap<_, _>>();
    let key = AnswerKey {
        id: AnswerKeyId::new(),
        paper_id,
        entries,
        flags: BTreeMap::new(),
        status: AnswerKeyStatus::Locked,
        last_block_hash: [0u8; 32],
        created_at: OffsetDateTime::now_utc(),
        updated_at: OffsetDateTime::now_utc(),
    };
    let id = key.id;
    store.put_answer_key(key).await.unwrap();
    id
}

/// Reconstruct the exact digest `OrchestratorService::finalize` hashes
/// and asks signers to attest to, from state a caller already holds
/// after `score()` returns: the scored `sheet` and the current ledger
/// head. Mirrors `finalize`'s own `signable_snapshot`/payload
/// construction so a test can produce signatures the real call will
/// accept, without reaching into orchestrator internals.
pub async fn finalize_digest_for<C: ChainStore>(
    ledger: &Arc<AsyncMutex<LedgerService<C>>>,
    sheet: &Sheet,
) -> Hash {
    let guard = ledger.lock().await;
    let head = guard.head();
    drop(guard);

    let index = head.as_ref().map(|b| b.index + 1).unwrap_or(0);
    let prev_hash = head.map(|b| b.self_hash).unwrap_or([0u8; 32]);

    let mut signable_snapshot = sheet.clone();
    signable_snapshot.stage = SheetStage::Finalized;

    let bytes = serde_json::to_vec(&signable_snapshot).expect("Sheet always serializes");
    let entry = PayloadEntry {
        key: "sheet".to_string(),
        value_hash: shared_crypto::blake3_hash(&bytes),
    };
    let root = merkle_root(&[payload_leaf(&entry)]);

    let material = BlockMaterial {
        index,
        timestamp: 0,
        kind: BlockKind::ResultFinalized,
        merkle_root: root,
        prev_hash,
        signatures: &[],
    };
    signable_digest(&material)
}
