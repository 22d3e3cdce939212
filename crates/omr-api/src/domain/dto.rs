//! Request/response shapes whose wire form differs from the stored
//! entity: image bytes travel as base64, hashes travel as hex, and a few
//! requests only carry the subset of fields the caller supplies (the
//! server fills in ids/timestamps). Entities that round-trip as-is
//! (`Sheet`, `AnswerKey`, `QuestionPaper`, `Reconciliation`, ...) are
//! returned directly by handlers; this module exists only for the
//! shapes that need adapting.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shared_types::{BlockKind, BlockSignature, BubbleDetection, Hash, LedgerBlock, PaperId, PayloadEntry};

fn hash_to_hex(hash: &Hash) -> String {
    hex::encode(hash)
}

#[derive(Debug, Deserialize)]
pub struct CreatePaperRequest {
    pub exam_id: String,
    pub subject: String,
    pub total_questions: u32,
    pub max_marks: Decimal,
    pub content_base64: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitKeyRequest {
    pub paper_id: PaperId,
    pub entries: BTreeMap<u32, shared_types::AnswerKeyEntry>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ApproveKeyRequest {
    #[serde(default)]
    pub corrections: BTreeMap<u32, shared_types::AnswerKeyEntry>,
}

#[derive(Debug, Deserialize)]
pub struct IngestSheetRequest {
    pub exam_id: String,
    pub roll_number: String,
    pub image_base64: String,
}

#[derive(Debug, Deserialize)]
pub struct ImageBytesRequest {
    pub image_base64: String,
}

#[derive(Debug, Deserialize)]
pub struct ReconstructRequest {
    pub damaged_image_base64: String,
    pub expected_rows: u32,
    pub expected_cols: u32,
}

#[derive(Debug, Deserialize)]
pub struct BubblesRequest {
    pub answers: BTreeMap<u32, BubbleDetection>,
}

#[derive(Debug, Deserialize)]
pub struct AiSolveRequest {
    /// question number -> (question text, subject).
    pub question_bank: BTreeMap<u32, (String, String)>,
}

#[derive(Debug, Deserialize)]
pub struct ManualEntryRequest {
    pub answers: BTreeMap<u32, String>,
    pub entered_by: String,
}

#[derive(Debug, Deserialize)]
pub struct ReconcileRequest {
    pub paper_id: PaperId,
}

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub paper_id: PaperId,
    #[serde(default)]
    pub manual_marks: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct FinalizeRequest {
    #[serde(default)]
    pub signatures: Vec<BlockSignature>,
}

#[derive(Debug, Deserialize)]
pub struct WorkflowCompleteRequest {
    pub sheet_id: shared_types::SheetId,
    pub paper_id: PaperId,
}

#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub assignee: String,
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub assignee: String,
    pub resolution_note: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListInterventionsQuery {
    pub status: Option<shared_types::InterventionStatus>,
    pub priority: Option<shared_types::InterventionPriority>,
    pub assignee: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListBlocksQuery {
    pub limit: Option<u64>,
    pub after: Option<u64>,
}

/// Hex-readable rendering of a [`LedgerBlock`] for the `/ledger/*`
/// endpoints. The raw entity's `Hash`/`PublicKey`/`Signature` fields are
/// plain byte arrays, fine for internal hashing but unreadable over the
/// wire.
#[derive(Debug, Serialize)]
pub struct LedgerBlockView {
    pub index: u64,
    pub timestamp: i128,
    pub kind: BlockKind,
    pub payload: Vec<PayloadEntryView>,
    pub merkle_root: String,
    pub prev_hash: String,
    pub signatures: Vec<BlockSignatureView>,
    pub nonce: u64,
    pub self_hash: String,
}

#[derive(Debug, Serialize)]
pub struct PayloadEntryView {
    pub key: String,
    pub value_hash: String,
}

#[derive(Debug, Serialize)]
pub struct BlockSignatureView {
    pub signer_kind: shared_types::SignerKind,
    pub signer_key: String,
    pub signature: String,
}

impl From<&LedgerBlock> for LedgerBlockView {
    fn from(block: &LedgerBlock) -> Self {
        Self {
            index: block.index,
            timestamp: block.timestamp,
            kind: block.kind,
            payload: block
                .payload
                .iter()
                .map(|p| PayloadEntryView { key: p.key.clone(), value_hash: hash_to_hex(&p.value_hash) })
                .collect(),
            merkle_root: hash_to_hex(&block.merkle_root),
            prev_hash: hash_to_hex(&block.prev_hash),
            signatures: block
                .signatures
                .iter()
                .map(|s| BlockSignatureView {
                    signer_kind: s.signer_kind,
                    signer_key: hex::encode(s.signer_key),
                    signature: hex::encode(s.signature),
                })
                .collect(),
            nonce: block.nonce,
            self_hash: hash_to_hex(&block.self_hash),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_block_view_hex_encodes_hashes() {
        let block = LedgerBlock {
            index: 0,
            timestamp: 0,
            kind: BlockKind::SheetIngested,
            payload: vec![],
            merkle_root: [0u8; 32],
            prev_hash: [0u8; 32],
            signatures: vec![],
            nonce: 0,
            self_hash: [1u8; 32],
        };
        let view = LedgerBlockView::from(&block);
        assert_eq!(view.self_hash, hex::encode([1u8; 32]));
        assert_eq!(view.prev_hash, "0".repeat(64));
    }
}
