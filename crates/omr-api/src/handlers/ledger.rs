//! `GET /ledger/status`, `/ledger/blocks`, `/ledger/block/{hash}`, `/ledger/validate`.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Serialize;

use crate::domain::dto::{LedgerBlockView, ListBlocksQuery};
use crate::domain::error::ApiError;
use crate::router::AppState;

const DEFAULT_LIST_LIMIT: u64 = 50;

#[derive(Debug, Serialize)]
pub struct LedgerStatus {
    pub block_count: u64,
    pub head: Option<LedgerBlockView>,
}

pub async fn status(State(state): State<AppState>) -> Json<LedgerStatus> {
    let ledger = state.ledger.lock().await;
    let head = ledger.head();
    let block_count = head.as_ref().map(|b| b.index + 1).unwrap_or(0);
    Json(LedgerStatus { block_count, head: head.as_ref().map(LedgerBlockView::from) })
}

pub async fn list_blocks(
    State(state): State<AppState>,
    Query(query): Query<ListBlocksQuery>,
) -> Json<Vec<LedgerBlockView>> {
    let ledger = state.ledger.lock().await;
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let start = query.after.map(|a| a + 1).unwrap_or(0);

    let mut blocks = Vec::new();
    let mut index = start;
    while blocks.len() as u64 != limit {
        match ledger.get_by_index(index) {
            Some(block) => {
                blocks.push(LedgerBlockView::from(&block));
                index += 1;
            }
            None => break,
        }
    }
    Json(blocks)
}

pub async fn get_block(
    State(state): State<AppState>,
    Path(hash_hex): Path<String>,
) -> Result<Json<LedgerBlockView>, ApiError> {
    let bytes = hex::decode(&hash_hex).map_err(|e| ApiError::validation(format!("invalid hash: {e}")))?;
    let hash: shared_types::Hash =
        bytes.try_into().map_err(|_| ApiError::validation("hash must be 32 bytes"))?;

    let ledger = state.ledger.lock().await;
    let block = ledger.get_by_hash(&hash).ok_or_else(|| ApiError::not_found(format!("no block with hash {hash_hex}")))?;
    Ok(Json(LedgerBlockView::from(&block)))
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
}

pub async fn validate(State(state): State<AppState>) -> Result<Json<ValidateResponse>, ApiError> {
    let ledger = state.ledger.lock().await;
    ledger.validate()?;
    Ok(Json(ValidateResponse { valid: true }))
}
