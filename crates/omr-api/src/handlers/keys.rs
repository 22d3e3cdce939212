//! `POST /keys`, `GET /keys/{id}`, `/keys/{id}/verify`, `/approve`, `/lock`.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;

use shared_types::{AnswerKey, AnswerKeyId};

use crate::domain::dto::{ApproveKeyRequest, SubmitKeyRequest};
use crate::domain::error::ApiError;
use crate::domain::stage::stage_response;
use crate::router::AppState;

pub async fn submit_key(
    State(state): State<AppState>,
    Json(req): Json<SubmitKeyRequest>,
) -> Result<Json<AnswerKey>, ApiError> {
    let key = state.orchestrator.submit_answer_key(req.paper_id, req.entries).await?;
    Ok(Json(key))
}

pub async fn get_key(State(state): State<AppState>, Path(id): Path<AnswerKeyId>) -> Result<Json<AnswerKey>, ApiError> {
    let key = state
        .store
        .get_answer_key(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("answer key not found: {id}")))?;
    Ok(Json(key))
}

pub async fn verify_key(State(state): State<AppState>, Path(id): Path<AnswerKeyId>) -> Result<Response, ApiError> {
    let outcome = state.orchestrator.verify_answer_key(id).await?;
    Ok(stage_response(outcome))
}

pub async fn approve_key(
    State(state): State<AppState>,
    Path(id): Path<AnswerKeyId>,
    Json(req): Json<ApproveKeyRequest>,
) -> Result<Response, ApiError> {
    let outcome = state.orchestrator.approve_answer_key(id, req.corrections).await?;
    Ok(stage_response(outcome))
}

pub async fn lock_key(State(state): State<AppState>, Path(id): Path<AnswerKeyId>) -> Result<Response, ApiError> {
    let outcome = state.orchestrator.lock_answer_key(id).await?;
    Ok(stage_response(outcome))
}
