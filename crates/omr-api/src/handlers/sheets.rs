//! The per-sheet pipeline endpoints (§4.6/§6.1): one handler per stage
//! transition, plus `workflow/complete`.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use base64::Engine;
use time::OffsetDateTime;

use omr_orchestrator::WorkflowReport;
use shared_types::{BubbleReading, ManualEntry, Sheet};

use crate::domain::dto::{
    AiSolveRequest, BubblesRequest, FinalizeRequest, IngestSheetRequest, ManualEntryRequest, ReconcileRequest,
    ReconstructRequest, ScoreRequest, WorkflowCompleteRequest,
};
use crate::domain::error::ApiError;
use crate::domain::stage::stage_response;
use crate::router::AppState;

fn decode_base64(field: &str, value: &str) -> Result<Vec<u8>, ApiError> {
    base64::engine::general_purpose::STANDARD
        .decode(value)
        .map_err(|e| ApiError::validation(format!("invalid {field}: {e}")))
}

pub async fn ingest(
    State(state): State<AppState>,
    Json(req): Json<IngestSheetRequest>,
) -> Result<Json<Sheet>, ApiError> {
    let image_bytes = decode_base64("image_base64", &req.image_base64)?;
    let sheet = state.orchestrator.ingest(req.exam_id, req.roll_number, &image_bytes).await?;
    Ok(Json(sheet))
}

pub async fn get_sheet(
    State(state): State<AppState>,
    Path(id): Path<shared_types::SheetId>,
) -> Result<Json<Sheet>, ApiError> {
    let bundle = state.store.get_sheet_bundle(id).await?;
    let sheet = bundle.sheet.ok_or_else(|| ApiError::not_found(format!("sheet not found: {id}")))?;
    Ok(Json(sheet))
}

pub async fn assess_quality(
    State(state): State<AppState>,
    Path(id): Path<shared_types::SheetId>,
    Json(req): Json<crate::domain::dto::ImageBytesRequest>,
) -> Result<Response, ApiError> {
    let image_bytes = decode_base64("image_base64", &req.image_base64)?;
    let outcome = state.orchestrator.assess_quality(id, &image_bytes).await?;
    Ok(stage_response(outcome))
}

pub async fn reconstruct(
    State(state): State<AppState>,
    Path(id): Path<shared_types::SheetId>,
    Json(req): Json<ReconstructRequest>,
) -> Result<Response, ApiError> {
    let damaged_bytes = decode_base64("damaged_image_base64", &req.damaged_image_base64)?;
    let outcome = state
        .orchestrator
        .reconstruct(id, &damaged_bytes, req.expected_rows, req.expected_cols)
        .await?;
    Ok(stage_response(outcome))
}

pub async fn record_bubbles(
    State(state): State<AppState>,
    Path(id): Path<shared_types::SheetId>,
    Json(req): Json<BubblesRequest>,
) -> Result<Response, ApiError> {
    let reading = BubbleReading { sheet_id: id, answers: req.answers, created_at: OffsetDateTime::now_utc() };
    let outcome = state.orchestrator.record_bubbles(id, reading).await?;
    Ok(stage_response(outcome))
}

pub async fn ai_solve(
    State(state): State<AppState>,
    Path(id): Path<shared_types::SheetId>,
    Json(req): Json<AiSolveRequest>,
) -> Result<Response, ApiError> {
    let outcome = state.orchestrator.ai_solve(id, req.question_bank).await?;
    Ok(stage_response(outcome))
}

pub async fn manual_entry(
    State(state): State<AppState>,
    Path(id): Path<shared_types::SheetId>,
    Json(req): Json<ManualEntryRequest>,
) -> Result<Response, ApiError> {
    let entry = ManualEntry {
        sheet_id: id,
        answers: req.answers,
        entered_by: req.entered_by,
        entered_at: OffsetDateTime::now_utc(),
    };
    let outcome = state.orchestrator.manual_entry(id, entry).await?;
    Ok(stage_response(outcome))
}

pub async fn reconcile(
    State(state): State<AppState>,
    Path(id): Path<shared_types::SheetId>,
    Json(req): Json<ReconcileRequest>,
) -> Result<Response, ApiError> {
    let outcome = state.orchestrator.reconcile(id, req.paper_id).await?;
    Ok(stage_response(outcome))
}

pub async fn score(
    State(state): State<AppState>,
    Path(id): Path<shared_types::SheetId>,
    Json(req): Json<ScoreRequest>,
) -> Result<Response, ApiError> {
    let outcome = state.orchestrator.score(id, req.paper_id, req.manual_marks).await?;
    Ok(stage_response(outcome))
}

pub async fn finalize(
    State(state): State<AppState>,
    Path(id): Path<shared_types::SheetId>,
    Json(req): Json<FinalizeRequest>,
) -> Result<Response, ApiError> {
    let outcome = state.orchestrator.finalize(id, req.signatures).await?;
    Ok(stage_response(outcome))
}

pub async fn workflow_complete(
    State(state): State<AppState>,
    Json(req): Json<WorkflowCompleteRequest>,
) -> Result<Json<WorkflowReport>, ApiError> {
    let report = state.orchestrator.workflow_complete(req.sheet_id, req.paper_id).await?;
    Ok(Json(report))
}
