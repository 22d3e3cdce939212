//! `POST /papers`, `GET /papers/{id}`.

use axum::extract::{Path, State};
use axum::Json;
use base64::Engine;

use shared_types::{PaperId, QuestionPaper};

use crate::domain::dto::CreatePaperRequest;
use crate::domain::error::ApiError;
use crate::router::AppState;

pub async fn create_paper(
    State(state): State<AppState>,
    Json(req): Json<CreatePaperRequest>,
) -> Result<Json<QuestionPaper>, ApiError> {
    let content_bytes = base64::engine::general_purpose::STANDARD
        .decode(&req.content_base64)
        .map_err(|e| ApiError::validation(format!("invalid content_base64: {e}")))?;

    let paper = state
        .orchestrator
        .create_question_paper(req.exam_id, req.subject, req.total_questions, req.max_marks, &content_bytes)
        .await?;
    Ok(Json(paper))
}

pub async fn get_paper(
    State(state): State<AppState>,
    Path(id): Path<PaperId>,
) -> Result<Json<QuestionPaper>, ApiError> {
    let paper = state
        .store
        .get_question_paper(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("paper not found: {id}")))?;
    Ok(Json(paper))
}
