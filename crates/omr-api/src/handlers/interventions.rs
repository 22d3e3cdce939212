//! `GET /interventions`, `/interventions/{id}/claim`, `/interventions/{id}/resolve`.

use axum::extract::{Path, Query, State};
use axum::Json;

use shared_types::{InterventionId, InterventionItem};

use crate::domain::dto::{ClaimRequest, ListInterventionsQuery, ResolveRequest};
use crate::domain::error::ApiError;
use crate::router::AppState;

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListInterventionsQuery>,
) -> Result<Json<Vec<InterventionItem>>, ApiError> {
    let items = state
        .store
        .list_interventions(query.status, query.priority, query.assignee.as_deref())
        .await?;
    Ok(Json(items))
}

pub async fn claim(
    State(state): State<AppState>,
    Path(id): Path<InterventionId>,
    Json(req): Json<ClaimRequest>,
) -> Result<Json<InterventionItem>, ApiError> {
    let item = state.interventions.claim(id, &req.assignee).await?;
    Ok(Json(item))
}

pub async fn resolve(
    State(state): State<AppState>,
    Path(id): Path<InterventionId>,
    Json(req): Json<ResolveRequest>,
) -> Result<Json<InterventionItem>, ApiError> {
    let item = state.interventions.resolve(id, &req.assignee, req.resolution_note).await?;
    Ok(Json(item))
}
