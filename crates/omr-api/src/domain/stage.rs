//! Renders a [`StageOutcome`] as an HTTP response. `Ok` maps to 200;
//! every other variant is one of the named gates of §7, rendered through
//! [`ApiError`] so the caller always sees the same `{code, message,
//! details?}` envelope regardless of which gate tripped.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use omr_orchestrator::StageOutcome;

use super::error::{ApiError, ErrorKind};

pub fn stage_response<T: Serialize>(outcome: StageOutcome<T>) -> Response {
    match outcome {
        StageOutcome::Ok(v) => (StatusCode::OK, Json(v)).into_response(),
        StageOutcome::PreconditionFailed { current_state, expected } => ApiError::with_details(
            ErrorKind::PreconditionFailed,
            format!("precondition failed: expected {expected}, found {current_state}"),
            json!({ "current_state": current_state, "expected": expected }),
        )
        .into_response(),
        StageOutcome::GateBlocked { intervention_ids } => ApiError::with_details(
            ErrorKind::GateBlocked,
            "progression requires human resolution",
            json!({ "intervention_ids": intervention_ids }),
        )
        .into_response(),
        StageOutcome::AdapterUnavailable { adapter, reason, intervention_id } => ApiError::with_details(
            ErrorKind::AdapterUnavailable,
            format!("adapter '{adapter}' unavailable: {reason}"),
            json!({ "adapter": adapter, "intervention_id": intervention_id }),
        )
        .into_response(),
        StageOutcome::Cancelled { intervention_id } => ApiError::with_details(
            ErrorKind::Cancelled,
            "stage cancelled",
            json!({ "intervention_id": intervention_id }),
        )
        .into_response(),
        StageOutcome::SignatureInsufficient { present, required } => ApiError::with_details(
            ErrorKind::SignatureInsufficient,
            format!("{present} of {required} required signatures present"),
            json!({ "present": present, "required": required }),
        )
        .into_response(),
    }
}
