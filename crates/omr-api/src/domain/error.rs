//! The error envelope of §6.1/§7: `{code, message, details?}`.
//!
//! `code` is the error *kind*, not a type name, per §7's "Error kinds
//! (not type names)". `ApiError` implements `axum::IntoResponse` directly
//! so handlers can `.map_err(ApiError::from)?` and let `?` do the rest: a
//! thin wire type plus `From` conversions from every internal error a
//! handler can surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use omr_intervention::InterventionError;
use omr_ledger::ChainError;
use omr_orchestrator::OrchestratorError;
use shared_types::StorageError;

/// The §7 error taxonomy, serialized as the `code` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    NotFound,
    PreconditionFailed,
    GateBlocked,
    AdapterUnavailable,
    ChainIntegrityError,
    SignatureInsufficient,
    Cancelled,
    Internal,
}

impl ErrorKind {
    fn status(self) -> StatusCode {
        match self {
            ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::PreconditionFailed => StatusCode::CONFLICT,
            ErrorKind::GateBlocked => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::SignatureInsufficient => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::AdapterUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::ChainIntegrityError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Cancelled => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorKind, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), details: None }
    }

    pub fn with_details(code: ErrorKind, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self { code, message: message.into(), details: Some(details) }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationError, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status();
        (status, Json(self)).into_response()
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(e: OrchestratorError) -> Self {
        match e {
            OrchestratorError::SheetNotFound(id) => ApiError::not_found(format!("sheet not found: {id}")),
            OrchestratorError::KeyNotFound(id) => ApiError::not_found(format!("answer key not found: {id}")),
            OrchestratorError::Storage(e) => e.into(),
            OrchestratorError::Ledger(e) => e.into(),
            OrchestratorError::Intervention(e) => e.into(),
            OrchestratorError::LedgerContention { attempts } => ApiError::new(
                ErrorKind::Internal,
                format!("ledger contention: gave up after {attempts} attempts"),
            ),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(what) => ApiError::not_found(what),
            StorageError::DataCorruption(_) | StorageError::UnresolvedJournal(_) | StorageError::DatabaseError(_) => {
                ApiError::new(ErrorKind::Internal, e.to_string())
            }
        }
    }
}

impl From<ChainError> for ApiError {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::IntegrityViolation { .. } => ApiError::new(ErrorKind::ChainIntegrityError, e.to_string()),
            ChainError::SignatureInsufficient { present, required } => ApiError::with_details(
                ErrorKind::SignatureInsufficient,
                e.to_string(),
                serde_json::json!({ "present": present, "required": required }),
            ),
            ChainError::ChainStale { .. } | ChainError::MiningBudgetExceeded { .. } => {
                ApiError::new(ErrorKind::Internal, e.to_string())
            }
        }
    }
}

impl From<InterventionError> for ApiError {
    fn from(e: InterventionError) -> Self {
        match e {
            InterventionError::NotFound(id) => ApiError::not_found(format!("intervention not found: {id}")),
            InterventionError::AlreadyClaimed { .. }
            | InterventionError::NotAssignee { .. }
            | InterventionError::AlreadyTerminal { .. } => ApiError::new(ErrorKind::PreconditionFailed, e.to_string()),
            InterventionError::Storage(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_not_found_maps_to_404() {
        let err: ApiError = OrchestratorError::SheetNotFound(shared_types::SheetId::new()).into();
        assert_eq!(err.code, ErrorKind::NotFound);
        assert_eq!(err.code.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_signature_insufficient_carries_counts_and_422() {
        let err: ApiError = ChainError::SignatureInsufficient { present: 1, required: 3 }.into();
        assert_eq!(err.code, ErrorKind::SignatureInsufficient);
        assert_eq!(err.code.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.details.unwrap()["required"], 3);
    }

    #[test]
    fn test_chain_integrity_violation_maps_to_500() {
        let err: ApiError = ChainError::IntegrityViolation { index: 4, reason: "bad hash".into() }.into();
        assert_eq!(err.code, ErrorKind::ChainIntegrityError);
        assert_eq!(err.code.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
