//! Domain errors for the intervention queue.
//!
//! Manual `Display`/`Error` impls rather than `thiserror`, matching the
//! convention used for deep domain errors elsewhere in this codebase;
//! `thiserror` is reserved for error types shared across crate boundaries.

use std::fmt;

use shared_types::{InterventionId, InterventionStatus, StorageError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterventionError {
    NotFound(InterventionId),
    AlreadyClaimed {
        id: InterventionId,
        current_assignee: Option<String>,
    },
    NotAssignee {
        id: InterventionId,
        expected: String,
        got: String,
    },
    AlreadyTerminal {
        id: InterventionId,
        status: InterventionStatus,
    },
    Storage(StorageError),
}

impl From<StorageError> for InterventionError {
    fn from(err: StorageError) -> Self {
        InterventionError::Storage(err)
    }
}

impl fmt::Display for InterventionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterventionError::NotFound(id) => write!(f, "intervention {id} not found"),
            InterventionError::AlreadyClaimed { id, current_assignee } => write!(
                f,
                "intervention {id} already claimed by {}",
                current_assignee.as_deref().unwrap_or("<unknown>")
            ),
            InterventionError::NotAssignee { id, expected, got } => write!(
                f,
                "intervention {id} is claimed by {expected}, not {got}"
            ),
            InterventionError::AlreadyTerminal { id, status } => {
                write!(f, "intervention {id} is already terminal ({status:?})")
            }
            InterventionError::Storage(err) => write!(f, "storage error: {err}"),
        }
    }
}

impl std::error::Error for InterventionError {}
