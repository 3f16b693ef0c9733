//! Workflow error types.
//!
//! Every failure that can cross the gateway boundary is a `WorkflowError`.
//! The gateway turns them into `{success:false, error, message}` values via
//! [`WorkflowError::kind`]; nothing propagates past it as a panic.

use thiserror::Error;

use crate::estimate::types::{EstimateEvent, EstimateStatus};

/// Errors that can occur during capture, quoting, or estimate transitions.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Missing or malformed input field (e.g. a non-numeric price).
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Store write or read failed.
    #[error("persistence error: {reason}")]
    Persistence { reason: String },

    /// The caller's expected status no longer matches the persisted one.
    #[error("estimate '{estimate_id}' is {actual}, expected {expected}")]
    StateConflict {
        estimate_id: String,
        expected: EstimateStatus,
        actual: EstimateStatus,
    },

    /// A transition was attempted out of `approved` or `rejected`.
    #[error("estimate '{estimate_id}' is {status} and can no longer change")]
    TerminalState {
        estimate_id: String,
        status: EstimateStatus,
    },

    /// The event is not allowed from the current status.
    #[error("cannot apply {event} to an estimate that is {from}")]
    InvalidTransition {
        from: EstimateStatus,
        event: EstimateEvent,
    },

    /// Unknown conversation or estimate.
    #[error("{entity} not found: '{id}'")]
    NotFound { entity: &'static str, id: String },
}

impl WorkflowError {
    /// Shorthand for a validation failure on a named field.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        WorkflowError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Wire name of the error kind, as returned in the `error` field.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Validation { .. } => "ValidationError",
            WorkflowError::Persistence { .. } => "PersistenceError",
            WorkflowError::StateConflict { .. } => "StateConflictError",
            WorkflowError::TerminalState { .. } => "TerminalStateError",
            WorkflowError::InvalidTransition { .. } => "InvalidTransitionError",
            WorkflowError::NotFound { .. } => "NotFoundError",
        }
    }
}

impl From<rusqlite::Error> for WorkflowError {
    fn from(e: rusqlite::Error) -> Self {
        WorkflowError::Persistence {
            reason: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for WorkflowError {
    fn from(e: serde_json::Error) -> Self {
        WorkflowError::validation("json", e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(
            WorkflowError::validation("notes", "required").kind(),
            "ValidationError"
        );
        assert_eq!(
            WorkflowError::NotFound {
                entity: "estimate",
                id: "x".into()
            }
            .kind(),
            "NotFoundError"
        );
        let conflict = WorkflowError::StateConflict {
            estimate_id: "e1".into(),
            expected: EstimateStatus::Draft,
            actual: EstimateStatus::Approved,
        };
        assert_eq!(conflict.kind(), "StateConflictError");
        assert_eq!(
            conflict.to_string(),
            "estimate 'e1' is approved, expected draft"
        );
    }

    #[test]
    fn test_rusqlite_error_maps_to_persistence() {
        let err: WorkflowError = rusqlite::Error::InvalidQuery.into();
        assert_eq!(err.kind(), "PersistenceError");
    }

    #[test]
    fn test_json_error_maps_to_validation() {
        let err: WorkflowError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), "ValidationError");
    }
}
