use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::TransferStatus;

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status category (e.g. "Not Found", "Conflict")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

/// Unified service-layer error. Every kind maps to a distinct corrective
/// action for the caller, so none of them is ever collapsed into a generic
/// failure on the way out.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Carries the quantity observed under the source-record lock so the
    /// caller can correct the request against fresh numbers.
    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Invalid state transition: cannot {action} a transfer in state {from}")]
    InvalidStateTransition {
        from: TransferStatus,
        action: &'static str,
    },

    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ServiceError::ValidationError(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ServiceError::NotFound(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::InsufficientStock { .. } => StatusCode::CONFLICT,
            ServiceError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
            ServiceError::ConcurrencyConflict(_) => StatusCode::CONFLICT,
            ServiceError::EventError(_) | ServiceError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn response_message(&self) -> String {
        match self {
            // Internal detail stays out of client responses.
            ServiceError::InternalError(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(format!("Invalid input: {}", errors))
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn insufficient_stock_reports_fresh_available() {
        let err = ServiceError::InsufficientStock {
            requested: dec!(999),
            available: dec!(20),
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(err.to_string().contains("available 20"));
    }

    #[test]
    fn internal_detail_is_not_leaked() {
        let err = ServiceError::InternalError("reservation ledger out of sync".into());
        assert_eq!(err.response_message(), "Internal server error");
    }

    #[test]
    fn invalid_transition_names_state_and_action() {
        let err = ServiceError::InvalidStateTransition {
            from: TransferStatus::Completed,
            action: "cancel",
        };
        assert!(err.to_string().contains("cancel"));
        assert!(err.to_string().contains("completed"));
    }
}
