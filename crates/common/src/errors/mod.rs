//! Error types for ReviewForge services
//!
//! Provides the workflow error taxonomy with:
//! - Distinct error types for every failed precondition
//! - HTTP status code mapping
//! - Structured error responses with actionable details
//! - Retry classification for callers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::ManuscriptStatus;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,

    // Authentication errors (2xxx)
    Unauthenticated,

    // Authorization errors (3xxx)
    Unauthorized,
    SelfReviewForbidden,

    // Resource errors (4xxx)
    NotFound,

    // Workflow conflicts (5xxx)
    InvalidTransition,
    PlagiarismPending,
    PlagiarismFlagged,
    DuplicateReview,
    DuplicateAssignment,
    InsufficientReviews,
    ConcurrentModification,

    // Rate limiting (6xxx)
    RateLimited,

    // Storage errors (7xxx)
    StoreUnavailable,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,

            ErrorCode::Unauthenticated => 2001,

            ErrorCode::Unauthorized => 3001,
            ErrorCode::SelfReviewForbidden => 3002,

            ErrorCode::NotFound => 4001,

            ErrorCode::InvalidTransition => 5001,
            ErrorCode::PlagiarismPending => 5002,
            ErrorCode::PlagiarismFlagged => 5003,
            ErrorCode::DuplicateReview => 5004,
            ErrorCode::DuplicateAssignment => 5005,
            ErrorCode::InsufficientReviews => 5006,
            ErrorCode::ConcurrentModification => 5007,

            ErrorCode::RateLimited => 6001,

            ErrorCode::StoreUnavailable => 7001,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
        }
    }
}

/// Application error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Unauthenticated: {message}")]
    Unauthenticated { message: String },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Reviewer {reviewer_id} is the author of manuscript {manuscript_id}")]
    SelfReviewForbidden { manuscript_id: Uuid, reviewer_id: Uuid },

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("Cannot {action} while manuscript is {status}")]
    InvalidTransition {
        action: &'static str,
        status: ManuscriptStatus,
    },

    #[error("Plagiarism check for manuscript {manuscript_id} has not completed")]
    PlagiarismPending { manuscript_id: Uuid },

    #[error("Plagiarism score {score} exceeds threshold {threshold}")]
    PlagiarismFlagged { score: f64, threshold: f64 },

    #[error("Reviewer {reviewer_id} already reviewed revision {revision_number}")]
    DuplicateReview { reviewer_id: Uuid, revision_number: u32 },

    #[error("Reviewer {reviewer_id} is already assigned to revision {revision_number}")]
    DuplicateAssignment { reviewer_id: Uuid, revision_number: u32 },

    #[error("Review cycle needs {required} reviews, {submitted} submitted")]
    InsufficientReviews { required: u32, submitted: u32 },

    #[error("Manuscript {manuscript_id} was modified concurrently")]
    ConcurrentModification { manuscript_id: Uuid },

    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    #[error("Store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Shorthand for a validation failure on a named field
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: Some(field.to_string()),
        }
    }

    pub fn manuscript_not_found(id: Uuid) -> Self {
        AppError::NotFound {
            resource: "manuscript",
            id: id.to_string(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::Unauthenticated { .. } => ErrorCode::Unauthenticated,
            AppError::Unauthorized { .. } => ErrorCode::Unauthorized,
            AppError::SelfReviewForbidden { .. } => ErrorCode::SelfReviewForbidden,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            AppError::PlagiarismPending { .. } => ErrorCode::PlagiarismPending,
            AppError::PlagiarismFlagged { .. } => ErrorCode::PlagiarismFlagged,
            AppError::DuplicateReview { .. } => ErrorCode::DuplicateReview,
            AppError::DuplicateAssignment { .. } => ErrorCode::DuplicateAssignment,
            AppError::InsufficientReviews { .. } => ErrorCode::InsufficientReviews,
            AppError::ConcurrentModification { .. } => ErrorCode::ConcurrentModification,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::StoreUnavailable { .. } => ErrorCode::StoreUnavailable,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Internal { .. } => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            AppError::Unauthorized { .. } |
            AppError::SelfReviewForbidden { .. } => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::InvalidTransition { .. } |
            AppError::DuplicateReview { .. } |
            AppError::DuplicateAssignment { .. } |
            AppError::InsufficientReviews { .. } |
            AppError::ConcurrentModification { .. } => StatusCode::CONFLICT,

            // 422 Unprocessable Entity
            AppError::PlagiarismPending { .. } |
            AppError::PlagiarismFlagged { .. } => StatusCode::UNPROCESSABLE_ENTITY,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Configuration { .. } |
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,

            // 503 Service Unavailable
            AppError::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Only storage outages may be retried without the caller changing intent
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StoreUnavailable { .. })
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Machine-readable description of the failed precondition
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::Validation { field: Some(field), .. } => Some(json!({ "field": field })),
            AppError::InvalidTransition { action, status } => Some(json!({
                "action": action,
                "status": status,
                "allowed_next": status.valid_transitions(),
            })),
            AppError::PlagiarismFlagged { score, threshold } => Some(json!({
                "score": score,
                "threshold": threshold,
                "override_allowed": true,
            })),
            AppError::InsufficientReviews { required, submitted } => Some(json!({
                "required": required,
                "submitted": submitted,
            })),
            AppError::DuplicateReview { revision_number, .. } |
            AppError::DuplicateAssignment { revision_number, .. } => Some(json!({
                "revision_number": revision_number,
            })),
            AppError::StoreUnavailable { .. } => Some(json!({ "retryable": true })),
            _ => None,
        }
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details: self.details(),
                request_id: None, // Should be filled by middleware
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Driver errors are logged here and never surfaced verbatim
impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        tracing::error!(error = %err, "Manuscript store error");
        AppError::StoreUnavailable {
            message: "manuscript store request failed".to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors.field_errors().keys().next().map(|f| f.to_string());
        AppError::Validation {
            message: errors.to_string(),
            field,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        AppError::StoreUnavailable {
            message: "manuscript store did not respond in time".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::manuscript_not_found(Uuid::nil());
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::validation("title", "Title must not be empty");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
        assert_eq!(err.details(), Some(json!({ "field": "title" })));
    }

    #[test]
    fn test_only_store_unavailable_is_retryable() {
        let outage = AppError::StoreUnavailable { message: "timeout".into() };
        assert!(outage.is_retryable());
        assert_eq!(outage.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let conflict = AppError::ConcurrentModification { manuscript_id: Uuid::nil() };
        assert!(!conflict.is_retryable());
        assert!(!AppError::DuplicateReview { reviewer_id: Uuid::nil(), revision_number: 1 }.is_retryable());
    }

    #[test]
    fn test_invalid_transition_details() {
        let err = AppError::InvalidTransition {
            action: "decide",
            status: ManuscriptStatus::Accepted,
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "Cannot decide while manuscript is accepted");

        let details = err.details().unwrap();
        assert_eq!(details["status"], "accepted");
        assert_eq!(details["allowed_next"], json!([]));
    }

    #[test]
    fn test_db_errors_are_not_leaked() {
        let err = AppError::from(sea_orm::DbErr::Custom("password=hunter2".into()));
        assert_eq!(err.code(), ErrorCode::StoreUnavailable);
        assert!(!err.to_string().contains("hunter2"));
    }

    #[test]
    fn test_plagiarism_gates_are_unprocessable() {
        let err = AppError::PlagiarismFlagged { score: 0.5, threshold: 0.3 };
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code().as_code(), 5003);
    }
}
