use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::ports::RepositoryError;
use crate::services::publisher::PublishError;

/// Failures of the transaction pipeline.
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("No gateway exists for currency {currency} in country {country_id}")]
    NoRoute { country_id: i64, currency: String },

    #[error("Transaction {0} not found")]
    NotFound(i64),

    #[error("Invalid webhook: {0}")]
    InvalidWebhook(String),

    #[error("Failed to persist transaction: {0}")]
    Create(#[source] RepositoryError),

    #[error("Transaction {id} could not be moved to PENDING after gateway hand-off: {source}")]
    StatusTransition { id: i64, source: RepositoryError },

    #[error("Failed to publish transaction {id}, marked KAFKA_PUBLISH_FAILED: {source}")]
    PublishFailed { id: i64, source: PublishError },

    #[error("Transaction {id}: publish failed ({publish}) and fallback status update failed: {source}")]
    Reconciliation {
        id: i64,
        publish: PublishError,
        source: RepositoryError,
    },

    #[error("Malformed stream message at {topic}/{partition}@{offset}: {source}")]
    Decode {
        topic: String,
        partition: i32,
        offset: i64,
        source: serde_json::Error,
    },

    #[error("Bulk update failed: {0}")]
    BulkUpdate(#[source] RepositoryError),

    #[error("Dead-letter write failed: {0}")]
    DeadLetter(#[source] RepositoryError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ProcessingError {
    /// Store and stream may have diverged; needs an operator.
    pub fn is_consistency_error(&self) -> bool {
        matches!(
            self,
            ProcessingError::StatusTransition { .. } | ProcessingError::Reconciliation { .. }
        )
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Request timed out")]
    Timeout,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl From<ProcessingError> for AppError {
    fn from(err: ProcessingError) -> Self {
        match err {
            ProcessingError::NoRoute { .. } | ProcessingError::InvalidWebhook(_) => {
                AppError::BadRequest(err.to_string())
            }
            ProcessingError::NotFound(_) => AppError::NotFound(err.to_string()),
            ProcessingError::PublishFailed { .. } => AppError::Unavailable(err.to_string()),
            ProcessingError::Create(_)
            | ProcessingError::Repository(_)
            | ProcessingError::BulkUpdate(_)
            | ProcessingError::DeadLetter(_) => AppError::DatabaseError(err.to_string()),
            ProcessingError::StatusTransition { .. }
            | ProcessingError::Reconciliation { .. }
            | ProcessingError::Decode { .. } => AppError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
