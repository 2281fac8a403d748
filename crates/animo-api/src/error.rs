//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use animo_db::DbError;
use animo_storage::StorageError;
use animo_worker::WorkerError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid payload")]
    Validation(String),

    /// A run ended in an error state; `details` is what was recorded on the job.
    #[error("Job failed")]
    JobFailed(String),

    #[error("{0}")]
    Internal(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::JobFailed(_)
            | ApiError::Internal(_)
            | ApiError::Storage(_)
            | ApiError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn is_internal(&self) -> bool {
        matches!(self, ApiError::Internal(_) | ApiError::Storage(_) | ApiError::Database(_))
    }
}

impl From<WorkerError> for ApiError {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::NotFound(_) => ApiError::not_found("Job not found"),
            WorkerError::Conflict => ApiError::conflict("Job is already processing"),
            WorkerError::Superseded => ApiError::conflict("Job was superseded by a newer run"),
            WorkerError::Database(e) => ApiError::Database(e),
            other => ApiError::JobFailed(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = if self.is_internal() {
            // Don't expose internal error details in production
            let details = if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
                None
            } else {
                Some(self.to_string())
            };
            ErrorResponse {
                error: "Internal error".to_string(),
                details,
            }
        } else {
            let details = match &self {
                ApiError::Validation(d) | ApiError::JobFailed(d) => Some(d.clone()),
                _ => None,
            };
            ErrorResponse {
                error: self.to_string(),
                details,
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use animo_runway::GenerationError;

    #[test]
    fn test_worker_error_mapping() {
        assert_eq!(
            ApiError::from(WorkerError::not_found("x")).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ApiError::from(WorkerError::Conflict).status_code(), StatusCode::CONFLICT);
        assert_eq!(ApiError::from(WorkerError::Superseded).status_code(), StatusCode::CONFLICT);

        let failed = ApiError::from(WorkerError::Generation(GenerationError::Cancelled));
        assert_eq!(failed.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(matches!(failed, ApiError::JobFailed(ref d) if d == "Generation cancelled"));
    }

    #[test]
    fn test_messages() {
        assert_eq!(ApiError::bad_request("Missing jobId").to_string(), "Missing jobId");
        assert_eq!(ApiError::Validation("email".into()).to_string(), "Invalid payload");
    }
}
