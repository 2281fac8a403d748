//! Persistence error types.

use thiserror::Error;

/// Result type for persistence operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur while reading or writing rows.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database configuration error: {0}")]
    ConfigError(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Row not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Conflict(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Rate limited, retry after {0}ms")]
    RateLimited(u64),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DbError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::AuthError(message),
            404 => Self::NotFound(message),
            409 => Self::Conflict(message),
            429 => Self::RateLimited(1000),
            500..=599 => Self::ServerError(status, message),
            _ => Self::RequestFailed(message),
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DbError::Network(_) | DbError::RateLimited(_) | DbError::ServerError(_, _)
        )
    }

    /// Server-provided backoff hint.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            DbError::RateLimited(ms) => Some(*ms),
            _ => None,
        }
    }

    /// HTTP status to record in metrics, when one applies.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            DbError::AuthError(_) => Some(401),
            DbError::NotFound(_) => Some(404),
            DbError::Conflict(_) => Some(409),
            DbError::RateLimited(_) => Some(429),
            DbError::ServerError(status, _) => Some(*status),
            DbError::RequestFailed(_) => Some(400),
            DbError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
