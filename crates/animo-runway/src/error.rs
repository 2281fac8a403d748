//! Generation client error types.

use thiserror::Error;

pub type GenerationResult<T> = Result<T, GenerationError>;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("{operation} failed ({status}): {body}")]
    ProviderStatus {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Upload failed ({status}): {body}")]
    Upload { status: u16, body: String },

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Download failed ({status})")]
    Download { status: u16 },

    #[error("Generation timed out after {attempts} polls ({elapsed_secs}s)")]
    TimedOut { attempts: u32, elapsed_secs: u64 },

    #[error("Generation cancelled")]
    Cancelled,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GenerationError {
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Transient failures worth repeating an idempotent request for.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            GenerationError::ProviderStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, GenerationError::TimedOut { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        let status = |status| GenerationError::ProviderStatus {
            operation: "Task status",
            status,
            body: String::new(),
        };
        assert!(status(502).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!GenerationError::GenerationFailed("{}".into()).is_retryable());
    }

    #[test]
    fn test_upload_error_message() {
        let err = GenerationError::Upload {
            status: 403,
            body: "AccessDenied".into(),
        };
        assert_eq!(err.to_string(), "Upload failed (403): AccessDenied");
    }
}
