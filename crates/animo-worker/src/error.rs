//! Worker error types.

use thiserror::Error;

use animo_db::DbError;
use animo_models::JobStatus;
use animo_runway::GenerationError;
use animo_storage::StorageError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job is already processing")]
    Conflict,

    #[error("Job was superseded by a newer run")]
    Superseded,

    #[error("Failed to read input image: {0}")]
    StorageRead(#[source] StorageError),

    #[error("Failed to store output video: {0}")]
    StorageWrite(#[source] StorageError),

    #[error("Rejected output URL: {0}")]
    UnsafeOutputUrl(String),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl WorkerError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn unsafe_output_url(msg: impl Into<String>) -> Self {
        Self::UnsafeOutputUrl(msg.into())
    }

    /// The generation polling budget ran out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, WorkerError::Generation(e) if e.is_timeout())
    }

    /// Status persisted when this error ends a run.
    pub fn failure_status(&self) -> JobStatus {
        if self.is_timeout() {
            JobStatus::TimedOut
        } else {
            JobStatus::Failed
        }
    }
}
