//! Error types for image preparation.

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while preparing an image.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Unsupported or corrupt image: {0}")]
    Decode(String),

    #[error("Image encoding failed: {0}")]
    Encode(String),

    #[error("Empty image")]
    Empty,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode(message.into())
    }

    /// True when the input itself is at fault (callers answer 400).
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, MediaError::Decode(_) | MediaError::Empty)
    }
}
