//! Shared data models for the Animo backend.
//!
//! This crate provides Serde-serializable types for:
//! - Orders (one customer session)
//! - Media jobs (one photo-to-video conversion)
//! - Job statuses and their transition rules
//! - Aspect ratios and motion styles

pub mod job;
pub mod job_status;
pub mod order;
pub mod style;

// Re-export common types
pub use job::{JobId, MediaJob, NewMediaJob};
pub use job_status::JobStatus;
pub use order::{NewOrder, Order, OrderId};
pub use style::{AspectRatio, MotionStyle, StyleParseError};

use thiserror::Error;

/// Error returned when an identifier is not a well-formed UUID.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {kind} id: {value}")]
pub struct IdParseError {
    pub kind: &'static str,
    pub value: String,
}
