//! Media job definitions.

use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AspectRatio, IdParseError, JobStatus, MotionStyle, OrderId};

/// Unique identifier for a media job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parse and normalize a UUID string.
    pub fn parse(s: &str) -> Result<Self, IdParseError> {
        Uuid::parse_str(s.trim())
            .map(|u| Self(u.to_string()))
            .map_err(|_| IdParseError {
                kind: "job",
                value: s.to_string(),
            })
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One photo-to-video conversion attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MediaJob {
    pub id: JobId,

    pub order_id: OrderId,

    /// Storage key of the prepared (letterboxed) image; never changes
    pub input_image_key: String,

    /// Storage key of the generated video; present iff status is `done`
    #[serde(default)]
    pub output_video_key: Option<String>,

    pub aspect_ratio: AspectRatio,

    pub motion_style: MotionStyle,

    pub status: JobStatus,

    /// Last failure reason; present only in error states
    #[serde(default)]
    pub error: Option<String>,

    /// Number of times a run has claimed this job
    #[serde(default)]
    pub attempt: u32,

    /// When the current/last run claimed the job
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,

    /// Set on the transition to `done`
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl MediaJob {
    /// Check whether the status-dependent fields agree with the status.
    pub fn is_consistent(&self) -> bool {
        let output_ok = self.output_video_key.is_some() == (self.status == JobStatus::Done);
        let error_ok = self.error.is_none() || self.status.is_error();
        let finished_ok = self.finished_at.is_none() || self.status == JobStatus::Done;
        output_ok && error_ok && finished_ok
    }

    /// Seconds since the current run claimed the job.
    pub fn running_for_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        self.started_at.map(|t| (now - t).num_seconds())
    }
}

/// Input for inserting a freshly uploaded job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMediaJob {
    pub order_id: OrderId,
    pub input_image_key: String,
    pub aspect_ratio: AspectRatio,
    pub motion_style: MotionStyle,
}

impl NewMediaJob {
    /// Build the `queued` row to insert.
    pub fn into_job(self) -> MediaJob {
        MediaJob {
            id: JobId::new(),
            order_id: self.order_id,
            input_image_key: self.input_image_key,
            output_video_key: None,
            aspect_ratio: self.aspect_ratio,
            motion_style: self.motion_style,
            status: JobStatus::Queued,
            error: None,
            attempt: 0,
            started_at: None,
            finished_at: None,
            created_at: Utc::now(),
        }
    }
}
