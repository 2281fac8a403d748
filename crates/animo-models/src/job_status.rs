//! Media job status and its state machine.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Job processing status.
///
/// ```text
/// queued ──run──► processing ──► done
///                     │
///                     ├──► failed ────┐
///                     └──► timed_out ─┴─run──► processing
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Image prepared and stored, waiting for an explicit run
    #[default]
    Queued,
    /// A run has claimed the job and is talking to the provider
    Processing,
    /// Output video stored
    Done,
    /// Last run failed; may be re-run
    Failed,
    /// Last run exceeded its polling budget or went stale; may be re-run
    TimedOut,
}

impl JobStatus {
    /// Statuses from which a run may claim the job.
    pub const RUNNABLE: [JobStatus; 3] =
        [JobStatus::Queued, JobStatus::Failed, JobStatus::TimedOut];

    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
            JobStatus::TimedOut => "timed_out",
        }
    }

    /// Check if this is a terminal state (no run is in flight).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed | JobStatus::TimedOut)
    }

    /// Check if a run may claim a job in this state.
    pub fn is_runnable(&self) -> bool {
        Self::RUNNABLE.contains(self)
    }

    /// Check if this state carries an error message.
    pub fn is_error(&self) -> bool {
        matches!(self, JobStatus::Failed | JobStatus::TimedOut)
    }

    /// Check whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (from, JobStatus::Processing) => from.is_runnable(),
            (JobStatus::Processing, to) => to.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
