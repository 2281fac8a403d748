//! Persistence seams.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use animo_models::{
    AspectRatio, JobId, JobStatus, MediaJob, MotionStyle, NewMediaJob, NewOrder, Order, OrderId,
};

use crate::error::DbResult;

/// Default number of jobs returned for an order's history.
pub const DEFAULT_HISTORY_LIMIT: u32 = 25;

/// Parameters of the conditional `→ processing` transition.
#[derive(Debug, Clone, PartialEq)]
pub struct JobClaim {
    /// The attempt counter observed when the job was loaded
    pub expected_attempt: u32,
    /// Replaces the stored ratio when present
    pub aspect_ratio: Option<AspectRatio>,
    /// Replaces the stored style when present
    pub motion_style: Option<MotionStyle>,
    /// Written to `started_at`; microsecond precision so it round-trips
    pub started_at: DateTime<Utc>,
}

impl JobClaim {
    /// Attempt number the job will carry once claimed.
    pub fn next_attempt(&self) -> u32 {
        self.expected_attempt + 1
    }

    /// Whether `job` is exactly the row this claim would have produced.
    ///
    /// Lets a caller recognise its own claim after a lost response.
    pub fn produced(&self, job: &MediaJob) -> bool {
        job.status == JobStatus::Processing
            && job.attempt == self.next_attempt()
            && job.started_at == Some(self.started_at)
    }
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create_order(&self, new: NewOrder) -> DbResult<Order>;

    async fn get_order(&self, id: &OrderId) -> DbResult<Option<Order>>;
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a `queued` job.
    async fn insert_job(&self, new: NewMediaJob) -> DbResult<MediaJob>;

    async fn get_job(&self, id: &JobId) -> DbResult<Option<MediaJob>>;

    /// Newest first.
    async fn list_jobs_for_order(&self, order_id: &OrderId, limit: u32) -> DbResult<Vec<MediaJob>>;

    /// Move a runnable job to `processing`.
    ///
    /// Matches only when the status is one of [`JobStatus::RUNNABLE`] and the
    /// attempt counter still equals `claim.expected_attempt`. Clears `error`
    /// and bumps the counter in the same write. `None` means another caller
    /// got there first or the job is not runnable.
    async fn claim_job(&self, id: &JobId, claim: JobClaim) -> DbResult<Option<MediaJob>>;

    /// `processing → done`, only for the run holding `attempt`.
    async fn complete_job(
        &self,
        id: &JobId,
        attempt: u32,
        output_video_key: &str,
        finished_at: DateTime<Utc>,
    ) -> DbResult<Option<MediaJob>>;

    /// `processing → failed | timed_out`, only for the run holding `attempt`.
    async fn fail_job(
        &self,
        id: &JobId,
        attempt: u32,
        status: JobStatus,
        error: &str,
    ) -> DbResult<Option<MediaJob>>;

    /// Jobs still `processing` that were claimed before `started_before`.
    async fn list_stale_jobs(
        &self,
        started_before: DateTime<Utc>,
        limit: u32,
    ) -> DbResult<Vec<MediaJob>>;

    /// Reachability check for readiness checks.
    async fn ping(&self) -> DbResult<()>;
}
