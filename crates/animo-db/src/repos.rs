//! Typed repositories for the `orders` and `media_jobs` tables.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use metrics::counter;
use serde::Serialize;
use tracing::{debug, info};

use animo_models::{
    AspectRatio, JobId, JobStatus, MediaJob, MotionStyle, NewMediaJob, NewOrder, Order, OrderId,
};

use crate::client::PostgrestClient;
use crate::error::{DbError, DbResult};
use crate::store::{JobClaim, JobStore, OrderStore};

const ORDERS: &str = "orders";
const MEDIA_JOBS: &str = "media_jobs";

/// Repository for order rows.
#[derive(Clone)]
pub struct OrderRepository {
    client: PostgrestClient,
}

impl OrderRepository {
    pub fn new(client: PostgrestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OrderStore for OrderRepository {
    async fn create_order(&self, new: NewOrder) -> DbResult<Order> {
        let order = new.into_order();
        let created: Order = self.client.insert("create_order", ORDERS, &order).await?;
        info!(order_id = %created.id, locale = %created.locale, "Created order");
        Ok(created)
    }

    async fn get_order(&self, id: &OrderId) -> DbResult<Option<Order>> {
        let query = format!("id=eq.{}&select=*", urlencoding::encode(id.as_str()));
        let mut rows: Vec<Order> = self.client.select("get_order", ORDERS, &query).await?;
        Ok(rows.pop())
    }
}

/// Repository for media job rows.
#[derive(Clone)]
pub struct JobRepository {
    client: PostgrestClient,
}

impl JobRepository {
    pub fn new(client: PostgrestClient) -> Self {
        Self { client }
    }

    fn id_filter(id: &JobId) -> String {
        format!("id=eq.{}", urlencoding::encode(id.as_str()))
    }

    /// Filter matching only the run that holds `attempt`.
    fn owned_by_run(id: &JobId, attempt: u32) -> String {
        format!(
            "{}&status=eq.{}&attempt=eq.{}",
            Self::id_filter(id),
            JobStatus::Processing.as_str(),
            attempt
        )
    }

    fn single(rows: Vec<MediaJob>, operation: &str) -> DbResult<Option<MediaJob>> {
        match rows.len() {
            0 | 1 => Ok(rows.into_iter().next()),
            n => Err(DbError::InvalidResponse(format!(
                "{} matched {} rows for a single id",
                operation, n
            ))),
        }
    }
}

// =============================================================================
// Patch bodies
// =============================================================================

#[derive(Serialize)]
struct ClaimPatch {
    status: JobStatus,
    error: Option<String>,
    attempt: u32,
    started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aspect_ratio: Option<AspectRatio>,
    #[serde(skip_serializing_if = "Option::is_none")]
    motion_style: Option<MotionStyle>,
}

#[derive(Serialize)]
struct CompletePatch<'a> {
    status: JobStatus,
    output_video_key: &'a str,
    finished_at: DateTime<Utc>,
    error: Option<String>,
}

#[derive(Serialize)]
struct FailPatch<'a> {
    status: JobStatus,
    error: &'a str,
}

#[async_trait]
impl JobStore for JobRepository {
    async fn insert_job(&self, new: NewMediaJob) -> DbResult<MediaJob> {
        let job = new.into_job();
        let created: MediaJob = self.client.insert("insert_job", MEDIA_JOBS, &job).await?;
        counter!("animo_jobs_created_total").increment(1);
        info!(job_id = %created.id, order_id = %created.order_id, "Inserted queued job");
        Ok(created)
    }

    async fn get_job(&self, id: &JobId) -> DbResult<Option<MediaJob>> {
        let query = format!("{}&select=*", Self::id_filter(id));
        let rows = self.client.select("get_job", MEDIA_JOBS, &query).await?;
        Self::single(rows, "get_job")
    }

    async fn list_jobs_for_order(&self, order_id: &OrderId, limit: u32) -> DbResult<Vec<MediaJob>> {
        let query = format!(
            "order_id=eq.{}&select=*&order=created_at.desc&limit={}",
            urlencoding::encode(order_id.as_str()),
            limit
        );
        self.client.select("list_jobs_for_order", MEDIA_JOBS, &query).await
    }

    async fn claim_job(&self, id: &JobId, claim: JobClaim) -> DbResult<Option<MediaJob>> {
        let runnable = JobStatus::RUNNABLE
            .iter()
            .map(JobStatus::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let filter = format!(
            "{}&status=in.({})&attempt=eq.{}",
            Self::id_filter(id),
            runnable,
            claim.expected_attempt
        );

        let patch = ClaimPatch {
            status: JobStatus::Processing,
            error: None,
            attempt: claim.next_attempt(),
            started_at: claim.started_at,
            aspect_ratio: claim.aspect_ratio,
            motion_style: claim.motion_style,
        };

        let rows = self.client.update("claim_job", MEDIA_JOBS, &filter, &patch).await?;
        let claimed = Self::single(rows, "claim_job")?;
        debug!(job_id = %id, claimed = claimed.is_some(), "Claim attempted");
        Ok(claimed)
    }

    async fn complete_job(
        &self,
        id: &JobId,
        attempt: u32,
        output_video_key: &str,
        finished_at: DateTime<Utc>,
    ) -> DbResult<Option<MediaJob>> {
        let patch = CompletePatch {
            status: JobStatus::Done,
            output_video_key,
            finished_at,
            error: None,
        };
        let rows = self
            .client
            .update("complete_job", MEDIA_JOBS, &Self::owned_by_run(id, attempt), &patch)
            .await?;
        Self::single(rows, "complete_job")
    }

    async fn fail_job(
        &self,
        id: &JobId,
        attempt: u32,
        status: JobStatus,
        error: &str,
    ) -> DbResult<Option<MediaJob>> {
        if !status.is_error() {
            return Err(DbError::request_failed(format!(
                "fail_job called with non-error status {}",
                status
            )));
        }
        let patch = FailPatch { status, error };
        let rows = self
            .client
            .update("fail_job", MEDIA_JOBS, &Self::owned_by_run(id, attempt), &patch)
            .await?;
        Self::single(rows, "fail_job")
    }

    async fn list_stale_jobs(
        &self,
        started_before: DateTime<Utc>,
        limit: u32,
    ) -> DbResult<Vec<MediaJob>> {
        let cutoff = started_before.to_rfc3339_opts(SecondsFormat::Micros, true);
        let query = format!(
            "status=eq.{}&started_at=lt.{}&select=*&order=started_at.asc&limit={}",
            JobStatus::Processing.as_str(),
            urlencoding::encode(&cutoff),
            limit
        );
        self.client.select("list_stale_jobs", MEDIA_JOBS, &query).await
    }

    async fn ping(&self) -> DbResult<()> {
        let _: Vec<serde_json::Value> = self
            .client
            .select("ping", ORDERS, "select=id&limit=1")
            .await?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
