//! In-process store with the same conditional semantics as the REST tables.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use animo_models::{JobId, JobStatus, MediaJob, NewMediaJob, NewOrder, Order, OrderId};

use crate::error::{DbError, DbResult};
use crate::store::{JobClaim, JobStore, OrderStore};

#[derive(Default)]
struct Tables {
    orders: HashMap<OrderId, Order>,
    jobs: HashMap<JobId, MediaJob>,
}

/// Mutex-guarded tables implementing both [`OrderStore`] and [`JobStore`].
///
/// Every operation runs under one lock, so conditional updates are atomic
/// exactly like a single-row `UPDATE … WHERE` in Postgres.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a job row verbatim.
    pub async fn put_job(&self, job: MediaJob) {
        self.tables.lock().await.jobs.insert(job.id.clone(), job);
    }

    pub async fn job_count(&self) -> usize {
        self.tables.lock().await.jobs.len()
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create_order(&self, new: NewOrder) -> DbResult<Order> {
        let order = new.into_order();
        self.tables
            .lock()
            .await
            .orders
            .insert(order.id.clone(), order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: &OrderId) -> DbResult<Option<Order>> {
        Ok(self.tables.lock().await.orders.get(id).cloned())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert_job(&self, new: NewMediaJob) -> DbResult<MediaJob> {
        let mut tables = self.tables.lock().await;
        if !tables.orders.contains_key(&new.order_id) {
            return Err(DbError::Conflict(format!(
                "media_jobs.order_id references missing order {}",
                new.order_id
            )));
        }
        let job = new.into_job();
        tables.jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    async fn get_job(&self, id: &JobId) -> DbResult<Option<MediaJob>> {
        Ok(self.tables.lock().await.jobs.get(id).cloned())
    }

    async fn list_jobs_for_order(&self, order_id: &OrderId, limit: u32) -> DbResult<Vec<MediaJob>> {
        let tables = self.tables.lock().await;
        let mut jobs: Vec<MediaJob> = tables
            .jobs
            .values()
            .filter(|j| &j.order_id == order_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.truncate(limit as usize);
        Ok(jobs)
    }

    async fn claim_job(&self, id: &JobId, claim: JobClaim) -> DbResult<Option<MediaJob>> {
        let mut tables = self.tables.lock().await;
        let Some(job) = tables.jobs.get_mut(id) else {
            return Ok(None);
        };
        if !job.status.is_runnable() || job.attempt != claim.expected_attempt {
            return Ok(None);
        }

        job.status = JobStatus::Processing;
        job.error = None;
        job.attempt = claim.next_attempt();
        job.started_at = Some(claim.started_at);
        if let Some(ratio) = claim.aspect_ratio {
            job.aspect_ratio = ratio;
        }
        if let Some(style) = claim.motion_style {
            job.motion_style = style;
        }
        Ok(Some(job.clone()))
    }

    async fn complete_job(
        &self,
        id: &JobId,
        attempt: u32,
        output_video_key: &str,
        finished_at: DateTime<Utc>,
    ) -> DbResult<Option<MediaJob>> {
        let mut tables = self.tables.lock().await;
        match tables.jobs.get_mut(id) {
            Some(job) if job.status == JobStatus::Processing && job.attempt == attempt => {
                job.status = JobStatus::Done;
                job.output_video_key = Some(output_video_key.to_string());
                job.finished_at = Some(finished_at);
                job.error = None;
                Ok(Some(job.clone()))
            }
            _ => Ok(None),
        }
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
        let mut tables = self.tables.lock().await;
        match tables.jobs.get_mut(id) {
            Some(job) if job.status == JobStatus::Processing && job.attempt == attempt => {
                job.status = status;
                job.error = Some(error.to_string());
                Ok(Some(job.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list_stale_jobs(
        &self,
        started_before: DateTime<Utc>,
        limit: u32,
    ) -> DbResult<Vec<MediaJob>> {
        let tables = self.tables.lock().await;
        let mut jobs: Vec<MediaJob> = tables
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Processing)
            .filter(|j| j.started_at.is_some_and(|t| t < started_before))
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.started_at);
        jobs.truncate(limit as usize);
        Ok(jobs)
    }

    async fn ping(&self) -> DbResult<()> {
        Ok(())
    }
}
