//! Background reconciliation of runs that never settled.
//!
//! A run that dies with its process (deploy, crash, OOM) leaves its job in
//! `processing`, which blocks every further run. This service periodically
//! moves such jobs to `timed_out` so they can be run again.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tracing::{error, info, warn};

use animo_db::JobStore;
use animo_models::JobStatus;

use crate::config::ApiConfig;
use crate::metrics;

/// Interval between detection runs.
const DETECTION_INTERVAL: Duration = Duration::from_secs(30);

/// Jobs reconciled per cycle.
const BATCH_SIZE: u32 = 100;

pub const STALE_JOB_MESSAGE: &str =
    "Processing timed out. The run may have been interrupted. Please try again.";

pub struct StaleJobDetector {
    jobs: Arc<dyn JobStore>,
    threshold: Duration,
    enabled: bool,
}

impl StaleJobDetector {
    pub fn new(jobs: Arc<dyn JobStore>, config: &ApiConfig) -> Self {
        Self {
            jobs,
            threshold: config.stale_threshold,
            enabled: config.stale_detection_enabled,
        }
    }

    /// Detection loop; spawn as a background task.
    pub async fn run(&self) {
        if !self.enabled {
            info!("Stale job detection is disabled");
            return;
        }

        info!(
            "Starting stale job detector (interval: {:?}, threshold: {:?})",
            DETECTION_INTERVAL, self.threshold
        );

        let mut ticker = interval(DETECTION_INTERVAL);
        loop {
            ticker.tick().await;

            if let Err(e) = self.check_once().await {
                error!("Stale job detection error: {}", e);
            }
        }
    }

    /// Run a single cycle; returns `(stale, recovered)`.
    pub async fn check_once(&self) -> anyhow::Result<(u32, u32)> {
        let threshold = chrono::Duration::from_std(self.threshold)?;
        let cutoff = Utc::now() - threshold;
        let stale = self.jobs.list_stale_jobs(cutoff, BATCH_SIZE).await?;

        let mut recovered = 0u32;
        for job in &stale {
            warn!(
                job_id = %job.id,
                attempt = job.attempt,
                started_at = ?job.started_at,
                "Detected stale job"
            );

            match self
                .jobs
                .fail_job(&job.id, job.attempt, JobStatus::TimedOut, STALE_JOB_MESSAGE)
                .await
            {
                Ok(Some(_)) => recovered += 1,
                // Settled or re-claimed since the listing
                Ok(None) => {}
                Err(e) => error!(job_id = %job.id, "Failed to recover stale job: {}", e),
            }
        }

        if !stale.is_empty() {
            metrics::record_stale_jobs_recovered(recovered);
            info!(
                "Stale job detection complete: {} stale, {} recovered",
                stale.len(),
                recovered
            );
        }

        Ok((stale.len() as u32, recovered))
    }
}
