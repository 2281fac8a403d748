//! Job lifecycle metrics.

use std::time::Duration;

use metrics::{counter, histogram};

use animo_models::JobStatus;

pub mod names {
    pub const JOBS_STARTED: &str = "animo_jobs_started_total";
    pub const JOBS_COMPLETED: &str = "animo_jobs_completed_total";
    pub const JOBS_FAILED: &str = "animo_jobs_failed_total";
    pub const JOBS_TIMED_OUT: &str = "animo_jobs_timed_out_total";
    pub const GENERATION_DURATION: &str = "animo_generation_duration_seconds";
}

pub fn record_job_started(style: &'static str) {
    counter!(names::JOBS_STARTED, "style" => style).increment(1);
}

pub fn record_job_completed(style: &'static str, duration: Duration) {
    counter!(names::JOBS_COMPLETED, "style" => style).increment(1);
    histogram!(names::GENERATION_DURATION, "style" => style).record(duration.as_secs_f64());
}

pub fn record_job_failed(status: JobStatus) {
    match status {
        JobStatus::TimedOut => counter!(names::JOBS_TIMED_OUT).increment(1),
        _ => counter!(names::JOBS_FAILED).increment(1),
    }
}
