//! Job run and status handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use animo_models::{AspectRatio, JobId, MediaJob, MotionStyle};
use animo_worker::{JobOverrides, RunOutcome};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunJobRequest {
    pub job_id: String,
    #[serde(default)]
    pub aspect_ratio: Option<AspectRatio>,
    #[serde(default)]
    pub motion_style: Option<MotionStyle>,
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub ok: bool,
    pub job: MediaJob,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<&'static str>,
}

impl JobResponse {
    fn new(job: MediaJob) -> Self {
        Self {
            ok: true,
            job,
            note: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JobStatusQuery {
    #[serde(rename = "jobId", default)]
    pub job_id: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/jobs/run
///
/// Runs the job to completion within the request. The run executes on its own
/// task; if the client goes away the task is cancelled and the job ends up
/// `failed`.
///
/// Returns:
/// - 200: `{ ok, job }`, with `note: "Already done"` when nothing ran
/// - 400: invalid body
/// - 404: unknown job
/// - 409: the job is being processed by another run
/// - 500: `{ error: "Job failed", details }`
pub async fn run_job(
    State(state): State<AppState>,
    payload: Result<Json<RunJobRequest>, JsonRejection>,
) -> ApiResult<Json<JobResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    let job_id = JobId::parse(&request.job_id).map_err(|e| ApiError::Validation(e.to_string()))?;
    let overrides = JobOverrides {
        aspect_ratio: request.aspect_ratio,
        motion_style: request.motion_style,
    };

    info!(job_id = %job_id, ?overrides, "Run requested");

    let cancel = CancellationToken::new();
    // Dropped with this future when the client disconnects
    let guard = cancel.clone().drop_guard();

    let runner = state.runner.clone();
    let handle = tokio::spawn(async move { runner.run(&job_id, overrides, cancel).await });
    let result = handle
        .await
        .map_err(|e| ApiError::internal(format!("Run task aborted: {}", e)))?;
    guard.disarm();

    match result? {
        RunOutcome::Completed(job) => Ok(Json(JobResponse::new(job))),
        RunOutcome::AlreadyDone(job) => Ok(Json(JobResponse {
            note: Some("Already done"),
            ..JobResponse::new(job)
        })),
    }
}

/// GET /api/jobs/status?jobId=
pub async fn job_status(
    State(state): State<AppState>,
    Query(query): Query<JobStatusQuery>,
) -> ApiResult<Json<JobResponse>> {
    let raw = query
        .job_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing jobId"))?;
    let job_id = JobId::parse(&raw).map_err(|_| ApiError::bad_request("Invalid jobId"))?;

    let job = state
        .jobs
        .get_job(&job_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    Ok(Json(JobResponse::new(job)))
}
