//! Job runner.

use std::sync::Arc;
use std::time::Instant;

use chrono::{SubsecRound, Utc};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use animo_db::{JobClaim, JobStore};
use animo_models::{AspectRatio, JobId, JobStatus, MediaJob, MotionStyle};
use animo_runway::VideoGenerator;
use animo_storage::{output_video_key, BlobStore};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::output_url::check_output_url;
use crate::prompt::build_prompt;

const PROVIDER_INPUT_FILENAME: &str = "input.jpg";
const PROVIDER_INPUT_CONTENT_TYPE: &str = "image/jpeg";
const OUTPUT_CONTENT_TYPE: &str = "video/mp4";

/// Per-run replacements for the stored generation parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobOverrides {
    pub aspect_ratio: Option<AspectRatio>,
    pub motion_style: Option<MotionStyle>,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The run produced a video; the job is `done`.
    Completed(MediaJob),
    /// The job was already `done`; nothing was touched.
    AlreadyDone(MediaJob),
}

impl RunOutcome {
    pub fn job(&self) -> &MediaJob {
        match self {
            RunOutcome::Completed(job) | RunOutcome::AlreadyDone(job) => job,
        }
    }

    pub fn into_job(self) -> MediaJob {
        match self {
            RunOutcome::Completed(job) | RunOutcome::AlreadyDone(job) => job,
        }
    }
}

/// Where a loaded job stands with respect to a new run.
enum Admission {
    Claimable(MediaJob),
    Settled(RunOutcome),
}

fn admit(job: MediaJob) -> WorkerResult<Admission> {
    match job.status {
        JobStatus::Done => Ok(Admission::Settled(RunOutcome::AlreadyDone(job))),
        JobStatus::Processing => Err(WorkerError::Conflict),
        _ => Ok(Admission::Claimable(job)),
    }
}

/// Whether `job` is the `done` row written by the run holding `attempt`.
fn completed_by(job: &MediaJob, attempt: u32, output_key: &str) -> bool {
    job.status == JobStatus::Done
        && job.attempt == attempt
        && job.output_video_key.as_deref() == Some(output_key)
}

/// Drives jobs through generation.
#[derive(Clone)]
pub struct JobRunner {
    jobs: Arc<dyn JobStore>,
    storage: Arc<dyn BlobStore>,
    generator: Arc<dyn VideoGenerator>,
    config: WorkerConfig,
}

impl JobRunner {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        storage: Arc<dyn BlobStore>,
        generator: Arc<dyn VideoGenerator>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            jobs,
            storage,
            generator,
            config,
        }
    }

    /// Run one job to a terminal state.
    ///
    /// `done` jobs are returned untouched; `processing` jobs are rejected with
    /// [`WorkerError::Conflict`]. Once the claim lands, every failure is
    /// persisted on the job (`failed`, or `timed_out` when polling ran out)
    /// before it is returned. Cancelling `cancel` stops a pending generation
    /// and records the job as failed.
    pub async fn run(
        &self,
        job_id: &JobId,
        overrides: JobOverrides,
        cancel: CancellationToken,
    ) -> WorkerResult<RunOutcome> {
        let logger = JobLogger::new(job_id, "generate_video");
        let span = logger.create_span();

        async {
            let job = match self.claim(job_id, overrides).await? {
                Admission::Settled(outcome) => {
                    logger.log_progress("already done, nothing to run");
                    return Ok(outcome);
                }
                Admission::Claimable(job) => job,
            };

            let logger = logger.with_attempt(job.attempt);
            let style = job.motion_style.as_str();
            logger.log_start(&format!(
                "ratio={} style={}",
                job.aspect_ratio, job.motion_style
            ));
            metrics::record_job_started(style);
            let started = Instant::now();

            match self.generate(&job, &cancel, &logger).await {
                Ok(done) => {
                    metrics::record_job_completed(style, started.elapsed());
                    logger.log_completion(done.output_video_key.as_deref().unwrap_or_default());
                    Ok(RunOutcome::Completed(done))
                }
                Err(WorkerError::Superseded) => {
                    logger.log_warning("superseded by a newer run, output discarded");
                    Err(WorkerError::Superseded)
                }
                Err(e) => {
                    self.record_failure(&job, &e, &logger).await;
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Load the job and move it to `processing`.
    async fn claim(&self, job_id: &JobId, overrides: JobOverrides) -> WorkerResult<Admission> {
        let job = self
            .jobs
            .get_job(job_id)
            .await?
            .ok_or_else(|| WorkerError::not_found(job_id.as_str()))?;

        let job = match admit(job)? {
            Admission::Claimable(job) => job,
            settled => return Ok(settled),
        };

        let claim = JobClaim {
            expected_attempt: job.attempt,
            aspect_ratio: overrides.aspect_ratio,
            motion_style: overrides.motion_style,
            started_at: Utc::now().trunc_subsecs(6),
        };

        match self.jobs.claim_job(job_id, claim.clone()).await {
            Ok(Some(claimed)) => Ok(Admission::Claimable(claimed)),
            Ok(None) => {
                // Either someone else moved the job between our read and
                // write, or a retried write found our own earlier commit
                let current = self
                    .jobs
                    .get_job(job_id)
                    .await?
                    .ok_or_else(|| WorkerError::not_found(job_id.as_str()))?;
                if claim.produced(&current) {
                    return Ok(Admission::Claimable(current));
                }
                match admit(current)? {
                    settled @ Admission::Settled(_) => Ok(settled),
                    Admission::Claimable(_) => Err(WorkerError::Conflict),
                }
            }
            Err(e) => {
                // The write may have landed even though the response was lost
                match self.jobs.get_job(job_id).await {
                    Ok(Some(current)) if claim.produced(&current) => {
                        Ok(Admission::Claimable(current))
                    }
                    _ => Err(e.into()),
                }
            }
        }
    }

    async fn generate(
        &self,
        job: &MediaJob,
        cancel: &CancellationToken,
        logger: &JobLogger,
    ) -> WorkerResult<MediaJob> {
        let input = self
            .storage
            .get(&job.input_image_key)
            .await
            .map_err(WorkerError::StorageRead)?;

        let prompt = build_prompt(job.motion_style);
        let provider_uri = self
            .generator
            .upload_ephemeral(input, PROVIDER_INPUT_FILENAME, PROVIDER_INPUT_CONTENT_TYPE)
            .await?;
        logger.log_progress("input uploaded to provider");

        let task = self
            .generator
            .generate(&provider_uri, &prompt, job.aspect_ratio, cancel)
            .await?;
        logger.log_progress(&format!("task {} succeeded", task.id));

        let output_url = task.output_url()?;
        check_output_url(&output_url, self.config.allow_private_output_hosts)?;
        let video = self.generator.fetch_output(&output_url).await?;

        let key = output_video_key(&job.order_id, &job.id, job.attempt);
        self.storage
            .put(&key, video, OUTPUT_CONTENT_TYPE)
            .await
            .map_err(WorkerError::StorageWrite)?;

        let completed = self
            .jobs
            .complete_job(&job.id, job.attempt, &key, Utc::now())
            .await;
        match completed {
            Ok(Some(done)) => Ok(done),
            Ok(None) => {
                // A retried write reports no match when the first one landed
                let current = self.jobs.get_job(&job.id).await?;
                if let Some(done) = current.filter(|c| completed_by(c, job.attempt, &key)) {
                    return Ok(done);
                }
                if let Err(e) = self.storage.delete(&key).await {
                    logger.log_warning(&format!("failed to delete orphaned output {}: {}", key, e));
                }
                Err(WorkerError::Superseded)
            }
            Err(e) => match self.jobs.get_job(&job.id).await {
                Ok(Some(current)) if completed_by(&current, job.attempt, &key) => Ok(current),
                // The output stays in place; the row may still point at it
                _ => Err(e.into()),
            },
        }
    }

    async fn record_failure(&self, job: &MediaJob, err: &WorkerError, logger: &JobLogger) {
        let status = err.failure_status();
        metrics::record_job_failed(status);
        logger.log_error(&format!("{} ({})", err, status));

        match self
            .jobs
            .fail_job(&job.id, job.attempt, status, &err.to_string())
            .await
        {
            Ok(Some(_)) => {}
            Ok(None) => logger.log_warning("job no longer owned by this run, failure not recorded"),
            Err(db) => logger.log_error(&format!("failed to record failure: {}", db)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use animo_db::{DbError, DbResult, MemoryStore, OrderStore};
    use animo_models::{NewMediaJob, NewOrder, OrderId};
    use animo_runway::{GenerationError, GenerationResult, TaskStatus};
    use animo_storage::LocalStore;

    #[derive(Clone, Copy)]
    enum Behavior {
        Succeed,
        ProviderFails,
        TimesOut,
        WaitForCancel,
        NoOutput,
        InternalOutputUrl,
    }

    struct FakeGenerator {
        behavior: Behavior,
        gate: Option<Arc<Notify>>,
        uploads: AtomicU32,
        generations: AtomicU32,
        seen: Mutex<Vec<(String, AspectRatio)>>,
    }

    impl FakeGenerator {
        fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                gate: None,
                uploads: AtomicU32::new(0),
                generations: AtomicU32::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn gated(behavior: Behavior, gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::new(behavior)
            }
        }
    }

    #[async_trait]
    impl VideoGenerator for FakeGenerator {
        async fn upload_ephemeral(
            &self,
            bytes: Vec<u8>,
            filename: &str,
            content_type: &str,
        ) -> GenerationResult<String> {
            assert!(!bytes.is_empty());
            assert_eq!(filename, "input.jpg");
            assert_eq!(content_type, "image/jpeg");
            self.uploads.fetch_add(1, Ordering::SeqCst);
            Ok("runway://uploads/fake".to_string())
        }

        async fn generate(
            &self,
            provider_uri: &str,
            prompt: &str,
            ratio: AspectRatio,
            cancel: &CancellationToken,
        ) -> GenerationResult<TaskStatus> {
            assert_eq!(provider_uri, "runway://uploads/fake");
            self.generations.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push((prompt.to_string(), ratio));
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }

            match self.behavior {
                Behavior::Succeed => Ok(TaskStatus::from_payload(
                    "task-1",
                    serde_json::json!({
                        "status": "SUCCEEDED",
                        "output": ["https://cdn.example.com/v.mp4"],
                    }),
                )),
                Behavior::ProviderFails => Err(GenerationError::GenerationFailed(
                    r#"{"status":"FAILED","failure":"moderation"}"#.to_string(),
                )),
                Behavior::TimesOut => Err(GenerationError::TimedOut {
                    attempts: 120,
                    elapsed_secs: 600,
                }),
                Behavior::WaitForCancel => {
                    cancel.cancelled().await;
                    Err(GenerationError::Cancelled)
                }
                Behavior::NoOutput => Ok(TaskStatus::from_payload(
                    "task-1",
                    serde_json::json!({"status": "SUCCEEDED", "output": []}),
                )),
                Behavior::InternalOutputUrl => Ok(TaskStatus::from_payload(
                    "task-1",
                    serde_json::json!({
                        "status": "SUCCEEDED",
                        "output": ["http://169.254.169.254/latest"],
                    }),
                )),
            }
        }

        async fn fetch_output(&self, url: &str) -> GenerationResult<Vec<u8>> {
            assert_eq!(url, "https://cdn.example.com/v.mp4");
            Ok(vec![0u8; 12])
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum LostWrite {
        Claim,
        Complete,
        CompleteErrors,
    }

    /// Commits one kind of write to the inner store but answers as if the
    /// response went missing: a retried conditional update sees no match,
    /// an exhausted retry surfaces the last error.
    struct LostResponseStore {
        inner: Arc<MemoryStore>,
        lost: LostWrite,
    }

    #[async_trait]
    impl JobStore for LostResponseStore {
        async fn insert_job(&self, new: NewMediaJob) -> DbResult<MediaJob> {
            self.inner.insert_job(new).await
        }

        async fn get_job(&self, id: &JobId) -> DbResult<Option<MediaJob>> {
            self.inner.get_job(id).await
        }

        async fn list_jobs_for_order(
            &self,
            order_id: &OrderId,
            limit: u32,
        ) -> DbResult<Vec<MediaJob>> {
            self.inner.list_jobs_for_order(order_id, limit).await
        }

        async fn claim_job(&self, id: &JobId, claim: JobClaim) -> DbResult<Option<MediaJob>> {
            let claimed = self.inner.claim_job(id, claim).await?;
            Ok(claimed.filter(|_| self.lost != LostWrite::Claim))
        }

        async fn complete_job(
            &self,
            id: &JobId,
            attempt: u32,
            output_video_key: &str,
            finished_at: chrono::DateTime<Utc>,
        ) -> DbResult<Option<MediaJob>> {
            let done = self
                .inner
                .complete_job(id, attempt, output_video_key, finished_at)
                .await?;
            match self.lost {
                LostWrite::Claim => Ok(done),
                LostWrite::Complete => Ok(None),
                LostWrite::CompleteErrors => Err(DbError::from_http_status(503, "upstream reset")),
            }
        }

        async fn fail_job(
            &self,
            id: &JobId,
            attempt: u32,
            status: JobStatus,
            error: &str,
        ) -> DbResult<Option<MediaJob>> {
            self.inner.fail_job(id, attempt, status, error).await
        }

        async fn list_stale_jobs(
            &self,
            started_before: chrono::DateTime<Utc>,
            limit: u32,
        ) -> DbResult<Vec<MediaJob>> {
            self.inner.list_stale_jobs(started_before, limit).await
        }

        async fn ping(&self) -> DbResult<()> {
            self.inner.ping().await
        }
    }

    struct Harness {
        db: Arc<MemoryStore>,
        storage: Arc<LocalStore>,
        generator: Arc<FakeGenerator>,
        runner: JobRunner,
        _dir: tempfile::TempDir,
    }

    impl Harness {
        fn new(generator: FakeGenerator) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let db = Arc::new(MemoryStore::new());
            let storage = Arc::new(LocalStore::new(dir.path()));
            let generator = Arc::new(generator);
            let runner = JobRunner::new(
                db.clone(),
                storage.clone(),
                generator.clone(),
                WorkerConfig::default(),
            );
            Self {
                db,
                storage,
                generator,
                runner,
                _dir: dir,
            }
        }

        fn with_lost_responses(generator: FakeGenerator, lost: LostWrite) -> Self {
            let mut h = Self::new(generator);
            let jobs = Arc::new(LostResponseStore {
                inner: h.db.clone(),
                lost,
            });
            h.runner = JobRunner::new(
                jobs,
                h.storage.clone(),
                h.generator.clone(),
                WorkerConfig::default(),
            );
            h
        }

        async fn seed(&self, ratio: AspectRatio, style: MotionStyle) -> MediaJob {
            let order = self.db.create_order(NewOrder::default()).await.unwrap();
            let key = format!("uploads/{}/prep_1_abc.jpg", order.id);
            self.storage.put(&key, vec![0xFF, 0xD8, 0xFF], "image/jpeg").await.unwrap();
            self.db
                .insert_job(NewMediaJob {
                    order_id: order.id,
                    input_image_key: key,
                    aspect_ratio: ratio,
                    motion_style: style,
                })
                .await
                .unwrap()
        }

        async fn reload(&self, id: &JobId) -> MediaJob {
            self.db.get_job(id).await.unwrap().unwrap()
        }
    }

    #[tokio::test]
    async fn test_run_completes_job() {
        let h = Harness::new(FakeGenerator::new(Behavior::Succeed));
        let job = h.seed(AspectRatio::Portrait, MotionStyle::FriendlyWave).await;

        let outcome = h
            .runner
            .run(&job.id, JobOverrides::default(), CancellationToken::new())
            .await
            .unwrap();

        let done = match outcome {
            RunOutcome::Completed(done) => done,
            other => panic!("unexpected outcome {:?}", other),
        };
        assert_eq!(done.status, JobStatus::Done);
        assert_eq!(done.attempt, 1);
        assert!(done.error.is_none());
        assert!(done.finished_at.is_some());
        assert!(done.is_consistent());

        let key = done.output_video_key.clone().unwrap();
        assert_eq!(key, format!("uploads/{}/output_{}_1.mp4", job.order_id, job.id));
        assert_eq!(h.storage.get(&key).await.unwrap().len(), 12);

        let seen = h.generator.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, build_prompt(MotionStyle::FriendlyWave));
        assert_eq!(seen[0].1, AspectRatio::Portrait);
    }

    #[tokio::test]
    async fn test_overrides_replace_stored_parameters() {
        let h = Harness::new(FakeGenerator::new(Behavior::Succeed));
        let job = h.seed(AspectRatio::Landscape, MotionStyle::Mystery).await;

        let overrides = JobOverrides {
            aspect_ratio: Some(AspectRatio::Square),
            motion_style: Some(MotionStyle::WarmHug),
        };
        let done = h
            .runner
            .run(&job.id, overrides, CancellationToken::new())
            .await
            .unwrap()
            .into_job();

        assert_eq!(done.aspect_ratio, AspectRatio::Square);
        assert_eq!(done.motion_style, MotionStyle::WarmHug);
        assert_eq!(done.input_image_key, job.input_image_key);
        let seen = h.generator.seen.lock().unwrap().clone();
        assert_eq!(seen[0], (build_prompt(MotionStyle::WarmHug), AspectRatio::Square));
    }

    #[tokio::test]
    async fn test_provider_failure_is_persisted() {
        let h = Harness::new(FakeGenerator::new(Behavior::ProviderFails));
        let job = h.seed(AspectRatio::Landscape, MotionStyle::Playful).await;

        let err = h
            .runner
            .run(&job.id, JobOverrides::default(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Generation(GenerationError::GenerationFailed(_))));

        let stored = h.reload(&job.id).await;
        assert_eq!(stored.status, JobStatus::Failed);
        assert!(stored.error.as_deref().unwrap().contains("moderation"));
        assert!(stored.output_video_key.is_none());
        assert!(stored.finished_at.is_none());
        assert!(stored.is_consistent());
    }

    #[tokio::test]
    async fn test_failed_job_can_be_rerun() {
        let h = Harness::new(FakeGenerator::new(Behavior::Succeed));
        let mut job = h.seed(AspectRatio::Landscape, MotionStyle::Playful).await;
        job.status = JobStatus::Failed;
        job.error = Some("earlier failure".into());
        job.attempt = 1;
        h.db.put_job(job.clone()).await;

        let done = h
            .runner
            .run(&job.id, JobOverrides::default(), CancellationToken::new())
            .await
            .unwrap()
            .into_job();
        assert_eq!(done.status, JobStatus::Done);
        assert_eq!(done.attempt, 2);
        assert!(done.error.is_none());
        assert!(done.output_video_key.unwrap().ends_with("_2.mp4"));
    }

    #[tokio::test]
    async fn test_done_job_is_a_noop() {
        let h = Harness::new(FakeGenerator::new(Behavior::Succeed));
        let first = h.seed(AspectRatio::Landscape, MotionStyle::Mystery).await;
        h.runner.run(&first.id, JobOverrides::default(), CancellationToken::new()).await.unwrap();
        let before = h.reload(&first.id).await;

        let outcome = h
            .runner
            .run(
                &first.id,
                JobOverrides {
                    aspect_ratio: Some(AspectRatio::Square),
                    motion_style: None,
                },
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, RunOutcome::AlreadyDone(_)));

        let after = h.reload(&first.id).await;
        assert_eq!(after, before);
        assert_eq!(h.generator.uploads.load(Ordering::SeqCst), 1);
        assert_eq!(h.generator.generations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_processing_job_conflicts() {
        let h = Harness::new(FakeGenerator::new(Behavior::Succeed));
        let mut job = h.seed(AspectRatio::Landscape, MotionStyle::Mystery).await;
        job.status = JobStatus::Processing;
        job.attempt = 1;
        job.started_at = Some(Utc::now());
        h.db.put_job(job.clone()).await;

        let err = h
            .runner
            .run(&job.id, JobOverrides::default(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Conflict));
        assert_eq!(h.reload(&job.id).await, job);
        assert_eq!(h.generator.uploads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_job_not_found() {
        let h = Harness::new(FakeGenerator::new(Behavior::Succeed));
        let err = h
            .runner
            .run(&JobId::new(), JobOverrides::default(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_concurrent_runs_only_one_generates() {
        let gate = Arc::new(Notify::new());
        let h = Harness::new(FakeGenerator::gated(Behavior::Succeed, gate.clone()));
        let job = h.seed(AspectRatio::Landscape, MotionStyle::Mystery).await;

        let runner = h.runner.clone();
        let id = job.id.clone();
        let first = tokio::spawn(async move {
            runner
                .run(&id, JobOverrides::default(), CancellationToken::new())
                .await
        });

        // Wait for the first run to hold the claim
        for _ in 0..200 {
            if h.reload(&job.id).await.status == JobStatus::Processing {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let second = h.runner.run(&job.id, JobOverrides::default(), CancellationToken::new()).await;
        assert!(matches!(second, Err(WorkerError::Conflict)));

        gate.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert!(matches!(outcome, RunOutcome::Completed(_)));
        assert_eq!(h.generator.generations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_marks_timed_out() {
        let h = Harness::new(FakeGenerator::new(Behavior::TimesOut));
        let job = h.seed(AspectRatio::Feed, MotionStyle::NaturalWalk).await;

        let err = h
            .runner
            .run(&job.id, JobOverrides::default(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_timeout());

        let stored = h.reload(&job.id).await;
        assert_eq!(stored.status, JobStatus::TimedOut);
        assert!(stored.error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_cancellation_marks_failed() {
        let h = Harness::new(FakeGenerator::new(Behavior::WaitForCancel));
        let job = h.seed(AspectRatio::Feed, MotionStyle::SweetKiss).await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = h.runner.run(&job.id, JobOverrides::default(), cancel).await.unwrap_err();
        assert!(matches!(err, WorkerError::Generation(GenerationError::Cancelled)));

        let stored = h.reload(&job.id).await;
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.error.as_deref(), Some("Generation cancelled"));
    }

    #[tokio::test]
    async fn test_missing_output_url_fails_job() {
        let h = Harness::new(FakeGenerator::new(Behavior::NoOutput));
        let job = h.seed(AspectRatio::Square, MotionStyle::Mystery).await;

        let err = h
            .runner
            .run(&job.id, JobOverrides::default(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Generation(GenerationError::MalformedResponse(_))));
        assert_eq!(h.reload(&job.id).await.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_internal_output_url_is_rejected() {
        let h = Harness::new(FakeGenerator::new(Behavior::InternalOutputUrl));
        let job = h.seed(AspectRatio::Square, MotionStyle::Mystery).await;

        let err = h
            .runner
            .run(&job.id, JobOverrides::default(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::UnsafeOutputUrl(_)));
        assert_eq!(h.reload(&job.id).await.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_missing_input_image_fails_job() {
        let h = Harness::new(FakeGenerator::new(Behavior::Succeed));
        let job = h.seed(AspectRatio::Square, MotionStyle::Mystery).await;
        h.storage.delete(&job.input_image_key).await.unwrap();

        let err = h
            .runner
            .run(&job.id, JobOverrides::default(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::StorageRead(_)));
        assert_eq!(h.generator.uploads.load(Ordering::SeqCst), 0);

        let stored = h.reload(&job.id).await;
        assert_eq!(stored.status, JobStatus::Failed);
        assert!(stored.error.unwrap().starts_with("Failed to read input image"));
    }

    #[tokio::test]
    async fn test_superseded_run_discards_output() {
        let gate = Arc::new(Notify::new());
        let h = Harness::new(FakeGenerator::gated(Behavior::Succeed, gate.clone()));
        let job = h.seed(AspectRatio::Landscape, MotionStyle::Mystery).await;

        let runner = h.runner.clone();
        let id = job.id.clone();
        let first = tokio::spawn(async move {
            runner
                .run(&id, JobOverrides::default(), CancellationToken::new())
                .await
        });

        for _ in 0..200 {
            if h.reload(&job.id).await.status == JobStatus::Processing {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        // The reconciler gives up on the run, and a second run claims attempt 2
        let stuck = h.reload(&job.id).await;
        h.db.fail_job(&job.id, stuck.attempt, JobStatus::TimedOut, "stale").await.unwrap();
        let mut reclaimed = h.reload(&job.id).await;
        reclaimed.status = JobStatus::Processing;
        reclaimed.attempt = 2;
        reclaimed.error = None;
        h.db.put_job(reclaimed).await;

        gate.notify_one();
        let err = first.await.unwrap().unwrap_err();
        assert!(matches!(err, WorkerError::Superseded));

        let orphan = output_video_key(&job.order_id, &job.id, 1);
        assert!(h.storage.get(&orphan).await.unwrap_err().is_not_found());
        let stored = h.reload(&job.id).await;
        assert_eq!(stored.status, JobStatus::Processing);
        assert_eq!(stored.attempt, 2);
    }

    #[tokio::test]
    async fn test_lost_claim_response_still_runs() {
        let h =
            Harness::with_lost_responses(FakeGenerator::new(Behavior::Succeed), LostWrite::Claim);
        let job = h.seed(AspectRatio::Portrait, MotionStyle::Playful).await;

        let outcome = h
            .runner
            .run(&job.id, JobOverrides::default(), CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(outcome, RunOutcome::Completed(_)));
        assert_eq!(h.generator.uploads.load(Ordering::SeqCst), 1);

        let stored = h.reload(&job.id).await;
        assert_eq!(stored.status, JobStatus::Done);
        assert_eq!(stored.attempt, 1);
    }

    #[tokio::test]
    async fn test_lost_completion_response_keeps_output() {
        for lost in [LostWrite::Complete, LostWrite::CompleteErrors] {
            let h = Harness::with_lost_responses(FakeGenerator::new(Behavior::Succeed), lost);
            let job = h.seed(AspectRatio::Portrait, MotionStyle::Playful).await;

            let done = h
                .runner
                .run(&job.id, JobOverrides::default(), CancellationToken::new())
                .await
                .unwrap()
                .into_job();

            let key = output_video_key(&job.order_id, &job.id, 1);
            assert_eq!(done.output_video_key.as_deref(), Some(key.as_str()));
            assert_eq!(h.reload(&job.id).await, done);
            assert_eq!(h.storage.get(&key).await.unwrap().len(), 12);
        }
    }
}
