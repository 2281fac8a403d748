//! Generation API HTTP client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::counter;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use animo_models::AspectRatio;

use crate::config::RunwayConfig;
use crate::error::{GenerationError, GenerationResult};
use crate::types::{
    CreateTaskResponse, ImageToVideoRequest, RawUploadIntent, TaskState, TaskStatus,
    UploadIntent, UploadIntentRequest,
};
use crate::VideoGenerator;

const VERSION_HEADER: &str = "X-Runway-Version";

/// Client for the hosted image-to-video API.
pub struct RunwayClient {
    http: Client,
    config: RunwayConfig,
}

impl RunwayClient {
    pub fn new(config: RunwayConfig) -> GenerationResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(4)
            .user_agent(concat!("animo-runway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(GenerationError::Network)?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> GenerationResult<Self> {
        Self::new(RunwayConfig::from_env()?)
    }

    pub fn config(&self) -> &RunwayConfig {
        &self.config
    }

    fn api(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.config.api_key)
            .header(VERSION_HEADER, &self.config.api_version)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    // ========================================================================
    // Upload
    // ========================================================================

    /// Ask the provider for an ephemeral upload slot.
    pub async fn request_upload(
        &self,
        filename: &str,
        content_type: &str,
    ) -> GenerationResult<UploadIntent> {
        let body = UploadIntentRequest {
            kind: "ephemeral",
            filename,
            content_type,
        };
        let response = self
            .api(self.http.post(self.url("/v1/uploads")))
            .json(&body)
            .send()
            .await?;
        let response = check_status(response, "Upload intent").await?;

        let raw: RawUploadIntent = response.json().await?;
        raw.into_intent()
    }

    /// Post the file to the granted slot with the provider's form fields.
    pub async fn post_to_slot(
        &self,
        intent: &UploadIntent,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> GenerationResult<()> {
        let mut form = Form::new();
        for (name, value) in &intent.fields {
            form = form.text(name.clone(), value.clone());
        }
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(content_type)?;
        // The object store expects the file after every policy field
        form = form.part("file", part);

        let response = self.http.post(&intent.upload_url).multipart(form).send().await?;
        let status = response.status();
        record_request("upload", status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Upload {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    // ========================================================================
    // Tasks
    // ========================================================================

    /// Create an image-to-video task; returns the task id.
    pub async fn create_task(
        &self,
        provider_uri: &str,
        prompt: &str,
        ratio: AspectRatio,
    ) -> GenerationResult<String> {
        let body = ImageToVideoRequest {
            model: &self.config.model,
            prompt_image: provider_uri,
            prompt_text: prompt,
            duration: self.config.duration_secs,
            ratio: ratio.as_str(),
        };
        let response = self
            .api(self.http.post(self.url("/v1/image_to_video")))
            .json(&body)
            .send()
            .await?;
        let response = check_status(response, "Create task").await?;

        let created: CreateTaskResponse = response.json().await?;
        created
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| GenerationError::provider("Create task response has no id"))
    }

    /// Fetch a task's current status once.
    pub async fn get_task(&self, task_id: &str) -> GenerationResult<TaskStatus> {
        let response = self
            .api(self.http.get(self.url(&format!("/v1/tasks/{}", task_id))))
            .send()
            .await?;
        let response = check_status(response, "Task status").await?;

        let payload: serde_json::Value = response.json().await?;
        Ok(TaskStatus::from_payload(task_id, payload))
    }

    /// Poll a task until it settles, the budget runs out or `cancel` fires.
    pub async fn wait_for_task(
        &self,
        task_id: &str,
        cancel: &CancellationToken,
    ) -> GenerationResult<TaskStatus> {
        let started = Instant::now();
        let max_attempts = self.config.max_poll_attempts.max(1);

        for attempt in 1..=max_attempts {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(task_id, attempt, "Generation cancelled while waiting");
                    return Err(GenerationError::Cancelled);
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }

            let status = tokio::select! {
                _ = cancel.cancelled() => {
                    info!(task_id, attempt, "Generation cancelled during poll");
                    return Err(GenerationError::Cancelled);
                }
                result = self.with_retry(|| self.get_task(task_id)) => result?,
            };
            counter!("animo_provider_polls_total").increment(1);

            match &status.state {
                TaskState::Succeeded => {
                    info!(task_id, attempt, "Generation task succeeded");
                    return Ok(status);
                }
                TaskState::Failed => {
                    warn!(task_id, attempt, "Generation task failed");
                    return Err(GenerationError::GenerationFailed(status.payload.to_string()));
                }
                TaskState::Pending(state) => {
                    debug!(task_id, attempt, state = %state, "Generation task pending");
                }
            }

            if started.elapsed() >= self.config.max_wait {
                return Err(GenerationError::TimedOut {
                    attempts: attempt,
                    elapsed_secs: started.elapsed().as_secs(),
                });
            }
        }

        Err(GenerationError::TimedOut {
            attempts: max_attempts,
            elapsed_secs: started.elapsed().as_secs(),
        })
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> GenerationResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = GenerationResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.config.retry_base_delay * 2u32.pow(attempt);
                    warn!(
                        "Provider request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn record_request(operation: &'static str, status: StatusCode) {
    counter!(
        "animo_provider_requests_total",
        "operation" => operation,
        "status" => status.as_u16().to_string()
    )
    .increment(1);
}

async fn check_status(response: Response, operation: &'static str) -> GenerationResult<Response> {
    let status = response.status();
    record_request(operation, status);

    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GenerationError::ProviderStatus {
        operation,
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl VideoGenerator for RunwayClient {
    async fn upload_ephemeral(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> GenerationResult<String> {
        let span = info_span!("provider_upload", filename, size = bytes.len());
        async {
            let intent = self.request_upload(filename, content_type).await?;
            self.post_to_slot(&intent, bytes, filename, content_type).await?;
            debug!(uri = %intent.runway_uri, "Ephemeral upload complete");
            Ok::<_, GenerationError>(intent.runway_uri)
        }
        .instrument(span)
        .await
    }

    async fn generate(
        &self,
        provider_uri: &str,
        prompt: &str,
        ratio: AspectRatio,
        cancel: &CancellationToken,
    ) -> GenerationResult<TaskStatus> {
        let span = info_span!("provider_generate", ratio = ratio.as_str());
        async {
            let task_id = tokio::select! {
                _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
                id = self.create_task(provider_uri, prompt, ratio) => id?,
            };
            info!(task_id = %task_id, "Generation task created");
            self.wait_for_task(&task_id, cancel).await
        }
        .instrument(span)
        .await
    }

    async fn fetch_output(&self, url: &str) -> GenerationResult<Vec<u8>> {
        let response = self
            .with_retry(|| async {
                self.http
                    .get(url)
                    .send()
                    .await
                    .map_err(GenerationError::Network)
            })
            .await?;
        let status = response.status();
        record_request("download", status);

        if !status.is_success() {
            return Err(GenerationError::Download {
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}
