//! Image-to-video generation client.
//!
//! Three provider round trips turn a prepared image into a video:
//! 1. request an ephemeral upload slot and post the image to it
//! 2. create an image-to-video task and poll it until it settles
//! 3. download the produced video
//!
//! [`VideoGenerator`] abstracts the three steps so the job runner can be
//! exercised against a fake.

pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use client::RunwayClient;
pub use config::RunwayConfig;
pub use error::{GenerationError, GenerationResult};
pub use types::{TaskOutput, TaskState, TaskStatus, UploadIntent};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use animo_models::AspectRatio;

/// The provider operations the job runner depends on.
#[async_trait]
pub trait VideoGenerator: Send + Sync {
    /// Upload image bytes to short-lived provider storage; returns the
    /// provider URI to reference in a generation request.
    async fn upload_ephemeral(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> GenerationResult<String>;

    /// Create a generation task and wait until it succeeds.
    ///
    /// Fails with [`GenerationError::GenerationFailed`] when the provider
    /// reports failure, [`GenerationError::TimedOut`] when the polling budget
    /// runs out and [`GenerationError::Cancelled`] when `cancel` fires.
    async fn generate(
        &self,
        provider_uri: &str,
        prompt: &str,
        ratio: AspectRatio,
        cancel: &CancellationToken,
    ) -> GenerationResult<TaskStatus>;

    /// Download a produced artifact.
    async fn fetch_output(&self, url: &str) -> GenerationResult<Vec<u8>>;
}
