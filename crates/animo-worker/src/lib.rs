//! Media job lifecycle.
//!
//! [`JobRunner::run`] takes one stored job from `queued`/`failed`/`timed_out`
//! through `processing` to `done`, `failed` or `timed_out`:
//! - claims the job with a conditional write so concurrent runs cannot both
//!   proceed
//! - reads the prepared image, uploads it to the provider and waits for the
//!   generated video
//! - stores the video under an attempt-scoped key and settles the job

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod output_url;
pub mod prompt;
pub mod runner;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use prompt::{build_prompt, BASE_PROMPT};
pub use runner::{JobOverrides, JobRunner, RunOutcome};
