//! Generation client configuration.

use std::time::Duration;

use crate::error::{GenerationError, GenerationResult};

pub const DEFAULT_BASE_URL: &str = "https://api.dev.runwayml.com";
pub const DEFAULT_API_VERSION: &str = "2024-11-06";
pub const DEFAULT_MODEL: &str = "gen4_turbo";

/// Configuration for [`crate::RunwayClient`].
#[derive(Debug, Clone)]
pub struct RunwayConfig {
    /// API host
    pub base_url: String,
    /// Bearer secret
    pub api_key: String,
    /// Value of the `X-Runway-Version` header
    pub api_version: String,
    /// Generation model
    pub model: String,
    /// Output clip length in seconds
    pub duration_secs: u32,
    /// Delay before each status poll
    pub poll_interval: Duration,
    /// Upper bound on status polls per task
    pub max_poll_attempts: u32,
    /// Upper bound on wall time spent polling one task
    pub max_wait: Duration,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Retries for transient failures of idempotent requests
    pub max_retries: u32,
    /// Base delay between those retries
    pub retry_base_delay: Duration,
}

impl RunwayConfig {
    /// Config with defaults and the given secret.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            model: DEFAULT_MODEL.to_string(),
            duration_secs: 4,
            poll_interval: Duration::from_millis(5000),
            max_poll_attempts: 120,
            max_wait: Duration::from_secs(600),
            request_timeout: Duration::from_secs(60),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(500),
        }
    }

    /// Create config from environment variables.
    ///
    /// `RUNWAYML_API_SECRET` is required; everything else has a default.
    pub fn from_env() -> GenerationResult<Self> {
        let api_key = std::env::var("RUNWAYML_API_SECRET")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                GenerationError::ConfigError("Missing RUNWAYML_API_SECRET".to_string())
            })?;

        let defaults = Self::new(api_key);

        Ok(Self {
            base_url: std::env::var("RUNWAY_API_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url.clone()),
            api_version: std::env::var("RUNWAY_API_VERSION")
                .unwrap_or(defaults.api_version.clone()),
            model: std::env::var("RUNWAY_MODEL").unwrap_or(defaults.model.clone()),
            poll_interval: std::env::var("RUNWAY_POLL_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            max_poll_attempts: std::env::var("RUNWAY_MAX_POLL_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_poll_attempts),
            max_wait: std::env::var("RUNWAY_MAX_WAIT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.max_wait),
            request_timeout: std::env::var("RUNWAY_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            ..defaults
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_missing_secret_is_config_error() {
        std::env::remove_var("RUNWAYML_API_SECRET");
        let err = RunwayConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("RUNWAYML_API_SECRET"));
    }

    #[test]
    #[serial]
    fn test_env_defaults() {
        std::env::set_var("RUNWAYML_API_SECRET", "secret");
        std::env::remove_var("RUNWAY_API_URL");
        std::env::remove_var("RUNWAY_POLL_INTERVAL_MS");
        std::env::set_var("RUNWAY_MAX_WAIT_SECS", "90");

        let config = RunwayConfig::from_env().unwrap();
        assert_eq!(config.base_url, "https://api.dev.runwayml.com");
        assert_eq!(config.api_version, "2024-11-06");
        assert_eq!(config.model, "gen4_turbo");
        assert_eq!(config.duration_secs, 4);
        assert_eq!(config.poll_interval, Duration::from_millis(5000));
        assert_eq!(config.max_wait, Duration::from_secs(90));

        std::env::remove_var("RUNWAYML_API_SECRET");
        std::env::remove_var("RUNWAY_MAX_WAIT_SECS");
    }
}
