//! API configuration.

use std::time::Duration;

/// How `GET /api/media` hands out stored objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaMode {
    /// 307 to a short-lived signed URL
    Redirect,
    /// Serve the bytes from this process
    Stream,
}

/// Where orders and jobs live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbBackend {
    Postgrest,
    Memory,
}

/// Where images and videos live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    S3,
    Local,
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second, per client IP
    pub rate_limit_rps: u32,
    /// Max request body size
    pub max_body_size: usize,
    /// Max size of an uploaded photo
    pub max_upload_bytes: usize,
    /// Environment (development/production)
    pub environment: String,
    pub media_mode: MediaMode,
    /// Lifetime of signed media URLs
    pub signed_url_ttl: Duration,
    pub db_backend: DbBackend,
    pub storage_backend: StorageBackend,
    /// Jobs processing longer than this are reconciled to `timed_out`
    pub stale_threshold: Duration,
    pub stale_detection_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            max_body_size: 20 * 1024 * 1024,
            max_upload_bytes: 15 * 1024 * 1024,
            environment: "development".to_string(),
            media_mode: MediaMode::Redirect,
            signed_url_ttl: Duration::from_secs(60),
            db_backend: DbBackend::Postgrest,
            storage_backend: StorageBackend::S3,
            stale_threshold: Duration::from_secs(900),
            stale_detection_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let storage_backend = match std::env::var("STORAGE_BACKEND").as_deref() {
            Ok("local") => StorageBackend::Local,
            _ => StorageBackend::S3,
        };

        // Local storage cannot sign URLs, so it implies streaming
        let media_mode = match (std::env::var("MEDIA_MODE").as_deref(), storage_backend) {
            (_, StorageBackend::Local) | (Ok("stream"), _) => MediaMode::Stream,
            _ => MediaMode::Redirect,
        };

        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: std::env::var("RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.rate_limit_rps),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
            max_upload_bytes: std::env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_upload_bytes),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            media_mode,
            signed_url_ttl: std::env::var("SIGNED_URL_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.signed_url_ttl),
            db_backend: match std::env::var("DB_BACKEND").as_deref() {
                Ok("memory") => DbBackend::Memory,
                _ => DbBackend::Postgrest,
            },
            storage_backend,
            stale_threshold: std::env::var("STALE_JOB_THRESHOLD_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.stale_threshold),
            stale_detection_enabled: std::env::var("ENABLE_STALE_DETECTION")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_local_storage_forces_stream_mode() {
        std::env::set_var("STORAGE_BACKEND", "local");
        std::env::set_var("MEDIA_MODE", "redirect");
        let config = ApiConfig::from_env();
        assert_eq!(config.storage_backend, StorageBackend::Local);
        assert_eq!(config.media_mode, MediaMode::Stream);
        std::env::remove_var("STORAGE_BACKEND");
        std::env::remove_var("MEDIA_MODE");
    }

    #[test]
    #[serial]
    fn test_defaults() {
        for var in [
            "STORAGE_BACKEND",
            "MEDIA_MODE",
            "DB_BACKEND",
            "MAX_UPLOAD_BYTES",
            "ENABLE_STALE_DETECTION",
        ] {
            std::env::remove_var(var);
        }
        let config = ApiConfig::from_env();
        assert_eq!(config.media_mode, MediaMode::Redirect);
        assert_eq!(config.db_backend, DbBackend::Postgrest);
        assert_eq!(config.max_upload_bytes, 15 * 1024 * 1024);
        assert_eq!(config.signed_url_ttl, Duration::from_secs(60));
        assert!(config.stale_detection_enabled);
        assert!(!config.is_production());
    }
}
