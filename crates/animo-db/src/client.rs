//! PostgREST client for the hosted Postgres tables.
//!
//! Production-grade client with:
//! - HTTP client tuning (pooling, timeouts)
//! - Exponential backoff with jitter on reads and conditional updates
//! - Observability (tracing spans, metrics)

use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info_span, Instrument};

use crate::error::{DbError, DbResult};
use crate::metrics::record_request;
use crate::retry::{with_retry, RetryConfig};

// =============================================================================
// Configuration
// =============================================================================

/// PostgREST client configuration.
#[derive(Debug, Clone)]
pub struct PostgrestConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub project_url: String,
    /// Service role key (bypasses row level security)
    pub service_key: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Retry configuration
    pub retry: RetryConfig,
}

impl PostgrestConfig {
    /// Create config from environment variables.
    pub fn from_env() -> DbResult<Self> {
        let project_url = std::env::var("SUPABASE_URL")
            .or_else(|_| std::env::var("NEXT_PUBLIC_SUPABASE_URL"))
            .map_err(|_| DbError::config_error("SUPABASE_URL must be set"))?;

        let service_key = std::env::var("SUPABASE_SERVICE_ROLE_KEY")
            .map_err(|_| DbError::config_error("SUPABASE_SERVICE_ROLE_KEY must be set"))?;

        if project_url.trim().is_empty() || service_key.trim().is_empty() {
            return Err(DbError::config_error(
                "SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY cannot be empty",
            ));
        }

        let connect_timeout_secs: u64 = std::env::var("DB_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        let timeout_secs: u64 = std::env::var("DB_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            project_url: project_url.trim_end_matches('/').to_string(),
            service_key,
            timeout: Duration::from_secs(timeout_secs),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            retry: RetryConfig::from_env(),
        })
    }
}

// =============================================================================
// Client
// =============================================================================

/// Thin typed client over `{project_url}/rest/v1`.
#[derive(Clone)]
pub struct PostgrestClient {
    http: Client,
    base_url: String,
    retry: RetryConfig,
}

impl PostgrestClient {
    /// Create a new client.
    pub fn new(config: PostgrestConfig) -> DbResult<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.service_key)
            .map_err(|_| DbError::config_error("service key is not a valid header value"))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.service_key))
            .map_err(|_| DbError::config_error("service key is not a valid header value"))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .default_headers(headers)
            .user_agent(concat!("animo-db/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(DbError::Network)?;

        Ok(Self {
            http,
            base_url: format!("{}/rest/v1", config.project_url),
            retry: config.retry,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> DbResult<Self> {
        Self::new(PostgrestConfig::from_env()?)
    }

    fn table_url(&self, table: &str, query: &str) -> String {
        if query.is_empty() {
            format!("{}/{}", self.base_url, table)
        } else {
            format!("{}/{}?{}", self.base_url, table, query)
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// `GET /{table}?{query}`, retried.
    pub async fn select<R: DeserializeOwned>(
        &self,
        operation: &str,
        table: &str,
        query: &str,
    ) -> DbResult<Vec<R>> {
        let url = self.table_url(table, query);
        self.execute_request(operation, table, async {
            with_retry(&self.retry, operation, || self.send::<(), R>(Method::GET, &url, None)).await
        })
        .await
    }

    /// `POST /{table}` with one row, sent once.
    pub async fn insert<T: Serialize + Sync, R: DeserializeOwned>(
        &self,
        operation: &str,
        table: &str,
        row: &T,
    ) -> DbResult<R> {
        let url = self.table_url(table, "");
        self.execute_request(operation, table, async {
            let mut rows: Vec<R> = self.send(Method::POST, &url, Some(row)).await?;
            if rows.is_empty() {
                return Err(DbError::InvalidResponse(format!("{} returned no row", url)));
            }
            Ok(rows.swap_remove(0))
        })
        .await
    }

    /// `PATCH /{table}?{filter}`, retried. Returns the rows that matched.
    pub async fn update<T: Serialize + Sync, R: DeserializeOwned>(
        &self,
        operation: &str,
        table: &str,
        filter: &str,
        patch: &T,
    ) -> DbResult<Vec<R>> {
        let url = self.table_url(table, filter);
        self.execute_request(operation, table, async {
            with_retry(&self.retry, operation, || self.send(Method::PATCH, &url, Some(patch))).await
        })
        .await
    }

    async fn send<T: Serialize + Sync, R: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&T>,
    ) -> DbResult<Vec<R>> {
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            let rows: Vec<R> = response.json().await?;
            debug!(url = %url, rows = rows.len(), "PostgREST request succeeded");
            Ok(rows)
        } else {
            Err(Self::handle_error_response(url, response).await)
        }
    }

    /// Wrap a request with a tracing span and metrics.
    async fn execute_request<T, F>(&self, operation: &str, table: &str, fut: F) -> DbResult<T>
    where
        F: std::future::Future<Output = DbResult<T>>,
    {
        let span = info_span!("db_request", operation = %operation, table = %table);

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, latency_ms);

        result
    }

    async fn handle_error_response(url: &str, response: Response) -> DbError {
        let status = response.status().as_u16();
        let retry_after_ms = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(|secs| secs * 1000);
        let body = response.text().await.unwrap_or_default();

        match (status, retry_after_ms) {
            (429, Some(ms)) => DbError::RateLimited(ms),
            _ => DbError::from_http_status(status, format!("{} failed: {}", url, body)),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
