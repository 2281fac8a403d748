//! Axum HTTP API server.
//!
//! This crate provides:
//! - Order creation, photo upload, job run/status and media routes
//! - Per-IP rate limiting and security headers
//! - Prometheus metrics
//! - Background reconciliation of stale jobs

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::StaleJobDetector;
pub use state::AppState;
