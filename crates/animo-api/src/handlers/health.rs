//! Liveness and readiness endpoints.

use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health, /healthz
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Outcome of one dependency check.
#[derive(Debug, Serialize)]
pub struct DependencyCheck {
    pub ok: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

async fn timed<E: Display>(check: impl Future<Output = Result<(), E>>) -> DependencyCheck {
    let start = Instant::now();
    let result = check.await;
    DependencyCheck {
        ok: result.is_ok(),
        latency_ms: start.elapsed().as_millis() as u64,
        error: result.err().map(|e| e.to_string()),
    }
}

#[derive(Debug, Serialize)]
pub struct Readiness {
    pub status: &'static str,
    pub database: DependencyCheck,
    pub storage: DependencyCheck,
}

/// GET /ready
///
/// 503 unless both the job table and the object store answer.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    let (database, storage) = tokio::join!(
        timed(state.jobs.ping()),
        timed(state.storage.check_connectivity())
    );

    let ready = database.ok && storage.ok;
    let code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(Readiness {
            status: if ready { "ready" } else { "degraded" },
            database,
            storage,
        }),
    )
}
