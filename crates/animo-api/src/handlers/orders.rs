//! Order handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use animo_db::DEFAULT_HISTORY_LIMIT;
use animo_models::{MediaJob, NewOrder, Order, OrderId};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Upper bound for the `limit` query parameter.
pub const MAX_HISTORY_LIMIT: u32 = 100;

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order: Order,
}

/// POST /api/orders/create
///
/// Body `{ email?, locale? }`. The email is validated when present and the
/// locale defaults to `de`.
pub async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<NewOrder>, JsonRejection>,
) -> ApiResult<Json<OrderResponse>> {
    let Json(new) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    new.validate().map_err(|e| ApiError::Validation(e.to_string()))?;

    let order = state.orders.create_order(new).await?;
    metrics::record_order_created();
    info!(order_id = %order.id, locale = %order.locale, "Order created");

    Ok(Json(OrderResponse { order }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct JobsResponse {
    pub ok: bool,
    pub jobs: Vec<MediaJob>,
}

/// GET /api/orders/:order_id/jobs
///
/// The order's jobs, newest first.
pub async fn list_order_jobs(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<JobsResponse>> {
    let order_id = OrderId::parse(&order_id).map_err(|_| ApiError::bad_request("Invalid orderId"))?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    state
        .orders
        .get_order(&order_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;

    let jobs = state.jobs.list_jobs_for_order(&order_id, limit).await?;
    Ok(Json(JobsResponse { ok: true, jobs }))
}
