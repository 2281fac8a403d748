//! Media retrieval handler.

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use tracing::debug;

use animo_storage::{content_type_for, validate_key};

use crate::config::MediaMode;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    #[serde(default)]
    pub path: Option<String>,
}

/// GET /api/media?path=
///
/// Redirects to a short-lived signed URL, or streams the object when the
/// store cannot sign or streaming mode is configured.
pub async fn get_media(
    State(state): State<AppState>,
    Query(query): Query<MediaQuery>,
) -> ApiResult<Response> {
    let path = query
        .path
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing path"))?;
    let key = validate_key(&path).map_err(|_| ApiError::bad_request("Invalid path"))?;

    if state.config.media_mode == MediaMode::Redirect && state.storage.supports_presign() {
        let url = state
            .storage
            .presign_get(key, state.config.signed_url_ttl)
            .await
            .map_err(|e| ApiError::internal(format!("Could not sign url: {}", e)))?;
        debug!(key = %key, "Redirecting to signed media URL");
        return Ok(Redirect::temporary(&url).into_response());
    }

    let bytes = state.storage.get(key).await.map_err(|e| {
        if e.is_not_found() {
            ApiError::not_found("Media not found")
        } else {
            ApiError::Storage(e)
        }
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(key)),
            (header::CACHE_CONTROL, "private, max-age=60"),
        ],
        bytes,
    )
        .into_response())
}
