//! Photo upload handler.

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};

use animo_media::{prepare_async, PREPARED_CONTENT_TYPE};
use animo_models::{AspectRatio, MediaJob, MotionStyle, NewMediaJob, OrderId};
use animo_storage::prepared_image_key;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub ok: bool,
    pub job: MediaJob,
}

struct UploadedFile {
    content_type: String,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct UploadForm {
    order_id: Option<String>,
    file: Option<UploadedFile>,
    aspect_ratio: Option<String>,
    motion_style: Option<String>,
}

fn invalid_form(e: MultipartError) -> ApiError {
    ApiError::bad_request(format!("Invalid form data: {}", e.body_text()))
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(invalid_form)?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    let content_type = field.content_type().unwrap_or_default().to_string();
                    let bytes = field.bytes().await.map_err(invalid_form)?;
                    form.file = Some(UploadedFile {
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
                "orderId" | "aspectRatio" | "motionStyle" => {
                    let value = field.text().await.map_err(invalid_form)?;
                    let value = Some(value.trim().to_string()).filter(|v| !v.is_empty());
                    match name.as_str() {
                        "orderId" => form.order_id = value,
                        "aspectRatio" => form.aspect_ratio = value,
                        _ => form.motion_style = value,
                    }
                }
                // Unknown fields are ignored
                _ => {}
            }
        }

        Ok(form)
    }
}

/// POST /api/upload-image
///
/// Multipart form `{ orderId, file, aspectRatio?, motionStyle? }`. The photo
/// is letterboxed to the requested ratio, stored, and a queued job is created
/// for it. Unknown ratio/style values fall back to `16:9`/`mystery`.
pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let form = UploadForm::read(multipart).await?;

    let order_id = form.order_id.ok_or_else(|| ApiError::bad_request("Missing orderId"))?;
    let file = form.file.ok_or_else(|| ApiError::bad_request("Missing file"))?;

    if !file.content_type.starts_with("image/") {
        return Err(ApiError::bad_request("File must be an image"));
    }
    let max_bytes = state.config.max_upload_bytes;
    if file.bytes.len() > max_bytes {
        return Err(ApiError::bad_request(format!(
            "File too large (max {}MB)",
            max_bytes / (1024 * 1024)
        )));
    }

    let aspect_ratio = AspectRatio::parse_or_default(form.aspect_ratio.as_deref());
    let motion_style = MotionStyle::parse_or_default(form.motion_style.as_deref());

    let order = match OrderId::parse(&order_id) {
        Ok(id) => state.orders.get_order(&id).await?,
        Err(_) => None,
    }
    .ok_or_else(|| ApiError::not_found("Order not found"))?;

    let original_size = file.bytes.len();
    let prepared = prepare_async(file.bytes, aspect_ratio).await.map_err(|e| {
        if e.is_invalid_input() {
            warn!(order_id = %order.id, "Rejected undecodable upload: {}", e);
            ApiError::bad_request("Could not read image")
        } else {
            ApiError::internal(format!("Image preparation failed: {}", e))
        }
    })?;

    let key = prepared_image_key(&order.id);
    state.storage.put(&key, prepared, PREPARED_CONTENT_TYPE).await?;

    let job = state
        .jobs
        .insert_job(NewMediaJob {
            order_id: order.id.clone(),
            input_image_key: key,
            aspect_ratio,
            motion_style,
        })
        .await?;

    metrics::record_upload(aspect_ratio.as_str(), original_size);
    info!(
        order_id = %order.id,
        job_id = %job.id,
        aspect_ratio = %aspect_ratio,
        motion_style = %motion_style,
        bytes = original_size,
        "Upload prepared and job queued"
    );

    Ok(Json(UploadResponse { ok: true, job }))
}
