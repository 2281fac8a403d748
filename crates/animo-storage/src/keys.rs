//! Storage key derivation and validation.

use chrono::Utc;
use uuid::Uuid;

use animo_models::{JobId, OrderId};

use crate::error::{StorageError, StorageResult};

/// Every key lives below this prefix.
pub const KEY_PREFIX: &str = "uploads/";

const MAX_KEY_LENGTH: usize = 512;

/// Key for a freshly prepared input image.
///
/// `uploads/{order_id}/prep_{unix_millis}_{random}.jpg`
pub fn prepared_image_key(order_id: &OrderId) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "{}{}/prep_{}_{}.jpg",
        KEY_PREFIX,
        order_id,
        Utc::now().timestamp_millis(),
        &random[..12]
    )
}

/// Key for the generated video of one run.
///
/// `uploads/{order_id}/output_{job_id}_{attempt}.mp4`; the attempt counter
/// keeps reruns from overwriting each other.
pub fn output_video_key(order_id: &OrderId, job_id: &JobId, attempt: u32) -> String {
    format!("{}{}/output_{}_{}.mp4", KEY_PREFIX, order_id, job_id, attempt)
}

/// Reject keys that could escape the upload prefix.
pub fn validate_key(key: &str) -> StorageResult<&str> {
    if key.is_empty() || key.len() > MAX_KEY_LENGTH {
        return Err(StorageError::invalid_key("key is empty or too long"));
    }
    if !key.starts_with(KEY_PREFIX) {
        return Err(StorageError::invalid_key(format!("key must start with {}", KEY_PREFIX)));
    }
    if key.contains('\\') || key.chars().any(|c| c.is_control()) {
        return Err(StorageError::invalid_key("key contains forbidden characters"));
    }
    if key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
        return Err(StorageError::invalid_key("key contains an empty or relative segment"));
    }
    Ok(key)
}

/// Guess a content type from the key's extension.
pub fn content_type_for(key: &str) -> &'static str {
    let ext = key.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    match ext.as_str() {
        "mp4" => "video/mp4",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepared_image_key_shape() {
        let order = OrderId::from("5d1c9b8e-4f0a-4b9e-9f3a-1e2d3c4b5a69");
        let key = prepared_image_key(&order);
        assert!(key.starts_with("uploads/5d1c9b8e-4f0a-4b9e-9f3a-1e2d3c4b5a69/prep_"));
        assert!(key.ends_with(".jpg"));
        assert!(validate_key(&key).is_ok());
        assert_ne!(key, prepared_image_key(&order));
    }

    #[test]
    fn test_output_key_includes_attempt() {
        let order = OrderId::from("o1");
        let job = JobId::from("j1");
        assert_eq!(output_video_key(&order, &job, 3), "uploads/o1/output_j1_3.mp4");
        assert_ne!(output_video_key(&order, &job, 1), output_video_key(&order, &job, 2));
    }

    #[test]
    fn test_validate_key_rejects_traversal() {
        assert!(validate_key("uploads/o1/output.mp4").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("private/o1/x.jpg").is_err());
        assert!(validate_key("uploads/../secrets").is_err());
        assert!(validate_key("uploads/o1/./x.jpg").is_err());
        assert!(validate_key("uploads//x.jpg").is_err());
        assert!(validate_key("uploads\\o1\\x.jpg").is_err());
        assert!(validate_key("uploads/o1/x\n.jpg").is_err());
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("uploads/o/output_j_1.mp4"), "video/mp4");
        assert_eq!(content_type_for("uploads/o/prep_1_a.JPG"), "image/jpeg");
        assert_eq!(content_type_for("uploads/o/blob"), "application/octet-stream");
    }
}
