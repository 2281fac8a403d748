//! Blob store abstraction.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StorageResult;

/// Keyed byte storage shared by the API and the job runner.
///
/// Keys are relative paths such as `uploads/{order_id}/prep_….jpg`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `data` under `key`, replacing any existing object.
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()>;

    /// Read the full object. Missing keys yield `StorageError::NotFound`.
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Remove an object. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Short-lived signed URL for direct retrieval.
    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String>;

    /// Whether this backend can produce signed URLs at all.
    fn supports_presign(&self) -> bool {
        true
    }

    /// Cheap reachability check for readiness checks.
    async fn check_connectivity(&self) -> StorageResult<()>;
}
