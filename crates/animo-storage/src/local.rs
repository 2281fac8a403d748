//! Filesystem-backed blob store.
//!
//! Used for local development and the streaming media mode, where the API
//! serves bytes itself instead of redirecting to a signed URL.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::keys::validate_key;
use crate::store::BlobStore;

/// Blob store rooted at a directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root from `LOCAL_STORAGE_DIR`, defaulting to `./data`.
    pub fn from_env() -> Self {
        Self::new(std::env::var("LOCAL_STORAGE_DIR").unwrap_or_else(|_| "./data".to_string()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        let key = validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for LocalStore {
    async fn put(&self, key: &str, data: Vec<u8>, _content_type: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| {
                    StorageError::upload_failed(format!("create {}: {}", parent.display(), e))
                })?;
        }

        // Write then rename so readers never observe a partial file.
        let tmp = path.with_extension("partial");
        tokio::fs::write(&tmp, &data)
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", key, e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", key, e)))?;

        debug!(key = %key, bytes = data.len(), "Wrote local object");
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::not_found(key)),
            Err(e) => Err(StorageError::download_failed(format!("{}: {}", key, e))),
        }
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::delete_failed(format!("{}: {}", key, e))),
        }
    }

    async fn presign_get(&self, key: &str, _expires_in: Duration) -> StorageResult<String> {
        Err(StorageError::PresignFailed(format!(
            "local storage cannot sign URLs ({})",
            key
        )))
    }

    fn supports_presign(&self) -> bool {
        false
    }

    async fn check_connectivity(&self) -> StorageResult<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let key = "uploads/o1/output_j1_1.mp4";

        store.put(key, b"twelve bytes".to_vec(), "video/mp4").await.unwrap();
        assert_eq!(store.get(key).await.unwrap(), b"twelve bytes");
        assert!(dir.path().join(key).exists());

        store.delete(key).await.unwrap();
        assert!(store.get(key).await.unwrap_err().is_not_found());
        // Deleting twice is fine
        store.delete(key).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        let err = store.put("uploads/../../etc/passwd", vec![1], "text/plain").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
        assert!(matches!(store.get("../x").await.unwrap_err(), StorageError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn test_cannot_presign() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        assert!(!store.supports_presign());
        assert!(store
            .presign_get("uploads/o1/x.jpg", Duration::from_secs(60))
            .await
            .is_err());
    }
}
