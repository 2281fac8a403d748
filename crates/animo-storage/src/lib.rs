//! Object storage gateway.
//!
//! This crate provides:
//! - The [`BlobStore`] trait used by the API and the job runner
//! - An S3-compatible client (hosted storage buckets, presigned URLs)
//! - A local filesystem store for development and streaming mode
//! - Storage key derivation and validation

pub mod client;
pub mod error;
pub mod keys;
pub mod local;
pub mod store;

pub use client::{S3Config, S3Store};
pub use error::{StorageError, StorageResult};
pub use keys::{content_type_for, output_video_key, prepared_image_key, validate_key, KEY_PREFIX};
pub use local::LocalStore;
pub use store::BlobStore;
