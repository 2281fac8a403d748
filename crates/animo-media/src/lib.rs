//! Image preparation for video generation.
//!
//! Photos arrive in arbitrary shapes and orientations. The generation
//! provider wants a frame of exactly the requested aspect ratio, so every
//! upload is letterboxed:
//! - the photo is rotated upright according to its EXIF orientation
//! - a blurred, dimmed cover-fit copy fills the frame
//! - the untouched photo is contain-fitted and centered on top
//!
//! The result is a JPEG of exactly the target resolution.

pub mod error;
pub mod letterbox;

pub use error::{MediaError, MediaResult};
pub use letterbox::{prepare, prepare_async, target_size, PREPARED_CONTENT_TYPE};
