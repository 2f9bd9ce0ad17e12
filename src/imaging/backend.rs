//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the one seam between the thumbnail cache
//! and pixel work. The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend); tests use the
//! [`MockBackend`](tests::MockBackend) below, which records calls and writes
//! placeholder files without decoding anything.

use super::params::ThumbnailParams;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {path}: {message}")]
    Decode { path: String, message: String },
    #[error("Encode failed: {0}")]
    Encode(String),
}

impl BackendError {
    pub(crate) fn decode(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

/// Pixel size of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// Shared across request threads behind an `Arc`, hence `Send + Sync`.
pub trait ImageBackend: Send + Sync {
    /// Decode `params.source`, shrink it to fit `params.max_edge` and write
    /// a JPEG to `params.output`. Returns the dimensions written.
    fn thumbnail(&self, params: &ThumbnailParams) -> Result<Dimensions, BackendError>;
}
