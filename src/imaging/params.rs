//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the thumbnail cache (which decides what to create and
//! where) and the [`backend`](super::backend) (which does the pixel work).
//! This separation allows swapping backends (e.g. for testing with a mock)
//! without changing cache logic.
//!
//! ## Types
//!
//! - [`Quality`]: JPEG encoding quality (1–100, default 82). Clamped on construction.
//! - [`ThumbnailParams`]: Full specification for a thumbnail: source, output, longest edge, quality.

use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(82)
    }
}

/// Parameters for a thumbnail operation (shrink to fit + JPEG encode).
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailParams {
    pub source: PathBuf,
    /// Written in full or not at all is the caller's concern; the backend
    /// just creates this file.
    pub output: PathBuf,
    /// Neither edge of the result exceeds this.
    pub max_edge: u32,
    pub quality: Quality,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_82() {
        assert_eq!(Quality::default().value(), 82);
    }
}
