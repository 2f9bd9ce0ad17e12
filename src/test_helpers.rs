//! Shared test utilities for the langallery test suite.
//!
//! Fixture writers for gallery trees, record builders for snapshot tests,
//! and a manually advanced [`Clock`] for TTL tests.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! write_file(&tmp.path().join("album/a.jpg"), b"img");
//! set_mtime(&tmp.path().join("album/a.jpg"), 3000);
//! ```

use crate::index::Clock;
use crate::scan::{ImageRecord, ScannedImage, format_mtime};
use crate::urls::media_url;
use image::{ImageEncoder, RgbImage};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

// =========================================================================
// Filesystem fixtures
// =========================================================================

/// Write `bytes` to `path`, creating parent directories.
pub fn write_file(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, bytes).unwrap();
}

/// Set a file's modification time to `secs` after the Unix epoch.
pub fn set_mtime(path: &Path, secs: i64) {
    filetime::set_file_mtime(path, filetime::FileTime::from_unix_time(secs, 0)).unwrap();
}

/// Write a real JPEG with a gradient so decoders have something to chew on.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Lowercased extension set, as the config layer would produce it.
pub fn extensions(exts: &[&str]) -> BTreeSet<String> {
    exts.iter().map(|e| e.to_lowercase()).collect()
}

// =========================================================================
// Record builders
// =========================================================================

/// A scanned image at `rel_path` with mtime `secs` after the epoch.
pub fn scanned(rel_path: &str, secs: u64) -> ScannedImage {
    let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(secs);
    let name = rel_path.rsplit('/').next().unwrap_or(rel_path).to_string();
    ScannedImage {
        mtime,
        record: ImageRecord {
            id: rel_path.to_string(),
            name,
            rel_path: rel_path.to_string(),
            mtime: format_mtime(mtime),
            size: 3,
            url: media_url(rel_path),
            thumb_url: media_url(rel_path),
        },
    }
}

// =========================================================================
// Clock
// =========================================================================

/// A [`Clock`] that only moves when told to.
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap()
    }
}
