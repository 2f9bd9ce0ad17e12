//! Filesystem scanning.
//!
//! Walks the gallery root and produces one [`ImageRecord`] per image file.
//! The scanner is a pure function of filesystem state: it keeps nothing
//! between calls, and two scans of an unchanged tree produce identical
//! output.
//!
//! ## What counts as an image
//!
//! A regular file whose lowercased extension is in the configured set.
//! Directories, symlinked directories and everything else are skipped.
//! With `recursive = false` only direct children of the root are considered.
//!
//! ## Output order
//!
//! Records are sorted newest first by modification time, with the relative
//! path as a tie-break, so repeated scans of the same tree are identical
//! regardless of directory iteration order.

use crate::paths::{has_allowed_extension, to_posix};
use crate::urls::{UrlStrategy, media_url};
use chrono::{DateTime, SecondsFormat, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

/// A single image as exposed to gallery clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Stable identity; same as `rel_path`.
    pub id: String,
    /// File name, e.g. `dawn.jpg`.
    pub name: String,
    /// Root-relative path with `/` separators.
    pub rel_path: String,
    /// Modification time, UTC, RFC 3339.
    pub mtime: String,
    /// Size in bytes.
    pub size: u64,
    /// URL of the original bytes.
    pub url: String,
    /// URL of the thumbnail (or the original when thumbnails are off).
    pub thumb_url: String,
}

/// A scanned image plus the raw modification time used for ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedImage {
    pub mtime: SystemTime,
    pub record: ImageRecord,
}

/// Scan `root` for images.
///
/// `root` should already be canonical; relative paths are computed against
/// it verbatim.
pub fn scan(
    root: &Path,
    recursive: bool,
    allowed_extensions: &BTreeSet<String>,
    urls: &UrlStrategy,
) -> Result<Vec<ScannedImage>, ScanError> {
    let candidates = collect_candidates(root, recursive, allowed_extensions)?;

    // stat() dominates on large trees and network mounts
    let mut images = candidates
        .par_iter()
        .map(|path| build_record(root, path, urls))
        .collect::<Result<Vec<_>, _>>()?;

    sort_newest_first(&mut images);
    Ok(images)
}

fn collect_candidates(
    root: &Path,
    recursive: bool,
    allowed_extensions: &BTreeSet<String>,
) -> Result<Vec<PathBuf>, ScanError> {
    let mut walker = WalkDir::new(root).min_depth(1).follow_links(false);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut paths = Vec::new();
    for entry in walker {
        let entry = entry?;
        let path = entry.path();
        // Symlinked files count; symlinked directories are not descended.
        if path.is_file() && has_allowed_extension(path, allowed_extensions) {
            paths.push(path.to_path_buf());
        }
    }
    Ok(paths)
}

fn build_record(root: &Path, path: &Path, urls: &UrlStrategy) -> Result<ScannedImage, ScanError> {
    let io_err = |source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    };
    let metadata = std::fs::metadata(path).map_err(io_err)?;
    let mtime = metadata.modified().map_err(io_err)?;

    let relative = path.strip_prefix(root).unwrap_or(path);
    let rel_path = to_posix(relative);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    Ok(ScannedImage {
        mtime,
        record: ImageRecord {
            id: rel_path.clone(),
            name,
            url: media_url(&rel_path),
            thumb_url: urls.thumb_url(&rel_path),
            mtime: format_mtime(mtime),
            size: metadata.len(),
            rel_path,
        },
    })
}

/// Newest first; ties by ascending relative path.
pub fn sort_newest_first(images: &mut [ScannedImage]) {
    images.sort_by(|a, b| {
        b.mtime
            .cmp(&a.mtime)
            .then_with(|| a.record.rel_path.cmp(&b.record.rel_path))
    });
}

/// Format a modification time as UTC RFC 3339, e.g. `2024-05-01T12:00:00+00:00`.
///
/// Sub-second parts are written with microsecond precision and omitted
/// entirely when zero.
pub fn format_mtime(mtime: SystemTime) -> String {
    let utc: DateTime<Utc> = mtime.into();
    let format = if utc.timestamp_subsec_micros() == 0 {
        SecondsFormat::Secs
    } else {
        SecondsFormat::Micros
    };
    utc.to_rfc3339_opts(format, false)
}
