//! Snapshot building: scanner output → folder-grouped, ordered view.
//!
//! A [`Snapshot`] is the unit the index cache swaps. It is built in one go
//! from a scan and never modified afterwards, so readers holding an
//! `Arc<Snapshot>` always see a complete, consistent view.
//!
//! ## Ordering rules
//!
//! - Folders: newest `latest_mtime` first; equal timestamps by ascending
//!   `rel_dir`.
//! - Images (per folder and global): newest mtime first, otherwise in scan
//!   order (the sort is stable).
//!
//! ## Covers
//!
//! The cover of a folder is the image with the greatest `(name, rel_path)`
//! pair. It does not depend on mtimes or on scan order, so a folder's
//! cover only changes when its file set changes.

use crate::paths::ROOT_DIR;
use crate::scan::{ImageRecord, ScannedImage, format_mtime};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::time::SystemTime;

/// One folder as shown in the folder listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderCover {
    /// Root-relative directory, `"."` for the root.
    pub rel_dir: String,
    /// Display name: last path component.
    pub name: String,
    pub cover: ImageRecord,
    pub image_count: usize,
    /// Newest image mtime in the folder, UTC RFC 3339.
    pub latest_mtime: String,
}

/// Immutable point-in-time view of the gallery.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    folders: Vec<FolderCover>,
    folder_images: HashMap<String, Vec<ImageRecord>>,
    images: Vec<ImageRecord>,
}

impl Snapshot {
    /// Folders in listing order.
    pub fn folders(&self) -> &[FolderCover] {
        &self.folders
    }

    /// Images of one folder in listing order, if the folder has any.
    pub fn folder_images(&self, rel_dir: &str) -> Option<&[ImageRecord]> {
        self.folder_images.get(rel_dir).map(Vec::as_slice)
    }

    /// Looks up a folder's summary entry.
    pub fn folder(&self, rel_dir: &str) -> Option<&FolderCover> {
        self.folders.iter().find(|f| f.rel_dir == rel_dir)
    }

    /// Every image, newest first.
    pub fn images(&self) -> &[ImageRecord] {
        &self.images
    }

    pub fn folder_count(&self) -> usize {
        self.folders.len()
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Posix parent directory of a relative path; root-level files map to `"."`.
pub fn parent_dir(rel_path: &str) -> &str {
    match rel_path.rfind('/') {
        Some(idx) if idx > 0 => &rel_path[..idx],
        _ => ROOT_DIR,
    }
}

/// Display name for a folder: its last component, or `root_name` for `"."`.
pub fn folder_name<'a>(rel_dir: &'a str, root_name: &'a str) -> &'a str {
    if rel_dir == ROOT_DIR {
        root_name
    } else {
        rel_dir.rsplit('/').next().unwrap_or(rel_dir)
    }
}

/// Per-folder accumulator while grouping.
struct FolderGroup {
    images: Vec<ScannedImage>,
    latest: SystemTime,
}

/// Build a snapshot from scanner output.
///
/// `root_name` labels the `"."` folder. Pure: no I/O, safe to run while
/// readers use the previous snapshot.
pub fn build_snapshot(records: Vec<ScannedImage>, root_name: &str) -> Snapshot {
    let mut all = records;
    // Stable: equal mtimes keep scan order.
    all.sort_by(|a, b| b.mtime.cmp(&a.mtime));

    // BTreeMap gives rel_dir-ascending iteration, the folder tie-break.
    let mut groups: BTreeMap<String, FolderGroup> = BTreeMap::new();
    for image in &all {
        let dir = parent_dir(&image.record.rel_path).to_string();
        let group = groups.entry(dir).or_insert_with(|| FolderGroup {
            images: Vec::new(),
            latest: image.mtime,
        });
        group.latest = group.latest.max(image.mtime);
        group.images.push(image.clone());
    }

    let mut ordered: Vec<(SystemTime, FolderCover)> = Vec::with_capacity(groups.len());
    let mut folder_images = HashMap::with_capacity(groups.len());

    for (rel_dir, group) in groups {
        let Some(cover) = pick_cover(&group.images) else {
            continue;
        };
        let cover = FolderCover {
            name: folder_name(&rel_dir, root_name).to_string(),
            cover: cover.clone(),
            image_count: group.images.len(),
            latest_mtime: format_mtime(group.latest),
            rel_dir: rel_dir.clone(),
        };
        ordered.push((group.latest, cover));
        folder_images.insert(
            rel_dir,
            group.images.into_iter().map(|i| i.record).collect(),
        );
    }

    // Stable over the rel_dir-ascending input.
    ordered.sort_by(|a, b| b.0.cmp(&a.0));

    Snapshot {
        folders: ordered.into_iter().map(|(_, folder)| folder).collect(),
        folder_images,
        images: all.into_iter().map(|i| i.record).collect(),
    }
}

/// Greatest `(name, rel_path)` pair.
fn pick_cover(images: &[ScannedImage]) -> Option<&ImageRecord> {
    images
        .iter()
        .map(|i| &i.record)
        .max_by(|a, b| (&a.name, &a.rel_path).cmp(&(&b.name, &b.rel_path)))
}
