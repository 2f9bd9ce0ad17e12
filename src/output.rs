//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Folders are shown by their display name and image count, with the
//! root-relative directory and the cover as indented context lines, so a
//! `scan` reads as an inventory of the gallery rather than a file listing.
//!
//! # Output Format
//!
//! ## Scan
//!
//! ```text
//! Folders
//! 001 album (2 photos)
//!     Source: album/
//!     Cover: z-cover.jpg
//!     Latest: 1970-01-01T00:50:00+00:00
//! 002 gallery (1 photos)
//!     Source: ./
//!     Cover: root.jpg
//!     Latest: 1970-01-01T00:16:40+00:00
//!
//! Indexed 3 images in 2 folders
//! ```
//!
//! ## Status
//!
//! ```text
//! Index
//!     Folders: 2
//!     Images: 3
//!     Last built: 2024-05-01T12:00:00+00:00 (4.2s ago)
//!     TTL: 30s
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout.

use crate::index::IndexStatus;
use crate::paths::ROOT_DIR;
use crate::snapshot::Snapshot;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// ```text
/// 001 album (2 photos)
/// ```
fn entity_header(index: usize, title: &str, count: usize) -> String {
    format!("{} {} ({} photos)", format_index(index), title, count)
}

fn source_dir(rel_dir: &str) -> String {
    if rel_dir == ROOT_DIR {
        "./".to_string()
    } else {
        format!("{rel_dir}/")
    }
}

pub fn format_scan_output(snapshot: &Snapshot) -> Vec<String> {
    let mut lines = Vec::new();

    if snapshot.is_empty() {
        lines.push("No images found".to_string());
        return lines;
    }

    lines.push("Folders".to_string());
    for (i, folder) in snapshot.folders().iter().enumerate() {
        lines.push(entity_header(i + 1, &folder.name, folder.image_count));
        lines.push(format!("{}Source: {}", indent(1), source_dir(&folder.rel_dir)));
        lines.push(format!("{}Cover: {}", indent(1), folder.cover.name));
        lines.push(format!("{}Latest: {}", indent(1), folder.latest_mtime));
    }

    lines.push(String::new());
    lines.push(format!(
        "Indexed {} images in {} folders",
        snapshot.image_count(),
        snapshot.folder_count()
    ));
    lines
}

pub fn print_scan_output(snapshot: &Snapshot) {
    for line in format_scan_output(snapshot) {
        println!("{}", line);
    }
}

pub fn format_status(status: &IndexStatus) -> Vec<String> {
    let built = match (&status.last_built_at, status.age_seconds) {
        (Some(at), Some(age)) => format!(
            "{} ({:.1}s ago)",
            at.to_rfc3339_opts(chrono::SecondsFormat::Secs, false),
            age
        ),
        (Some(at), None) => at.to_rfc3339_opts(chrono::SecondsFormat::Secs, false),
        _ => "never".to_string(),
    };

    let mut lines = vec![
        "Index".to_string(),
        format!("{}Folders: {}", indent(1), status.folder_count),
        format!("{}Images: {}", indent(1), status.image_count),
        format!("{}Last built: {}", indent(1), built),
        format!("{}TTL: {}s", indent(1), status.ttl_seconds),
    ];
    if status.building {
        lines.push(format!("{}Rebuild in progress", indent(1)));
    }
    lines
}

pub fn print_status(status: &IndexStatus) {
    for line in format_status(status) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::build_snapshot;
    use crate::test_helpers::scanned;
    use chrono::{TimeZone, Utc};

    #[test]
    fn format_index_pads_to_three_digits() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(1000), "1000");
    }

    #[test]
    fn scan_output_lists_folders_in_order() {
        let snapshot = build_snapshot(
            vec![
                scanned("root.jpg", 1000),
                scanned("album/new.png", 3000),
                scanned("album/z-cover.jpg", 2000),
            ],
            "gallery",
        );

        let lines = format_scan_output(&snapshot);
        assert_eq!(
            lines,
            vec![
                "Folders",
                "001 album (2 photos)",
                "    Source: album/",
                "    Cover: z-cover.jpg",
                "    Latest: 1970-01-01T00:50:00+00:00",
                "002 gallery (1 photos)",
                "    Source: ./",
                "    Cover: root.jpg",
                "    Latest: 1970-01-01T00:16:40+00:00",
                "",
                "Indexed 3 images in 2 folders",
            ]
        );
    }

    #[test]
    fn scan_output_empty_gallery() {
        let lines = format_scan_output(&Snapshot::default());
        assert_eq!(lines, vec!["No images found"]);
    }

    #[test]
    fn status_never_built() {
        let status = IndexStatus {
            last_built_at: None,
            age_seconds: None,
            building: true,
            folder_count: 0,
            image_count: 0,
            ttl_seconds: 30,
        };
        let lines = format_status(&status);
        assert!(lines.contains(&"    Last built: never".to_string()));
        assert_eq!(lines.last().unwrap(), "    Rebuild in progress");
    }

    #[test]
    fn status_with_age() {
        let status = IndexStatus {
            last_built_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
            age_seconds: Some(4.2),
            building: false,
            folder_count: 2,
            image_count: 3,
            ttl_seconds: 30,
        };
        assert_eq!(
            format_status(&status),
            vec![
                "Index",
                "    Folders: 2",
                "    Images: 3",
                "    Last built: 2024-05-01T12:00:00+00:00 (4.2s ago)",
                "    TTL: 30s",
            ]
        );
    }
}
