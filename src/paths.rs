//! Caller-supplied path validation.
//!
//! Every path that arrives from outside (an HTTP route segment, a CLI
//! argument) is relative to the gallery root and untrusted. The resolver
//! turns it into something the caches can use, or rejects it:
//!
//! - `\` separators are treated as `/`, so Windows-style paths behave the same.
//! - Leading slashes are stripped: `/album` means `album` under the root.
//! - The path is followed from the canonical root one segment at a time, the
//!   way the filesystem would: existing segments are canonicalized (which
//!   resolves symlinks), and from the first missing segment on the rest is
//!   applied lexically.
//! - The result must be the root or live under it. `../secret.jpg` is
//!   therefore [`PathError::InvalidPath`] whether or not the target exists,
//!   a symlink pointing outside the gallery is invalid too, and
//!   `../<root>/a.jpg` is fine because it lands back inside.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// The canonical relative directory used for the gallery root.
pub const ROOT_DIR: &str = ".";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Illegal path: {0}")]
    InvalidPath(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Resolve a media file path under `root`.
///
/// Fails with [`PathError::InvalidPath`] when the path escapes the root and
/// [`PathError::NotFound`] when it is not an existing regular file whose
/// extension is in `allowed_extensions`.
pub fn resolve_media_path(
    root: &Path,
    rel: &str,
    allowed_extensions: &BTreeSet<String>,
) -> Result<PathBuf, PathError> {
    let candidate = resolve_under_root(root, rel)?;
    if !candidate.is_file() || !has_allowed_extension(&candidate, allowed_extensions) {
        return Err(PathError::NotFound(rel.to_string()));
    }
    Ok(candidate)
}

/// Resolve a folder path under `root` to its canonical relative form.
///
/// Returns [`ROOT_DIR`] for the root itself (including empty and all-slash
/// input), otherwise the root-relative posix path such as `"trips/2024"`.
pub fn resolve_folder_path(root: &Path, rel: &str) -> Result<String, PathError> {
    let candidate = resolve_under_root(root, rel)?;
    if !candidate.is_dir() {
        return Err(PathError::NotFound(rel.to_string()));
    }
    let canonical_root = canonical_root(root, rel)?;
    let relative = candidate
        .strip_prefix(&canonical_root)
        .map_err(|_| PathError::InvalidPath(rel.to_string()))?;
    Ok(to_posix(relative))
}

/// Whether the file's lowercased extension is one of `allowed`.
///
/// `allowed` holds lowercase extensions without the leading dot.
pub fn has_allowed_extension(path: &Path, allowed: &BTreeSet<String>) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|ext| !ext.is_empty() && allowed.contains(&ext))
}

/// Render a relative path with `/` separators; the empty path becomes `"."`.
pub fn to_posix(relative: &Path) -> String {
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        ROOT_DIR.to_string()
    } else {
        parts.join("/")
    }
}

fn canonical_root(root: &Path, rel: &str) -> Result<PathBuf, PathError> {
    root.canonicalize()
        .map_err(|_| PathError::NotFound(rel.to_string()))
}

/// Shared core of both resolvers: follow the path, confirm containment,
/// then require that it exists.
fn resolve_under_root(root: &Path, rel: &str) -> Result<PathBuf, PathError> {
    let normalized = rel.replace('\\', "/");
    let canonical_root = canonical_root(root, rel)?;

    let (candidate, exists) = follow(&canonical_root, normalized.trim_start_matches('/'));
    if !candidate.starts_with(&canonical_root) {
        return Err(PathError::InvalidPath(rel.to_string()));
    }
    if !exists {
        return Err(PathError::NotFound(rel.to_string()));
    }
    Ok(candidate)
}

/// Apply the `/`-separated `rel` to `base`. Returns the resulting path and
/// whether every segment existed.
fn follow(base: &Path, rel: &str) -> (PathBuf, bool) {
    let mut current = base.to_path_buf();
    let mut exists = true;
    for segment in rel.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                current.pop();
            }
            name => {
                current.push(name);
                if exists {
                    match current.canonicalize() {
                        Ok(resolved) => current = resolved,
                        Err(_) => exists = false,
                    }
                }
            }
        }
    }
    (current, exists)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{extensions, write_file};
    use tempfile::TempDir;

    #[test]
    fn media_path_resolves_nested_file() {
        let tmp = TempDir::new().unwrap();
        write_file(&tmp.path().join("album/a.jpg"), b"jpg");

        let resolved = resolve_media_path(tmp.path(), "album/a.jpg", &extensions(&["jpg"])).unwrap();
        assert_eq!(resolved, tmp.path().canonicalize().unwrap().join("album/a.jpg"));
    }

    #[test]
    fn media_path_accepts_backslashes() {
        let tmp = TempDir::new().unwrap();
        write_file(&tmp.path().join("album/a.jpg"), b"jpg");

        assert!(resolve_media_path(tmp.path(), "album\\a.jpg", &extensions(&["jpg"])).is_ok());
    }

    #[test]
    fn media_path_blocks_traversal() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        write_file(&root.join("safe.jpg"), b"jpg");
        write_file(&tmp.path().join("secret.jpg"), b"jpg");

        let err = resolve_media_path(&root, "../secret.jpg", &extensions(&["jpg"])).unwrap_err();
        assert!(matches!(err, PathError::InvalidPath(_)));
    }

    #[test]
    fn media_path_traversal_is_invalid_even_when_target_is_missing() {
        let tmp = TempDir::new().unwrap();
        let err =
            resolve_media_path(tmp.path(), "../does-not-exist.jpg", &extensions(&["jpg"])).unwrap_err();
        assert!(matches!(err, PathError::InvalidPath(_)));
    }

    #[test]
    fn media_path_inner_dotdot_that_stays_inside_is_fine() {
        let tmp = TempDir::new().unwrap();
        write_file(&tmp.path().join("a.jpg"), b"jpg");
        std::fs::create_dir_all(tmp.path().join("album")).unwrap();

        assert!(resolve_media_path(tmp.path(), "album/../a.jpg", &extensions(&["jpg"])).is_ok());
    }

    #[test]
    fn media_path_rejects_disallowed_extension_as_not_found() {
        let tmp = TempDir::new().unwrap();
        write_file(&tmp.path().join("notes.txt"), b"text");

        let err = resolve_media_path(tmp.path(), "notes.txt", &extensions(&["jpg"])).unwrap_err();
        assert!(matches!(err, PathError::NotFound(_)));
    }

    #[test]
    fn media_path_extension_check_is_case_insensitive() {
        let tmp = TempDir::new().unwrap();
        write_file(&tmp.path().join("LOUD.JPG"), b"jpg");

        assert!(resolve_media_path(tmp.path(), "LOUD.JPG", &extensions(&["jpg"])).is_ok());
    }

    #[test]
    fn media_path_directory_is_not_found() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("album.jpg")).unwrap();

        let err = resolve_media_path(tmp.path(), "album.jpg", &extensions(&["jpg"])).unwrap_err();
        assert!(matches!(err, PathError::NotFound(_)));
    }

    #[cfg(unix)]
    #[test]
    fn media_path_symlink_out_of_root_is_invalid() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        std::fs::create_dir_all(&root).unwrap();
        write_file(&tmp.path().join("outside.jpg"), b"jpg");
        std::os::unix::fs::symlink(tmp.path().join("outside.jpg"), root.join("link.jpg")).unwrap();

        let err = resolve_media_path(&root, "link.jpg", &extensions(&["jpg"])).unwrap_err();
        assert!(matches!(err, PathError::InvalidPath(_)));
    }

    #[test]
    fn folder_path_root_spellings() {
        let tmp = TempDir::new().unwrap();
        for input in ["", ".", "/", "///", "./"] {
            assert_eq!(resolve_folder_path(tmp.path(), input).unwrap(), ".", "input {input:?}");
        }
    }

    #[test]
    fn folder_path_returns_posix_relative() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("trips/2024")).unwrap();

        assert_eq!(resolve_folder_path(tmp.path(), "trips\\2024").unwrap(), "trips/2024");
        assert_eq!(resolve_folder_path(tmp.path(), "/trips/2024/").unwrap(), "trips/2024");
    }

    #[test]
    fn folder_path_blocks_traversal() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        std::fs::create_dir_all(root.join("safe")).unwrap();

        let err = resolve_folder_path(&root, "../safe").unwrap_err();
        assert!(matches!(err, PathError::InvalidPath(_)));
    }

    #[test]
    fn folder_path_missing_or_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        write_file(&tmp.path().join("a.jpg"), b"jpg");

        assert!(matches!(
            resolve_folder_path(tmp.path(), "missing").unwrap_err(),
            PathError::NotFound(_)
        ));
        assert!(matches!(
            resolve_folder_path(tmp.path(), "a.jpg").unwrap_err(),
            PathError::NotFound(_)
        ));
    }

    #[test]
    fn media_path_may_climb_out_and_back_in() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("g");
        write_file(&root.join("a.jpg"), b"jpg");

        let resolved = resolve_media_path(&root, "../g/a.jpg", &extensions(&["jpg"])).unwrap();
        assert_eq!(resolved, root.canonicalize().unwrap().join("a.jpg"));
        assert_eq!(resolve_folder_path(&root, "../g").unwrap(), ".");
    }

    #[test]
    fn media_path_missing_then_escaping_is_invalid() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        std::fs::create_dir_all(&root).unwrap();

        let err = resolve_media_path(&root, "missing/../../x.jpg", &extensions(&["jpg"])).unwrap_err();
        assert!(matches!(err, PathError::InvalidPath(_)));
        let err = resolve_media_path(&root, "missing/x.jpg", &extensions(&["jpg"])).unwrap_err();
        assert!(matches!(err, PathError::NotFound(_)));
    }

    #[cfg(unix)]
    #[test]
    fn folder_path_dotdot_after_symlink_climbs_from_its_target() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        std::fs::create_dir_all(root.join("inner")).unwrap();
        std::fs::create_dir_all(tmp.path().join("elsewhere/album")).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("elsewhere/album"), root.join("link")).unwrap();

        let err = resolve_folder_path(&root, "link/../inner").unwrap_err();
        assert!(matches!(err, PathError::InvalidPath(_)));
    }
}
