//! On-disk thumbnail cache.
//!
//! Thumbnails are generated on first request and kept forever. Nothing here
//! ever deletes a cached file: when a source changes, its fingerprint
//! changes and a new file is written next to the old one.
//!
//! # Cache keys
//!
//! The cache is **fingerprint-addressed**. A fingerprint is the SHA-256 of
//!
//! ```text
//! {rel_path}|{size}|{quality}|{source_size}|{source_mtime_ns}
//! ```
//!
//! so editing the file, touching it, or changing the requested size or the
//! configured quality all produce a different key. The cached JPEG lives at
//! `<cache_dir>/<hex[0..2]>/<hex>.jpg`; the two-character shard keeps
//! directories small on large libraries.
//!
//! # Concurrency
//!
//! A hit is a single `exists()` check with no locking. On a miss the caller
//! takes a per-fingerprint mutex from a lock table and checks again, so N
//! concurrent requests for the same missing thumbnail encode it exactly
//! once while unrelated thumbnails proceed in parallel. The lock table only
//! grows; one entry per fingerprint ever requested in this process.
//!
//! # Atomic writes
//!
//! The backend writes `<hex>.tmp` in the shard directory, which is then
//! renamed onto `<hex>.jpg`. Readers never see a partial JPEG, and a failed
//! encode removes its temp file.

use crate::config::GalleryConfig;
use crate::imaging::{BackendError, ImageBackend, Quality, RustBackend, ThumbnailParams};
use crate::urls::thumb_url;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("Invalid thumbnail size: {0}")]
    InvalidSize(u32),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Hit/miss counters for the life of the process.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u64 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} encoded ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} encoded", self.misses)
        }
    }
}

/// SHA-256 fingerprint of a thumbnail request, as lowercase hex.
pub fn fingerprint(
    rel_path: &str,
    size: u32,
    quality: u32,
    source_size: u64,
    source_mtime_ns: i128,
) -> String {
    let key = format!("{rel_path}|{size}|{quality}|{source_size}|{source_mtime_ns}");
    format!("{:x}", Sha256::digest(key.as_bytes()))
}

/// Nanoseconds since the Unix epoch; negative for earlier times.
fn mtime_ns(mtime: SystemTime) -> i128 {
    match mtime.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_nanos() as i128,
        Err(before) => -(before.duration().as_nanos() as i128),
    }
}

pub struct ThumbnailCache {
    cache_dir: PathBuf,
    default_size: u32,
    quality: Quality,
    backend: Arc<dyn ImageBackend>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    stats: Mutex<CacheStats>,
}

impl ThumbnailCache {
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        default_size: u32,
        quality: u32,
        backend: Arc<dyn ImageBackend>,
    ) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            default_size,
            quality: Quality::new(quality),
            backend,
            locks: Mutex::new(HashMap::new()),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// Cache backed by [`RustBackend`], configured from `[thumbnails]`.
    pub fn from_config(config: &GalleryConfig) -> Self {
        Self::new(
            &config.thumbnails.cache_dir,
            config.thumbnails.size,
            config.thumbnails.quality,
            Arc::new(RustBackend::new()),
        )
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn default_size(&self) -> u32 {
        self.default_size
    }

    /// `/api/thumb/<encoded rel_path>?size=<N>`, defaulting to the configured size.
    pub fn build_thumb_url(&self, rel_path: &str, size: Option<u32>) -> String {
        thumb_url(rel_path, size.unwrap_or(self.default_size))
    }

    /// Where the thumbnail for `fingerprint` lives, whether or not it exists.
    pub fn cache_path(&self, fingerprint: &str) -> PathBuf {
        let shard = fingerprint.get(..2).unwrap_or(fingerprint);
        self.cache_dir
            .join(shard)
            .join(format!("{fingerprint}.jpg"))
    }

    pub fn stats(&self) -> CacheStats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the cached thumbnail for `source`, generating it if needed.
    ///
    /// `source` must already be resolved and validated; `rel_path` is its
    /// root-relative form and takes part in the fingerprint.
    pub fn ensure_thumbnail(
        &self,
        source: &Path,
        rel_path: &str,
        size: Option<u32>,
    ) -> Result<PathBuf, ThumbnailError> {
        let size = size.unwrap_or(self.default_size);
        if size < 1 {
            return Err(ThumbnailError::InvalidSize(size));
        }

        let metadata = std::fs::metadata(source)?;
        let key = fingerprint(
            rel_path,
            size,
            self.quality.value(),
            metadata.len(),
            mtime_ns(metadata.modified()?),
        );
        let target = self.cache_path(&key);

        if target.exists() {
            self.record(CacheStats::hit);
            return Ok(target);
        }

        let lock = self.lock_for(&key);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Another request may have finished it while we waited.
        if target.exists() {
            self.record(CacheStats::hit);
            return Ok(target);
        }

        self.generate(source, &target, &key, size)?;
        self.record(CacheStats::miss);
        Ok(target)
    }

    fn generate(
        &self,
        source: &Path,
        target: &Path,
        key: &str,
        size: u32,
    ) -> Result<(), ThumbnailError> {
        let shard_dir = target.parent().unwrap_or(&self.cache_dir);
        std::fs::create_dir_all(shard_dir)?;
        let tmp = shard_dir.join(format!("{key}.tmp"));

        let result = self
            .backend
            .thumbnail(&ThumbnailParams {
                source: source.to_path_buf(),
                output: tmp.clone(),
                max_edge: size,
                quality: self.quality,
            })
            .map_err(ThumbnailError::from)
            .and_then(|dims| {
                std::fs::rename(&tmp, target)?;
                Ok(dims)
            });

        match result {
            Ok(dims) => {
                tracing::debug!(
                    source = %source.display(),
                    width = dims.width,
                    height = dims.height,
                    "thumbnail generated"
                );
                Ok(())
            }
            Err(e) => {
                let _ = std::fs::remove_file(&tmp);
                Err(e)
            }
        }
    }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    fn record(&self, outcome: fn(&mut CacheStats)) {
        outcome(&mut self.stats.lock().unwrap_or_else(PoisonError::into_inner));
    }
}
