//! The gallery index cache.
//!
//! [`GalleryIndex`] owns the current [`Snapshot`] and decides when to
//! rebuild it. It is constructed once at startup and shared by cloning the
//! handle; every clone points at the same state.
//!
//! # Read policy
//!
//! Every listing goes through [`GalleryIndex::ensure_snapshot`]:
//!
//! | Situation | Action |
//! |---|---|
//! | caller asked for `refresh` | synchronous build, return it |
//! | nothing built yet | synchronous build (unless one finishes while waiting) |
//! | snapshot older than the TTL | start a background build, return the stale snapshot |
//! | otherwise | return the current snapshot |
//!
//! Age is measured on a monotonic [`Clock`], never on wall time. Builds read
//! the tree through a [`Scanner`]; [`FsScanner`] walks the filesystem.
//!
//! # Build coalescing
//!
//! The `building` flag in [`IndexState`] is a two-state machine,
//! `Idle ↔ Building`, guarded by one mutex and paired with a condvar:
//!
//! - a synchronous build waits on the condvar while `Building`, then claims
//!   the slot and builds fresh. It never reuses the result it waited for,
//!   because its caller asked for current data.
//! - a background trigger that finds `Building` does nothing; the build in
//!   flight will publish a fresh snapshot anyway.
//! - completion publishes the snapshot, the initialized flag and both
//!   timestamps, clears `building`, and wakes every waiter, all under one
//!   lock acquisition. The release runs from a drop guard, so a failing or
//!   panicking build cannot leave the flag set.
//!
//! # Failure
//!
//! A failed build keeps the previous snapshot. Synchronous callers get the
//! error; background failures are only logged. A root that keeps failing
//! therefore keeps serving the last good snapshot indefinitely.

use crate::config::{ConfigError, GalleryConfig, MAX_PAGE_SIZE};
use crate::paths::{PathError, ROOT_DIR, resolve_folder_path};
use crate::scan::{ImageRecord, ScanError, ScannedImage, scan};
use crate::snapshot::{FolderCover, Snapshot, build_snapshot};
use crate::urls::UrlStrategy;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("Index build failed: {0}")]
    Build(#[from] ScanError),
}

impl IndexError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Path(PathError::NotFound(_)))
    }

    /// Errors caused by the request itself rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::Path(PathError::InvalidPath(_))
        )
    }
}

/// Monotonic time source used for snapshot age.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// [`Clock`] backed by [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Produces the records a build turns into a snapshot.
pub trait Scanner: Send + Sync {
    fn scan(&self, settings: &IndexSettings) -> Result<Vec<ScannedImage>, ScanError>;
}

/// [`Scanner`] that walks the gallery root on disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsScanner;

impl Scanner for FsScanner {
    fn scan(&self, settings: &IndexSettings) -> Result<Vec<ScannedImage>, ScanError> {
        scan(
            &settings.root,
            settings.recursive,
            &settings.extensions,
            &settings.urls,
        )
    }
}

/// What to scan and how to label it.
#[derive(Debug, Clone)]
pub struct IndexSettings {
    /// Canonical gallery root.
    pub root: PathBuf,
    pub recursive: bool,
    pub extensions: BTreeSet<String>,
    pub urls: UrlStrategy,
    pub ttl: Duration,
}

impl IndexSettings {
    pub fn from_config(config: &GalleryConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            root: config.canonical_root()?,
            recursive: config.gallery.recursive,
            extensions: config.gallery.extensions.clone(),
            urls: config.url_strategy(),
            ttl: Duration::from_secs(config.index.ttl_seconds),
        })
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

/// A folder and all its images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderImages {
    pub rel_dir: String,
    pub name: String,
    pub items: Vec<ImageRecord>,
    pub total: usize,
}

/// Point-in-time view of the index's health.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStatus {
    pub last_built_at: Option<DateTime<Utc>>,
    pub age_seconds: Option<f64>,
    pub building: bool,
    pub folder_count: usize,
    pub image_count: usize,
    pub ttl_seconds: u64,
}

/// Mutable state; only touched with the mutex held.
struct IndexState {
    snapshot: Arc<Snapshot>,
    initialized: bool,
    building: bool,
    last_built_at: Option<DateTime<Utc>>,
    last_built_instant: Option<Instant>,
}

impl IndexState {
    fn is_stale(&self, now: Instant, ttl: Duration) -> bool {
        self.last_built_instant
            .is_some_and(|built| now.saturating_duration_since(built) >= ttl)
    }
}

/// When a synchronous build may skip its own scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncBuild {
    /// Always scan, even if a build finished while waiting.
    Forced,
    /// Return early if a build that was in flight has initialized the index.
    IfUninitialized,
}

struct Inner {
    settings: IndexSettings,
    root_name: String,
    clock: Arc<dyn Clock>,
    scanner: Arc<dyn Scanner>,
    state: Mutex<IndexState>,
    build_done: Condvar,
}

/// Shared handle to the gallery index.
#[derive(Clone)]
pub struct GalleryIndex {
    inner: Arc<Inner>,
}

impl GalleryIndex {
    pub fn new(settings: IndexSettings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    pub fn from_config(config: &GalleryConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(IndexSettings::from_config(config)?))
    }

    pub fn with_clock(settings: IndexSettings, clock: Arc<dyn Clock>) -> Self {
        Self::with_scanner(settings, clock, Arc::new(FsScanner))
    }

    pub fn with_scanner(
        mut settings: IndexSettings,
        clock: Arc<dyn Clock>,
        scanner: Arc<dyn Scanner>,
    ) -> Self {
        settings.ttl = settings.ttl.max(Duration::from_secs(1));
        let root_name = settings
            .root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| ROOT_DIR.to_string());
        Self {
            inner: Arc::new(Inner {
                settings,
                root_name,
                clock,
                scanner,
                state: Mutex::new(IndexState {
                    snapshot: Arc::new(Snapshot::default()),
                    initialized: false,
                    building: false,
                    last_built_at: None,
                    last_built_instant: None,
                }),
                build_done: Condvar::new(),
            }),
        }
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.inner.settings
    }

    /// Paginated folder listing. `page` and `page_size` start at 1.
    pub fn list_folder_covers(
        &self,
        page: usize,
        page_size: usize,
        refresh: bool,
    ) -> Result<Page<FolderCover>, IndexError> {
        if page < 1 {
            return Err(IndexError::InvalidArgument("page must be >= 1".into()));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(IndexError::InvalidArgument(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        let snapshot = self.ensure_snapshot(refresh)?;
        let folders = snapshot.folders();
        let total = folders.len();
        let items = folders
            .iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .cloned()
            .collect();

        Ok(Page {
            items,
            total,
            page,
            page_size,
            total_pages: total.div_ceil(page_size),
        })
    }

    /// All images of one folder. Folders with no indexed images are
    /// [`PathError::NotFound`], whether or not they exist on disk.
    pub fn list_folder_images(
        &self,
        rel_dir: &str,
        refresh: bool,
    ) -> Result<FolderImages, IndexError> {
        let rel_dir = resolve_folder_path(&self.inner.settings.root, rel_dir)?;
        let snapshot = self.ensure_snapshot(refresh)?;
        let folder = snapshot
            .folder(&rel_dir)
            .ok_or_else(|| PathError::NotFound(rel_dir.clone()))?;
        let items = snapshot
            .folder_images(&rel_dir)
            .unwrap_or_default()
            .to_vec();

        Ok(FolderImages {
            name: folder.name.clone(),
            total: items.len(),
            items,
            rel_dir,
        })
    }

    /// Every image, newest first.
    pub fn list_images(&self, refresh: bool) -> Result<Vec<ImageRecord>, IndexError> {
        Ok(self.ensure_snapshot(refresh)?.images().to_vec())
    }

    /// Never waits for a build.
    pub fn status(&self) -> IndexStatus {
        let now = self.inner.clock.now();
        let state = self.inner.lock_state();
        IndexStatus {
            last_built_at: state.last_built_at,
            age_seconds: state
                .last_built_instant
                .map(|built| now.saturating_duration_since(built).as_secs_f64()),
            building: state.building,
            folder_count: state.snapshot.folder_count(),
            image_count: state.snapshot.image_count(),
            ttl_seconds: self.inner.settings.ttl.as_secs(),
        }
    }

    /// Rebuild now and wait for it.
    pub fn refresh_sync(&self) -> Result<Arc<Snapshot>, IndexError> {
        self.inner.build_sync(SyncBuild::Forced)
    }

    /// Start a build on a background thread and return immediately.
    pub fn warmup_async(&self) {
        self.inner.trigger_background();
    }

    /// Block until no build is in flight.
    pub fn wait_idle(&self) {
        let mut state = self.inner.lock_state();
        while state.building {
            state = self
                .inner
                .build_done
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Return a snapshot according to the read policy in the module docs.
    pub fn ensure_snapshot(&self, refresh: bool) -> Result<Arc<Snapshot>, IndexError> {
        if refresh {
            return self.inner.build_sync(SyncBuild::Forced);
        }

        let now = self.inner.clock.now();
        let (snapshot, initialized, stale) = {
            let state = self.inner.lock_state();
            (
                Arc::clone(&state.snapshot),
                state.initialized,
                state.is_stale(now, self.inner.settings.ttl),
            )
        };

        if !initialized {
            return self.inner.build_sync(SyncBuild::IfUninitialized);
        }
        if stale {
            tracing::debug!("gallery index past TTL, rebuilding in background");
            self.inner.trigger_background();
        }
        Ok(snapshot)
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, IndexState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for `Idle`, claim `Building`, then build on this thread.
    fn build_sync(&self, mode: SyncBuild) -> Result<Arc<Snapshot>, IndexError> {
        let mut state = self.lock_state();
        while state.building {
            state = self
                .build_done
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if mode == SyncBuild::IfUninitialized && state.initialized {
            return Ok(Arc::clone(&state.snapshot));
        }
        state.building = true;
        drop(state);

        self.run_build()
    }

    /// Claim `Building` if idle and build on a new thread.
    fn trigger_background(self: &Arc<Self>) {
        {
            let mut state = self.lock_state();
            if state.building {
                return;
            }
            state.building = true;
        }

        let inner = Arc::clone(self);
        let spawned = std::thread::Builder::new()
            .name("gallery-index-build".into())
            .spawn(move || {
                if let Err(e) = inner.run_build() {
                    tracing::warn!(error = %e, "background gallery index build failed");
                }
            });

        if let Err(e) = spawned {
            tracing::warn!(error = %e, "could not spawn gallery index build thread");
            self.lock_state().building = false;
            self.build_done.notify_all();
        }
    }

    /// Scan and build. The caller must already hold the `Building` slot.
    fn run_build(&self) -> Result<Arc<Snapshot>, IndexError> {
        let mut slot = BuildSlot {
            inner: self,
            built: None,
        };

        let started = Instant::now();
        let records = self.scanner.scan(&self.settings)?;
        let snapshot = Arc::new(build_snapshot(records, &self.root_name));

        tracing::info!(
            folders = snapshot.folder_count(),
            images = snapshot.image_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "gallery index built"
        );

        slot.built = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }
}

/// Held for the duration of a build; releases the `Building` slot on drop,
/// publishing the snapshot first if one was produced.
struct BuildSlot<'a> {
    inner: &'a Inner,
    built: Option<Arc<Snapshot>>,
}

impl Drop for BuildSlot<'_> {
    fn drop(&mut self) {
        let now = self.inner.clock.now();
        let mut state = self.inner.lock_state();
        if let Some(snapshot) = self.built.take() {
            state.snapshot = snapshot;
            state.initialized = true;
            state.last_built_at = Some(Utc::now());
            state.last_built_instant = Some(now);
        }
        state.building = false;
        drop(state);
        self.inner.build_done.notify_all();
    }
}
