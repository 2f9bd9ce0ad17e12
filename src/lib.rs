//! # LanGallery
//!
//! A small photo gallery server for the local network. Point it at a folder
//! and every directory that directly contains images becomes a gallery
//! folder, listed newest first with a cover image. Thumbnails are generated
//! on demand and cached on disk.
//!
//! # Architecture: Snapshot + Two Caches
//!
//! The filesystem is the only data source. Nothing is persisted except
//! thumbnail files.
//!
//! ```text
//! request → paths (resolve, reject traversal)
//!         → index (snapshot view; scan + build when needed)
//!         → thumbs (fingerprint → cached JPEG, generate on miss)
//! ```
//!
//! - The **index** holds one immutable [`snapshot::Snapshot`] at a time and
//!   replaces it wholesale. Readers get an `Arc` and never see a half-built
//!   listing.
//! - The **thumbnail cache** is keyed by a fingerprint of path, size,
//!   quality, and the source's size and mtime, so it never needs explicit
//!   invalidation.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`paths`] | Resolves client-supplied relative paths under the root, rejecting escapes |
//! | [`urls`] | Media and thumbnail URL formatting with per-segment percent-encoding |
//! | [`scan`] | Walks the gallery root into image records |
//! | [`snapshot`] | Groups records into folders, picks covers, fixes ordering |
//! | [`index`] | TTL snapshot cache with coalesced synchronous and background builds |
//! | [`thumbs`] | Fingerprint-addressed on-disk JPEG thumbnail cache |
//! | [`imaging`] | Pure-Rust decode, orientation, resize, JPEG encode |
//! | [`config`] | Layered `config.toml` + CLI configuration and validation |
//! | [`server`] | axum HTTP routes over the index and thumbnail cache |
//! | [`output`] | CLI output formatting |
//! | [`logging`] | `tracing` subscriber setup |
//!
//! # Design Decisions
//!
//! ## Serve Stale, Rebuild in the Background
//!
//! Walking a large tree on a NAS can take seconds. Once a snapshot exists,
//! reads never wait for a scan: a snapshot older than the TTL is still
//! returned while a single background build replaces it. Only the very
//! first read and explicit `refresh` requests block.
//!
//! ## Pure-Rust Imaging
//!
//! Thumbnails are made with the `image` crate alone, so the binary has no
//! system dependencies. EXIF orientation is applied before resizing, so
//! phone photos come out upright.

pub mod config;
pub mod imaging;
pub mod index;
pub mod logging;
pub mod output;
pub mod paths;
pub mod scan;
pub mod server;
pub mod snapshot;
pub mod thumbs;
pub mod urls;

#[cfg(test)]
pub(crate) mod test_helpers;
