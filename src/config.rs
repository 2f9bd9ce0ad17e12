//! Gallery configuration.
//!
//! Configuration is layered. Stock defaults are the base, an optional
//! `config.toml` is merged on top, and command-line flags are merged last:
//!
//! ```text
//! stock defaults  →  --config file  →  CLI flags  →  validate()
//! ```
//!
//! Every layer is a `toml::Value`, so a layer only has to mention the keys it
//! overrides. The merged value is deserialized once into [`GalleryConfig`]
//! and validated. The result is immutable for the life of the process.
//!
//! ## Configuration Options
//!
//! ```toml
//! [gallery]
//! root = "."                 # Directory tree to serve
//! recursive = true           # Descend into subfolders
//! extensions = ["bmp", "gif", "jpeg", "jpg", "png", "webp"]
//!
//! [index]
//! ttl_seconds = 30           # Snapshot age that triggers a background rebuild
//!
//! [thumbnails]
//! enabled = true
//! size = 480                 # Max edge in pixels
//! quality = 82               # JPEG quality (1-100)
//! cache_dir = "~/.cache/langallery/thumbnails"
//!
//! [server]
//! host = "0.0.0.0"
//! port = 8000
//! frontend_dist = "frontend/dist"   # Optional built web UI served at `/`
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::urls::UrlStrategy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Largest page size the listing endpoints accept.
pub const MAX_PAGE_SIZE: usize = 500;

/// Full gallery configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryConfig {
    /// What to serve.
    pub gallery: GallerySection,
    /// In-memory index behaviour.
    pub index: IndexSection,
    /// Thumbnail generation and on-disk cache.
    pub thumbnails: ThumbnailsSection,
    /// HTTP bind address.
    pub server: ServerSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GallerySection {
    /// Root of the image tree.
    pub root: PathBuf,
    /// Whether subfolders are scanned.
    pub recursive: bool,
    /// Allowed file extensions: lowercase, no leading dot.
    pub extensions: BTreeSet<String>,
}

impl Default for GallerySection {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            recursive: true,
            extensions: default_extensions(),
        }
    }
}

fn default_extensions() -> BTreeSet<String> {
    ["bmp", "gif", "jpeg", "jpg", "png", "webp"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexSection {
    /// Snapshot age, in seconds, after which a read triggers a background rebuild.
    pub ttl_seconds: u64,
}

impl Default for IndexSection {
    fn default() -> Self {
        Self { ttl_seconds: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailsSection {
    /// When false, thumbnail URLs point at the original media.
    pub enabled: bool,
    /// Longest edge of a generated thumbnail, in pixels.
    pub size: u32,
    /// JPEG encoding quality (1 = worst, 100 = best).
    pub quality: u32,
    /// Root of the sharded thumbnail cache.
    pub cache_dir: PathBuf,
}

impl Default for ThumbnailsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            size: 480,
            quality: 82,
            cache_dir: default_thumb_cache_dir(),
        }
    }
}

fn default_thumb_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("langallery")
        .join("thumbnails")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    /// Built web UI served at `/`. Unset, or not a directory, means `/`
    /// answers with a JSON pointer to the API instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontend_dist: Option<PathBuf>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            frontend_dist: None,
        }
    }
}

impl GalleryConfig {
    /// Validate config values are within acceptable ranges.
    ///
    /// Pure: does not touch the filesystem. See [`GalleryConfig::canonical_root`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.thumbnails.quality) {
            return Err(ConfigError::Validation(
                "thumbnails.quality must be 1-100".into(),
            ));
        }
        if self.thumbnails.size == 0 {
            return Err(ConfigError::Validation(
                "thumbnails.size must be at least 1".into(),
            ));
        }
        if self.index.ttl_seconds == 0 {
            return Err(ConfigError::Validation(
                "index.ttl_seconds must be at least 1".into(),
            ));
        }
        if self.gallery.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "gallery.extensions must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Lowercase extensions and strip leading dots, dropping empties.
    pub fn normalize(mut self) -> Self {
        self.gallery.extensions = self
            .gallery
            .extensions
            .iter()
            .filter_map(|e| normalize_extension(e))
            .collect();
        self
    }

    /// The gallery root, canonicalized. Fails unless it is an existing directory.
    pub fn canonical_root(&self) -> Result<PathBuf, ConfigError> {
        let root = &self.gallery.root;
        if !root.is_dir() {
            return Err(ConfigError::Validation(format!(
                "Gallery directory does not exist: {}",
                root.display()
            )));
        }
        Ok(root.canonicalize()?)
    }

    pub fn url_strategy(&self) -> UrlStrategy {
        UrlStrategy::new(self.thumbnails.enabled, self.thumbnails.size)
    }

    /// The frontend directory, if one is configured and exists.
    pub fn frontend_dir(&self) -> Option<PathBuf> {
        let dist = self.server.frontend_dist.as_ref()?;
        if dist.is_dir() {
            Some(dist.clone())
        } else {
            tracing::warn!(
                path = %dist.display(),
                "frontend dist not found, serving the API only"
            );
            None
        }
    }
}

fn normalize_extension(raw: &str) -> Option<String> {
    let ext = raw.trim().trim_start_matches('.').to_lowercase();
    if ext.is_empty() { None } else { Some(ext) }
}

/// Parse a comma-separated extension list such as `"JPG, .png,webp"`.
pub fn parse_extensions(raw: &str) -> Result<BTreeSet<String>, ConfigError> {
    let values: BTreeSet<String> = raw.split(',').filter_map(normalize_extension).collect();
    if values.is_empty() {
        return Err(ConfigError::Validation(
            "No valid image extension configured.".into(),
        ));
    }
    Ok(values)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer every override is merged onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(GalleryConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge overlays in order onto the stock defaults, deserialize, normalize
/// and validate.
pub fn resolve_config(
    overlays: impl IntoIterator<Item = toml::Value>,
) -> Result<GalleryConfig, ConfigError> {
    let merged = overlays
        .into_iter()
        .fold(stock_defaults_value(), merge_toml);
    let config: GalleryConfig = merged.try_into()?;
    let config = config.normalize();
    config.validate()?;
    Ok(config)
}

/// Load the configuration: stock defaults, then the optional file, then
/// `cli_overrides`.
pub fn load_config(
    file: Option<&Path>,
    cli_overrides: toml::Value,
) -> Result<GalleryConfig, ConfigError> {
    let mut overlays = Vec::new();
    if let Some(path) = file {
        overlays.push(load_raw_config(path)?);
    }
    overlays.push(cli_overrides);
    resolve_config(overlays)
}

/// Returns a fully-commented stock `config.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# LanGallery Configuration
# ========================
# All settings are optional. Values shown below are the defaults.
# Command-line flags override anything set here.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Gallery
# ---------------------------------------------------------------------------
[gallery]
# Directory tree to serve.
root = "."

# Descend into subfolders. Each folder with images becomes a gallery folder.
recursive = true

# File extensions treated as images (case-insensitive, no leading dot).
extensions = ["bmp", "gif", "jpeg", "jpg", "png", "webp"]

# ---------------------------------------------------------------------------
# Index
# ---------------------------------------------------------------------------
[index]
# Seconds before a read triggers a background rescan. The stale index keeps
# being served while the rescan runs.
ttl_seconds = 30

# ---------------------------------------------------------------------------
# Thumbnails
# ---------------------------------------------------------------------------
[thumbnails]
# When false, thumbnail URLs point at the original images.
enabled = true

# Longest edge of generated thumbnails, in pixels.
size = 480

# JPEG quality (1 = worst, 100 = best).
quality = 82

# Where generated thumbnails are stored. Defaults to the platform cache
# directory (e.g. ~/.cache/langallery/thumbnails).
# cache_dir = "/var/cache/langallery"

# ---------------------------------------------------------------------------
# Server
# ---------------------------------------------------------------------------
[server]
host = "0.0.0.0"
port = 8000

# Built web UI (e.g. the output of `npm run build`) served at `/`. Unknown
# paths fall back to its index.html. Without it, `/` returns a short JSON
# pointer to the API.
# frontend_dist = "frontend/dist"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn table(toml_src: &str) -> toml::Value {
        toml::from_str(toml_src).unwrap()
    }

    #[test]
    fn default_config_values() {
        let config = GalleryConfig::default();
        assert!(config.gallery.recursive);
        assert_eq!(config.index.ttl_seconds, 30);
        assert_eq!(config.thumbnails.size, 480);
        assert_eq!(config.thumbnails.quality, 82);
        assert!(config.thumbnails.enabled);
        assert_eq!(config.server.port, 8000);
        assert!(config.gallery.extensions.contains("jpg"));
        assert!(config.gallery.extensions.contains("webp"));
    }

    #[test]
    fn default_config_validates() {
        assert!(GalleryConfig::default().validate().is_ok());
    }

    #[test]
    fn parse_partial_config() {
        let config: GalleryConfig = toml::from_str(
            r#"
[thumbnails]
quality = 70
"#,
        )
        .unwrap();
        assert_eq!(config.thumbnails.quality, 70);
        assert_eq!(config.thumbnails.size, 480);
        assert_eq!(config.index.ttl_seconds, 30);
    }

    #[test]
    fn unknown_keys_rejected() {
        let result: Result<GalleryConfig, _> = toml::from_str(
            r#"
[thumbnails]
qualty = 70
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_quality() {
        let mut config = GalleryConfig::default();
        config.thumbnails.quality = 0;
        assert!(config.validate().is_err());
        config.thumbnails.quality = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_ttl_and_size() {
        let mut config = GalleryConfig::default();
        config.index.ttl_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = GalleryConfig::default();
        config.thumbnails.size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn merge_overrides_nested_keys_and_keeps_siblings() {
        let merged = merge_toml(
            stock_defaults_value(),
            table("[index]\nttl_seconds = 5\n"),
        );
        let config: GalleryConfig = merged.try_into().unwrap();
        assert_eq!(config.index.ttl_seconds, 5);
        assert_eq!(config.thumbnails.size, 480);
    }

    #[test]
    fn later_overlays_win() {
        let config = resolve_config([
            table("[server]\nport = 9000\n"),
            table("[server]\nport = 9100\n"),
        ])
        .unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn resolve_normalizes_extensions() {
        let config = resolve_config([table(
            "[gallery]\nextensions = [\".JPG\", \" Png \", \"\"]\n",
        )])
        .unwrap();
        let exts: Vec<&str> = config.gallery.extensions.iter().map(String::as_str).collect();
        assert_eq!(exts, vec!["jpg", "png"]);
    }

    #[test]
    fn resolve_rejects_empty_extensions() {
        let result = resolve_config([table("[gallery]\nextensions = [\".\"]\n")]);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn load_config_reads_file_then_cli() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            "[thumbnails]\nsize = 256\nquality = 60\n",
        )
        .unwrap();

        let config = load_config(Some(&path), table("[thumbnails]\nquality = 90\n")).unwrap();
        assert_eq!(config.thumbnails.size, 256);
        assert_eq!(config.thumbnails.quality, 90);
    }

    #[test]
    fn load_config_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let result = load_config(
            Some(&tmp.path().join("nope.toml")),
            toml::Value::Table(Default::default()),
        );
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn parse_extensions_normalizes() {
        let exts = parse_extensions("JPG, .png,,webp ").unwrap();
        let exts: Vec<&str> = exts.iter().map(String::as_str).collect();
        assert_eq!(exts, vec!["jpg", "png", "webp"]);
    }

    #[test]
    fn parse_extensions_rejects_empty() {
        assert!(parse_extensions(" , ,").is_err());
    }

    #[test]
    fn canonical_root_requires_directory() {
        let tmp = TempDir::new().unwrap();
        let mut config = GalleryConfig::default();
        config.gallery.root = tmp.path().join("missing");
        assert!(config.canonical_root().is_err());

        config.gallery.root = tmp.path().to_path_buf();
        assert_eq!(
            config.canonical_root().unwrap(),
            tmp.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn url_strategy_follows_thumbnail_settings() {
        let mut config = GalleryConfig::default();
        config.thumbnails.size = 300;
        assert_eq!(config.url_strategy(), UrlStrategy::ThumbnailUrl { size: 300 });
        config.thumbnails.enabled = false;
        assert_eq!(config.url_strategy(), UrlStrategy::DirectMediaUrl);
    }

    #[test]
    fn frontend_dir_requires_existing_directory() {
        let tmp = TempDir::new().unwrap();
        let mut config = GalleryConfig::default();
        assert_eq!(config.frontend_dir(), None);

        config.server.frontend_dist = Some(tmp.path().join("missing"));
        assert_eq!(config.frontend_dir(), None);

        config.server.frontend_dist = Some(tmp.path().to_path_buf());
        assert_eq!(config.frontend_dir(), Some(tmp.path().to_path_buf()));
    }

    #[test]
    fn frontend_dist_is_optional_in_toml() {
        let config = resolve_config([table("[server]\nfrontend_dist = \"ui/dist\"\n")]).unwrap();
        assert_eq!(config.server.frontend_dist, Some(PathBuf::from("ui/dist")));
        assert_eq!(resolve_config(Vec::new()).unwrap().server.frontend_dist, None);
    }

    #[test]
    fn stock_config_toml_parses_to_defaults() {
        let config: GalleryConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = GalleryConfig::default();
        assert_eq!(config.gallery.extensions, defaults.gallery.extensions);
        assert_eq!(config.index.ttl_seconds, defaults.index.ttl_seconds);
        assert_eq!(config.thumbnails.quality, defaults.thumbnails.quality);
        assert_eq!(config.server.port, defaults.server.port);
    }
}
