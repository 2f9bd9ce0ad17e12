//! URL formatting for media and thumbnail routes.
//!
//! Relative paths are percent-encoded one segment at a time so that `/`
//! survives as a separator while spaces, `#`, `?`, `%` and non-ASCII
//! names are escaped.

/// Route prefix for original image bytes.
pub const MEDIA_PREFIX: &str = "/api/media/";

/// Route prefix for cached thumbnails.
pub const THUMB_PREFIX: &str = "/api/thumb/";

/// How an image's thumbnail URL is produced.
///
/// Chosen once from configuration: with thumbnails disabled the gallery
/// points thumbnail slots straight at the original media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlStrategy {
    DirectMediaUrl,
    ThumbnailUrl { size: u32 },
}

impl UrlStrategy {
    pub fn new(thumbnails_enabled: bool, size: u32) -> Self {
        if thumbnails_enabled {
            Self::ThumbnailUrl { size }
        } else {
            Self::DirectMediaUrl
        }
    }

    /// URL the gallery should use as the thumbnail for `rel_path`.
    pub fn thumb_url(&self, rel_path: &str) -> String {
        match self {
            Self::DirectMediaUrl => media_url(rel_path),
            Self::ThumbnailUrl { size } => thumb_url(rel_path, *size),
        }
    }
}

/// `/api/media/<encoded rel_path>`
pub fn media_url(rel_path: &str) -> String {
    format!("{MEDIA_PREFIX}{}", encode_path(rel_path))
}

/// `/api/thumb/<encoded rel_path>?size=<size>`
pub fn thumb_url(rel_path: &str, size: u32) -> String {
    format!("{THUMB_PREFIX}{}?size={size}", encode_path(rel_path))
}

/// Percent-encode each `/`-separated segment.
pub fn encode_path(rel_path: &str) -> String {
    rel_path
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_url_keeps_slashes() {
        assert_eq!(media_url("nested/older.png"), "/api/media/nested/older.png");
    }

    #[test]
    fn media_url_escapes_spaces_and_unicode() {
        assert_eq!(
            media_url("Été 2024/a b#1.jpg"),
            "/api/media/%C3%89t%C3%A9%202024/a%20b%231.jpg"
        );
    }

    #[test]
    fn thumb_url_appends_size() {
        assert_eq!(thumb_url("a/b.jpg", 320), "/api/thumb/a/b.jpg?size=320");
    }

    #[test]
    fn strategy_follows_thumbnail_flag() {
        assert_eq!(UrlStrategy::new(false, 480), UrlStrategy::DirectMediaUrl);
        assert_eq!(
            UrlStrategy::new(true, 480).thumb_url("x.jpg"),
            "/api/thumb/x.jpg?size=480"
        );
        assert_eq!(
            UrlStrategy::DirectMediaUrl.thumb_url("x.jpg"),
            "/api/media/x.jpg"
        );
    }
}
