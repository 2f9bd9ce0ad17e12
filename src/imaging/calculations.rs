//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate dimensions that fit inside a `max_edge` square.
///
/// The aspect ratio is preserved and the image is never enlarged: a source
/// that already fits comes back unchanged. Neither edge rounds below 1.
///
/// # Examples
/// ```
/// # use langallery::imaging::calculate_fit_dimensions;
/// // Landscape 4000x3000 into 480 → 480x360
/// assert_eq!(calculate_fit_dimensions((4000, 3000), 480), (480, 360));
///
/// // Already small enough → unchanged
/// assert_eq!(calculate_fit_dimensions((200, 100), 480), (200, 100));
/// ```
pub fn calculate_fit_dimensions(source: (u32, u32), max_edge: u32) -> (u32, u32) {
    let (src_w, src_h) = source;
    let longest = src_w.max(src_h);

    if longest <= max_edge || longest == 0 {
        return source;
    }

    let scale = max_edge as f64 / longest as f64;
    let w = ((src_w as f64 * scale).round() as u32).clamp(1, max_edge);
    let h = ((src_h as f64 * scale).round() as u32).clamp(1, max_edge);
    (w, h)
}
