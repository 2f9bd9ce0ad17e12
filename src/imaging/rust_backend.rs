//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, BMP, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | Orientation | EXIF orientation from the decoder, applied before resizing |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::calculate_fit_dimensions;
use super::params::ThumbnailParams;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder, ImageReader};
use std::io::Write;
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load, decode and upright an image.
///
/// The format is sniffed from the content, so a mislabelled extension still
/// decodes. Orientation is read before the decoder is consumed.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    let mut decoder = ImageReader::open(path)?
        .with_guessed_format()?
        .into_decoder()
        .map_err(|e| BackendError::decode(path, e))?;
    let orientation = decoder
        .orientation()
        .map_err(|e| BackendError::decode(path, e))?;

    let mut img = DynamicImage::from_decoder(decoder).map_err(|e| BackendError::decode(path, e))?;
    img.apply_orientation(orientation);
    Ok(img)
}

/// Encode as baseline RGB JPEG.
fn save_jpeg(img: &image::RgbImage, path: &Path, quality: u32) -> Result<(), BackendError> {
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut writer, quality as u8)
        .write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgb8)
        .map_err(|e| BackendError::Encode(e.to_string()))?;
    writer.flush()?;
    Ok(())
}

impl ImageBackend for RustBackend {
    fn thumbnail(&self, params: &ThumbnailParams) -> Result<Dimensions, BackendError> {
        let img = load_image(&params.source)?;

        let (width, height) = calculate_fit_dimensions((img.width(), img.height()), params.max_edge);
        let resized = if (width, height) == (img.width(), img.height()) {
            img
        } else {
            img.resize_exact(width, height, FilterType::Lanczos3)
        };

        // JPEG has no alpha; flatten whatever the source was.
        let rgb = resized.to_rgb8();
        save_jpeg(&rgb, &params.output, params.quality.value())?;
        Ok(Dimensions { width, height })
    }
}
