//! Output encoding for processed crops.
//!
//! The output format always follows the crop path's extension, so the
//! content type derived from the cache key matches the stored bytes.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};

use crate::codec::OutputFormat;
use crate::error::TransformError;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

/// Encode `img` in `format`. `quality` applies to JPEG only.
pub fn encode(img: &DynamicImage, format: OutputFormat, quality: u8) -> Result<Bytes, TransformError> {
    let mut output = Vec::new();

    match format {
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let mut encoder = JpegEncoder::new_with_quality(&mut output, clamp_quality(quality));
            encoder
                .encode_image(&rgb)
                .map_err(|e| TransformError::Encode {
                    message: e.to_string(),
                })?;
        }
        OutputFormat::Png => {
            img.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
                .map_err(|e| TransformError::Encode {
                    message: e.to_string(),
                })?;
        }
        OutputFormat::Gif => {
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            rgba.write_to(&mut Cursor::new(&mut output), ImageFormat::Gif)
                .map_err(|e| TransformError::Encode {
                    message: e.to_string(),
                })?;
        }
    }

    Ok(Bytes::from(output))
}

/// Validate JPEG quality parameter.
///
/// Returns `true` if quality is in the valid range (1-100).
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

/// Clamp quality to valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}
