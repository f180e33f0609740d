//! Crop path grammar.
//!
//! A crop path is the source path with the requested dimensions and options
//! spliced in before the extension:
//!
//! ```text
//! {stem}-{width}x{height}{-option}*.{ext}
//!
//! photos/cat-200x100.jpg            crop of photos/cat.jpg
//! photos/cat-200x_-resize.png       crop of photos/cat.png, auto height
//! photos/cat.jpg-200x100.png        crop of photos/cat.jpg, re-encoded as PNG
//! ```
//!
//! The full crop path doubles as the cache key, so decoding is a pure function
//! of the string.

use once_cell::sync::Lazy;
use regex::Regex;

use super::options::CropOptions;

static CROP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+)-([0-9_]+)x([0-9_]+)((?:-[0-9a-zA-Z(),\-._]+)?)\.((?i:jpe?g|png|gif))$")
        .expect("crop pattern is a valid regex")
});

/// Default upper bound on a requested width or height.
pub const DEFAULT_MAX_DIMENSION: u32 = 5000;

/// Output image formats a crop can be encoded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    Gif,
}

impl OutputFormat {
    /// Resolve a format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            "gif" => Some(OutputFormat::Gif),
            _ => None,
        }
    }

    /// Canonical extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Gif => "gif",
        }
    }
}

/// A decoded crop request.
#[derive(Debug, Clone, PartialEq)]
pub struct CropRequest {
    /// Path of the source image on the source disk
    pub source_path: String,

    /// Target width (`None` = derived from height or source)
    pub width: Option<u32>,

    /// Target height (`None` = derived from width or source)
    pub height: Option<u32>,

    /// Transform options
    pub options: CropOptions,

    /// Encoding of the output, taken from the crop path's extension
    pub format: OutputFormat,
}

/// Whether `path` ends with an extension the transform engine can read.
pub fn has_image_extension(path: &str) -> bool {
    path.rsplit_once('.')
        .map(|(stem, ext)| {
            !stem.is_empty() && !ext.contains('/') && OutputFormat::from_extension(ext).is_some()
        })
        .unwrap_or(false)
}

/// Decode a relative crop path. Returns `None` for anything that is not a
/// crop request.
pub fn parse_crop_path(path: &str) -> Option<CropRequest> {
    if !is_safe_path(path) {
        return None;
    }

    let caps = CROP_PATTERN.captures(path)?;
    let stem = &caps[1];
    let width = parse_dimension(&caps[2])?;
    let height = parse_dimension(&caps[3])?;
    let options = CropOptions::parse(&caps[4]);
    let ext = &caps[5];
    let format = OutputFormat::from_extension(ext)?;

    let source_path = if has_image_extension(stem) {
        stem.to_string()
    } else {
        format!("{}.{}", stem, ext)
    };

    Some(CropRequest {
        source_path,
        width,
        height,
        options,
        format,
    })
}

/// Source path a crop key was generated from, if the key decodes.
pub fn source_for_crop(key: &str) -> Option<String> {
    parse_crop_path(key).map(|request| request.source_path)
}

/// `_` means auto. Zero is treated the same way.
fn parse_dimension(raw: &str) -> Option<Option<u32>> {
    if raw == "_" {
        return Some(None);
    }
    let value: u32 = raw.parse().ok()?;
    Some(if value == 0 { None } else { Some(value) })
}

fn is_safe_path(path: &str) -> bool {
    !path.is_empty()
        && !path.starts_with('/')
        && !path.contains('\\')
        && path
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}
