use bytes::Bytes;

use crate::codec::{CropRequest, DEFAULT_MAX_DIMENSION};
use crate::error::TransformError;

use super::encoder::{clamp_quality, DEFAULT_JPEG_QUALITY};
use super::pipeline::{Image, ImageConfig};

/// Produces crop bytes from source bytes.
///
/// Implementations must be deterministic: the same source and request give
/// the same output. Calls are CPU-bound and run on the blocking pool.
pub trait TransformEngine: Send + Sync {
    /// Transform `source` according to `request`.
    fn transform(&self, source: &[u8], request: &CropRequest) -> Result<Bytes, TransformError>;
}

/// Deployment-wide transform settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformConfig {
    /// JPEG quality when the request carries no `quality` option
    pub jpeg_quality: u8,

    /// Allow enlarging images beyond their source size
    pub upscale: bool,

    /// Largest output width or height
    pub max_dimension: u32,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            upscale: false,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

impl TransformConfig {
    /// Engine settings for one request.
    pub fn image_config(&self, request: &CropRequest) -> ImageConfig {
        ImageConfig {
            quality: clamp_quality(request.options.quality.unwrap_or(self.jpeg_quality)),
            upscale: self.upscale,
            format: request.format,
            max_dimension: self.max_dimension,
        }
    }
}

/// The default engine, backed by the `image` crate.
#[derive(Debug, Clone, Default)]
pub struct ImageEngine {
    config: TransformConfig,
}

impl ImageEngine {
    /// Create an engine with the given settings.
    pub fn new(config: TransformConfig) -> Self {
        Self { config }
    }

    /// The engine settings.
    pub fn config(&self) -> &TransformConfig {
        &self.config
    }
}

impl TransformEngine for ImageEngine {
    fn transform(&self, source: &[u8], request: &CropRequest) -> Result<Bytes, TransformError> {
        Image::new(source, self.config.image_config(request))?
            .process(request.width, request.height, &request.options)?
            .get()
    }
}
