//! Transform engine.
//!
//! Turns source image bytes plus a decoded [`CropRequest`](crate::codec::CropRequest)
//! into crop bytes. The [`TransformEngine`] trait is the seam the crop handler
//! depends on; [`ImageEngine`] is the production implementation.

mod encoder;
mod engine;
mod pipeline;

pub use encoder::{
    clamp_quality, encode, is_valid_quality, DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY,
    MIN_JPEG_QUALITY,
};
pub use engine::{ImageEngine, TransformConfig, TransformEngine};
pub use pipeline::{Image, ImageConfig};
