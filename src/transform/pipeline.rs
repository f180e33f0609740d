//! Resize/crop pipeline over the `image` crate.
//!
//! # Pipeline
//!
//! 1. Trim: cut a pixel or percentage region out of the source
//! 2. Size:
//!    - width and height: fill the box and crop at the quadrant anchor
//!      (`resize`: fit inside instead, `pad`: fit inside and pad to the box)
//!    - one dimension: scale proportionally
//!    - neither: keep the (trimmed) source size
//! 3. Encode in the output format
//!
//! Without `upscale`, images are never enlarged. No output side may exceed
//! `max_dimension`.

use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};

use crate::codec::{CropOptions, OutputFormat, Quadrant, Trim};
use crate::error::TransformError;

use super::encoder::encode;

const FILTER: FilterType = FilterType::Lanczos3;

/// Engine settings for one crop, derived from config and options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageConfig {
    /// JPEG output quality
    pub quality: u8,

    /// Allow enlarging beyond the source size
    pub upscale: bool,

    /// Output encoding
    pub format: OutputFormat,

    /// Largest output width or height
    pub max_dimension: u32,
}

/// A decoded image moving through the crop pipeline.
pub struct Image {
    img: DynamicImage,
    config: ImageConfig,
}

impl Image {
    /// Decode source bytes.
    pub fn new(source: &[u8], config: ImageConfig) -> Result<Self, TransformError> {
        let img = image::load_from_memory(source).map_err(|e| TransformError::Decode {
            message: e.to_string(),
        })?;
        Ok(Self { img, config })
    }

    /// Current pixel dimensions.
    pub fn dimensions(&self) -> (u32, u32) {
        self.img.dimensions()
    }

    /// Apply trim and sizing.
    pub fn process(
        mut self,
        width: Option<u32>,
        height: Option<u32>,
        options: &CropOptions,
    ) -> Result<Self, TransformError> {
        self.check_size(width.unwrap_or(0), height.unwrap_or(0))?;

        if let Some(trim) = options.trim {
            self.trim(trim);
        }

        let config = self.config;
        let img = match (width, height) {
            (Some(w), Some(h)) => {
                if let Some(color) = options.pad {
                    self.pad(w, h, color)
                } else if options.resize {
                    self.fit(w, h)
                } else {
                    self.fill(w, h, options.quadrant)
                }
            }
            (Some(w), None) => {
                let (iw, ih) = self.dimensions();
                let h = scaled(ih, w, iw);
                self.check_size(w, h)?;
                self.scale_to(w, h)
            }
            (None, Some(h)) => {
                let (iw, ih) = self.dimensions();
                let w = scaled(iw, h, ih);
                self.check_size(w, h)?;
                self.scale_to(w, h)
            }
            (None, None) => self.img,
        };

        Ok(Self { img, config })
    }

    /// Encode the result.
    pub fn get(&self) -> Result<Bytes, TransformError> {
        encode(&self.img, self.config.format, self.config.quality)
    }

    fn check_size(&self, width: u32, height: u32) -> Result<(), TransformError> {
        let max = self.config.max_dimension;
        if width > max || height > max {
            return Err(TransformError::TooLarge { width, height, max });
        }
        Ok(())
    }

    fn trim(&mut self, trim: Trim) {
        let (iw, ih) = self.dimensions();
        let (x1, y1, x2, y2) = match trim {
            Trim::Pixels { x1, y1, x2, y2 } => (x1, y1, x2, y2),
            Trim::Percent { x1, y1, x2, y2 } => (
                percent_of(x1, iw),
                percent_of(y1, ih),
                percent_of(x2, iw),
                percent_of(y2, ih),
            ),
        };

        let (x1, x2) = (x1.min(iw), x2.min(iw));
        let (y1, y2) = (y1.min(ih), y2.min(ih));
        if x2 <= x1 || y2 <= y1 {
            return;
        }
        self.img = self.img.crop_imm(x1, y1, x2 - x1, y2 - y1);
    }

    /// Scale to exactly `w`x`h`, unless that would enlarge without upscale.
    fn scale_to(self, w: u32, h: u32) -> DynamicImage {
        let (iw, ih) = self.dimensions();
        if !self.config.upscale && (w > iw || h > ih) {
            return self.img;
        }
        if (w, h) == (iw, ih) {
            return self.img;
        }
        self.img.resize_exact(w.max(1), h.max(1), FILTER)
    }

    /// Fit inside `w`x`h`, keeping the aspect ratio.
    fn fit(self, w: u32, h: u32) -> DynamicImage {
        let (iw, ih) = self.dimensions();
        let mut scale = (w as f64 / iw as f64).min(h as f64 / ih as f64);
        if !self.config.upscale {
            scale = scale.min(1.0);
        }
        let (tw, th) = scaled_pair(iw, ih, scale);
        if (tw, th) == (iw, ih) {
            return self.img;
        }
        self.img.resize_exact(tw, th, FILTER)
    }

    /// Cover `w`x`h` and cut the overflow, anchored at `quadrant`.
    ///
    /// The source region is cut first so only the visible part is scaled.
    fn fill(self, w: u32, h: u32, quadrant: Quadrant) -> DynamicImage {
        let (iw, ih) = self.dimensions();
        let mut scale = (w as f64 / iw as f64).max(h as f64 / ih as f64);
        if !self.config.upscale {
            scale = scale.min(1.0);
        }
        let (sw, sh) = scaled_pair(iw, ih, scale);
        let (cw, ch) = (w.min(sw), h.min(sh));

        let rw = ((cw as f64 / scale).round() as u32).clamp(1, iw);
        let rh = ((ch as f64 / scale).round() as u32).clamp(1, ih);
        let (x, y) = anchor(quadrant, iw - rw, ih - rh);
        let region = self.img.crop_imm(x, y, rw, rh);

        if (rw, rh) == (cw, ch) {
            region
        } else {
            region.resize_exact(cw, ch, FILTER)
        }
    }

    /// Fit inside `w`x`h` and centre on a `w`x`h` canvas of `color`.
    fn pad(self, w: u32, h: u32, color: [u8; 3]) -> DynamicImage {
        let fitted = self.fit(w, h).to_rgba8();
        let [r, g, b] = color;
        let mut canvas = RgbaImage::from_pixel(w, h, Rgba([r, g, b, 255]));

        let x = (w.saturating_sub(fitted.width()) / 2) as i64;
        let y = (h.saturating_sub(fitted.height()) / 2) as i64;
        image::imageops::overlay(&mut canvas, &fitted, x, y);
        DynamicImage::ImageRgba8(canvas)
    }
}

fn scaled(value: u32, target: u32, reference: u32) -> u32 {
    ((value as f64 * target as f64 / reference as f64).round() as u32).max(1)
}

fn scaled_pair(w: u32, h: u32, scale: f64) -> (u32, u32) {
    (
        ((w as f64 * scale).round() as u32).max(1),
        ((h as f64 * scale).round() as u32).max(1),
    )
}

fn percent_of(fraction: f32, size: u32) -> u32 {
    (fraction.clamp(0.0, 1.0) as f64 * size as f64).round() as u32
}

/// Crop offset for the spare width/height, given an anchor.
fn anchor(quadrant: Quadrant, spare_x: u32, spare_y: u32) -> (u32, u32) {
    match quadrant {
        Quadrant::Top => (spare_x / 2, 0),
        Quadrant::Bottom => (spare_x / 2, spare_y),
        Quadrant::Left => (0, spare_y / 2),
        Quadrant::Right => (spare_x, spare_y / 2),
        Quadrant::Center => (spare_x / 2, spare_y / 2),
    }
}
