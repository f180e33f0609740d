//! Crop option parsing.
//!
//! Options follow the dimensions in a crop path, each introduced by a dash:
//!
//! ```text
//! photos/cat-200x100-quadrant(T)-quality(70).jpg
//!                   ^^^^^^^^^^^^^^^^^^^^^^^^
//! ```
//!
//! Unknown option names are ignored so that older URLs keep working when an
//! option is retired.

use once_cell::sync::Lazy;
use regex::Regex;

static OPTION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\w+)(?:\(([\w,.]+)\))?$").expect("option pattern is a valid regex")
});

/// Background colour used by `pad` when none is given.
pub const DEFAULT_PAD_COLOR: [u8; 3] = [255, 255, 255];

/// Anchor used when cropping to fill the requested box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quadrant {
    Top,
    Bottom,
    Left,
    Right,
    #[default]
    Center,
}

impl Quadrant {
    fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "T" => Some(Quadrant::Top),
            "B" => Some(Quadrant::Bottom),
            "L" => Some(Quadrant::Left),
            "R" => Some(Quadrant::Right),
            "C" => Some(Quadrant::Center),
            _ => None,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Quadrant::Top => "T",
            Quadrant::Bottom => "B",
            Quadrant::Left => "L",
            Quadrant::Right => "R",
            Quadrant::Center => "C",
        }
    }
}

/// Region of the source to keep before resizing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Trim {
    /// Absolute pixel coordinates `(x1, y1)` to `(x2, y2)`
    Pixels { x1: u32, y1: u32, x2: u32, y2: u32 },

    /// Coordinates as fractions of the source size (0.0 - 1.0)
    Percent { x1: f32, y1: f32, x2: f32, y2: f32 },
}

/// Parsed transform options.
///
/// These are opaque to the request handler and passed straight through to
/// the transform engine.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CropOptions {
    /// Fit inside the box instead of filling it
    pub resize: bool,

    /// Fit inside the box and fill the rest with this colour
    pub pad: Option<[u8; 3]>,

    /// Anchor for fill-and-crop
    pub quadrant: Quadrant,

    /// Region to cut out of the source first
    pub trim: Option<Trim>,

    /// Output quality override (1-100)
    pub quality: Option<u8>,
}

impl CropOptions {
    /// Parse the option segment of a crop path, e.g. `-quadrant(T)-resize`.
    pub fn parse(segment: &str) -> Self {
        let mut options = CropOptions::default();

        for raw in segment.split('-').filter(|s| !s.is_empty()) {
            let Some(caps) = OPTION_PATTERN.captures(raw) else {
                continue;
            };
            let name = &caps[1];
            let args: Vec<&str> = caps
                .get(2)
                .map(|m| m.as_str().split(',').collect())
                .unwrap_or_default();

            match name {
                "resize" => options.resize = true,
                "pad" => {
                    let color = parse_numbers::<u8>(&args, 3)
                        .map(|c| [c[0], c[1], c[2]])
                        .unwrap_or(DEFAULT_PAD_COLOR);
                    options.pad = Some(color);
                }
                "quadrant" => {
                    if let Some(q) = args.first().and_then(|a| Quadrant::from_code(a)) {
                        options.quadrant = q;
                    }
                }
                "trim" => {
                    if let Some(c) = parse_numbers::<u32>(&args, 4) {
                        options.trim = Some(Trim::Pixels {
                            x1: c[0],
                            y1: c[1],
                            x2: c[2],
                            y2: c[3],
                        });
                    }
                }
                "trim_perc" => {
                    if let Some(c) = parse_numbers::<f32>(&args, 4) {
                        options.trim = Some(Trim::Percent {
                            x1: c[0],
                            y1: c[1],
                            x2: c[2],
                            y2: c[3],
                        });
                    }
                }
                "quality" => {
                    options.quality = parse_numbers::<u8>(&args, 1)
                        .map(|q| q[0])
                        .filter(|q| (1..=100).contains(q));
                }
                _ => {}
            }
        }

        options
    }

    /// Render the options back into path form, in a fixed order.
    pub fn to_segment(&self) -> String {
        let mut out = String::new();

        match self.trim {
            Some(Trim::Pixels { x1, y1, x2, y2 }) => {
                out.push_str(&format!("-trim({},{},{},{})", x1, y1, x2, y2));
            }
            Some(Trim::Percent { x1, y1, x2, y2 }) => {
                out.push_str(&format!("-trim_perc({},{},{},{})", x1, y1, x2, y2));
            }
            None => {}
        }
        if self.quadrant != Quadrant::Center {
            out.push_str(&format!("-quadrant({})", self.quadrant.code()));
        }
        if self.resize {
            out.push_str("-resize");
        }
        if let Some([r, g, b]) = self.pad {
            if self.pad == Some(DEFAULT_PAD_COLOR) {
                out.push_str("-pad");
            } else {
                out.push_str(&format!("-pad({},{},{})", r, g, b));
            }
        }
        if let Some(q) = self.quality {
            out.push_str(&format!("-quality({})", q));
        }

        out
    }
}

fn parse_numbers<T: std::str::FromStr>(args: &[&str], count: usize) -> Option<Vec<T>> {
    if args.len() != count {
        return None;
    }
    args.iter().map(|a| a.trim().parse().ok()).collect()
}
