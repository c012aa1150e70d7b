//! Fitting dimensions into bounding boxes.
//!
//! Contain-fit results are truncated toward zero. Rendition deduplication compares these
//! values for exact equality, so the arithmetic must not be changed to rounding.
//! An axis that truncates to zero is raised to one pixel so extreme aspect ratios still
//! produce an encodable rendition.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::models::ImageFit;

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Scale `(src_w, src_h)` down to fit inside `(bound_w, bound_h)`, keeping the aspect ratio.
///
/// Width is fitted first, then the (possibly scaled) height. Never upscales, and neither
/// axis of a non-empty source drops below 1.
pub fn contain_fit(src_w: u32, src_h: u32, bound_w: u32, bound_h: u32) -> (u32, u32) {
    let (mut x, mut y) = (f64::from(src_w), f64::from(src_h));
    if src_w > bound_w {
        let scale = f64::from(bound_w) / f64::from(src_w);
        x = scale * f64::from(src_w);
        y = scale * f64::from(src_h);
    }
    if y > f64::from(bound_h) {
        let scale = f64::from(bound_h) / y;
        x *= scale;
        y *= scale;
    }
    // `as` truncates toward zero
    let (w, h) = (x as u32, y as u32);
    if src_w == 0 || src_h == 0 {
        return (w, h);
    }
    (w.max(1), h.max(1))
}

/// Cover fit always yields the bounds; the resize step crops to fill them.
pub fn cover_fit(_src_w: u32, _src_h: u32, bound_w: u32, bound_h: u32) -> (u32, u32) {
    (bound_w, bound_h)
}

/// Target dimensions for `source` under the given policy.
pub fn fit_size(source: ImageSize, bound: ImageSize, fit: ImageFit) -> ImageSize {
    let (w, h) = match fit {
        ImageFit::Contain => contain_fit(source.width, source.height, bound.width, bound.height),
        ImageFit::Cover => cover_fit(source.width, source.height, bound.width, bound.height),
    };
    ImageSize::new(w, h)
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid image size: {0:?}")]
pub struct ImageSizeParseError(pub String);

/// `"400"` when width equals height, otherwise `"400x600"`.
impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.width == self.height {
            write!(f, "{}", self.width)
        } else {
            write!(f, "{}x{}", self.width, self.height)
        }
    }
}

impl FromStr for ImageSize {
    type Err = ImageSizeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ImageSizeParseError(s.to_string());
        let parse = |part: &str| {
            // u32::from_str accepts a leading '+', sizes are plain digits only
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse::<u32>().map_err(|_| invalid())
        };

        match s.split_once('x') {
            None => {
                let side = parse(s)?;
                Ok(Self::new(side, side))
            }
            Some((w, h)) => Ok(Self::new(parse(w)?, parse(h)?)),
        }
    }
}

impl Serialize for ImageSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ImageSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
