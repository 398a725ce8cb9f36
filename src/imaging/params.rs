//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the orchestrator in [`operations`](super::operations)
//! (which decides which widths to produce) and the
//! [`backend`](super::backend) (which does the pixel work and encoding).
//! The orchestrator never looks inside [`EncodingOptions`]; it passes them
//! through verbatim.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 85). Clamped on construction.
//! - [`Mime`]: The closed set of output formats.
//! - [`Rotation`]: Explicit clockwise rotation, or EXIF auto-orientation.
//! - [`Background`]: RGBA color used to flatten transparency.
//! - [`EncodingOptions`] / [`ResizeRequest`]: Everything one resize needs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

/// Output mime types the loader can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mime {
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/webp")]
    Webp,
    #[serde(rename = "image/avif")]
    Avif,
}

impl Mime {
    /// Map a file extension (without the dot, any case) to its mime type.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Mime::Jpeg),
            "png" => Some(Mime::Png),
            "webp" => Some(Mime::Webp),
            "avif" => Some(Mime::Avif),
            _ => None,
        }
    }

    /// Canonical extension for files of this type.
    pub fn extension(self) -> &'static str {
        match self {
            Mime::Jpeg => "jpg",
            Mime::Png => "png",
            Mime::Webp => "webp",
            Mime::Avif => "avif",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mime::Jpeg => "image/jpeg",
            Mime::Png => "image/png",
            Mime::Webp => "image/webp",
            Mime::Avif => "image/avif",
        }
    }
}

impl fmt::Display for Mime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clockwise rotation applied after resizing.
///
/// `Auto` honors the EXIF orientation tag of the source, so portrait photos
/// stay portrait once the metadata is stripped by re-encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Auto,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    /// Build from a degree value. `0` means auto-orient; other values must
    /// be multiples of 90 (negative values rotate counter-clockwise).
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        match degrees.rem_euclid(360) {
            0 => Some(Rotation::Auto),
            90 => Some(Rotation::Cw90),
            180 => Some(Rotation::Cw180),
            270 => Some(Rotation::Cw270),
            _ => None,
        }
    }

    /// Whether width and height trade places.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Rotation::Cw90 | Rotation::Cw270)
    }
}

/// An RGBA color used to flatten transparent pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Background(pub [u8; 4]);

impl Background {
    pub fn white() -> Self {
        Self([0xff, 0xff, 0xff, 0xff])
    }
}

/// Error returned when a background string is not a hex color.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid background color {0:?} (expected #rgb, #rrggbb or #rrggbbaa)")]
pub struct InvalidBackground(pub String);

impl FromStr for Background {
    type Err = InvalidBackground;

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`; the leading `#` and a `0x`
    /// prefix are optional.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || InvalidBackground(s.to_string());
        let hex = s.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(err());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err());
        match hex.len() {
            3 => {
                let mut rgba = [0xff; 4];
                for (i, c) in hex.chars().enumerate() {
                    let v = c.to_digit(16).ok_or_else(err)? as u8;
                    rgba[i] = v * 17;
                }
                Ok(Background(rgba))
            }
            6 => Ok(Background([channel(0)?, channel(2)?, channel(4)?, 0xff])),
            8 => Ok(Background([
                channel(0)?,
                channel(2)?,
                channel(4)?,
                channel(6)?,
            ])),
            _ => Err(err()),
        }
    }
}

/// Encoder settings passed through to the adapter untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EncodingOptions {
    pub quality: Quality,
    pub background: Option<Background>,
    pub progressive: bool,
    pub rotate: Rotation,
}

/// One resize: the target width (height follows the aspect ratio), the
/// output format and the encoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeRequest {
    pub width: u32,
    pub mime: Mime,
    pub options: EncodingOptions,
}
