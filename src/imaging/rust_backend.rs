//! Pure Rust image backends built on the `image` crate.
//!
//! Both backends decode the source once, when they are opened, and apply its
//! EXIF orientation up front. Every resize clones the decoded image, so the
//! shared state is read-only and concurrent resizes never observe each other.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP) | `image::ImageReader` with format sniffing |
//! | Auto-orient | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Resize | `DynamicImage::resize_exact` (`Lanczos3` raster, `Triangle` lite) |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (baseline) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless) |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |

use super::backend::{
    BackendError, Dimensions, ImageBackend, ResizeResult, proportional_height,
};
use super::params::{Background, EncodingOptions, Mime, ResizeRequest, Rotation};
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use std::io::Cursor;
use std::sync::LazyLock;
use tracing::debug;

/// Extensions whose decoders are compiled in.
///
/// AVIF is deliberately absent: the `image` crate's `"avif"` feature only
/// enables the encoder, so AVIF is an output format but never a source.
const SOURCE_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    SOURCE_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the source file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Decode source bytes and apply the EXIF orientation, if any.
fn decode_oriented(source: &[u8]) -> Result<DynamicImage, BackendError> {
    let reader = ImageReader::new(Cursor::new(source))
        .with_guessed_format()
        .map_err(BackendError::Io)?;
    let mut decoder = reader
        .into_decoder()
        .map_err(|e| BackendError::Decode(e.to_string()))?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut img =
        DynamicImage::from_decoder(decoder).map_err(|e| BackendError::Decode(e.to_string()))?;
    img.apply_orientation(orientation);
    Ok(img)
}

fn dimensions_of(img: &DynamicImage) -> Dimensions {
    Dimensions {
        width: img.width(),
        height: img.height(),
    }
}

fn rotate(img: DynamicImage, rotation: Rotation) -> DynamicImage {
    match rotation {
        Rotation::Auto => img,
        Rotation::Cw90 => img.rotate90(),
        Rotation::Cw180 => img.rotate180(),
        Rotation::Cw270 => img.rotate270(),
    }
}

/// Composite transparent pixels over `background`.
fn flatten(img: DynamicImage, background: Background) -> DynamicImage {
    if !img.color().has_alpha() {
        return img;
    }
    let [br, bg, bb, ba] = background.0;
    let mut rgba = img.to_rgba8();
    for px in rgba.pixels_mut() {
        let a = px[3] as u32;
        let blend = |fg: u8, back: u8| ((fg as u32 * a + back as u32 * (255 - a) + 127) / 255) as u8;
        px.0 = [
            blend(px[0], br),
            blend(px[1], bg),
            blend(px[2], bb),
            (a + (ba as u32 * (255 - a) + 127) / 255) as u8,
        ];
    }
    DynamicImage::ImageRgba8(rgba)
}

/// Convert to the 8-bit layouts every encoder accepts.
fn to_8bit(img: DynamicImage, keep_alpha: bool) -> DynamicImage {
    if keep_alpha && img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    }
}

fn encode(
    img: DynamicImage,
    mime: Mime,
    options: &EncodingOptions,
) -> Result<Vec<u8>, BackendError> {
    let quality = options.quality.value() as u8;
    let mut buf = Vec::new();
    let result = match mime {
        Mime::Jpeg => {
            if options.progressive {
                debug!("progressive JPEG is not supported by the encoder; writing baseline");
            }
            to_8bit(img, false).write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))
        }
        Mime::Png => to_8bit(img, true).write_with_encoder(PngEncoder::new(&mut buf)),
        Mime::Webp => to_8bit(img, true).write_with_encoder(WebPEncoder::new_lossless(&mut buf)),
        Mime::Avif => to_8bit(img, true)
            .write_with_encoder(AvifEncoder::new_with_speed_quality(&mut buf, 6, quality)),
    };
    result.map_err(|e| BackendError::ProcessingFailed(format!("{mime} encode failed: {e}")))?;
    Ok(buf)
}

/// General raster backend: every output format, explicit rotation,
/// optional background flattening, Lanczos3 resampling.
pub struct RasterBackend {
    image: DynamicImage,
}

impl RasterBackend {
    pub fn from_bytes(source: &[u8]) -> Result<Self, BackendError> {
        Ok(Self {
            image: decode_oriented(source)?,
        })
    }
}

impl ImageBackend for RasterBackend {
    fn metadata(&self) -> Result<Dimensions, BackendError> {
        Ok(dimensions_of(&self.image))
    }

    fn resize(&self, request: &ResizeRequest) -> Result<ResizeResult, BackendError> {
        let rotation = request.options.rotate;
        let natural = dimensions_of(&self.image);
        let rotated = if rotation.swaps_axes() {
            Dimensions {
                width: natural.height,
                height: natural.width,
            }
        } else {
            natural
        };
        let height = proportional_height(rotated, request.width);
        debug!(width = request.width, height, mime = %request.mime, rotate = ?rotation, "raster resize");

        let mut resized = rotate(self.image.clone(), rotation).resize_exact(
            request.width,
            height,
            FilterType::Lanczos3,
        );
        if let Some(background) = request.options.background {
            resized = flatten(resized, background);
        }

        Ok(ResizeResult {
            data: encode(resized, request.mime, &request.options)?,
            width: request.width,
            height,
        })
    }
}

/// Limited-format backend: JPEG and PNG only, always flattened onto the
/// background (white unless configured), cheaper Triangle resampling.
/// Explicit rotation is not supported and is ignored.
pub struct LiteBackend {
    image: DynamicImage,
}

impl LiteBackend {
    pub fn from_bytes(source: &[u8]) -> Result<Self, BackendError> {
        Ok(Self {
            image: decode_oriented(source)?,
        })
    }
}

impl ImageBackend for LiteBackend {
    fn metadata(&self) -> Result<Dimensions, BackendError> {
        Ok(dimensions_of(&self.image))
    }

    fn resize(&self, request: &ResizeRequest) -> Result<ResizeResult, BackendError> {
        if !matches!(request.mime, Mime::Jpeg | Mime::Png) {
            return Err(BackendError::UnsupportedEncoding {
                adapter: "lite",
                mime: request.mime,
            });
        }
        if request.options.rotate != Rotation::Auto {
            debug!(rotate = ?request.options.rotate, "lite adapter ignores explicit rotation");
        }

        let height = proportional_height(dimensions_of(&self.image), request.width);
        let resized = self
            .image
            .resize_exact(request.width, height, FilterType::Triangle);
        let background = request.options.background.unwrap_or_else(Background::white);
        let flattened = flatten(resized, background);

        Ok(ResizeResult {
            data: encode(flattened, request.mime, &request.options)?,
            width: request.width,
            height,
        })
    }
}
