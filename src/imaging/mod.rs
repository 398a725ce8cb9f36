//! Image processing in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Metadata** | decoded once per source, EXIF-oriented |
//! | **Size plan** | pure integer math ([`plan_sizes`], [`generate_steps`]) |
//! | **Resize → JPEG/PNG/WebP/AVIF** | `image` crate codecs |
//! | **Fan-out** | rayon `par_iter` over unique widths |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for the size plan (unit testable)
//! - **Parameters**: Data structures describing one resize
//! - **Backend**: [`ImageBackend`] trait + [`RasterBackend`] / [`LiteBackend`]
//! - **Operations**: The orchestrator combining a plan with a backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{AdapterKind, BackendError, Dimensions, ImageBackend, ResizeResult};
pub use calculations::{SizePlan, SizeRequest, generate_steps, plan_sizes};
pub use operations::{Transformed, get_dimensions, run_transformations};
pub use params::{
    Background, EncodingOptions, InvalidBackground, Mime, Quality, ResizeRequest, Rotation,
};
pub use rust_backend::{LiteBackend, RasterBackend, supported_input_extensions};

/// Decode `source` with the backend family selected by `kind`.
pub fn open_backend(
    kind: AdapterKind,
    source: &[u8],
) -> Result<Box<dyn ImageBackend + Send>, BackendError> {
    Ok(match kind {
        AdapterKind::Raster => Box::new(RasterBackend::from_bytes(source)?),
        AdapterKind::Lite => Box::new(LiteBackend::from_bytes(source)?),
    })
}
