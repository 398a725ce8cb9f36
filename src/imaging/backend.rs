//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the whole capability the rest of the crate
//! needs from an image library: report the source's natural size, and
//! produce one resized, re-encoded buffer per [`ResizeRequest`]. A backend is
//! bound to a single source image when it is opened, so neither operation
//! takes a path.
//!
//! Two implementations ship with the crate and are selected by
//! [`AdapterKind`]:
//!
//! | Kind | Type | Output formats |
//! |---|---|---|
//! | `raster` | [`RasterBackend`](super::rust_backend::RasterBackend) | JPEG, PNG, WebP, AVIF |
//! | `lite` | [`LiteBackend`](super::rust_backend::LiteBackend) | JPEG, PNG |

use super::params::{Mime, ResizeRequest};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode source image: {0}")]
    Decode(String),
    #[error("The {adapter} adapter cannot encode {mime}")]
    UnsupportedEncoding { adapter: &'static str, mime: Mime },
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of a metadata read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Encoded output of one resize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeResult {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Which backend family to bind to a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    #[default]
    Raster,
    Lite,
}

impl AdapterKind {
    pub fn name(self) -> &'static str {
        match self {
            AdapterKind::Raster => "raster",
            AdapterKind::Lite => "lite",
        }
    }
}

/// Trait for image processing backends.
///
/// Implementations must be `Sync`: the orchestrator issues every resize of
/// an invocation concurrently against the same backend. Resizes must not
/// mutate shared state beyond read-only access to the decoded source.
pub trait ImageBackend: Sync {
    /// Natural dimensions of the bound source image.
    fn metadata(&self) -> Result<Dimensions, BackendError>;

    /// Resize the source to `request.width` and encode it as `request.mime`.
    fn resize(&self, request: &ResizeRequest) -> Result<ResizeResult, BackendError>;
}

/// Height that keeps the aspect ratio of `source` at `target_width`.
pub fn proportional_height(source: Dimensions, target_width: u32) -> u32 {
    if source.width == 0 {
        return source.height;
    }
    let h = (source.height as f64 * target_width as f64 / source.width as f64).round() as u32;
    h.max(1)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mock backend that records operations and returns fake encodings.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    ///
    /// Resized data is `"{mime}:{width}x{height}"`, so identical requests
    /// produce identical bytes and therefore identical content hashes.
    pub struct MockBackend {
        pub dimensions: Dimensions,
        pub fail_on_width: Option<u32>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Metadata,
        Resize { width: u32, mime: Mime, quality: u32 },
    }

    impl MockBackend {
        pub fn with_dimensions(width: u32, height: u32) -> Self {
            Self {
                dimensions: Dimensions { width, height },
                fail_on_width: None,
                operations: Mutex::new(Vec::new()),
            }
        }

        pub fn failing_at(width: u32, height: u32, fail_on_width: u32) -> Self {
            Self {
                fail_on_width: Some(fail_on_width),
                ..Self::with_dimensions(width, height)
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        /// Widths of recorded resizes, sorted (completion order is not stable).
        pub fn resized_widths(&self) -> Vec<u32> {
            let mut widths: Vec<u32> = self
                .get_operations()
                .into_iter()
                .filter_map(|op| match op {
                    RecordedOp::Resize { width, .. } => Some(width),
                    RecordedOp::Metadata => None,
                })
                .collect();
            widths.sort_unstable();
            widths
        }
    }

    impl ImageBackend for MockBackend {
        fn metadata(&self) -> Result<Dimensions, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Metadata);
            Ok(self.dimensions)
        }

        fn resize(&self, request: &ResizeRequest) -> Result<ResizeResult, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Resize {
                width: request.width,
                mime: request.mime,
                quality: request.options.quality.value(),
            });
            if self.fail_on_width == Some(request.width) {
                return Err(BackendError::ProcessingFailed(format!(
                    "mock failure at {}px",
                    request.width
                )));
            }
            let height = proportional_height(self.dimensions, request.width);
            Ok(ResizeResult {
                data: format!("{}:{}x{}", request.mime, request.width, height).into_bytes(),
                width: request.width,
                height,
            })
        }
    }

    #[test]
    fn mock_records_metadata() {
        let backend = MockBackend::with_dimensions(800, 600);

        let dims = backend.metadata().unwrap();
        assert_eq!(dims.width, 800);
        assert_eq!(dims.height, 600);
        assert_eq!(backend.get_operations(), vec![RecordedOp::Metadata]);
    }

    #[test]
    fn mock_records_resize() {
        let backend = MockBackend::with_dimensions(1000, 900);

        let result = backend
            .resize(&ResizeRequest {
                width: 500,
                mime: Mime::Jpeg,
                options: Default::default(),
            })
            .unwrap();

        assert_eq!((result.width, result.height), (500, 450));
        assert_eq!(result.data, b"image/jpeg:500x450");
        assert!(matches!(
            &backend.get_operations()[0],
            RecordedOp::Resize {
                width: 500,
                mime: Mime::Jpeg,
                quality: 85,
            }
        ));
    }

    #[test]
    fn mock_fails_on_configured_width() {
        let backend = MockBackend::failing_at(1000, 900, 300);
        let result = backend.resize(&ResizeRequest {
            width: 300,
            mime: Mime::Png,
            options: Default::default(),
        });
        assert!(matches!(result, Err(BackendError::ProcessingFailed(_))));
    }

    #[test]
    fn proportional_height_rounds() {
        let src = Dimensions {
            width: 1000,
            height: 667,
        };
        assert_eq!(proportional_height(src, 500), 334);
        assert_eq!(proportional_height(src, 1), 1);
    }

    #[test]
    fn adapter_kind_names() {
        assert_eq!(AdapterKind::default(), AdapterKind::Raster);
        assert_eq!(AdapterKind::Lite.name(), "lite");
    }
}
