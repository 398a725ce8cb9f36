//! High-level image operations.
//!
//! These functions combine the size plan with backend execution. All resizes
//! of one invocation fan out on the rayon pool and are joined before anything
//! is named, so the caller always sees the complete set or an error.

use super::backend::{BackendError, Dimensions, ImageBackend, ResizeResult};
use super::calculations::SizePlan;
use super::params::{EncodingOptions, Mime, ResizeRequest};
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::debug;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Get the source's natural dimensions from the backend.
pub fn get_dimensions<B: ImageBackend + ?Sized>(backend: &B) -> Result<Dimensions> {
    backend.metadata()
}

/// Output of one orchestrated run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    /// One result per regular planned width, in plan order.
    pub results: Vec<ResizeResult>,
    /// The placeholder result. When the placeholder width coincides with a
    /// regular width this is a copy of that width's result, not a second
    /// resize.
    pub placeholder: Option<ResizeResult>,
}

/// Resize to every width in `plan`, concurrently.
///
/// One request is issued per unique width. Any failure fails the whole run;
/// results already produced are dropped. Output order follows the plan, not
/// completion order.
pub fn run_transformations<B: ImageBackend + ?Sized>(
    backend: &B,
    plan: &SizePlan,
    mime: Mime,
    options: &EncodingOptions,
) -> Result<Transformed> {
    let widths = plan.resize_widths();
    debug!(?widths, %mime, "fanning out resizes");

    let produced: Vec<(u32, ResizeResult)> = widths
        .par_iter()
        .map(|&width| {
            let request = ResizeRequest {
                width,
                mime,
                options: *options,
            };
            backend.resize(&request).map(|result| (width, result))
        })
        .collect::<Result<_>>()?;

    let mut by_width: HashMap<u32, ResizeResult> = produced.into_iter().collect();
    let missing = |width: u32| {
        BackendError::ProcessingFailed(format!("no resize result for width {width}"))
    };

    let placeholder = match plan.placeholder {
        Some(width) if plan.placeholder_is_shared() => {
            Some(by_width.get(&width).cloned().ok_or_else(|| missing(width))?)
        }
        Some(width) => Some(by_width.remove(&width).ok_or_else(|| missing(width))?),
        None => None,
    };

    let results = plan
        .widths
        .iter()
        .map(|&width| by_width.remove(&width).ok_or_else(|| missing(width)))
        .collect::<Result<Vec<_>>>()?;

    Ok(Transformed {
        results,
        placeholder,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::calculations::plan_sizes;

    fn run(backend: &MockBackend, plan: &SizePlan) -> Result<Transformed> {
        run_transformations(backend, plan, Mime::Jpeg, &EncodingOptions::default())
    }

    #[test]
    fn get_dimensions_calls_backend() {
        let backend = MockBackend::with_dimensions(1920, 1080);
        let dims = get_dimensions(&backend).unwrap();
        assert_eq!((dims.width, dims.height), (1920, 1080));
        assert_eq!(backend.get_operations(), vec![RecordedOp::Metadata]);
    }

    #[test]
    fn one_resize_per_unique_width() {
        let backend = MockBackend::with_dimensions(1000, 900);
        let plan = plan_sizes(&[500, 2000, 1500], 1000, None);

        let out = run(&backend, &plan).unwrap();

        assert_eq!(backend.resized_widths(), vec![500, 1000]);
        assert_eq!(out.results.len(), 2);
        assert!(out.placeholder.is_none());
    }

    #[test]
    fn results_follow_plan_order() {
        let backend = MockBackend::with_dimensions(2000, 1000);
        let plan = plan_sizes(&[1600, 200, 800, 400], 2000, None);

        let out = run(&backend, &plan).unwrap();

        let widths: Vec<u32> = out.results.iter().map(|r| r.width).collect();
        assert_eq!(widths, vec![1600, 200, 800, 400]);
    }

    #[test]
    fn distinct_placeholder_gets_its_own_resize() {
        let backend = MockBackend::with_dimensions(1000, 500);
        let plan = plan_sizes(&[500], 1000, Some(40));

        let out = run(&backend, &plan).unwrap();

        assert_eq!(backend.resized_widths(), vec![40, 500]);
        assert_eq!(out.results.len(), 1);
        assert_eq!(out.results[0].width, 500);
        assert_eq!(out.placeholder.unwrap().width, 40);
    }

    #[test]
    fn shared_placeholder_reuses_regular_result() {
        let backend = MockBackend::with_dimensions(1000, 500);
        let plan = plan_sizes(&[40, 500], 1000, Some(40));

        let out = run(&backend, &plan).unwrap();

        // Exactly one resize at 40px, result used for both purposes
        assert_eq!(backend.resized_widths(), vec![40, 500]);
        let placeholder = out.placeholder.unwrap();
        assert_eq!(placeholder, out.results[0]);
        assert_eq!(out.results.len(), 2);
    }

    #[test]
    fn single_failure_fails_the_run() {
        let backend = MockBackend::failing_at(1000, 500, 300);
        let plan = plan_sizes(&[100, 300, 600], 1000, None);

        let result = run(&backend, &plan);
        assert!(matches!(result, Err(BackendError::ProcessingFailed(_))));
    }

    #[test]
    fn options_pass_through_to_backend() {
        let backend = MockBackend::with_dimensions(1000, 500);
        let plan = plan_sizes(&[100], 1000, None);
        let options = EncodingOptions {
            quality: crate::imaging::Quality::new(60),
            ..Default::default()
        };

        run_transformations(&backend, &plan, Mime::Webp, &options).unwrap();

        assert_eq!(
            backend.get_operations(),
            vec![RecordedOp::Resize {
                width: 100,
                mime: Mime::Webp,
                quality: 60
            }]
        );
    }
}
