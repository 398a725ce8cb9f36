//! Pure calculation functions for target widths.
//!
//! All functions here are pure and testable without any I/O or images.
//! The orchestrator turns a [`SizePlan`] into resize calls; nothing in this
//! module knows about backends.

/// How the caller asked for output widths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeRequest {
    /// Explicit widths, in the order given.
    Explicit(Vec<u32>),
    /// `steps` widths linearly spaced from `min` to `max`, inclusive.
    Range { min: u32, max: u32, steps: u32 },
    /// One artifact at the source's natural width.
    Natural,
}

impl SizeRequest {
    /// Candidate widths before clamping. `Natural` yields `u32::MAX`, which
    /// clamping turns into the natural width.
    pub fn candidates(&self) -> Vec<u32> {
        match self {
            SizeRequest::Explicit(sizes) => sizes.clone(),
            SizeRequest::Range { min, max, steps } => generate_steps(*min, *max, *steps),
            SizeRequest::Natural => vec![u32::MAX],
        }
    }
}

/// Linearly interpolate `steps` widths from `min` to `max`.
///
/// Each width is `ceil(min + (max - min) / (steps - 1) * k)`. Integer
/// arithmetic keeps the last entry exactly `max`.
///
/// # Examples
/// ```
/// # use responsive_loader::imaging::generate_steps;
/// assert_eq!(generate_steps(100, 300, 4), vec![100, 167, 234, 300]);
/// ```
pub fn generate_steps(min: u32, max: u32, steps: u32) -> Vec<u32> {
    if steps < 2 {
        return vec![min];
    }
    let span = max.saturating_sub(min) as u64;
    let intervals = (steps - 1) as u64;
    (0..steps as u64)
        .map(|k| min + (span * k).div_ceil(intervals) as u32)
        .collect()
}

/// The widths to actually resize to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizePlan {
    /// Unique widths, each at most the natural width, in first-seen order.
    pub widths: Vec<u32>,
    /// Clamped placeholder width, when a placeholder was requested.
    pub placeholder: Option<u32>,
}

impl SizePlan {
    /// Whether the placeholder reuses one of the regular widths.
    pub fn placeholder_is_shared(&self) -> bool {
        self.placeholder
            .is_some_and(|width| self.widths.contains(&width))
    }

    /// Every width that needs a resize call: the regular widths, then the
    /// placeholder width when it does not coincide with one of them.
    pub fn resize_widths(&self) -> Vec<u32> {
        let mut widths = self.widths.clone();
        if let Some(placeholder) = self.placeholder
            && !self.placeholder_is_shared()
        {
            widths.push(placeholder);
        }
        widths
    }
}

/// Clamp requested widths to the natural width and deduplicate them.
///
/// Two requests that clamp to the same width produce one entry, at the
/// position of the first. The placeholder width is clamped the same way but
/// kept apart from the regular list.
pub fn plan_sizes(requested: &[u32], natural_width: u32, placeholder: Option<u32>) -> SizePlan {
    let mut widths: Vec<u32> = Vec::with_capacity(requested.len());
    for &candidate in requested {
        let width = candidate.min(natural_width);
        if !widths.contains(&width) {
            widths.push(width);
        }
    }

    SizePlan {
        widths,
        placeholder: placeholder.map(|w| w.min(natural_width)),
    }
}
