//! Body threshold selection over skeleton distance values.
//!
//! The body of a cell is the part of its skeleton that lies deep inside
//! the shape. This module picks the distance cut-off that separates it
//! from the thinner protrusions, either automatically (Otsu's method) or
//! from a caller-supplied value.
//!
//! # Strategy pattern
//!
//! [`ThresholdSelector`] is the pluggable interface and
//! [`ThresholdMode`] the runtime selection, so a front end can switch
//! between automatic and manual thresholds without touching the rest of
//! the pipeline.

use serde::{Deserialize, Serialize};

use crate::types::{DistanceMap, SkeletonError};

/// Number of histogram bins used by [`otsu_threshold`].
pub const OTSU_BINS: usize = 256;

/// Selects how the body threshold is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum ThresholdMode {
    /// Otsu's method over the positive skeleton distances.
    #[default]
    Automatic,
    /// A fixed distance, clamped into `[0, max_threshold]`.
    Manual(f64),
}

/// Trait for threshold selection strategies.
///
/// Input: the strictly positive distance values of a skeleton.
/// Output: a threshold in `[0, max]` of those values.
pub trait ThresholdSelector {
    /// Choose a threshold for the given distance values.
    ///
    /// # Errors
    ///
    /// Returns [`SkeletonError::EmptyHistogram`] when `values` is empty.
    fn select(&self, values: &[f64]) -> Result<f64, SkeletonError>;
}

impl ThresholdSelector for ThresholdMode {
    fn select(&self, values: &[f64]) -> Result<f64, SkeletonError> {
        match *self {
            Self::Automatic => otsu_threshold(values),
            Self::Manual(t) => {
                if values.is_empty() {
                    return Err(SkeletonError::EmptyHistogram);
                }
                Ok(clamp_threshold(t, max_threshold(values)))
            }
        }
    }
}

/// The strictly positive values of a distance map, row-major.
#[must_use]
pub fn positive_distances(distance: &DistanceMap) -> Vec<f64> {
    distance
        .pixels()
        .map(|p| p.0[0])
        .filter(|&d| d > 0.0)
        .collect()
}

/// Largest value, or 0 for an empty slice.
#[must_use]
pub fn max_threshold(values: &[f64]) -> f64 {
    values.iter().copied().fold(0.0, f64::max)
}

/// Clamp a threshold into `[0, max]`. NaN maps to 0.
#[must_use]
pub fn clamp_threshold(threshold: f64, max: f64) -> f64 {
    if threshold.is_nan() {
        return 0.0;
    }
    let clamped = threshold.clamp(0.0, max.max(0.0));
    if (clamped - threshold).abs() > 0.0 {
        tracing::debug!(requested = threshold, clamped, "threshold clamped into range");
    }
    clamped
}

/// Otsu threshold of a set of values.
///
/// Builds a 256-bin histogram over `[min, max]` and returns the centre of
/// the bin that maximizes the between-class variance of the split
/// `values < centre` / `values >= centre` (first maximum on ties).
///
/// # Errors
///
/// Returns [`SkeletonError::EmptyHistogram`] when `values` is empty.
/// A single distinct value is not an error: that value is returned.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn otsu_threshold(values: &[f64]) -> Result<f64, SkeletonError> {
    let min = values.iter().copied().reduce(f64::min);
    let max = values.iter().copied().reduce(f64::max);
    let (Some(min), Some(max)) = (min, max) else {
        return Err(SkeletonError::EmptyHistogram);
    };
    if max - min <= 0.0 {
        return Ok(min);
    }

    let bin_width = (max - min) / OTSU_BINS as f64;
    let mut counts = [0.0f64; OTSU_BINS];
    for &v in values {
        let bin = (((v - min) / bin_width) as usize).min(OTSU_BINS - 1);
        counts[bin] += 1.0;
    }
    let centres: Vec<f64> = (0..OTSU_BINS)
        .map(|i| (i as f64 + 0.5).mul_add(bin_width, min))
        .collect();

    // Cumulative class weights and means, from below and from above.
    let mut weight_below = [0.0f64; OTSU_BINS];
    let mut mean_below = [0.0f64; OTSU_BINS];
    let (mut w, mut s) = (0.0, 0.0);
    for i in 0..OTSU_BINS {
        w += counts[i];
        s += counts[i] * centres[i];
        weight_below[i] = w;
        mean_below[i] = if w > 0.0 { s / w } else { 0.0 };
    }
    let mut weight_above = [0.0f64; OTSU_BINS];
    let mut mean_above = [0.0f64; OTSU_BINS];
    let (mut w, mut s) = (0.0, 0.0);
    for i in (0..OTSU_BINS).rev() {
        w += counts[i];
        s += counts[i] * centres[i];
        weight_above[i] = w;
        mean_above[i] = if w > 0.0 { s / w } else { 0.0 };
    }

    let mut best = 0usize;
    let mut best_variance = f64::NEG_INFINITY;
    for i in 0..OTSU_BINS - 1 {
        let diff = mean_below[i] - mean_above[i + 1];
        let variance = weight_below[i] * weight_above[i + 1] * diff * diff;
        if variance > best_variance {
            best_variance = variance;
            best = i;
        }
    }

    Ok(centres[best])
}
