//! Body/branch partitioning of a skeleton.
//!
//! Skeleton pixels at or above the body threshold are grouped into
//! 8-connected components; the component with the greatest perimeter is
//! the cell body. Everything else on the skeleton is branch material.

use image::{GrayImage, Luma};

use crate::components::{Component, label_components};
use crate::types::{DistanceMap, FOREGROUND};

/// A skeleton split into its body and its branches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// The body sub-skeleton. May be empty.
    pub body: GrayImage,
    /// Skeleton pixels not in the body.
    pub branches: GrayImage,
}

/// Split the skeleton encoded in `distance` (positive = skeleton) at
/// `threshold`.
///
/// Ties in perimeter go to the first component in row-major order. A
/// threshold above every distance yields an empty body and leaves the
/// whole skeleton as branches; that is a valid result, not an error.
#[must_use]
pub fn partition(distance: &DistanceMap, threshold: f64) -> Partition {
    let (width, height) = distance.dimensions();
    let above = GrayImage::from_fn(width, height, |x, y| {
        let d = distance.get_pixel(x, y).0[0];
        Luma([if d > 0.0 && d >= threshold {
            FOREGROUND
        } else {
            0
        }])
    });

    let components = label_components(&above);
    let mut body_component: Option<(&Component, f64)> = None;
    for component in &components {
        let perimeter = component.perimeter();
        if body_component.is_none_or(|(_, best)| perimeter > best) {
            body_component = Some((component, perimeter));
        }
    }

    let body = body_component.map_or_else(
        || GrayImage::new(width, height),
        |(c, _)| c.to_image(width, height),
    );
    let branches = GrayImage::from_fn(width, height, |x, y| {
        let on_skeleton = distance.get_pixel(x, y).0[0] > 0.0;
        let in_body = body.get_pixel(x, y).0[0] != 0;
        Luma([if on_skeleton && !in_body {
            FOREGROUND
        } else {
            0
        }])
    });

    tracing::debug!(
        threshold,
        candidates = components.len(),
        body_perimeter = body_component.map_or(0.0, |(_, p)| p),
        "skeleton partitioned"
    );

    Partition { body, branches }
}
