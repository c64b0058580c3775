//! Contour rasterization: closed polygon to filled binary mask.
//!
//! A pixel belongs to the mask when its centre lies inside or on the
//! boundary of the polygon. The raw mask is then cleaned (closing plus
//! largest-region selection) before it is skeletonized.

use geo::coordinate_position::{CoordPos, CoordinatePosition};
use geo::{Area, BoundingRect, Coord, LineString, Polygon};
use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;

use crate::components::keep_largest;
use crate::types::{Dimensions, FOREGROUND, Point, SkeletonConfig, SkeletonError};

/// Build a `geo` polygon from contour vertices, rejecting degenerate input.
fn to_polygon(contour: &[Point]) -> Result<Polygon<f64>, SkeletonError> {
    let mut distinct: Vec<Point> = Vec::with_capacity(contour.len());
    for p in contour.iter().copied().filter(|p| p.is_finite()) {
        if !distinct.contains(&p) {
            distinct.push(p);
        }
    }
    if distinct.len() < 3 || contour.iter().any(|p| !p.is_finite()) {
        return Err(SkeletonError::InvalidContour {
            distinct_vertices: distinct.len(),
        });
    }

    let exterior: LineString<f64> = contour.iter().map(|p| Coord { x: p.x, y: p.y }).collect();
    Ok(Polygon::new(exterior, vec![]))
}

/// Rasterize a closed contour onto a grid of the given dimensions.
///
/// The contour is implicitly closed; vertex order may be either
/// orientation. Parts of the polygon outside the grid are ignored.
///
/// # Errors
///
/// Returns [`SkeletonError::InvalidContour`] when the contour has fewer
/// than 3 distinct vertices or contains non-finite coordinates.
pub fn rasterize_contour(
    contour: &[Point],
    dimensions: Dimensions,
) -> Result<GrayImage, SkeletonError> {
    let polygon = to_polygon(contour)?;
    let mut mask = GrayImage::new(dimensions.width, dimensions.height);

    let Some(bounds) = polygon.bounding_rect() else {
        return Ok(mask);
    };
    if dimensions.width == 0 || dimensions.height == 0 {
        return Ok(mask);
    }

    let x_range = grid_range(bounds.min().x, bounds.max().x, dimensions.width);
    let y_range = grid_range(bounds.min().y, bounds.max().y, dimensions.height);
    let (Some((x0, x1)), Some((y0, y1))) = (x_range, y_range) else {
        return Ok(mask);
    };

    for y in y0..=y1 {
        for x in x0..=x1 {
            let centre = Coord {
                x: f64::from(x),
                y: f64::from(y),
            };
            if polygon.coordinate_position(&centre) != CoordPos::Outside {
                mask.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
    }

    Ok(mask)
}

/// Integer pixel range `[lo, hi]` covering `[min, max]`, clipped to
/// `0..extent`. `None` when the interval misses the grid entirely.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn grid_range(min: f64, max: f64, extent: u32) -> Option<(u32, u32)> {
    let last = f64::from(extent - 1);
    if max < 0.0 || min > last {
        return None;
    }
    let lo = min.ceil().clamp(0.0, last) as u32;
    let hi = max.floor().clamp(0.0, last) as u32;
    (lo <= hi).then_some((lo, hi))
}

/// Clean a rasterized mask: morphological closing, then (optionally)
/// keep only the largest 8-connected region.
///
/// Discarding the smaller regions is silent: a contour that encloses two
/// blobs yields a mask of the bigger one.
#[must_use]
pub fn clean_mask(mask: &GrayImage, config: &SkeletonConfig) -> GrayImage {
    let closed = if config.closing_radius > 0 {
        imageproc::morphology::close(mask, Norm::L1, config.closing_radius)
    } else {
        mask.clone()
    };

    if config.keep_largest_region {
        keep_largest(&closed)
    } else {
        closed
    }
}

/// Contour area (shoelace formula, absolute value) divided by the physical
/// area of one pixel, `spacing²`.
#[must_use]
pub fn contour_area(contour: &[Point], spacing: f64) -> f64 {
    let exterior: LineString<f64> = contour.iter().map(|p| Coord { x: p.x, y: p.y }).collect();
    Polygon::new(exterior, vec![]).unsigned_area() / (spacing * spacing)
}
