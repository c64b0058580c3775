//! Finalized cells and their skeletons.
//!
//! A [`CellShape`] is created once per finalized contour. Its mask, area
//! and skeleton are computed at that point; afterwards only the body
//! threshold can change, and changing it recomputes the body and the
//! protrusions from the retained distance map without touching anything
//! else.

use crate::medial_axis::MedialAxis;
use crate::partition::partition;
use crate::pipeline::{CellGeometry, process};
use crate::protrusion::{BodyPaths, ProtrusionSet, extract_protrusions, trace_body};
use crate::threshold::clamp_threshold;
use crate::types::{
    CellColor, CellId, Dimensions, GrayImage, Pixel, PixelPath, Point, SkeletonConfig,
    SkeletonError, resolve_spacing,
};

/// The thresholded body sub-skeleton and its paths.
#[derive(Debug, Clone, PartialEq)]
pub struct BodySkeleton {
    /// Body pixels (255 = body).
    pub pixels: GrayImage,
    /// Threshold the body was cut at, within `[0, max_threshold]`.
    pub threshold: f64,
    /// Largest distance value on the full skeleton.
    pub max_threshold: f64,
    /// Physical length of one pixel, used for every length below.
    pub physical_spacing: f64,
    /// Body endpoints, row-major. The first is the reference.
    pub endpoints: Vec<Pixel>,
    /// Paths from the reference endpoint to each other endpoint.
    pub paths: Vec<PixelPath>,
    /// Physical path lengths, 1:1 with `paths`.
    pub lengths: Vec<f64>,
}

impl BodySkeleton {
    /// Assemble a body from its pixels and routed paths.
    #[must_use]
    pub fn new(
        pixels: GrayImage,
        threshold: f64,
        max_threshold: f64,
        physical_spacing: f64,
        paths: BodyPaths,
    ) -> Self {
        Self {
            pixels,
            threshold,
            max_threshold,
            physical_spacing,
            endpoints: paths.endpoints,
            paths: paths.paths,
            lengths: paths.lengths,
        }
    }
}

/// The skeleton of one cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellSkeleton {
    /// Full skeleton and its distance map.
    pub medial_axis: MedialAxis,
    /// Body at the current threshold.
    pub body: BodySkeleton,
    /// Protrusions at the current threshold.
    pub protrusions: ProtrusionSet,
    /// Blocked-pixel routing cost the paths were traced with.
    pub blocked_cost: f64,
}

impl CellSkeleton {
    /// Recompute body and protrusions at a new threshold.
    ///
    /// The threshold is clamped into `[0, max_threshold]`. The result
    /// depends only on the retained medial axis, the threshold, the
    /// spacing and the routing cost, never on the previous threshold.
    ///
    /// # Errors
    ///
    /// Propagates routing errors, which do not occur for pixels taken
    /// from the skeleton.
    pub fn with_threshold(&self, threshold: f64) -> Result<Self, SkeletonError> {
        let max_threshold = self.body.max_threshold;
        let spacing = self.body.physical_spacing;
        let threshold = clamp_threshold(threshold, max_threshold);

        let split = partition(self.medial_axis.distance(), threshold);
        let body_paths = trace_body(&split.body, spacing, self.blocked_cost)?;
        let protrusions = extract_protrusions(
            self.medial_axis.skeleton(),
            &split.body,
            &split.branches,
            spacing,
            self.blocked_cost,
        )?;

        Ok(Self {
            medial_axis: self.medial_axis.clone(),
            body: BodySkeleton::new(split.body, threshold, max_threshold, spacing, body_paths),
            protrusions,
            blocked_cost: self.blocked_cost,
        })
    }
}

/// One segmented cell in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CellShape {
    /// Session-unique id.
    pub id: CellId,
    /// Z-stack frame the cell was drawn on.
    pub frame_index: u32,
    /// Boundary polygon, implicitly closed.
    pub contour: Vec<Point>,
    /// Cleaned binary mask, same size as the source frame.
    pub mask: GrayImage,
    /// Contour area divided by the pixel area `spacing²`.
    pub area: f64,
    /// Display colour.
    pub color: CellColor,
    /// Skeleton, body and protrusions.
    pub skeleton: CellSkeleton,
}

impl CellShape {
    /// Wrap pipeline output as a cell.
    #[must_use]
    pub fn from_geometry(id: CellId, frame_index: u32, geometry: CellGeometry) -> Self {
        Self {
            id,
            frame_index,
            contour: geometry.contour,
            mask: geometry.mask,
            area: geometry.area,
            color: CellColor::for_cell(id),
            skeleton: geometry.skeleton,
        }
    }
}

/// Build a cell from a finalized contour.
///
/// A missing `physical_spacing` means pixel units (1.0).
///
/// # Errors
///
/// Returns [`SkeletonError::InvalidSpacing`], [`SkeletonError::InvalidContour`]
/// or [`SkeletonError::EmptyHistogram`] when the contour cannot be
/// skeletonized.
pub fn finalize_cell(
    id: CellId,
    contour: Vec<Point>,
    frame_index: u32,
    physical_spacing: Option<f64>,
    dimensions: Dimensions,
    config: &SkeletonConfig,
) -> Result<CellShape, SkeletonError> {
    let spacing = resolve_spacing(physical_spacing)?;
    let geometry = process(contour, dimensions, spacing, config)?;
    Ok(CellShape::from_geometry(id, frame_index, geometry))
}

/// Return a copy of `cell` with its body re-cut at `threshold`.
///
/// Only the body and protrusions change; mask, area, contour and the
/// medial axis are carried over unchanged.
///
/// # Errors
///
/// Propagates routing errors, which do not occur for pixels taken from
/// the skeleton.
pub fn adjust_body_threshold(cell: &CellShape, threshold: f64) -> Result<CellShape, SkeletonError> {
    let skeleton = cell.skeleton.with_threshold(threshold)?;
    tracing::debug!(
        cell = %cell.id,
        threshold = skeleton.body.threshold,
        protrusions = skeleton.protrusions.len(),
        "body threshold adjusted"
    );
    Ok(CellShape {
        skeleton,
        ..cell.clone()
    })
}
