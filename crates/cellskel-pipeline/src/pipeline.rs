//! Incremental pipeline: advance a cell stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! ```rust
//! # use cellskel_pipeline::{Dimensions, Pipeline, Point, SkeletonConfig, SkeletonError, ThresholdMode};
//! # fn run(contour: Vec<Point>) -> Result<(), SkeletonError> {
//! let dimensions = Dimensions { width: 128, height: 128 };
//! let geometry = Pipeline::new(contour, dimensions, 1.0, SkeletonConfig::default())
//!     .rasterize()?
//!     .medial_axis()
//!     .select_threshold(ThresholdMode::Automatic)?
//!     .partition()
//!     .extract()?
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for fallible stages), carrying every previously computed
//! intermediate. Accessors expose the current stage's output.

use crate::cell::{BodySkeleton, CellSkeleton};
use crate::diagnostics::StageMetrics;
use crate::medial_axis::MedialAxis;
use crate::partition::Partition;
use crate::protrusion::{BodyPaths, ProtrusionSet};
use crate::threshold::{ThresholdMode, ThresholdSelector, max_threshold, positive_distances};
use crate::types::{
    Dimensions, GrayImage, Point, SkeletonConfig, SkeletonError, count_foreground,
    resolve_spacing,
};

/// Everything the pipeline derives from one contour.
#[derive(Debug, Clone, PartialEq)]
pub struct CellGeometry {
    /// The contour the geometry was derived from.
    pub contour: Vec<Point>,
    /// Cleaned binary mask (255 = inside).
    pub mask: GrayImage,
    /// Contour area divided by the pixel area `spacing²`.
    pub area: f64,
    /// Skeleton, body and protrusions.
    pub skeleton: CellSkeleton,
}

/// Entry point for the staged pipeline.
pub struct Pipeline;

impl Pipeline {
    /// Start a pipeline for one contour.
    ///
    /// `spacing` is the physical length of one pixel; it is validated when
    /// the pipeline advances.
    pub const fn new(
        contour: Vec<Point>,
        dimensions: Dimensions,
        spacing: f64,
        config: SkeletonConfig,
    ) -> Pending {
        Pending {
            config,
            dimensions,
            spacing,
            contour,
        }
    }
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
#[must_use = "pipeline stages are consumed by advancing, call .rasterize() to continue"]
pub struct Pending {
    config: SkeletonConfig,
    dimensions: Dimensions,
    spacing: f64,
    contour: Vec<Point>,
}

impl Pending {
    /// The input contour.
    #[must_use]
    pub fn contour(&self) -> &[Point] {
        &self.contour
    }

    /// Rasterize and clean the contour's mask.
    ///
    /// # Errors
    ///
    /// Returns [`SkeletonError::InvalidSpacing`] for a bad spacing and
    /// [`SkeletonError::InvalidContour`] for a degenerate contour.
    pub fn rasterize(self) -> Result<Rasterized, SkeletonError> {
        let spacing = resolve_spacing(Some(self.spacing))?;
        let raw = crate::raster::rasterize_contour(&self.contour, self.dimensions)?;
        let mask = crate::raster::clean_mask(&raw, &self.config);
        let area = crate::raster::contour_area(&self.contour, spacing);
        tracing::debug!(
            raw_pixels = count_foreground(&raw),
            mask_pixels = count_foreground(&mask),
            area,
            "contour rasterized"
        );
        Ok(Rasterized {
            config: self.config,
            spacing,
            contour: self.contour,
            raw_pixel_count: count_foreground(&raw),
            mask,
            area,
        })
    }
}

// ───────────────────────── Stage 1: Rasterized ───────────────────────

/// Pipeline state after rasterizing the contour.
#[must_use = "pipeline stages are consumed by advancing, call .medial_axis() to continue"]
pub struct Rasterized {
    config: SkeletonConfig,
    spacing: f64,
    contour: Vec<Point>,
    raw_pixel_count: u64,
    mask: GrayImage,
    area: f64,
}

impl Rasterized {
    /// The cleaned mask.
    #[must_use]
    pub const fn mask(&self) -> &GrayImage {
        &self.mask
    }

    /// Contour area divided by the pixel area.
    #[must_use]
    pub const fn area(&self) -> f64 {
        self.area
    }

    /// Stage metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Rasterize {
            raw_pixel_count: self.raw_pixel_count,
            mask_pixel_count: count_foreground(&self.mask),
            area: self.area,
        }
    }

    /// Compute the medial axis of the mask.
    pub fn medial_axis(self) -> Skeletonized {
        let axis = crate::medial_axis::medial_axis(&self.mask);
        Skeletonized {
            config: self.config,
            spacing: self.spacing,
            contour: self.contour,
            mask: self.mask,
            area: self.area,
            axis,
        }
    }
}

// ───────────────────────── Stage 2: Skeletonized ─────────────────────

/// Pipeline state after the medial axis transform.
#[must_use = "pipeline stages are consumed by advancing, call .select_threshold() to continue"]
pub struct Skeletonized {
    config: SkeletonConfig,
    spacing: f64,
    contour: Vec<Point>,
    mask: GrayImage,
    area: f64,
    axis: MedialAxis,
}

impl Skeletonized {
    /// The medial axis.
    #[must_use]
    pub const fn axis(&self) -> &MedialAxis {
        &self.axis
    }

    /// Stage metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::MedialAxis {
            skeleton_pixel_count: count_foreground(self.axis.skeleton()),
            max_distance: self.axis.max_distance(),
        }
    }

    /// Choose the body threshold.
    ///
    /// # Errors
    ///
    /// Returns [`SkeletonError::EmptyHistogram`] when the skeleton has no
    /// positive distance value (the mask was empty).
    pub fn select_threshold(self, mode: ThresholdMode) -> Result<Thresholded, SkeletonError> {
        let values = positive_distances(self.axis.distance());
        let threshold = mode.select(&values)?;
        let max_threshold = max_threshold(&values);
        tracing::debug!(?mode, threshold, max_threshold, "body threshold selected");
        Ok(Thresholded {
            config: self.config,
            spacing: self.spacing,
            contour: self.contour,
            mask: self.mask,
            area: self.area,
            axis: self.axis,
            mode,
            threshold,
            max_threshold,
        })
    }
}

// ───────────────────────── Stage 3: Thresholded ──────────────────────

/// Pipeline state after the body threshold is chosen.
#[must_use = "pipeline stages are consumed by advancing, call .partition() to continue"]
pub struct Thresholded {
    config: SkeletonConfig,
    spacing: f64,
    contour: Vec<Point>,
    mask: GrayImage,
    area: f64,
    axis: MedialAxis,
    mode: ThresholdMode,
    threshold: f64,
    max_threshold: f64,
}

impl Thresholded {
    /// The chosen threshold.
    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }

    /// The largest distance on the skeleton.
    #[must_use]
    pub const fn max_threshold(&self) -> f64 {
        self.max_threshold
    }

    /// Stage metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Threshold {
            automatic: matches!(self.mode, ThresholdMode::Automatic),
            threshold: self.threshold,
            max_threshold: self.max_threshold,
        }
    }

    /// Split the skeleton into body and branches.
    pub fn partition(self) -> Partitioned {
        let partition = crate::partition::partition(self.axis.distance(), self.threshold);
        Partitioned {
            config: self.config,
            spacing: self.spacing,
            contour: self.contour,
            mask: self.mask,
            area: self.area,
            axis: self.axis,
            threshold: self.threshold,
            max_threshold: self.max_threshold,
            partition,
        }
    }
}

// ───────────────────────── Stage 4: Partitioned ──────────────────────

/// Pipeline state after body/branch partitioning.
#[must_use = "pipeline stages are consumed by advancing, call .extract() to continue"]
pub struct Partitioned {
    config: SkeletonConfig,
    spacing: f64,
    contour: Vec<Point>,
    mask: GrayImage,
    area: f64,
    axis: MedialAxis,
    threshold: f64,
    max_threshold: f64,
    partition: Partition,
}

impl Partitioned {
    /// The body/branch split.
    #[must_use]
    pub const fn partition_result(&self) -> &Partition {
        &self.partition
    }

    /// Stage metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Partition {
            body_pixel_count: count_foreground(&self.partition.body),
            branch_pixel_count: count_foreground(&self.partition.branches),
        }
    }

    /// Route body paths and extract protrusions.
    ///
    /// # Errors
    ///
    /// Propagates routing errors, which do not occur for pixels taken
    /// from the skeleton.
    pub fn extract(self) -> Result<Extracted, SkeletonError> {
        let blocked_cost = self.config.blocked_cost;
        let body_paths =
            crate::protrusion::trace_body(&self.partition.body, self.spacing, blocked_cost)?;
        let protrusions = crate::protrusion::extract_protrusions(
            self.axis.skeleton(),
            &self.partition.body,
            &self.partition.branches,
            self.spacing,
            blocked_cost,
        )?;
        Ok(Extracted {
            config: self.config,
            spacing: self.spacing,
            contour: self.contour,
            mask: self.mask,
            area: self.area,
            axis: self.axis,
            threshold: self.threshold,
            max_threshold: self.max_threshold,
            body: self.partition.body,
            body_paths,
            protrusions,
        })
    }
}

// ───────────────────────── Stage 5: Extracted ────────────────────────

/// Final pipeline state.
#[must_use = "call .into_result() to obtain the cell geometry"]
pub struct Extracted {
    config: SkeletonConfig,
    spacing: f64,
    contour: Vec<Point>,
    mask: GrayImage,
    area: f64,
    axis: MedialAxis,
    threshold: f64,
    max_threshold: f64,
    body: GrayImage,
    body_paths: BodyPaths,
    protrusions: ProtrusionSet,
}

impl Extracted {
    /// The extracted protrusions.
    #[must_use]
    pub const fn protrusions(&self) -> &ProtrusionSet {
        &self.protrusions
    }

    /// Stage metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Extract {
            body_endpoint_count: self.body_paths.endpoints.len(),
            protrusion_count: self.protrusions.len(),
            path_count: self.protrusions.path_count(),
            total_length: self.protrusions.total_length,
            degenerate_count: self.protrusions.issues.len(),
        }
    }

    /// Finish the pipeline.
    #[must_use]
    pub fn into_result(self) -> CellGeometry {
        CellGeometry {
            contour: self.contour,
            mask: self.mask,
            area: self.area,
            skeleton: CellSkeleton {
                medial_axis: self.axis,
                body: BodySkeleton::new(
                    self.body,
                    self.threshold,
                    self.max_threshold,
                    self.spacing,
                    self.body_paths,
                ),
                protrusions: self.protrusions,
                blocked_cost: self.config.blocked_cost,
            },
        }
    }
}

/// Run every stage with the configured threshold mode.
///
/// # Errors
///
/// See the individual stages.
pub fn process(
    contour: Vec<Point>,
    dimensions: Dimensions,
    spacing: f64,
    config: &SkeletonConfig,
) -> Result<CellGeometry, SkeletonError> {
    let mode = config.threshold_mode;
    Ok(Pipeline::new(contour, dimensions, spacing, config.clone())
        .rasterize()?
        .medial_axis()
        .select_threshold(mode)?
        .partition()
        .extract()?
        .into_result())
}
