//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! [`process_with_diagnostics`] runs the staged pipeline for one contour
//! and records the wall-clock duration and [`StageMetrics`] of every
//! stage. Time is read through the [`Clock`] trait so the library stays
//! free of platform timers; callers supply an implementation.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::{CellGeometry, Pipeline};
use crate::types::{Dimensions, Point, SkeletonConfig, SkeletonError};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// Current timestamp.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from one cell's pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkeletonDiagnostics {
    /// Stage 1: rasterization and mask cleanup.
    pub rasterize: StageDiagnostics,
    /// Stage 2: medial axis transform.
    pub medial_axis: StageDiagnostics,
    /// Stage 3: threshold selection.
    pub threshold: StageDiagnostics,
    /// Stage 4: body/branch partitioning.
    pub partition: StageDiagnostics,
    /// Stage 5: path routing and protrusion extraction.
    pub extract: StageDiagnostics,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary of the input.
    pub summary: RunSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Rasterization metrics.
    Rasterize {
        /// Pixels inside the polygon before cleanup.
        raw_pixel_count: u64,
        /// Pixels in the cleaned mask.
        mask_pixel_count: u64,
        /// Contour area divided by the pixel area.
        area: f64,
    },
    /// Medial axis metrics.
    MedialAxis {
        /// Skeleton pixels.
        skeleton_pixel_count: u64,
        /// Largest distance on the skeleton.
        max_distance: f64,
    },
    /// Threshold selection metrics.
    Threshold {
        /// Whether Otsu's method chose the threshold.
        automatic: bool,
        /// Chosen threshold.
        threshold: f64,
        /// Upper bound of the threshold range.
        max_threshold: f64,
    },
    /// Partition metrics.
    Partition {
        /// Pixels in the body.
        body_pixel_count: u64,
        /// Skeleton pixels outside the body.
        branch_pixel_count: u64,
    },
    /// Extraction metrics.
    Extract {
        /// Body endpoints.
        body_endpoint_count: usize,
        /// Protrusions found.
        protrusion_count: usize,
        /// Traced protrusion paths.
        path_count: usize,
        /// Physical length of all traced paths.
        total_length: f64,
        /// Components that yielded no paths.
        degenerate_count: usize,
    },
}

/// High-level facts about the run's input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Frame width in pixels.
    pub image_width: u32,
    /// Frame height in pixels.
    pub image_height: u32,
    /// Number of contour vertices.
    pub contour_vertices: usize,
    /// Physical length of one pixel.
    pub physical_spacing: f64,
}

impl SkeletonDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Skeleton Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Frame: {}x{}  |  Contour: {} vertices  |  Spacing: {}",
            self.summary.image_width,
            self.summary.image_height,
            self.summary.contour_vertices,
            self.summary.physical_spacing,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<16} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Rasterize", &self.rasterize),
            ("Medial Axis", &self.medial_axis),
            ("Threshold", &self.threshold),
            ("Partition", &self.partition),
            ("Extract", &self.extract),
        ];
        for (name, diag) in stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<16} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Rasterize {
            raw_pixel_count,
            mask_pixel_count,
            area,
        } => format!("{raw_pixel_count} -> {mask_pixel_count} px, area={area:.2}"),
        StageMetrics::MedialAxis {
            skeleton_pixel_count,
            max_distance,
        } => format!("{skeleton_pixel_count} px, max distance={max_distance:.2}"),
        StageMetrics::Threshold {
            automatic,
            threshold,
            max_threshold,
        } => {
            let how = if *automatic { "otsu" } else { "manual" };
            format!("{how} {threshold:.2} of {max_threshold:.2}")
        }
        StageMetrics::Partition {
            body_pixel_count,
            branch_pixel_count,
        } => format!("body={body_pixel_count} px, branches={branch_pixel_count} px"),
        StageMetrics::Extract {
            body_endpoint_count,
            protrusion_count,
            path_count,
            total_length,
            degenerate_count,
        } => format!(
            "{protrusion_count} protrusions, {path_count} paths, length={total_length:.2}, body endpoints={body_endpoint_count}, degenerate={degenerate_count}"
        ),
    }
}

/// Time one stage transition.
fn timed<C: Clock, T, E>(clock: &C, f: impl FnOnce() -> Result<T, E>) -> Result<(T, Duration), E> {
    let start = clock.now();
    let value = f()?;
    Ok((value, clock.elapsed(&start)))
}

/// Run the staged pipeline and collect per-stage diagnostics.
///
/// The threshold stage uses `config.threshold_mode`.
///
/// # Errors
///
/// Returns the first stage error, as [`crate::pipeline::process`] would.
pub fn process_with_diagnostics<C: Clock>(
    contour: Vec<Point>,
    dimensions: Dimensions,
    spacing: f64,
    config: &SkeletonConfig,
    clock: &C,
) -> Result<(CellGeometry, SkeletonDiagnostics), SkeletonError> {
    let total_start = clock.now();
    let summary = RunSummary {
        image_width: dimensions.width,
        image_height: dimensions.height,
        contour_vertices: contour.len(),
        physical_spacing: spacing,
    };
    let mode = config.threshold_mode;
    let pending = Pipeline::new(contour, dimensions, spacing, config.clone());

    let (rasterized, d_rasterize) = timed(clock, || pending.rasterize())?;
    let m_rasterize = rasterized.metrics();
    let (skeletonized, d_axis) = timed(clock, || Ok::<_, SkeletonError>(rasterized.medial_axis()))?;
    let m_axis = skeletonized.metrics();
    let (thresholded, d_threshold) = timed(clock, || skeletonized.select_threshold(mode))?;
    let m_threshold = thresholded.metrics();
    let (partitioned, d_partition) = timed(clock, || Ok::<_, SkeletonError>(thresholded.partition()))?;
    let m_partition = partitioned.metrics();
    let (extracted, d_extract) = timed(clock, || partitioned.extract())?;
    let m_extract = extracted.metrics();

    let diagnostics = SkeletonDiagnostics {
        rasterize: StageDiagnostics {
            duration: d_rasterize,
            metrics: m_rasterize,
        },
        medial_axis: StageDiagnostics {
            duration: d_axis,
            metrics: m_axis,
        },
        threshold: StageDiagnostics {
            duration: d_threshold,
            metrics: m_threshold,
        },
        partition: StageDiagnostics {
            duration: d_partition,
            metrics: m_partition,
        },
        extract: StageDiagnostics {
            duration: d_extract,
            metrics: m_extract,
        },
        total_duration: clock.elapsed(&total_start),
        summary,
    };

    Ok((extracted.into_result(), diagnostics))
}
