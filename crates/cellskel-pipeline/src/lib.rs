//! cellskel-pipeline: Cell-shape skeletonization and topology (sans-IO).
//!
//! Turns a hand-drawn cell contour into a skeleton split into a central
//! body and peripheral protrusions:
//! contour -> mask -> medial axis -> threshold -> body/branches ->
//! endpoints -> cost-weighted paths -> protrusions.
//!
//! Cells drawn on the same frame are checked for overlap, and each
//! overlap region is logged as a [`Connection`].
//!
//! This crate has **no I/O dependencies**: it takes contours and frame
//! sizes as plain values and returns structured data. Reading sessions
//! from disk and printing reports lives in `cellskel-bench`.

pub mod cell;
pub mod components;
pub mod connectivity;
pub mod diagnostics;
pub mod endpoints;
pub mod medial_axis;
pub mod partition;
pub mod pipeline;
pub mod protrusion;
pub mod raster;
pub mod route;
pub mod session;
pub mod threshold;
pub mod types;

pub use cell::{BodySkeleton, CellShape, CellSkeleton, adjust_body_threshold, finalize_cell};
pub use connectivity::{Connection, detect_connections};
pub use diagnostics::{Clock, SkeletonDiagnostics, process_with_diagnostics};
pub use pipeline::{CellGeometry, Pipeline, process};
pub use protrusion::{Protrusion, ProtrusionSet, TracedPath};
pub use session::{Analysis, CellSummary};
pub use threshold::{ThresholdMode, ThresholdSelector};
pub use types::{
    CellColor, CellId, Dimensions, Pixel, PixelPath, Point, SkeletonConfig, SkeletonError,
};
