//! Shared types for the cellskel skeletonization pipeline.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::threshold::ThresholdMode;

/// Re-export `GrayImage` so downstream crates can reference masks and
/// skeletons without depending on `image` directly.
pub use image::GrayImage;

/// Per-pixel Euclidean distance to the nearest background pixel.
pub type DistanceMap = image::ImageBuffer<image::Luma<f64>, Vec<f64>>;

/// Foreground value used by every binary raster in this crate.
pub const FOREGROUND: u8 = 255;

/// A 2D point in image coordinates (contour vertices).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns `true` if both coordinates are finite.
    #[must_use]
    pub const fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// An integer pixel position on the image grid.
///
/// Ordering is row-major: by `y`, then by `x`. Every pixel list this
/// crate returns is sorted this way, so results are reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pixel {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
}

impl Pixel {
    /// Create a new pixel position.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Euclidean length of the step to `other`.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        let dx = f64::from(self.x.abs_diff(other.x));
        let dy = f64::from(self.y.abs_diff(other.y));
        dx.hypot(dy)
    }

    /// Returns `true` if `other` is one of the eight neighbours of `self`.
    #[must_use]
    pub const fn is_adjacent(self, other: Self) -> bool {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        dx <= 1 && dy <= 1 && (dx + dy) > 0
    }

    /// The in-grid 8-neighbours of this pixel, row-major.
    pub fn neighbors(self, width: u32, height: u32) -> impl Iterator<Item = Self> {
        let y0 = self.y.saturating_sub(1);
        let x0 = self.x.saturating_sub(1);
        let y1 = (self.y + 1).min(height.saturating_sub(1));
        let x1 = (self.x + 1).min(width.saturating_sub(1));
        (y0..=y1)
            .flat_map(move |y| (x0..=x1).map(move |x| Self::new(x, y)))
            .filter(move |p| *p != self)
    }
}

impl Ord for Pixel {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

impl PartialOrd for Pixel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An ordered sequence of 8-adjacent pixels, from start to end inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PixelPath(Vec<Pixel>);

impl PixelPath {
    /// Create a new path from a vector of pixels.
    #[must_use]
    pub const fn new(pixels: Vec<Pixel>) -> Self {
        Self(pixels)
    }

    /// Returns `true` if the path has no pixels.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of pixels in the path.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first pixel, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Pixel> {
        self.0.first()
    }

    /// Returns the last pixel, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Pixel> {
        self.0.last()
    }

    /// Returns a slice of all pixels.
    #[must_use]
    pub fn pixels(&self) -> &[Pixel] {
        &self.0
    }

    /// Consecutive pixel pairs along the path.
    pub fn steps(&self) -> impl Iterator<Item = (Pixel, Pixel)> + '_ {
        self.0.windows(2).map(|w| (w[0], w[1]))
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Returns `true` if `pixel` lies on the grid.
    #[must_use]
    pub const fn contains(self, pixel: Pixel) -> bool {
        pixel.x < self.width && pixel.y < self.height
    }
}

/// Identifier of a finalized cell. Starts at 1 and increases by one per
/// finalized cell in a session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CellId(pub u32);

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Display colour assigned to a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellColor(pub [u8; 3]);

impl CellColor {
    /// The seven leading colours of the qualitative "Set1" palette.
    pub const PALETTE: [Self; 7] = [
        Self([228, 26, 28]),
        Self([55, 126, 184]),
        Self([77, 175, 74]),
        Self([152, 78, 163]),
        Self([255, 127, 0]),
        Self([255, 255, 51]),
        Self([166, 86, 40]),
    ];

    /// Palette colour for a cell, cycling by id.
    #[must_use]
    pub const fn for_cell(id: CellId) -> Self {
        Self::PALETTE[(id.0 % 7) as usize]
    }
}

/// Configuration for the per-cell skeleton pipeline.
///
/// All parameters have defaults exposed as `DEFAULT_*` constants so
/// front ends (e.g. CLI flags) cannot silently diverge from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkeletonConfig {
    /// Radius of the diamond structuring element used to close the
    /// rasterized mask. `0` disables closing.
    pub closing_radius: u8,

    /// Keep only the largest 8-connected region of the cleaned mask.
    /// Smaller regions are discarded without notice.
    pub keep_largest_region: bool,

    /// Cost of entering a blocked pixel when routing paths. Paths through
    /// blocked pixels are allowed but strongly penalized.
    pub blocked_cost: f64,

    /// How the initial body threshold is chosen.
    pub threshold_mode: ThresholdMode,
}

impl SkeletonConfig {
    /// Default closing radius.
    pub const DEFAULT_CLOSING_RADIUS: u8 = 1;
    /// Default largest-region policy.
    pub const DEFAULT_KEEP_LARGEST_REGION: bool = true;
    /// Default blocked-pixel routing cost.
    pub const DEFAULT_BLOCKED_COST: f64 = 1.0e4;
}

impl Default for SkeletonConfig {
    fn default() -> Self {
        Self {
            closing_radius: Self::DEFAULT_CLOSING_RADIUS,
            keep_largest_region: Self::DEFAULT_KEEP_LARGEST_REGION,
            blocked_cost: Self::DEFAULT_BLOCKED_COST,
            threshold_mode: ThresholdMode::default(),
        }
    }
}

/// Errors that can occur while skeletonizing a cell or querying a session.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum SkeletonError {
    /// The contour does not describe a polygon.
    #[error("contour needs at least 3 distinct finite vertices, got {distinct_vertices}")]
    InvalidContour {
        /// Number of distinct finite vertices found.
        distinct_vertices: usize,
    },

    /// The skeleton has no pixel with a positive distance value.
    #[error("distance histogram is empty: the mask produced no skeleton")]
    EmptyHistogram,

    /// A branch component yielded no attachment point or no free endpoint.
    #[error("protrusion {protrusion_id} has no attachment point or no free endpoint")]
    DegenerateComponent {
        /// 1-based protrusion id of the component.
        protrusion_id: u32,
    },

    /// The physical spacing is not a finite positive number.
    #[error("physical spacing must be finite and positive, got {0}")]
    InvalidSpacing(f64),

    /// A routing endpoint lies outside the cost surface.
    #[error("pixel ({x}, {y}) is outside the {width}x{height} grid")]
    PixelOutOfBounds {
        /// Column of the offending pixel.
        x: u32,
        /// Row of the offending pixel.
        y: u32,
        /// Grid width.
        width: u32,
        /// Grid height.
        height: u32,
    },

    /// No cell with this id exists in the session.
    #[error("no cell with id {0}")]
    UnknownCell(CellId),
}

/// Validate a physical spacing, defaulting to 1.0 (pixel units).
///
/// # Errors
///
/// Returns [`SkeletonError::InvalidSpacing`] for non-finite or
/// non-positive values.
pub fn resolve_spacing(spacing: Option<f64>) -> Result<f64, SkeletonError> {
    match spacing {
        None => Ok(1.0),
        Some(s) if s.is_finite() && s > 0.0 => Ok(s),
        Some(s) => Err(SkeletonError::InvalidSpacing(s)),
    }
}

/// Count foreground pixels in a binary raster.
#[must_use]
pub fn count_foreground(image: &GrayImage) -> u64 {
    image.pixels().map(|p| u64::from(p.0[0] != 0)).sum()
}

/// All foreground pixels of a binary raster, row-major.
#[must_use]
pub fn foreground_pixels(image: &GrayImage) -> Vec<Pixel> {
    image
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] != 0)
        .map(|(x, y, _)| Pixel::new(x, y))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- Pixel tests ---

    #[test]
    fn pixel_ordering_is_row_major() {
        let mut pixels = vec![Pixel::new(5, 1), Pixel::new(0, 2), Pixel::new(3, 1)];
        pixels.sort();
        assert_eq!(
            pixels,
            vec![Pixel::new(3, 1), Pixel::new(5, 1), Pixel::new(0, 2)]
        );
    }

    #[test]
    fn pixel_distance_diagonal() {
        let d = Pixel::new(2, 2).distance(Pixel::new(3, 3));
        assert!((d - std::f64::consts::SQRT_2).abs() < 1e-12);
    }

    #[test]
    fn pixel_adjacency_excludes_self() {
        let p = Pixel::new(4, 4);
        assert!(!p.is_adjacent(p));
        assert!(p.is_adjacent(Pixel::new(5, 3)));
        assert!(!p.is_adjacent(Pixel::new(6, 4)));
    }

    #[test]
    fn pixel_neighbors_clipped_at_corner() {
        let n: Vec<_> = Pixel::new(0, 0).neighbors(10, 10).collect();
        assert_eq!(
            n,
            vec![Pixel::new(1, 0), Pixel::new(0, 1), Pixel::new(1, 1)]
        );
    }

    #[test]
    fn pixel_neighbors_interior_has_eight() {
        assert_eq!(Pixel::new(5, 5).neighbors(10, 10).count(), 8);
    }

    // --- Palette tests ---

    #[test]
    fn palette_cycles_every_seven_ids() {
        assert_eq!(CellColor::for_cell(CellId(1)), CellColor::for_cell(CellId(8)));
        assert_ne!(CellColor::for_cell(CellId(1)), CellColor::for_cell(CellId(2)));
        assert_eq!(CellColor::for_cell(CellId(7)), CellColor::PALETTE[0]);
    }

    // --- Config tests ---

    #[test]
    fn config_defaults() {
        let config = SkeletonConfig::default();
        assert_eq!(config.closing_radius, 1);
        assert!(config.keep_largest_region);
        assert!((config.blocked_cost - 1.0e4).abs() < f64::EPSILON);
        assert_eq!(config.threshold_mode, ThresholdMode::Automatic);
    }

    #[test]
    fn config_deserializes_partial_json() {
        let config: SkeletonConfig = serde_json::from_str(r#"{"closing_radius": 0}"#).unwrap();
        assert_eq!(config.closing_radius, 0);
        assert!(config.keep_largest_region);
    }

    // --- Spacing tests ---

    #[test]
    fn missing_spacing_defaults_to_pixels() {
        assert!((resolve_spacing(None).unwrap() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn non_positive_spacing_rejected() {
        assert_eq!(
            resolve_spacing(Some(0.0)),
            Err(SkeletonError::InvalidSpacing(0.0))
        );
        assert!(resolve_spacing(Some(f64::NAN)).is_err());
    }

    // --- Error tests ---

    #[test]
    fn error_display_mentions_vertex_count() {
        let err = SkeletonError::InvalidContour {
            distinct_vertices: 2,
        };
        assert!(err.to_string().contains("got 2"));
    }

    #[test]
    fn foreground_helpers_agree() {
        let mut img = GrayImage::new(4, 4);
        img.put_pixel(1, 2, image::Luma([FOREGROUND]));
        img.put_pixel(3, 0, image::Luma([FOREGROUND]));
        assert_eq!(count_foreground(&img), 2);
        assert_eq!(
            foreground_pixels(&img),
            vec![Pixel::new(3, 0), Pixel::new(1, 2)]
        );
    }
}
