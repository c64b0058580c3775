//! Minimum-cost pixel routing over a blocked/free cost surface.
//!
//! Paths move between 8-adjacent pixels. Entering a free pixel costs 1 per
//! unit of step length, entering a blocked pixel costs the surface's
//! blocked cost, so a path only leaves the walkable pixels when there is no
//! other way. The search is A* over a `petgraph` grid graph with a
//! straight-line heuristic, which is admissible because no step costs less
//! than its Euclidean length.

use image::GrayImage;
use petgraph::algo::astar;
use petgraph::graph::{NodeIndex, UnGraph};

use crate::types::{Pixel, PixelPath, SkeletonConfig, SkeletonError, foreground_pixels};

/// Which pixels are cheap to walk through.
#[derive(Debug, Clone, PartialEq)]
pub struct CostSurface {
    walkable: GrayImage,
    blocked_cost: f64,
}

impl CostSurface {
    /// Surface where the foreground of `walkable` is free and everything
    /// else is blocked.
    #[must_use]
    pub fn from_walkable(walkable: &GrayImage) -> Self {
        Self {
            walkable: walkable.clone(),
            blocked_cost: SkeletonConfig::DEFAULT_BLOCKED_COST,
        }
    }

    /// Override the cost of entering a blocked pixel.
    #[must_use]
    pub const fn with_blocked_cost(mut self, blocked_cost: f64) -> Self {
        self.blocked_cost = blocked_cost;
        self
    }

    /// Grid width.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.walkable.width()
    }

    /// Grid height.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.walkable.height()
    }

    /// Returns `true` if `pixel` is blocked.
    #[must_use]
    pub fn is_blocked(&self, pixel: Pixel) -> bool {
        self.walkable.get_pixel(pixel.x, pixel.y).0[0] == 0
    }

    fn cost(&self, pixel: Pixel) -> f64 {
        if self.is_blocked(pixel) {
            self.blocked_cost
        } else {
            1.0
        }
    }

    fn check_bounds(&self, pixel: Pixel) -> Result<(), SkeletonError> {
        if pixel.x < self.width() && pixel.y < self.height() {
            Ok(())
        } else {
            Err(SkeletonError::PixelOutOfBounds {
                x: pixel.x,
                y: pixel.y,
                width: self.width(),
                height: self.height(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Grid graph
// ---------------------------------------------------------------------------

/// Rectangular window of the surface that the search runs in.
struct Window {
    x0: u32,
    y0: u32,
    width: u32,
    height: u32,
}

impl Window {
    /// Bounding box of the walkable pixels, `start` and `end`, grown by one
    /// pixel and clipped to the surface.
    fn covering(surface: &CostSurface, start: Pixel, end: Pixel) -> Self {
        let mut pixels = foreground_pixels(&surface.walkable);
        pixels.push(start);
        pixels.push(end);
        let x0 = pixels.iter().map(|p| p.x).min().unwrap_or(0).saturating_sub(1);
        let y0 = pixels.iter().map(|p| p.y).min().unwrap_or(0).saturating_sub(1);
        let x1 = pixels
            .iter()
            .map(|p| p.x)
            .max()
            .unwrap_or(0)
            .saturating_add(1)
            .min(surface.width() - 1);
        let y1 = pixels
            .iter()
            .map(|p| p.y)
            .max()
            .unwrap_or(0)
            .saturating_add(1)
            .min(surface.height() - 1);
        Self {
            x0,
            y0,
            width: x1 - x0 + 1,
            height: y1 - y0 + 1,
        }
    }

    fn node(&self, p: Pixel) -> NodeIndex {
        NodeIndex::new(((p.y - self.y0) * self.width + (p.x - self.x0)) as usize)
    }
}

/// Build the 8-connected grid graph of a window. Node weights are the
/// pixels, edge weights the step cost.
fn build_graph(surface: &CostSurface, window: &Window) -> UnGraph<Pixel, f64> {
    let node_count = (window.width * window.height) as usize;
    let mut graph = UnGraph::<Pixel, f64>::with_capacity(node_count, node_count * 4);
    for y in window.y0..window.y0 + window.height {
        for x in window.x0..window.x0 + window.width {
            graph.add_node(Pixel::new(x, y));
        }
    }

    let x_end = window.x0 + window.width;
    let y_end = window.y0 + window.height;
    for y in window.y0..y_end {
        for x in window.x0..x_end {
            let a = Pixel::new(x, y);
            let forward = [
                (x + 1 < x_end).then(|| Pixel::new(x + 1, y)),
                (y + 1 < y_end).then(|| Pixel::new(x, y + 1)),
                (x + 1 < x_end && y + 1 < y_end).then(|| Pixel::new(x + 1, y + 1)),
                (x > window.x0 && y + 1 < y_end).then(|| Pixel::new(x - 1, y + 1)),
            ];
            for b in forward.into_iter().flatten() {
                let weight = a.distance(b) * f64::midpoint(surface.cost(a), surface.cost(b));
                graph.add_edge(window.node(a), window.node(b), weight);
            }
        }
    }
    graph
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Minimum-cost 8-directional path from `start` to `end`, both inclusive.
///
/// Always succeeds for in-grid endpoints: blocked pixels are expensive,
/// not forbidden. `start == end` yields a one-pixel path.
///
/// # Errors
///
/// Returns [`SkeletonError::PixelOutOfBounds`] when `start` or `end` is
/// outside the surface.
pub fn shortest_path(
    surface: &CostSurface,
    start: Pixel,
    end: Pixel,
) -> Result<PixelPath, SkeletonError> {
    surface.check_bounds(start)?;
    surface.check_bounds(end)?;
    if start == end {
        return Ok(PixelPath::new(vec![start]));
    }

    let window = Window::covering(surface, start, end);
    let graph = build_graph(surface, &window);
    let goal = window.node(end);

    let found = astar(
        &graph,
        window.node(start),
        |n| n == goal,
        |e| *e.weight(),
        |n| graph[n].distance(end),
    );

    // The window is a connected grid containing both endpoints, so the
    // search cannot fail; fall back to the bare endpoints regardless.
    let pixels = found.map_or_else(
        || vec![start, end],
        |(_, nodes)| nodes.into_iter().map(|n| graph[n]).collect(),
    );
    Ok(PixelPath::new(pixels))
}

/// Physical length of a path: sum of step lengths (diagonal steps count
/// √2) times `spacing`.
#[must_use]
pub fn physical_length(path: &PixelPath, spacing: f64) -> f64 {
    path.steps().map(|(a, b)| a.distance(b)).sum::<f64>() * spacing
}
