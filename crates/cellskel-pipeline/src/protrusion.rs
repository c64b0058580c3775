//! Body paths and protrusion extraction.
//!
//! The body gets one path from its first endpoint (the reference) to each
//! of its other endpoints. Every 8-connected branch component becomes one
//! protrusion: a path is routed from the point where it attaches to the
//! body out to each of its free tips. The longest of those is the
//! protrusion's primary path; the rest are secondary.

use std::collections::HashSet;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::components::label_components;
use crate::endpoints::find_endpoints;
use crate::route::{CostSurface, physical_length, shortest_path};
use crate::types::{Pixel, PixelPath, SkeletonError, foreground_pixels};

// ---------------------------------------------------------------------------
// Skeleton node ids
// ---------------------------------------------------------------------------

/// Row-major enumeration of skeleton pixels. A pixel's node id is its
/// index in this enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkeletonGraph {
    nodes: Vec<Pixel>,
}

impl SkeletonGraph {
    /// Enumerate the pixels of a skeleton.
    #[must_use]
    pub fn from_skeleton(skeleton: &GrayImage) -> Self {
        Self {
            nodes: foreground_pixels(skeleton),
        }
    }

    /// Node id of a skeleton pixel, `None` if the pixel is not on the
    /// skeleton.
    #[must_use]
    pub fn node_id(&self, pixel: Pixel) -> Option<usize> {
        self.nodes.binary_search(&pixel).ok()
    }

    /// Pixel of a node id.
    #[must_use]
    pub fn pixel(&self, node_id: usize) -> Option<Pixel> {
        self.nodes.get(node_id).copied()
    }

    /// Number of skeleton pixels.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the skeleton is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Body
// ---------------------------------------------------------------------------

/// Paths across the body sub-skeleton.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BodyPaths {
    /// Body endpoints, row-major. The first is the reference endpoint.
    pub endpoints: Vec<Pixel>,
    /// Path from the reference endpoint to each other endpoint.
    pub paths: Vec<PixelPath>,
    /// Physical length of each path, 1:1 with `paths`.
    pub lengths: Vec<f64>,
}

/// Route the body's paths.
///
/// # Errors
///
/// Only fails if routing does, which cannot happen for endpoints found on
/// `body` itself.
pub fn trace_body(
    body: &GrayImage,
    spacing: f64,
    blocked_cost: f64,
) -> Result<BodyPaths, SkeletonError> {
    let endpoints = find_endpoints(body);
    let surface = CostSurface::from_walkable(body).with_blocked_cost(blocked_cost);

    let mut paths = Vec::new();
    let mut lengths = Vec::new();
    if let Some((&reference, rest)) = endpoints.split_first() {
        for &end in rest {
            let path = shortest_path(&surface, reference, end)?;
            lengths.push(physical_length(&path, spacing));
            paths.push(path);
        }
    }

    Ok(BodyPaths {
        endpoints,
        paths,
        lengths,
    })
}

// ---------------------------------------------------------------------------
// Protrusions
// ---------------------------------------------------------------------------

/// A routed path from a protrusion's attachment point to one free tip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracedPath {
    /// Pixels from the attachment point to the tip, inclusive.
    pub path: PixelPath,
    /// Physical length of `path`.
    pub length: f64,
    /// The free tip the path ends at.
    pub endpoint: Pixel,
    /// Node id of the tip in the full skeleton.
    pub endpoint_node_id: Option<usize>,
}

/// One branch component of the skeleton.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Protrusion {
    /// 1-based id, in row-major order of each component's first pixel.
    pub id: u32,
    /// Pixels of the component, row-major.
    pub pixels: Vec<Pixel>,
    /// Where the component meets the body.
    pub attachment: Option<Pixel>,
    /// Node id of the attachment point in the full skeleton.
    pub attachment_node_id: Option<usize>,
    /// The longest traced path. `None` for degenerate components.
    pub primary: Option<TracedPath>,
    /// All other traced paths, in tip order. Each is no longer than
    /// `primary`.
    pub secondary: Vec<TracedPath>,
}

impl Protrusion {
    /// Length of the primary path, if any.
    #[must_use]
    pub fn length(&self) -> Option<f64> {
        self.primary.as_ref().map(|p| p.length)
    }

    /// Number of traced paths (primary plus secondary).
    #[must_use]
    pub fn path_count(&self) -> usize {
        usize::from(self.primary.is_some()) + self.secondary.len()
    }

    /// All traced paths, primary first.
    pub fn paths(&self) -> impl Iterator<Item = &TracedPath> {
        self.primary.iter().chain(self.secondary.iter())
    }
}

/// Every protrusion of a cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProtrusionSet {
    /// Protrusions in id order.
    pub protrusions: Vec<Protrusion>,
    /// Physical length of the union of all traced paths.
    pub total_length: f64,
    /// Non-fatal problems found while tracing.
    pub issues: Vec<SkeletonError>,
}

impl ProtrusionSet {
    /// Number of protrusions.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.protrusions.len()
    }

    /// Returns `true` if there are no protrusions.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.protrusions.is_empty()
    }

    /// Primary path lengths of the protrusions that have one, in id order.
    #[must_use]
    pub fn primary_lengths(&self) -> Vec<f64> {
        self.protrusions.iter().filter_map(Protrusion::length).collect()
    }

    /// Total number of traced paths.
    #[must_use]
    pub fn path_count(&self) -> usize {
        self.protrusions.iter().map(Protrusion::path_count).sum()
    }
}

/// Returns `true` if any 8-neighbour of `p` is foreground in `image`.
fn touches(image: &GrayImage, p: Pixel) -> bool {
    p.neighbors(image.width(), image.height())
        .any(|q| image.get_pixel(q.x, q.y).0[0] != 0)
}

/// Extract the protrusions of a partitioned skeleton.
///
/// For each branch component, the attachment point is the first component
/// endpoint that is not an endpoint of the whole skeleton; if there is
/// none, the first component pixel touching the body is used. Free tips
/// are the component endpoints that are also endpoints of the whole
/// skeleton. Components with no attachment point or no free tip are
/// reported in [`ProtrusionSet::issues`] and get no paths.
///
/// # Errors
///
/// Only fails if routing does, which cannot happen for pixels taken from
/// the skeleton itself.
pub fn extract_protrusions(
    skeleton: &GrayImage,
    body: &GrayImage,
    branches: &GrayImage,
    spacing: f64,
    blocked_cost: f64,
) -> Result<ProtrusionSet, SkeletonError> {
    let (width, height) = skeleton.dimensions();
    let graph = SkeletonGraph::from_skeleton(skeleton);
    let skeleton_endpoints: HashSet<Pixel> = find_endpoints(skeleton).into_iter().collect();

    let mut protrusions = Vec::new();
    let mut issues = Vec::new();

    for (index, component) in label_components(branches).into_iter().enumerate() {
        let id = u32::try_from(index + 1).unwrap_or(u32::MAX);
        let image = component.to_image(width, height);
        let ends = find_endpoints(&image);

        let attachment = ends
            .iter()
            .copied()
            .find(|p| !skeleton_endpoints.contains(p))
            .or_else(|| component.pixels.iter().copied().find(|&p| touches(body, p)));
        let tips: Vec<Pixel> = ends
            .iter()
            .copied()
            .filter(|p| skeleton_endpoints.contains(p) && Some(*p) != attachment)
            .collect();

        let mut traced = Vec::new();
        match attachment {
            Some(start) if !tips.is_empty() => {
                let surface = CostSurface::from_walkable(&image).with_blocked_cost(blocked_cost);
                for &tip in &tips {
                    let path = shortest_path(&surface, start, tip)?;
                    traced.push(TracedPath {
                        length: physical_length(&path, spacing),
                        path,
                        endpoint: tip,
                        endpoint_node_id: graph.node_id(tip),
                    });
                }
            }
            _ => {
                let issue = SkeletonError::DegenerateComponent { protrusion_id: id };
                tracing::warn!(%issue, pixels = component.area(), "degenerate branch component");
                issues.push(issue);
            }
        }

        let mut best: Option<usize> = None;
        for (i, t) in traced.iter().enumerate() {
            if best.is_none_or(|b| t.length > traced[b].length) {
                best = Some(i);
            }
        }
        let primary = best.map(|i| traced.remove(i));

        protrusions.push(Protrusion {
            id,
            pixels: component.pixels,
            attachment,
            attachment_node_id: attachment.and_then(|p| graph.node_id(p)),
            primary,
            secondary: traced,
        });
    }

    let total_length = union_length(&protrusions, spacing);
    tracing::debug!(
        protrusions = protrusions.len(),
        total_length,
        "protrusions extracted"
    );

    Ok(ProtrusionSet {
        protrusions,
        total_length,
        issues,
    })
}

/// Physical length of the union of every traced path, each pixel step
/// counted once.
fn union_length(protrusions: &[Protrusion], spacing: f64) -> f64 {
    let mut steps: HashSet<(Pixel, Pixel)> = HashSet::new();
    for traced in protrusions.iter().flat_map(Protrusion::paths) {
        for (a, b) in traced.path.steps() {
            steps.insert(if a < b { (a, b) } else { (b, a) });
        }
    }
    steps.iter().map(|(a, b)| a.distance(*b)).sum::<f64>() * spacing
}
