//! Medial axis transform: binary mask to skeleton plus distance map.
//!
//! The distance map is the exact Euclidean distance from every mask pixel
//! to the nearest background pixel (the grid border counts as background),
//! computed with `imageproc`'s separable squared-distance transform.
//!
//! The skeleton comes from distance-ordered homotopic thinning. Mask pixels
//! are visited from the boundary inwards (ascending distance, ties
//! row-major) and deleted when they are *simple*: removing them changes
//! neither the number of 8-connected foreground components nor the
//! number of 4-connected background components. Local maxima of the
//! distance map ("anchors") pin the ends of branches, so the skeleton
//! retracts to the ridges of the distance map instead of to a point.
//! Sweeps repeat until nothing changes.

use image::{GrayImage, Luma};
use imageproc::distance_transform::euclidean_squared_distance_transform;

use crate::types::{DistanceMap, FOREGROUND, Pixel, foreground_pixels};

/// Offsets of the eight neighbours, clockwise from north. Bit `i` of a
/// neighbourhood code is set when neighbour `i` is foreground.
const RING: [(i64, i64); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

/// Skeleton of a mask with the distance-to-background of each skeleton pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct MedialAxis {
    skeleton: GrayImage,
    distance: DistanceMap,
}

impl MedialAxis {
    /// The 1-pixel-wide, 8-connected skeleton (255 = skeleton).
    #[must_use]
    pub const fn skeleton(&self) -> &GrayImage {
        &self.skeleton
    }

    /// Distance to background on skeleton pixels, zero elsewhere.
    #[must_use]
    pub const fn distance(&self) -> &DistanceMap {
        &self.distance
    }

    /// Largest distance value on the skeleton (0 for an empty skeleton).
    #[must_use]
    pub fn max_distance(&self) -> f64 {
        self.distance.pixels().map(|p| p.0[0]).fold(0.0, f64::max)
    }
}

/// Exact Euclidean distance from each foreground pixel of `mask` to the
/// nearest background pixel. Background pixels map to 0.
#[must_use]
pub fn distance_transform(mask: &GrayImage) -> DistanceMap {
    let (width, height) = mask.dimensions();

    // One pixel of background all round, so distances stay finite and the
    // grid edge behaves like background.
    let sites = GrayImage::from_fn(width + 2, height + 2, |x, y| {
        let inside = x >= 1
            && y >= 1
            && x <= width
            && y <= height
            && mask.get_pixel(x - 1, y - 1).0[0] != 0;
        Luma([if inside { 0 } else { FOREGROUND }])
    });
    let squared = euclidean_squared_distance_transform(&sites);

    DistanceMap::from_fn(width, height, |x, y| {
        if mask.get_pixel(x, y).0[0] == 0 {
            Luma([0.0])
        } else {
            Luma([squared.get_pixel(x + 1, y + 1).0[0].sqrt()])
        }
    })
}

/// Compute the medial axis of a binary mask.
#[must_use]
pub fn medial_axis(mask: &GrayImage) -> MedialAxis {
    let full_distance = distance_transform(mask);
    let skeleton = thin(mask, &full_distance);

    let distance = DistanceMap::from_fn(mask.width(), mask.height(), |x, y| {
        if skeleton.get_pixel(x, y).0[0] == 0 {
            Luma([0.0])
        } else {
            *full_distance.get_pixel(x, y)
        }
    });

    tracing::debug!(
        skeleton_pixels = foreground_pixels(&skeleton).len(),
        "medial axis computed"
    );

    MedialAxis { skeleton, distance }
}

/// Binary occupancy grid used during thinning.
struct Grid {
    width: u32,
    height: u32,
    cells: Vec<bool>,
}

impl Grid {
    fn from_mask(mask: &GrayImage) -> Self {
        Self {
            width: mask.width(),
            height: mask.height(),
            cells: mask.pixels().map(|p| p.0[0] != 0).collect(),
        }
    }

    const fn index(&self, p: Pixel) -> usize {
        p.y as usize * self.width as usize + p.x as usize
    }

    fn get(&self, x: i64, y: i64) -> bool {
        match (u32::try_from(x), u32::try_from(y)) {
            (Ok(x), Ok(y)) if x < self.width && y < self.height => {
                self.cells[self.index(Pixel::new(x, y))]
            }
            _ => false,
        }
    }

    /// Neighbourhood code of `p`, one bit per [`RING`] position.
    fn code(&self, p: Pixel) -> u8 {
        let (x, y) = (i64::from(p.x), i64::from(p.y));
        RING.iter()
            .enumerate()
            .filter(|(_, (dx, dy))| self.get(x + dx, y + dy))
            .fold(0u8, |code, (i, _)| code | (1 << i))
    }
}

/// Thin `mask` to its skeleton, guided by `distance`.
fn thin(mask: &GrayImage, distance: &DistanceMap) -> GrayImage {
    let mut grid = Grid::from_mask(mask);
    let simple = simple_point_table();
    let depth = |p: Pixel| distance.get_pixel(p.x, p.y).0[0];

    let anchors: Vec<bool> = (0..grid.height)
        .flat_map(|y| (0..grid.width).map(move |x| Pixel::new(x, y)))
        .map(|p| {
            grid.cells[grid.index(p)]
                && p.neighbors(grid.width, grid.height)
                    .all(|q| depth(q) <= depth(p))
        })
        .collect();

    let mut order = foreground_pixels(mask);
    order.sort_by(|a, b| depth(*a).total_cmp(&depth(*b)).then(a.cmp(b)));

    loop {
        let mut removed = 0usize;
        for &p in &order {
            let index = grid.index(p);
            if !grid.cells[index] {
                continue;
            }
            let code = grid.code(p);
            if !simple[usize::from(code)] {
                continue;
            }
            if anchors[index] {
                // An anchor may only go when it is redundant along a
                // plateau of anchors, never when it is a branch tip.
                let (x, y) = (i64::from(p.x), i64::from(p.y));
                let beside_anchor = RING.iter().any(|(dx, dy)| {
                    grid.get(x + dx, y + dy)
                        && u32::try_from(x + dx)
                            .ok()
                            .zip(u32::try_from(y + dy).ok())
                            .is_some_and(|(nx, ny)| anchors[grid.index(Pixel::new(nx, ny))])
                });
                if code.count_ones() <= 1 || !beside_anchor {
                    continue;
                }
            }
            grid.cells[index] = false;
            removed += 1;
        }
        if removed == 0 {
            break;
        }
        order.retain(|p| grid.cells[grid.index(*p)]);
    }

    GrayImage::from_fn(grid.width, grid.height, |x, y| {
        Luma([if grid.cells[grid.index(Pixel::new(x, y))] {
            FOREGROUND
        } else {
            0
        }])
    })
}

/// Lookup table: `table[code]` is `true` when a foreground pixel with
/// neighbourhood `code` is simple (8-connected foreground, 4-connected
/// background).
fn simple_point_table() -> [bool; 256] {
    let mut table = [false; 256];
    for (code, entry) in table.iter_mut().enumerate() {
        let foreground: Vec<usize> = (0..8).filter(|i| code & (1 << i) != 0).collect();
        let background: Vec<usize> = (0..8).filter(|i| code & (1 << i) == 0).collect();

        let fg_groups = groups(&foreground, |a, b| {
            let (ax, ay) = RING[a];
            let (bx, by) = RING[b];
            (ax - bx).abs() <= 1 && (ay - by).abs() <= 1
        });
        let bg_groups = groups(&background, |a, b| {
            let (ax, ay) = RING[a];
            let (bx, by) = RING[b];
            (ax - bx).abs() + (ay - by).abs() == 1
        });
        // Only background groups touching the centre through an edge count.
        let bg_touching = bg_groups
            .iter()
            .filter(|g| g.iter().any(|i| i % 2 == 0))
            .count();

        *entry = fg_groups.len() == 1 && bg_touching == 1;
    }
    table
}

/// Partition ring positions into connected groups under `adjacent`.
fn groups(members: &[usize], adjacent: impl Fn(usize, usize) -> bool) -> Vec<Vec<usize>> {
    let mut seen = [false; 8];
    let mut result = Vec::new();
    for &start in members {
        if seen[start] {
            continue;
        }
        seen[start] = true;
        let mut group = vec![start];
        let mut cursor = 0;
        while cursor < group.len() {
            let current = group[cursor];
            for &other in members {
                if !seen[other] && adjacent(current, other) {
                    seen[other] = true;
                    group.push(other);
                }
            }
            cursor += 1;
        }
        result.push(group);
    }
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::components::label_components;

    fn filled(width: u32, height: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            Luma([if (x0..=x1).contains(&x) && (y0..=y1).contains(&y) {
                FOREGROUND
            } else {
                0
            }])
        })
    }

    // --- Simple point table ---

    #[test]
    fn isolated_and_interior_points_are_not_simple() {
        let table = simple_point_table();
        assert!(!table[0b0000_0000]);
        assert!(!table[0b1111_1111]);
    }

    #[test]
    fn line_interior_is_not_simple() {
        let table = simple_point_table();
        // North and south neighbours only.
        assert!(!table[0b0001_0001]);
    }

    #[test]
    fn tip_and_corner_are_simple() {
        let table = simple_point_table();
        // Single east neighbour.
        assert!(table[0b0000_0100]);
        // East, south-east and south.
        assert!(table[0b0001_1100]);
    }

    // --- Distance transform ---

    #[test]
    fn distance_of_bar_cross_section() {
        let mask = filled(20, 10, 2, 5, 17, 7);
        let d = distance_transform(&mask);
        assert!((d.get_pixel(8, 6).0[0] - 2.0).abs() < 1e-12);
        assert!((d.get_pixel(8, 5).0[0] - 1.0).abs() < 1e-12);
        assert!((d.get_pixel(2, 6).0[0] - 1.0).abs() < 1e-12);
        assert!(d.get_pixel(0, 0).0[0].abs() < 1e-12);
    }

    #[test]
    fn mask_touching_grid_edge_has_finite_distance() {
        let mask = filled(6, 6, 0, 0, 5, 5);
        let d = distance_transform(&mask);
        assert!((d.get_pixel(0, 0).0[0] - 1.0).abs() < 1e-12);
        assert!((d.get_pixel(2, 2).0[0] - 3.0).abs() < 1e-12);
    }

    // --- Skeleton ---

    #[test]
    fn empty_mask_has_empty_skeleton() {
        let axis = medial_axis(&GrayImage::new(8, 8));
        assert!(foreground_pixels(axis.skeleton()).is_empty());
        assert!(axis.max_distance().abs() < f64::EPSILON);
    }

    #[test]
    fn bar_thins_to_centre_row() {
        let axis = medial_axis(&filled(20, 10, 2, 5, 17, 7));
        let pixels = foreground_pixels(axis.skeleton());
        let expected: Vec<Pixel> = (3..=16).map(|x| Pixel::new(x, 6)).collect();
        assert_eq!(pixels, expected);
        assert!((axis.max_distance() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn distance_is_zero_off_skeleton() {
        let axis = medial_axis(&filled(20, 10, 2, 5, 17, 7));
        assert!(axis.distance().get_pixel(8, 5).0[0].abs() < f64::EPSILON);
        assert!(axis.distance().get_pixel(8, 6).0[0] > 0.0);
    }

    #[test]
    fn square_keeps_its_centre() {
        let axis = medial_axis(&filled(30, 30, 5, 5, 25, 25));
        assert_ne!(axis.skeleton().get_pixel(15, 15).0[0], 0);
        assert_eq!(label_components(axis.skeleton()).len(), 1);
    }

    #[test]
    fn skeleton_preserves_component_count() {
        let mut mask = filled(40, 20, 2, 2, 12, 12);
        for y in 4..=10 {
            for x in 20..=35 {
                mask.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
        let axis = medial_axis(&mask);
        assert_eq!(label_components(axis.skeleton()).len(), 2);
    }

    #[test]
    fn plus_shape_reaches_every_arm() {
        let mut mask = filled(41, 41, 17, 4, 23, 36);
        for y in 17..=23 {
            for x in 4..=36 {
                mask.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
        let axis = medial_axis(&mask);
        let pixels = foreground_pixels(axis.skeleton());

        assert_eq!(label_components(axis.skeleton()).len(), 1);
        assert!(pixels.iter().any(|p| p.x <= 10));
        assert!(pixels.iter().any(|p| p.x >= 30));
        assert!(pixels.iter().any(|p| p.y <= 10));
        assert!(pixels.iter().any(|p| p.y >= 30));
        assert!(pixels.len() < 150, "skeleton too large: {}", pixels.len());

        // One pixel wide: no 2x2 block survives.
        for p in &pixels {
            let block = [(p.x + 1, p.y), (p.x, p.y + 1), (p.x + 1, p.y + 1)];
            assert!(
                !block
                    .iter()
                    .all(|&(x, y)| x < 41 && y < 41 && axis.skeleton().get_pixel(x, y).0[0] != 0),
                "2x2 block at {p:?}"
            );
        }
    }

    #[test]
    fn medial_axis_is_deterministic() {
        let mask = filled(30, 30, 3, 8, 26, 20);
        assert_eq!(medial_axis(&mask), medial_axis(&mask));
    }
}
