//! Contacts between cells in the same frame.
//!
//! When a cell is finalized its mask is intersected with the mask of every
//! cell already present in the frame. Each 8-connected overlap region
//! becomes one [`Connection`], located at the region's centroid.
//!
//! Detection is one-directional: a new cell is compared against the cells
//! that existed before it, so each pair is recorded once, under the later
//! cell's id as `cell_id_a`.

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

use crate::components::label_components;
use crate::types::{CellId, FOREGROUND};

/// One overlap region between two cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Frame both cells belong to.
    pub frame_index: u32,
    /// The newly finalized cell.
    pub cell_id_a: CellId,
    /// The pre-existing cell it overlaps.
    pub cell_id_b: CellId,
    /// Centroid column of the overlap region.
    pub center_x: f64,
    /// Centroid row of the overlap region.
    pub center_y: f64,
}

/// Pixel-wise AND of two masks over their common extent.
#[must_use]
pub fn intersect_masks(a: &GrayImage, b: &GrayImage) -> GrayImage {
    let width = a.width().min(b.width());
    let height = a.height().min(b.height());
    GrayImage::from_fn(width, height, |x, y| {
        let both = a.get_pixel(x, y).0[0] != 0 && b.get_pixel(x, y).0[0] != 0;
        Luma([if both { FOREGROUND } else { 0 }])
    })
}

/// Find the connections between a new cell and the cells already in its
/// frame.
///
/// Records come out grouped by existing cell (in the order given), then by
/// overlap region in row-major order of the region's first pixel.
#[must_use]
pub fn detect_connections<'a>(
    frame_index: u32,
    new_cell_id: CellId,
    new_mask: &GrayImage,
    existing: impl IntoIterator<Item = (CellId, &'a GrayImage)>,
) -> Vec<Connection> {
    let mut connections = Vec::new();
    for (other_id, other_mask) in existing {
        let overlap = intersect_masks(new_mask, other_mask);
        for region in label_components(&overlap) {
            #[allow(clippy::cast_precision_loss)]
            let count = region.area() as f64;
            let sum_x: f64 = region.pixels.iter().map(|p| f64::from(p.x)).sum();
            let sum_y: f64 = region.pixels.iter().map(|p| f64::from(p.y)).sum();
            let connection = Connection {
                frame_index,
                cell_id_a: new_cell_id,
                cell_id_b: other_id,
                center_x: sum_x / count,
                center_y: sum_y / count,
            };
            tracing::info!(
                frame = frame_index,
                a = %connection.cell_id_a,
                b = %connection.cell_id_b,
                x = connection.center_x,
                y = connection.center_y,
                "cell connection recorded"
            );
            connections.push(connection);
        }
    }
    connections
}
