//! Skeleton endpoint detection by 3×3 hit-or-miss templates.
//!
//! An endpoint is a skeleton pixel with exactly one skeletal neighbour.
//! Each template fixes the centre and one neighbour as foreground and the
//! other seven cells as background; a pixel is an endpoint when any of the
//! eight templates matches exactly. Cells outside the grid count as
//! background.

use image::GrayImage;

use crate::types::Pixel;

/// The eight endpoint templates, rows top to bottom. `1` must be
/// foreground, `0` must be background.
pub const ENDPOINT_TEMPLATES: [[[u8; 3]; 3]; 8] = [
    [[0, 0, 0], [0, 1, 0], [0, 0, 1]],
    [[0, 0, 0], [0, 1, 0], [0, 1, 0]],
    [[0, 0, 0], [0, 1, 0], [1, 0, 0]],
    [[0, 0, 0], [1, 1, 0], [0, 0, 0]],
    [[0, 0, 0], [0, 1, 1], [0, 0, 0]],
    [[1, 0, 0], [0, 1, 0], [0, 0, 0]],
    [[0, 1, 0], [0, 1, 0], [0, 0, 0]],
    [[0, 0, 1], [0, 1, 0], [0, 0, 0]],
];

/// The 3×3 neighbourhood of `(x, y)` as 0/1 cells.
fn window(image: &GrayImage, x: u32, y: u32) -> [[u8; 3]; 3] {
    let mut cells = [[0u8; 3]; 3];
    for (row, dy) in (-1i64..=1).enumerate() {
        for (col, dx) in (-1i64..=1).enumerate() {
            let nx = i64::from(x) + dx;
            let ny = i64::from(y) + dy;
            if let (Ok(nx), Ok(ny)) = (u32::try_from(nx), u32::try_from(ny))
                && nx < image.width()
                && ny < image.height()
                && image.get_pixel(nx, ny).0[0] != 0
            {
                cells[row][col] = 1;
            }
        }
    }
    cells
}

/// Returns `true` if `template` matches the neighbourhood of `(x, y)`.
#[must_use]
pub fn hit_or_miss(image: &GrayImage, x: u32, y: u32, template: &[[u8; 3]; 3]) -> bool {
    window(image, x, y) == *template
}

/// All endpoints of a skeleton, row-major.
///
/// Pixels on the grid edge can be endpoints. This differs from a
/// hit-or-miss transform with a zero border value, which never matches
/// there.
#[must_use]
pub fn find_endpoints(skeleton: &GrayImage) -> Vec<Pixel> {
    skeleton
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] != 0)
        .filter(|&(x, y, _)| {
            ENDPOINT_TEMPLATES
                .iter()
                .any(|t| hit_or_miss(skeleton, x, y, t))
        })
        .map(|(x, y, _)| Pixel::new(x, y))
        .collect()
}
