//! 8-connected component labeling with a deterministic component order.
//!
//! Labeling itself is delegated to
//! `imageproc::region_labelling::connected_components`. Components are
//! then re-ordered by the row-major position of their first pixel, so the
//! order (and every id derived from it) does not depend on the labeler's
//! internal numbering.

use std::collections::{HashMap, HashSet};

use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};

use crate::types::{FOREGROUND, Pixel};

/// One 8-connected foreground component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Pixels of the component, row-major.
    pub pixels: Vec<Pixel>,
}

impl Component {
    /// Number of pixels (the component's area in pixel units).
    #[must_use]
    pub const fn area(&self) -> usize {
        self.pixels.len()
    }

    /// The first pixel in row-major order.
    #[must_use]
    pub fn first(&self) -> Option<Pixel> {
        self.pixels.first().copied()
    }

    /// Render this component alone onto a blank raster.
    #[must_use]
    pub fn to_image(&self, width: u32, height: u32) -> GrayImage {
        let mut image = GrayImage::new(width, height);
        for p in &self.pixels {
            image.put_pixel(p.x, p.y, Luma([FOREGROUND]));
        }
        image
    }

    /// Region perimeter estimate.
    ///
    /// Border pixels are foreground pixels with at least one background
    /// 4-neighbour. Each border pixel is weighted by the arrangement of
    /// border pixels around it: straight runs count 1, diagonal runs √2,
    /// corners (1 + √2) / 2. A single isolated pixel has perimeter 0.
    #[must_use]
    pub fn perimeter(&self) -> f64 {
        let members: HashSet<Pixel> = self.pixels.iter().copied().collect();
        let contains = |x: i64, y: i64| -> bool {
            u32::try_from(x)
                .ok()
                .zip(u32::try_from(y).ok())
                .is_some_and(|(x, y)| members.contains(&Pixel::new(x, y)))
        };

        let border: HashSet<Pixel> = self
            .pixels
            .iter()
            .copied()
            .filter(|p| {
                let (x, y) = (i64::from(p.x), i64::from(p.y));
                !(contains(x - 1, y)
                    && contains(x + 1, y)
                    && contains(x, y - 1)
                    && contains(x, y + 1))
            })
            .collect();
        let is_border = |x: i64, y: i64| -> bool {
            u32::try_from(x)
                .ok()
                .zip(u32::try_from(y).ok())
                .is_some_and(|(x, y)| border.contains(&Pixel::new(x, y)))
        };

        border
            .iter()
            .map(|p| {
                let (x, y) = (i64::from(p.x), i64::from(p.y));
                let orthogonal = [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)]
                    .into_iter()
                    .filter(|&(nx, ny)| is_border(nx, ny))
                    .count();
                let diagonal = [(x - 1, y - 1), (x + 1, y - 1), (x - 1, y + 1), (x + 1, y + 1)]
                    .into_iter()
                    .filter(|&(nx, ny)| is_border(nx, ny))
                    .count();
                perimeter_weight(1 + 2 * orthogonal + 10 * diagonal)
            })
            .sum()
    }
}

/// Weight of one border pixel given its neighbourhood code
/// (`1 + 2·orthogonal + 10·diagonal` border neighbours).
fn perimeter_weight(code: usize) -> f64 {
    match code {
        5 | 7 | 15 | 17 | 25 | 27 => 1.0,
        21 | 33 => std::f64::consts::SQRT_2,
        13 | 23 => f64::midpoint(1.0, std::f64::consts::SQRT_2),
        _ => 0.0,
    }
}

/// Label the 8-connected foreground components of a binary raster.
///
/// Components are returned ordered by the row-major position of their
/// first pixel.
#[must_use]
pub fn label_components(image: &GrayImage) -> Vec<Component> {
    let labels = connected_components(image, Connectivity::Eight, Luma([0u8]));

    let mut order: HashMap<u32, usize> = HashMap::new();
    let mut components: Vec<Component> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label.0[0];
        if label == 0 {
            continue;
        }
        let index = *order.entry(label).or_insert_with(|| {
            components.push(Component { pixels: Vec::new() });
            components.len() - 1
        });
        components[index].pixels.push(Pixel::new(x, y));
    }

    components
}

/// Keep only the largest component of a binary raster.
///
/// Ties go to the component that comes first in row-major order. An
/// empty raster is returned unchanged.
#[must_use]
pub fn keep_largest(image: &GrayImage) -> GrayImage {
    let components = label_components(image);
    let mut best: Option<&Component> = None;
    for component in &components {
        if best.is_none_or(|b| component.area() > b.area()) {
            best = Some(component);
        }
    }
    best.map_or_else(
        || image.clone(),
        |c| c.to_image(image.width(), image.height()),
    )
}
