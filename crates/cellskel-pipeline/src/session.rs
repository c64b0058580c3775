//! A multi-cell analysis session.
//!
//! [`Analysis`] owns every finalized cell of one image stack together with
//! the log of cell-to-cell connections. Ids are handed out in
//! finalization order starting at 1; a failed finalization consumes no id
//! and leaves the session unchanged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cell::{self, CellShape};
use crate::connectivity::{Connection, detect_connections};
use crate::pipeline::{CellGeometry, process};
use crate::types::{CellId, Dimensions, Point, SkeletonConfig, SkeletonError, resolve_spacing};

/// Per-cell figures for tabular reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSummary {
    /// Cell id.
    pub cell_id: CellId,
    /// Frame the cell was drawn on.
    pub frame_index: u32,
    /// Contour area divided by the pixel area.
    pub area: f64,
    /// Number of protrusions.
    pub protrusion_count: usize,
    /// Primary protrusion lengths, in protrusion id order.
    pub primary_lengths: Vec<f64>,
    /// Physical length of the union of all protrusion paths.
    pub total_protrusion_length: f64,
    /// Current body threshold.
    pub threshold: f64,
    /// Upper bound of the body threshold.
    pub max_threshold: f64,
    /// Physical length of one pixel.
    pub physical_spacing: f64,
}

impl CellSummary {
    /// Summarize one cell.
    #[must_use]
    pub fn of(cell: &CellShape) -> Self {
        let body = &cell.skeleton.body;
        let protrusions = &cell.skeleton.protrusions;
        Self {
            cell_id: cell.id,
            frame_index: cell.frame_index,
            area: cell.area,
            protrusion_count: protrusions.len(),
            primary_lengths: protrusions.primary_lengths(),
            total_protrusion_length: protrusions.total_length,
            threshold: body.threshold,
            max_threshold: body.max_threshold,
            physical_spacing: body.physical_spacing,
        }
    }
}

/// Cells and connections of one image stack.
#[derive(Debug, Clone)]
pub struct Analysis {
    dimensions: Dimensions,
    config: SkeletonConfig,
    /// Cell `n` lives at index `n - 1`.
    cells: Vec<CellShape>,
    frames: BTreeMap<u32, Vec<CellId>>,
    connections: Vec<Connection>,
}

impl Analysis {
    /// Start an empty session for frames of the given size.
    #[must_use]
    pub const fn new(dimensions: Dimensions, config: SkeletonConfig) -> Self {
        Self {
            dimensions,
            config,
            cells: Vec::new(),
            frames: BTreeMap::new(),
            connections: Vec::new(),
        }
    }

    /// Frame size every contour is rasterized into.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Pipeline configuration used for new cells.
    #[must_use]
    pub const fn config(&self) -> &SkeletonConfig {
        &self.config
    }

    /// Id the next finalized cell will receive.
    #[must_use]
    pub fn next_id(&self) -> CellId {
        let next = u32::try_from(self.cells.len()).map_or(u32::MAX, |n| n.saturating_add(1));
        CellId(next)
    }

    /// Skeletonize a contour and add it to the session.
    ///
    /// The new cell is compared against every cell already on the same
    /// frame and any overlaps are appended to the connection log.
    ///
    /// # Errors
    ///
    /// Returns the pipeline error if the contour cannot be processed. The
    /// session is not modified in that case.
    pub fn finalize_cell(
        &mut self,
        contour: Vec<Point>,
        frame_index: u32,
        physical_spacing: Option<f64>,
    ) -> Result<CellId, SkeletonError> {
        let spacing = resolve_spacing(physical_spacing)?;
        let geometry = process(contour, self.dimensions, spacing, &self.config)?;
        Ok(self.insert_cell(geometry, frame_index))
    }

    /// Add already computed geometry as a new cell.
    pub fn insert_cell(&mut self, geometry: CellGeometry, frame_index: u32) -> CellId {
        let id = self.next_id();
        let shape = CellShape::from_geometry(id, frame_index, geometry);

        let found = detect_connections(
            frame_index,
            id,
            &shape.mask,
            self.cells_in_frame(frame_index).map(|c| (c.id, &c.mask)),
        );

        tracing::info!(
            cell = %id,
            frame = frame_index,
            area = shape.area,
            protrusions = shape.skeleton.protrusions.len(),
            connections = found.len(),
            "cell finalized"
        );

        self.connections.extend(found);
        self.frames.entry(frame_index).or_default().push(id);
        self.cells.push(shape);
        id
    }

    /// Re-cut a cell's body at a new threshold, replacing it in place.
    ///
    /// # Errors
    ///
    /// Returns [`SkeletonError::UnknownCell`] if no cell has this id.
    pub fn adjust_body_threshold(
        &mut self,
        id: CellId,
        threshold: f64,
    ) -> Result<&CellShape, SkeletonError> {
        let index = self.index(id).ok_or(SkeletonError::UnknownCell(id))?;
        let updated = cell::adjust_body_threshold(&self.cells[index], threshold)?;
        self.cells[index] = updated;
        Ok(&self.cells[index])
    }

    /// Look up a cell.
    #[must_use]
    pub fn cell(&self, id: CellId) -> Option<&CellShape> {
        self.index(id).map(|i| &self.cells[i])
    }

    /// All cells in id order.
    #[must_use]
    pub fn cells(&self) -> &[CellShape] {
        &self.cells
    }

    /// Cells on one frame, in id order.
    pub fn cells_in_frame(&self, frame_index: u32) -> impl Iterator<Item = &CellShape> {
        self.frames
            .get(&frame_index)
            .into_iter()
            .flatten()
            .filter_map(move |&id| self.cell(id))
    }

    /// Every connection, in the order it was recorded.
    #[must_use]
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Connections recorded on one frame.
    pub fn connections_in_frame(&self, frame_index: u32) -> impl Iterator<Item = &Connection> {
        self.connections
            .iter()
            .filter(move |c| c.frame_index == frame_index)
    }

    /// Summary rows for every cell, in id order.
    #[must_use]
    pub fn summaries(&self) -> Vec<CellSummary> {
        self.cells.iter().map(CellSummary::of).collect()
    }

    fn index(&self, id: CellId) -> Option<usize> {
        let index = usize::try_from(id.0).ok()?.checked_sub(1)?;
        (index < self.cells.len()).then_some(index)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const DIMS: Dimensions = Dimensions {
        width: 40,
        height: 40,
    };

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ]
    }

    fn session() -> Analysis {
        Analysis::new(DIMS, SkeletonConfig::default())
    }

    // --- ids ---

    #[test]
    fn ids_start_at_one_and_increase() {
        let mut analysis = session();
        let a = analysis.finalize_cell(rect(2.0, 2.0, 12.0, 8.0), 0, None).unwrap();
        let b = analysis.finalize_cell(rect(20.0, 20.0, 30.0, 26.0), 1, None).unwrap();
        assert_eq!(a, CellId(1));
        assert_eq!(b, CellId(2));
        assert_eq!(analysis.cell(b).unwrap().frame_index, 1);
    }

    #[test]
    fn failed_finalize_changes_nothing() {
        let mut analysis = session();
        analysis.finalize_cell(rect(2.0, 2.0, 12.0, 8.0), 0, None).unwrap();
        let err = analysis
            .finalize_cell(vec![Point::new(1.0, 1.0)], 0, None)
            .unwrap_err();
        assert!(matches!(err, SkeletonError::InvalidContour { .. }));
        let err = analysis
            .finalize_cell(rect(2.0, 2.0, 12.0, 8.0), 0, Some(-1.0))
            .unwrap_err();
        assert_eq!(err, SkeletonError::InvalidSpacing(-1.0));

        assert_eq!(analysis.cells().len(), 1);
        assert_eq!(analysis.next_id(), CellId(2));
        let next = analysis.finalize_cell(rect(20.0, 20.0, 30.0, 26.0), 0, None).unwrap();
        assert_eq!(next, CellId(2));
    }

    // --- connections ---

    #[test]
    fn overlapping_cells_on_one_frame_connect() {
        let mut analysis = session();
        let first = analysis.finalize_cell(rect(2.0, 2.0, 16.0, 12.0), 0, None).unwrap();
        let second = analysis.finalize_cell(rect(10.0, 2.0, 24.0, 12.0), 0, None).unwrap();
        let connections = analysis.connections();
        assert_eq!(connections.len(), 1);
        assert_eq!(connections[0].cell_id_a, second);
        assert_eq!(connections[0].cell_id_b, first);
        assert_eq!(analysis.connections_in_frame(0).count(), 1);
    }

    #[test]
    fn overlap_on_another_frame_is_ignored() {
        let mut analysis = session();
        analysis.finalize_cell(rect(2.0, 2.0, 16.0, 12.0), 0, None).unwrap();
        analysis.finalize_cell(rect(10.0, 2.0, 24.0, 12.0), 1, None).unwrap();
        assert!(analysis.connections().is_empty());
        assert_eq!(analysis.cells_in_frame(0).count(), 1);
        assert_eq!(analysis.cells_in_frame(1).count(), 1);
        assert_eq!(analysis.cells_in_frame(2).count(), 0);
    }

    // --- threshold ---

    #[test]
    fn adjust_unknown_cell_fails() {
        let mut analysis = session();
        assert_eq!(
            analysis.adjust_body_threshold(CellId(1), 1.0).unwrap_err(),
            SkeletonError::UnknownCell(CellId(1))
        );
        assert_eq!(
            analysis.adjust_body_threshold(CellId(0), 1.0).unwrap_err(),
            SkeletonError::UnknownCell(CellId(0))
        );
    }

    #[test]
    fn adjust_replaces_cell_in_place() {
        let mut analysis = session();
        let id = analysis.finalize_cell(rect(2.0, 2.0, 30.0, 12.0), 0, None).unwrap();
        let max = analysis.cell(id).unwrap().skeleton.body.max_threshold;
        let threshold = analysis.adjust_body_threshold(id, max).unwrap().skeleton.body.threshold;
        assert!((threshold - max).abs() < f64::EPSILON);
        let stored = analysis.cell(id).unwrap();
        assert!((stored.skeleton.body.threshold - max).abs() < f64::EPSILON);
        assert_eq!(analysis.cells().len(), 1);
    }

    // --- summaries ---

    #[test]
    fn summaries_follow_cells() {
        let mut analysis = session();
        analysis.finalize_cell(rect(2.0, 2.0, 12.0, 8.0), 0, Some(0.5)).unwrap();
        let rows = analysis.summaries();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cell_id, CellId(1));
        assert!((rows[0].area - 240.0).abs() < 1e-9);
        assert!((rows[0].physical_spacing - 0.5).abs() < f64::EPSILON);
        assert!(rows[0].primary_lengths.len() <= rows[0].protrusion_count);
    }
}
