//! Integration tests: whole cells through a session, from contour to
//! protrusions and connections.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashSet;
use std::f64::consts::PI;

use cellskel_pipeline::endpoints::find_endpoints;
use cellskel_pipeline::types::count_foreground;
use cellskel_pipeline::{
    Analysis, CellId, CellShape, Dimensions, Pixel, Point, SkeletonConfig, SkeletonError,
};

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point> {
    vec![
        Point::new(x0, y0),
        Point::new(x1, y0),
        Point::new(x1, y1),
        Point::new(x0, y1),
    ]
}

fn circle(cx: f64, cy: f64, r: f64, vertices: u32) -> Vec<Point> {
    (0..vertices)
        .map(|i| {
            let t = 2.0 * PI * f64::from(i) / f64::from(vertices);
            Point::new(cx + r * t.cos(), cy + r * t.sin())
        })
        .collect()
}

/// Two discs of radius 15 joined by a 3-pixel-wide bar.
fn dumbbell() -> Vec<Point> {
    let (r, half) = (15.0_f64, 1.5_f64);
    let alpha = (half / r).asin();
    let (left, right, cy) = (30.0, 90.0, 30.0);
    let steps = 64_u32;
    let mut contour = Vec::new();
    for i in 0..=steps {
        let t = alpha + (2.0 * PI - 2.0 * alpha) * f64::from(i) / f64::from(steps);
        contour.push(Point::new(left + r * t.cos(), cy + r * t.sin()));
    }
    for i in 0..=steps {
        let t = PI + alpha + (2.0 * PI - 2.0 * alpha) * f64::from(i) / f64::from(steps);
        contour.push(Point::new(right + r * t.cos(), cy + r * t.sin()));
    }
    contour
}

/// A 21x21 square with a 3-pixel-wide arm running right to x = 60.
fn square_with_arm() -> Vec<Point> {
    vec![
        Point::new(20.0, 20.0),
        Point::new(40.0, 20.0),
        Point::new(40.0, 29.0),
        Point::new(60.0, 29.0),
        Point::new(60.0, 31.0),
        Point::new(40.0, 31.0),
        Point::new(40.0, 40.0),
        Point::new(20.0, 40.0),
    ]
}

/// The square with a 5-pixel-wide crossbar at the end of its arm, so the
/// arm forks into two tips.
fn square_with_forked_arm() -> Vec<Point> {
    vec![
        Point::new(20.0, 20.0),
        Point::new(40.0, 20.0),
        Point::new(40.0, 29.0),
        Point::new(56.0, 29.0),
        Point::new(56.0, 22.0),
        Point::new(60.0, 22.0),
        Point::new(60.0, 38.0),
        Point::new(56.0, 38.0),
        Point::new(56.0, 31.0),
        Point::new(40.0, 31.0),
        Point::new(40.0, 40.0),
        Point::new(20.0, 40.0),
    ]
}

fn assert_paths_consistent(cell: &CellShape) {
    let body = &cell.skeleton.body;
    assert_eq!(body.paths.len(), body.endpoints.len().saturating_sub(1));
    assert_eq!(body.paths.len(), body.lengths.len());
    for (path, length) in body.paths.iter().zip(&body.lengths) {
        assert_eq!(path.first(), body.endpoints.first());
        assert!(*length >= 0.0);
    }

    let set = &cell.skeleton.protrusions;
    for protrusion in &set.protrusions {
        for traced in protrusion.paths() {
            assert_eq!(traced.path.last(), Some(&traced.endpoint));
            assert_eq!(traced.path.first(), protrusion.attachment.as_ref());
        }
        if let Some(primary) = &protrusion.primary {
            assert!(protrusion.secondary.iter().all(|s| s.length <= primary.length));
        }
    }
    let degenerate = set
        .protrusions
        .iter()
        .filter(|p| p.primary.is_none())
        .count();
    assert_eq!(degenerate, set.issues.len());

    // One traced path per free skeleton endpoint of each attached component.
    let skeleton_ends: HashSet<Pixel> = find_endpoints(cell.skeleton.medial_axis.skeleton())
        .into_iter()
        .collect();
    let mut free_ends = 0;
    for protrusion in &set.protrusions {
        let free = protrusion
            .pixels
            .iter()
            .filter(|&&p| skeleton_ends.contains(&p) && Some(p) != protrusion.attachment)
            .count();
        if protrusion.attachment.is_some() {
            assert_eq!(protrusion.path_count(), free, "protrusion {}", protrusion.id);
            free_ends += free;
        } else {
            assert_eq!(protrusion.path_count(), 0);
        }
    }
    let with_primary = set.protrusions.iter().filter(|p| p.primary.is_some()).count();
    let secondary: usize = set.protrusions.iter().map(|p| p.secondary.len()).sum();
    assert_eq!(secondary + with_primary, free_ends);
}

#[test]
fn disc_skeleton_collapses_to_the_centre() {
    let dims = Dimensions {
        width: 100,
        height: 100,
    };
    let mut analysis = Analysis::new(dims, SkeletonConfig::default());
    let id = analysis
        .finalize_cell(circle(50.0, 50.0, 20.0, 96), 0, None)
        .expect("a single-valued histogram still yields a threshold");
    let cell = analysis.cell(id).unwrap();

    let axis = &cell.skeleton.medial_axis;
    assert_eq!(count_foreground(axis.skeleton()), 1);
    assert!(axis.max_distance() > 19.5, "{}", axis.max_distance());

    // Otsu over one value returns that value, so the body is the centre.
    let body = &cell.skeleton.body;
    assert!((body.threshold - body.max_threshold).abs() < 1e-9);
    assert_eq!(count_foreground(&body.pixels), 1);
    assert!(cell.skeleton.protrusions.is_empty());
    assert_paths_consistent(cell);
}

#[test]
fn dumbbell_bar_becomes_a_protrusion() {
    let dims = Dimensions {
        width: 120,
        height: 60,
    };
    let mut analysis = Analysis::new(dims, SkeletonConfig::default());
    let id = analysis.finalize_cell(dumbbell(), 0, None).unwrap();

    // One disc core is the body; the bar and the other disc form a single
    // branch reaching from the body edge to the far centre.
    let initial = analysis.cell(id).unwrap();
    let lengths = initial.skeleton.protrusions.primary_lengths();
    assert_eq!(initial.skeleton.protrusions.len(), 1);
    assert_eq!(lengths.len(), 1);
    assert!((lengths[0] - 50.0).abs() < 1.0, "{lengths:?}");
    assert_paths_consistent(initial);

    let whole = analysis.adjust_body_threshold(id, 0.0).unwrap();
    assert!(whole.skeleton.protrusions.is_empty());
    assert_paths_consistent(whole);

    let cut = analysis.adjust_body_threshold(id, 7.5).unwrap().clone();
    let lengths = cut.skeleton.protrusions.primary_lengths();
    assert_eq!(cut.skeleton.protrusions.len(), 1);
    assert_eq!(lengths.len(), 1);
    assert!((lengths[0] - 51.0).abs() < 1.0, "{lengths:?}");
    assert!(cut.skeleton.protrusions.total_length >= lengths[0]);
    assert_paths_consistent(&cut);

    // A higher cut shrinks the body core, so the branch gets longer.
    let higher = analysis.adjust_body_threshold(id, 12.0).unwrap();
    let longer = higher.skeleton.protrusions.primary_lengths();
    assert_eq!(longer.len(), 1);
    assert!(longer[0] > lengths[0], "{longer:?}");
}

#[test]
fn overlapping_squares_record_one_connection() {
    let dims = Dimensions {
        width: 30,
        height: 20,
    };
    let mut analysis = Analysis::new(dims, SkeletonConfig::default());
    let first = analysis.finalize_cell(rect(2.0, 2.0, 11.0, 11.0), 4, None).unwrap();
    let second = analysis.finalize_cell(rect(7.0, 2.0, 16.0, 11.0), 4, None).unwrap();

    let connections = analysis.connections();
    assert_eq!(connections.len(), 1);
    let c = &connections[0];
    assert_eq!((c.cell_id_a, c.cell_id_b), (second, first));
    assert_eq!(c.frame_index, 4);
    assert!((c.center_x - 9.0).abs() < 1e-9, "{}", c.center_x);
    assert!((c.center_y - 6.5).abs() < 1e-9, "{}", c.center_y);

    // The same square on another frame touches nothing.
    analysis.finalize_cell(rect(7.0, 2.0, 16.0, 11.0), 5, None).unwrap();
    assert_eq!(analysis.connections().len(), 1);
    assert_eq!(analysis.connections_in_frame(5).count(), 0);
}

#[test]
fn half_spacing_halves_lengths() {
    let dims = Dimensions {
        width: 80,
        height: 80,
    };
    let mut analysis = Analysis::new(dims, SkeletonConfig::default());
    let full = analysis.finalize_cell(square_with_arm(), 0, None).unwrap();
    let half = analysis.finalize_cell(square_with_arm(), 1, Some(0.5)).unwrap();
    let full = analysis.adjust_body_threshold(full, 5.0).unwrap().clone();
    let half = analysis.adjust_body_threshold(half, 5.0).unwrap().clone();

    assert!((full.area * 4.0 - half.area).abs() < 1e-9);
    assert_eq!(full.skeleton.body.pixels, half.skeleton.body.pixels);
    for (a, b) in full
        .skeleton
        .body
        .lengths
        .iter()
        .zip(&half.skeleton.body.lengths)
    {
        assert!((a * 0.5 - b).abs() < 1e-9);
    }
    let a = full.skeleton.protrusions.primary_lengths();
    let b = half.skeleton.protrusions.primary_lengths();
    assert_eq!(a.len(), 1);
    assert_eq!(a.len(), b.len());
    assert!((a[0] * 0.5 - b[0]).abs() < 1e-9);
    assert!(
        (full.skeleton.protrusions.total_length * 0.5 - half.skeleton.protrusions.total_length)
            .abs()
            < 1e-9
    );
}

#[test]
fn raising_the_threshold_shrinks_the_body() {
    let dims = Dimensions {
        width: 80,
        height: 80,
    };
    let mut analysis = Analysis::new(dims, SkeletonConfig::default());
    let id = analysis.finalize_cell(square_with_arm(), 0, None).unwrap();
    let max = analysis.cell(id).unwrap().skeleton.body.max_threshold;

    let mut previous = u64::MAX;
    let mut t = 0.0;
    while t <= max {
        let cell = analysis.adjust_body_threshold(id, t).unwrap();
        let count = count_foreground(&cell.skeleton.body.pixels);
        assert!(count <= previous, "body grew at threshold {t}");
        assert_paths_consistent(cell);
        previous = count;
        t += 1.0;
    }
}

#[test]
fn session_ids_survive_failures() {
    let dims = Dimensions {
        width: 40,
        height: 40,
    };
    let mut analysis = Analysis::new(dims, SkeletonConfig::default());
    assert_eq!(
        analysis.finalize_cell(rect(2.0, 2.0, 20.0, 12.0), 0, None).unwrap(),
        CellId(1)
    );
    // Entirely off the grid: nothing to skeletonize.
    assert_eq!(
        analysis
            .finalize_cell(rect(100.0, 100.0, 120.0, 120.0), 0, None)
            .unwrap_err(),
        SkeletonError::EmptyHistogram
    );
    assert_eq!(
        analysis
            .finalize_cell(rect(2.0, 2.0, 20.0, 12.0), 0, Some(f64::NAN))
            .map_err(|e| matches!(e, SkeletonError::InvalidSpacing(_))),
        Err(true)
    );
    assert_eq!(
        analysis.finalize_cell(rect(2.0, 20.0, 20.0, 30.0), 0, None).unwrap(),
        CellId(2)
    );
    assert_eq!(analysis.cells().len(), 2);
    assert_eq!(analysis.cells_in_frame(0).count(), 2);
    assert!(analysis.connections().is_empty());
}

#[test]
fn finalizing_twice_gives_identical_geometry() {
    let dims = Dimensions {
        width: 120,
        height: 60,
    };
    let mut analysis = Analysis::new(dims, SkeletonConfig::default());
    let a = analysis.finalize_cell(dumbbell(), 0, Some(0.5)).unwrap();
    let b = analysis.finalize_cell(dumbbell(), 0, Some(0.5)).unwrap();
    assert_ne!(a, b);

    let (a, b) = (analysis.cell(a).unwrap(), analysis.cell(b).unwrap());
    assert_eq!(a.mask, b.mask);
    assert!((a.area - b.area).abs() < f64::EPSILON);
    assert_eq!(a.skeleton.body.pixels, b.skeleton.body.pixels);
    assert!((a.skeleton.body.threshold - b.skeleton.body.threshold).abs() < f64::EPSILON);
    assert_eq!(
        a.skeleton.protrusions.primary_lengths(),
        b.skeleton.protrusions.primary_lengths()
    );
    assert_eq!(a.skeleton.protrusions, b.skeleton.protrusions);

    // Identical masks on one frame overlap completely: one region.
    assert_eq!(analysis.connections().len(), 1);
}

#[test]
fn forked_arm_keeps_the_longest_path_as_primary() {
    let dims = Dimensions {
        width: 80,
        height: 80,
    };
    let mut analysis = Analysis::new(dims, SkeletonConfig::default());
    let id = analysis.finalize_cell(square_with_forked_arm(), 0, None).unwrap();
    let cell = analysis.adjust_body_threshold(id, 5.0).unwrap();

    let set = &cell.skeleton.protrusions;
    assert_eq!(set.len(), 1);
    let protrusion = &set.protrusions[0];
    assert!(protrusion.path_count() >= 2, "{}", protrusion.path_count());
    let primary = protrusion.primary.as_ref().unwrap();
    for secondary in &protrusion.secondary {
        assert!(secondary.length <= primary.length);
        assert_ne!(secondary.endpoint, primary.endpoint);
    }
    assert_paths_consistent(cell);
}
