//! Property tests for the spatial grid and hitbox geometry.
//!
//! Range queries are checked against a brute-force scan, registration
//! against a recomputation from the hitbox, and ray walks against an
//! independent segment-vs-cell clip.

use std::collections::BTreeSet;

use dots_core::config::DotTemplate;
use dots_core::dot::{Dot, DotId, DotMap};
use dots_core::geometry::{distance_between, hit_box, rotate_rect, Line, Point, Rect};
use dots_core::grid::DotsGrid;
use dots_test_utils::strategies::{
    arb_angle, arb_dot_placements, arb_point_with_margin, arb_range, arb_segment, DotPlacement,
};
use proptest::prelude::*;

const CELL: f64 = 10.0;
const WIDTH: f64 = 200.0;
const HEIGHT: f64 = 150.0;
/// How far outside the battlefield generated dots and queries may reach.
const OUTSIDE: f64 = 60.0;

fn populate(placements: &[DotPlacement]) -> (DotsGrid, DotMap) {
    let mut grid = DotsGrid::new(CELL, WIDTH, HEIGHT).unwrap();
    let mut dots = DotMap::new();
    for (i, placement) in placements.iter().enumerate() {
        let template = DotTemplate {
            width: placement.width,
            height: placement.height,
            ..DotTemplate::default()
        };
        let id = i as DotId + 1;
        let mut dot = Dot::new(id, (i % 2) as u32, placement.position, &template);
        dot.angle = placement.angle;
        dot.update_hit_box();
        grid.add_dot(&mut dot);
        dots.insert(id, dot);
    }
    (grid, dots)
}

fn cells_reporting(grid: &DotsGrid, id: DotId) -> BTreeSet<usize> {
    (0..grid.cell_count())
        .filter(|&i| grid.dots_in_cell(i).any(|d| d == id))
        .collect()
}

fn bounds_of(rect: &Rect) -> (Point, Point) {
    (rect.p1, rect.p3)
}

/// Parametric interval of `line` inside an axis-aligned box, if any.
fn clip(line: Line, min: Point, max: Point) -> Option<(f64, f64)> {
    let delta = line.p2 - line.p1;
    let mut t0: f64 = 0.0;
    let mut t1: f64 = 1.0;
    for (start, d, lo, hi) in [
        (line.p1.x, delta.x, min.x, max.x),
        (line.p1.y, delta.y, min.y, max.y),
    ] {
        if d.abs() < 1e-12 {
            if start < lo || start > hi {
                return None;
            }
            continue;
        }
        let a = (lo - start) / d;
        let b = (hi - start) / d;
        t0 = t0.max(a.min(b));
        t1 = t1.min(a.max(b));
        if t0 > t1 {
            return None;
        }
    }
    Some((t0, t1))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_range_query_matches_brute_force(
        placements in arb_dot_placements(60, WIDTH, HEIGHT, OUTSIDE, CELL),
        point in arb_point_with_margin(WIDTH, HEIGHT, OUTSIDE),
        range in arb_range(80.0),
    ) {
        let (grid, dots) = populate(&placements);

        let mut from_grid = grid.get_dots_in_range(&dots, point, range, |_| true);
        from_grid.sort_unstable();
        let brute: Vec<DotId> = dots
            .values()
            .filter(|d| distance_between(d.position, point) <= range)
            .map(|d| d.id)
            .collect();

        prop_assert_eq!(from_grid, brute);
    }

    #[test]
    fn prop_range_query_applies_predicate(
        placements in arb_dot_placements(40, WIDTH, HEIGHT, OUTSIDE, CELL),
        point in arb_point_with_margin(WIDTH, HEIGHT, 0.0),
        range in arb_range(80.0),
    ) {
        let (grid, dots) = populate(&placements);
        let result = grid.get_dots_in_range(&dots, point, range, |d| d.team == 1);

        let unique: BTreeSet<DotId> = result.iter().copied().collect();
        prop_assert_eq!(unique.len(), result.len());
        for id in result {
            prop_assert_eq!(dots[&id].team, 1);
        }
    }

    #[test]
    fn prop_registration_follows_hit_box(
        placements in arb_dot_placements(30, WIDTH, HEIGHT, OUTSIDE, CELL),
        moves in proptest::collection::vec(
            (arb_point_with_margin(WIDTH, HEIGHT, 10.0), arb_angle()),
            30,
        ),
    ) {
        let (mut grid, mut dots) = populate(&placements);

        for (dot, (position, angle)) in dots.values_mut().zip(moves) {
            dot.position = position;
            dot.angle = angle;
            dot.update_hit_box();
            grid.update_dot(dot);
        }

        for dot in dots.values() {
            let expected: BTreeSet<usize> =
                grid.cell_indexes_for_hit_box(&dot.hit_box).into_iter().collect();
            let stored: BTreeSet<usize> = dot.grid_square_indexes.iter().copied().collect();
            prop_assert_eq!(&cells_reporting(&grid, dot.id), &expected);
            prop_assert_eq!(stored, expected);
        }
    }

    #[test]
    fn prop_update_without_move_is_noop(
        placements in arb_dot_placements(30, WIDTH, HEIGHT, OUTSIDE, CELL),
    ) {
        let (mut grid, mut dots) = populate(&placements);
        let before: Vec<Vec<DotId>> =
            (0..grid.cell_count()).map(|i| grid.dots_in_cell(i).collect()).collect();

        for dot in dots.values_mut() {
            prop_assert!(!grid.update_dot(dot));
            prop_assert!(!grid.update_dot(dot));
        }

        let after: Vec<Vec<DotId>> =
            (0..grid.cell_count()).map(|i| grid.dots_in_cell(i).collect()).collect();
        prop_assert_eq!(before, after);
    }

    #[test]
    fn prop_line_walk_covers_crossed_cells(segment in arb_segment(WIDTH, HEIGHT)) {
        let grid = DotsGrid::new(CELL, WIDTH, HEIGHT).unwrap();
        let walked: Vec<usize> = grid.cells_along_line(segment).collect();

        prop_assert_eq!(walked[0], grid.cell_index(segment.p1));

        let unique: BTreeSet<usize> = walked.iter().copied().collect();
        prop_assert_eq!(unique.len(), walked.len());

        for index in 0..grid.cell_count() {
            let (min, max) = bounds_of(&grid.cell_bounds(index));

            let crosses_interior = clip(segment, min, max).is_some_and(|(t0, t1)| t1 - t0 > 1e-7);
            if crosses_interior {
                prop_assert!(unique.contains(&index), "cell {} crossed but not walked", index);
            }

            if unique.contains(&index) {
                let slack = Point::new(1e-6, 1e-6);
                prop_assert!(
                    clip(segment, min - slack, max + slack).is_some(),
                    "cell {} walked but not crossed",
                    index
                );
            }
        }
    }

    #[test]
    fn prop_dots_along_line_match_walked_cells(
        placements in arb_dot_placements(40, WIDTH, HEIGHT, 0.0, CELL),
        segment in arb_segment(WIDTH, HEIGHT),
    ) {
        let (grid, _dots) = populate(&placements);

        let expected: Vec<DotId> = grid
            .cells_along_line(segment)
            .flat_map(|index| grid.dots_in_cell(index).collect::<Vec<_>>())
            .collect();
        let first: Vec<DotId> = grid.iterate_dots_along_line(segment).collect();
        let second: Vec<DotId> = grid.iterate_dots_along_line(segment).collect();

        prop_assert_eq!(&first, &expected);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_hit_box_rotation_round_trip(
        x in -500.0f64..500.0,
        y in -500.0f64..500.0,
        width in 0.5f64..50.0,
        height in 0.5f64..50.0,
        angle in arb_angle(),
    ) {
        let center = Point::new(x, y);
        let original = hit_box(center, width, height, 0.0);
        let restored = rotate_rect(&rotate_rect(&original, center, angle), center, -angle);

        for (a, b) in original.corners().into_iter().zip(restored.corners()) {
            prop_assert!(a.approx_eq(b, 1e-9), "{:?} != {:?}", a, b);
        }
    }
}
