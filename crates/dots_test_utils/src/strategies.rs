//! Proptest strategies for battle-core property tests.
//!
//! These generate random but reproducible layouts, queries and segments
//! in and around a battlefield of a given size.

use std::f64::consts::PI;

use dots_core::geometry::{Line, Point};
use proptest::prelude::*;

/// A point inside `[0, width) x [0, height)`.
pub fn arb_point(width: f64, height: f64) -> impl Strategy<Value = Point> {
    (0.0..width, 0.0..height).prop_map(|(x, y)| Point::new(x, y))
}

/// A point that may lie up to `margin` outside the battlefield.
pub fn arb_point_with_margin(width: f64, height: f64, margin: f64) -> impl Strategy<Value = Point> {
    (-margin..width + margin, -margin..height + margin).prop_map(|(x, y)| Point::new(x, y))
}

/// An angle in radians, `[-PI, PI)`.
pub fn arb_angle() -> impl Strategy<Value = f64> {
    -PI..PI
}

/// Query range, including zero.
pub fn arb_range(max: f64) -> impl Strategy<Value = f64> {
    prop_oneof![Just(0.0), 0.0..max]
}

/// Dot size no larger than `max_side` on either axis.
pub fn arb_dot_size(max_side: f64) -> impl Strategy<Value = (f64, f64)> {
    (1.0..max_side, 1.0..max_side)
}

/// Placement for a test dot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DotPlacement {
    /// Center.
    pub position: Point,
    /// Facing.
    pub angle: f64,
    /// Hitbox width.
    pub width: f64,
    /// Hitbox height.
    pub height: f64,
}

/// A single dot placement whose center may lie up to `margin` outside the
/// battlefield.
pub fn arb_dot_placement(
    width: f64,
    height: f64,
    margin: f64,
    max_side: f64,
) -> impl Strategy<Value = DotPlacement> {
    (
        arb_point_with_margin(width, height, margin),
        arb_angle(),
        arb_dot_size(max_side),
    )
        .prop_map(|(position, angle, (w, h))| DotPlacement {
            position,
            angle,
            width: w,
            height: h,
        })
}

/// Between one and `max_dots` placements, centers up to `margin` outside
/// the battlefield.
pub fn arb_dot_placements(
    max_dots: usize,
    width: f64,
    height: f64,
    margin: f64,
    max_side: f64,
) -> impl Strategy<Value = Vec<DotPlacement>> {
    proptest::collection::vec(arb_dot_placement(width, height, margin, max_side), 1..=max_dots)
}

/// A segment with both endpoints inside the battlefield.
pub fn arb_segment(width: f64, height: f64) -> impl Strategy<Value = Line> {
    (arb_point(width, height), arb_point(width, height)).prop_map(|(p1, p2)| Line::new(p1, p2))
}

/// Team assignment for `count` dots across `teams` teams.
pub fn arb_teams(count: usize, teams: u32) -> impl Strategy<Value = Vec<u32>> {
    proptest::collection::vec(0..teams, count)
}
