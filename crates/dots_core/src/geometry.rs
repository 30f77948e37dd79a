//! Geometry kernel for the battlefield.
//!
//! Pure functions over points, oriented rectangles and polygons. Nothing
//! here holds state; unit positions are mutated in place by the dot store,
//! but every function in this module returns fresh values.
//!
//! Angles are radians, measured with `atan2(dy, dx)`.

use serde::{Deserialize, Serialize};

/// Tolerance used when comparing floating-point geometry.
pub const EPSILON: f64 = 1e-9;

/// A point on the battlefield.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// The origin.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Squared distance to another point (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// 2D cross product (z component of the 3D cross product).
    #[must_use]
    pub fn cross(self, other: Self) -> f64 {
        self.x * other.y - self.y * other.x
    }

    /// Check whether two points are equal within [`EPSILON`].
    #[must_use]
    pub fn approx_eq(self, other: Self, epsilon: f64) -> bool {
        (self.x - other.x).abs() <= epsilon && (self.y - other.y).abs() <= epsilon
    }
}

impl std::ops::Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::ops::Mul<f64> for Point {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

/// A line segment from `p1` to `p2`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Line {
    /// Start point.
    pub p1: Point,
    /// End point.
    pub p2: Point,
}

impl Line {
    /// Create a new segment.
    #[must_use]
    pub const fn new(p1: Point, p2: Point) -> Self {
        Self { p1, p2 }
    }

    /// Segment length.
    #[must_use]
    pub fn length(&self) -> f64 {
        distance_between(self.p1, self.p2)
    }

    /// Midpoint of the segment.
    #[must_use]
    pub fn midpoint(&self) -> Point {
        Point::new((self.p1.x + self.p2.x) / 2.0, (self.p1.y + self.p2.y) / 2.0)
    }

    /// True when both endpoints coincide.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.p1.approx_eq(self.p2, EPSILON)
    }
}

/// Oriented rectangle described by its four corners in winding order.
///
/// For a rectangle produced by [`hit_box`], the corners are
/// top-left, top-right, bottom-right, bottom-left before rotation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// First corner.
    pub p1: Point,
    /// Second corner.
    pub p2: Point,
    /// Third corner.
    pub p3: Point,
    /// Fourth corner.
    pub p4: Point,
}

impl Rect {
    /// Corners in winding order.
    #[must_use]
    pub const fn corners(&self) -> [Point; 4] {
        [self.p1, self.p2, self.p3, self.p4]
    }

    /// Center of the rectangle (midpoint of its diagonal).
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new((self.p1.x + self.p3.x) / 2.0, (self.p1.y + self.p3.y) / 2.0)
    }

    /// Edges in winding order, closing back to `p1`.
    #[must_use]
    pub fn edges(&self) -> [Line; 4] {
        [
            Line::new(self.p1, self.p2),
            Line::new(self.p2, self.p3),
            Line::new(self.p3, self.p4),
            Line::new(self.p4, self.p1),
        ]
    }
}

/// Euclidean distance between two points.
#[must_use]
pub fn distance_between(a: Point, b: Point) -> f64 {
    a.distance_squared(b).sqrt()
}

/// Angle of the direction from `from` to `to`.
///
/// Callers should guard against `from == to`; `atan2(0, 0)` is `0` and
/// carries no direction.
#[must_use]
pub fn angle_between(from: Point, to: Point) -> f64 {
    (to.y - from.y).atan2(to.x - from.x)
}

/// Rotate `point` around `center` by `angle` radians.
#[must_use]
pub fn rotate_point(point: Point, center: Point, angle: f64) -> Point {
    let (sin, cos) = angle.sin_cos();
    let dx = point.x - center.x;
    let dy = point.y - center.y;
    Point::new(
        center.x + dx * cos - dy * sin,
        center.y + dx * sin + dy * cos,
    )
}

/// Rotate every corner of `rect` around `center`.
#[must_use]
pub fn rotate_rect(rect: &Rect, center: Point, angle: f64) -> Rect {
    Rect {
        p1: rotate_point(rect.p1, center, angle),
        p2: rotate_point(rect.p2, center, angle),
        p3: rotate_point(rect.p3, center, angle),
        p4: rotate_point(rect.p4, center, angle),
    }
}

/// Axis-aligned rectangle of `width` x `height` centered on `center`.
#[must_use]
pub fn rect_from_dimensions(center: Point, width: f64, height: f64) -> Rect {
    let hw = width / 2.0;
    let hh = height / 2.0;
    Rect {
        p1: Point::new(center.x - hw, center.y - hh),
        p2: Point::new(center.x + hw, center.y - hh),
        p3: Point::new(center.x + hw, center.y + hh),
        p4: Point::new(center.x - hw, center.y + hh),
    }
}

/// Hitbox of a `width` x `height` box centered on `position`, rotated by `angle`.
#[must_use]
pub fn hit_box(position: Point, width: f64, height: f64, angle: f64) -> Rect {
    let rect = rect_from_dimensions(position, width, height);
    if angle == 0.0 {
        return rect;
    }
    rotate_rect(&rect, position, angle)
}

/// Intersection point of two segments, if any.
///
/// Parallel and collinear segments report no intersection; touching at an
/// endpoint counts.
#[must_use]
pub fn segments_intersection(a: Line, b: Line) -> Option<Point> {
    let r = a.p2 - a.p1;
    let s = b.p2 - b.p1;
    let denominator = r.cross(s);
    if denominator.abs() < EPSILON {
        return None;
    }

    let qp = b.p1 - a.p1;
    let t = qp.cross(s) / denominator;
    let u = qp.cross(r) / denominator;

    if (-EPSILON..=1.0 + EPSILON).contains(&t) && (-EPSILON..=1.0 + EPSILON).contains(&u) {
        Some(a.p1 + r * t)
    } else {
        None
    }
}

fn polygon_edges(polygon: &[Point]) -> impl Iterator<Item = Line> + '_ {
    polygon
        .iter()
        .enumerate()
        .map(move |(i, &p)| Line::new(p, polygon[(i + 1) % polygon.len()]))
}

/// First intersection of `line` with the polygon's boundary, i.e. the one
/// nearest to `line.p1`.
#[must_use]
pub fn first_line_polygon_intersection(line: Line, polygon: &[Point]) -> Option<Point> {
    if polygon.len() < 2 {
        return None;
    }

    polygon_edges(polygon)
        .filter_map(|edge| segments_intersection(line, edge))
        .min_by(|a, b| {
            line.p1
                .distance_squared(*a)
                .total_cmp(&line.p1.distance_squared(*b))
        })
}

/// Cheap existence check: does `line` cross the polygon's boundary at all?
#[must_use]
pub fn line_intersects_polygon(line: Line, polygon: &[Point]) -> bool {
    if polygon.len() < 2 {
        return false;
    }
    polygon_edges(polygon).any(|edge| segments_intersection(line, edge).is_some())
}

/// [`first_line_polygon_intersection`] against a rectangle.
#[must_use]
pub fn first_line_rect_intersection(line: Line, rect: &Rect) -> Option<Point> {
    first_line_polygon_intersection(line, &rect.corners())
}

/// [`line_intersects_polygon`] against a rectangle.
#[must_use]
pub fn line_intersects_rect(line: Line, rect: &Rect) -> bool {
    line_intersects_polygon(line, &rect.corners())
}

/// Point-in-rectangle test using the sign of four cross products.
///
/// Points on an edge count as inside.
#[must_use]
pub fn is_point_in_rect(point: Point, rect: &Rect) -> bool {
    let mut has_positive = false;
    let mut has_negative = false;

    for edge in rect.edges() {
        let cross = (edge.p2 - edge.p1).cross(point - edge.p1);
        if cross > EPSILON {
            has_positive = true;
        } else if cross < -EPSILON {
            has_negative = true;
        }
        if has_positive && has_negative {
            return false;
        }
    }

    true
}

/// Point-in-polygon test using ray-casting parity.
#[must_use]
pub fn is_point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    let mut inside = false;
    let n = polygon.len();
    if n < 3 {
        return false;
    }

    let mut j = n - 1;
    for i in 0..n {
        let pi = polygon[i];
        let pj = polygon[j];
        if (pi.y > point.y) != (pj.y > point.y)
            && point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }

    inside
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    fn assert_point_near(actual: Point, expected: Point) {
        assert!(
            actual.approx_eq(expected, 1e-6),
            "expected {expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn test_distance_between() {
        let a = Point::new(3.0, 0.0);
        let b = Point::new(0.0, 4.0);
        assert!((distance_between(a, b) - 5.0).abs() < EPSILON);
    }

    #[test]
    fn test_rotate_point_quarter_turn() {
        let rotated = rotate_point(Point::new(1.0, 0.0), Point::ZERO, FRAC_PI_2);
        assert_point_near(rotated, Point::new(0.0, 1.0));
    }

    #[test]
    fn test_rotate_point_around_center() {
        let center = Point::new(10.0, 10.0);
        let rotated = rotate_point(Point::new(12.0, 10.0), center, PI);
        assert_point_near(rotated, Point::new(8.0, 10.0));
    }

    #[test]
    fn test_hit_box_round_trip() {
        let center = Point::new(25.0, -7.5);
        let original = hit_box(center, 6.0, 3.0, 0.0);

        for angle in [0.1, FRAC_PI_4, 1.3, PI, -2.2] {
            let rotated = rotate_rect(&original, center, angle);
            let back = rotate_rect(&rotated, center, -angle);
            for (a, b) in back.corners().iter().zip(original.corners()) {
                assert_point_near(*a, b);
            }
        }
    }

    #[test]
    fn test_hit_box_keeps_center() {
        let center = Point::new(4.0, 9.0);
        let rect = hit_box(center, 8.0, 2.0, 0.7);
        assert_point_near(rect.center(), center);
    }

    #[test]
    fn test_segments_intersection_crossing() {
        let a = Line::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        let b = Line::new(Point::new(0.0, 10.0), Point::new(10.0, 0.0));
        assert_point_near(segments_intersection(a, b).unwrap(), Point::new(5.0, 5.0));
    }

    #[test]
    fn test_segments_intersection_parallel_and_disjoint() {
        let a = Line::new(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        let b = Line::new(Point::new(0.0, 1.0), Point::new(10.0, 1.0));
        assert!(segments_intersection(a, b).is_none());

        let c = Line::new(Point::new(11.0, -1.0), Point::new(11.0, 1.0));
        assert!(segments_intersection(a, c).is_none());
    }

    #[test]
    fn test_degenerate_line_does_not_panic() {
        let point_line = Line::new(Point::new(5.0, 5.0), Point::new(5.0, 5.0));
        let rect = hit_box(Point::new(5.0, 5.0), 4.0, 4.0, 0.0);
        assert!(point_line.is_degenerate());
        assert!(!line_intersects_rect(point_line, &rect));
        assert!(first_line_rect_intersection(point_line, &rect).is_none());
    }

    #[test]
    fn test_first_intersection_is_nearest_to_start() {
        let rect = hit_box(Point::new(10.0, 0.0), 4.0, 4.0, 0.0);

        let forward = Line::new(Point::ZERO, Point::new(20.0, 0.0));
        assert_point_near(
            first_line_rect_intersection(forward, &rect).unwrap(),
            Point::new(8.0, 0.0),
        );

        let backward = Line::new(Point::new(20.0, 0.0), Point::ZERO);
        assert_point_near(
            first_line_rect_intersection(backward, &rect).unwrap(),
            Point::new(12.0, 0.0),
        );
    }

    #[test]
    fn test_line_misses_rect() {
        let rect = hit_box(Point::new(10.0, 10.0), 4.0, 4.0, 0.0);
        let line = Line::new(Point::ZERO, Point::new(20.0, 0.0));
        assert!(!line_intersects_rect(line, &rect));
    }

    #[test]
    fn test_line_hits_rotated_rect() {
        // A 45° rotated 4x4 box reaches ~2.83 units from its center.
        let rect = hit_box(Point::new(10.0, 3.0), 4.0, 4.0, FRAC_PI_4);
        let line = Line::new(Point::ZERO, Point::new(20.0, 0.0));
        assert!(!line_intersects_rect(line, &rect));

        let rect = hit_box(Point::new(10.0, 2.7), 4.0, 4.0, FRAC_PI_4);
        assert!(line_intersects_rect(line, &rect));
    }

    #[test]
    fn test_point_in_rect_edges_count_as_inside() {
        let rect = hit_box(Point::ZERO, 4.0, 4.0, 0.0);
        assert!(is_point_in_rect(Point::ZERO, &rect));
        assert!(is_point_in_rect(Point::new(2.0, 0.0), &rect));
        assert!(is_point_in_rect(Point::new(2.0, 2.0), &rect));
        assert!(!is_point_in_rect(Point::new(2.1, 0.0), &rect));
    }

    #[test]
    fn test_point_in_rotated_rect() {
        let rect = hit_box(Point::ZERO, 4.0, 4.0, FRAC_PI_4);
        // The rotated corner now points along the x axis.
        assert!(is_point_in_rect(Point::new(2.7, 0.0), &rect));
        assert!(!is_point_in_rect(Point::new(1.9, 1.9), &rect));
    }

    #[test]
    fn test_point_in_polygon() {
        let triangle = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 10.0),
        ];
        assert!(is_point_in_polygon(Point::new(2.0, 2.0), &triangle));
        assert!(!is_point_in_polygon(Point::new(8.0, 8.0), &triangle));
        assert!(!is_point_in_polygon(Point::new(-1.0, 2.0), &triangle));
    }

    #[test]
    fn test_angle_between() {
        let angle = angle_between(Point::ZERO, Point::new(0.0, 5.0));
        assert!((angle - FRAC_PI_2).abs() < EPSILON);
    }
}
