//! Eraser hit-testing: does an eraser path touch an existing shape?
//!
//! All inputs are canvas-space. The eraser path is treated as a polyline of
//! segments (a single point is a zero-length segment) swept by a disc of
//! `radius`. Tests are conservative: a false positive erases a shape the
//! user was close to, a false negative leaves ink the user visibly crossed,
//! so ties go to "hit".

#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use protocol::{Point, Shape};

use crate::consts::TEXT_ADVANCE_RATIO;

/// Axis-aligned bounding box in canvas space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Box spanning two corners in any order.
    #[must_use]
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self { min_x: a.x.min(b.x), min_y: a.y.min(b.y), max_x: a.x.max(b.x), max_y: a.y.max(b.y) }
    }

    /// Box around every point, or `None` for an empty slice.
    #[must_use]
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        Some(rest.iter().fold(Self::from_corners(*first, *first), |b, p| Self {
            min_x: b.min_x.min(p.x),
            min_y: b.min_y.min(p.y),
            max_x: b.max_x.max(p.x),
            max_y: b.max_y.max(p.y),
        }))
    }

    /// Grow the box by `by` on every side.
    #[must_use]
    pub fn expand(self, by: f64) -> Self {
        Self { min_x: self.min_x - by, min_y: self.min_y - by, max_x: self.max_x + by, max_y: self.max_y + by }
    }

    /// Whether the two boxes overlap. Touching edges count.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min_x <= other.max_x && other.min_x <= self.max_x && self.min_y <= other.max_y && other.min_y <= self.max_y
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

// =============================================================
// Segment primitives
// =============================================================

/// Closest point to `p` on the segment `a`–`b`.
///
/// Uses the clamped projection `t = clamp(dot / len², 0, 1)`. A zero-length
/// segment yields `a`.
#[must_use]
pub fn closest_point_on_segment(p: Point, a: Point, b: Point) -> Point {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return a;
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    Point::new(a.x + t * dx, a.y + t * dy)
}

/// Distance from `p` to the segment `a`–`b`.
#[must_use]
pub fn point_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    p.distance(closest_point_on_segment(p, a, b))
}

/// Shortest distance between segments `a1`–`a2` and `b1`–`b2`; zero when
/// they cross.
#[must_use]
pub fn segment_distance(a1: Point, a2: Point, b1: Point, b2: Point) -> f64 {
    if segments_cross(a1, a2, b1, b2) {
        return 0.0;
    }
    point_segment_distance(a1, b1, b2)
        .min(point_segment_distance(a2, b1, b2))
        .min(point_segment_distance(b1, a1, a2))
        .min(point_segment_distance(b2, a1, a2))
}

fn cross(o: Point, a: Point, b: Point) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Proper crossing only; collinear and touching cases are covered by the
/// endpoint distances in [`segment_distance`].
fn segments_cross(a1: Point, a2: Point, b1: Point, b2: Point) -> bool {
    let d1 = cross(b1, b2, a1);
    let d2 = cross(b1, b2, a2);
    let d3 = cross(a1, a2, b1);
    let d4 = cross(a1, a2, b2);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0)) && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

/// Consecutive point pairs of a path. A one-point path yields one
/// zero-length segment.
fn segments(path: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
    let single = match path {
        [only] => Some((*only, *only)),
        _ => None,
    };
    single.into_iter().chain(path.windows(2).map(|w| (w[0], w[1])))
}

// =============================================================
// Shape tests
// =============================================================

/// Rectangle vs. eraser: the rectangle's box, grown by `radius`, overlaps the
/// box of some eraser segment.
#[must_use]
pub fn rect_hit(bounds: Bounds, eraser: &[Point], radius: f64) -> bool {
    let grown = bounds.expand(radius);
    segments(eraser).any(|(a, b)| grown.intersects(&Bounds::from_corners(a, b)))
}

/// Circle vs. eraser: some eraser segment passes within `radius` of the
/// circle's disc.
#[must_use]
pub fn circle_hit(center: Point, circle_radius: f64, eraser: &[Point], radius: f64) -> bool {
    let reach = circle_radius.abs() + radius;
    segments(eraser).any(|(a, b)| point_segment_distance(center, a, b) <= reach)
}

/// Polyline vs. eraser: some stroke segment passes within
/// `radius + half_width` of some eraser segment.
#[must_use]
pub fn polyline_hit(line: &[Point], half_width: f64, eraser: &[Point], radius: f64) -> bool {
    let reach = radius + half_width;
    segments(line).any(|(a1, a2)| segments(eraser).any(|(b1, b2)| segment_distance(a1, a2, b1, b2) <= reach))
}

/// Canvas-space box of a shape, or `None` for an empty path.
#[must_use]
pub fn shape_bounds(shape: &Shape) -> Option<Bounds> {
    match shape {
        Shape::Rect { x, y, width, height, .. } => {
            Some(Bounds::from_corners(Point::new(*x, *y), Point::new(x + width, y + height)))
        }
        Shape::Ellipse { center_x, center_y, radius, .. } => {
            let r = radius.abs();
            Some(Bounds { min_x: center_x - r, min_y: center_y - r, max_x: center_x + r, max_y: center_y + r })
        }
        Shape::Freehand { path, .. } | Shape::Eraser { path, .. } => Bounds::from_points(path),
        Shape::Text { x, y, content, font_size, .. } => Some(text_bounds(*x, *y, content, *font_size)),
    }
}

#[allow(clippy::cast_precision_loss)]
fn text_bounds(x: f64, y: f64, content: &str, font_size: f64) -> Bounds {
    let advance = content.chars().count() as f64 * font_size * TEXT_ADVANCE_RATIO;
    let half = font_size * 0.5;
    Bounds { min_x: x, min_y: y - half, max_x: x + advance, max_y: y + half }
}

/// Whether the eraser path touches `shape`.
///
/// Eraser strokes are masks, not ink, and are never hit.
#[must_use]
pub fn shape_hit(shape: &Shape, eraser: &[Point], radius: f64) -> bool {
    match shape {
        Shape::Rect { .. } | Shape::Text { .. } => shape_bounds(shape).is_some_and(|b| rect_hit(b, eraser, radius)),
        Shape::Ellipse { center_x, center_y, radius: r, .. } => {
            circle_hit(Point::new(*center_x, *center_y), *r, eraser, radius)
        }
        Shape::Freehand { path, stroke_width, .. } => polyline_hit(path, stroke_width * 0.5, eraser, radius),
        Shape::Eraser { .. } => false,
    }
}

/// Shapes touched by the eraser path, in list order. Value-equal duplicates
/// are reported once.
#[must_use]
pub fn erase_targets(shapes: &[Shape], eraser: &[Point], radius: f64) -> Vec<Shape> {
    let mut targets: Vec<Shape> = Vec::new();
    for shape in shapes {
        if shape_hit(shape, eraser, radius) && !targets.contains(shape) {
            targets.push(shape.clone());
        }
    }
    targets
}
