// Shared geometry for the label repel solver — points, axis-aligned
// rectangles and the two predicates the iteration body needs (rectangle
// overlap, leader-line segment intersection). Pure math, no layout logic.

use std::ops::{Add, AddAssign, Mul, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Point {
    fn add_assign(&mut self, rhs: Point) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Point {
    type Output = Point;

    fn mul(self, rhs: f32) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

/// Axis-aligned rectangle. `x`/`y` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Overlap test, inclusive of touching edges.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x <= other.x + other.width
            && other.x <= self.x + self.width
            && self.y <= other.y + other.height
            && other.y <= self.y + self.height
    }

    pub fn translate(&mut self, delta: Point) {
        self.x += delta.x;
        self.y += delta.y;
    }
}

/// Whether segment `p1..q1` crosses segment `p2..q2`, endpoints included.
///
/// Cross-product parametrization: each segment is written as
/// `p + t * (q - p)` and the two parameters at the line intersection must
/// both land in `[0, 1]`. Parallel (or zero-length) segments never cross.
pub fn segments_intersect(p1: Point, q1: Point, p2: Point, q2: Point) -> bool {
    let denom = (q2.y - p2.y) * (q1.x - p1.x) - (q2.x - p2.x) * (q1.y - p1.y);
    if denom == 0.0 {
        return false;
    }
    let numer_a = (q2.x - p2.x) * (p1.y - p2.y) - (q2.y - p2.y) * (p1.x - p2.x);
    let numer_b = (q1.x - p1.x) * (p1.y - p2.y) - (q1.y - p1.y) * (p1.x - p2.x);
    let mua = numer_a / denom;
    let mub = numer_b / denom;
    (0.0..=1.0).contains(&mua) && (0.0..=1.0).contains(&mub)
}
