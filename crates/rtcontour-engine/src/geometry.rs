//! Geometric primitives: integer and floating-point points, bounding
//! boxes, and the segment predicates shared by the tracer, the merger
//! and the rasterizer.
//!
//! Coordinates use image conventions: `x` grows to the right and `y`
//! grows downward. A positive [shoelace](signed_area) sum therefore
//! means the points run clockwise on screen.

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

use crate::types::ContourError;

/// A pixel position on the integer lattice.
///
/// Traced rims are sequences of these: each point is the position of a
/// boundary pixel, not a pixel corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntPoint {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl IntPoint {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The point shifted by `(dx, dy)`.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// A floating-point position relative to pixel centers.
///
/// Pixel `(x, y)` has its center at `FloatPoint::new(x as f64, y as f64)`
/// and its corners at the half-integer offsets around it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloatPoint {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
}

impl FloatPoint {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared length of the point taken as a vector.
    #[must_use]
    pub fn length_squared(self) -> f64 {
        self.x.mul_add(self.x, self.y * self.y)
    }

    /// Length of the point taken as a vector.
    #[must_use]
    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Dot product.
    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x.mul_add(other.x, self.y * other.y)
    }

    /// Z component of the cross product of the two vectors.
    #[must_use]
    pub fn cross(self, other: Self) -> f64 {
        self.x.mul_add(other.y, -(self.y * other.x))
    }

    /// Squared Euclidean distance to another point.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        (self - other).length_squared()
    }

    /// Unit vector in the same direction.
    ///
    /// # Errors
    ///
    /// Returns [`ContourError::ZeroLengthVector`] when the vector has no
    /// direction.
    pub fn normalize(self) -> Result<Self, ContourError> {
        let len = self.length();
        if len == 0.0 || !len.is_finite() {
            return Err(ContourError::ZeroLengthVector);
        }
        Ok(Self::new(self.x / len, self.y / len))
    }
}

impl Add for FloatPoint {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for FloatPoint {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for FloatPoint {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl From<IntPoint> for FloatPoint {
    fn from(p: IntPoint) -> Self {
        Self::new(f64::from(p.x), f64::from(p.y))
    }
}

impl From<FloatPoint> for geo::Coord<f64> {
    fn from(p: FloatPoint) -> Self {
        Self { x: p.x, y: p.y }
    }
}

impl From<geo::Coord<f64>> for FloatPoint {
    fn from(c: geo::Coord<f64>) -> Self {
        Self::new(c.x, c.y)
    }
}

/// Axis-aligned bounding box. `width` and `height` are extents
/// (`max - min`), so a single point has a zero-sized box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Horizontal extent.
    pub width: f64,
    /// Vertical extent.
    pub height: f64,
}

impl BoundingBox {
    /// Smallest box containing every point, or `None` for no points.
    #[must_use]
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator,
        I::Item: Into<FloatPoint>,
    {
        let mut iter = points.into_iter().map(Into::into);
        let first: FloatPoint = iter.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in iter {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        })
    }

    /// Right edge.
    #[must_use]
    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge.
    #[must_use]
    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    /// Whether `p` lies inside the box grown by `margin` on every side.
    #[must_use]
    pub fn contains_with_margin(&self, p: FloatPoint, margin: f64) -> bool {
        p.x >= self.x - margin
            && p.x <= self.max_x() + margin
            && p.y >= self.y - margin
            && p.y <= self.max_y() + margin
    }
}

/// Whether `point` lies within `tolerance` of the segment `p1 -> p2`.
///
/// Zero-length segments degrade to a point-distance test.
#[must_use]
pub fn point_on_line(p1: FloatPoint, p2: FloatPoint, point: FloatPoint, tolerance: f64) -> bool {
    distance_squared_to_segment(p1, p2, point) <= tolerance * tolerance
}

/// Squared distance from `point` to the closed segment `p1 -> p2`.
#[must_use]
pub fn distance_squared_to_segment(p1: FloatPoint, p2: FloatPoint, point: FloatPoint) -> f64 {
    let seg = p2 - p1;
    let len2 = seg.length_squared();
    if len2 == 0.0 {
        return point.distance_squared(p1);
    }
    let t = ((point - p1).dot(seg) / len2).clamp(0.0, 1.0);
    point.distance_squared(p1 + seg * t)
}

/// Shoelace sum of a closed ring, halved.
///
/// Positive for rings that run clockwise in image coordinates.
#[must_use]
pub fn signed_area(points: &[FloatPoint]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let twice: f64 = (0..n)
        .map(|i| points[i].cross(points[(i + 1) % n]))
        .sum();
    twice / 2.0
}
