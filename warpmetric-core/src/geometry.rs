//! Small numeric helpers shared by the line and landmark scorers.
//!
//! Divisions whose denominator can legitimately reach zero (vertical
//! segments, points sitting on the anchor) add [`EPS`] instead of
//! branching, so degenerate inputs yield large-but-finite or near-zero
//! values rather than errors.

use serde::{Deserialize, Serialize};

/// Stabiliser added to every denominator that may be zero.
pub const EPS: f64 = 1e-6;

/// A 2D point in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 2]", into = "[f32; 2]")]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn dot(self, other: Point) -> f64 {
        self.x as f64 * other.x as f64 + self.y as f64 * other.y as f64
    }

    pub fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }
}

impl std::ops::Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl From<[f32; 2]> for Point {
    fn from([x, y]: [f32; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f32; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

/// `num / (den + EPS)`.
#[inline]
pub fn safe_div(num: f64, den: f64) -> f64 {
    num / (den + EPS)
}

/// Min-max normalise `values` into `[0, 1)`.
///
/// The spread gets [`EPS`] added, so a constant (or single-element) input
/// maps to all zeros and the maximum lands just under 1.
pub fn normalize(values: &[f64]) -> Vec<f64> {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    values.iter().map(|&v| safe_div(v - min, max - min)).collect()
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Translate `points` so that `anchor` becomes the origin.
pub fn anchored(points: &[Point], anchor: Point) -> Vec<Point> {
    points.iter().map(|&p| p - anchor).collect()
}
