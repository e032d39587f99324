//! Straight-line model, fitted by principal axis.

use kurbo::{CubicBez, Point, Vec2};
use nalgebra::{Matrix2, SymmetricEigen};
use serde::Serialize;

use crate::geom::pt_line_dist;

/// A line segment oriented from its first to its last point, both
/// projected on the fitted axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineModel {
    first: Point,
    last: Point,
    distance: f64,
}

impl LineModel {
    pub fn fit(points: &[Point]) -> Option<Self> {
        let n = points.len();
        if n < 2 {
            return None;
        }
        let centroid = points
            .iter()
            .fold(Vec2::ZERO, |acc, p| acc + p.to_vec2())
            / n as f64;
        let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
        for p in points {
            let dx = p.x - centroid.x;
            let dy = p.y - centroid.y;
            sxx += dx * dx;
            sxy += dx * dy;
            syy += dy * dy;
        }
        let eigen = SymmetricEigen::new(Matrix2::new(sxx, sxy, sxy, syy));
        let major = if eigen.eigenvalues[0] >= eigen.eigenvalues[1] { 0 } else { 1 };
        let axis = Vec2::new(eigen.eigenvectors[(0, major)], eigen.eigenvectors[(1, major)]);
        if !(axis.hypot() > 0.0) {
            return None;
        }
        let origin = centroid.to_point();
        let project = |p: Point| origin + axis * ((p - origin).dot(axis) / axis.hypot2());
        let first = project(points[0]);
        let last = project(points[n - 1]);
        if first == last {
            return None;
        }
        let mut line = Self { first, last, distance: 0.0 };
        line.distance = line.distance_to(points);
        Some(line)
    }

    /// Root mean square of the perpendicular distance of `points`.
    pub fn distance_to(&self, points: &[Point]) -> f64 {
        if points.is_empty() {
            return 0.0;
        }
        let sum: f64 = points
            .iter()
            .map(|&p| {
                let d = pt_line_dist(self.first, self.last, p);
                d * d
            })
            .sum();
        (sum / points.len() as f64).sqrt()
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn first(&self) -> Point {
        self.first
    }

    pub fn last(&self) -> Point {
        self.last
    }

    /// dx/dy, infinite for a horizontal line.
    pub fn inv_slope(&self) -> f64 {
        let d = self.last - self.first;
        d.x / d.y
    }

    pub fn reversed(&self) -> Self {
        Self {
            first: self.last,
            last: self.first,
            distance: self.distance,
        }
    }

    /// Unit direction at one end, pointing away from the segment.
    pub fn end_vector(&self, reverse: bool) -> Vec2 {
        let d = if reverse { self.first - self.last } else { self.last - self.first };
        d / d.hypot()
    }

    pub fn middle(&self) -> Point {
        self.first.midpoint(self.last)
    }

    /// Left-to-right straight cubic.
    pub fn curve(&self) -> CubicBez {
        let (a, b) = if self.first.x <= self.last.x {
            (self.first, self.last)
        } else {
            (self.last, self.first)
        };
        CubicBez::new(a, a.lerp(b, 1.0 / 3.0), a.lerp(b, 2.0 / 3.0), b)
    }
}
