//! Circle model: 3-point circles, algebraic least-squares fit and the
//! cubic Bézier approximation of the covered arc.

use std::f64::consts::PI;

use kurbo::{CubicBez, Point, Vec2};
use nalgebra::{Matrix3, Vector3};
use serde::Serialize;

use crate::geom::{line_intersection, relative_ccw};

/// A circle arc, oriented from a first point to a last point.
///
/// Angles are measured in a y-down frame with `atan2(y - cy, x - cx)` and
/// lie within `-PI..=PI`. `ccw` is +1 for an arc turning counter-clockwise
/// (on screen) and -1 for clockwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Circle {
    center: Point,
    radius: f64,
    first_angle: f64,
    last_angle: f64,
    ccw: i32,
    distance: f64,
}

impl Circle {
    /// Circle through three points, `None` when they are collinear.
    pub fn through(first: Point, middle: Point, last: Point) -> Option<Self> {
        let m1 = first.midpoint(middle);
        let m2 = middle.midpoint(last);
        let d1 = (middle - first).turn_90();
        let d2 = (last - middle).turn_90();
        let center = line_intersection(m1, m1 + d1, m2, m2 + d2)?;
        let radius = center.distance(middle);
        if !radius.is_finite() {
            return None;
        }
        Some(Self::oriented(center, radius, first, middle, last))
    }

    /// Algebraic least-squares circle through all points.
    ///
    /// Solves `x² + y² + Dx + Ey + F = 0` around the centroid. Returns
    /// `None` for fewer than 3 points or a singular system.
    pub fn fit(points: &[Point]) -> Option<Self> {
        let n = points.len();
        if n < 3 {
            return None;
        }
        let centroid = points
            .iter()
            .fold(Vec2::ZERO, |acc, p| acc + p.to_vec2())
            / n as f64;

        let mut a = Matrix3::<f64>::zeros();
        let mut b = Vector3::<f64>::zeros();
        for p in points {
            let u = p.x - centroid.x;
            let v = p.y - centroid.y;
            let row = Vector3::new(u, v, 1.0);
            a += row * row.transpose();
            b -= row * (u * u + v * v);
        }
        let sol = a.lu().solve(&b)?;
        let (cu, cv) = (-sol[0] / 2.0, -sol[1] / 2.0);
        let r_sq = cu * cu + cv * cv - sol[2];
        if !(r_sq.is_finite() && r_sq > 0.0) {
            return None;
        }
        let center = Point::new(cu + centroid.x, cv + centroid.y);
        let circle = Self::oriented(center, r_sq.sqrt(), points[0], points[n / 2], points[n - 1]);
        Some(circle.with_distance(points))
    }

    fn oriented(center: Point, radius: f64, first: Point, middle: Point, last: Point) -> Self {
        let angle_of = |p: Point| (p.y - center.y).atan2(p.x - center.x);
        Self {
            center,
            radius,
            first_angle: angle_of(first),
            last_angle: angle_of(last),
            ccw: relative_ccw(first, middle, last),
            distance: 0.0,
        }
    }

    /// Same circle with its fit distance measured on `points`.
    pub fn with_distance(mut self, points: &[Point]) -> Self {
        self.distance = self.distance_to(points);
        self
    }

    /// Root mean square of the radial deviation of `points`.
    pub fn distance_to(&self, points: &[Point]) -> f64 {
        if points.is_empty() {
            return 0.0;
        }
        let sum: f64 = points
            .iter()
            .map(|p| {
                let delta = p.distance(self.center) - self.radius;
                delta * delta
            })
            .sum();
        (sum / points.len() as f64).sqrt()
    }

    pub fn center(&self) -> Point {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn ccw(&self) -> i32 {
        self.ccw
    }

    pub fn first_angle(&self) -> f64 {
        self.first_angle
    }

    pub fn last_angle(&self) -> f64 {
        self.last_angle
    }

    /// Angle at the first end (`reverse`) or the last end.
    pub fn angle(&self, reverse: bool) -> f64 {
        if reverse {
            self.first_angle
        } else {
            self.last_angle
        }
    }

    /// Whether the arc bends upwards, i.e. lies above its embraced notes.
    pub fn is_above(&self, first: Point, last: Point) -> bool {
        if first.x < last.x {
            self.ccw == -1
        } else {
            self.ccw == 1
        }
    }

    /// Positive arc span, within `0..2*PI`.
    pub fn arc_angle(&self) -> f64 {
        let arc = if self.ccw == 1 {
            self.first_angle - self.last_angle
        } else {
            self.last_angle - self.first_angle
        };
        if arc < 0.0 {
            arc + 2.0 * PI
        } else {
            arc
        }
    }

    /// Angle of the arc middle, within `-PI..=PI`.
    pub fn mid_angle(&self) -> f64 {
        let half = self.arc_angle() / 2.0;
        let mut mid = if self.ccw == 1 {
            self.first_angle - half
        } else {
            self.first_angle + half
        };
        if mid < -PI {
            mid += 2.0 * PI;
        }
        if mid > PI {
            mid -= 2.0 * PI;
        }
        mid
    }

    /// Same circle, oriented from last to first.
    pub fn reversed(&self) -> Self {
        Self {
            first_angle: self.last_angle,
            last_angle: self.first_angle,
            ccw: -self.ccw,
            ..self.clone()
        }
    }

    /// Unit tangent at one end, pointing away from the arc.
    pub fn end_vector(&self, reverse: bool) -> Vec2 {
        let dir = if reverse { self.ccw } else { -self.ccw } as f64;
        let angle = self.angle(reverse);
        Vec2::new(-dir * angle.sin(), dir * angle.cos())
    }

    /// Left-to-right cubic approximating the arc, `None` for a null arc.
    pub fn curve(&self) -> Option<CubicBez> {
        let arc = self.arc_angle();
        let x0 = (arc / 2.0).cos();
        let y0 = (arc / 2.0).sin();
        if y0.abs() < 1e-9 {
            return None;
        }
        let x1 = (4.0 - x0) / 3.0;
        let y1 = ((1.0 - x0) * (3.0 - x0)) / (3.0 * y0);

        let theta = self.mid_angle();
        let (sin, cos) = theta.sin_cos();
        let place = |x: f64, y: f64| {
            Point::new(
                self.center.x + self.radius * (x * cos - y * sin),
                self.center.y + self.radius * (x * sin + y * cos),
            )
        };
        let m0 = place(x0, y0);
        let m1 = place(x1, y1);
        let m2 = place(x1, -y1);
        let m3 = place(x0, -y0);
        if m0.x <= m3.x {
            Some(CubicBez::new(m0, m1, m2, m3))
        } else {
            Some(CubicBez::new(m3, m2, m1, m0))
        }
    }
}

/// Half-way point of a cubic.
pub fn bezier_middle(c: &CubicBez) -> Point {
    Point::new(
        (c.p0.x + 3.0 * c.p1.x + 3.0 * c.p2.x + c.p3.x) / 8.0,
        (c.p0.y + 3.0 * c.p1.y + 3.0 * c.p2.y + c.p3.y) / 8.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arch(radius: f64, from_deg: f64, to_deg: f64, n: usize) -> Vec<Point> {
        // Upper half of a circle centered at (100, 100), left to right.
        (0..n)
            .map(|i| {
                let t = from_deg + (to_deg - from_deg) * i as f64 / (n - 1) as f64;
                let a = t.to_radians();
                Point::new(100.0 + radius * a.cos(), 100.0 - radius * a.sin())
            })
            .collect()
    }

    #[test]
    fn three_point_circle_recovers_center() {
        let c = Circle::through(
            Point::new(0.0, 10.0),
            Point::new(10.0, 0.0),
            Point::new(20.0, 10.0),
        )
        .unwrap();
        assert!((c.center().x - 10.0).abs() < 1e-9);
        assert!((c.center().y - 10.0).abs() < 1e-9);
        assert!((c.radius() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn collinear_points_have_no_circle() {
        let c = Circle::through(
            Point::new(0.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(10.0, 0.0),
        );
        assert!(c.is_none());
    }

    #[test]
    fn least_squares_fit_on_exact_arc() {
        let points = arch(40.0, 150.0, 30.0, 25);
        let c = Circle::fit(&points).unwrap();
        assert!((c.radius() - 40.0).abs() < 1e-6, "radius {}", c.radius());
        assert!(c.distance() < 1e-6);
        assert_eq!(c.ccw(), -1);
        assert!(c.is_above(points[0], points[24]));
        assert!((c.arc_angle().to_degrees() - 120.0).abs() < 1e-6);
        assert!((c.mid_angle().to_degrees() + 90.0).abs() < 1e-6);
    }

    #[test]
    fn reversal_keeps_the_arc_span() {
        let points = arch(40.0, 150.0, 30.0, 25);
        let c = Circle::fit(&points).unwrap();
        let r = c.reversed();
        assert!((r.arc_angle() - c.arc_angle()).abs() < 1e-9);
        assert!((r.mid_angle() - c.mid_angle()).abs() < 1e-9);
        assert_eq!(r.reversed(), c);
    }

    #[test]
    fn end_vectors_point_outwards() {
        let points = arch(40.0, 150.0, 30.0, 25);
        let c = Circle::fit(&points).unwrap();
        let left = c.end_vector(true);
        let right = c.end_vector(false);
        assert!(left.x < 0.0 && left.y > 0.0, "left {:?}", left);
        assert!(right.x > 0.0 && right.y > 0.0, "right {:?}", right);
    }

    #[test]
    fn bezier_matches_arc_ends_and_middle() {
        let points = arch(40.0, 150.0, 30.0, 25);
        let c = Circle::fit(&points).unwrap();
        let curve = c.curve().unwrap();
        assert!(curve.p0.distance(points[0]) < 1e-6);
        assert!(curve.p3.distance(points[24]) < 1e-6);
        let mid = bezier_middle(&curve);
        assert!((mid.y - 60.0).abs() < 0.05, "middle {:?}", mid);
    }
}
