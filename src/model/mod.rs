//! Geometric models fitted to skeleton points.
//!
//! A slur is modeled by a circle arc, with a straight line as fallback for
//! nearly flat point sequences. Models are computed at three granularities
//! sharing the same thresholds: whole curves, curve sides (osculating
//! models on the terminal points) and extension arcs checked against a
//! side model.

pub mod circle;
pub mod line;

use kurbo::{CubicBez, Point, Vec2};
use serde::Serialize;

use crate::config::Params;

pub use circle::{bezier_middle, Circle};
pub use line::LineModel;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Model {
    Circle(Circle),
    Line(LineModel),
}

impl Model {
    /// Fit distance measured when the model was computed.
    pub fn distance(&self) -> f64 {
        match self {
            Model::Circle(c) => c.distance(),
            Model::Line(l) => l.distance(),
        }
    }

    /// Winding sign, 0 for a line.
    pub fn ccw(&self) -> i32 {
        match self {
            Model::Circle(c) => c.ccw(),
            Model::Line(_) => 0,
        }
    }

    pub fn as_circle(&self) -> Option<&Circle> {
        match self {
            Model::Circle(c) => Some(c),
            Model::Line(_) => None,
        }
    }

    pub fn reversed(&self) -> Self {
        match self {
            Model::Circle(c) => Model::Circle(c.reversed()),
            Model::Line(l) => Model::Line(l.reversed()),
        }
    }

    pub fn end_vector(&self, reverse: bool) -> Vec2 {
        match self {
            Model::Circle(c) => c.end_vector(reverse),
            Model::Line(l) => l.end_vector(reverse),
        }
    }

    pub fn curve(&self) -> Option<CubicBez> {
        match self {
            Model::Circle(c) => c.curve(),
            Model::Line(l) => Some(l.curve()),
        }
    }

    /// Half-way point of the modeled curve.
    pub fn middle(&self) -> Option<Point> {
        match self {
            Model::Circle(c) => c.curve().map(|curve| bezier_middle(&curve)),
            Model::Line(l) => Some(l.middle()),
        }
    }

    /// Fit distance of `points` to this model.
    pub fn distance_to(&self, points: &[Point]) -> f64 {
        match self {
            Model::Circle(c) => c.distance_to(points),
            Model::Line(l) => l.distance_to(points),
        }
    }
}

/// Global model of a point sequence.
///
/// A rough circle through first, middle and last points screens the
/// sequence, then a least-squares circle refines it. The rough circle is
/// kept when both radii disagree, as algebraic fits go astray on short
/// arcs. Flat sequences fall back to a line.
pub fn compute_model(points: &[Point], params: &Params) -> Option<Model> {
    let n = points.len();
    if n < 3 {
        return line_model(points, params);
    }
    let (p0, p1, p2) = (points[0], points[n / 2], points[n - 1]);
    let Some(rough) = Circle::through(p0, p1, p2) else {
        return line_model(points, params);
    };

    let r1 = rough.radius();
    if r1 < params.min_circle_radius {
        tracing::trace!("radius too small {:.1} at {:?}", r1, p0);
        return None;
    }
    if r1 > params.max_circle_radius {
        return line_model(points, params);
    }
    if rough.arc_angle() > params.max_arc_angle_high {
        tracing::trace!("arc angle too large {:.1} at {:?}", rough.arc_angle().to_degrees(), p0);
        return None;
    }

    let circle = match Circle::fit(points) {
        Some(fitted) if (r1 - fitted.radius()).abs() / r1.max(fitted.radius()) <= params.similar_radius_ratio => {
            fitted
        }
        _ => rough.with_distance(points),
    };
    if circle.distance() > params.max_arcs_distance {
        tracing::trace!("bad circle fit {:.2} at {:?}", circle.distance(), p0);
        return None;
    }
    Some(Model::Circle(circle))
}

fn line_model(points: &[Point], params: &Params) -> Option<Model> {
    LineModel::fit(points)
        .filter(|line| line.distance() <= params.max_arcs_distance)
        .map(Model::Line)
}

/// Osculating model on the first (`reverse`) or last `side_length` points.
///
/// Only the rough circle is used here, with a line for flat sides.
pub fn side_model(points: &[Point], reverse: bool, side_length: usize) -> Option<Model> {
    let n = points.len();
    if side_length < 3 || n < side_length {
        return None;
    }
    let side = if reverse {
        &points[..side_length]
    } else {
        &points[n - side_length..]
    };
    let (p0, p1, p2) = (side[0], side[side_length / 2], side[side_length - 1]);
    match Circle::through(p0, p1, p2) {
        Some(rough) => Some(Model::Circle(rough.with_distance(side))),
        None => LineModel::fit(side).map(Model::Line),
    }
}
