//! Candidate curve: an ordered chain of oriented arcs with its models.

use kurbo::{CubicBez, Point, Vec2};

use crate::arc::{to_point, Arc, ArcId, ArcRef, Pixel};
use crate::config::Params;
use crate::error::CurveError;
use crate::geom::{relative_ccw, unit};
use crate::model::{compute_model, side_model, Model};
use crate::sheet::LineRef;

/// One candidate slur.
///
/// Models are computed at creation: the global model over all points and
/// an osculating model per side when the curve is longer than the side
/// length. Shorter curves answer their global model on both sides.
#[derive(Debug, Clone)]
pub struct CurveInfo {
    id: usize,
    arcs: Vec<ArcRef>,
    /// Arc points, without junctions.
    points: Vec<Pixel>,
    /// Arc points with inner junctions.
    joined: Vec<Point>,
    first_junction: Option<Pixel>,
    last_junction: Option<Pixel>,
    first: Pixel,
    last: Pixel,
    global: Option<Model>,
    first_model: Option<Model>,
    last_model: Option<Model>,
    side_length: usize,
    crossed_line: Option<LineRef>,
}

impl CurveInfo {
    /// Build a curve from a chain of arcs, re-orienting inner arcs so that
    /// consecutive arcs meet at their common junction.
    pub fn new(
        id: usize,
        arcs: Vec<ArcRef>,
        store: &[Arc],
        global: Option<Model>,
        params: &Params,
    ) -> Result<Self, CurveError> {
        if arcs.is_empty() {
            return Err(CurveError::BrokenCurve { id, reason: "no arc" });
        }
        let arcs = orient_chain(arcs, store);
        let points: Vec<Pixel> = arcs.iter().flat_map(|a| a.view(store).points()).collect();
        let joined = points_of(&arcs, store);

        let head = arcs[0].view(store);
        let tail = arcs[arcs.len() - 1].view(store);
        let first = if head.is_empty() { head.junction(false) } else { head.end(true) };
        let last = if tail.is_empty() { tail.junction(true) } else { tail.end(false) };
        let (Some(first), Some(last)) = (first, last) else {
            return Err(CurveError::BrokenCurve { id, reason: "end point undefined" });
        };

        let global = global.or_else(|| compute_model(&joined, params));
        let side_length = params.side_length;
        let (first_model, last_model) = if points.len() > side_length {
            (
                side_model(&joined, true, side_length),
                side_model(&joined, false, side_length),
            )
        } else {
            (None, None)
        };

        Ok(Self {
            id,
            first_junction: head.junction(true),
            last_junction: tail.junction(false),
            arcs,
            points,
            joined,
            first,
            last,
            global,
            first_model,
            last_model,
            side_length,
            crossed_line: None,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn arcs(&self) -> &[ArcRef] {
        &self.arcs
    }

    pub fn arc_ids(&self) -> Vec<ArcId> {
        self.arcs.iter().map(|a| a.id).collect()
    }

    pub fn contains_arc(&self, id: ArcId) -> bool {
        self.arcs.iter().any(|a| a.id == id)
    }

    /// Number of arc points; junctions are not counted.
    pub fn length(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[Pixel] {
        &self.points
    }

    /// Arc points with inner junctions, as fitted by the models.
    pub fn joined_points(&self) -> &[Point] {
        &self.joined
    }

    /// First (`reverse`) or last point.
    pub fn end(&self, reverse: bool) -> Pixel {
        if reverse {
            self.first
        } else {
            self.last
        }
    }

    pub fn junction(&self, reverse: bool) -> Option<Pixel> {
        if reverse {
            self.first_junction
        } else {
            self.last_junction
        }
    }

    pub fn end_arc(&self, reverse: bool) -> ArcRef {
        if reverse {
            self.arcs[0]
        } else {
            self.arcs[self.arcs.len() - 1]
        }
    }

    pub fn global_model(&self) -> Option<&Model> {
        self.global.as_ref()
    }

    /// Osculating model on one side, the global model for short curves.
    pub fn side_model(&self, reverse: bool) -> Option<&Model> {
        let side = if reverse { &self.first_model } else { &self.last_model };
        if side.is_none() && self.length() <= self.side_length {
            self.global.as_ref()
        } else {
            side.as_ref()
        }
    }

    pub fn set_side_model(&mut self, model: Option<Model>, reverse: bool) {
        if reverse {
            self.first_model = model;
        } else {
            self.last_model = model;
        }
    }

    /// Up to `side_length` arc points at one end.
    pub fn side_points(&self, reverse: bool) -> Vec<Point> {
        let n = self.points.len();
        let count = self.side_length.min(n);
        let side = if reverse { &self.points[..count] } else { &self.points[n - count..] };
        side.iter().map(|&p| to_point(p)).collect()
    }

    pub fn crossed_line(&self) -> Option<LineRef> {
        self.crossed_line
    }

    pub fn set_crossed_line(&mut self, line: Option<LineRef>) {
        self.crossed_line = line;
    }

    /// Outward unit tangent at one end.
    pub fn end_vector(&self, reverse: bool) -> Option<Vec2> {
        self.side_model(reverse)
            .or(self.global.as_ref())
            .map(|m| m.end_vector(reverse))
    }

    /// Half-way point of the global model.
    pub fn mid_point(&self) -> Option<Point> {
        self.global.as_ref().and_then(Model::middle)
    }

    fn middle_sample(&self) -> Point {
        self.joined[self.joined.len() / 2]
    }

    /// 1 when the curve bends upwards (above its notes), -1 otherwise.
    pub fn above(&self) -> i32 {
        let (first, last) = (to_point(self.first), to_point(self.last));
        let ccw = relative_ccw(first, self.middle_sample(), last);
        let above = if first.x < last.x { ccw == -1 } else { ccw == 1 };
        if above {
            1
        } else {
            -1
        }
    }

    /// Slope of the chord between both ends, `None` for a vertical or
    /// null chord.
    pub fn chord_slope(&self) -> Option<f64> {
        let d = to_point(self.last) - to_point(self.first);
        (d.x != 0.0).then(|| d.y / d.x)
    }

    /// Unit vector normal to the chord, pointing to the concave side.
    pub fn bisector_unit(&self) -> Vec2 {
        let (first, last) = (to_point(self.first), to_point(self.last));
        let Some(normal) = unit((last - first).turn_90()) else {
            return Vec2::new(0.0, f64::from(self.above()));
        };
        let bulge = self.middle_sample() - first.midpoint(last);
        let toward = bulge.dot(normal);
        if toward > 0.0 || (toward == 0.0 && self.above() * (normal.y.signum() as i32) < 0) {
            -normal
        } else {
            normal
        }
    }

    /// Left-to-right cubic: left half of the left side model, right half of
    /// the right side model, control vectors stretched so that the middle
    /// lands on the sampled middle point.
    pub fn curve(&self) -> Option<CubicBez> {
        let (left_model, right_model) = if self.first.0 <= self.last.0 {
            (self.side_model(true)?, self.side_model(false)?)
        } else {
            (self.side_model(false)?, self.side_model(true)?)
        };
        if left_model == right_model {
            return left_model.curve();
        }
        let left = left_model.curve()?;
        let right = right_model.curve()?;
        let (p1, c1, c2, p2) = (left.p0, left.p1, right.p2, right.p3);

        let mid = self.middle_sample();
        let m = Point::new(
            (p1.x + p2.x + 3.0 * (c1.x + c2.x)) / 8.0,
            (p1.y + p2.y + 3.0 * (c1.y + c2.y)) / 8.0,
        );
        let delta_m = mid.distance(m);
        let pc = ((c1.to_vec2() + c2.to_vec2()) - (p1.to_vec2() + p2.to_vec2())).hypot() / 2.0;
        if pc == 0.0 {
            return Some(CubicBez::new(p1, c1, c2, p2));
        }
        let ratio = 1.0 + (4.0 * delta_m) / (3.0 * pc);
        Some(CubicBez::new(p1, p1 + (c1 - p1) * ratio, p2 + (c2 - p2) * ratio, p2))
    }

    /// Arcs of this curve extended by one arc on the given side.
    pub fn arcs_with(&self, arc: ArcRef, reverse: bool) -> Vec<ArcRef> {
        let mut all = Vec::with_capacity(self.arcs.len() + 1);
        if reverse {
            all.push(arc);
            all.extend_from_slice(&self.arcs);
        } else {
            all.extend_from_slice(&self.arcs);
            all.push(arc);
        }
        all
    }
}

/// Arcs of a left-side candidate followed by the arcs of a right-side
/// candidate, their shared trunk kept once.
pub fn arcs_of(left: &CurveInfo, right: &CurveInfo) -> Vec<ArcRef> {
    let mut all: Vec<ArcRef> = left
        .arcs
        .iter()
        .copied()
        .filter(|a| !right.contains_arc(a.id))
        .collect();
    all.extend_from_slice(&right.arcs);
    all
}

/// Arc points with inner junctions inserted between consecutive arcs.
pub fn points_of(arcs: &[ArcRef], store: &[Arc]) -> Vec<Point> {
    let mut all = Vec::new();
    for (i, a) in arcs.iter().enumerate() {
        let view = a.view(store);
        all.extend(view.points().map(to_point));
        if i + 1 < arcs.len() {
            if let Some(j) = view.junction(false) {
                all.push(to_point(j));
            }
        }
    }
    all
}

/// Flip inner arcs so that each one starts at the junction it shares with
/// its predecessor.
fn orient_chain(mut arcs: Vec<ArcRef>, store: &[Arc]) -> Vec<ArcRef> {
    for i in 1..arcs.len() {
        let a0 = arcs[i - 1].view(store);
        let a1 = arcs[i].view(store);
        let common = [a0.junction(true), a0.junction(false)]
            .into_iter()
            .flatten()
            .find(|j| a1.junction(true) == Some(*j) || a1.junction(false) == Some(*j));
        if let Some(common) = common {
            if a1.junction(false) == Some(common) && a1.junction(true) != Some(common) {
                arcs[i] = arcs[i].flipped();
            }
        }
    }
    arcs
}
