//! Skeleton arcs and their per-use orientation.
//!
//! Arcs live in an arena owned by the skeleton and are referenced by
//! `ArcId`. A curve never reverses a shared arc in place: it holds an
//! `ArcRef` whose `reversed` bit tells how the arc is walked.

use kurbo::Point;
use serde::Serialize;

use crate::model::Model;

/// Integer pixel coordinates.
pub type Pixel = (i32, i32);

pub fn to_point(p: Pixel) -> Point {
    Point::new(p.0 as f64, p.1 as f64)
}

/// Shape classification of an arc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ArcShape {
    /// Not yet known.
    Unknown,
    /// Too short to be classified.
    Short,
    /// Circular.
    Slur,
    /// Straight.
    Line,
    /// Along a staff line.
    StaffArc,
    /// Of no use for slurs.
    Irrelevant,
}

impl ArcShape {
    pub fn is_slur_relevant(self) -> bool {
        matches!(
            self,
            ArcShape::Short | ArcShape::Slur | ArcShape::Line | ArcShape::StaffArc
        )
    }

    pub fn is_wedge_relevant(self) -> bool {
        matches!(self, ArcShape::Short | ArcShape::Line)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ArcId(pub usize);

/// A run of skeleton pixels between junctions.
///
/// A void arc has no point and links two touching junctions.
#[derive(Debug, Clone, PartialEq)]
pub struct Arc {
    points: Vec<Pixel>,
    first_junction: Option<Pixel>,
    last_junction: Option<Pixel>,
    shape: ArcShape,
    model: Option<Model>,
    assigned: bool,
}

impl Arc {
    pub fn new(first_junction: Option<Pixel>) -> Self {
        Self {
            points: Vec::new(),
            first_junction,
            last_junction: None,
            shape: ArcShape::Unknown,
            model: None,
            assigned: false,
        }
    }

    /// Zero-length arc between two adjacent junctions.
    pub fn void(first: Pixel, last: Pixel) -> Self {
        Self {
            last_junction: Some(last),
            shape: ArcShape::Short,
            ..Self::new(Some(first))
        }
    }

    pub fn from_points(points: Vec<Pixel>, first_junction: Option<Pixel>, last_junction: Option<Pixel>) -> Self {
        Self {
            points,
            last_junction,
            ..Self::new(first_junction)
        }
    }

    pub(crate) fn add_point(&mut self, p: Pixel, reverse: bool) {
        if reverse {
            self.points.insert(0, p);
        } else {
            self.points.push(p);
        }
    }

    pub(crate) fn set_junction(&mut self, junction: Pixel, reverse: bool) {
        if reverse {
            self.first_junction = Some(junction);
        } else {
            self.last_junction = Some(junction);
        }
    }

    pub(crate) fn set_shape(&mut self, shape: ArcShape) {
        self.shape = shape;
    }

    pub(crate) fn set_model(&mut self, model: Option<Model>) {
        self.model = model;
    }

    pub(crate) fn set_assigned(&mut self, assigned: bool) {
        self.assigned = assigned;
    }

    pub fn points(&self) -> &[Pixel] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// First (`reverse`) or last point.
    pub fn end(&self, reverse: bool) -> Option<Pixel> {
        if reverse {
            self.points.first().copied()
        } else {
            self.points.last().copied()
        }
    }

    /// Junction at the first (`reverse`) or last end.
    pub fn junction(&self, reverse: bool) -> Option<Pixel> {
        if reverse {
            self.first_junction
        } else {
            self.last_junction
        }
    }

    pub fn shape(&self) -> ArcShape {
        self.shape
    }

    pub fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    pub fn is_assigned(&self) -> bool {
        self.assigned
    }

    /// Flip the arc: points, junctions and model.
    pub fn reverse(&mut self) {
        self.points.reverse();
        std::mem::swap(&mut self.first_junction, &mut self.last_junction);
        if let Some(model) = self.model.take() {
            self.model = Some(model.reversed());
        }
    }

    /// Make the arc run left to right.
    pub fn check_orientation(&mut self) {
        if let (Some(first), Some(last)) = (self.end(true), self.end(false)) {
            if first.0 > last.0 {
                self.reverse();
            }
        }
    }
}

/// Reference to an arena arc with the orientation it is used with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ArcRef {
    pub id: ArcId,
    pub reversed: bool,
}

impl ArcRef {
    pub fn new(id: ArcId) -> Self {
        Self { id, reversed: false }
    }

    pub fn flipped(self) -> Self {
        Self {
            reversed: !self.reversed,
            ..self
        }
    }

    pub fn view(self, arcs: &[Arc]) -> ArcView<'_> {
        ArcView {
            arc: &arcs[self.id.0],
            reversed: self.reversed,
        }
    }
}

/// Oriented read-only view of an arc.
#[derive(Debug, Clone, Copy)]
pub struct ArcView<'a> {
    arc: &'a Arc,
    reversed: bool,
}

impl<'a> ArcView<'a> {
    pub fn arc(&self) -> &'a Arc {
        self.arc
    }

    pub fn len(&self) -> usize {
        self.arc.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arc.is_empty()
    }

    pub fn points(&self) -> impl DoubleEndedIterator<Item = Pixel> + 'a {
        let pts = self.arc.points();
        let n = pts.len();
        let reversed = self.reversed;
        (0..n).map(move |i| if reversed { pts[n - 1 - i] } else { pts[i] })
    }

    pub fn end(&self, reverse: bool) -> Option<Pixel> {
        self.arc.end(reverse != self.reversed)
    }

    pub fn junction(&self, reverse: bool) -> Option<Pixel> {
        self.arc.junction(reverse != self.reversed)
    }

    /// `count` points at the first (`reverse`) or last end, in view order.
    pub fn side_points(&self, count: usize, reverse: bool) -> Vec<Pixel> {
        let all: Vec<Pixel> = self.points().collect();
        let count = count.min(all.len());
        if reverse {
            all[..count].to_vec()
        } else {
            all[all.len() - count..].to_vec()
        }
    }

    pub fn model(&self) -> Option<Model> {
        let model = self.arc.model()?;
        Some(if self.reversed { model.reversed() } else { model.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Arc {
        Arc::from_points(vec![(5, 1), (4, 2), (3, 2), (2, 3)], Some((6, 0)), Some((1, 4)))
    }

    #[test]
    fn reversal_is_involutive() {
        let original = sample();
        let mut arc = original.clone();
        arc.reverse();
        assert_eq!(arc.end(true), Some((2, 3)));
        assert_eq!(arc.junction(true), Some((1, 4)));
        arc.reverse();
        assert_eq!(arc, original);
    }

    #[test]
    fn orientation_goes_left_to_right() {
        let mut arc = sample();
        arc.check_orientation();
        let (first, last) = (arc.end(true).unwrap(), arc.end(false).unwrap());
        assert!(last.0 >= first.0, "first {:?} last {:?}", first, last);
        assert_eq!(arc.junction(false), Some((6, 0)));
    }

    #[test]
    fn views_flip_without_touching_the_arc() {
        let arcs = vec![sample()];
        let view = ArcRef::new(ArcId(0)).flipped().view(&arcs);
        let pts: Vec<Pixel> = view.points().collect();
        assert_eq!(pts, vec![(2, 3), (3, 2), (4, 2), (5, 1)]);
        assert_eq!(view.junction(true), Some((1, 4)));
        assert_eq!(view.side_points(2, false), vec![(4, 2), (5, 1)]);
        assert_eq!(arcs[0], sample());
    }

    #[test]
    fn void_arc_is_slur_relevant() {
        let arc = Arc::void((3, 3), (4, 4));
        assert!(arc.is_empty());
        assert!(arc.shape().is_slur_relevant());
        assert_eq!(arc.end(true), None);
    }
}
