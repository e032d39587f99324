//! Curve retrieval: grow seed arcs into full curves and keep the best one
//! per clump.
//!
//! Seeds are tried longest first, slur-shaped arcs before the others. Each
//! seed is extended on both sides, the candidates of each side are weeded,
//! then every left candidate is combined with every right candidate. The
//! clump linker picks the winner, whose arcs get assigned.

pub mod extension;
pub mod grade;

use kurbo::{CubicBez, Point};
use serde::Serialize;

use crate::arc::{to_point, Arc, ArcId, ArcRef, ArcShape, Pixel};
use crate::config::Params;
use crate::curve::{arcs_of, CurveInfo};
use crate::linker::{ClumpLinker, NoteLink, Side};
use crate::sheet::SheetLayout;
use crate::skeleton::Skeleton;

use extension::Extender;
use grade::{compute_impacts, purge_identical_endings, weed_candidates, Impacts};

/// A retrieved slur.
#[derive(Debug, Clone, Serialize)]
pub struct AcceptedCurve {
    pub id: usize,
    pub first: Point,
    pub last: Point,
    /// Left-to-right cubic approximation.
    pub curve: CubicBez,
    pub impacts: Impacts,
    pub grade: f64,
    pub arcs: Vec<ArcId>,
    pub left: Option<NoteLink>,
    pub right: Option<NoteLink>,
}

impl AcceptedCurve {
    pub fn link(&self, side: Side) -> Option<NoteLink> {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }
}

/// Two accepted curves linked to the same note on the same side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Collision {
    pub note: usize,
    pub side: Side,
    pub curves: (usize, usize),
}

pub struct CurveRetriever<'a> {
    skeleton: &'a mut Skeleton,
    sheet: &'a dyn SheetLayout,
    params: &'a Params,
    /// Last candidate id handed out, page-wide.
    last_id: usize,
    accepted: Vec<AcceptedCurve>,
}

impl<'a> CurveRetriever<'a> {
    pub fn new(skeleton: &'a mut Skeleton, sheet: &'a dyn SheetLayout, params: &'a Params) -> Self {
        Self {
            skeleton,
            sheet,
            params,
            last_id: 0,
            accepted: Vec::new(),
        }
    }

    /// Run both seed passes and return the accepted curves.
    pub fn retrieve(mut self) -> Vec<AcceptedCurve> {
        let seeds = self.seed_arcs();
        tracing::debug!("{} seed arcs", seeds.len());

        for &id in &seeds {
            let arc = self.skeleton.arc(id);
            if !arc.is_assigned() && arc.shape() == ArcShape::Slur {
                self.build_curve(id, None);
            }
        }
        // Arcs come longest first, so an extension never needs an arc
        // longer than its seed.
        for &id in &seeds {
            let arc = self.skeleton.arc(id);
            if !arc.is_assigned() && arc.shape() != ArcShape::Slur {
                let max_length = arc.len();
                self.build_curve(id, Some(max_length));
            }
        }
        for c in collisions(&self.accepted) {
            tracing::info!(
                "{:?} collision on note {}: curve#{} & curve#{}",
                c.side,
                c.note,
                c.curves.0,
                c.curves.1
            );
        }
        self.accepted
    }

    /// Slur-relevant arcs long enough to seed, left to right, longest first.
    fn seed_arcs(&mut self) -> Vec<ArcId> {
        let mut seeds: Vec<ArcId> = (0..self.skeleton.arcs().len())
            .map(ArcId)
            .filter(|&id| {
                let arc = self.skeleton.arc(id);
                arc.shape().is_slur_relevant() && arc.len() >= self.params.arc_min_seed_length
            })
            .collect();
        for &id in &seeds {
            self.skeleton.arc_mut(id).check_orientation();
        }
        seeds.sort_by_key(|&id| std::cmp::Reverse(self.skeleton.arc(id).len()));
        seeds
    }

    fn next_id(&mut self) -> usize {
        self.last_id += 1;
        self.last_id
    }

    /// Grow one seed and register the clump winner, if any.
    fn build_curve(&mut self, seed: ArcId, max_length: Option<usize>) {
        let id = self.next_id();
        let store = self.skeleton.arcs();
        let model = store[seed.0].model().cloned();
        let trunk = match CurveInfo::new(id, vec![ArcRef::new(seed)], store, model, self.params) {
            Ok(trunk) => trunk,
            Err(err) => {
                tracing::debug!("seed {:?} dropped: {}", seed, err);
                return;
            }
        };

        let skeleton: &Skeleton = self.skeleton;
        let mut sides: Vec<Vec<CurveInfo>> = Vec::with_capacity(2);
        for reverse in [true, false] {
            let mut extender = Extender::new(
                skeleton,
                self.sheet,
                self.params,
                reverse,
                max_length,
                &mut self.last_id,
            );
            let clump = extender.extend(trunk.clone());
            sides.push(if clump.len() > 1 {
                self.weed(clump, reverse)
            } else {
                clump
            });
        }
        let (lefts, rights) = (&sides[0], &sides[1]);

        let mut candidates: Vec<(CurveInfo, Impacts)> =
            combine(lefts, rights, skeleton.arcs(), self.params, &mut self.last_id)
                .into_iter()
                .filter(|curve| curve.curve().is_some())
                .filter_map(|curve| compute_impacts(&curve, None, self.params).map(|i| (curve, i)))
                .collect();
        if candidates.is_empty() {
            return;
        }
        tracing::debug!(
            "seed {:?}: {} left, {} right, {} candidates",
            seed,
            lefts.len(),
            rights.len(),
            candidates.len()
        );

        let curves: Vec<CurveInfo> = candidates.iter().map(|(c, _)| c.clone()).collect();
        let Some(selection) = ClumpLinker::new(self.sheet, self.params).prune(&curves) else {
            return;
        };
        let (winner, impacts) = candidates.swap_remove(selection.index);
        self.register(winner, impacts, selection.links.left, selection.links.right);
    }

    /// Drop weak candidates of one side.
    ///
    /// All candidates share the trunk end on the other side. Those stopping
    /// at the same point are reduced to the best one, those running into a
    /// staff line are dropped, then the quorum and grade rules apply.
    fn weed(&self, clump: Vec<CurveInfo>, reverse: bool) -> Vec<CurveInfo> {
        let graded: Vec<(CurveInfo, f64)> = clump
            .into_iter()
            .filter_map(|c| compute_impacts(&c, Some(reverse), self.params).map(|i| (c, i.grade())))
            .collect();
        let mut graded = purge_identical_endings(graded, |(c, _)| c.end(reverse), |(_, g)| *g);
        let store = self.skeleton.arcs();
        graded.retain(|(c, _)| {
            let staff_line = ends_on_staff_line(c, reverse, store, self.sheet, self.params);
            if staff_line {
                tracing::trace!("curve#{} ends along a staff line", c.id());
            }
            !staff_line
        });
        weed_candidates(graded, self.params.quorum_ratio, |(c, _)| c.length(), |(_, g)| *g)
            .into_iter()
            .map(|(c, _)| c)
            .collect()
    }

    fn register(&mut self, winner: CurveInfo, impacts: Impacts, left: Option<NoteLink>, right: Option<NoteLink>) {
        let Some(curve) = winner.curve() else {
            return;
        };
        for id in winner.arc_ids() {
            self.skeleton.arc_mut(id).set_assigned(true);
        }
        let accepted = AcceptedCurve {
            id: winner.id(),
            first: to_point(winner.end(true)),
            last: to_point(winner.end(false)),
            curve,
            grade: impacts.grade(),
            impacts,
            arcs: winner.arc_ids(),
            left,
            right,
        };
        tracing::debug!(
            "curve#{} accepted, {} arcs, grade {:.3}",
            accepted.id,
            accepted.arcs.len(),
            accepted.grade
        );
        self.accepted.push(accepted);
    }
}

/// Note links shared by several curves on the same side, in curve order.
pub fn collisions(curves: &[AcceptedCurve]) -> Vec<Collision> {
    let mut found = Vec::new();
    for (i, a) in curves.iter().enumerate() {
        for b in &curves[i + 1..] {
            for side in [Side::Left, Side::Right] {
                if let (Some(la), Some(lb)) = (a.link(side), b.link(side)) {
                    if la.note == lb.note {
                        found.push(Collision {
                            note: la.note,
                            side,
                            curves: (a.id, b.id),
                        });
                    }
                }
            }
        }
    }
    found
}

/// Whether the curve ends as a piece of staff line on the given side.
///
/// The end must lie close to a staff line, and either belong to a staff
/// arc or leave along the line with a low incidence.
pub fn ends_on_staff_line(
    curve: &CurveInfo,
    reverse: bool,
    store: &[Arc],
    sheet: &dyn SheetLayout,
    params: &Params,
) -> bool {
    let end = to_point(curve.end(reverse));
    let Some(line) = sheet.staff_at(end).and_then(|staff| staff.closest_line(end)) else {
        return false;
    };
    if (line.y_at(end.x) - end.y).abs() > params.max_staff_line_dy {
        return false;
    }
    if store[curve.end_arc(reverse).id.0].shape() == ArcShape::StaffArc {
        return true;
    }

    let points = curve.points();
    let n = points.len();
    let count = params.tangent_length.max(1);
    let run: &[Pixel] = if reverse { &points[..count.min(n)] } else { &points[n - count.min(n)..] };
    let (Some(&p1), Some(&p2)) = (run.first(), run.last()) else {
        return false;
    };
    let dx = f64::from((p2.0 - p1.0).abs());
    if dx < 1.0 {
        return false;
    }
    let dy = f64::from((p2.1 - p1.1).abs());
    (dy / dx).atan() <= params.max_staff_end_incidence
}

/// Full candidates from the surviving candidates of both sides.
///
/// A candidate present on both sides is used as is.
pub fn combine(
    lefts: &[CurveInfo],
    rights: &[CurveInfo],
    store: &[Arc],
    params: &Params,
    last_id: &mut usize,
) -> Vec<CurveInfo> {
    let mut all = Vec::new();
    for left in lefts {
        for right in rights {
            if left.id() == right.id() {
                all.push(left.clone());
                continue;
            }
            *last_id += 1;
            match CurveInfo::new(*last_id, arcs_of(left, right), store, None, params) {
                Ok(curve) => all.push(curve),
                Err(err) => tracing::debug!("combination dropped: {}", err),
            }
        }
    }
    all
}
