//! Extension search on one side of a trunk curve.
//!
//! Each candidate is extended by one arc at a time, past the end junction
//! (pivot scan), across a small gap, or across a tangent staff line (both
//! window scans). The search runs on an explicit worklist: every branch
//! owns its visited set, and siblings share their parent's set plus the
//! end arcs of all siblings.

use std::collections::HashSet;

use kurbo::{Point, Vec2};

use crate::arc::{to_point, ArcId, ArcRef, ArcShape, ArcView, Pixel};
use crate::config::Params;
use crate::curve::{points_of, CurveInfo};
use crate::geom::{unit, Area};
use crate::model::side_model;
use crate::sheet::{LineRef, SheetLayout, StaffLine};
use crate::skeleton::heading::{heading_between, is_side, scans, step};
use crate::skeleton::{Cell, Skeleton};

pub(crate) struct Extender<'a> {
    skeleton: &'a Skeleton,
    sheet: &'a dyn SheetLayout,
    params: &'a Params,
    /// Side being extended: first end when true, last end otherwise.
    reverse: bool,
    /// Longest arc an extension may pull in.
    max_length: Option<usize>,
    last_id: &'a mut usize,
}

impl<'a> Extender<'a> {
    pub(crate) fn new(
        skeleton: &'a Skeleton,
        sheet: &'a dyn SheetLayout,
        params: &'a Params,
        reverse: bool,
        max_length: Option<usize>,
        last_id: &'a mut usize,
    ) -> Self {
        Self {
            skeleton,
            sheet,
            params,
            reverse,
            max_length,
            last_id,
        }
    }

    /// All candidates reachable from the trunk on this side, trunk included.
    pub(crate) fn extend(&mut self, trunk: CurveInfo) -> Vec<CurveInfo> {
        let browsed: HashSet<ArcId> = trunk.arc_ids().into_iter().collect();
        let mut clump = Vec::new();
        let mut stack = vec![(trunk, browsed)];

        while let Some((curve, mut browsed)) = stack.pop() {
            if clump.len() >= self.params.max_clump_candidates {
                tracing::warn!(
                    "clump limit {} reached on {} side, search stopped",
                    self.params.max_clump_candidates,
                    if self.reverse { "first" } else { "last" }
                );
                break;
            }
            let found = self.extensions(&curve, &browsed);
            clump.push(curve);

            for ext in &found {
                browsed.insert(ext.end_arc(self.reverse).id);
            }
            for ext in found.into_iter().rev() {
                stack.push((ext, browsed.clone()));
            }
        }
        clump
    }

    fn next_id(&mut self) -> usize {
        *self.last_id += 1;
        *self.last_id
    }

    /// One-arc extensions of the curve on the current side.
    fn extensions(&mut self, curve: &CurveInfo, browsed: &HashSet<ArcId>) -> Vec<CurveInfo> {
        if let Some(line) = self.tangent_line(curve) {
            self.scan_gap(curve, browsed, Some(line))
        } else if let Some(pivot) = curve.junction(self.reverse) {
            self.scan_pivot(curve, pivot, browsed)
        } else {
            self.scan_gap(curve, browsed, None)
        }
    }

    /// Staff line the curve end is about to cross, if any.
    fn tangent_line(&self, curve: &CurveInfo) -> Option<(LineRef, &'a StaffLine)> {
        let sheet = self.sheet;
        let se = to_point(curve.end(self.reverse));
        let (line_ref, line) = sheet.staff_at(se)?.closest_line_ref(se)?;
        if curve.crossed_line() == Some(line_ref) {
            return None;
        }
        if (line.y_at(se.x) - se.y).abs() > self.params.max_staff_line_dy {
            return None;
        }

        let uv = curve.end_vector(self.reverse)?;
        let mid = curve.mid_point()?;
        let crossing = uv.y * (line.y_at(mid.x) - mid.y) > 0.0;
        let incidence = uv.y.abs().atan2(uv.x.abs());
        (crossing && incidence <= self.params.max_incidence).then_some((line_ref, line))
    }

    /// Lookup window past the curve end.
    ///
    /// Across a staff line the window hugs the far side of the line;
    /// otherwise it is a trapezoid widening along the end tangent.
    fn ext_area(&self, curve: &CurveInfo, line: Option<&StaffLine>) -> Option<Area> {
        let p = self.params;
        let se = to_point(curve.end(self.reverse));
        let uv = curve.end_vector(self.reverse)?;

        let vertices = match line {
            Some(line) => {
                let x_dir = if uv.x > 0.0 { 1.0 } else { -1.0 };
                let y_dir = if uv.y > 0.0 { 1.0 } else { -1.0 };
                let x_in = se.x - x_dir * p.line_box_in;
                let x_out = se.x + x_dir * p.line_box_length;
                let (y_in, y_out) = (line.y_at(se.x), line.y_at(x_out));
                vec![
                    Point::new(x_in, y_in),
                    Point::new(x_in, y_in + y_dir * p.line_box_delta_in),
                    Point::new(x_out, y_out + y_dir * p.line_box_delta_out),
                    Point::new(x_out, y_out),
                ]
            }
            None => {
                let normal = Vec2::new(-uv.y, uv.x);
                let far = se + uv * p.gap_box_length;
                vec![
                    se + normal * p.gap_box_delta_in,
                    se - normal * p.gap_box_delta_in,
                    far - normal * p.gap_box_delta_out,
                    far + normal * p.gap_box_delta_out,
                ]
            }
        };
        Some(Area::new(vertices))
    }

    /// Try every arc with an end inside the lookup window.
    fn scan_gap(
        &mut self,
        curve: &CurveInfo,
        browsed: &HashSet<ArcId>,
        line: Option<(LineRef, &StaffLine)>,
    ) -> Vec<CurveInfo> {
        let Some(area) = self.ext_area(curve, line.map(|(_, l)| l)) else {
            return Vec::new();
        };
        let x_max = area.bounds().x1;
        let skeleton = self.skeleton;
        let mut tried = HashSet::new();
        let mut found = Vec::new();

        for &(end, id) in skeleton.sorted_ends() {
            if area.contains(to_point(end)) {
                if !tried.insert(id) {
                    continue;
                }
                if let Some(mut ext) = self.add_arc(curve, id, browsed) {
                    if let Some((line_ref, _)) = line {
                        ext.set_crossed_line(Some(line_ref));
                    }
                    found.push(ext);
                }
            } else if f64::from(end.0) > x_max {
                break;
            }
        }
        found
    }

    /// Try the arcs leaving the end junction, nearest headings first.
    fn scan_pivot(&mut self, curve: &CurveInfo, pivot: Pixel, browsed: &HashSet<ArcId>) -> Vec<CurveInfo> {
        let skeleton = self.skeleton;
        let end_arc = curve.end_arc(self.reverse).view(skeleton.arcs());
        let prev = if end_arc.is_empty() {
            end_arc.junction(!self.reverse)
        } else {
            end_arc.end(self.reverse)
        };
        let Some(prev) = prev else {
            return Vec::new();
        };

        let mut found = Vec::new();
        let mut side_junction_met = false;
        for &dir in scans(heading_between(prev, pivot)) {
            if side_junction_met && !is_side(dir) {
                break;
            }
            let np = step(pivot, dir);
            let cell = skeleton.grid().get(np);
            let id = match cell {
                Cell::Processed(shape) if shape.is_slur_relevant() => skeleton.arc_at_end(np),
                Cell::Junction { .. } => skeleton.void_arc(pivot, np),
                _ => None,
            };
            let Some(id) = id else {
                continue;
            };
            if let Some(ext) = self.add_arc(curve, id, browsed) {
                found.push(ext);
                if is_side(dir) && cell.is_junction() {
                    side_junction_met = true;
                }
            }
        }
        found
    }

    /// New candidate made of the curve plus one arc, if the arc fits the
    /// curve side model.
    fn add_arc(&mut self, curve: &CurveInfo, id: ArcId, browsed: &HashSet<ArcId>) -> Option<CurveInfo> {
        let rev = self.reverse;
        let skeleton = self.skeleton;
        let store = skeleton.arcs();
        let arc = skeleton.arc(id);
        if arc.is_assigned() || browsed.contains(&id) {
            return None;
        }
        if self.max_length.is_some_and(|max| arc.len() > max) {
            return None;
        }

        let arc_ref = self.oriented(curve, id);
        let side = curve.side_model(rev)?;
        let view = arc_ref.view(store);
        if !self.heads_outwards(&view, arc.shape(), side.end_vector(rev)) {
            tracing::trace!("curve#{} rejects arc {:?}, off the end tangent", curve.id(), id);
            return None;
        }

        // Arc part closest to the curve, junction included.
        let mut near: Vec<Point> = view.junction(!rev).map(to_point).into_iter().collect();
        near.extend(view.side_points(self.params.arc_check_length, !rev).into_iter().map(to_point));
        if near.is_empty() {
            return None;
        }
        let gap = side.distance_to(&near);
        if gap > self.params.max_ext_distance {
            tracing::trace!("curve#{} rejects arc {:?}, gap {:.2}", curve.id(), id, gap);
            return None;
        }

        let arcs = curve.arcs_with(arc_ref, rev);
        let points = points_of(&arcs, store);
        let new_side = if points.len() >= self.params.side_length {
            let model = side_model(&points, rev, self.params.side_length)?;
            // The side may not wind against the whole curve.
            if let Some(global) = curve.global_model() {
                if model.ccw() != 0 && global.ccw() != 0 && model.ccw() != global.ccw() {
                    return None;
                }
            }
            Some(model)
        } else {
            None
        };

        let new_id = self.next_id();
        let mut ext = match CurveInfo::new(new_id, arcs, store, None, self.params) {
            Ok(ext) => ext,
            Err(err) => {
                tracing::debug!("dropping extension of curve#{}: {}", curve.id(), err);
                return None;
            }
        };
        if new_side.is_some() {
            ext.set_side_model(new_side, rev);
        }
        ext.set_crossed_line(curve.crossed_line());
        tracing::trace!("curve#{} extended as curve#{} by {:?}, gap {:.2}", curve.id(), new_id, id, gap);
        Some(ext)
    }

    /// Whether the oriented arc goes on in the direction of the curve end.
    ///
    /// Any arc must project far enough on the end tangent `uv`. A non-slur
    /// arc must also leave the curve within `max_ext_turn` of it, measured
    /// from its junction on the curve side.
    fn heads_outwards(&self, view: &ArcView<'_>, shape: ArcShape, uv: Vec2) -> bool {
        let rev = self.reverse;
        let near = view.end(!rev).or_else(|| view.junction(!rev));
        let far = view.end(rev).or_else(|| view.junction(rev));
        let (Some(near), Some(far)) = (near, far) else {
            return true;
        };
        let projection = (to_point(far) - to_point(near)).dot(uv);
        if projection < self.params.min_projection {
            return false;
        }
        if shape == ArcShape::Slur || view.is_empty() {
            return true;
        }
        let from = view.junction(!rev).unwrap_or(near);
        match unit(to_point(far) - to_point(from)) {
            Some(dir) => dir.dot(uv).clamp(-1.0, 1.0).acos() <= self.params.max_ext_turn,
            None => true,
        }
    }

    /// Orientation making the arc continue the curve on the current side.
    ///
    /// An arc sharing the curve end junction must meet it with its inner
    /// end; any other arc is turned so its nearest point faces the curve.
    fn oriented(&self, curve: &CurveInfo, id: ArcId) -> ArcRef {
        let rev = self.reverse;
        let arc = self.skeleton.arc(id);
        let plain = ArcRef::new(id);

        if let Some(j) = curve.junction(rev) {
            if arc.junction(true) == Some(j) || arc.junction(false) == Some(j) {
                return if arc.junction(rev) == Some(j) { plain.flipped() } else { plain };
            }
        }

        let (Some(start), Some(stop)) = (arc.end(true), arc.end(false)) else {
            return plain;
        };
        let se = to_point(curve.end(rev));
        let to_start = se.distance_squared(to_point(start));
        let to_stop = se.distance_squared(to_point(stop));
        let flip = if rev { to_start < to_stop } else { to_stop < to_start };
        if flip {
            plain.flipped()
        } else {
            plain
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arc::Arc;
    use crate::config::{RetrievalConfig, Scale};
    use crate::sheet::PageLayout;
    use crate::skeleton::SkeletonGrid;

    fn params() -> Params {
        Params::new(&RetrievalConfig::default(), &Scale::new(10.0).unwrap())
    }

    /// Horizontal run with a junction at its right end and two branches:
    /// one going on straight, one turning down.
    fn forked() -> Skeleton {
        let mut grid = SkeletonGrid::new(80, 40);
        for x in 2..50 {
            grid.set((x, 20), Cell::Foreground);
        }
        for x in 51..70 {
            grid.set((x, 20), Cell::Foreground);
        }
        grid.set((50, 20), Cell::Foreground);
        for y in 21..35 {
            grid.set((50, y), Cell::Foreground);
        }
        Skeleton::build(grid, &PageLayout::default(), &params())
    }

    fn longest(skeleton: &Skeleton) -> ArcId {
        let (i, _) = skeleton
            .arcs()
            .iter()
            .enumerate()
            .max_by_key(|(_, a)| a.len())
            .unwrap();
        ArcId(i)
    }

    #[test]
    fn pivot_scan_tries_straight_continuation_first() {
        let skeleton = forked();
        let params = params();
        let page = PageLayout::default();
        let seed = longest(&skeleton);
        let trunk = CurveInfo::new(0, vec![ArcRef::new(seed)], skeleton.arcs(), None, &params).unwrap();
        assert_eq!(trunk.junction(false), Some((50, 20)));

        let mut last_id = 0;
        let mut extender = Extender::new(&skeleton, &page, &params, false, None, &mut last_id);
        let clump = extender.extend(trunk);
        assert!(clump.len() >= 2, "no extension found");
        let grown = &clump[1];
        assert_eq!(grown.arcs().len(), 2);
        assert_eq!(grown.end(false).1, 20, "extension turned down");
    }

    #[test]
    fn assigned_and_browsed_arcs_are_skipped() {
        let mut skeleton = forked();
        let params = params();
        let page = PageLayout::default();
        let seed = longest(&skeleton);
        for i in 0..skeleton.arcs().len() {
            if ArcId(i) != seed {
                skeleton.arc_mut(ArcId(i)).set_assigned(true);
            }
        }
        let trunk = CurveInfo::new(0, vec![ArcRef::new(seed)], skeleton.arcs(), None, &params).unwrap();
        let mut last_id = 0;
        let mut extender = Extender::new(&skeleton, &page, &params, false, None, &mut last_id);
        assert_eq!(extender.extend(trunk).len(), 1);
    }

    #[test]
    fn free_arc_is_turned_toward_the_curve() {
        let params = params();
        let page = PageLayout::default();
        let mut grid = SkeletonGrid::new(50, 20);
        for x in (1..20).chain(25..40) {
            grid.set((x, 10), Cell::Foreground);
        }
        let skeleton = Skeleton::build(grid, &page, &params);
        let (left, right) = (ArcId(0), ArcId(1));
        assert_eq!(skeleton.arc(right).end(true), Some((25, 10)));

        let trunk = CurveInfo::new(0, vec![ArcRef::new(left)], skeleton.arcs(), None, &params).unwrap();
        let mut last_id = 0;
        let extender = Extender::new(&skeleton, &page, &params, false, None, &mut last_id);
        let oriented = extender.oriented(&trunk, right);
        assert_eq!(oriented.view(skeleton.arcs()).end(true), Some((25, 10)));

        let trunk = CurveInfo::new(1, vec![ArcRef::new(right)], skeleton.arcs(), None, &params).unwrap();
        let extender = Extender::new(&skeleton, &page, &params, true, None, &mut last_id);
        let oriented = extender.oriented(&trunk, left);
        assert_eq!(oriented.view(skeleton.arcs()).end(false), Some((19, 10)));
    }

    #[test]
    fn short_arc_must_follow_the_end_tangent() {
        let skeleton = forked();
        let params = params();
        let page = PageLayout::default();
        let mut last_id = 0;
        let extender = Extender::new(&skeleton, &page, &params, false, None, &mut last_id);

        let j = Some((50, 20));
        let store = vec![
            Arc::from_points((51..56).map(|x| (x, 20)).collect(), j, None),
            // Steep branch, close to the pivot but turning away.
            Arc::from_points((1..6).map(|i| (50 + i / 2, 20 + i)).collect(), j, None),
            Arc::from_points((1..6).map(|i| (50 - i, 20 + i)).collect(), j, None),
            Arc::from_points((30..50).rev().map(|x| (x, 21)).collect(), None, None),
        ];
        let view = |i: usize| ArcRef::new(ArcId(i)).view(&store);
        let uv = Vec2::new(1.0, 0.0);

        assert!(extender.heads_outwards(&view(0), ArcShape::Short, uv));
        assert!(!extender.heads_outwards(&view(1), ArcShape::Short, uv));
        assert!(!extender.heads_outwards(&view(2), ArcShape::Line, uv));
        // Slur arcs only need a forward projection.
        assert!(extender.heads_outwards(&view(1), ArcShape::Slur, uv));
        assert!(!extender.heads_outwards(&view(3), ArcShape::Slur, uv));
    }
}
