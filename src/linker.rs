//! Note linkage of competing curves.
//!
//! Each candidate gets a lookup area at both ends. Notes found in these
//! areas, directly or through an intersected stem, tell which candidate of
//! a clump best embraces real notes.

use std::collections::{BTreeMap, HashSet};

use kurbo::{Point, Rect, Vec2};
use serde::Serialize;

use crate::arc::to_point;
use crate::config::Params;
use crate::curve::CurveInfo;
use crate::geom::{extension, intersection_at_x, line_intersection, Area};
use crate::sheet::{SheetLayout, Stem, System};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Side {
    Left,
    Right,
}

/// A note linked to a curve end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NoteLink {
    pub note: usize,
    /// Squared distance from the curve end to the note center.
    pub distance: f64,
    /// False when found through a stem.
    pub direct: bool,
}

/// Best note on each side of a curve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Linkage {
    pub left: Option<NoteLink>,
    pub right: Option<NoteLink>,
}

impl Linkage {
    pub fn is_orphan(&self) -> bool {
        self.left.is_none() || self.right.is_none()
    }

    pub fn distance(&self) -> f64 {
        [self.left, self.right].iter().flatten().map(|l| l.distance).sum()
    }
}

/// Winner of a clump.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    /// Index of the winner in the clump.
    pub index: usize,
    pub links: Linkage,
}

/// Lookup areas at both ends of a curve.
#[derive(Debug, Clone)]
pub struct AreaPair {
    pub left: Area,
    pub right: Area,
    pub horizontal: bool,
}

pub struct ClumpLinker<'a> {
    sheet: &'a dyn SheetLayout,
    params: &'a Params,
}

impl<'a> ClumpLinker<'a> {
    pub fn new(sheet: &'a dyn SheetLayout, params: &'a Params) -> Self {
        Self { sheet, params }
    }

    /// Pick at most one curve among mutually exclusive candidates.
    pub fn prune(&self, clump: &[CurveInfo]) -> Option<Selection> {
        let pairs: Vec<AreaPair> = clump.iter().map(|c| self.area_pair(c)).collect();
        let bounds = pairs.iter().map(pair_bounds).reduce(|a, b| a.union(b))?;

        self.sheet
            .systems_of(bounds)
            .into_iter()
            .find_map(|system| self.process(system, clump, &pairs))
    }

    /// Lookup areas of a curve.
    ///
    /// A rather horizontal curve gets areas hanging below (or above) its
    /// chord; a steep one gets areas slanted along its bisector. Both are
    /// split apart when the curve is wide enough.
    pub fn area_pair(&self, curve: &CurveInfo) -> AreaPair {
        let p = self.params;
        let first = to_point(curve.end(true));
        let last = to_point(curve.end(false));
        let v_dir = f64::from(curve.above());
        let h_dir = if last.x > first.x {
            1.0
        } else if last.x < first.x {
            -1.0
        } else {
            0.0
        };
        let mid = first.midpoint(last);
        let horizontal =
            curve.chord_slope().is_some_and(|s| s.abs() <= p.slope_separator)
                || (first.x - last.x).abs() >= p.wide_slur_width;

        let (first_area, last_area) = if horizontal {
            let first_ext = extension(mid, first, p.coverage_h_ext);
            let last_ext = extension(mid, last, p.coverage_h_ext);
            let depth = Vec2::new(0.0, v_dir * p.coverage_h_depth);
            let (first_base, last_base) = (first_ext + depth, last_ext + depth);

            if (last.x - first.x).abs() > 2.0 * p.coverage_h_in {
                let first_in_x = first.x + h_dir * p.coverage_h_in;
                let last_in_x = last.x - h_dir * p.coverage_h_in;
                (
                    vec![
                        intersection_at_x(first, last, first_in_x),
                        first_ext,
                        first_base,
                        intersection_at_x(first_base, last_base, first_in_x),
                    ],
                    vec![
                        intersection_at_x(first, last, last_in_x),
                        last_ext,
                        last_base,
                        intersection_at_x(first_base, last_base, last_in_x),
                    ],
                )
            } else {
                let mid_base = intersection_at_x(first_base, last_base, mid.x);
                (
                    vec![mid, first_ext, first_base, mid_base],
                    vec![mid, last_ext, last_base, mid_base],
                )
            }
        } else {
            let first_ext = extension(mid, first, p.coverage_v_ext);
            let last_ext = extension(mid, last, p.coverage_v_ext);
            let depth = curve.bisector_unit() * p.coverage_v_depth;
            let (first_base, last_base) = (first_ext + depth, last_ext + depth);

            if first.distance(last) > 2.0 * p.coverage_v_in {
                let first_in = extension(first_ext, first, p.coverage_v_in);
                let last_in = extension(last_ext, last, p.coverage_v_in);
                (
                    vec![first_in, first_ext, first_base, first_in + depth],
                    vec![last_in, last_ext, last_base, last_in + depth],
                )
            } else {
                let normal = (last - first).turn_90();
                let base_mid =
                    line_intersection(first_base, last_base, mid, mid + normal).unwrap_or(mid + depth);
                (
                    vec![mid, first_ext, first_base, base_mid],
                    vec![mid, last_ext, last_base, base_mid],
                )
            }
        };

        let (first_area, last_area) = (Area::new(first_area), Area::new(last_area));
        if first.x <= last.x {
            AreaPair {
                left: first_area,
                right: last_area,
                horizontal,
            }
        } else {
            AreaPair {
                left: last_area,
                right: first_area,
                horizontal,
            }
        }
    }

    /// Best candidate within one system: linked on both sides if possible.
    fn process(&self, system: &System, clump: &[CurveInfo], pairs: &[AreaPair]) -> Option<Selection> {
        let mut linked = Vec::new();
        for (index, (curve, pair)) in clump.iter().zip(pairs).enumerate() {
            let (left_end, right_end) = ends(curve);
            let bis = curve.bisector_unit();
            let mut lefts = self.lookup(system, &pair.left, left_end, bis, pair.horizontal);
            let mut rights = self.lookup(system, &pair.right, right_end, bis, pair.horizontal);

            if !self.check_notes(system, curve, &mut lefts, &mut rights) {
                tracing::trace!("curve#{} embraces no acceptable note", curve.id());
                continue;
            }
            linked.push(Selection {
                index,
                links: Linkage {
                    left: closest(&lefts),
                    right: closest(&rights),
                },
            });
        }
        select(&linked)
    }

    /// Notes embraced by one end area.
    ///
    /// A note found directly, or through an earlier stem, keeps its link.
    fn lookup(&self, system: &System, area: &Area, end: Point, bis: Vec2, horizontal: bool) -> Vec<NoteLink> {
        let bounds = area.bounds();
        let mut found: BTreeMap<usize, NoteLink> = system
            .notes_in(&bounds)
            .into_iter()
            .filter(|n| area.contains(n.center()))
            .map(|n| {
                let link = NoteLink {
                    note: n.id,
                    distance: end.distance_squared(n.center()),
                    direct: true,
                };
                (n.id, link)
            })
            .collect();

        if horizontal {
            let related: HashSet<usize> = found
                .keys()
                .flat_map(|&note| system.stems_of(note))
                .map(|s| s.id)
                .collect();
            for stem in system.stems_in(&bounds) {
                if related.contains(&stem.id) || !area.intersects(&stem.bounds) {
                    continue;
                }
                if let Some(link) = stem_note(system, stem, end, bis) {
                    found.entry(link.note).or_insert(link);
                }
            }
        }
        found.into_values().collect()
    }

    /// Purge conflicting claims, then accept the curve if it is linked on
    /// both sides or is an acceptable orphan.
    fn check_notes(
        &self,
        system: &System,
        curve: &CurveInfo,
        lefts: &mut Vec<NoteLink>,
        rights: &mut Vec<NoteLink>,
    ) -> bool {
        // A note claimed by both sides keeps its direct claims only.
        let commons: HashSet<usize> = lefts
            .iter()
            .filter(|l| rights.iter().any(|r| r.note == l.note))
            .map(|l| l.note)
            .collect();
        lefts.retain(|l| l.direct || !commons.contains(&l.note));
        rights.retain(|r| r.direct || !commons.contains(&r.note));

        // Both sides may not end on the same chord.
        let mut shared = HashSet::new();
        for l in lefts.iter() {
            for stem in system.stems_of(l.note) {
                for r in rights.iter().filter(|r| stem.heads.contains(&r.note)) {
                    shared.insert(l.note);
                    shared.insert(r.note);
                }
            }
        }
        lefts.retain(|l| !shared.contains(&l.note));
        rights.retain(|r| !shared.contains(&r.note));

        if lefts.is_empty() && rights.is_empty() {
            return false;
        }
        [(Side::Left, &*lefts), (Side::Right, &*rights)]
            .iter()
            .all(|(side, links)| !links.is_empty() || self.orphan_allowed(curve, *side))
    }

    /// An end without note must be close to the staff limit, on a rather
    /// horizontal curve.
    pub fn orphan_allowed(&self, curve: &CurveInfo, side: Side) -> bool {
        if curve.chord_slope().map_or(true, |s| s.abs() > self.params.max_orphan_slope) {
            tracing::trace!("curve#{} too sloped orphan", curve.id());
            return false;
        }
        let (left, right) = ends(curve);
        let end = if side == Side::Left { left } else { right };
        let Some(staff) = self.sheet.staff_at(end) else {
            return false;
        };
        let staff_end = match side {
            Side::Left => staff.dmz_end,
            Side::Right => staff.right,
        };
        if (end.x - staff_end).abs() > self.params.max_orphan_dx {
            tracing::trace!("curve#{} too far orphan", curve.id());
            return false;
        }
        true
    }
}

/// Left and right ends of a curve.
fn ends(curve: &CurveInfo) -> (Point, Point) {
    let (first, last) = (to_point(curve.end(true)), to_point(curve.end(false)));
    if first.x <= last.x {
        (first, last)
    } else {
        (last, first)
    }
}

/// Closest note carried by the stem, on the concave side of the end.
fn stem_note(system: &System, stem: &Stem, end: Point, bis: Vec2) -> Option<NoteLink> {
    let mut best: Option<NoteLink> = None;
    for note in stem.heads.iter().filter_map(|&id| system.note(id)) {
        let center = note.center();
        if (center - end).dot(bis) <= 0.0 {
            continue;
        }
        let distance = end.distance_squared(center);
        if best.map_or(true, |b| distance < b.distance) {
            best = Some(NoteLink {
                note: note.id,
                distance,
                direct: false,
            });
        }
    }
    best
}

fn closest(links: &[NoteLink]) -> Option<NoteLink> {
    links.iter().copied().min_by(|a, b| a.distance.total_cmp(&b.distance))
}

/// Non-orphans first, then orphans; lowest summed distance, earliest on ties.
pub fn select(linked: &[Selection]) -> Option<Selection> {
    let best_of = |orphan: bool| {
        linked
            .iter()
            .filter(|s| s.links.is_orphan() == orphan)
            .fold(None::<&Selection>, |best, s| match best {
                Some(b) if b.links.distance() <= s.links.distance() => Some(b),
                _ => Some(s),
            })
            .copied()
    };
    best_of(false).or_else(|| best_of(true))
}

/// Bounds of both lookup areas.
pub fn pair_bounds(pair: &AreaPair) -> Rect {
    pair.left.bounds().union(pair.right.bounds())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arc::{Arc, ArcId, ArcRef, Pixel};
    use crate::config::{RetrievalConfig, Scale};
    use crate::sheet::{Note, PageLayout, Staff, StaffLine};

    fn params() -> Params {
        Params::new(&RetrievalConfig::default(), &Scale::new(10.0).unwrap())
    }

    /// Arch of radius 40 centered at (100, 100), from 150 to 30 degrees.
    fn arch() -> (Vec<Arc>, CurveInfo) {
        let mut pts: Vec<Pixel> = Vec::new();
        for i in 0..=400 {
            let a = (150.0 - 120.0 * i as f64 / 400.0f64).to_radians();
            let p = ((100.0 + 40.0 * a.cos()).round() as i32, (100.0 - 40.0 * a.sin()).round() as i32);
            if pts.last() != Some(&p) {
                pts.push(p);
            }
        }
        let store = vec![Arc::from_points(pts, None, None)];
        let curve = CurveInfo::new(1, vec![ArcRef::new(ArcId(0))], &store, None, &params()).unwrap();
        (store, curve)
    }

    fn note(id: usize, center: Point) -> Note {
        Note {
            id,
            bounds: Rect::from_center_size(center, (10.0, 8.0)),
        }
    }

    fn page(notes: Vec<Note>, stems: Vec<Stem>, staff_right: f64) -> PageLayout {
        PageLayout {
            interline: 10.0,
            staves: vec![Staff {
                id: 0,
                lines: (0..5)
                    .map(|i| StaffLine::horizontal(0.0, 400.0, 100.0 + 10.0 * i as f64))
                    .collect(),
                dmz_end: 0.0,
                right: staff_right,
            }],
            systems: vec![System {
                id: 0,
                area: Rect::new(0.0, 0.0, 400.0, 300.0),
                notes,
                stems,
            }],
            ..PageLayout::default()
        }
    }

    #[test]
    fn horizontal_arch_gets_split_areas_below() {
        let params = params();
        let (_, curve) = arch();
        let page = page(vec![], vec![], 400.0);
        let pair = ClumpLinker::new(&page, &params).area_pair(&curve);
        assert!(pair.horizontal);
        let first = to_point(curve.end(true));
        assert!(pair.left.contains(first + Vec2::new(5.0, 15.0)));
        assert!(!pair.left.contains(first + Vec2::new(5.0, -15.0)));
        assert!(!pair.right.contains(first + Vec2::new(5.0, 15.0)));
        assert!(pair_bounds(&pair).width() > pair.left.bounds().width());
    }

    #[test]
    fn orphan_reach_is_inclusive() {
        let params = params();
        let (_, curve) = arch();
        let first = to_point(curve.end(true));
        let right_x = to_point(curve.end(false)).x;
        let left_note = || vec![note(7, first + Vec2::new(5.0, 15.0))];

        let at_limit = page(left_note(), vec![], right_x + params.max_orphan_dx);
        let selection = ClumpLinker::new(&at_limit, &params).prune(std::slice::from_ref(&curve));
        let selection = selection.expect("orphan at limit rejected");
        assert_eq!(selection.links.left.map(|l| l.note), Some(7));
        assert!(selection.links.right.is_none());

        let beyond = page(left_note(), vec![], right_x + params.max_orphan_dx + 1.0);
        assert!(ClumpLinker::new(&beyond, &params).prune(std::slice::from_ref(&curve)).is_none());
    }

    #[test]
    fn curve_without_notes_is_rejected() {
        let params = params();
        let (_, curve) = arch();
        let page = page(vec![], vec![], 400.0);
        assert!(ClumpLinker::new(&page, &params).prune(&[curve]).is_none());
    }

    #[test]
    fn stem_leads_to_its_head() {
        let params = params();
        let (_, curve) = arch();
        let first = to_point(curve.end(true));
        let last = to_point(curve.end(false));
        // Head far below the right end, its stem rising into the right area.
        let head = note(9, last + Vec2::new(-5.0, 60.0));
        let stem = Stem {
            id: 1,
            bounds: Rect::new(last.x - 1.0, last.y + 5.0, last.x + 1.0, last.y + 60.0),
            heads: vec![9],
        };
        let page = page(vec![note(7, first + Vec2::new(5.0, 15.0)), head], vec![stem], 400.0);
        let selection = ClumpLinker::new(&page, &params).prune(&[curve]).unwrap();
        let right = selection.links.right.unwrap();
        assert_eq!(right.note, 9);
        assert!(!right.direct);
    }

    #[test]
    fn notes_on_one_chord_cancel_out() {
        let params = params();
        let (_, curve) = arch();
        let first = to_point(curve.end(true));
        let last = to_point(curve.end(false));
        let stem = Stem {
            id: 1,
            bounds: Rect::new(first.x - 1.0, first.y, last.x + 1.0, first.y + 1.0),
            heads: vec![7, 8],
        };
        let notes = vec![note(7, first + Vec2::new(5.0, 15.0)), note(8, last + Vec2::new(-5.0, 15.0))];
        let page = page(notes, vec![stem], 400.0);
        assert!(ClumpLinker::new(&page, &params).prune(&[curve]).is_none());
    }

    #[test]
    fn linked_candidate_beats_closer_orphan() {
        let link = |note, distance| NoteLink {
            note,
            distance,
            direct: true,
        };
        let orphan = Selection {
            index: 0,
            links: Linkage {
                left: Some(link(1, 1.0)),
                right: None,
            },
        };
        let full = |index| Selection {
            index,
            links: Linkage {
                left: Some(link(1, 50.0)),
                right: Some(link(2, 50.0)),
            },
        };
        assert_eq!(select(&[orphan, full(1), full(2)]).map(|s| s.index), Some(1));
        assert_eq!(select(&[orphan]).map(|s| s.index), Some(0));
        assert!(select(&[]).is_none());
    }

    #[test]
    fn head_behind_two_stems_is_linked_once() {
        let params = params();
        let (_, curve) = arch();
        let last = to_point(curve.end(false));
        let stem = |id, dx| Stem {
            id,
            bounds: Rect::new(last.x + dx - 1.0, last.y + 5.0, last.x + dx + 1.0, last.y + 60.0),
            heads: vec![9],
        };
        let page = page(vec![note(9, last + Vec2::new(-5.0, 60.0))], vec![stem(1, 0.0), stem(2, -3.0)], 400.0);
        let linker = ClumpLinker::new(&page, &params);
        let pair = linker.area_pair(&curve);
        let links = linker.lookup(&page.systems[0], &pair.right, last, curve.bisector_unit(), pair.horizontal);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].note, 9);
        assert!(!links[0].direct);
    }
}
