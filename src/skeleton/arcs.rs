//! Arc retrieval: walk arc pixels between junctions and classify each arc.

use kurbo::Point;

use super::heading::{heading_between, scans, step, ALL};
use super::{Cell, Skeleton};
use crate::arc::{to_point, Arc, ArcId, ArcShape, Pixel};
use crate::config::Params;
use crate::geom::sin_sq;
use crate::model::{compute_model, LineModel, Model};
use crate::sheet::SheetLayout;

/// Outcome of one walking step.
enum Step {
    /// Reached a junction.
    Switch(Pixel),
    /// Moved to the next arc pixel, with the heading used.
    Continue(Pixel, usize),
    /// Nothing left to walk.
    End,
}

pub struct ArcRetriever<'a> {
    skeleton: &'a mut Skeleton,
    sheet: &'a dyn SheetLayout,
    params: &'a Params,
}

impl<'a> ArcRetriever<'a> {
    pub fn new(skeleton: &'a mut Skeleton, sheet: &'a dyn SheetLayout, params: &'a Params) -> Self {
        Self { skeleton, sheet, params }
    }

    /// Scan the whole grid, column by column.
    pub fn scan_image(mut self) {
        let pixels: Vec<Pixel> = self.skeleton.grid.scan_order().collect();
        for p in pixels {
            match self.skeleton.grid.get(p) {
                Cell::Arc => self.scan_arc(p, None, 0),
                Cell::Junction { processed: false, .. } => self.scan_junction(p),
                _ => {}
            }
        }
        self.skeleton.sorted_ends.sort_by_key(|&(p, _)| p.0);
        tracing::debug!(
            "{} arcs, {} indexed ends",
            self.skeleton.arcs.len(),
            self.skeleton.sorted_ends.len()
        );
    }

    /// Walk every arc leaving this junction and link touching junctions.
    fn scan_junction(&mut self, junction: Pixel) {
        if let Cell::Junction { grade, .. } = self.skeleton.grid.get(junction) {
            self.skeleton
                .grid
                .set(junction, Cell::Junction { grade, processed: true });
        }
        for dir in ALL {
            let n = step(junction, dir);
            match self.skeleton.grid.get(n) {
                Cell::Arc => self.scan_arc(n, Some(junction), dir),
                Cell::Junction { processed: false, .. } => self.add_void_arc(junction, n),
                _ => {}
            }
        }
    }

    fn add_void_arc(&mut self, first: Pixel, last: Pixel) {
        let id = ArcId(self.skeleton.arcs.len());
        self.skeleton.arcs.push(Arc::void(first, last));
        for j in [first, last] {
            self.skeleton.voids.entry(j).or_default().push(id);
        }
    }

    /// Build the arc containing `start`, walking from an optional junction.
    fn scan_arc(&mut self, start: Pixel, junction: Option<Pixel>, last_dir: usize) {
        let mut arc = Arc::new(junction);
        self.add_point(&mut arc, start, false);
        self.walk_along(&mut arc, start, last_dir, false);

        if junction.is_none() {
            // Free start: walk the other way as well.
            let pts = arc.points();
            let dir = if pts.len() > 1 {
                heading_between(pts[1], pts[0])
            } else if let Some(j) = arc.junction(false) {
                heading_between(j, pts[0])
            } else {
                last_dir
            };
            let first = pts[0];
            self.walk_along(&mut arc, first, dir, true);
        }

        let (shape, model) = self.determine_shape(&arc);
        arc.set_shape(shape);
        arc.set_model(model);
        if shape.is_slur_relevant() {
            arc.check_orientation();
        }
        self.store(arc);
    }

    fn add_point(&mut self, arc: &mut Arc, p: Pixel, reverse: bool) {
        arc.add_point(p, reverse);
        self.skeleton.grid.set(p, Cell::Processed(ArcShape::Unknown));
    }

    fn walk_along(&mut self, arc: &mut Arc, from: Pixel, last_dir: usize, reverse: bool) {
        let mut current = from;
        let mut last = last_dir;
        loop {
            match self.next_step(current, last) {
                Step::Switch(junction) => {
                    arc.set_junction(junction, reverse);
                    break;
                }
                Step::Continue(next, dir) => {
                    self.add_point(arc, next, reverse);
                    current = next;
                    last = dir;
                }
                Step::End => break,
            }
        }
    }

    /// Junctions have priority over arc pixels.
    fn next_step(&self, p: Pixel, last_dir: usize) -> Step {
        let grid = &self.skeleton.grid;
        let dirs = scans(last_dir);
        if let Some(&dir) = dirs.iter().find(|&&d| grid.get(step(p, d)).is_junction()) {
            return Step::Switch(step(p, dir));
        }
        match dirs.iter().find(|&&d| grid.get(step(p, d)) == Cell::Arc) {
            Some(&dir) => Step::Continue(step(p, dir), dir),
            None => Step::End,
        }
    }

    fn determine_shape(&self, arc: &Arc) -> (ArcShape, Option<Model>) {
        let n = arc.len();
        if n < self.params.arc_min_quorum {
            return (ArcShape::Short, None);
        }
        let points: Vec<Point> = arc.points().iter().map(|&p| to_point(p)).collect();

        if self.is_staff_arc(&points) {
            return if n > self.params.max_staff_arc_length {
                (ArcShape::Irrelevant, None)
            } else {
                (ArcShape::StaffArc, None)
            };
        }

        let (p0, p1, p2) = (points[0], points[n / 2], points[n - 1]);
        if sin_sq(p0, p1, p2) <= self.params.max_line_sin_sq {
            if let Some(line) = LineModel::fit(&points) {
                if line.distance() <= self.params.max_line_distance {
                    let inv_slope = line.inv_slope() + self.sheet.skew_slope();
                    return if inv_slope.abs() <= self.params.max_vertical_inv_slope {
                        (ArcShape::Irrelevant, None)
                    } else {
                        (ArcShape::Line, Some(Model::Line(line)))
                    };
                }
            }
        }

        match compute_model(&points, self.params) {
            Some(model @ Model::Circle(_)) => (ArcShape::Slur, Some(model)),
            Some(model @ Model::Line(_)) => (ArcShape::Line, Some(model)),
            None => (ArcShape::Irrelevant, None),
        }
    }

    /// Arc lying along a staff line: first, middle and last points stay
    /// close to the line closest to the first point.
    fn is_staff_arc(&self, points: &[Point]) -> bool {
        let n = points.len();
        if n < self.params.min_staff_arc_length {
            return false;
        }
        let p0 = points[0];
        let Some(line) = self.sheet.staff_at(p0).and_then(|staff| staff.closest_line(p0)) else {
            return false;
        };
        let dys: Vec<f64> = [0, n / 2, n - 1]
            .iter()
            .map(|&i| points[i].y - line.y_at(points[i].x))
            .collect();
        let max_dist = dys.iter().fold(0.0f64, |m, d| m.max(d.abs()));
        let spread = dys.iter().cloned().fold(f64::MIN, f64::max) - dys.iter().cloned().fold(f64::MAX, f64::min);
        let limit = self.params.min_staff_line_distance;
        max_dist < limit && spread < limit
    }

    /// Register the arc; only slur-relevant arcs get their ends indexed.
    fn store(&mut self, arc: Arc) {
        let id = ArcId(self.skeleton.arcs.len());
        let shape = arc.shape();
        let ends: Vec<Pixel> = [arc.end(true), arc.end(false)].into_iter().flatten().collect();

        if shape.is_slur_relevant() {
            for (i, &end) in ends.iter().enumerate() {
                self.skeleton.grid.set(end, Cell::Processed(shape));
                self.skeleton.ends.insert(end, id);
                if i == 0 || end != ends[0] {
                    self.skeleton.sorted_ends.push((end, id));
                }
            }
        } else {
            for &p in arc.points() {
                self.skeleton.grid.set(p, Cell::Hidden);
            }
            for &end in &ends {
                self.skeleton.grid.set(end, Cell::Processed(shape));
            }
        }
        self.skeleton.arcs.push(arc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RetrievalConfig, Scale};
    use crate::sheet::PageLayout;
    use crate::skeleton::SkeletonGrid;

    fn build(pixels: &[Pixel]) -> Skeleton {
        let mut grid = SkeletonGrid::new(60, 40);
        for &p in pixels {
            grid.set(p, Cell::Foreground);
        }
        let page = PageLayout {
            interline: 10.0,
            ..PageLayout::default()
        };
        let params = Params::new(&RetrievalConfig::default(), &Scale::new(10.0).unwrap());
        Skeleton::build(grid, &page, &params)
    }

    #[test]
    fn horizontal_line_is_a_line_arc() {
        let pixels: Vec<Pixel> = (5..35).map(|x| (x, 10)).collect();
        let skeleton = build(&pixels);
        assert_eq!(skeleton.arcs().len(), 1);
        let arc = skeleton.arc(ArcId(0));
        assert_eq!(arc.shape(), ArcShape::Line);
        assert_eq!(arc.len(), 30);
        assert_eq!(arc.end(true), Some((5, 10)));
        assert_eq!(skeleton.arc_at_end((34, 10)), Some(ArcId(0)));
        assert_eq!(skeleton.sorted_ends(), &[((5, 10), ArcId(0)), ((34, 10), ArcId(0))]);
    }

    #[test]
    fn vertical_line_is_hidden() {
        let pixels: Vec<Pixel> = (5..35).map(|y| (10, y)).collect();
        let skeleton = build(&pixels);
        assert_eq!(skeleton.arc(ArcId(0)).shape(), ArcShape::Irrelevant);
        assert_eq!(skeleton.grid().get((10, 20)), Cell::Hidden);
        assert_eq!(skeleton.arc_at_end((10, 5)), None);
        assert!(skeleton.sorted_ends().is_empty());
    }

    #[test]
    fn short_arc_stays_relevant() {
        let pixels: Vec<Pixel> = (5..12).map(|x| (x, 10)).collect();
        let skeleton = build(&pixels);
        let arc = skeleton.arc(ArcId(0));
        assert_eq!(arc.shape(), ArcShape::Short);
        assert!(arc.model().is_none());
        assert_eq!(skeleton.grid().get((5, 10)), Cell::Processed(ArcShape::Short));
        assert_eq!(skeleton.grid().get((8, 10)), Cell::Processed(ArcShape::Unknown));
    }

    #[test]
    fn t_branch_splits_into_three_arcs() {
        let mut pixels: Vec<Pixel> = (5..45).map(|x| (x, 10)).collect();
        pixels.extend((11..30).map(|y| (25, y)));
        let skeleton = build(&pixels);
        assert_eq!(skeleton.junction_count(), 1);
        assert_eq!(skeleton.arcs().len(), 3);

        let j = (25, 10);
        for arc in skeleton.arcs() {
            assert!(arc.junction(true) == Some(j) || arc.junction(false) == Some(j));
            assert!(!arc.points().contains(&j));
        }
        let left = skeleton.arc(skeleton.arc_at_end((5, 10)).unwrap());
        assert_eq!(left.junction(false), Some(j));
        assert_eq!(left.shape(), ArcShape::Line);
        // The stem is vertical.
        assert_eq!(skeleton.grid().get((25, 20)), Cell::Hidden);
    }

    #[test]
    fn touching_junctions_get_a_void_arc() {
        // Bar with a stem up from (25, 20) and a stem down from (26, 20).
        let mut pixels: Vec<Pixel> = (10..41).map(|x| (x, 20)).collect();
        pixels.extend((12..20).map(|y| (25, y)));
        pixels.extend((21..29).map(|y| (26, y)));
        let skeleton = build(&pixels);
        assert_eq!(skeleton.junction_count(), 2);

        let void = skeleton.void_arc((25, 20), (26, 20)).unwrap();
        assert_eq!(skeleton.void_arc((26, 20), (25, 20)), Some(void));
        assert!(skeleton.arc(void).is_empty());
        assert_eq!(skeleton.arcs().iter().filter(|a| a.is_empty()).count(), 1);
    }
}
