//! Page context consumed by slur retrieval: staves with their lines,
//! systems with note heads and stems.
//!
//! `SheetLayout` is the seam to the surrounding recognition pipeline.
//! `PageLayout` is a plain implementation, loadable from JSON.

use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

use crate::config::Scale;
use crate::error::CurveError;
use crate::geom::touches;

/// A staff line as a polyline, sorted by abscissa.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffLine {
    pub points: Vec<Point>,
}

impl StaffLine {
    pub fn horizontal(x0: f64, x1: f64, y: f64) -> Self {
        Self {
            points: vec![Point::new(x0, y), Point::new(x1, y)],
        }
    }

    /// Ordinate at `x`, extrapolated from the end segments.
    pub fn y_at(&self, x: f64) -> f64 {
        match self.points.as_slice() {
            [] => 0.0,
            [p] => p.y,
            pts => {
                let i = pts
                    .windows(2)
                    .position(|w| x <= w[1].x)
                    .unwrap_or(pts.len() - 2);
                let (a, b) = (pts[i], pts[i + 1]);
                if b.x == a.x {
                    a.y
                } else {
                    a.y + (x - a.x) * (b.y - a.y) / (b.x - a.x)
                }
            }
        }
    }
}

/// Identifies one line of one staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LineRef {
    pub staff: usize,
    pub line: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Staff {
    pub id: usize,
    /// Lines from top to bottom.
    pub lines: Vec<StaffLine>,
    /// Abscissa where the staff header (clef, key, time) ends.
    pub dmz_end: f64,
    /// Right abscissa of the staff.
    pub right: f64,
}

impl Staff {
    /// Index and line closest to `point` vertically.
    pub fn closest_line_ref(&self, point: Point) -> Option<(LineRef, &StaffLine)> {
        self.lines
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let da = (a.y_at(point.x) - point.y).abs();
                let db = (b.y_at(point.x) - point.y).abs();
                da.total_cmp(&db)
            })
            .map(|(i, line)| (LineRef { staff: self.id, line: i }, line))
    }

    pub fn closest_line(&self, point: Point) -> Option<&StaffLine> {
        self.closest_line_ref(point).map(|(_, line)| line)
    }

    /// Vertical distance from `point` to the staff band, 0 inside.
    fn gap_to(&self, point: Point) -> f64 {
        let (Some(top), Some(bottom)) = (self.lines.first(), self.lines.last()) else {
            return f64::INFINITY;
        };
        let (y0, y1) = (top.y_at(point.x), bottom.y_at(point.x));
        if point.y < y0 {
            y0 - point.y
        } else if point.y > y1 {
            point.y - y1
        } else {
            0.0
        }
    }
}

/// A note head candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: usize,
    pub bounds: Rect,
}

impl Note {
    pub fn center(&self) -> Point {
        self.bounds.center()
    }
}

/// A stem with the ids of the heads it carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stem {
    pub id: usize,
    pub bounds: Rect,
    #[serde(default)]
    pub heads: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct System {
    pub id: usize,
    pub area: Rect,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub stems: Vec<Stem>,
}

impl System {
    pub fn note(&self, id: usize) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    /// Notes whose bounds touch the box.
    pub fn notes_in(&self, bounds: &Rect) -> Vec<&Note> {
        self.notes.iter().filter(|n| touches(&n.bounds, bounds)).collect()
    }

    /// Stems whose bounds touch the box.
    pub fn stems_in(&self, bounds: &Rect) -> Vec<&Stem> {
        self.stems.iter().filter(|s| touches(&s.bounds, bounds)).collect()
    }

    /// Stems carrying this note.
    pub fn stems_of(&self, note: usize) -> Vec<&Stem> {
        self.stems.iter().filter(|s| s.heads.contains(&note)).collect()
    }
}

/// Lookups the retrieval needs from the page model.
pub trait SheetLayout {
    /// Global page skew, as a slope.
    fn skew_slope(&self) -> f64 {
        0.0
    }

    /// Staff at or closest to the point.
    fn staff_at(&self, point: Point) -> Option<&Staff>;

    /// Systems whose area touches the bounds.
    fn systems_of(&self, bounds: Rect) -> Vec<&System>;
}

/// In-memory page description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageLayout {
    pub interline: f64,
    #[serde(default)]
    pub skew_slope: f64,
    #[serde(default)]
    pub staves: Vec<Staff>,
    #[serde(default)]
    pub systems: Vec<System>,
}

impl PageLayout {
    pub fn from_json(text: &str) -> Result<Self, CurveError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn scale(&self) -> Result<Scale, CurveError> {
        Scale::new(self.interline)
    }
}

impl SheetLayout for PageLayout {
    fn skew_slope(&self) -> f64 {
        self.skew_slope
    }

    fn staff_at(&self, point: Point) -> Option<&Staff> {
        self.staves
            .iter()
            .min_by(|a, b| a.gap_to(point).total_cmp(&b.gap_to(point)))
    }

    fn systems_of(&self, bounds: Rect) -> Vec<&System> {
        self.systems.iter().filter(|s| touches(&s.area, &bounds)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staff(id: usize, top: f64) -> Staff {
        Staff {
            id,
            lines: (0..5)
                .map(|i| StaffLine::horizontal(0.0, 1000.0, top + 20.0 * i as f64))
                .collect(),
            dmz_end: 100.0,
            right: 1000.0,
        }
    }

    #[test]
    fn staff_line_interpolates() {
        let line = StaffLine {
            points: vec![Point::new(0.0, 10.0), Point::new(100.0, 20.0), Point::new(200.0, 20.0)],
        };
        assert!((line.y_at(50.0) - 15.0).abs() < 1e-9);
        assert!((line.y_at(150.0) - 20.0).abs() < 1e-9);
        assert!((line.y_at(-100.0) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn staff_lookup_prefers_the_enclosing_staff() {
        let page = PageLayout {
            interline: 20.0,
            staves: vec![staff(0, 100.0), staff(1, 300.0)],
            ..PageLayout::default()
        };
        assert_eq!(page.staff_at(Point::new(50.0, 150.0)).map(|s| s.id), Some(0));
        assert_eq!(page.staff_at(Point::new(50.0, 290.0)).map(|s| s.id), Some(1));
        let (line, _) = page.staves[1].closest_line_ref(Point::new(50.0, 338.0)).unwrap();
        assert_eq!(line, LineRef { staff: 1, line: 2 });
    }

    #[test]
    fn layout_parses_from_json() {
        let page = PageLayout::from_json(
            r#"{
                "interline": 18.0,
                "systems": [{ "id": 0, "area": { "x0": 0, "y0": 0, "x1": 500, "y1": 300 },
                              "notes": [{ "id": 3, "bounds": { "x0": 10, "y0": 10, "x1": 30, "y1": 26 } }] }]
            }"#,
        )
        .unwrap();
        assert_eq!(page.systems[0].notes[0].center(), Point::new(20.0, 18.0));
        assert_eq!(page.systems_of(Rect::new(400.0, 250.0, 600.0, 400.0)).len(), 1);
        assert!(page.scale().is_ok());
    }
}
