//! Shared geometry utilities.

use geo::{coord, Intersects, LineString, Polygon};
use kurbo::{BezPath, Point, Rect, Shape, Vec2};

/// Orientation of `p` with respect to the directed segment `a → b`.
///
/// Returns -1, 0 or 1 with the same conventions as a classic
/// `relativeCCW` in a y-down frame: collinear points beyond the segment
/// ends report the side of the nearest end.
pub fn relative_ccw(a: Point, b: Point, p: Point) -> i32 {
    let seg = b - a;
    let mut rel = p - a;
    let mut ccw = rel.x * seg.y - rel.y * seg.x;
    if ccw == 0.0 {
        ccw = rel.dot(seg);
        if ccw > 0.0 {
            rel -= seg;
            ccw = rel.dot(seg);
            if ccw < 0.0 {
                ccw = 0.0;
            }
        }
    }
    if ccw < 0.0 {
        -1
    } else if ccw > 0.0 {
        1
    } else {
        0
    }
}

/// Squared sine of the angle at `p0` between `p0 → p1` and `p0 → p2`.
pub fn sin_sq(p0: Point, p1: Point, p2: Point) -> f64 {
    let u = p1 - p0;
    let v = p2 - p0;
    let denom = u.hypot2() * v.hypot2();
    if denom == 0.0 {
        return 0.0;
    }
    let cross = u.cross(v);
    cross * cross / denom
}

/// Distance from `p` to the infinite line through `a` and `b`.
pub fn pt_line_dist(a: Point, b: Point, p: Point) -> f64 {
    let d = b - a;
    let len = d.hypot();
    if len == 0.0 {
        return p.distance(a);
    }
    (d.cross(p - a)).abs() / len
}

/// Point beyond `p2` at `length` along the direction `p1 → p2`.
pub fn extension(p1: Point, p2: Point, length: f64) -> Point {
    let d = p2 - p1;
    let len = d.hypot();
    if len == 0.0 {
        return p2;
    }
    p2 + d * (length / len)
}

/// Point of the line `a, b` at abscissa `x` (the vertical line case
/// returns `a` shifted to `x`).
pub fn intersection_at_x(a: Point, b: Point, x: f64) -> Point {
    let dx = b.x - a.x;
    if dx == 0.0 {
        return Point::new(x, a.y);
    }
    Point::new(x, a.y + (x - a.x) * (b.y - a.y) / dx)
}

/// Intersection of the infinite lines `a1 a2` and `b1 b2`.
pub fn line_intersection(a1: Point, a2: Point, b1: Point, b2: Point) -> Option<Point> {
    let r = a2 - a1;
    let s = b2 - b1;
    let denom = r.cross(s);
    if denom.abs() < 1e-12 {
        return None;
    }
    let t = (b1 - a1).cross(s) / denom;
    Some(a1 + r * t)
}

/// Unit vector, or `None` for a zero vector.
pub fn unit(v: Vec2) -> Option<Vec2> {
    let len = v.hypot();
    (len > 0.0).then(|| v / len)
}

/// Whether two rectangles share some area or touch along an edge.
pub fn touches(a: &Rect, b: &Rect) -> bool {
    a.x0 <= b.x1 && b.x0 <= a.x1 && a.y0 <= b.y1 && b.y0 <= a.y1
}

/// A closed polygonal lookup region.
#[derive(Debug, Clone)]
pub struct Area {
    vertices: Vec<Point>,
    path: BezPath,
    polygon: Polygon<f64>,
}

impl Area {
    pub fn new(vertices: Vec<Point>) -> Self {
        let mut path = BezPath::new();
        if let Some((&first, rest)) = vertices.split_first() {
            path.move_to(first);
            for &p in rest {
                path.line_to(p);
            }
            path.close_path();
        }
        let ring: Vec<(f64, f64)> = vertices.iter().map(|p| (p.x, p.y)).collect();
        let polygon = Polygon::new(LineString::from(ring), Vec::new());
        Self { vertices, path, polygon }
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    pub fn path(&self) -> &BezPath {
        &self.path
    }

    pub fn bounds(&self) -> Rect {
        self.path.bounding_box()
    }

    pub fn contains(&self, p: Point) -> bool {
        self.path.contains(p)
    }

    /// Whether the polygon overlaps or touches the rectangle.
    pub fn intersects(&self, rect: &Rect) -> bool {
        let rect = geo::Rect::new(coord! { x: rect.x0, y: rect.y0 }, coord! { x: rect.x1, y: rect.y1 });
        self.polygon.intersects(&rect)
    }
}
