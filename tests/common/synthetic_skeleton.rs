use image::{GrayImage, Luma};
use slurtrace::kurbo::{Point, Rect};
use slurtrace::sheet::{Note, Staff, StaffLine, System};
use slurtrace::PageLayout;

pub const INTERLINE: f64 = 10.0;

/// Pixels of a synthetic arch, left to right.
pub struct Arch {
    pub first: (i32, i32),
    pub last: (i32, i32),
    pub pixels: Vec<(i32, i32)>,
}

/// One-pixel-per-column arch bulging upwards, centered on `(cx, cy)`,
/// spanning `half_width` columns on each side.
pub fn arch(cx: i32, cy: i32, radius: f64, half_width: i32) -> Arch {
    assert!((half_width as f64) < radius * 0.7, "arch too wide for one pixel per column");
    let pixels: Vec<(i32, i32)> = (-half_width..=half_width)
        .map(|dx| {
            let dy = (radius * radius - (dx * dx) as f64).sqrt();
            (cx + dx, (cy as f64 - dy).round() as i32)
        })
        .collect();
    Arch {
        first: pixels[0],
        last: pixels[pixels.len() - 1],
        pixels,
    }
}

/// Junction pixel just outside an arch end, with vertical stubs of
/// `length` pixels going up and down from it.
pub fn stubbed_junction(end: (i32, i32), outwards: i32, length: i32) -> Vec<(i32, i32)> {
    let j = (end.0 + outwards, end.1);
    let mut pixels = vec![j];
    for d in 1..=length {
        pixels.push((j.0, j.1 - d));
        pixels.push((j.0, j.1 + d));
    }
    pixels
}

pub fn binary_image(width: u32, height: u32, pixels: &[(i32, i32)]) -> GrayImage {
    let mut img = GrayImage::new(width, height);
    for &(x, y) in pixels {
        img.put_pixel(x as u32, y as u32, Luma([255]));
    }
    img
}

pub fn note(id: usize, center: Point) -> Note {
    Note {
        id,
        bounds: Rect::from_center_size(center, (10.0, 8.0)),
    }
}

/// Single-system page with one staff well below the drawing.
pub fn page(notes: Vec<Note>, staff_right: f64) -> PageLayout {
    PageLayout {
        interline: INTERLINE,
        staves: vec![Staff {
            id: 0,
            lines: (0..5)
                .map(|i| StaffLine::horizontal(0.0, staff_right, 150.0 + INTERLINE * i as f64))
                .collect(),
            dmz_end: 20.0,
            right: staff_right,
        }],
        systems: vec![System {
            id: 0,
            area: Rect::new(0.0, 0.0, 400.0, 250.0),
            notes,
            stems: Vec::new(),
        }],
        ..PageLayout::default()
    }
}
