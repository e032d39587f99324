//! Raster overlay of a retrieval, for visual inspection.
//!
//! Skeleton arcs are painted one pixel at a time, colored by shape, with
//! junctions on top. Accepted slurs are stroked as their cubic
//! approximation.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use kurbo::CubicBez;
use tiny_skia::{Color, Paint, Pixmap, Rect, Stroke, Transform};

use crate::arc::ArcShape;
use crate::error::CurveError;
use crate::retriever::AcceptedCurve;
use crate::skeleton::Skeleton;

fn shape_color(shape: ArcShape) -> Color {
    match shape {
        ArcShape::Slur => Color::from_rgba8(0, 150, 60, 255),
        ArcShape::Line => Color::from_rgba8(230, 140, 0, 255),
        ArcShape::StaffArc => Color::from_rgba8(120, 170, 230, 255),
        ArcShape::Short => Color::from_rgba8(110, 110, 110, 255),
        ArcShape::Irrelevant | ArcShape::Unknown => Color::from_rgba8(200, 200, 200, 255),
    }
}

/// Tiny-skia path of an accepted slur, shifted onto pixel centers.
fn slur_path(curve: &CubicBez) -> Option<tiny_skia::Path> {
    let at = |p: kurbo::Point| (p.x as f32 + 0.5, p.y as f32 + 0.5);
    let (x0, y0) = at(curve.p0);
    let (x1, y1) = at(curve.p1);
    let (x2, y2) = at(curve.p2);
    let (x3, y3) = at(curve.p3);
    let mut pb = tiny_skia::PathBuilder::new();
    pb.move_to(x0, y0);
    pb.cubic_to(x1, y1, x2, y2, x3, y3);
    pb.finish()
}

/// Paint the skeleton and the accepted curves, `zoom` pixmap pixels per
/// image pixel.
pub fn render_overlay(skeleton: &Skeleton, curves: &[AcceptedCurve], zoom: f32) -> Result<Pixmap, CurveError> {
    let grid = skeleton.grid();
    let zoom = zoom.max(1.0);
    let width = (grid.width() as f32 * zoom).ceil() as u32;
    let height = (grid.height() as f32 * zoom).ceil() as u32;
    let mut pixmap =
        Pixmap::new(width, height).ok_or_else(|| CurveError::Render(format!("empty canvas {}x{}", width, height)))?;
    pixmap.fill(Color::WHITE);
    let transform = Transform::from_scale(zoom, zoom);

    let mut paint = Paint::default();
    for arc in skeleton.arcs() {
        paint.set_color(shape_color(arc.shape()));
        for &(x, y) in arc.points() {
            if let Some(rect) = Rect::from_xywh(x as f32, y as f32, 1.0, 1.0) {
                pixmap.fill_rect(rect, &paint, transform, None);
            }
        }
    }

    paint.set_color(Color::from_rgba8(40, 60, 220, 255));
    for x in 0..grid.width() {
        for y in 0..grid.height() {
            if grid.get((x, y)).is_junction() {
                if let Some(rect) = Rect::from_xywh(x as f32, y as f32, 1.0, 1.0) {
                    pixmap.fill_rect(rect, &paint, transform, None);
                }
            }
        }
    }

    let mut red = Paint::default();
    red.set_color(Color::from_rgba8(220, 0, 0, 200));
    red.anti_alias = true;
    let stroke = Stroke {
        width: 1.5,
        ..Stroke::default()
    };
    for accepted in curves {
        if let Some(path) = slur_path(&accepted.curve) {
            pixmap.stroke_path(&path, &red, &stroke, transform, None);
        }
    }
    Ok(pixmap)
}

/// Stream the overlay as an RGBA PNG. Every painted color is opaque but the
/// slur stroke, so premultiplied data is written as is.
fn write_png<W: Write>(pixmap: &Pixmap, sink: W) -> Result<(), CurveError> {
    let render_err = |e: png::EncodingError| CurveError::Render(e.to_string());
    let mut encoder = png::Encoder::new(sink, pixmap.width(), pixmap.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header().map_err(render_err)?;
    writer.write_image_data(pixmap.data()).map_err(render_err)?;
    writer.finish().map_err(render_err)
}

/// Render the overlay and write it as a PNG file.
pub fn write_overlay(
    skeleton: &Skeleton,
    curves: &[AcceptedCurve],
    zoom: f32,
    output_path: &Path,
) -> Result<(), CurveError> {
    let pixmap = render_overlay(skeleton, curves, zoom)?;
    let mut sink = BufWriter::new(File::create(output_path)?);
    write_png(&pixmap, &mut sink)?;
    sink.flush()?;
    tracing::debug!("overlay {}x{} written to {}", pixmap.width(), pixmap.height(), output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slur_path_sits_on_pixel_centers() {
        let curve = CubicBez::new((0.0, 0.0), (5.0, -5.0), (15.0, -5.0), (20.0, 0.0));
        let bounds = slur_path(&curve).unwrap().bounds();
        assert_eq!(bounds.left(), 0.5);
        assert_eq!(bounds.right(), 20.5);
        assert_eq!(bounds.top(), -4.5);
        assert_eq!(bounds.bottom(), 0.5);
    }

    #[test]
    fn png_stream_starts_with_signature() {
        let mut pixmap = Pixmap::new(4, 3).unwrap();
        pixmap.fill(Color::BLACK);
        let mut bytes = Vec::new();
        write_png(&pixmap, &mut bytes).unwrap();
        assert_eq!(&bytes[..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    }
}
