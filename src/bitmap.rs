use std::path::Path;

use image::{GrayImage, ImageReader};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};

use crate::config::{RetrievalConfig, ThresholdMethod};
use crate::error::CurveError;

/// Load a page scan and convert it to a binary GrayImage.
///
/// Foreground (ink) pixels are 255, background pixels are 0.
pub fn load_and_threshold(path: &Path, config: &RetrievalConfig) -> Result<GrayImage, CurveError> {
    let img = ImageReader::open(path)
        .map_err(|e| CurveError::ImageLoad(e.to_string()))?
        .decode()
        .map_err(|e| CurveError::ImageLoad(e.to_string()))?
        .into_luma8();
    Ok(binarize(&img, config))
}

/// Threshold a grayscale image, dark pixels becoming foreground.
pub fn binarize(img: &GrayImage, config: &RetrievalConfig) -> GrayImage {
    let level = match config.threshold {
        ThresholdMethod::Fixed(t) => t,
        ThresholdMethod::Otsu => {
            let t = otsu_level(img);
            tracing::debug!("Otsu threshold = {}", t);
            t
        }
    };

    let mut binary = threshold(img, level, ThresholdType::BinaryInverted);

    if config.invert {
        for pixel in binary.pixels_mut() {
            pixel.0[0] = 255 - pixel.0[0];
        }
    }
    binary
}

/// Zhang-Suen thinning down to a one-pixel wide, 8-connected skeleton.
///
/// The image border is left untouched.
pub fn thin(binary: &GrayImage) -> GrayImage {
    let (w, h) = binary.dimensions();
    let mut img = binary.clone();
    for pixel in img.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > 0 { 255 } else { 0 };
    }
    if w < 3 || h < 3 {
        return img;
    }

    let mut iterations = 0;
    loop {
        let mut removed = 0;
        for step in 0..2 {
            let mut doomed = Vec::new();
            for y in 1..h - 1 {
                for x in 1..w - 1 {
                    if img.get_pixel(x, y).0[0] != 0 && is_removable(&img, x, y, step) {
                        doomed.push((x, y));
                    }
                }
            }
            removed += doomed.len();
            for (x, y) in doomed {
                img.put_pixel(x, y, image::Luma([0]));
            }
        }
        iterations += 1;
        if removed == 0 {
            break;
        }
    }
    tracing::debug!("thinning converged after {} iterations", iterations);
    img
}

fn is_removable(img: &GrayImage, x: u32, y: u32, step: usize) -> bool {
    let on = |dx: i32, dy: i32| img.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32).0[0] != 0;
    // P2..P9, clockwise from north.
    let p = [
        on(0, -1),
        on(1, -1),
        on(1, 0),
        on(1, 1),
        on(0, 1),
        on(-1, 1),
        on(-1, 0),
        on(-1, -1),
    ];

    let count = p.iter().filter(|&&b| b).count();
    if !(2..=6).contains(&count) {
        return false;
    }
    let transitions = (0..8).filter(|&i| !p[i] && p[(i + 1) % 8]).count();
    if transitions != 1 {
        return false;
    }

    let (n, e, s, w) = (p[0], p[2], p[4], p[6]);
    if step == 0 {
        !(n && e && s) && !(e && s && w)
    } else {
        !(n && e && w) && !(n && s && w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn filled(w: u32, h: u32, rect: (u32, u32, u32, u32)) -> GrayImage {
        let (x0, y0, x1, y1) = rect;
        GrayImage::from_fn(w, h, |x, y| {
            if (x0..x1).contains(&x) && (y0..y1).contains(&y) {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    #[test]
    fn thick_bar_thins_to_a_single_row() {
        let thin = thin(&filled(40, 15, (5, 5, 35, 10)));
        for x in 10..30 {
            let column: Vec<u32> = (0..15).filter(|&y| thin.get_pixel(x, y).0[0] != 0).collect();
            assert_eq!(column.len(), 1, "column {} is {:?}", x, column);
        }
    }

    #[test]
    fn skeleton_is_left_alone() {
        let mut line = GrayImage::new(20, 10);
        for x in 2..18 {
            line.put_pixel(x, 5, Luma([255]));
        }
        assert_eq!(thin(&line), line);
    }

    #[test]
    fn dark_ink_becomes_foreground() {
        let gray = GrayImage::from_fn(4, 1, |x, _| Luma([if x < 2 { 10 } else { 240 }]));
        let config = RetrievalConfig {
            threshold: ThresholdMethod::Fixed(128),
            ..RetrievalConfig::default()
        };
        let binary = binarize(&gray, &config);
        assert_eq!(binary.as_raw(), &vec![255, 255, 0, 0]);

        let inverted = binarize(&gray, &RetrievalConfig { invert: true, ..config });
        assert_eq!(inverted.as_raw(), &vec![0, 0, 255, 255]);
    }
}
