//! slurtrace: skeleton arcs → note-linked slur curves.
//!
//! Retrieves slurs from a binarized music page by walking its pixel
//! skeleton: junctions split the skeleton into arcs, slur-shaped arcs seed
//! curves that grow across junctions and gaps, and the best candidate of
//! each clump is kept when it links to notes.
//!
//! # Example
//!
//! ```no_run
//! use slurtrace::{retrieve_page, PageLayout, RetrievalConfig};
//! use std::path::Path;
//!
//! let layout = PageLayout::from_json(&std::fs::read_to_string("page.json")?)?;
//! let retrieval = retrieve_page(Path::new("page.png"), &layout, &RetrievalConfig::default())?;
//! for slur in &retrieval.curves {
//!     println!("slur #{} grade {:.2}", slur.id, slur.grade);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![forbid(unsafe_code)]

pub mod arc;
pub mod bitmap;
pub mod config;
pub mod curve;
pub mod error;
pub mod geom;
pub mod linker;
pub mod model;
pub mod render;
pub mod retriever;
pub mod sheet;
pub mod skeleton;

// Re-export kurbo so downstream users get the same version
// used by AcceptedCurve.curve.
pub use kurbo;

pub use arc::{ArcId, ArcShape};
pub use config::{Params, RetrievalConfig, Scale, ThresholdMethod};
pub use error::CurveError;
pub use retriever::{AcceptedCurve, Collision, CurveRetriever};
pub use sheet::{PageLayout, SheetLayout};
pub use skeleton::{Skeleton, SkeletonGrid};

use std::path::Path;
use std::time::Instant;

use image::GrayImage;
use serde::Serialize;

/// Skeleton and accepted slurs of one page.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub skeleton: Skeleton,
    pub curves: Vec<AcceptedCurve>,
    pub interline: f64,
    pub elapsed_ms: u128,
}

/// Serializable summary of a retrieval.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalReport {
    pub width: i32,
    pub height: i32,
    pub interline: f64,
    pub junctions: usize,
    pub arcs: Vec<ShapeCount>,
    pub curves: Vec<AcceptedCurve>,
    /// Notes linked to more than one curve on the same side.
    pub collisions: Vec<Collision>,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ShapeCount {
    pub shape: ArcShape,
    pub count: usize,
}

impl Retrieval {
    pub fn report(&self) -> RetrievalReport {
        let grid = self.skeleton.grid();
        RetrievalReport {
            width: grid.width(),
            height: grid.height(),
            interline: self.interline,
            junctions: self.skeleton.junction_count(),
            arcs: self
                .skeleton
                .shape_counts()
                .into_iter()
                .map(|(shape, count)| ShapeCount { shape, count })
                .collect(),
            curves: self.curves.clone(),
            collisions: retriever::collisions(&self.curves),
            elapsed_ms: self.elapsed_ms,
        }
    }
}

/// Full pipeline on a binary image: foreground pixels are non-zero.
///
/// Pipeline: optional thinning, junction retrieval, arc retrieval with
/// shape classification, then curve retrieval and note linking.
pub fn retrieve(
    binary: &GrayImage,
    sheet: &dyn SheetLayout,
    scale: Scale,
    config: &RetrievalConfig,
) -> Result<Retrieval, CurveError> {
    let t_start = Instant::now();
    let params = Params::new(config, &scale);
    let (w, h) = binary.dimensions();

    // ── Skeleton ──────────────────────────────────────────
    let grid = if config.thin {
        SkeletonGrid::from_binary(&bitmap::thin(binary))
    } else {
        SkeletonGrid::from_binary(binary)
    };
    let foreground = grid.foreground_count();
    if foreground == 0 {
        return Err(CurveError::EmptySkeleton);
    }
    tracing::info!("Skeleton    {}x{} px, {} foreground, interline {}", w, h, foreground, scale.interline());

    // ── Junctions & arcs ──────────────────────────────────
    let mut skeleton = Skeleton::build(grid, sheet, &params);
    let shapes: Vec<String> = skeleton
        .shape_counts()
        .into_iter()
        .map(|(shape, count)| format!("{} {:?}", count, shape))
        .collect();
    tracing::info!(
        "Arcs        {} junctions, {} arcs ({})",
        skeleton.junction_count(),
        skeleton.arcs().len(),
        shapes.join(", ")
    );

    // ── Curves ────────────────────────────────────────────
    let curves = CurveRetriever::new(&mut skeleton, sheet, &params).retrieve();
    let elapsed_ms = t_start.elapsed().as_millis();
    tracing::info!("Curves      {} slurs ({}ms)", curves.len(), elapsed_ms);

    Ok(Retrieval {
        skeleton,
        curves,
        interline: scale.interline(),
        elapsed_ms,
    })
}

/// Convenience: load and binarize a page scan, then retrieve its slurs.
pub fn retrieve_page(image_path: &Path, layout: &PageLayout, config: &RetrievalConfig) -> Result<Retrieval, CurveError> {
    let binary = bitmap::load_and_threshold(image_path, config)?;
    retrieve(&binary, layout, layout.scale()?, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_page_is_an_error() {
        let page = PageLayout {
            interline: 10.0,
            ..PageLayout::default()
        };
        let blank = GrayImage::new(50, 50);
        let result = retrieve(&blank, &page, Scale::new(10.0).unwrap(), &RetrievalConfig::default());
        assert!(matches!(result, Err(CurveError::EmptySkeleton)));
    }

    #[test]
    fn report_lists_every_shape() {
        let page = PageLayout {
            interline: 10.0,
            ..PageLayout::default()
        };
        let mut img = GrayImage::new(40, 20);
        for x in 5..35 {
            img.put_pixel(x, 10, image::Luma([255]));
        }
        let config = RetrievalConfig {
            thin: false,
            ..RetrievalConfig::default()
        };
        let retrieval = retrieve(&img, &page, Scale::new(10.0).unwrap(), &config).unwrap();
        let report = retrieval.report();
        assert_eq!((report.width, report.height), (40, 20));
        assert_eq!(report.arcs.len(), 5);
        assert_eq!(report.arcs.iter().map(|s| s.count).sum::<usize>(), 1);
        assert!(report.curves.is_empty());
        assert!(report.collisions.is_empty());
    }
}
