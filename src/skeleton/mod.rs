//! Pixel skeleton: typed cell grid, junction retrieval and arc retrieval.
//!
//! 1. Junction retrieval classifies every foreground pixel as junction or
//!    arc pixel (`junctions`)
//! 2. Arc retrieval walks arc pixels between junctions, classifies each
//!    arc shape and indexes the ends of slur-relevant arcs (`arcs`)
//!
//! Cell states are kept in a typed grid next to the arc arena rather than
//! folded into pixel values.

pub mod arcs;
pub mod heading;
pub mod junctions;

use std::collections::HashMap;

use image::GrayImage;

use crate::arc::{Arc, ArcId, ArcShape, Pixel};
use crate::config::Params;
use crate::sheet::SheetLayout;

/// State of one skeleton pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Background,
    /// Foreground pixel not yet classified.
    Foreground,
    /// Arc pixel waiting to be walked.
    Arc,
    Junction { grade: u8, processed: bool },
    /// Walked arc pixel. End pixels carry the arc shape, inner pixels
    /// stay `Unknown`.
    Processed(ArcShape),
    /// Pixel of an arc of no use for slurs.
    Hidden,
}

impl Cell {
    pub fn is_junction(self) -> bool {
        matches!(self, Cell::Junction { .. })
    }
}

/// Typed cell grid; out-of-bounds reads are background.
#[derive(Debug, Clone)]
pub struct SkeletonGrid {
    width: i32,
    height: i32,
    cells: Vec<Cell>,
}

impl SkeletonGrid {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width as i32,
            height: height as i32,
            cells: vec![Cell::Background; width as usize * height as usize],
        }
    }

    /// Foreground where the binary image is non-zero.
    pub fn from_binary(binary: &GrayImage) -> Self {
        let (w, h) = binary.dimensions();
        let mut grid = Self::new(w, h);
        for (x, y, pixel) in binary.enumerate_pixels() {
            if pixel.0[0] > 0 {
                grid.set((x as i32, y as i32), Cell::Foreground);
            }
        }
        grid
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    fn index(&self, p: Pixel) -> Option<usize> {
        if p.0 < 0 || p.1 < 0 || p.0 >= self.width || p.1 >= self.height {
            None
        } else {
            Some(p.1 as usize * self.width as usize + p.0 as usize)
        }
    }

    pub fn get(&self, p: Pixel) -> Cell {
        self.index(p).map_or(Cell::Background, |i| self.cells[i])
    }

    pub fn set(&mut self, p: Pixel, cell: Cell) {
        if let Some(i) = self.index(p) {
            self.cells[i] = cell;
        }
    }

    pub fn is_foreground(&self, p: Pixel) -> bool {
        self.get(p) != Cell::Background
    }

    pub fn foreground_count(&self) -> usize {
        self.cells.iter().filter(|c| **c != Cell::Background).count()
    }

    /// Pixels in scan order: column by column, skipping row and column 0.
    pub(crate) fn scan_order(&self) -> impl Iterator<Item = Pixel> {
        let (w, h) = (self.width, self.height);
        (1..w).flat_map(move |x| (1..h).map(move |y| (x, y)))
    }
}

/// Skeleton with its arc arena and end-point lookups.
#[derive(Debug, Clone)]
pub struct Skeleton {
    grid: SkeletonGrid,
    arcs: Vec<Arc>,
    /// Slur-relevant arc per end pixel.
    ends: HashMap<Pixel, ArcId>,
    /// Void arcs per junction.
    voids: HashMap<Pixel, Vec<ArcId>>,
    /// Slur-relevant arc ends sorted by abscissa.
    sorted_ends: Vec<(Pixel, ArcId)>,
    junction_count: usize,
}

impl Skeleton {
    /// Retrieve junctions then arcs from a raw foreground grid.
    pub fn build(mut grid: SkeletonGrid, sheet: &dyn SheetLayout, params: &Params) -> Self {
        let junction_count = junctions::retrieve_junctions(&mut grid);
        let mut skeleton = Self {
            grid,
            arcs: Vec::new(),
            ends: HashMap::new(),
            voids: HashMap::new(),
            sorted_ends: Vec::new(),
            junction_count,
        };
        arcs::ArcRetriever::new(&mut skeleton, sheet, params).scan_image();
        skeleton
    }

    pub fn grid(&self) -> &SkeletonGrid {
        &self.grid
    }

    pub fn arcs(&self) -> &[Arc] {
        &self.arcs
    }

    pub fn arc(&self, id: ArcId) -> &Arc {
        &self.arcs[id.0]
    }

    pub(crate) fn arc_mut(&mut self, id: ArcId) -> &mut Arc {
        &mut self.arcs[id.0]
    }

    pub fn junction_count(&self) -> usize {
        self.junction_count
    }

    /// Slur-relevant arc ending at this pixel.
    pub fn arc_at_end(&self, p: Pixel) -> Option<ArcId> {
        self.ends.get(&p).copied()
    }

    /// Void arc linking two touching junctions.
    pub fn void_arc(&self, pivot: Pixel, other: Pixel) -> Option<ArcId> {
        self.voids.get(&pivot)?.iter().copied().find(|&id| {
            let arc = &self.arcs[id.0];
            arc.junction(true) == Some(other) || arc.junction(false) == Some(other)
        })
    }

    pub fn sorted_ends(&self) -> &[(Pixel, ArcId)] {
        &self.sorted_ends
    }

    /// Number of arcs per shape, in a fixed order.
    pub fn shape_counts(&self) -> Vec<(ArcShape, usize)> {
        [
            ArcShape::Slur,
            ArcShape::Line,
            ArcShape::Short,
            ArcShape::StaffArc,
            ArcShape::Irrelevant,
        ]
        .into_iter()
        .map(|shape| (shape, self.arcs.iter().filter(|a| a.shape() == shape).count()))
        .collect()
    }
}
