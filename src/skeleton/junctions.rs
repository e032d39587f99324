//! Junction retrieval.
//!
//! A pixel with more than 2 foreground neighbors is a junction candidate,
//! graded by its side connections. A candidate side-connected to a
//! better-graded junction is demoted to a plain arc pixel, so a cluster of
//! touching candidates keeps only its best members. Equal grades keep both
//! pixels as junctions, later linked by a void arc.

use super::heading::{step, DIAGONALS, HORIZONTALS, SIDES, VERTICALS};
use super::{Cell, SkeletonGrid};
use crate::arc::Pixel;

/// Neighbor counts of a pixel, split by connection kind.
struct Vicinity {
    verts: u8,
    horis: u8,
    diags: u8,
}

impl Vicinity {
    fn of(grid: &SkeletonGrid, p: Pixel) -> Self {
        let count = |dirs: &[usize]| dirs.iter().filter(|&&d| grid.is_foreground(step(p, d))).count() as u8;
        Self {
            verts: count(&VERTICALS),
            horis: count(&HORIZONTALS),
            diags: count(&DIAGONALS),
        }
    }

    fn count(&self) -> u8 {
        self.verts + self.horis + self.diags
    }

    fn grade(&self) -> u8 {
        2 * self.verts + 2 * self.horis + u8::from(self.verts > 0 && self.horis > 0)
    }
}

/// Classify all foreground pixels; returns the number of junctions.
pub fn retrieve_junctions(grid: &mut SkeletonGrid) -> usize {
    let pixels: Vec<Pixel> = grid.scan_order().collect();
    for p in pixels {
        let cell = grid.get(p);
        if cell == Cell::Foreground || cell.is_junction() {
            check_junction(grid, p);
        }
    }
    let count = (0..grid.width())
        .flat_map(|x| (0..grid.height()).map(move |y| (x, y)))
        .filter(|&p| grid.get(p).is_junction())
        .count();
    tracing::debug!("{} junctions", count);
    count
}

fn check_junction(grid: &mut SkeletonGrid, p: Pixel) {
    match evaluate(grid, p) {
        Some(grade) => {
            if side_grade(grid, p) > grade {
                grid.set(p, Cell::Arc);
            }
        }
        None => grid.set(p, Cell::Arc),
    }
}

/// Mark the pixel as junction with its grade, or `None` when it has at
/// most 2 neighbors (the pixel is then left untouched).
fn evaluate(grid: &mut SkeletonGrid, p: Pixel) -> Option<u8> {
    let vicinity = Vicinity::of(grid, p);
    if vicinity.count() > 2 {
        let grade = vicinity.grade();
        grid.set(p, Cell::Junction { grade, processed: false });
        Some(grade)
    } else {
        None
    }
}

/// Best grade among side-connected junctions, evaluating fresh neighbors.
fn side_grade(grid: &mut SkeletonGrid, p: Pixel) -> u8 {
    let mut best = 0;
    for dir in SIDES {
        let n = step(p, dir);
        match grid.get(n) {
            Cell::Junction { grade, .. } => best = best.max(grade),
            Cell::Foreground => match evaluate(grid, n) {
                Some(grade) => best = best.max(grade),
                None => grid.set(n, Cell::Arc),
            },
            _ => {}
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_of(pixels: &[Pixel]) -> SkeletonGrid {
        let mut grid = SkeletonGrid::new(20, 20);
        for &p in pixels {
            grid.set(p, Cell::Foreground);
        }
        grid
    }

    #[test]
    fn cross_center_is_the_only_junction() {
        let mut pixels = Vec::new();
        for d in 1..=4 {
            pixels.extend([(10 + d, 10), (10 - d, 10), (10, 10 + d), (10, 10 - d)]);
        }
        pixels.push((10, 10));
        let mut grid = grid_of(&pixels);
        assert_eq!(retrieve_junctions(&mut grid), 1);
        assert_eq!(grid.get((10, 10)), Cell::Junction { grade: 9, processed: false });
        assert_eq!(grid.get((11, 10)), Cell::Arc);
    }

    #[test]
    fn plain_line_has_no_junction() {
        let pixels: Vec<Pixel> = (2..12).map(|x| (x, 5)).collect();
        let mut grid = grid_of(&pixels);
        assert_eq!(retrieve_junctions(&mut grid), 0);
        assert!(pixels.iter().all(|&p| grid.get(p) == Cell::Arc));
    }

    #[test]
    fn t_branch_keeps_its_stem_junction() {
        // Horizontal bar with a vertical stem hanging from (6, 5).
        let mut pixels: Vec<Pixel> = (2..11).map(|x| (x, 5)).collect();
        pixels.extend((6..10).map(|y| (6, y)));
        let mut grid = grid_of(&pixels);
        assert_eq!(retrieve_junctions(&mut grid), 1);
        assert!(grid.get((6, 5)).is_junction());
    }
}
