//! 8-neighborhood headings.
//!
//! ```text
//!     7 8 1
//!     6 0 2
//!     5 4 3
//! ```
//!
//! Heading 0 means "no direction". Even headings are side (4-connected)
//! moves, odd ones diagonal.

/// Abscissa delta per heading.
pub const DXS: [i32; 9] = [0, 1, 1, 1, 0, -1, -1, -1, 0];
/// Ordinate delta per heading (y grows downwards).
pub const DYS: [i32; 9] = [0, -1, 0, 1, 1, 1, 0, -1, -1];

pub const VERTICALS: [usize; 2] = [4, 8];
pub const HORIZONTALS: [usize; 2] = [2, 6];
pub const SIDES: [usize; 4] = [2, 4, 6, 8];
pub const DIAGONALS: [usize; 4] = [1, 3, 5, 7];
pub const ALL: [usize; 8] = [2, 4, 6, 8, 1, 3, 5, 7];

/// Headings to try for the next step, indexed by the last heading.
/// Sides come first, then diagonals; the way back is never listed.
const SCANS: [&[usize]; 9] = [
    &[2, 4, 6, 8, 1, 3, 5, 7],
    &[2, 8, 1, 3, 7],
    &[2, 4, 8, 1, 3],
    &[2, 4, 1, 3, 5],
    &[2, 4, 6, 3, 5],
    &[4, 6, 3, 5, 7],
    &[4, 6, 8, 5, 7],
    &[6, 8, 1, 5, 7],
    &[2, 6, 8, 1, 7],
];

/// Heading for a delta, indexed `[1 + dx][1 + dy]`.
const DELTA_TO_HEADING: [[usize; 3]; 3] = [[7, 6, 5], [8, 0, 4], [1, 2, 3]];

pub fn scans(last: usize) -> &'static [usize] {
    SCANS[last.min(8)]
}

pub fn is_side(heading: usize) -> bool {
    heading % 2 == 0
}

/// Heading from one pixel to an adjacent one, 0 when not adjacent.
pub fn heading_between(from: (i32, i32), to: (i32, i32)) -> usize {
    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    if dx.abs() > 1 || dy.abs() > 1 {
        return 0;
    }
    DELTA_TO_HEADING[(1 + dx) as usize][(1 + dy) as usize]
}

/// Neighbor pixel in the given heading.
pub fn step(p: (i32, i32), heading: usize) -> (i32, i32) {
    (p.0 + DXS[heading], p.1 + DYS[heading])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_match_heading_table() {
        for heading in 1..=8 {
            let next = step((5, 5), heading);
            assert_eq!(heading_between((5, 5), next), heading);
        }
        assert_eq!(heading_between((5, 5), (5, 5)), 0);
        assert_eq!(heading_between((5, 5), (8, 5)), 0);
    }

    #[test]
    fn scans_never_go_back() {
        for last in 1..=8 {
            let back = (last + 3) % 8 + 1;
            assert!(
                !scans(last).contains(&back),
                "heading {} scan contains its reverse {}",
                last,
                back
            );
        }
    }
}
