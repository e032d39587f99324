//! Candidate grading and clump weeding.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use serde::Serialize;

use crate::arc::to_point;
use crate::config::Params;
use crate::curve::CurveInfo;
use crate::geom::pt_line_dist;

const WEIGHTS: [f64; 5] = [3.0, 1.0, 1.0, 1.0, 1.0];

/// Quality breakdown of a candidate, each impact in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Impacts {
    pub distance: f64,
    pub angle: f64,
    pub width: f64,
    pub height: f64,
    pub vertical: f64,
}

impl Impacts {
    fn new(values: [f64; 5]) -> Self {
        let [distance, angle, width, height, vertical] = values.map(|v| v.clamp(0.0, 1.0));
        Self {
            distance,
            angle,
            width,
            height,
            vertical,
        }
    }

    pub fn values(&self) -> [f64; 5] {
        [self.distance, self.angle, self.width, self.height, self.vertical]
    }

    /// Weighted geometric mean of the impacts.
    pub fn grade(&self) -> f64 {
        let total: f64 = WEIGHTS.iter().sum();
        let product: f64 = self
            .values()
            .iter()
            .zip(WEIGHTS)
            .map(|(v, w)| v.powf(w))
            .product();
        product.powf(1.0 / total)
    }
}

/// Grade a candidate, or `None` when a criterion rejects it.
///
/// `side` restricts the distance criterion to one end (`Some(reverse)`);
/// `None` averages both ends.
pub fn compute_impacts(curve: &CurveInfo, side: Option<bool>, params: &Params) -> Option<Impacts> {
    let dist = match side {
        Some(reverse) => side_distance(curve, reverse)?,
        None => (side_distance(curve, true)? + side_distance(curve, false)?) / 2.0,
    };
    if dist > params.max_slur_distance {
        return None;
    }
    let distance = 1.0 - dist / params.max_slur_distance;

    let circle = curve.global_model()?.as_circle()?;

    let arc_angle = circle.arc_angle();
    if arc_angle > params.max_arc_angle_high {
        tracing::trace!("curve#{} too curved {:.1}", curve.id(), arc_angle.to_degrees());
        return None;
    }
    let angle = (params.max_arc_angle_high - arc_angle) / (params.max_arc_angle_high - params.max_arc_angle_low);

    // Mid angle close to 0 or PI denotes a vertical curve.
    let mut mid_angle = circle.mid_angle();
    if mid_angle < 0.0 {
        mid_angle += 2.0 * std::f64::consts::PI;
    }
    mid_angle %= std::f64::consts::PI;
    let from_vertical = mid_angle.abs().min((std::f64::consts::PI - mid_angle).abs());
    if from_vertical < params.min_angle_from_vertical_low {
        tracing::trace!("curve#{} too vertical {:.1}", curve.id(), mid_angle.to_degrees());
        return None;
    }
    let vertical = (from_vertical - params.min_angle_from_vertical_low)
        / (params.min_angle_from_vertical_high - params.min_angle_from_vertical_low);

    let points = curve.points();
    if points.is_empty() {
        return None;
    }
    let (p0, p1, p2) = (
        to_point(points[0]),
        to_point(points[points.len() / 2]),
        to_point(points[points.len() - 1]),
    );

    let width_px = (p2.x - p0.x).abs();
    if width_px < params.min_slur_width_low {
        tracing::trace!("curve#{} too narrow {}", curve.id(), width_px);
        return None;
    }
    let width = (width_px - params.min_slur_width_low) / (params.min_slur_width_high - params.min_slur_width_low);

    let height_px = pt_line_dist(p0, p2, p1);
    if height_px < params.min_slur_height_low {
        tracing::trace!("curve#{} too flat {:.1}", curve.id(), height_px);
        return None;
    }
    let height =
        (height_px - params.min_slur_height_low) / (params.min_slur_height_high - params.min_slur_height_low);

    Some(Impacts::new([distance, angle, width, height, vertical]))
}

fn side_distance(curve: &CurveInfo, reverse: bool) -> Option<f64> {
    let model = curve.side_model(reverse)?;
    Some(model.distance_to(&curve.side_points(reverse)))
}

/// Minimum length kept in a clump whose longest candidate has `longest` points.
pub fn quorum(longest: usize, ratio: f64) -> usize {
    (ratio * longest as f64).ceil() as usize
}

/// Keep the candidates reaching the length quorum of the longest one,
/// then those graded at least as well as the longest one.
///
/// The first candidate of maximum length is the reference.
pub fn weed_candidates<T>(
    items: Vec<T>,
    ratio: f64,
    length: impl Fn(&T) -> usize,
    grade: impl Fn(&T) -> f64,
) -> Vec<T> {
    let mut longest: Option<&T> = None;
    for item in &items {
        if longest.map_or(true, |l| length(item) > length(l)) {
            longest = Some(item);
        }
    }
    let Some(longest) = longest else {
        return items;
    };
    let min_length = quorum(length(longest), ratio);
    let min_grade = grade(longest);
    let keep: Vec<bool> = items
        .iter()
        .map(|item| length(item) >= min_length && grade(item) >= min_grade)
        .collect();
    items
        .into_iter()
        .zip(keep)
        .filter_map(|(item, keep)| keep.then_some(item))
        .collect()
}

/// Among candidates stopping at the same point, keep the best graded one.
///
/// Ties keep the earliest candidate; the order of survivors is preserved.
pub fn purge_identical_endings<T, K: Eq + Hash>(
    items: Vec<T>,
    end: impl Fn(&T) -> K,
    grade: impl Fn(&T) -> f64,
) -> Vec<T> {
    let mut best: HashMap<K, (usize, f64)> = HashMap::new();
    for (i, item) in items.iter().enumerate() {
        let g = grade(item);
        match best.entry(end(item)) {
            Entry::Occupied(mut e) => {
                if g > e.get().1 {
                    e.insert((i, g));
                }
            }
            Entry::Vacant(e) => {
                e.insert((i, g));
            }
        }
    }
    let winners: HashSet<usize> = best.values().map(|&(i, _)| i).collect();
    items
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| winners.contains(&i).then_some(item))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quorum_rounds_up() {
        assert_eq!(quorum(10, 0.75), 8);
        assert_eq!(quorum(12, 0.75), 9);
        assert_eq!(quorum(0, 0.75), 0);
    }

    #[test]
    fn short_candidates_are_weeded() {
        let kept = weed_candidates(vec![10usize, 8, 7, 3], 0.75, |l| *l, |_| 0.5);
        assert_eq!(kept, vec![10, 8]);
    }

    #[test]
    fn weaker_than_longest_is_weeded() {
        let items = vec![(10usize, 0.6), (9, 0.5), (9, 0.7), (10, 0.6)];
        let kept = weed_candidates(items, 0.75, |i| i.0, |i| i.1);
        assert_eq!(kept, vec![(10, 0.6), (9, 0.7), (10, 0.6)]);
    }

    #[test]
    fn grade_is_weighted_geometric_mean() {
        let perfect = Impacts::new([1.0; 5]);
        assert!((perfect.grade() - 1.0).abs() < 1e-12);

        let half_distance = Impacts::new([0.5, 1.0, 1.0, 1.0, 1.0]);
        assert!((half_distance.grade() - 0.5f64.powf(3.0 / 7.0)).abs() < 1e-12);

        let clamped = Impacts::new([2.0, -1.0, 1.0, 1.0, 1.0]);
        assert_eq!(clamped.distance, 1.0);
        assert_eq!(clamped.grade(), 0.0);
    }

    #[test]
    fn identical_endings_keep_the_best_grade() {
        let items = vec![((1, 1), 0.5), ((2, 2), 0.4), ((1, 1), 0.7), ((1, 1), 0.7)];
        let kept = purge_identical_endings(items, |i| i.0, |i| i.1);
        assert_eq!(kept, vec![((2, 2), 0.4), ((1, 1), 0.7)]);
    }
}
