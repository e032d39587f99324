use serde::{Deserialize, Serialize};

use crate::error::CurveError;

/// All retrieval parameters in one struct.
///
/// Distances are expressed as fractions of the staff interline so the same
/// preset works at any scan resolution; angles are in degrees. `Params`
/// resolves them to pixels once per page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    // -- Bitmap stage --
    /// Threshold method for converting to binary.
    pub threshold: ThresholdMethod,
    /// If true, invert the image (swap foreground/background) before scanning.
    pub invert: bool,
    /// Thin the binary image to a one-pixel skeleton. Disable when the
    /// input already is a skeleton.
    pub thin: bool,

    // -- Arc classification --
    /// Arcs shorter than this are classified as SHORT.
    pub arc_min_quorum: f64,
    /// Length bounds for an arc lying along a staff line.
    pub min_staff_arc_length: f64,
    pub max_staff_arc_length: f64,
    /// Maximum distance from a staff line for a staff arc.
    pub min_staff_line_distance: f64,
    /// Maximum mean distance to a fitted line for a LINE arc.
    pub max_line_distance: f64,
    /// Maximum bend (degrees) between first→middle and first→last for a straight arc.
    pub max_line_bend: f64,
    /// Inverse slopes below this (after deskew) denote a vertical line.
    pub max_vertical_inv_slope: f64,

    // -- Model fitting --
    /// Maximum radius ratio between rough and precise circles.
    pub similar_radius_ratio: f64,
    pub min_circle_radius: f64,
    pub max_circle_radius: f64,
    /// Arc angle bounds (degrees): above `high` is rejected, `low` is the grading floor.
    pub max_arc_angle_high: f64,
    pub max_arc_angle_low: f64,
    /// Maximum fit distance for a model computed on arcs.
    pub max_arcs_distance: f64,

    // -- Extension search --
    /// Minimum arc length to seed a slur.
    pub arc_min_seed_length: f64,
    /// Maximum quadratic mean distance of an extension arc to the side model.
    pub max_ext_distance: f64,
    /// Minimum projection of an extension arc on the curve end tangent.
    pub min_projection: f64,
    /// Maximum angle (degrees) between a non-slur extension arc and the
    /// curve end tangent.
    pub max_ext_turn: f64,
    /// Length of an extension arc checked against the side model.
    pub arc_check_length: f64,
    /// Number of terminal points used for a side model.
    pub side_circle_length: f64,
    /// Maximum vertical gap between a slur end and a tangent staff line.
    pub max_staff_line_dy: f64,
    /// Maximum incidence (degrees) of a slur end crossing a staff line.
    pub max_incidence: f64,
    pub gap_box_length: f64,
    pub gap_box_delta_in: f64,
    pub gap_box_delta_out: f64,
    pub line_box_length: f64,
    pub line_box_in: f64,
    pub line_box_delta_in: f64,
    pub line_box_delta_out: f64,
    /// Upper bound on candidates accumulated per side of one seed.
    pub max_clump_candidates: usize,

    // -- Grading --
    pub max_slur_distance: f64,
    /// Angle (degrees) between the slur middle direction and the vertical.
    pub min_angle_from_vertical_low: f64,
    pub min_angle_from_vertical_high: f64,
    pub min_slur_width_low: f64,
    pub min_slur_width_high: f64,
    pub min_slur_height_low: f64,
    pub min_slur_height_high: f64,
    /// Candidates shorter than this ratio of the longest one are weeded out.
    pub quorum_ratio: f64,
    /// Length of the end run checked against a staff line.
    pub tangent_length: f64,
    /// A candidate end closer than this (degrees) to a nearby staff line
    /// direction is taken as a piece of the line.
    pub max_staff_end_incidence: f64,

    // -- Note linking --
    pub coverage_h_ext: f64,
    pub coverage_h_in: f64,
    pub coverage_h_depth: f64,
    pub coverage_v_ext: f64,
    pub coverage_v_in: f64,
    pub coverage_v_depth: f64,
    /// Absolute slope separating horizontal from vertical slurs.
    pub slope_separator: f64,
    /// Slurs wider than this are processed as horizontal.
    pub wide_slur_width: f64,
    pub max_orphan_slope: f64,
    /// Maximum abscissa gap between an orphan end and the staff limit.
    pub max_orphan_dx: f64,
}

/// Threshold method for converting a grayscale image to binary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum ThresholdMethod {
    /// Fixed brightness threshold (0-255).
    Fixed(u8),
    /// Otsu's method (automatic).
    Otsu,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            threshold: ThresholdMethod::Otsu,
            invert: false,
            thin: true,
            arc_min_quorum: 1.75,
            min_staff_arc_length: 0.5,
            max_staff_arc_length: 5.0,
            min_staff_line_distance: 0.15,
            max_line_distance: 0.1,
            max_line_bend: 4.0,
            max_vertical_inv_slope: 0.03,
            similar_radius_ratio: 0.25,
            min_circle_radius: 0.5,
            max_circle_radius: 50.0,
            max_arc_angle_high: 190.0,
            max_arc_angle_low: 170.0,
            max_arcs_distance: 0.15,
            arc_min_seed_length: 1.0,
            max_ext_distance: 0.35,
            min_projection: -1.0,
            max_ext_turn: 45.0,
            arc_check_length: 3.0,
            side_circle_length: 7.0,
            max_staff_line_dy: 0.2,
            max_incidence: 45.0,
            gap_box_length: 0.5,
            gap_box_delta_in: 0.15,
            gap_box_delta_out: 0.3,
            line_box_length: 1.75,
            line_box_in: 0.2,
            line_box_delta_in: 0.2,
            line_box_delta_out: 0.3,
            max_clump_candidates: 5000,
            max_slur_distance: 0.1,
            min_angle_from_vertical_low: 20.0,
            min_angle_from_vertical_high: 25.0,
            min_slur_width_low: 0.8,
            min_slur_width_high: 1.5,
            min_slur_height_low: 0.2,
            min_slur_height_high: 1.0,
            quorum_ratio: 0.75,
            tangent_length: 0.5,
            max_staff_end_incidence: 10.0,
            coverage_h_ext: 2.0,
            coverage_h_in: 1.5,
            coverage_h_depth: 4.0,
            coverage_v_ext: 2.0,
            coverage_v_in: 1.5,
            coverage_v_depth: 2.0,
            slope_separator: 0.5,
            wide_slur_width: 6.0,
            max_orphan_slope: 0.5,
            max_orphan_dx: 5.0,
        }
    }
}

impl RetrievalConfig {
    /// Load a preset from JSON, missing fields taking their default value.
    pub fn from_json(text: &str) -> Result<Self, CurveError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Interline-based conversion of fractions to pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    interline: f64,
}

impl Scale {
    pub fn new(interline: f64) -> Result<Self, CurveError> {
        if interline.is_finite() && interline > 0.0 {
            Ok(Self { interline })
        } else {
            Err(CurveError::InvalidScale(interline))
        }
    }

    pub fn interline(&self) -> f64 {
        self.interline
    }

    /// Rounded pixel count for a fraction of interline.
    pub fn to_pixels(&self, fraction: f64) -> i32 {
        (fraction * self.interline).round() as i32
    }

    pub fn to_pixels_f64(&self, fraction: f64) -> f64 {
        fraction * self.interline
    }

    fn to_count(&self, fraction: f64) -> usize {
        self.to_pixels(fraction).max(0) as usize
    }
}

/// Pixel-resolved parameters for one page.
#[derive(Debug, Clone)]
pub struct Params {
    pub arc_min_quorum: usize,
    pub min_staff_arc_length: usize,
    pub max_staff_arc_length: usize,
    pub min_staff_line_distance: f64,
    pub max_line_distance: f64,
    pub max_line_sin_sq: f64,
    pub max_vertical_inv_slope: f64,

    pub similar_radius_ratio: f64,
    pub min_circle_radius: f64,
    pub max_circle_radius: f64,
    pub max_arc_angle_high: f64,
    pub max_arc_angle_low: f64,
    pub max_arcs_distance: f64,

    pub arc_min_seed_length: usize,
    pub max_ext_distance: f64,
    pub min_projection: f64,
    pub max_ext_turn: f64,
    pub arc_check_length: usize,
    pub side_length: usize,
    pub max_staff_line_dy: f64,
    pub max_incidence: f64,
    pub gap_box_length: f64,
    pub gap_box_delta_in: f64,
    pub gap_box_delta_out: f64,
    pub line_box_length: f64,
    pub line_box_in: f64,
    pub line_box_delta_in: f64,
    pub line_box_delta_out: f64,
    pub max_clump_candidates: usize,

    pub max_slur_distance: f64,
    pub min_angle_from_vertical_low: f64,
    pub min_angle_from_vertical_high: f64,
    pub min_slur_width_low: f64,
    pub min_slur_width_high: f64,
    pub min_slur_height_low: f64,
    pub min_slur_height_high: f64,
    pub quorum_ratio: f64,
    pub tangent_length: usize,
    pub max_staff_end_incidence: f64,

    pub coverage_h_ext: f64,
    pub coverage_h_in: f64,
    pub coverage_h_depth: f64,
    pub coverage_v_ext: f64,
    pub coverage_v_in: f64,
    pub coverage_v_depth: f64,
    pub slope_separator: f64,
    pub wide_slur_width: f64,
    pub max_orphan_slope: f64,
    pub max_orphan_dx: f64,
}

impl Params {
    pub fn new(config: &RetrievalConfig, scale: &Scale) -> Self {
        let px = |f: f64| scale.to_pixels_f64(f);
        // Integer-rounded distances, matching the pixel grid.
        let ipx = |f: f64| scale.to_pixels(f) as f64;
        let bend = config.max_line_bend.to_radians().sin();
        Self {
            arc_min_quorum: scale.to_count(config.arc_min_quorum),
            min_staff_arc_length: scale.to_count(config.min_staff_arc_length),
            max_staff_arc_length: scale.to_count(config.max_staff_arc_length),
            min_staff_line_distance: px(config.min_staff_line_distance),
            max_line_distance: px(config.max_line_distance),
            max_line_sin_sq: bend * bend,
            max_vertical_inv_slope: config.max_vertical_inv_slope,
            similar_radius_ratio: config.similar_radius_ratio,
            min_circle_radius: ipx(config.min_circle_radius),
            max_circle_radius: ipx(config.max_circle_radius),
            max_arc_angle_high: config.max_arc_angle_high.to_radians(),
            max_arc_angle_low: config.max_arc_angle_low.to_radians(),
            max_arcs_distance: px(config.max_arcs_distance),
            arc_min_seed_length: scale.to_count(config.arc_min_seed_length),
            max_ext_distance: px(config.max_ext_distance),
            min_projection: px(config.min_projection),
            max_ext_turn: config.max_ext_turn.to_radians(),
            arc_check_length: scale.to_count(config.arc_check_length),
            side_length: scale.to_count(config.side_circle_length),
            max_staff_line_dy: px(config.max_staff_line_dy),
            max_incidence: config.max_incidence.to_radians(),
            gap_box_length: ipx(config.gap_box_length),
            gap_box_delta_in: ipx(config.gap_box_delta_in),
            gap_box_delta_out: ipx(config.gap_box_delta_out),
            line_box_length: ipx(config.line_box_length),
            line_box_in: ipx(config.line_box_in),
            line_box_delta_in: ipx(config.line_box_delta_in),
            line_box_delta_out: ipx(config.line_box_delta_out),
            max_clump_candidates: config.max_clump_candidates,
            max_slur_distance: px(config.max_slur_distance),
            min_angle_from_vertical_low: config.min_angle_from_vertical_low.to_radians(),
            min_angle_from_vertical_high: config.min_angle_from_vertical_high.to_radians(),
            min_slur_width_low: ipx(config.min_slur_width_low),
            min_slur_width_high: ipx(config.min_slur_width_high),
            min_slur_height_low: ipx(config.min_slur_height_low),
            min_slur_height_high: ipx(config.min_slur_height_high),
            quorum_ratio: config.quorum_ratio,
            tangent_length: scale.to_count(config.tangent_length),
            max_staff_end_incidence: config.max_staff_end_incidence.to_radians(),
            coverage_h_ext: ipx(config.coverage_h_ext),
            coverage_h_in: ipx(config.coverage_h_in),
            coverage_h_depth: ipx(config.coverage_h_depth),
            coverage_v_ext: ipx(config.coverage_v_ext),
            coverage_v_in: ipx(config.coverage_v_in),
            coverage_v_depth: ipx(config.coverage_v_depth),
            slope_separator: config.slope_separator,
            wide_slur_width: ipx(config.wide_slur_width),
            max_orphan_slope: config.max_orphan_slope,
            max_orphan_dx: ipx(config.max_orphan_dx),
        }
    }
}
