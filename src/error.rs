use thiserror::Error;

/// Errors that can occur during slur retrieval.
///
/// Geometric rejections are not errors: they surface as `None` from the
/// fitting and grading functions and the candidate is simply abandoned.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CurveError {
    #[error("failed to load image: {0}")]
    ImageLoad(String),

    #[error("invalid interline scale: {0}")]
    InvalidScale(f64),

    #[error("skeleton contains no foreground pixel")]
    EmptySkeleton,

    #[error("curve #{id} is broken: {reason}")]
    BrokenCurve { id: usize, reason: &'static str },

    #[error("invalid page layout: {0}")]
    Layout(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("render error: {0}")]
    Render(String),
}
