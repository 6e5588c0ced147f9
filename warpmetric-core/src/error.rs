use thiserror::Error;

/// Structural problems in metric inputs.
///
/// Degenerate geometry (vertical segments, zero-length vectors, constant
/// score lists) never shows up here; it is absorbed by [`crate::geometry::EPS`].
#[derive(Debug, Error)]
pub enum MetricError {
    #[error("anchor index {anchor} out of range for a set of {points} points")]
    AnchorOutOfRange { anchor: usize, points: usize },

    #[error("person {person}: predicted set has {predicted} points, ground truth has {ground_truth}")]
    PointCountMismatch {
        person: usize,
        predicted: usize,
        ground_truth: usize,
    },

    #[error("line {index} has {points} point(s), at least 2 are required")]
    LineTooShort { index: usize, points: usize },

    #[error("{references} reference line(s) but only {targets} target line(s)")]
    LineCountMismatch { references: usize, targets: usize },

    #[error("displacement field must have 2 channels, got shape {0:?}")]
    FieldShape(Vec<usize>),

    #[error("cannot resample displacement field to {width}x{height}")]
    EmptyResolution { width: usize, height: usize },

    #[error("no images were evaluated")]
    EmptyDataset,
}

pub type Result<T> = std::result::Result<T, MetricError>;
