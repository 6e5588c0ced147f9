pub mod aggregate;
pub mod error;
pub mod flow;
pub mod geometry;
pub mod landmark;
pub mod line;
pub mod model;

// Re-export commonly used types
pub use aggregate::{score_image, DatasetSummary, ImageRecord, ImageScores, ScoreAccumulator};
pub use error::MetricError;
pub use flow::{DisplacementField, ResampledFlow, ResizeFilter};
pub use geometry::Point;
pub use landmark::{LandmarkSet, NOSE_TIP_ANCHOR};
pub use line::Line;
pub use model::{FlowModel, FlowPrediction, OnnxFlowModel};
