pub mod config;
pub mod dataset;
pub mod evaluate;

// Re-export metric types for convenience
pub use warpmetric_core::{
    DatasetSummary, FlowModel, FlowPrediction, ImageRecord, ImageScores, OnnxFlowModel,
};
