//! Per-image scoring and dataset-level reduction.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MetricError, Result};
use crate::flow::ResampledFlow;
use crate::geometry::mean;
use crate::landmark::{face_similarity, landmark_loss, sort_by_anchor_y, LandmarkSet};
use crate::line::{image_line_score, Line};

/// Everything loaded for one image besides its flow.
#[derive(Debug, Clone, Default)]
pub struct ImageRecord {
    /// Landmarks detected on the model output.
    pub predicted: Vec<LandmarkSet>,
    /// Ground-truth landmarks from the stereographic reference.
    pub stereo: Vec<LandmarkSet>,
    /// Landmarks detected on the source image. Sorted with the others but not scored.
    pub source: Vec<LandmarkSet>,
    /// Ground-truth lines, one reference slope each.
    pub reference_lines: Vec<Line>,
    /// The same lines as they appear in the uncorrected image.
    pub source_lines: Vec<Line>,
}

/// Per-image score triple. `None` marks a metric that is undefined for the
/// image (no lines, or no face paired up).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageScores {
    pub line_score: Option<f64>,
    pub face_similarity: Option<f64>,
    pub landmark_loss: Option<f64>,
}

/// Score one image: sort the landmark lists, warp the source lines through
/// `flow`, and compare both against ground truth.
pub fn score_image(mut record: ImageRecord, flow: &ResampledFlow, anchor: usize) -> Result<ImageScores> {
    sort_by_anchor_y(&mut record.stereo, anchor)?;
    sort_by_anchor_y(&mut record.predicted, anchor)?;
    sort_by_anchor_y(&mut record.source, anchor)?;

    let warped: Vec<Line> = record.source_lines.iter().map(|l| flow.warp_line(l)).collect();

    Ok(ImageScores {
        line_score: image_line_score(&record.reference_lines, &warped)?,
        face_similarity: face_similarity(&record.predicted, &record.stereo, anchor)?,
        landmark_loss: landmark_loss(&record.predicted, &record.stereo, anchor)?,
    })
}

/// Collects per-image scores across a dataset.
#[derive(Debug, Clone, Default)]
pub struct ScoreAccumulator {
    images: usize,
    line: Vec<f64>,
    face: Vec<f64>,
    loss: Vec<f64>,
}

impl ScoreAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, scores: ImageScores) {
        self.images += 1;
        self.line.extend(scores.line_score);
        self.face.extend(scores.face_similarity);
        self.loss.extend(scores.landmark_loss);
    }

    /// Fold in scores gathered elsewhere. Order does not matter.
    pub fn merge(&mut self, other: ScoreAccumulator) {
        self.images += other.images;
        self.line.extend(other.line);
        self.face.extend(other.face);
        self.loss.extend(other.loss);
    }

    pub fn images(&self) -> usize {
        self.images
    }

    pub fn summarize(&self) -> Result<DatasetSummary> {
        if self.images == 0 {
            return Err(MetricError::EmptyDataset);
        }
        Ok(DatasetSummary {
            images: self.images,
            line_score: mean(&self.line).map(|m| m * 100.0),
            face_score: mean(&self.face).map(|m| m * 100.0),
            landmark_loss: mean(&self.loss),
        })
    }
}

impl Extend<ImageScores> for ScoreAccumulator {
    fn extend<I: IntoIterator<Item = ImageScores>>(&mut self, iter: I) {
        for scores in iter {
            self.push(scores);
        }
    }
}

impl FromIterator<ImageScores> for ScoreAccumulator {
    fn from_iter<I: IntoIterator<Item = ImageScores>>(iter: I) -> Self {
        let mut acc = Self::new();
        acc.extend(iter);
        acc
    }
}

/// Dataset means. Line and face scores are percentages, loss is in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub images: usize,
    pub line_score: Option<f64>,
    pub face_score: Option<f64>,
    pub landmark_loss: Option<f64>,
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn field(v: Option<f64>) -> String {
            v.map_or_else(|| "n/a".to_string(), |v| format!("{:.4}", v))
        }
        write!(
            f,
            "Line_score = {}, Face_score = {}, ldmk_loss = {}",
            field(self.line_score),
            field(self.face_score),
            field(self.landmark_loss)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(line: f64) -> ImageScores {
        ImageScores {
            line_score: Some(line),
            face_similarity: Some(1.0),
            landmark_loss: Some(2.0),
        }
    }

    #[test]
    fn test_summary_scales_percentages() {
        let acc: ScoreAccumulator = [0.9, 0.8, 1.0].into_iter().map(scores).collect();
        let summary = acc.summarize().unwrap();
        assert_eq!(summary.images, 3);
        assert!((summary.line_score.unwrap() - 90.0).abs() < 1e-9);
        assert!((summary.face_score.unwrap() - 100.0).abs() < 1e-9);
        assert!((summary.landmark_loss.unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_undefined_metrics_skip_mean() {
        let mut acc = ScoreAccumulator::new();
        acc.push(scores(0.5));
        acc.push(ImageScores {
            line_score: None,
            ..scores(0.0)
        });
        let summary = acc.summarize().unwrap();
        assert_eq!(summary.images, 2);
        assert!((summary.line_score.unwrap() - 50.0).abs() < 1e-9);

        let only_empty: ScoreAccumulator = std::iter::once(ImageScores::default()).collect();
        let summary = only_empty.summarize().unwrap();
        assert_eq!(summary.line_score, None);
        assert_eq!(
            summary.to_string(),
            "Line_score = n/a, Face_score = n/a, ldmk_loss = n/a"
        );
    }

    #[test]
    fn test_merge_is_order_insensitive() {
        let mut a: ScoreAccumulator = [0.2, 0.4].into_iter().map(scores).collect();
        let b: ScoreAccumulator = [0.6].into_iter().map(scores).collect();
        let mut c: ScoreAccumulator = [0.6].into_iter().map(scores).collect();
        c.merge(a.clone());
        a.merge(b);
        let (sa, sc) = (a.summarize().unwrap(), c.summarize().unwrap());
        assert_eq!(sa.images, 3);
        assert!((sa.line_score.unwrap() - sc.line_score.unwrap()).abs() < 1e-9);
    }

    #[test]
    fn test_empty_dataset() {
        assert!(matches!(
            ScoreAccumulator::new().summarize(),
            Err(MetricError::EmptyDataset)
        ));
    }
}
