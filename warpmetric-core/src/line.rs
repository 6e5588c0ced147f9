//! Straightness scoring for warped structural lines.
//!
//! A reference line contributes one slope (from its first two points). Each
//! segment of the warped target line is compared against that slope, the
//! absolute deviations are min-max normalised, and the line scores
//! `1 - mean(normalised deviations)`.

use serde::{Deserialize, Serialize};

use crate::error::{MetricError, Result};
use crate::geometry::{mean, normalize, safe_div, Point};

/// Ordered polyline approximating a straight edge, in image pixels.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Line {
    pub points: Vec<Point>,
}

impl Line {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl FromIterator<Point> for Line {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl From<Vec<[f32; 2]>> for Line {
    fn from(raw: Vec<[f32; 2]>) -> Self {
        raw.into_iter().map(Point::from).collect()
    }
}

fn slope(a: Point, b: Point) -> f64 {
    safe_div(b.y as f64 - a.y as f64, b.x as f64 - a.x as f64)
}

/// Slope of the segment joining the first two points of `line`.
pub fn reference_slope(line: &Line, index: usize) -> Result<f64> {
    match line.points.as_slice() {
        [p0, p1, ..] => Ok(slope(*p0, *p1)),
        _ => Err(MetricError::LineTooShort {
            index,
            points: line.len(),
        }),
    }
}

/// `|slope(segment) - gt_k|` for each consecutive pair of points.
pub fn segment_deviations(line: &Line, gt_k: f64) -> Vec<f64> {
    line.points
        .windows(2)
        .map(|w| (slope(w[0], w[1]) - gt_k).abs())
        .collect()
}

/// Score of a line made of exactly one segment.
///
/// Min-max normalising a single deviation always yields 0, so such a line
/// scores 1 whatever its orientation. Kept as its own function so the
/// multi-segment path does not depend on this behaviour.
pub fn single_segment_score(_deviation: f64) -> f64 {
    1.0
}

/// Straightness score of a warped line against the reference slope `gt_k`.
pub fn line_score(line: &Line, gt_k: f64, index: usize) -> Result<f64> {
    let deviations = segment_deviations(line, gt_k);
    match deviations.as_slice() {
        [] => Err(MetricError::LineTooShort {
            index,
            points: line.len(),
        }),
        [only] => Ok(single_segment_score(*only)),
        _ => {
            let normalized = normalize(&deviations);
            Ok(1.0 - mean(&normalized).unwrap_or(0.0))
        }
    }
}

/// Mean line score of one image.
///
/// `reference` and `warped` pair by position. Extra warped lines are
/// ignored; missing ones are an error. `None` when the image has no lines.
pub fn image_line_score(reference: &[Line], warped: &[Line]) -> Result<Option<f64>> {
    if warped.len() < reference.len() {
        return Err(MetricError::LineCountMismatch {
            references: reference.len(),
            targets: warped.len(),
        });
    }
    if warped.len() > reference.len() {
        log::debug!(
            "ignoring {} unpaired target line(s)",
            warped.len() - reference.len()
        );
    }

    let scores = reference
        .iter()
        .zip(warped)
        .enumerate()
        .map(|(i, (gt, pred))| {
            let gt_k = reference_slope(gt, i)?;
            line_score(pred, gt_k, i)
        })
        .collect::<Result<Vec<f64>>>()?;

    Ok(mean(&scores))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(points: &[(f32, f32)]) -> Line {
        points.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn test_reference_slope() {
        let k = reference_slope(&line(&[(0.0, 0.0), (2.0, 1.0), (9.0, 9.0)]), 0).unwrap();
        assert!((k - 0.5).abs() < 1e-6);

        let vertical = reference_slope(&line(&[(3.0, 0.0), (3.0, 2.0)]), 0).unwrap();
        assert!(vertical.is_finite() && vertical > 1e5);

        assert!(matches!(
            reference_slope(&line(&[(0.0, 0.0)]), 4),
            Err(MetricError::LineTooShort { index: 4, points: 1 })
        ));
    }

    #[test]
    fn test_aligned_line_scores_one() {
        let pts = line(&[(0.0, 0.0), (1.0, 2.0), (2.0, 4.0), (3.0, 6.0)]);
        let gt_k = reference_slope(&line(&[(10.0, 10.0), (11.0, 12.0)]), 0).unwrap();
        assert_eq!(line_score(&pts, gt_k, 0).unwrap(), 1.0);
    }

    #[test]
    fn test_two_point_line_always_one() {
        let pts = line(&[(0.0, 0.0), (1.0, 50.0)]);
        assert_eq!(line_score(&pts, -3.0, 0).unwrap(), 1.0);
    }

    #[test]
    fn test_bent_line_scores_below_one() {
        let pts = line(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 3.0)]);
        let score = line_score(&pts, 0.0, 0).unwrap();
        // deviations [0, 0, 3] normalise to ~[0, 0, 1]
        assert!((score - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_image_line_score_pairs_by_position() {
        let reference = vec![
            line(&[(0.0, 0.0), (1.0, 0.0)]),
            line(&[(0.0, 0.0), (1.0, 1.0)]),
        ];
        let warped = vec![
            line(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 3.0)]),
            line(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]),
            line(&[(0.0, 0.0)]),
        ];
        let score = image_line_score(&reference, &warped).unwrap().unwrap();
        assert!((score - (2.0 / 3.0 + 1.0) / 2.0).abs() < 1e-6);

        assert!(image_line_score(&reference, &warped[..1]).is_err());
        assert_eq!(image_line_score(&[], &[]).unwrap(), None);
    }
}
