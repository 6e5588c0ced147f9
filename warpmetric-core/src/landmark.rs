//! Anchored comparison of facial landmark sets.
//!
//! Every set is translated so that its anchor point (the nose tip in the
//! 64-point scheme) sits at the origin before any comparison. Predicted and
//! ground-truth sets pair up by position after both lists have been sorted
//! with [`sort_by_anchor_y`]; surplus people on either side are dropped.

use serde::{Deserialize, Serialize};

use crate::error::{MetricError, Result};
use crate::geometry::{anchored, mean, safe_div, Point};

/// Nose tip in the 64-point landmark scheme.
pub const NOSE_TIP_ANCHOR: usize = 63;

/// Whether the anchor index takes part in a per-point aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorPolicy {
    Exclude,
    Include,
}

impl AnchorPolicy {
    fn keeps(self, index: usize, anchor: usize) -> bool {
        self == AnchorPolicy::Include || index != anchor
    }
}

/// The anchor has no direction after anchoring, so similarity skips it.
pub const SIMILARITY_ANCHOR: AnchorPolicy = AnchorPolicy::Exclude;

/// Loss averages over the full anchored set; the anchor contributes a zero term.
pub const LOSS_ANCHOR: AnchorPolicy = AnchorPolicy::Include;

/// Landmarks of one detected face.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    pub points: Vec<Point>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn anchor(&self, anchor: usize) -> Result<Point> {
        self.points
            .get(anchor)
            .copied()
            .ok_or(MetricError::AnchorOutOfRange {
                anchor,
                points: self.len(),
            })
    }

    /// Points relative to the anchor.
    pub fn anchored(&self, anchor: usize) -> Result<Vec<Point>> {
        Ok(anchored(&self.points, self.anchor(anchor)?))
    }
}

impl From<Vec<[f32; 2]>> for LandmarkSet {
    fn from(raw: Vec<[f32; 2]>) -> Self {
        Self::new(raw.into_iter().map(Point::from).collect())
    }
}

/// Stable sort by the anchor's y-coordinate.
///
/// Detections carry no identity, so this is how sets from different runs
/// line up person by person. Changing the key breaks comparability with
/// earlier scores.
pub fn sort_by_anchor_y(sets: &mut [LandmarkSet], anchor: usize) -> Result<()> {
    for set in sets.iter() {
        set.anchor(anchor)?;
    }
    sets.sort_by(|a, b| a.points[anchor].y.total_cmp(&b.points[anchor].y));
    Ok(())
}

/// Anchored `(predicted, ground_truth)` point arrays for each paired person.
fn anchored_people(
    preds: &[LandmarkSet],
    gts: &[LandmarkSet],
    anchor: usize,
) -> Result<Vec<(Vec<Point>, Vec<Point>)>> {
    preds
        .iter()
        .zip(gts)
        .enumerate()
        .map(|(person, (pred, gt))| {
            if pred.len() != gt.len() {
                return Err(MetricError::PointCountMismatch {
                    person,
                    predicted: pred.len(),
                    ground_truth: gt.len(),
                });
            }
            Ok((pred.anchored(anchor)?, gt.anchored(anchor)?))
        })
        .collect()
}

fn compared_points<'a>(
    pred: &'a [Point],
    gt: &'a [Point],
    anchor: usize,
    policy: AnchorPolicy,
) -> impl Iterator<Item = (Point, Point)> + 'a {
    pred.iter()
        .zip(gt)
        .enumerate()
        .filter(move |(i, _)| policy.keeps(*i, anchor))
        .map(|(_, (&p, &g))| (p, g))
}

/// Cosine similarity of anchor-relative vectors.
///
/// Averaged over the non-anchor points of each person, then over people.
/// `None` when no person pairs up.
pub fn face_similarity(
    preds: &[LandmarkSet],
    gts: &[LandmarkSet],
    anchor: usize,
) -> Result<Option<f64>> {
    let per_person: Vec<f64> = anchored_people(preds, gts, anchor)?
        .iter()
        .filter_map(|(pred, gt)| {
            let sims: Vec<f64> = compared_points(pred, gt, anchor, SIMILARITY_ANCHOR)
                .map(|(p, g)| safe_div(p.dot(g), p.norm() * g.norm()))
                .collect();
            mean(&sims)
        })
        .collect();
    Ok(mean(&per_person))
}

/// Mean absolute per-axis difference of anchor-relative points, in pixels.
///
/// Averaged over every point, both axes and all paired people.
pub fn landmark_loss(
    preds: &[LandmarkSet],
    gts: &[LandmarkSet],
    anchor: usize,
) -> Result<Option<f64>> {
    let mut total = 0.0;
    let mut count = 0usize;
    for (pred, gt) in anchored_people(preds, gts, anchor)? {
        for (p, g) in compared_points(&pred, &gt, anchor, LOSS_ANCHOR) {
            let d = p - g;
            total += (d.x as f64).abs() + (d.y as f64).abs();
            count += 2;
        }
    }
    Ok((count > 0).then(|| total / count as f64))
}
