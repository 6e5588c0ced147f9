use anyhow::{Context, Result};
use image::GenericImageView;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use warpmetric_core::{score_image, DatasetSummary, FlowModel, ImageScores, ScoreAccumulator};

use crate::config::Config;
use crate::dataset;

#[derive(Debug, Clone, Serialize)]
pub struct ImageReport {
    pub path: PathBuf,
    #[serde(flatten)]
    pub scores: ImageScores,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub images: Vec<ImageReport>,
    pub summary: DatasetSummary,
}

fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template(
        "[{elapsed_precise} ETA: {eta}] {msg} {wide_bar:.yellow} {human_pos}/{human_len}",
    ) {
        bar.set_style(style.progress_chars("█▇▆▅▄▃▂▁  "));
    }
    bar
}

/// Score a single image against its companion annotations.
pub fn evaluate_image(model: &mut dyn FlowModel, path: &Path, cfg: &Config) -> Result<ImageScores> {
    let record = dataset::load_record(path)?;

    let img = image::open(path).with_context(|| format!("opening {}", path.display()))?;
    let (width, height) = img.dimensions();

    let prediction = model
        .predict(&img)
        .with_context(|| format!("running flow model on {}", path.display()))?;
    let flow = prediction
        .field
        .resample(width as usize, height as usize, cfg.resize_filter)?;

    let scores = score_image(record, &flow, cfg.anchor_index)
        .with_context(|| format!("scoring {}", path.display()))?;
    log::debug!(
        "{}: line={:?} face={:?} loss={:?}",
        path.display(),
        scores.line_score,
        scores.face_similarity,
        scores.landmark_loss
    );
    Ok(scores)
}

/// Score every image in order and reduce to dataset means.
///
/// The first failing image aborts the run; no partial summary is produced.
pub fn evaluate_dataset(
    model: &mut dyn FlowModel,
    images: &[PathBuf],
    cfg: &Config,
    show_progress: bool,
) -> Result<EvaluationReport> {
    let bar = progress_bar(images.len(), show_progress);
    bar.set_message("Evaluating");

    let mut acc = ScoreAccumulator::new();
    let mut reports = Vec::with_capacity(images.len());
    for path in images {
        let scores = evaluate_image(model, path, cfg)?;
        acc.push(scores);
        reports.push(ImageReport {
            path: path.clone(),
            scores,
        });
        bar.inc(1);
    }
    bar.finish_and_clear();

    let summary = acc.summarize()?;
    log::info!("evaluated {} image(s)", summary.images);
    Ok(EvaluationReport {
        images: reports,
        summary,
    })
}

/// Run the model on every image and save the warped result next to it.
pub fn generate_outputs(model: &mut dyn FlowModel, images: &[PathBuf], show_progress: bool) -> Result<usize> {
    let bar = progress_bar(images.len(), show_progress);
    bar.set_message("Generating");

    for path in images {
        let img = image::open(path).with_context(|| format!("opening {}", path.display()))?;
        let prediction = model
            .predict(&img)
            .with_context(|| format!("running flow model on {}", path.display()))?;
        let out = dataset::companion_path(path, dataset::WARPED_OUTPUT);
        prediction
            .warped
            .save(&out)
            .with_context(|| format!("writing {}", out.display()))?;
        log::debug!("wrote {}", out.display());
        bar.inc(1);
    }
    bar.finish_and_clear();

    Ok(images.len())
}

pub fn write_report(report: &EvaluationReport, path: &Path) -> Result<()> {
    let data = serde_json::to_string_pretty(report)?;
    std::fs::write(path, data).with_context(|| format!("writing report {}", path.display()))?;
    Ok(())
}
