//! Test-set discovery and companion file loading.
//!
//! Every evaluated image `<stem>.jpg` (or `.png`) has its annotations next to
//! it, named `<stem><suffix>` with the suffixes below.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use warpmetric_core::{ImageRecord, LandmarkSet, Line};

pub const STEREO_LANDMARKS: &str = "_stereo_landmark.json";
pub const SOURCE_LANDMARKS: &str = "_landmark.json";
pub const PREDICTED_LANDMARKS: &str = "_pred_mask_ldmk.json";
pub const REFERENCE_LINES: &str = "_line_lines.json";
pub const SOURCE_LINES: &str = "_lines.json";
pub const WARPED_OUTPUT: &str = "_pred.png";

const IMAGE_EXTENSIONS: [&str; 2] = [".jpg", ".png"];

/// All evaluable images under `root`, sorted by path.
pub fn discover_images(root: &Path, exclude: &[String]) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        anyhow::bail!("test directory {} does not exist", root.display());
    }

    let mut images: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let Some(name) = e.file_name().to_str() else {
                return false;
            };
            IMAGE_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
                && !exclude.iter().any(|kw| name.contains(kw.as_str()))
        })
        .map(|e| e.into_path())
        .collect();
    images.sort();

    log::debug!("discovered {} image(s) under {}", images.len(), root.display());
    Ok(images)
}

/// `<dir>/<stem><suffix>` for an image at `<dir>/<stem>.<ext>`.
pub fn companion_path(image: &Path, suffix: &str) -> PathBuf {
    let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    image.with_file_name(format!("{}{}", stem, suffix))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Landmark sets stored as `[[[x, y], ...], ...]`, one entry per person.
pub fn load_landmarks(path: &Path) -> Result<Vec<LandmarkSet>> {
    read_json(path)
}

/// Polylines stored as `[[[x, y], ...], ...]`, one entry per line.
pub fn load_lines(path: &Path) -> Result<Vec<Line>> {
    read_json(path)
}

/// Load every companion of `image`. Any missing or malformed file fails the image.
pub fn load_record(image: &Path) -> Result<ImageRecord> {
    Ok(ImageRecord {
        predicted: load_landmarks(&companion_path(image, PREDICTED_LANDMARKS))?,
        stereo: load_landmarks(&companion_path(image, STEREO_LANDMARKS))?,
        source: load_landmarks(&companion_path(image, SOURCE_LANDMARKS))?,
        reference_lines: load_lines(&companion_path(image, REFERENCE_LINES))?,
        source_lines: load_lines(&companion_path(image, SOURCE_LINES))?,
    })
}
