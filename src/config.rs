use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use warpmetric_core::{model::DEFAULT_INPUT_SIZE, ResizeFilter, NOSE_TIP_ANCHOR};

pub static CONFIG_PATH: Lazy<PathBuf> = Lazy::new(|| {
    if let Some(path) = option_env!("WARPMETRIC_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    directories::ProjectDirs::from("", "", "warpmetric")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("warpmetric.toml"))
});

/// File names containing any of these are companions or outputs, not inputs.
pub const DEFAULT_EXCLUDE_KEYWORDS: [&str; 8] = [
    "line", "stereo", "pred", "face", "mask", "ldmk", "output", "semi",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model_path: PathBuf,
    pub input_width: u32,
    pub input_height: u32,
    pub anchor_index: usize,
    pub resize_filter: ResizeFilter,
    pub exclude_keywords: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("pretrained_models/flownet.onnx"),
            input_width: DEFAULT_INPUT_SIZE.0,
            input_height: DEFAULT_INPUT_SIZE.1,
            anchor_index: NOSE_TIP_ANCHOR,
            resize_filter: ResizeFilter::default(),
            exclude_keywords: DEFAULT_EXCLUDE_KEYWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    if !path.exists() {
        log::debug!("no config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(path, data).with_context(|| format!("writing config {}", path.display()))?;
    Ok(())
}
