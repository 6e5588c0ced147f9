use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use warpmetric::{config, dataset, evaluate, OnnxFlowModel};

#[derive(Parser)]
#[command(name = "warpmetric")]
#[command(
    version,
    about = "Line straightness and face shape metrics for flow-based image correction"
)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute line score, face score and landmark loss over a test directory
    Evaluate {
        /// Directory searched recursively for test images
        dir: PathBuf,
        /// ONNX flow model (overrides the config)
        #[arg(short, long)]
        model: Option<PathBuf>,
        /// Write per-image scores and the summary as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Write the model's warped output next to every test image
    Generate {
        /// Directory searched recursively for test images
        dir: PathBuf,
        /// ONNX flow model (overrides the config)
        #[arg(short, long)]
        model: Option<PathBuf>,
    },
    /// Open config file in editor
    Config,
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Evaluate { dir, model, report } => {
            let cfg = config::load_config(config_path)?;
            run_evaluate(&cfg, &dir, model, report.as_deref())
        }
        Commands::Generate { dir, model } => {
            let cfg = config::load_config(config_path)?;
            run_generate(&cfg, &dir, model)
        }
        Commands::Config => open_config(config_path),
    }
}

fn load_model(cfg: &config::Config, model: Option<PathBuf>) -> Result<OnnxFlowModel> {
    let path = model.unwrap_or_else(|| cfg.model_path.clone());
    info!("loading flow model: {}", path.display());
    OnnxFlowModel::from_file(&path, cfg.input_width, cfg.input_height)
        .context("Failed to initialize flow model")
}

fn run_evaluate(
    cfg: &config::Config,
    dir: &Path,
    model: Option<PathBuf>,
    report: Option<&Path>,
) -> Result<()> {
    let images = dataset::discover_images(dir, &cfg.exclude_keywords)?;
    info!("The number of images: {}", images.len());

    let mut model = load_model(cfg, model)?;
    info!("test begin");
    let result = evaluate::evaluate_dataset(&mut model, &images, cfg, true)?;

    println!("{}", result.summary);

    if let Some(path) = report {
        evaluate::write_report(&result, path)?;
        info!("report written to {}", path.display());
    }
    Ok(())
}

fn run_generate(cfg: &config::Config, dir: &Path, model: Option<PathBuf>) -> Result<()> {
    let images = dataset::discover_images(dir, &cfg.exclude_keywords)?;
    info!("The number of images: {}", images.len());

    let mut model = load_model(cfg, model)?;
    let written = evaluate::generate_outputs(&mut model, &images, true)?;

    info!("✓ wrote {} warped image(s)", written);
    Ok(())
}

fn open_config(path: Option<&Path>) -> Result<()> {
    let config_path = path.unwrap_or(&config::CONFIG_PATH);
    if !config_path.exists() {
        config::save_config(&config::Config::default(), Some(config_path))
            .context("Failed to write default config")?;
        info!("Wrote default config: {}", config_path.display());
    }
    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

    info!("Opening config file: {:?}", config_path);

    let status = std::process::Command::new(editor)
        .arg(config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        anyhow::bail!("Editor exited with non-zero status");
    }

    Ok(())
}
