use anyhow::Result;
use image::{DynamicImage, RgbImage};
use ndarray::Array3;
use serde_json::json;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use warpmetric::config::Config;
use warpmetric::{dataset, evaluate, FlowPrediction};
use warpmetric_core::DisplacementField;

/// 64 landmarks spread around `origin`, none closer than a pixel to the nose tip (63).
fn face(origin: (f32, f32)) -> Vec<[f32; 2]> {
    (0..64)
        .map(|i| {
            let a = i as f32 * 0.41;
            let r = 6.0 + (i % 5) as f32;
            [origin.0 + r * a.cos(), origin.1 + r * a.sin()]
        })
        .collect()
}

fn shifted(points: &[[f32; 2]], dx: f32, dy: f32) -> Vec<[f32; 2]> {
    points.iter().map(|[x, y]| [x + dx, y + dy]).collect()
}

fn write_json(path: PathBuf, value: serde_json::Value) {
    std::fs::write(path, serde_json::to_string(&value).unwrap()).unwrap();
}

/// Lay out one test image with all five companions.
fn write_sample(dir: &Path, stem: &str, source_lines: serde_json::Value) -> PathBuf {
    let image = dir.join(format!("{}.png", stem));
    RgbImage::new(40, 30).save(&image).unwrap();

    let upper = face((12.0, 8.0));
    let lower = face((26.0, 21.0));
    let companion = |suffix| dataset::companion_path(&image, suffix);

    write_json(companion(dataset::STEREO_LANDMARKS), json!([lower, upper]));
    write_json(companion(dataset::SOURCE_LANDMARKS), json!([upper, lower]));
    write_json(
        companion(dataset::PREDICTED_LANDMARKS),
        json!([shifted(&upper, 1.0, -2.0), shifted(&lower, 0.5, 0.5)]),
    );
    write_json(
        companion(dataset::REFERENCE_LINES),
        json!([[[0, 0], [10, 5]], [[0, 0], [0, 10]]]),
    );
    write_json(companion(dataset::SOURCE_LINES), source_lines);
    image
}

/// Model stub: constant half-cell shift on a 20x15 grid, doubled to pixels after resampling.
fn constant_model(_: &DynamicImage) -> Result<FlowPrediction> {
    let data = Array3::from_shape_fn((15, 20, 2), |(_, _, c)| if c == 0 { 0.5 } else { 0.25 });
    Ok(FlowPrediction {
        warped: RgbImage::new(20, 15),
        field: DisplacementField::from_hwc(data)?,
    })
}

#[test]
fn test_discovery_skips_companions() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("b");
    std::fs::create_dir(&nested).unwrap();
    write_sample(&nested, "0002", json!([]));
    write_sample(dir.path(), "0001", json!([]));
    RgbImage::new(4, 4).save(dir.path().join("0001_pred.png")).unwrap();
    RgbImage::new(4, 4).save(dir.path().join("0001_mask.png")).unwrap();
    std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

    let images = dataset::discover_images(dir.path(), &Config::default().exclude_keywords).unwrap();
    assert_eq!(
        images,
        vec![dir.path().join("0001.png"), nested.join("0002.png")]
    );

    assert!(dataset::discover_images(&dir.path().join("missing"), &[]).is_err());
}

#[test]
fn test_evaluate_dataset() {
    let _ = env_logger::try_init();
    let dir = TempDir::new().unwrap();
    let straight = json!([
        [[4, 4], [8, 6], [12, 8], [16, 10]],
        [[20, 2], [20, 6], [20, 10]]
    ]);
    let images = vec![
        write_sample(dir.path(), "0001", straight.clone()),
        write_sample(dir.path(), "0002", straight),
    ];

    let cfg = Config::default();
    let mut model = constant_model;
    let report = evaluate::evaluate_dataset(&mut model, &images, &cfg, false).unwrap();

    assert_eq!(report.images.len(), 2);
    let summary = report.summary;
    assert_eq!(summary.images, 2);
    assert!((summary.line_score.unwrap() - 100.0).abs() < 1e-9);
    assert!((summary.face_score.unwrap() - 100.0).abs() < 1e-3);
    assert!(summary.landmark_loss.unwrap() < 1e-4);

    let out = dir.path().join("report.json");
    evaluate::write_report(&report, &out).unwrap();
    let parsed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(parsed["images"].as_array().unwrap().len(), 2);
    assert!(parsed["images"][0]["line_score"].is_number());
    assert_eq!(parsed["summary"]["images"], 2);
}

#[test]
fn test_missing_companion_aborts() {
    let dir = TempDir::new().unwrap();
    let image = write_sample(dir.path(), "0001", json!([]));
    std::fs::remove_file(dataset::companion_path(&image, dataset::STEREO_LANDMARKS)).unwrap();

    let mut model = constant_model;
    let err = evaluate::evaluate_dataset(&mut model, &[image], &Config::default(), false)
        .unwrap_err();
    assert!(format!("{:#}", err).contains("_stereo_landmark.json"));
}

#[test]
fn test_fewer_source_lines_than_reference_fails() {
    let dir = TempDir::new().unwrap();
    let image = write_sample(dir.path(), "0001", json!([[[4, 4], [8, 6], [12, 8]]]));

    let mut model = constant_model;
    assert!(evaluate::evaluate_image(&mut model, &image, &Config::default()).is_err());
}

#[test]
fn test_generate_outputs() {
    let dir = TempDir::new().unwrap();
    let image = write_sample(dir.path(), "0001", json!([]));

    let mut model = constant_model;
    let written = evaluate::generate_outputs(&mut model, &[image.clone()], false).unwrap();
    assert_eq!(written, 1);

    let out = image::open(dataset::companion_path(&image, dataset::WARPED_OUTPUT)).unwrap();
    assert_eq!((out.width(), out.height()), (20, 15));
}
