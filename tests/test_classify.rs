mod common;

use common::fixtures;
use landwatch::terrain::{ClassifierConfig, TerrainClass, TerrainClassifier, stats};
use std::path::Path;

fn classifier(report: bool) -> TerrainClassifier {
    let cfg = ClassifierConfig {
        smoothing_sigma: 0.0,
        ..ClassifierConfig::default()
    };
    TerrainClassifier::new(cfg).with_report(report)
}

#[test]
fn classify_writes_annotated_image_and_report() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let input = fixtures::save_png(dir.path(), "scene.png", &fixtures::terrain_scene());

    let outcome = classifier(true).process_file(&input)?;

    assert!(outcome.output_path.exists());
    let name = outcome.output_path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("scene_classified_"));
    assert!(name.ends_with(".png"));

    let report_path = outcome.report_path.expect("report requested");
    let report = std::fs::read_to_string(report_path)?;
    assert!(report.contains("Forest (low risk)"));
    assert!(report.contains("ALERT: flooded areas detected"));

    let forest = stats::percentage_of(&outcome.stats, TerrainClass::Forest);
    let flood = stats::percentage_of(&outcome.stats, TerrainClass::Flood);
    assert!(forest >= 45.0);
    assert!(flood >= 45.0);
    let total: f64 = outcome.stats.iter().map(|s| s.percentage).sum();
    assert!(total <= 100.0 + 1e-9);
    Ok(())
}

#[test]
fn batch_continues_past_broken_files() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    fixtures::save_png(dir.path(), "a.png", &fixtures::terrain_scene());
    fixtures::save_png(dir.path(), "b.png", &fixtures::terrain_scene());
    std::fs::write(dir.path().join("broken.png"), b"not an image")?;

    let summary = classifier(false).process_batch(dir.path())?;
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.failed, 1);
    Ok(())
}

#[test]
fn missing_input_reports_file_not_found() {
    let err = classifier(false)
        .process_file(Path::new("/nonexistent/scene.png"))
        .unwrap_err();
    assert!(err.to_string().contains("file not found"));
}

#[test]
fn empty_directory_is_an_error() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    assert!(classifier(false).process_batch(dir.path()).is_err());
    Ok(())
}
