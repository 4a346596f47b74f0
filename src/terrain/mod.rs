pub mod class;
pub mod hsv;
pub mod legend;
pub mod masks;
pub mod overlay;
pub mod stats;

pub use class::{HsvRange, TerrainClass};
pub use stats::ClassStat;

use crate::output;
use ab_glyph::FontVec;
use anyhow::Result;
use image::{DynamicImage, imageops::FilterType};
use imageproc::filter::gaussian_blur_f32;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Tuned detection parameters. Defaults carry the hand-calibrated satellite
/// thresholds; any field can be overridden from a JSON config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub forest: HsvRange,
    pub urban: HsvRange,
    pub pasture: HsvRange,
    pub bare_soil: HsvRange,
    pub flood: HsvRange,
    /// Overlay transparency factor.
    pub alpha: f32,
    /// Images with a larger side are downscaled before processing.
    pub max_dimension: u32,
    /// Gaussian sigma for the pre-detection smoothing pass. Zero disables it.
    pub smoothing_sigma: f32,
    /// V at or below this counts as dark water.
    pub water_dark_value: u8,
    /// S at or below this counts as desaturated water.
    pub water_low_saturation: u8,
    pub flood_alert_pct: f64,
    pub bare_soil_alert_pct: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            forest: HsvRange::new([35, 40, 40], [85, 255, 255]),
            urban: HsvRange::new([0, 0, 100], [180, 50, 255]),
            pasture: HsvRange::new([25, 30, 30], [35, 255, 200]),
            bare_soil: HsvRange::new([10, 50, 50], [25, 255, 200]),
            flood: HsvRange::new([100, 50, 20], [130, 255, 150]),
            alpha: 0.4,
            max_dimension: 2000,
            smoothing_sigma: 1.4,
            water_dark_value: 80,
            water_low_saturation: 50,
            flood_alert_pct: 3.0,
            bare_soil_alert_pct: 8.0,
        }
    }
}

impl ClassifierConfig {
    pub fn range(&self, class: TerrainClass) -> &HsvRange {
        match class {
            TerrainClass::Forest => &self.forest,
            TerrainClass::Urban => &self.urban,
            TerrainClass::Pasture => &self.pasture,
            TerrainClass::BareSoil => &self.bare_soil,
            TerrainClass::Flood => &self.flood,
        }
    }
}

/// Result of classifying one frame, before anything touches the filesystem.
pub struct Classification {
    pub image: image::RgbImage,
    pub stats: Vec<ClassStat>,
    pub alerts: Vec<String>,
}

/// Result of processing one file.
#[derive(Debug)]
pub struct FileOutcome {
    pub output_path: PathBuf,
    pub report_path: Option<PathBuf>,
    pub stats: Vec<ClassStat>,
    pub alerts: Vec<String>,
}

pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
}

const LEGEND_TITLE: &str = "LAND COVER RISK ANALYSIS";

pub struct TerrainClassifier {
    cfg: ClassifierConfig,
    font: Option<FontVec>,
    write_report: bool,
}

impl TerrainClassifier {
    pub fn new(cfg: ClassifierConfig) -> Self {
        Self {
            cfg,
            font: None,
            write_report: false,
        }
    }

    pub fn with_font(mut self, font: Option<FontVec>) -> Self {
        self.font = font;
        self
    }

    pub fn with_report(mut self, write_report: bool) -> Self {
        self.write_report = write_report;
        self
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.cfg
    }

    /// Run the full classification pipeline on a decoded image: downscale,
    /// smooth, threshold per class, resolve overlaps, compute statistics and
    /// blend the overlay. The legend is drawn separately so callers can skip
    /// it.
    pub fn classify(&self, img: &DynamicImage) -> Classification {
        let img = self.downscale(img);
        let rgb = img.to_rgb8();

        let detection_src = if self.cfg.smoothing_sigma > 0.0 {
            gaussian_blur_f32(&rgb, self.cfg.smoothing_sigma)
        } else {
            rgb.clone()
        };
        let hsv = hsv::HsvPixels::from_rgb(&detection_src);

        let mut class_masks = masks::build_masks(&hsv, &self.cfg);
        masks::apply_priority(&mut class_masks);

        let stats = stats::class_stats(&class_masks, rgb.width(), rgb.height());
        let alerts = stats::alerts(&stats, &self.cfg);
        let image = overlay::blend_overlay(&rgb, &class_masks, self.cfg.alpha);

        Classification { image, stats, alerts }
    }

    fn downscale(&self, img: &DynamicImage) -> DynamicImage {
        let max = self.cfg.max_dimension;
        if img.width() > max || img.height() > max {
            log::info!(
                "downscaling {}x{} to fit {}px",
                img.width(),
                img.height(),
                max
            );
            img.resize(max, max, FilterType::Triangle)
        } else {
            img.clone()
        }
    }

    /// Classify one file and write the annotated image (and optional text
    /// report) next to it with a timestamp suffix.
    pub fn process_file(&self, path: &Path) -> Result<FileOutcome> {
        let img = output::load_image(path)?;
        log::info!("loaded {} ({}x{})", path.display(), img.width(), img.height());

        let mut result = self.classify(&img);
        legend::draw_legend(
            &mut result.image,
            LEGEND_TITLE,
            &result.stats,
            &result.alerts,
            self.font.as_ref(),
        );

        let out_path = output::timestamped_sibling(path, "classified", "png");
        let output_path = output::save_image_with_fallback(
            &DynamicImage::ImageRgb8(result.image),
            &out_path,
        )?;

        let report_path = if self.write_report {
            let report = render_report(path, &result.stats, &result.alerts);
            let report_file = output::timestamped_sibling(path, "report", "txt");
            match std::fs::write(&report_file, report) {
                Ok(()) => Some(report_file),
                Err(e) => {
                    log::warn!("could not write report {}: {}", report_file.display(), e);
                    None
                }
            }
        } else {
            None
        };

        Ok(FileOutcome {
            output_path,
            report_path,
            stats: result.stats,
            alerts: result.alerts,
        })
    }

    /// Classify every supported image in a directory, continuing past
    /// per-file failures.
    pub fn process_batch(&self, dir: &Path) -> Result<BatchSummary> {
        let images = output::list_images(dir)?;
        if images.is_empty() {
            anyhow::bail!("no supported images in {}", dir.display());
        }

        let mut processed = 0;
        let mut failed = 0;
        for (i, path) in images.iter().enumerate() {
            println!("[{}/{}] {}", i + 1, images.len(), path.display());
            match self.process_file(path) {
                Ok(outcome) => {
                    println!("  -> {}", outcome.output_path.display());
                    processed += 1;
                }
                Err(e) => {
                    log::error!("failed on {}: {:#}", path.display(), e);
                    failed += 1;
                }
            }
        }
        Ok(BatchSummary { processed, failed })
    }
}

fn render_report(input: &Path, stats: &[ClassStat], alerts: &[String]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Land cover risk analysis - {}\n",
        input.file_name().and_then(|n| n.to_str()).unwrap_or("?")
    ));
    out.push_str(&format!("Generated: {}\n\n", output::timestamp()));
    for stat in stats {
        out.push_str(&format!(
            "{}: {:.2}% ({} px)\n",
            stat.class.label(),
            stat.percentage,
            stat.pixels
        ));
    }
    if !alerts.is_empty() {
        out.push('\n');
        for alert in alerts {
            out.push_str(alert);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    /// Frame with the left half pure green (forest hue) and the right half
    /// saturated blue inside the flood window.
    fn synthetic() -> DynamicImage {
        let mut img = RgbImage::new(40, 20);
        for y in 0..20 {
            for x in 0..40 {
                let px = if x < 20 {
                    Rgb([30, 200, 30])
                } else {
                    Rgb([20, 40, 120])
                };
                img.put_pixel(x, y, px);
            }
        }
        DynamicImage::ImageRgb8(img)
    }

    fn classifier() -> TerrainClassifier {
        let cfg = ClassifierConfig {
            smoothing_sigma: 0.0,
            ..ClassifierConfig::default()
        };
        TerrainClassifier::new(cfg)
    }

    #[test]
    fn synthetic_halves_classify_as_forest_and_flood() {
        let result = classifier().classify(&synthetic());
        let forest = stats::percentage_of(&result.stats, TerrainClass::Forest);
        let flood = stats::percentage_of(&result.stats, TerrainClass::Flood);
        assert!(forest >= 45.0, "forest was {forest}");
        assert!(flood >= 45.0, "flood was {flood}");
        let total: f64 = result.stats.iter().map(|s| s.percentage).sum();
        assert!(total <= 100.0 + 1e-9);
    }

    #[test]
    fn flood_alert_fires_on_synthetic() {
        let result = classifier().classify(&synthetic());
        assert!(result.alerts.iter().any(|a| a.contains("flood")));
    }

    #[test]
    fn overlay_tints_the_forest_half() {
        let result = classifier().classify(&synthetic());
        // 0.4 * (0,255,0) + 0.6 * (30,200,30) = (18, 222, 18)
        assert_eq!(result.image.get_pixel(5, 10).0, [18, 222, 18]);
    }

    #[test]
    fn large_images_are_downscaled() {
        let cfg = ClassifierConfig {
            max_dimension: 100,
            smoothing_sigma: 0.0,
            ..ClassifierConfig::default()
        };
        let big = DynamicImage::ImageRgb8(RgbImage::from_pixel(400, 200, Rgb([30, 200, 30])));
        let result = TerrainClassifier::new(cfg).classify(&big);
        assert_eq!(result.image.width(), 100);
        assert_eq!(result.image.height(), 50);
    }

    #[test]
    fn config_round_trips_through_json() {
        let cfg = ClassifierConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let parsed: ClassifierConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.flood.lo, cfg.flood.lo);
        assert_eq!(parsed.max_dimension, cfg.max_dimension);
    }
}
