use super::ClassifierConfig;
use super::class::TerrainClass;
use super::masks::count_nonzero;
use image::GrayImage;

/// Detected coverage for one class.
#[derive(Debug, Clone)]
pub struct ClassStat {
    pub class: TerrainClass,
    pub pixels: u64,
    pub percentage: f64,
}

/// Per-class pixel counts and percentages of the full frame. With disjoint
/// masks the percentages sum to at most 100.
pub fn class_stats(masks: &[(TerrainClass, GrayImage)], width: u32, height: u32) -> Vec<ClassStat> {
    let total = (width as u64 * height as u64).max(1);
    masks
        .iter()
        .map(|(class, mask)| {
            let pixels = count_nonzero(mask);
            ClassStat {
                class: *class,
                pixels,
                percentage: pixels as f64 / total as f64 * 100.0,
            }
        })
        .collect()
}

pub fn percentage_of(stats: &[ClassStat], class: TerrainClass) -> f64 {
    stats
        .iter()
        .find(|s| s.class == class)
        .map(|s| s.percentage)
        .unwrap_or(0.0)
}

/// Warnings raised when risk coverage crosses the configured thresholds.
pub fn alerts(stats: &[ClassStat], cfg: &ClassifierConfig) -> Vec<String> {
    let mut out = Vec::new();
    if percentage_of(stats, TerrainClass::Flood) > cfg.flood_alert_pct {
        out.push("ALERT: flooded areas detected".to_string());
    }
    if percentage_of(stats, TerrainClass::BareSoil) > cfg.bare_soil_alert_pct {
        out.push("ALERT: extensive bare soil, erosion risk".to_string());
    }
    out
}
