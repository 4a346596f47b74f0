use crate::detect::blobs;
use crate::pipeline::Region;
use crate::terrain::class::HsvRange;
use crate::terrain::hsv::HsvPixels;
use crate::terrain::masks;
use anyhow::Result;
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// One detected object in a frame.
#[derive(Debug, Clone)]
pub struct Detection {
    pub class: String,
    pub region: Region,
}

/// The seam between frame iteration and whatever finds objects in a frame.
/// An external model would implement this; the built-in implementation
/// detects colored blobs.
pub trait Detector {
    fn classes(&self) -> Vec<String>;

    fn detect(&self, frame: &RgbImage) -> Result<Vec<Detection>>;
}

/// A tracked object class: a name plus the HSV window its pixels fall in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountClass {
    pub name: String,
    pub range: HsvRange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CountConfig {
    pub classes: Vec<CountClass>,
    /// Components smaller than this many pixels are noise.
    pub min_area: u32,
}

impl Default for CountConfig {
    fn default() -> Self {
        Self {
            classes: vec![
                CountClass {
                    name: "red".to_string(),
                    range: HsvRange::new([0, 120, 80], [8, 255, 255]),
                },
                CountClass {
                    name: "green".to_string(),
                    range: HsvRange::new([50, 120, 80], [70, 255, 255]),
                },
                CountClass {
                    name: "blue".to_string(),
                    range: HsvRange::new([110, 120, 80], [130, 255, 255]),
                },
            ],
            min_area: 25,
        }
    }
}

/// Finds connected same-color regions per class.
pub struct ColorBlobDetector {
    config: CountConfig,
}

impl ColorBlobDetector {
    pub fn new(config: CountConfig) -> Self {
        Self { config }
    }
}

impl Detector for ColorBlobDetector {
    fn classes(&self) -> Vec<String> {
        self.config.classes.iter().map(|c| c.name.clone()).collect()
    }

    fn detect(&self, frame: &RgbImage) -> Result<Vec<Detection>> {
        let hsv = HsvPixels::from_rgb(frame);
        let mut detections = Vec::new();
        for class in &self.config.classes {
            let mask = masks::in_range(&hsv, &class.range);
            for blob in blobs::find_blobs(&mask, self.config.min_area) {
                detections.push(Detection {
                    class: class.name.clone(),
                    region: blob.region(),
                });
            }
        }
        Ok(detections)
    }
}
