use crate::detect::{blobs, prep};
use crate::models::Blob;
use crate::output;
use anyhow::Result;
use image::{DynamicImage, GrayImage, Luma, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;
use std::path::{Path, PathBuf};

/// Detection parameters for eye photographs. The radius window assumes the
/// iris fills a reasonable share of the frame.
#[derive(Debug, Clone)]
pub struct IrisDetector {
    pub min_radius: f32,
    pub max_radius: f32,
    pub max_circularity: f32,
    pub median_radius: u32,
    pub canny_low: f32,
    pub canny_high: f32,
    pub min_area: u32,
}

impl Default for IrisDetector {
    fn default() -> Self {
        Self {
            min_radius: 30.0,
            max_radius: 100.0,
            max_circularity: 2.0,
            median_radius: 2,
            canny_low: 50.0,
            canny_high: 100.0,
            min_area: 10,
        }
    }
}

pub struct IrisDetection {
    pub center: (u32, u32),
    pub radius: f32,
    /// The iris cut out on black, cropped to its bounding square.
    pub image: RgbImage,
}

impl IrisDetector {
    /// Find the most iris-like circle: denoise, edge-detect, collect
    /// components, keep the round ones inside the radius window, take the
    /// largest. Returns `None` when nothing qualifies.
    pub fn detect(&self, img: &DynamicImage) -> Option<IrisDetection> {
        let gray = prep::to_grayscale(img);
        let smoothed = prep::median_blur(&gray, self.median_radius);
        let edges = prep::edges(&smoothed, self.canny_low, self.canny_high);

        let candidates: Vec<Blob> = blobs::find_blobs(&edges, self.min_area)
            .into_iter()
            .filter(|b| {
                b.is_round(self.max_circularity) && b.radius_in(self.min_radius, self.max_radius)
            })
            .collect();
        log::debug!("{} circular candidate(s)", candidates.len());

        let best = candidates
            .into_iter()
            .max_by(|a, b| a.radius().partial_cmp(&b.radius()).unwrap())?;

        let (cx, cy) = best.center();
        let radius = best.radius();
        Some(IrisDetection {
            center: (cx, cy),
            radius,
            image: extract_disc(&img.to_rgb8(), cx, cy, radius),
        })
    }
}

/// Keep only the disc around (cx, cy) and crop to its bounding square,
/// clamped to the image bounds.
fn extract_disc(rgb: &RgbImage, cx: u32, cy: u32, radius: f32) -> RgbImage {
    let (w, h) = rgb.dimensions();
    let r = radius.round() as u32;

    let mut mask = GrayImage::new(w, h);
    draw_filled_circle_mut(&mut mask, (cx as i32, cy as i32), r as i32, Luma([255]));

    let mut isolated = RgbImage::new(w, h);
    for ((src, m), dst) in rgb.pixels().zip(mask.pixels()).zip(isolated.pixels_mut()) {
        if m.0[0] > 0 {
            *dst = *src;
        }
    }

    let x1 = cx.saturating_sub(r);
    let y1 = cy.saturating_sub(r);
    let x2 = (cx + r).min(w);
    let y2 = (cy + r).min(h);
    image::imageops::crop_imm(&isolated, x1, y1, x2 - x1, y2 - y1).to_image()
}

/// CLI entry: detect the iris in a photo and write the cropped disc next to
/// the input. Reports an error when no circle qualifies.
pub fn iris_file(path: &Path, detector: &IrisDetector) -> Result<PathBuf> {
    let img = output::load_image(path)?;
    let detection = detector
        .detect(&img)
        .ok_or_else(|| anyhow::anyhow!("no iris-like circle detected in {}", path.display()))?;

    println!(
        "iris at ({}, {}), radius {:.0}px",
        detection.center.0, detection.center.1, detection.radius
    );
    let out = output::sibling(path, "iris", "png");
    output::save_image_with_fallback(&DynamicImage::ImageRgb8(detection.image), &out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn eye_photo() -> DynamicImage {
        let mut img = RgbImage::from_pixel(200, 200, Rgb([30, 25, 20]));
        let mut disc = GrayImage::new(200, 200);
        draw_filled_circle_mut(&mut disc, (100, 100), 40, Luma([255]));
        for (src, m) in img.pixels_mut().zip(disc.pixels()) {
            if m.0[0] > 0 {
                *src = Rgb([90, 140, 190]);
            }
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn finds_the_synthetic_iris() {
        let detection = IrisDetector::default().detect(&eye_photo()).expect("detection");
        let (cx, cy) = detection.center;
        assert!(cx.abs_diff(100) <= 3, "cx = {cx}");
        assert!(cy.abs_diff(100) <= 3, "cy = {cy}");
        assert!((detection.radius - 40.0).abs() <= 4.0, "r = {}", detection.radius);
        // Crop is roughly the bounding square of the disc.
        assert!(detection.image.width() >= 72 && detection.image.width() <= 90);
    }

    #[test]
    fn crop_blacks_out_the_corners() {
        let detection = IrisDetector::default().detect(&eye_photo()).expect("detection");
        assert_eq!(detection.image.get_pixel(0, 0).0, [0, 0, 0]);
        let mid = detection.image.width() / 2;
        assert_eq!(detection.image.get_pixel(mid, mid).0, [90, 140, 190]);
    }

    #[test]
    fn featureless_image_yields_none() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(120, 120, Rgb([10, 10, 10])));
        assert!(IrisDetector::default().detect(&img).is_none());
    }
}
