use crate::output;
use anyhow::Result;
use image::{DynamicImage, GrayImage, Luma, RgbImage, imageops::FilterType};
use imageproc::contrast::{ThresholdType, threshold};
use std::path::{Path, PathBuf};

pub const DEFAULT_DIFF_THRESHOLD: u8 = 50;

pub struct DiffResult {
    /// Per-channel absolute difference.
    pub difference: RgbImage,
    /// Binary change mask.
    pub mask: GrayImage,
    /// Share of changed pixels, in percent.
    pub changed_pct: f64,
}

/// Before/after change detection: absolute per-channel difference, collapse
/// to luma, fixed binary threshold. `after` is resized to match `before`
/// when the dimensions differ.
pub fn diff_images(before: &RgbImage, after: &RgbImage, level: u8) -> DiffResult {
    let after = if after.dimensions() != before.dimensions() {
        log::info!(
            "resizing second image {}x{} to {}x{}",
            after.width(),
            after.height(),
            before.width(),
            before.height()
        );
        image::imageops::resize(after, before.width(), before.height(), FilterType::Triangle)
    } else {
        after.clone()
    };

    let mut difference = RgbImage::new(before.width(), before.height());
    for ((pa, pb), out) in before.pixels().zip(after.pixels()).zip(difference.pixels_mut()) {
        for c in 0..3 {
            out.0[c] = pa.0[c].abs_diff(pb.0[c]);
        }
    }

    let mut gray = GrayImage::new(before.width(), before.height());
    for (src, dst) in difference.pixels().zip(gray.pixels_mut()) {
        // Rec. 601 luma weights.
        let l = 0.299 * src.0[0] as f32 + 0.587 * src.0[1] as f32 + 0.114 * src.0[2] as f32;
        *dst = Luma([l.round() as u8]);
    }

    let mask = threshold(&gray, level, ThresholdType::Binary);
    let changed = mask.pixels().filter(|p| p.0[0] > 0).count() as f64;
    let total = (before.width() as f64 * before.height() as f64).max(1.0);

    DiffResult {
        difference,
        mask,
        changed_pct: changed / total * 100.0,
    }
}

/// CLI entry: compare two files and write the difference image and change
/// mask next to the first one.
pub fn diff_files(before: &Path, after: &Path, level: u8) -> Result<(PathBuf, PathBuf, f64)> {
    let img_before = output::load_image(before)?.to_rgb8();
    let img_after = output::load_image(after)?.to_rgb8();

    let result = diff_images(&img_before, &img_after, level);

    let diff_path = output::sibling(before, "diff", "png");
    let diff_path =
        output::save_image_with_fallback(&DynamicImage::ImageRgb8(result.difference), &diff_path)?;
    let mask_path = output::sibling(before, "diff_mask", "png");
    let mask_path =
        output::save_image_with_fallback(&DynamicImage::ImageLuma8(result.mask), &mask_path)?;

    Ok((diff_path, mask_path, result.changed_pct))
}
