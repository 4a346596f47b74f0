use crate::output;
use crate::pipeline::{MetaValue, Pipeline, Stage, StageContext, StageImage};
use anyhow::Result;
use image::{DynamicImage, GrayImage, RgbImage};
use imageproc::contrast::{ThresholdType, adaptive_threshold, equalize_histogram, otsu_level, threshold};
use imageproc::distance_transform::Norm;
use imageproc::filter::{box_filter, median_filter};
use imageproc::morphology::open;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Single-step transforms exposed by `prep`. Several can be chained; each
/// runs as one pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PrepOp {
    /// Grayscale conversion.
    Gray,
    /// Split into R/G/B single-channel images.
    Channels,
    /// Box blur.
    Blur,
    /// Median blur.
    Median,
    /// Binary threshold (fixed, Otsu, or pixel-mean level).
    Threshold,
    /// Mean adaptive threshold.
    AdaptiveThreshold,
    /// Histogram equalization.
    Equalize,
    /// Morphological opening, removes small bright specks.
    Open,
}

#[derive(Debug, Clone, Copy)]
pub enum ThresholdLevel {
    Fixed(u8),
    Otsu,
    /// Mean of all pixel values.
    Auto,
}

#[derive(Debug, Clone)]
pub struct PrepOptions {
    pub level: ThresholdLevel,
    pub radius: u32,
    pub block_radius: u32,
    pub open_k: u8,
}

impl Default for PrepOptions {
    fn default() -> Self {
        Self {
            level: ThresholdLevel::Fixed(127),
            radius: 2,
            block_radius: 5,
            open_k: 1,
        }
    }
}

struct GrayStage;

impl Stage for GrayStage {
    fn apply(&self, images: Vec<StageImage>, _ctx: &StageContext) -> Result<Vec<StageImage>> {
        Ok(images
            .into_iter()
            .map(|item| {
                let gray = item.image.to_luma8();
                item.with_image(DynamicImage::ImageLuma8(gray))
            })
            .collect())
    }

    fn name(&self) -> &str {
        "Grayscale"
    }
}

/// Splits one color image into three, each keeping a single channel.
struct ChannelSplitStage;

impl Stage for ChannelSplitStage {
    fn apply(&self, images: Vec<StageImage>, _ctx: &StageContext) -> Result<Vec<StageImage>> {
        let mut out = Vec::new();
        for item in images {
            let rgb = item.image.to_rgb8();
            for (idx, name) in ["r", "g", "b"].iter().enumerate() {
                let mut channel = RgbImage::new(rgb.width(), rgb.height());
                for (src, dst) in rgb.pixels().zip(channel.pixels_mut()) {
                    dst.0[idx] = src.0[idx];
                }
                let mut split = item.with_image(DynamicImage::ImageRgb8(channel));
                split.set("channel", MetaValue::String((*name).to_string()));
                out.push(split);
            }
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        "Channel Split"
    }
}

struct BoxBlurStage {
    radius: u32,
}

impl Stage for BoxBlurStage {
    fn apply(&self, images: Vec<StageImage>, _ctx: &StageContext) -> Result<Vec<StageImage>> {
        Ok(images
            .into_iter()
            .map(|item| {
                let blurred = box_filter(&item.image.to_luma8(), self.radius, self.radius);
                item.with_image(DynamicImage::ImageLuma8(blurred))
            })
            .collect())
    }

    fn name(&self) -> &str {
        "Box Blur"
    }
}

struct MedianStage {
    radius: u32,
}

impl Stage for MedianStage {
    fn apply(&self, images: Vec<StageImage>, _ctx: &StageContext) -> Result<Vec<StageImage>> {
        Ok(images
            .into_iter()
            .map(|item| {
                let filtered = median_filter(&item.image.to_luma8(), self.radius, self.radius);
                item.with_image(DynamicImage::ImageLuma8(filtered))
            })
            .collect())
    }

    fn name(&self) -> &str {
        "Median Blur"
    }
}

struct ThresholdStage {
    level: ThresholdLevel,
}

impl Stage for ThresholdStage {
    fn apply(&self, images: Vec<StageImage>, ctx: &StageContext) -> Result<Vec<StageImage>> {
        Ok(images
            .into_iter()
            .map(|item| {
                let gray = item.image.to_luma8();
                let level = match self.level {
                    ThresholdLevel::Fixed(v) => v,
                    ThresholdLevel::Otsu => otsu_level(&gray),
                    ThresholdLevel::Auto => mean_level(&gray),
                };
                if ctx.verbose {
                    log::info!("threshold level {}", level);
                }
                let binary = threshold(&gray, level, ThresholdType::Binary);
                let mut out = item.with_image(DynamicImage::ImageLuma8(binary));
                out.set("threshold_level", MetaValue::Int(level as i32));
                out
            })
            .collect())
    }

    fn name(&self) -> &str {
        "Threshold"
    }
}

struct AdaptiveThresholdStage {
    block_radius: u32,
}

impl Stage for AdaptiveThresholdStage {
    fn apply(&self, images: Vec<StageImage>, _ctx: &StageContext) -> Result<Vec<StageImage>> {
        Ok(images
            .into_iter()
            .map(|item| {
                let binary = adaptive_threshold(&item.image.to_luma8(), self.block_radius);
                item.with_image(DynamicImage::ImageLuma8(binary))
            })
            .collect())
    }

    fn name(&self) -> &str {
        "Adaptive Threshold"
    }
}

struct EqualizeStage;

impl Stage for EqualizeStage {
    fn apply(&self, images: Vec<StageImage>, _ctx: &StageContext) -> Result<Vec<StageImage>> {
        Ok(images
            .into_iter()
            .map(|item| {
                let equalized = equalize_histogram(&item.image.to_luma8());
                item.with_image(DynamicImage::ImageLuma8(equalized))
            })
            .collect())
    }

    fn name(&self) -> &str {
        "Equalize"
    }
}

struct OpenStage {
    k: u8,
}

impl Stage for OpenStage {
    fn apply(&self, images: Vec<StageImage>, _ctx: &StageContext) -> Result<Vec<StageImage>> {
        Ok(images
            .into_iter()
            .map(|item| {
                let opened = open(&item.image.to_luma8(), Norm::LInf, self.k);
                item.with_image(DynamicImage::ImageLuma8(opened))
            })
            .collect())
    }

    fn name(&self) -> &str {
        "Opening"
    }
}

/// Mean pixel value, the automatic threshold level.
pub fn mean_level(gray: &GrayImage) -> u8 {
    let total: u64 = gray.pixels().map(|p| p.0[0] as u64).sum();
    let n = (gray.width() as u64 * gray.height() as u64).max(1);
    (total / n) as u8
}

fn build_stage(op: PrepOp, opts: &PrepOptions) -> Arc<dyn Stage> {
    match op {
        PrepOp::Gray => Arc::new(GrayStage),
        PrepOp::Channels => Arc::new(ChannelSplitStage),
        PrepOp::Blur => Arc::new(BoxBlurStage { radius: opts.radius }),
        PrepOp::Median => Arc::new(MedianStage { radius: opts.radius }),
        PrepOp::Threshold => Arc::new(ThresholdStage { level: opts.level }),
        PrepOp::AdaptiveThreshold => Arc::new(AdaptiveThresholdStage {
            block_radius: opts.block_radius,
        }),
        PrepOp::Equalize => Arc::new(EqualizeStage),
        PrepOp::Open => Arc::new(OpenStage { k: opts.open_k }),
    }
}

/// Apply the requested ops in order and write the result(s) next to the
/// input. Channel splitting produces one file per channel.
pub fn prep_file(
    path: &Path,
    ops: &[PrepOp],
    opts: &PrepOptions,
    snapshots: Option<PathBuf>,
    verbose: bool,
) -> Result<Vec<PathBuf>> {
    if ops.is_empty() {
        anyhow::bail!("no operation given");
    }
    let img = output::load_image(path)?;

    let mut pipeline = Pipeline::new().with_verbose(verbose);
    if let Some(dir) = snapshots {
        pipeline = pipeline.with_snapshots(dir)?;
    }
    for &op in ops {
        pipeline = pipeline.add_stage(build_stage(op, opts));
    }
    let results = pipeline.run_queued(img)?;

    let mut written = Vec::new();
    for item in &results {
        let out_path = match item.get_str("channel") {
            Some(ch) => output::sibling(path, &format!("prep_{ch}"), "png"),
            None => output::sibling(path, "prep", "png"),
        };
        item.image
            .save(&out_path)
            .map_err(|e| anyhow::anyhow!("failed to save {}: {}", out_path.display(), e))?;
        written.push(out_path);
    }
    Ok(written)
}

/// 256-bin luma histogram as a text table, one `bin count` line per row.
pub fn histogram_table(gray: &GrayImage) -> String {
    let mut bins = [0u64; 256];
    for p in gray.pixels() {
        bins[p.0[0] as usize] += 1;
    }
    let mut out = String::with_capacity(256 * 8);
    for (i, count) in bins.iter().enumerate() {
        out.push_str(&format!("{i} {count}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    fn gradient() -> DynamicImage {
        let mut img = GrayImage::new(16, 1);
        for x in 0..16 {
            img.put_pixel(x, 0, Luma([(x * 16) as u8]));
        }
        DynamicImage::ImageLuma8(img)
    }

    #[test]
    fn mean_level_of_gradient() {
        let gray = gradient().to_luma8();
        // Mean of 0,16,...,240 is 120.
        assert_eq!(mean_level(&gray), 120);
    }

    #[test]
    fn threshold_stage_uses_auto_level() -> Result<()> {
        let stage = ThresholdStage {
            level: ThresholdLevel::Auto,
        };
        let ctx = StageContext {
            verbose: false,
            snapshots: None,
        };
        let out = stage.apply(vec![StageImage::from_image(gradient())], &ctx)?;
        assert_eq!(out[0].get_int("threshold_level"), Some(120));
        let binary = out[0].image.to_luma8();
        assert_eq!(binary.get_pixel(0, 0).0[0], 0);
        assert_eq!(binary.get_pixel(15, 0).0[0], 255);
        Ok(())
    }

    #[test]
    fn channel_split_produces_three_images() -> Result<()> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([10, 20, 30])));
        let ctx = StageContext {
            verbose: false,
            snapshots: None,
        };
        let out = ChannelSplitStage.apply(vec![StageImage::from_image(img)], &ctx)?;
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].get_str("channel"), Some("r"));
        assert_eq!(out[0].image.to_rgb8().get_pixel(0, 0).0, [10, 0, 0]);
        assert_eq!(out[2].image.to_rgb8().get_pixel(0, 0).0, [0, 0, 30]);
        Ok(())
    }

    #[test]
    fn histogram_counts_every_pixel() {
        let gray = GrayImage::from_pixel(8, 8, Luma([42]));
        let table = histogram_table(&gray);
        assert!(table.contains("42 64\n"));
        assert!(table.contains("0 0\n"));
    }
}
