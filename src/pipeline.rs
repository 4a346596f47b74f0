use anyhow::Result;
use image::DynamicImage;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

/// Rectangular region in the source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Typed metadata attached to an image as it moves through a pipeline.
#[derive(Debug, Clone)]
pub enum MetaValue {
    Bool(bool),
    Float(f32),
    Int(i32),
    String(String),
}

/// An image flowing through a pipeline. Stages may narrow it to a region of
/// the source; the untouched source stays reachable through `source`.
#[derive(Clone)]
pub struct StageImage {
    pub image: DynamicImage,
    pub source: Arc<DynamicImage>,
    pub region: Option<Region>,
    pub meta: HashMap<String, MetaValue>,
}

impl StageImage {
    pub fn from_image(image: DynamicImage) -> Self {
        let source = Arc::new(image.clone());
        Self {
            image,
            source,
            region: None,
            meta: HashMap::new(),
        }
    }

    pub fn from_region(image: DynamicImage, source: Arc<DynamicImage>, region: Region) -> Self {
        Self {
            image,
            source,
            region: Some(region),
            meta: HashMap::new(),
        }
    }

    /// Replace the working image, keeping source, region and metadata.
    pub fn with_image(&self, image: DynamicImage) -> Self {
        let mut out = self.clone();
        out.image = image;
        out
    }

    pub fn set(&mut self, key: impl Into<String>, value: MetaValue) {
        self.meta.insert(key.into(), value);
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.meta.get(key) {
            Some(MetaValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_float(&self, key: &str) -> Option<f32> {
        match self.meta.get(key) {
            Some(MetaValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i32> {
        match self.meta.get(key) {
            Some(MetaValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.meta.get(key) {
            Some(MetaValue::String(v)) => Some(v.as_str()),
            _ => None,
        }
    }
}

/// Where per-stage snapshots are written when snapshot mode is on.
#[derive(Clone, Debug)]
pub struct SnapshotConfig {
    pub output_dir: PathBuf,
}

/// Context shared by all stages of a run.
#[derive(Clone)]
pub struct StageContext {
    pub verbose: bool,
    pub snapshots: Option<SnapshotConfig>,
}

/// A pipeline stage. Stages may transform images (n -> n), split one image
/// into many candidate regions (1 -> many), or filter candidates out
/// (many -> fewer).
pub trait Stage: Send + Sync {
    fn apply(&self, images: Vec<StageImage>, ctx: &StageContext) -> Result<Vec<StageImage>>;

    fn name(&self) -> &str;
}

/// Queue entry: one image plus the stages it still has to pass through.
/// The lineage records which output of each stage produced this item, so
/// snapshots of diverging work get distinct names (`01-02.png`).
struct WorkItem {
    image: StageImage,
    next_stage: usize,
    lineage: Vec<usize>,
}

impl WorkItem {
    fn lineage_name(&self) -> String {
        if self.lineage.is_empty() {
            "01".to_string()
        } else {
            self.lineage
                .iter()
                .map(|id| format!("{id:02}"))
                .collect::<Vec<_>>()
                .join("-")
        }
    }
}

/// Composable image pipeline with optional per-stage snapshots on disk.
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    ctx: StageContext,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            ctx: StageContext {
                verbose: false,
                snapshots: None,
            },
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.ctx.verbose = verbose;
        self
    }

    /// Enable snapshot mode. The directory must be empty or absent.
    pub fn with_snapshots(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                anyhow::bail!("snapshot directory is not empty: {}", output_dir.display());
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }
        self.ctx.snapshots = Some(SnapshotConfig { output_dir });
        Ok(self)
    }

    pub fn add_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn add_stage_boxed(self, stage: Box<dyn Stage>) -> Self {
        self.add_stage(Arc::from(stage))
    }

    fn snapshot(&self, stage_idx: usize, stage_name: &str, images: &[StageImage]) -> Result<()> {
        let Some(cfg) = &self.ctx.snapshots else {
            return Ok(());
        };
        let dir_name = format!(
            "{:02}_{}",
            stage_idx + 1,
            stage_name.to_lowercase().replace(' ', "_")
        );
        let stage_dir = cfg.output_dir.join(&dir_name);
        std::fs::create_dir_all(&stage_dir)?;
        for (idx, item) in images.iter().enumerate() {
            let path = stage_dir.join(format!("{:02}.png", idx + 1));
            item.image
                .save(&path)
                .map_err(|e| anyhow::anyhow!("failed to save snapshot {}: {}", path.display(), e))?;
        }
        if self.ctx.verbose {
            log::debug!("saved {} snapshot(s) to {}", images.len(), dir_name);
        }
        Ok(())
    }

    /// Run every stage in order over the whole batch.
    pub fn run(&self, input: DynamicImage) -> Result<Vec<StageImage>> {
        let mut images = vec![StageImage::from_image(input)];
        self.snapshot_input(&images)?;

        for (idx, stage) in self.stages.iter().enumerate() {
            if self.ctx.verbose {
                log::info!("stage {}: {} ({} item(s))", idx + 1, stage.name(), images.len());
            }
            images = stage.apply(images, &self.ctx)?;
            self.snapshot(idx, stage.name(), &images)?;
        }
        Ok(images)
    }

    /// Run with a work queue so each image advances independently. Splitting
    /// stages enqueue every produced candidate; completed items drain to the
    /// result set.
    pub fn run_queued(&self, input: DynamicImage) -> Result<Vec<StageImage>> {
        let initial = vec![StageImage::from_image(input)];
        self.snapshot_input(&initial)?;

        let mut queue: VecDeque<WorkItem> = initial
            .into_iter()
            .map(|image| WorkItem {
                image,
                next_stage: 0,
                lineage: Vec::new(),
            })
            .collect();
        let mut done = Vec::new();

        while let Some(item) = queue.pop_front() {
            if item.next_stage >= self.stages.len() {
                done.push(item.image);
                continue;
            }
            let stage = &self.stages[item.next_stage];
            let produced = stage.apply(vec![item.image.clone()], &self.ctx)?;
            for (idx, image) in produced.into_iter().enumerate() {
                let mut lineage = item.lineage.clone();
                lineage.push(idx + 1);
                let next = WorkItem {
                    image,
                    next_stage: item.next_stage + 1,
                    lineage,
                };
                self.snapshot_item(item.next_stage, stage.name(), &next)?;
                queue.push_back(next);
            }
        }
        Ok(done)
    }

    fn snapshot_item(&self, stage_idx: usize, stage_name: &str, item: &WorkItem) -> Result<()> {
        let Some(cfg) = &self.ctx.snapshots else {
            return Ok(());
        };
        let dir_name = format!(
            "{:02}_{}",
            stage_idx + 1,
            stage_name.to_lowercase().replace(' ', "_")
        );
        let stage_dir = cfg.output_dir.join(&dir_name);
        std::fs::create_dir_all(&stage_dir)?;
        let path = stage_dir.join(format!("{}.png", item.lineage_name()));
        item.image
            .image
            .save(&path)
            .map_err(|e| anyhow::anyhow!("failed to save snapshot {}: {}", path.display(), e))?;
        Ok(())
    }

    fn snapshot_input(&self, images: &[StageImage]) -> Result<()> {
        let Some(cfg) = &self.ctx.snapshots else {
            return Ok(());
        };
        let dir = cfg.output_dir.join("00_input");
        std::fs::create_dir_all(&dir)?;
        for (idx, item) in images.iter().enumerate() {
            let path = dir.join(format!("{:02}.png", idx + 1));
            item.image
                .save(&path)
                .map_err(|e| anyhow::anyhow!("failed to save snapshot {}: {}", path.display(), e))?;
        }
        Ok(())
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma};

    struct Invert;

    impl Stage for Invert {
        fn apply(&self, images: Vec<StageImage>, _ctx: &StageContext) -> Result<Vec<StageImage>> {
            Ok(images
                .into_iter()
                .map(|item| {
                    let mut gray = item.image.to_luma8();
                    for p in gray.pixels_mut() {
                        p.0[0] = 255 - p.0[0];
                    }
                    item.with_image(DynamicImage::ImageLuma8(gray))
                })
                .collect())
        }

        fn name(&self) -> &str {
            "Invert"
        }
    }

    struct SplitHalves;

    impl Stage for SplitHalves {
        fn apply(&self, images: Vec<StageImage>, _ctx: &StageContext) -> Result<Vec<StageImage>> {
            let mut out = Vec::new();
            for item in images {
                let w = item.image.width() / 2;
                let h = item.image.height();
                for i in 0..2u32 {
                    let region = Region {
                        x: i * w,
                        y: 0,
                        width: w,
                        height: h,
                    };
                    let crop = item.image.crop_imm(region.x, region.y, region.width, region.height);
                    out.push(StageImage::from_region(crop, item.source.clone(), region));
                }
            }
            Ok(out)
        }

        fn name(&self) -> &str {
            "Split Halves"
        }
    }

    fn gray(w: u32, h: u32, v: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(w, h, Luma([v])))
    }

    #[test]
    fn run_applies_stages_in_order() -> Result<()> {
        let result = Pipeline::new().add_stage(Arc::new(Invert)).run(gray(4, 4, 10))?;
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].image.to_luma8().get_pixel(0, 0).0[0], 245);
        Ok(())
    }

    #[test]
    fn queued_run_handles_splits() -> Result<()> {
        let result = Pipeline::new()
            .add_stage(Arc::new(SplitHalves))
            .add_stage(Arc::new(Invert))
            .run_queued(gray(8, 4, 0))?;
        assert_eq!(result.len(), 2);
        for item in &result {
            assert_eq!(item.image.width(), 4);
            assert_eq!(item.image.to_luma8().get_pixel(0, 0).0[0], 255);
            assert!(item.region.is_some());
        }
        Ok(())
    }

    #[test]
    fn metadata_round_trip() {
        let mut item = StageImage::from_image(gray(2, 2, 0));
        item.set("radius", MetaValue::Float(12.5));
        item.set("kept", MetaValue::Bool(true));
        assert_eq!(item.get_float("radius"), Some(12.5));
        assert_eq!(item.get_bool("kept"), Some(true));
        assert_eq!(item.get_float("missing"), None);
    }
}
