use crate::output;
use anyhow::{Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};

/// An ordered sequence of frames on disk. Frames are the supported image
/// files directly inside the directory, in name order.
pub struct FrameSource {
    frames: Vec<PathBuf>,
}

impl FrameSource {
    pub fn open(dir: &Path) -> Result<Self> {
        let frames = output::list_images(dir)?;
        if frames.is_empty() {
            anyhow::bail!("no frames found in {}", dir.display());
        }
        Ok(Self { frames })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.frames.iter()
    }
}

/// Collects annotated frames and per-frame counts; `finalize` writes the
/// counts table. Call it on every exit path once frames were recorded.
pub struct CountWriter {
    output_dir: PathBuf,
    classes: Vec<String>,
    rows: Vec<(String, Vec<u64>)>,
    finalized: bool,
}

impl CountWriter {
    pub fn create(output_dir: PathBuf, classes: Vec<String>) -> Result<Self> {
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("could not create {}", output_dir.display()))?;
        Ok(Self {
            output_dir,
            classes,
            rows: Vec::new(),
            finalized: false,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn write_frame(&mut self, name: &str, frame: &RgbImage, counts: Vec<u64>) -> Result<()> {
        debug_assert_eq!(counts.len(), self.classes.len());
        let path = self.output_dir.join(name).with_extension("png");
        frame
            .save(&path)
            .with_context(|| format!("failed to save {}", path.display()))?;
        self.rows.push((name.to_string(), counts));
        Ok(())
    }

    /// Per-class totals over all recorded frames.
    pub fn totals(&self) -> Vec<(String, u64)> {
        let mut totals = vec![0u64; self.classes.len()];
        for (_, counts) in &self.rows {
            for (t, c) in totals.iter_mut().zip(counts.iter()) {
                *t += c;
            }
        }
        self.classes.iter().cloned().zip(totals).collect()
    }

    /// Write `counts_per_frame.csv` into the output directory.
    pub fn finalize(mut self) -> Result<PathBuf> {
        let path = self.output_dir.join("counts_per_frame.csv");
        let mut csv = String::new();
        csv.push_str("frame");
        for class in &self.classes {
            csv.push(',');
            csv.push_str(class);
        }
        csv.push('\n');
        for (name, counts) in &self.rows {
            csv.push_str(name);
            for count in counts {
                csv.push(',');
                csv.push_str(&count.to_string());
            }
            csv.push('\n');
        }
        std::fs::write(&path, csv)
            .with_context(|| format!("failed to write {}", path.display()))?;
        self.finalized = true;
        Ok(path)
    }
}

impl Drop for CountWriter {
    fn drop(&mut self) {
        if !self.finalized && !self.rows.is_empty() {
            log::warn!("count writer dropped without finalizing the counts table");
        }
    }
}
