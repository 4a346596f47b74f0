pub mod volume;

pub use volume::{Volume, VolumeFormat, is_nifti_path};

use crate::output;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const DEFAULT_BINARIZE_LEVEL: f32 = 0.5;

#[derive(Debug)]
pub struct MorphOutcome {
    pub output_dir: PathBuf,
    pub stage_files: Vec<PathBuf>,
}

/// The staged pipeline: binarize, erode the binary volume, then keep the
/// boundary of what is left. Each stage result is written to a fresh
/// timestamped directory next to the input, in the input's format.
pub fn morph_file(path: &Path, level: f32) -> Result<MorphOutcome> {
    let vol = Volume::load(path)?;

    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    let output_dir = parent
        .unwrap_or(Path::new("."))
        .join(format!("morph_{}", output::timestamp()));
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("could not create {}", output_dir.display()))?;

    let mut stage_files = Vec::new();
    let mut current = vol;

    let stages: [(&str, fn(&Volume, f32) -> Volume); 3] = [
        ("binarized", |v, level| v.binarize(level)),
        ("eroded", |v, _| v.erode()),
        ("edges", |v, _| v.edges()),
    ];

    for (idx, (name, op)) in stages.iter().enumerate() {
        current = op(&current, level);
        let file = output_dir.join(format!("stage_{}_{}.{}", idx + 1, name, current.extension()));
        current.save(&file)?;
        log::info!(
            "stage {} ({}): {} foreground voxel(s) -> {}",
            idx + 1,
            name,
            current.count_nonzero(),
            file.display()
        );
        stage_files.push(file);
    }

    Ok(MorphOutcome {
        output_dir,
        stage_files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn staged_run_writes_three_pngs() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let input = dir.path().join("square.png");
        let mut img = GrayImage::new(16, 16);
        for y in 4..12 {
            for x in 4..12 {
                img.put_pixel(x, y, Luma([220]));
            }
        }
        img.save(&input)?;

        let outcome = morph_file(&input, DEFAULT_BINARIZE_LEVEL)?;
        assert_eq!(outcome.stage_files.len(), 3);
        for file in &outcome.stage_files {
            assert!(file.exists(), "{} missing", file.display());
            assert_eq!(file.extension().and_then(|e| e.to_str()), Some("png"));
        }

        // The eroded square shrinks by one pixel per side, the edge pass
        // keeps only its one pixel wide shell.
        let eroded = image::open(&outcome.stage_files[1])?.to_luma8();
        let count = eroded.pixels().filter(|p| p.0[0] > 0).count();
        assert_eq!(count, 36);
        let edges = image::open(&outcome.stage_files[2])?.to_luma8();
        let count = edges.pixels().filter(|p| p.0[0] > 0).count();
        assert_eq!(count, 36 - 16);
        Ok(())
    }

    #[test]
    fn missing_input_is_an_error() {
        let err = morph_file(Path::new("/nonexistent/scan.nii.gz"), 0.5).unwrap_err();
        assert!(err.to_string().contains("file not found"));
    }
}
