use anyhow::{Context, Result};
use image::{GrayImage, Luma};
use ndarray::{Array3, Ix3};
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};
use nifti::writer::WriterOptions;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeFormat {
    Png,
    Nifti,
}

/// A 2D image or 3D scan normalized to [0, 1]. 2D inputs get a singleton
/// third axis so every operation runs on one code path; the structuring
/// element stays two dimensional for them.
#[derive(Clone)]
pub struct Volume {
    data: Array3<f32>,
    is_3d: bool,
    format: VolumeFormat,
}

pub fn is_nifti_path(path: &Path) -> bool {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_lowercase();
    name.ends_with(".nii") || name.ends_with(".nii.gz")
}

impl Volume {
    pub fn from_array(data: Array3<f32>, is_3d: bool, format: VolumeFormat) -> Self {
        Self { data, is_3d, format }
    }

    /// Load a grayscale image or NIfTI scan and normalize intensities to
    /// [0, 1] with `(x - min) / (max - min + 1e-8)`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("file not found: {}", path.display());
        }
        let mut vol = if is_nifti_path(path) {
            Self::load_nifti(path)?
        } else {
            Self::load_image(path)?
        };
        vol.normalize();
        log::info!(
            "loaded {} volume, dimensions {:?}",
            if vol.is_3d { "3D" } else { "2D" },
            vol.data.dim()
        );
        Ok(vol)
    }

    fn load_image(path: &Path) -> Result<Self> {
        let gray = crate::output::load_image(path)?.to_luma8();
        let (w, h) = gray.dimensions();
        let data = Array3::from_shape_fn((h as usize, w as usize, 1), |(y, x, _)| {
            gray.get_pixel(x as u32, y as u32).0[0] as f32
        });
        Ok(Self::from_array(data, false, VolumeFormat::Png))
    }

    fn load_nifti(path: &Path) -> Result<Self> {
        let obj = ReaderOptions::new()
            .read_file(path)
            .with_context(|| format!("could not read NIfTI file {}", path.display()))?;
        let dyn_data = obj
            .into_volume()
            .into_ndarray::<f32>()
            .context("could not convert NIfTI volume to an array")?;
        match dyn_data.ndim() {
            2 => {
                let data = dyn_data
                    .insert_axis(ndarray::Axis(2))
                    .into_dimensionality::<Ix3>()
                    .context("unexpected NIfTI layout")?;
                Ok(Self::from_array(data, false, VolumeFormat::Nifti))
            }
            3 => {
                let data = dyn_data
                    .into_dimensionality::<Ix3>()
                    .context("unexpected NIfTI layout")?;
                Ok(Self::from_array(data, true, VolumeFormat::Nifti))
            }
            n => anyhow::bail!("unsupported NIfTI dimensionality: {}", n),
        }
    }

    fn normalize(&mut self) {
        let min = self.data.iter().copied().fold(f32::INFINITY, f32::min);
        let max = self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        self.data.mapv_inplace(|v| (v - min) / (max - min + 1e-8));
    }

    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn is_3d(&self) -> bool {
        self.is_3d
    }

    pub fn format(&self) -> VolumeFormat {
        self.format
    }

    pub fn count_nonzero(&self) -> usize {
        self.data.iter().filter(|v| **v > 0.5).count()
    }

    fn derived(&self, data: Array3<f32>) -> Self {
        Self::from_array(data, self.is_3d, self.format)
    }

    /// Threshold to a 0/1 volume.
    pub fn binarize(&self, level: f32) -> Self {
        self.derived(self.data.mapv(|v| if v > level { 1.0 } else { 0.0 }))
    }

    /// Binary erosion with the full-connectivity structuring element
    /// (8 neighbors in 2D, 26 in 3D). Anything outside the volume counts as
    /// background, so border voxels always erode away.
    pub fn erode(&self) -> Self {
        let (d0, d1, d2) = self.data.dim();
        let mut out = Array3::<f32>::zeros((d0, d1, d2));
        let z_offsets: &[isize] = if self.is_3d { &[-1, 0, 1] } else { &[0] };

        for i in 0..d0 {
            for j in 0..d1 {
                for k in 0..d2 {
                    if self.data[[i, j, k]] <= 0.5 {
                        continue;
                    }
                    let mut keep = true;
                    'neighbors: for di in -1isize..=1 {
                        for dj in -1isize..=1 {
                            for &dk in z_offsets {
                                if di == 0 && dj == 0 && dk == 0 {
                                    continue;
                                }
                                let ni = i as isize + di;
                                let nj = j as isize + dj;
                                let nk = k as isize + dk;
                                let inside = ni >= 0
                                    && nj >= 0
                                    && nk >= 0
                                    && ni < d0 as isize
                                    && nj < d1 as isize
                                    && nk < d2 as isize;
                                if !inside
                                    || self.data[[ni as usize, nj as usize, nk as usize]] <= 0.5
                                {
                                    keep = false;
                                    break 'neighbors;
                                }
                            }
                        }
                    }
                    if keep {
                        out[[i, j, k]] = 1.0;
                    }
                }
            }
        }
        self.derived(out)
    }

    /// Boundary voxels: the binary volume minus its erosion.
    pub fn edges(&self) -> Self {
        let binary = self.binarize(0.5);
        let eroded = binary.erode();
        let data = ndarray::Zip::from(&binary.data)
            .and(&eroded.data)
            .map_collect(|&b, &e| if b > 0.5 && e <= 0.5 { 1.0 } else { 0.0 });
        self.derived(data)
    }

    /// Write the volume in its source format: PNG for 2D image inputs,
    /// NIfTI otherwise.
    pub fn save(&self, path: &Path) -> Result<()> {
        match self.format {
            VolumeFormat::Png => {
                let img = self.to_gray()?;
                img.save(path)
                    .with_context(|| format!("failed to save {}", path.display()))?;
            }
            VolumeFormat::Nifti => {
                WriterOptions::new(path)
                    .write_nifti(&self.data)
                    .with_context(|| format!("failed to save {}", path.display()))?;
            }
        }
        Ok(())
    }

    /// First slice as an 8-bit grayscale image.
    pub fn to_gray(&self) -> Result<GrayImage> {
        let (d0, d1, _) = self.data.dim();
        let mut img = GrayImage::new(d1 as u32, d0 as u32);
        for y in 0..d0 {
            for x in 0..d1 {
                let v = (self.data[[y, x, 0]] * 255.0).round().clamp(0.0, 255.0) as u8;
                img.put_pixel(x as u32, y as u32, Luma([v]));
            }
        }
        Ok(img)
    }

    /// File extension matching the source format.
    pub fn extension(&self) -> &'static str {
        match self.format {
            VolumeFormat::Png => "png",
            VolumeFormat::Nifti => "nii.gz",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Solid cube of the given edge length inside a zero border.
    fn cube(edge: usize, pad: usize) -> Volume {
        let size = edge + 2 * pad;
        let mut data = Array3::<f32>::zeros((size, size, size));
        for i in pad..pad + edge {
            for j in pad..pad + edge {
                for k in pad..pad + edge {
                    data[[i, j, k]] = 1.0;
                }
            }
        }
        Volume::from_array(data, true, VolumeFormat::Nifti)
    }

    #[test]
    fn erosion_peels_one_layer() {
        let vol = cube(4, 2);
        let eroded = vol.erode();
        assert_eq!(eroded.count_nonzero(), 2 * 2 * 2);
    }

    #[test]
    fn cube_without_interior_erodes_to_nothing() {
        // Every voxel of a 2-wide cube touches the boundary.
        let vol = cube(2, 1);
        assert_eq!(vol.erode().count_nonzero(), 0);
    }

    #[test]
    fn edges_of_hollow_cube_equal_the_cube() {
        let vol = cube(2, 1);
        assert_eq!(vol.edges().count_nonzero(), vol.count_nonzero());
    }

    #[test]
    fn edges_keep_only_the_shell() {
        let vol = cube(4, 2);
        let edges = vol.edges();
        assert_eq!(edges.count_nonzero(), 4 * 4 * 4 - 2 * 2 * 2);
    }

    #[test]
    fn volume_touching_the_border_erodes_at_the_border() {
        let data = Array3::<f32>::ones((3, 3, 3));
        let vol = Volume::from_array(data, true, VolumeFormat::Nifti);
        // Only the center voxel has all 26 neighbors inside.
        assert_eq!(vol.erode().count_nonzero(), 1);
    }

    #[test]
    fn flat_volume_uses_planar_structuring() {
        let mut data = Array3::<f32>::zeros((5, 5, 1));
        for i in 1..4 {
            for j in 1..4 {
                data[[i, j, 0]] = 1.0;
            }
        }
        let vol = Volume::from_array(data, false, VolumeFormat::Png);
        // With a 2D structuring element the 3x3 square keeps its center.
        assert_eq!(vol.erode().count_nonzero(), 1);
    }

    #[test]
    fn binarize_splits_on_level() {
        let mut data = Array3::<f32>::zeros((1, 2, 1));
        data[[0, 0, 0]] = 0.4;
        data[[0, 1, 0]] = 0.6;
        let vol = Volume::from_array(data, false, VolumeFormat::Png);
        let bin = vol.binarize(0.5);
        assert_eq!(bin.count_nonzero(), 1);
    }
}
