use anyhow::{Context, Result};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::macros::format_description;

/// Extensions accepted by every subcommand that reads raster images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif"];

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// All supported images directly inside `dir`, sorted by name.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_supported_image(p))
        .collect();
    images.sort();
    Ok(images)
}

/// `YYYYMMDD_HHMMSS`, local time when the offset is known.
pub fn timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let fmt = format_description!("[year][month][day]_[hour][minute][second]");
    now.format(&fmt).unwrap_or_else(|_| "00000000_000000".to_string())
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
        .to_string()
}

/// `<dir>/<stem>_<suffix>.<ext>` next to the input.
pub fn sibling(input: &Path, suffix: &str, ext: &str) -> PathBuf {
    let name = format!("{}_{}.{}", stem_of(input), suffix, ext);
    input.with_file_name(name)
}

/// `<dir>/<stem>_<suffix>_<timestamp>.<ext>` next to the input.
pub fn timestamped_sibling(input: &Path, suffix: &str, ext: &str) -> PathBuf {
    let name = format!("{}_{}_{}.{}", stem_of(input), suffix, timestamp(), ext);
    input.with_file_name(name)
}

/// Save next to the input; when that directory is not writable, fall back to
/// the current directory under the same file name.
pub fn save_image_with_fallback(img: &DynamicImage, preferred: &Path) -> Result<PathBuf> {
    match img.save(preferred) {
        Ok(()) => Ok(preferred.to_path_buf()),
        Err(first_err) => {
            let fallback = PathBuf::from(
                preferred
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| format!("output_{}.png", timestamp())),
            );
            log::warn!(
                "could not write {} ({}), retrying as {}",
                preferred.display(),
                first_err,
                fallback.display()
            );
            img.save(&fallback)
                .with_context(|| format!("failed to save image to {}", fallback.display()))?;
            Ok(fallback)
        }
    }
}

/// Open and decode an image, with the two failure modes reported apart.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    if !path.exists() {
        anyhow::bail!("file not found: {}", path.display());
    }
    let img = image::ImageReader::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .decode()
        .with_context(|| format!("could not decode image {}", path.display()))?;
    Ok(img)
}
