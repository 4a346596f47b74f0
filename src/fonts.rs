use ab_glyph::FontVec;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Well-known TTF locations probed when no font is given explicitly.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/freefont/FreeSans.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Load a font for legend text. Resolution order: explicit path, the
/// `LANDWATCH_FONT` environment variable, then the candidate list. Returns
/// `None` when nothing usable is found; callers degrade to text-free
/// rendering.
pub fn load_font(explicit: Option<&Path>) -> Option<FontVec> {
    if let Some(path) = explicit {
        match load_font_file(path) {
            Ok(font) => return Some(font),
            Err(e) => {
                log::warn!("could not load font {}: {}", path.display(), e);
                return None;
            }
        }
    }

    if let Ok(env_path) = std::env::var("LANDWATCH_FONT") {
        let path = PathBuf::from(env_path);
        if let Ok(font) = load_font_file(&path) {
            return Some(font);
        }
        log::warn!("LANDWATCH_FONT is set but unusable: {}", path.display());
    }

    for candidate in FONT_CANDIDATES {
        let path = Path::new(candidate);
        if path.exists() {
            if let Ok(font) = load_font_file(path) {
                log::debug!("using font {}", path.display());
                return Some(font);
            }
        }
    }

    log::warn!("no usable font found, legend text will be omitted");
    None
}

fn load_font_file(path: &Path) -> Result<FontVec> {
    let data = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    FontVec::try_from_vec(data).with_context(|| format!("not a parseable font: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_missing_font_degrades_to_none() {
        assert!(load_font(Some(Path::new("/nonexistent/font.ttf"))).is_none());
    }

    #[test]
    fn garbage_file_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"not a font").unwrap();
        assert!(load_font(Some(file.path())).is_none());
    }
}
