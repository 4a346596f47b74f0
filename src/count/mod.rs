pub mod detector;
pub mod frames;

pub use detector::{ColorBlobDetector, CountClass, CountConfig, Detection, Detector};
pub use frames::{CountWriter, FrameSource};

use crate::output;
use ab_glyph::{FontVec, PxScale};
use anyhow::Result;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

pub struct CountSummary {
    pub frames: usize,
    pub skipped: usize,
    pub totals: Vec<(String, u64)>,
    pub csv_path: PathBuf,
    pub output_dir: PathBuf,
}

/// Run the detector over every frame in `input_dir`, write annotated frames
/// and the per-frame counts table to the output directory, and return the
/// per-class totals. Unreadable frames are skipped, the counts table is
/// written regardless.
pub fn count_frames(
    input_dir: &Path,
    output_dir: Option<PathBuf>,
    detector: &dyn Detector,
    font: Option<&FontVec>,
) -> Result<CountSummary> {
    let source = FrameSource::open(input_dir)?;
    let classes = detector.classes();

    let output_dir = output_dir
        .unwrap_or_else(|| input_dir.join(format!("annotated_{}", output::timestamp())));
    let mut writer = CountWriter::create(output_dir.clone(), classes.clone())?;

    let total = source.len();
    let mut skipped = 0;
    for (i, path) in source.iter().enumerate() {
        let frame = match output::load_image(path) {
            Ok(img) => img.to_rgb8(),
            Err(e) => {
                log::error!("skipping frame {}: {:#}", path.display(), e);
                skipped += 1;
                continue;
            }
        };

        let detections = detector.detect(&frame)?;
        let mut counts = vec![0u64; classes.len()];
        let mut annotated = frame;
        for det in &detections {
            if let Some(idx) = classes.iter().position(|c| *c == det.class) {
                counts[idx] += 1;
            }
            annotate(&mut annotated, det, font);
        }

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("frame")
            .to_string();
        log::debug!("[{}/{}] {}: {} detection(s)", i + 1, total, name, detections.len());
        writer.write_frame(&name, &annotated, counts)?;
    }

    let totals = writer.totals();
    let frames = total - skipped;
    let csv_path = writer.finalize()?;

    Ok(CountSummary {
        frames,
        skipped,
        totals,
        csv_path,
        output_dir,
    })
}

fn annotate(frame: &mut RgbImage, det: &Detection, font: Option<&FontVec>) {
    let r = &det.region;
    if r.width == 0 || r.height == 0 {
        return;
    }
    draw_hollow_rect_mut(
        frame,
        Rect::at(r.x as i32, r.y as i32).of_size(r.width, r.height),
        BOX_COLOR,
    );
    if let Some(font) = font {
        let y = r.y.saturating_sub(12) as i32;
        draw_text_mut(
            frame,
            BOX_COLOR,
            r.x as i32,
            y,
            PxScale::from(12.0),
            font,
            &det.class,
        );
    }
}
