use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};

/// Forest green used by the synthetic scenes; sits inside the forest HSV
/// detection window.
pub const FOREST_GREEN: Rgb<u8> = Rgb([30, 200, 30]);

/// Dark blue inside the flood detection window.
pub const FLOOD_BLUE: Rgb<u8> = Rgb([20, 40, 120]);

/// A 64x32 scene: left half forest green, right half flood blue.
pub fn terrain_scene() -> RgbImage {
    let mut img = RgbImage::new(64, 32);
    for y in 0..32 {
        for x in 0..64 {
            let px = if x < 32 { FOREST_GREEN } else { FLOOD_BLUE };
            img.put_pixel(x, y, px);
        }
    }
    img
}

/// A frame with `red` red squares and `blue` blue squares on black,
/// laid out on a grid so the blobs never touch.
pub fn blob_frame(red: u32, blue: u32) -> RgbImage {
    let mut frame = RgbImage::from_pixel(128, 128, Rgb([0, 0, 0]));
    let mut slot = 0u32;
    let mut paint = |color: Rgb<u8>| {
        let x0 = (slot % 6) * 20 + 2;
        let y0 = (slot / 6) * 20 + 2;
        for y in y0..y0 + 8 {
            for x in x0..x0 + 8 {
                frame.put_pixel(x, y, color);
            }
        }
        slot += 1;
    };
    for _ in 0..red {
        paint(Rgb([220, 20, 20]));
    }
    for _ in 0..blue {
        paint(Rgb([20, 20, 220]));
    }
    frame
}

pub fn save_png(dir: &Path, name: &str, img: &RgbImage) -> PathBuf {
    let path = dir.join(name);
    img.save(&path).expect("failed to save fixture image");
    path
}
