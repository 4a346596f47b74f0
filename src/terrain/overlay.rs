use super::class::TerrainClass;
use image::{GrayImage, RgbImage};

/// Blend each class color over its masked pixels:
/// `out = alpha * color + (1 - alpha) * src`, computed per channel in f32.
pub fn blend_overlay(src: &RgbImage, masks: &[(TerrainClass, GrayImage)], alpha: f32) -> RgbImage {
    let mut out = src.clone();
    for (class, mask) in masks {
        let color = class.overlay_color();
        for (pixel, m) in out.pixels_mut().zip(mask.pixels()) {
            if m.0[0] > 0 {
                for c in 0..3 {
                    let blended = alpha * color[c] as f32 + (1.0 - alpha) * pixel.0[c] as f32;
                    pixel.0[c] = blended.round().clamp(0.0, 255.0) as u8;
                }
            }
        }
    }
    out
}
