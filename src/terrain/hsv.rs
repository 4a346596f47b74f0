use image::RgbImage;
use palette::{Hsv, IntoColor, Srgb};

/// Per-pixel HSV values in OpenCV scale (H 0..=180, S and V 0..=255), the
/// scale the tuned detection windows are expressed in.
pub struct HsvPixels {
    data: Vec<[u8; 3]>,
    width: u32,
    height: u32,
}

impl HsvPixels {
    pub fn from_rgb(img: &RgbImage) -> Self {
        let (width, height) = img.dimensions();
        let data = img
            .pixels()
            .map(|p| rgb_to_hsv_cv(p.0[0], p.0[1], p.0[2]))
            .collect();
        Self { data, width, height }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> [u8; 3] {
        self.data[(y * self.width + x) as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8; 3]> {
        self.data.iter()
    }
}

/// Convert one sRGB pixel to OpenCV-scaled HSV.
pub fn rgb_to_hsv_cv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let rgb = Srgb::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
    let hsv: Hsv = rgb.into_color();
    let h = (hsv.hue.into_positive_degrees() / 2.0).round().clamp(0.0, 180.0);
    let s = (hsv.saturation * 255.0).round().clamp(0.0, 255.0);
    let v = (hsv.value * 255.0).round().clamp(0.0, 255.0);
    [h as u8, s as u8, v as u8]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn primary_hues() {
        assert_eq!(rgb_to_hsv_cv(255, 0, 0), [0, 255, 255]);
        assert_eq!(rgb_to_hsv_cv(0, 255, 0), [60, 255, 255]);
        assert_eq!(rgb_to_hsv_cv(0, 0, 255), [120, 255, 255]);
    }

    #[test]
    fn gray_has_zero_saturation() {
        let [_, s, v] = rgb_to_hsv_cv(128, 128, 128);
        assert_eq!(s, 0);
        assert_eq!(v, 128);
    }

    #[test]
    fn plane_lookup_matches_pixel_conversion() {
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(2, 1, Rgb([10, 200, 30]));
        let hsv = HsvPixels::from_rgb(&img);
        assert_eq!(hsv.get(2, 1), rgb_to_hsv_cv(10, 200, 30));
        assert_eq!(hsv.get(0, 0), rgb_to_hsv_cv(0, 0, 0));
    }
}
