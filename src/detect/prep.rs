use image::{DynamicImage, GrayImage};
use imageproc::edges::canny;
use imageproc::filter::{gaussian_blur_f32, median_filter};

/// Convert image to grayscale.
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Gaussian blur for noise reduction.
pub fn blur(img: &GrayImage, sigma: f32) -> GrayImage {
    gaussian_blur_f32(img, sigma)
}

/// Median blur, stronger against salt-and-pepper noise than Gaussian.
pub fn median_blur(img: &GrayImage, radius: u32) -> GrayImage {
    median_filter(img, radius, radius)
}

/// Canny edge detection.
pub fn edges(img: &GrayImage, low: f32, high: f32) -> GrayImage {
    canny(img, low, high)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn median_blur_removes_single_speck() {
        let mut img = GrayImage::from_pixel(9, 9, Luma([0]));
        img.put_pixel(4, 4, Luma([255]));
        let out = median_blur(&img, 1);
        assert_eq!(out.get_pixel(4, 4).0[0], 0);
    }

    #[test]
    fn edges_of_flat_image_are_empty() {
        let img = GrayImage::from_pixel(16, 16, Luma([80]));
        let out = edges(&img, 50.0, 100.0);
        assert!(out.pixels().all(|p| p.0[0] == 0));
    }
}
