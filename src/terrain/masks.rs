use super::ClassifierConfig;
use super::class::{HsvRange, TerrainClass};
use super::hsv::HsvPixels;
use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{close, open};

pub const FG: u8 = 255;

/// Binary mask of pixels whose HSV value falls inside the window.
pub fn in_range(hsv: &HsvPixels, range: &HsvRange) -> GrayImage {
    let mut mask = GrayImage::new(hsv.width(), hsv.height());
    for y in 0..hsv.height() {
        for x in 0..hsv.width() {
            if range.contains(hsv.get(x, y)) {
                mask.put_pixel(x, y, Luma([FG]));
            }
        }
    }
    mask
}

pub fn count_nonzero(mask: &GrayImage) -> u64 {
    mask.pixels().filter(|p| p.0[0] > 0).count() as u64
}

/// a |= b
pub fn union_into(a: &mut GrayImage, b: &GrayImage) {
    for (pa, pb) in a.pixels_mut().zip(b.pixels()) {
        if pb.0[0] > 0 {
            pa.0[0] = FG;
        }
    }
}

/// a &= !b
pub fn subtract_from(a: &mut GrayImage, b: &GrayImage) {
    for (pa, pb) in a.pixels_mut().zip(b.pixels()) {
        if pb.0[0] > 0 {
            pa.0[0] = 0;
        }
    }
}

/// Water shows up dark (low V) or washed out (low S) in satellite frames,
/// which the plain hue window misses. Threshold both channels, merge, then
/// clean the result with close/open passes of growing radius.
pub fn enhance_water(hsv: &HsvPixels, dark_value: u8, low_saturation: u8) -> GrayImage {
    let mut mask = GrayImage::new(hsv.width(), hsv.height());
    for y in 0..hsv.height() {
        for x in 0..hsv.width() {
            let [_, s, v] = hsv.get(x, y);
            if v <= dark_value || s <= low_saturation {
                mask.put_pixel(x, y, Luma([FG]));
            }
        }
    }
    let mask = close(&mask, Norm::LInf, 1);
    let mask = open(&mask, Norm::LInf, 1);
    open(&mask, Norm::LInf, 2)
}

/// One detection mask per class, in legend order. The flood mask is widened
/// with the enhanced water detector, and every mask gets a closing pass to
/// fill pinholes.
pub fn build_masks(hsv: &HsvPixels, cfg: &ClassifierConfig) -> Vec<(TerrainClass, GrayImage)> {
    let mut masks: Vec<(TerrainClass, GrayImage)> = TerrainClass::ALL
        .iter()
        .map(|&class| (class, in_range(hsv, cfg.range(class))))
        .collect();

    let water = enhance_water(hsv, cfg.water_dark_value, cfg.water_low_saturation);
    for (class, mask) in masks.iter_mut() {
        if *class == TerrainClass::Flood {
            union_into(mask, &water);
        }
    }

    for (_, mask) in masks.iter_mut() {
        *mask = close(mask, Norm::LInf, 1);
    }
    masks
}

/// Make the per-class masks pairwise disjoint: walk the fixed priority
/// order and strip from each mask every pixel a higher-priority class
/// already claimed.
pub fn apply_priority(masks: &mut [(TerrainClass, GrayImage)]) {
    if masks.is_empty() {
        return;
    }
    let (w, h) = masks[0].1.dimensions();
    let mut claimed = GrayImage::new(w, h);
    for class in TerrainClass::PRIORITY {
        if let Some((_, mask)) = masks.iter_mut().find(|(c, _)| *c == class) {
            subtract_from(mask, &claimed);
            union_into(&mut claimed, mask);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(w: u32, h: u32, v: u8) -> GrayImage {
        GrayImage::from_pixel(w, h, Luma([v]))
    }

    #[test]
    fn union_and_subtract() {
        let mut a = flat(4, 4, 0);
        let mut b = flat(4, 4, 0);
        b.put_pixel(1, 1, Luma([FG]));
        union_into(&mut a, &b);
        assert_eq!(count_nonzero(&a), 1);
        subtract_from(&mut a, &b);
        assert_eq!(count_nonzero(&a), 0);
    }

    #[test]
    fn priority_makes_masks_disjoint() {
        // Everything claims the same full frame; after resolution exactly one
        // class keeps it.
        let mut masks: Vec<(TerrainClass, GrayImage)> = TerrainClass::ALL
            .iter()
            .map(|&c| (c, flat(8, 8, FG)))
            .collect();
        apply_priority(&mut masks);

        let total: u64 = masks.iter().map(|(_, m)| count_nonzero(m)).sum();
        assert_eq!(total, 64);
        for (class, mask) in &masks {
            let expected = if *class == TerrainClass::Flood { 64 } else { 0 };
            assert_eq!(count_nonzero(mask), expected, "class {:?}", class);
        }
    }

    #[test]
    fn priority_keeps_exclusive_regions() {
        let mut masks: Vec<(TerrainClass, GrayImage)> = TerrainClass::ALL
            .iter()
            .map(|&c| (c, flat(8, 8, 0)))
            .collect();
        // Forest owns the left half, urban the right half plus one forest pixel.
        for y in 0..8 {
            for x in 0..4 {
                masks[0].1.put_pixel(x, y, Luma([FG]));
            }
            for x in 4..8 {
                masks[1].1.put_pixel(x, y, Luma([FG]));
            }
        }
        masks[1].1.put_pixel(0, 0, Luma([FG]));
        apply_priority(&mut masks);
        // Forest outranks urban, so the contested pixel stays forest.
        assert_eq!(count_nonzero(&masks[0].1), 32);
        assert_eq!(count_nonzero(&masks[1].1), 32);
    }
}
