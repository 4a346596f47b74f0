use serde::{Deserialize, Serialize};

/// Land-cover classes detected by the classifier, ordered as they appear in
/// the legend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainClass {
    Forest,
    Urban,
    Pasture,
    BareSoil,
    Flood,
}

impl TerrainClass {
    /// Legend order.
    pub const ALL: [TerrainClass; 5] = [
        TerrainClass::Forest,
        TerrainClass::Urban,
        TerrainClass::Pasture,
        TerrainClass::BareSoil,
        TerrainClass::Flood,
    ];

    /// Overlap resolution order. Water wins over everything; the neutral
    /// urban range is the most permissive and yields to all others.
    pub const PRIORITY: [TerrainClass; 5] = [
        TerrainClass::Flood,
        TerrainClass::BareSoil,
        TerrainClass::Forest,
        TerrainClass::Pasture,
        TerrainClass::Urban,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TerrainClass::Forest => "Forest (low risk)",
            TerrainClass::Urban => "Urban area (medium risk)",
            TerrainClass::Pasture => "Pasture (high risk)",
            TerrainClass::BareSoil => "Bare soil (high risk)",
            TerrainClass::Flood => "Flooded area",
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            TerrainClass::Forest => "forest",
            TerrainClass::Urban => "urban",
            TerrainClass::Pasture => "pasture",
            TerrainClass::BareSoil => "bare_soil",
            TerrainClass::Flood => "flood",
        }
    }

    /// Highlight color blended over detected pixels.
    pub fn overlay_color(&self) -> [u8; 3] {
        match self {
            TerrainClass::Forest => [0, 255, 0],
            TerrainClass::Urban => [0, 0, 255],
            TerrainClass::Pasture => [255, 255, 0],
            TerrainClass::BareSoil => [255, 0, 0],
            TerrainClass::Flood => [128, 0, 128],
        }
    }
}

/// Inclusive HSV detection window in OpenCV scale: H in 0..=180,
/// S and V in 0..=255.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HsvRange {
    pub lo: [u8; 3],
    pub hi: [u8; 3],
}

impl HsvRange {
    pub fn new(lo: [u8; 3], hi: [u8; 3]) -> Self {
        Self { lo, hi }
    }

    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|i| self.lo[i] <= hsv[i] && hsv[i] <= self.hi[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_is_inclusive() {
        let r = HsvRange::new([35, 40, 40], [85, 255, 255]);
        assert!(r.contains([35, 40, 40]));
        assert!(r.contains([85, 255, 255]));
        assert!(r.contains([60, 120, 200]));
        assert!(!r.contains([34, 120, 200]));
        assert!(!r.contains([60, 39, 200]));
    }

    #[test]
    fn priority_covers_all_classes_once() {
        for class in TerrainClass::ALL {
            assert_eq!(
                TerrainClass::PRIORITY.iter().filter(|c| **c == class).count(),
                1
            );
        }
    }
}
