//! Scene statistics: vertex totals, image memory estimates, and a heat
//! classification that flags the collections responsible for most of the
//! scene's weight.

use serde::{Deserialize, Serialize};

use crate::entity::ImageInfo;
use crate::graph::SceneGraph;

/// Baseline vertex count the heat thresholds multiply against.
pub const HEAT_BASELINE_VERTICES: u64 = 1_000_000;

/// Heat band for a collection, from heaviest to negligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HeatLevel {
    /// Above the very-high multiplier.
    VeryHigh,
    /// Above the high multiplier.
    High,
    /// Above the medium multiplier.
    Medium,
    /// Above the low multiplier.
    Low,
    /// Below every threshold.
    Negligible,
}

/// Multipliers (of [`HEAT_BASELINE_VERTICES`]) separating the heat bands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeatThresholds {
    /// Very-high band multiplier.
    pub very_high: f64,
    /// High band multiplier.
    pub high: f64,
    /// Medium band multiplier.
    pub medium: f64,
    /// Low band multiplier.
    pub low: f64,
}

impl Default for HeatThresholds {
    fn default() -> Self {
        Self {
            very_high: 0.9,
            high: 0.8,
            medium: 0.6,
            low: 0.2,
        }
    }
}

impl HeatThresholds {
    /// Classify a vertex count into a heat band.
    pub fn classify(&self, vertex_count: u64) -> HeatLevel {
        let base = HEAT_BASELINE_VERTICES as f64;
        let v = vertex_count as f64;
        if v > base * self.very_high {
            HeatLevel::VeryHigh
        } else if v > base * self.high {
            HeatLevel::High
        } else if v > base * self.medium {
            HeatLevel::Medium
        } else if v > base * self.low {
            HeatLevel::Low
        } else {
            HeatLevel::Negligible
        }
    }
}

/// Estimated in-memory footprint of an image, in megabytes.
///
/// Assumes 4 channels at 4 bytes each (the host keeps float buffers), so this
/// is an upper-bound estimate rather than the on-disk size.
pub fn image_memory_mb(info: &ImageInfo) -> f64 {
    let bytes = info.width as u64 * info.height as u64 * 4 * 4;
    bytes as f64 / (1024.0 * 1024.0)
}

/// Format a large count with a K/M suffix for display.
pub fn format_count(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// Aggregate statistics over a whole scene.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneStats {
    /// Number of mesh entities.
    pub mesh_count: usize,
    /// Total vertices across all meshes.
    pub total_vertices: u64,
    /// Total faces across all meshes.
    pub total_faces: u64,
    /// Number of optimizable image entities.
    pub image_count: usize,
    /// Estimated image memory in megabytes.
    pub image_memory_mb: f64,
}

impl SceneStats {
    /// Gather statistics from a scene graph. Generated/viewer images are
    /// excluded, matching what the optimizer would actually touch.
    pub fn gather(scene: &dyn SceneGraph) -> Self {
        let mut stats = Self::default();

        for id in scene.mesh_entities() {
            if let Some(mesh) = scene.mesh_info(id) {
                stats.mesh_count += 1;
                stats.total_vertices += mesh.vertex_count as u64;
                stats.total_faces += mesh.face_count as u64;
            }
        }
        for id in scene.image_entities() {
            if let Some(img) = scene.image_info(id)
                && !img.generated
            {
                stats.image_count += 1;
                stats.image_memory_mb += image_memory_mb(&img);
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn image(w: u32, h: u32) -> ImageInfo {
        ImageInfo {
            name: "img".to_string(),
            path: Some(PathBuf::from("/tex/img.png")),
            width: w,
            height: h,
            packed: false,
            generated: false,
        }
    }

    #[test]
    fn test_memory_estimate_of_1k_square() {
        // 1024 * 1024 * 16 bytes = 16 MiB
        let mb = image_memory_mb(&image(1024, 1024));
        assert!((mb - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_heat_bands() {
        let t = HeatThresholds::default();
        assert_eq!(t.classify(950_000), HeatLevel::VeryHigh);
        assert_eq!(t.classify(850_000), HeatLevel::High);
        assert_eq!(t.classify(700_000), HeatLevel::Medium);
        assert_eq!(t.classify(300_000), HeatLevel::Low);
        assert_eq!(t.classify(100_000), HeatLevel::Negligible);
    }

    #[test]
    fn test_heat_band_boundaries_are_exclusive() {
        let t = HeatThresholds::default();
        // Exactly at a threshold falls into the band below it.
        assert_eq!(t.classify(900_000), HeatLevel::High);
        assert_eq!(t.classify(200_000), HeatLevel::Negligible);
    }

    #[test]
    fn test_format_count_suffixes() {
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_500), "1.5K");
        assert_eq!(format_count(2_300_000), "2.3M");
    }
}
