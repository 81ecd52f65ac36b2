//! The LOD decision policy.
//!
//! A pure mapping from a visual-importance measurement to a keep-ratio in
//! `[min_protection, 1.0]`, where 1.0 means "leave the entity at full
//! detail". No side effects; every decision is reproducible from its inputs.

use crate::coverage::ScreenCoverage;
use crate::distance::{DistanceThresholds, LodLevel};

/// How an entity's visual importance was measured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measurement {
    /// Screen-coverage measurement (projected bounding box).
    Coverage(ScreenCoverage),
    /// Distance from the camera, bucketed by [`DistanceThresholds`].
    Distance(f32),
}

/// Stepped coverage-to-factor table: `(coverage above, keep ratio)`.
const COVERAGE_STEPS: [(f32, f32); 4] = [(0.8, 1.0), (0.5, 0.7), (0.2, 0.4), (0.05, 0.1)];

/// Keep ratio when coverage is below every step (or the entity is invisible).
const COVERAGE_FLOOR: f32 = 0.01;

/// The LOD decision policy for one batch.
#[derive(Debug, Clone)]
pub struct LodPolicy {
    thresholds: DistanceThresholds,
    min_protection: f32,
    min_face_guard: u32,
}

impl LodPolicy {
    /// Create a policy.
    ///
    /// `min_protection` is the strongest allowed reduction (the factor never
    /// drops below it); `min_face_guard` protects small meshes outright.
    pub fn new(thresholds: DistanceThresholds, min_protection: f32, min_face_guard: u32) -> Self {
        debug_assert!(min_protection > 0.0 && min_protection <= 1.0);
        Self {
            thresholds,
            min_protection,
            min_face_guard,
        }
    }

    /// The LOD level for a camera distance.
    pub fn level_for(&self, distance: f32) -> LodLevel {
        self.thresholds.level_for(distance)
    }

    /// Compute the keep-ratio for an entity.
    ///
    /// The result is in `[min_protection, 1.0]` and is monotonically
    /// non-increasing as the entity gets less important (farther away,
    /// smaller on screen). Entities below the face guard are never degraded.
    pub fn compute_factor(&self, measurement: Measurement, face_count: u32) -> f32 {
        if face_count < self.min_face_guard {
            return 1.0;
        }

        let raw = match measurement {
            Measurement::Coverage(cov) => coverage_factor(cov),
            Measurement::Distance(dist) => {
                // Level 0 keeps everything; each farther level blends toward
                // the protection floor.
                let reduction = self.thresholds.level_for(dist).reduction();
                1.0 - reduction * (1.0 - self.min_protection)
            }
        };

        raw.max(self.min_protection)
    }
}

/// Keep ratio from the stepped coverage table.
fn coverage_factor(cov: ScreenCoverage) -> f32 {
    if !cov.visible {
        return COVERAGE_FLOOR;
    }
    for (threshold, factor) in COVERAGE_STEPS {
        if cov.ratio > threshold {
            return factor;
        }
    }
    COVERAGE_FLOOR
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> LodPolicy {
        LodPolicy::new(DistanceThresholds::new(10.0, 25.0, 50.0), 0.1, 100)
    }

    fn coverage(ratio: f32) -> Measurement {
        Measurement::Coverage(ScreenCoverage {
            ratio,
            pixels: ratio * 1920.0,
            visible: true,
        })
    }

    #[test]
    fn test_coverage_step_table() {
        let p = policy();
        assert_eq!(p.compute_factor(coverage(0.9), 1000), 1.0);
        assert_eq!(p.compute_factor(coverage(0.6), 1000), 0.7);
        assert_eq!(p.compute_factor(coverage(0.3), 1000), 0.4);
        assert_eq!(p.compute_factor(coverage(0.1), 1000), 0.1);
        // Below every step: floored by min_protection (0.1 > 0.01).
        assert_eq!(p.compute_factor(coverage(0.01), 1000), 0.1);
    }

    #[test]
    fn test_invisible_entity_gets_floor() {
        let p = policy();
        let m = Measurement::Coverage(ScreenCoverage::INVISIBLE);
        assert_eq!(p.compute_factor(m, 1000), 0.1);
    }

    #[test]
    fn test_factor_never_below_protection() {
        let p = LodPolicy::new(DistanceThresholds::default(), 0.25, 0);
        for ratio in [0.0, 0.01, 0.04, 0.06, 0.3, 0.9] {
            assert!(p.compute_factor(coverage(ratio), 1000) >= 0.25);
        }
        for dist in [1.0, 15.0, 40.0, 4000.0] {
            assert!(p.compute_factor(Measurement::Distance(dist), 1000) >= 0.25);
        }
    }

    #[test]
    fn test_face_guard_forces_full_detail() {
        let p = policy();
        // 50 faces < guard of 100: full detail regardless of distance.
        assert_eq!(p.compute_factor(Measurement::Distance(10_000.0), 50), 1.0);
        assert_eq!(
            p.compute_factor(Measurement::Coverage(ScreenCoverage::INVISIBLE), 50),
            1.0
        );
    }

    #[test]
    fn test_distance_factor_monotone_non_increasing() {
        let p = policy();
        let mut prev = f32::INFINITY;
        for dist in [1.0, 10.0, 11.0, 25.0, 26.0, 50.0, 51.0, 1000.0] {
            let f = p.compute_factor(Measurement::Distance(dist), 1000);
            assert!(f <= prev, "factor increased at distance {dist}");
            prev = f;
        }
    }

    #[test]
    fn test_coverage_factor_monotone_non_decreasing() {
        let p = policy();
        let mut prev = 0.0f32;
        for ratio in [0.0, 0.04, 0.06, 0.21, 0.51, 0.81, 1.0] {
            let f = p.compute_factor(coverage(ratio), 1000);
            assert!(f >= prev, "factor decreased at coverage {ratio}");
            prev = f;
        }
    }

    #[test]
    fn test_distance_level_scenario() {
        // Entity at distance 40 with thresholds 10/25/50 sits at level 2,
        // i.e. reduction strength 2/3.
        let p = policy();
        let level = p.level_for(40.0);
        assert_eq!(level.index(), 2);
        assert!((level.reduction() - 0.6667).abs() < 1e-3);
        // The resulting keep-ratio blends toward the 0.1 floor.
        let f = p.compute_factor(Measurement::Distance(40.0), 1000);
        assert!((f - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_nearest_distance_keeps_full_detail() {
        let p = policy();
        assert_eq!(p.compute_factor(Measurement::Distance(5.0), 1000), 1.0);
    }

    #[test]
    fn test_farthest_distance_lands_on_protection() {
        let p = policy();
        let f = p.compute_factor(Measurement::Distance(1000.0), 1000);
        assert!((f - 0.1).abs() < 1e-6);
    }
}
