//! Camera-optimized texture target sizing.
//!
//! Converts a screen-coverage pixel measurement into a concrete resize
//! target: a small safety margin, a floor for invisible entities, the user
//! cap, and a snap onto the power-of-two bucket ladder.

use crate::coverage::ScreenCoverage;

/// Safety margin over the measured pixel extent.
const COVERAGE_MARGIN: f32 = 1.2;

/// Resolution floor for anything visible.
const VISIBLE_FLOOR_PX: u32 = 32;

/// Invisible entities still get a thumbnail so memory is reclaimed without
/// losing the texture outright.
pub const INVISIBLE_FLOOR_PX: u32 = 32;

/// Smallest representable target.
const MIN_TARGET_PX: u32 = 4;

/// The bucket ladder targets snap up to.
const BUCKETS: [u32; 11] = [4, 8, 16, 32, 64, 128, 256, 512, 1024, 2048, 4096];

/// Required pixel extent for an entity measurement, before bucketing.
///
/// Visible entities ask for their projected extent plus margin, floored at
/// 32 px and capped at `user_cap`; invisible entities ask for the floor.
pub fn required_pixels(cov: ScreenCoverage, user_cap: u32) -> f32 {
    if !cov.visible {
        return INVISIBLE_FLOOR_PX as f32;
    }
    (cov.pixels * COVERAGE_MARGIN)
        .max(VISIBLE_FLOOR_PX as f32)
        .min(user_cap as f32)
}

/// Snap a required pixel extent onto the bucket ladder and clamp it to the
/// source's largest dimension.
///
/// The source clamp is applied after bucketing (a 1000-px source asked for
/// 1024 yields 1000, not 512): the artifact never exceeds the source, and
/// the worker will fall back to a plain copy when no downscale is needed.
pub fn bucketed_target(required_px: f32, source_max_px: u32) -> u32 {
    let mut target = *BUCKETS.last().unwrap();
    for bucket in BUCKETS {
        if required_px <= bucket as f32 {
            target = bucket;
            break;
        }
    }
    if target > source_max_px {
        target = source_max_px;
    }
    target.max(MIN_TARGET_PX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visible(pixels: f32) -> ScreenCoverage {
        ScreenCoverage {
            ratio: 0.5,
            pixels,
            visible: true,
        }
    }

    #[test]
    fn test_margin_applied() {
        let req = required_pixels(visible(100.0), 4096);
        assert!((req - 120.0).abs() < 1e-3);
    }

    #[test]
    fn test_visible_floor() {
        let req = required_pixels(visible(10.0), 4096);
        assert_eq!(req, 32.0);
    }

    #[test]
    fn test_invisible_gets_thumbnail_floor() {
        let req = required_pixels(ScreenCoverage::INVISIBLE, 4096);
        assert_eq!(req, INVISIBLE_FLOOR_PX as f32);
        assert_eq!(bucketed_target(req, 4096), 32);
    }

    #[test]
    fn test_user_cap_applies() {
        let req = required_pixels(visible(3000.0), 1024);
        assert_eq!(req, 1024.0);
    }

    #[test]
    fn test_bucket_snap_rounds_up() {
        assert_eq!(bucketed_target(120.0, 4096), 128);
        assert_eq!(bucketed_target(128.0, 4096), 128);
        assert_eq!(bucketed_target(129.0, 4096), 256);
        assert_eq!(bucketed_target(5000.0, 8192), 4096);
    }

    #[test]
    fn test_source_clamp_after_bucketing() {
        // A 1000-px source asked for the 1024 bucket yields 1000.
        assert_eq!(bucketed_target(900.0, 1000), 1000);
        // A big source is not clamped.
        assert_eq!(bucketed_target(900.0, 4096), 1024);
    }

    #[test]
    fn test_minimum_target() {
        assert_eq!(bucketed_target(1.0, 2), 4);
        assert_eq!(bucketed_target(0.0, 4096), 4);
    }
}
