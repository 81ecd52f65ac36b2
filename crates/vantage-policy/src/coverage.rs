//! Screen-coverage measurement.
//!
//! Projects the eight world-space bounding-box corners of an entity into
//! screen space and measures how much of the render resolution the box
//! occupies. This is the visual-importance signal behind camera-optimized
//! texture sizing and the coverage branch of the LOD policy.

use glam::{Mat4, Vec3, Vec4};

/// Result of projecting an entity's bounding box onto the screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenCoverage {
    /// Fraction of the render resolution covered, in `[0.0, 1.0]`:
    /// the maximum of the width and height spans of the on-screen part of
    /// the projected box, each divided by the corresponding resolution axis.
    pub ratio: f32,
    /// Unclipped maximum span of the projected box in pixels; feeds texture
    /// target sizing, which applies its own caps.
    pub pixels: f32,
    /// False when the box is entirely behind the camera or entirely outside
    /// the view frustum.
    pub visible: bool,
}

impl ScreenCoverage {
    /// A measurement for something that cannot be seen at all.
    pub const INVISIBLE: Self = Self {
        ratio: 0.0,
        pixels: 0.0,
        visible: false,
    };
}

/// Measure the screen coverage of a world-space bounding box.
///
/// `view_proj` is the combined camera view-projection matrix and
/// `resolution` the render target size in pixels.
///
/// A box that straddles the camera plane (some corners behind, some in
/// front) cannot be projected meaningfully; it is so close that it is
/// reported as full coverage.
pub fn measure_coverage(
    corners: &[Vec3; 8],
    view_proj: Mat4,
    resolution: [u32; 2],
) -> ScreenCoverage {
    let width = resolution[0] as f32;
    let height = resolution[1] as f32;

    let mut behind = 0usize;
    let mut min_x = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_y = f32::NEG_INFINITY;

    for corner in corners {
        let clip = view_proj * Vec4::new(corner.x, corner.y, corner.z, 1.0);
        if clip.w <= 0.0 {
            behind += 1;
            continue;
        }
        let ndc_x = clip.x / clip.w;
        let ndc_y = clip.y / clip.w;
        let sx = (ndc_x + 1.0) * 0.5 * width;
        let sy = (1.0 - ndc_y) * 0.5 * height;
        min_x = min_x.min(sx);
        max_x = max_x.max(sx);
        min_y = min_y.min(sy);
        max_y = max_y.max(sy);
    }

    if behind == 8 {
        return ScreenCoverage::INVISIBLE;
    }
    if behind > 0 {
        // Straddling the near plane: treat as filling the frame.
        return ScreenCoverage {
            ratio: 1.0,
            pixels: width.max(height),
            visible: true,
        };
    }

    // Fully outside the frustum on one side?
    if max_x < 0.0 || min_x > width || max_y < 0.0 || min_y > height {
        return ScreenCoverage::INVISIBLE;
    }

    let span_x = max_x - min_x;
    let span_y = max_y - min_y;

    // On-screen portion for the coverage ratio.
    let clipped_x = max_x.min(width) - min_x.max(0.0);
    let clipped_y = max_y.min(height) - min_y.max(0.0);
    let ratio = (clipped_x / width).max(clipped_y / height).clamp(0.0, 1.0);

    ScreenCoverage {
        ratio,
        pixels: span_x.max(span_y),
        visible: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RES: [u32; 2] = [1920, 1080];

    fn camera_at_origin() -> Mat4 {
        // Looking down -Z, 60 degree vertical fov.
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let proj = Mat4::perspective_rh(60f32.to_radians(), 1920.0 / 1080.0, 0.1, 1000.0);
        proj * view
    }

    fn box_corners(center: Vec3, half: f32) -> [Vec3; 8] {
        let mut corners = [Vec3::ZERO; 8];
        for (i, c) in corners.iter_mut().enumerate() {
            let sign = Vec3::new(
                if i & 1 == 0 { -1.0 } else { 1.0 },
                if i & 2 == 0 { -1.0 } else { 1.0 },
                if i & 4 == 0 { -1.0 } else { 1.0 },
            );
            *c = center + sign * half;
        }
        corners
    }

    #[test]
    fn test_behind_camera_is_invisible() {
        let cov = measure_coverage(&box_corners(Vec3::new(0.0, 0.0, 50.0), 1.0), camera_at_origin(), RES);
        assert!(!cov.visible);
        assert_eq!(cov.ratio, 0.0);
    }

    #[test]
    fn test_centered_box_is_visible() {
        let cov = measure_coverage(&box_corners(Vec3::new(0.0, 0.0, -20.0), 1.0), camera_at_origin(), RES);
        assert!(cov.visible);
        assert!(cov.ratio > 0.0 && cov.ratio <= 1.0);
        assert!(cov.pixels > 0.0);
    }

    #[test]
    fn test_coverage_shrinks_with_distance() {
        let vp = camera_at_origin();
        let near = measure_coverage(&box_corners(Vec3::new(0.0, 0.0, -10.0), 1.0), vp, RES);
        let far = measure_coverage(&box_corners(Vec3::new(0.0, 0.0, -100.0), 1.0), vp, RES);
        assert!(near.visible && far.visible);
        assert!(near.ratio > far.ratio);
        assert!(near.pixels > far.pixels);
    }

    #[test]
    fn test_off_frustum_is_invisible() {
        // Far off to the side at a modest depth.
        let cov = measure_coverage(&box_corners(Vec3::new(500.0, 0.0, -10.0), 1.0), camera_at_origin(), RES);
        assert!(!cov.visible);
    }

    #[test]
    fn test_straddling_near_plane_is_full_coverage() {
        let cov = measure_coverage(&box_corners(Vec3::new(0.0, 0.0, 0.0), 2.0), camera_at_origin(), RES);
        assert!(cov.visible);
        assert_eq!(cov.ratio, 1.0);
    }

    #[test]
    fn test_huge_close_box_clamps_to_one() {
        let cov = measure_coverage(&box_corners(Vec3::new(0.0, 0.0, -5.0), 4.5), camera_at_origin(), RES);
        assert!(cov.visible);
        assert_eq!(cov.ratio, 1.0);
        // Unclipped pixel span exceeds the screen.
        assert!(cov.pixels > 1920.0);
    }
}
