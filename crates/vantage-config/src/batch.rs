//! Immutable per-batch configuration.
//!
//! A [`BatchConfig`] is built once from [`Settings`] when a batch starts and
//! passed by value into the scheduler. Nothing reads the settings file after
//! that point, so a batch is unaffected by settings edits made while it runs.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::{DisplayMode, Settings};
use crate::error::ConfigError;

/// Everything a single batch run needs, validated and frozen at start.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum number of concurrent worker subprocesses.
    pub max_workers: usize,
    /// Scheduler time budget per tick.
    pub tick_budget: Duration,
    /// Distance thresholds `d0 < d1 < d2` for levels 0..=3.
    pub distances: [f32; 3],
    /// Reduction factors never drop below this.
    pub min_protection_ratio: f32,
    /// Meshes with fewer faces than this are never degraded.
    pub min_face_guard: u32,
    /// Fixed target edge length for uniform resize batches.
    pub target_size_px: u32,
    /// Upper cap for camera-optimized sizing.
    pub max_size_px: u32,
    /// Directory generated texture variants live under.
    pub project_dir: PathBuf,
    /// Explicit worker executable path, when configured.
    pub worker_path: Option<PathBuf>,
    /// Viewport display mode per LOD level.
    pub viewport_modes: [DisplayMode; 4],
    /// Hide entities entirely at the farthest level.
    pub hide_at_far_level: bool,
    /// Normal-map strength multipliers for levels 1..=3 (level 0 is 1.0).
    pub normal_mults: [f32; 3],
    /// Displacement scale multipliers for levels 1..=3 (level 0 is 1.0).
    pub displacement_mults: [f32; 3],
}

impl BatchConfig {
    /// Build a batch config from persisted settings and a project directory.
    pub fn from_settings(settings: &Settings, project_dir: PathBuf) -> Result<Self, ConfigError> {
        let config = Self {
            max_workers: settings.workers.max_workers,
            tick_budget: Duration::from_millis(settings.workers.tick_budget_ms),
            distances: [
                settings.lod.dist_0,
                settings.lod.dist_1,
                settings.lod.dist_2,
            ],
            min_protection_ratio: settings.lod.min_protection_ratio,
            min_face_guard: settings.lod.min_face_guard,
            target_size_px: settings.textures.target_size_px,
            max_size_px: settings.textures.max_size_px,
            project_dir,
            worker_path: settings.workers.worker_path.clone(),
            viewport_modes: settings.viewport.level_modes,
            hide_at_far_level: settings.viewport.hide_at_far_level,
            normal_mults: settings.shader.normal_mults,
            displacement_mults: settings.shader.displacement_mults,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency. Called by [`from_settings`](Self::from_settings);
    /// call it directly when constructing a config by hand.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == 0 {
            return Err(ConfigError::InvalidBatchConfig(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if self.tick_budget.is_zero() {
            return Err(ConfigError::InvalidBatchConfig(
                "tick_budget must be non-zero".to_string(),
            ));
        }
        let [d0, d1, d2] = self.distances;
        if !(d0 > 0.0 && d0 < d1 && d1 < d2) {
            return Err(ConfigError::InvalidBatchConfig(format!(
                "distance thresholds must satisfy 0 < d0 < d1 < d2, got {d0}, {d1}, {d2}"
            )));
        }
        if !(self.min_protection_ratio > 0.0 && self.min_protection_ratio <= 1.0) {
            return Err(ConfigError::InvalidBatchConfig(format!(
                "min_protection_ratio must be in (0, 1], got {}",
                self.min_protection_ratio
            )));
        }
        if self.target_size_px < 4 || self.max_size_px < 4 {
            return Err(ConfigError::InvalidBatchConfig(
                "texture sizes below 4px are not representable".to_string(),
            ));
        }
        Ok(())
    }
}
