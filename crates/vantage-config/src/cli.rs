//! Command-line overrides for persisted settings.

use std::path::PathBuf;

use clap::Args;

use crate::Settings;

/// Settings overrides shared by every subcommand.
///
/// CLI values override what was loaded from `settings.ron`.
#[derive(Args, Debug, Default)]
pub struct SettingsOverrides {
    /// Maximum concurrent worker subprocesses.
    #[arg(long)]
    pub max_workers: Option<usize>,

    /// Scheduler time budget per tick, in milliseconds.
    #[arg(long)]
    pub tick_budget_ms: Option<u64>,

    /// Target texture edge length in pixels.
    #[arg(long)]
    pub size: Option<u32>,

    /// LOD distance thresholds as `d0,d1,d2`.
    #[arg(long, value_delimiter = ',', num_args = 3)]
    pub distances: Option<Vec<f32>>,

    /// Minimum reduction-factor protection ratio.
    #[arg(long)]
    pub min_protection: Option<f32>,

    /// Meshes with fewer faces than this are never degraded.
    #[arg(long)]
    pub min_faces: Option<u32>,

    /// Explicit path to the worker executable.
    #[arg(long)]
    pub worker: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to the settings directory (overrides the default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Settings {
    /// Apply CLI overrides to loaded settings.
    pub fn apply_cli_overrides(&mut self, args: &SettingsOverrides) {
        if let Some(n) = args.max_workers {
            self.workers.max_workers = n;
        }
        if let Some(ms) = args.tick_budget_ms {
            self.workers.tick_budget_ms = ms;
        }
        if let Some(px) = args.size {
            self.textures.target_size_px = px;
        }
        if let Some(ref d) = args.distances
            && let [d0, d1, d2] = d[..]
        {
            self.lod.dist_0 = d0;
            self.lod.dist_1 = d1;
            self.lod.dist_2 = d2;
        }
        if let Some(ratio) = args.min_protection {
            self.lod.min_protection_ratio = ratio;
        }
        if let Some(faces) = args.min_faces {
            self.lod.min_face_guard = faces;
        }
        if let Some(ref path) = args.worker {
            self.workers.worker_path = Some(path.clone());
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut settings = Settings::default();
        let args = SettingsOverrides {
            max_workers: Some(8),
            distances: Some(vec![5.0, 15.0, 30.0]),
            ..Default::default()
        };
        settings.apply_cli_overrides(&args);
        assert_eq!(settings.workers.max_workers, 8);
        assert_eq!(settings.lod.dist_1, 15.0);
        // Non-overridden fields retain defaults
        assert_eq!(settings.textures.target_size_px, 1024);
        assert_eq!(settings.lod.min_face_guard, 1000);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Settings::default();
        let mut settings = Settings::default();
        settings.apply_cli_overrides(&SettingsOverrides::default());
        assert_eq!(settings, original);
    }
}
