//! Settings structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How an entity is drawn in the host viewport.
///
/// Ordered from most to least expensive; the far LOD levels map to the
/// cheaper modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisplayMode {
    /// Full material preview.
    Textured,
    /// Flat shaded, no textures.
    Solid,
    /// Wireframe only.
    Wire,
    /// Bounding box only (cheapest).
    Bounds,
}

/// Top-level persisted settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Distance thresholds and protection floors for LOD decisions.
    pub lod: LodSettings,
    /// Texture resize targets and output layout.
    pub textures: TextureSettings,
    /// Worker pool and tick pacing.
    pub workers: WorkerSettings,
    /// Per-level viewport display modes.
    pub viewport: ViewportSettings,
    /// Per-level shader detail multipliers.
    pub shader: ShaderSettings,
    /// Debug/development settings.
    pub debug: DebugSettings,
}

/// LOD decision settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LodSettings {
    /// High-detail end distance (level 0 boundary).
    pub dist_0: f32,
    /// Mid-detail end distance (level 1 boundary).
    pub dist_1: f32,
    /// Low-detail end distance (level 2 boundary); beyond is level 3.
    pub dist_2: f32,
    /// Strongest protection: a reduction factor never drops below this.
    pub min_protection_ratio: f32,
    /// Meshes with fewer faces than this are never degraded.
    pub min_face_guard: u32,
}

/// Texture resize settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TextureSettings {
    /// Fixed target edge length in pixels for uniform resize batches.
    pub target_size_px: u32,
    /// Upper cap for camera-optimized sizing.
    pub max_size_px: u32,
    /// Optional output directory override; defaults to the project directory.
    pub output_dir: Option<PathBuf>,
}

/// Worker pool and scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerSettings {
    /// Maximum number of concurrent worker subprocesses.
    pub max_workers: usize,
    /// Scheduler time budget per tick, in milliseconds.
    pub tick_budget_ms: u64,
    /// Host loop sleep between ticks, in milliseconds.
    pub tick_interval_ms: u64,
    /// Explicit path to the worker executable; discovered next to the
    /// current executable when unset.
    pub worker_path: Option<PathBuf>,
}

/// Per-level viewport display settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewportSettings {
    /// Display mode for each LOD level, nearest first.
    pub level_modes: [DisplayMode; 4],
    /// Hide entities entirely at the farthest level.
    pub hide_at_far_level: bool,
}

/// Per-level shader detail multipliers.
///
/// Level 0 is implicitly 1.0; the arrays hold levels 1..=3.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShaderSettings {
    /// Normal-map strength multipliers for levels 1..=3.
    pub normal_mults: [f32; 3],
    /// Displacement scale multipliers for levels 1..=3.
    pub displacement_mults: [f32; 3],
}

/// Debug/development settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugSettings {
    /// Log level override (e.g. "debug", "info", "warn").
    pub log_level: String,
    /// Write a JSON log file alongside console output.
    pub json_log: bool,
}

// --- Default implementations ---

impl Default for LodSettings {
    fn default() -> Self {
        Self {
            dist_0: 10.0,
            dist_1: 25.0,
            dist_2: 50.0,
            min_protection_ratio: 0.1,
            min_face_guard: 1000,
        }
    }
}

impl Default for TextureSettings {
    fn default() -> Self {
        Self {
            target_size_px: 1024,
            max_size_px: 4096,
            output_dir: None,
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            max_workers: 4,
            tick_budget_ms: 20,
            tick_interval_ms: 10,
            worker_path: None,
        }
    }
}

impl Default for ViewportSettings {
    fn default() -> Self {
        Self {
            level_modes: [
                DisplayMode::Textured,
                DisplayMode::Solid,
                DisplayMode::Wire,
                DisplayMode::Bounds,
            ],
            hide_at_far_level: false,
        }
    }
}

impl Default for ShaderSettings {
    fn default() -> Self {
        Self {
            normal_mults: [0.7, 0.3, 0.0],
            displacement_mults: [0.5, 0.0, 0.0],
        }
    }
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_log: false,
        }
    }
}

// --- Load / Save / Reload ---

impl Settings {
    /// Load settings from the given directory, or create a default file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let path = config_dir.join("settings.ron");

        if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(ConfigError::ReadError)?;
            let settings: Settings = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded settings from {}", path.display());
            Ok(settings)
        } else {
            let settings = Settings::default();
            settings.save(config_dir)?;
            log::info!("Created default settings at {}", path.display());
            Ok(settings)
        }
    }

    /// Save settings to the given directory as `settings.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let path = config_dir.join("settings.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_settings)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let path = config_dir.join("settings.ron");
        let contents = std::fs::read_to_string(&path).map_err(ConfigError::ReadError)?;
        let new_settings: Settings = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_settings != self {
            log::info!("Settings reloaded with changes");
            Ok(Some(new_settings))
        } else {
            Ok(None)
        }
    }

    /// Default settings directory (`$CONFIG_DIR/vantage`), falling back to
    /// the current directory when the platform offers no config dir.
    pub fn default_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("vantage"))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_serialize() {
        let settings = Settings::default();
        let ron_str =
            ron::ser::to_string_pretty(&settings, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(ron_str.contains("dist_0: 10.0"));
        assert!(ron_str.contains("max_workers: 4"));
    }

    #[test]
    fn test_settings_roundtrip() {
        let settings = Settings::default();
        let ron_str = ron::to_string(&settings).unwrap();
        let deserialized: Settings = ron::from_str(&ron_str).unwrap();
        assert_eq!(settings, deserialized);
    }

    #[test]
    fn test_missing_section_uses_default() {
        // Settings missing the `shader` section entirely
        let ron_str = "(lod: (), textures: (), workers: (), viewport: (), debug: ())";
        let settings: Settings = ron::from_str(ron_str).unwrap();
        assert_eq!(settings.shader, ShaderSettings::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.lod.dist_2 = 120.0;
        settings.workers.max_workers = 8;

        settings.save(dir.path()).unwrap();
        let loaded = Settings::load_or_create(dir.path()).unwrap();
        assert_eq!(settings, loaded);
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::default();
        settings.save(dir.path()).unwrap();

        let mut modified = settings.clone();
        modified.textures.target_size_px = 512;
        modified.save(dir.path()).unwrap();

        let result = settings.reload(dir.path()).unwrap();
        assert!(result.is_some());
        assert_eq!(result.unwrap().textures.target_size_px, 512);
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::default();
        settings.save(dir.path()).unwrap();

        assert!(settings.reload(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let result: Result<Settings, _> = ron::from_str("{{not valid}}");
        assert!(result.is_err());
    }
}
