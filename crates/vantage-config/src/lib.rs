//! Settings persistence and per-batch configuration for Vantage.
//!
//! Persisted [`Settings`] live in `settings.ron` and carry user preferences
//! across sessions; an immutable [`BatchConfig`] is derived from them when a
//! batch starts and is the only configuration the scheduler ever sees.

mod batch;
mod cli;
mod config;
mod error;

pub use batch::BatchConfig;
pub use cli::SettingsOverrides;
pub use config::{
    DebugSettings, DisplayMode, LodSettings, Settings, ShaderSettings, TextureSettings,
    ViewportSettings, WorkerSettings,
};
pub use error::ConfigError;
