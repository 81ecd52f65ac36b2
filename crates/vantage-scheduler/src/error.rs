//! Scheduler error types.
//!
//! These cover precondition failures only: once a batch is running, per-task
//! problems are absorbed into the failure counters and never surface as
//! errors from `tick`.

use std::path::PathBuf;

/// Errors that prevent a batch from starting or a handle from resolving.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// The request measures against a camera, but the scene has none.
    #[error("no active camera in the scene")]
    NoCamera,

    /// Generated artifacts need a project directory that does not exist.
    #[error("project directory does not exist: {0}")]
    ProjectDirMissing(PathBuf),

    /// The handle does not refer to a known batch job.
    #[error("unknown batch job handle")]
    UnknownJob,

    /// The batch configuration failed validation.
    #[error(transparent)]
    Config(#[from] vantage_config::ConfigError),

    /// Cache directory setup failed.
    #[error(transparent)]
    Cache(#[from] vantage_cache::CacheError),
}
