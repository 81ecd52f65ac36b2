//! Structured logging for Vantage.
//!
//! Console output with timestamps and module paths via the `tracing`
//! ecosystem, plus an optional JSON file for post-mortem inspection of long
//! batch runs. Respects `RUST_LOG` and the settings-file log level override.

use std::path::Path;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use vantage_config::Settings;

/// Initialize the tracing subscriber.
///
/// * `log_dir`: optional directory for a JSON log file; only used when the
///   settings enable `json_log`.
/// * `settings`: optional settings whose `debug.log_level` overrides the
///   default filter. `RUST_LOG` wins over both.
pub fn init_logging(log_dir: Option<&Path>, settings: Option<&Settings>) {
    let filter_str = settings
        .map(|s| s.debug.log_level.as_str())
        .filter(|level| !level.is_empty())
        .unwrap_or("info")
        .to_string();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true) // worker reaper threads are named
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    let json_enabled = settings.is_some_and(|s| s.debug.json_log);
    if json_enabled
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_dir.join("vantage.log"))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        return;
    }

    subscriber.init();
}

/// Create an `EnvFilter` with the default filter string.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new("info")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        let filter = default_env_filter();
        assert!(format!("{}", filter).contains("info"));
    }

    #[test]
    fn test_settings_level_parses() {
        // Every level the settings file documents must be a valid filter.
        for level in ["error", "warn", "info", "debug", "trace"] {
            assert!(EnvFilter::try_from(level).is_ok(), "invalid level {level}");
        }
    }

    #[test]
    fn test_per_crate_filter_parses() {
        let filter = EnvFilter::new("info,vantage_scheduler=debug,vantage_worker=trace");
        let filter_str = format!("{}", filter);
        assert!(filter_str.contains("vantage_scheduler=debug"));
        assert!(filter_str.contains("vantage_worker=trace"));
    }

    #[test]
    fn test_log_file_path_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vantage.log");
        assert_eq!(path.file_name().unwrap(), "vantage.log");
    }
}
