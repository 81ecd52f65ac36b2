//! Configuration error types.

/// Errors that can occur when loading, saving, or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the settings file from disk.
    #[error("failed to read settings: {0}")]
    ReadError(#[source] std::io::Error),

    /// Failed to write the settings file to disk.
    #[error("failed to write settings: {0}")]
    WriteError(#[source] std::io::Error),

    /// Failed to parse RON content.
    #[error("failed to parse settings: {0}")]
    ParseError(#[source] ron::error::SpannedError),

    /// Failed to serialize settings to RON.
    #[error("failed to serialize settings: {0}")]
    SerializeError(#[source] ron::Error),

    /// A batch configuration value is out of range or inconsistent.
    #[error("invalid batch config: {0}")]
    InvalidBatchConfig(String),
}
