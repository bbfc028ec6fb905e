//! Configuration errors.

use thiserror::Error;

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A config file failed to parse as TOML.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// Offending path.
        path: String,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// An environment override could not be applied.
    #[error("invalid environment override {var}: {reason}")]
    EnvOverride {
        /// Variable name.
        var: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A field failed validation.
    #[error("invalid config: {field}: {reason}")]
    Invalid {
        /// Offending field.
        field: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
