//! Configuration error types.

use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file exists but could not be read.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path of the unreadable file.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A config document is not valid TOML or does not match the schema.
    #[error("failed to parse config {path}: {source}")]
    ParseError {
        /// Path (or pseudo-path such as `<embedded defaults>`) of the document.
        path: String,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A value is outside its allowed range.
    #[error("invalid value for {field}: {message}")]
    ValidationError {
        /// Dotted path of the offending field.
        field: String,
        /// Why the value was rejected.
        message: String,
    },

    /// The user's home directory could not be determined.
    #[error("could not determine home directory")]
    NoHomeDir,
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
