//! Error types shared by the bridge crates.

use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading or validating the bridge configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for the expected schema.
    #[error("Failed to parse config file {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// Configuration parsed but holds unusable values.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Other error.
    #[error("Other: {0}")]
    Other(#[from] anyhow::Error),
}
