use std::path::PathBuf;

use thiserror::Error;

/// Main library error type covering every hard failure a reference check can hit
///
/// A reference that simply does not resolve is not an error: validators report
/// it as `Ok(false)` and the validation pass turns it into a failure entry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IdValidatorError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dynamic reference unresolved: {path} - field '{ref_path}' holds no collection name")]
    UnresolvedRefPath { path: String, ref_path: String },

    #[error("No connection available for reference field: {path}")]
    NoConnection { path: String },

    #[error("Unknown schema path: {path}")]
    UnknownPath { path: String },

    #[error("Concurrent operation error: {details}")]
    Concurrency { details: String },
}

/// Failures raised by the backing document store
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Unknown collection: {name}")]
    UnknownCollection { name: String },

    #[error("Count query failed on {collection}: {details}")]
    QueryFailed { collection: String, details: String },

    #[error("Store unavailable: {details}")]
    Unavailable { details: String },

    #[error("Invalid document for {collection}: {details}")]
    InvalidDocument { collection: String, details: String },
}

/// Configuration-specific error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

impl From<ConfigError> for IdValidatorError {
    fn from(err: ConfigError) -> Self {
        IdValidatorError::Config(err.to_string())
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, IdValidatorError>;

/// Store result type alias
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
