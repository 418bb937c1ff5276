//! Error types for hnlsel

use thiserror::Error;

/// hnlsel error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Invalid or unsupported configuration. Always fatal, raised before any event is processed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Calibration table missing or incompatible
    #[error("Calibration error: {0}")]
    Calibration(String),

    /// Malformed input data
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
