//! # Error Types
//!
//! Custom error types for WSPR telemetry decoding using `thiserror`.

use thiserror::Error;

/// Main error type for WSPR telemetry decoding
#[derive(Debug, Error)]
pub enum WsprError {
    /// Malformed or out-of-range channel code
    #[error("Invalid channel code: {0}")]
    InvalidChannel(String),

    /// Malformed extended telemetry program
    #[error("Invalid extended telemetry spec: {0}")]
    InvalidEtSpec(String),

    /// Malformed ingest row
    #[error("Invalid report: {0}")]
    InvalidReport(String),

    /// Unparseable dates, bad ordering or excessive range
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for WSPR telemetry decoding
pub type Result<T> = std::result::Result<T, WsprError>;
