//! Error types for the range-core crate.
//!
//! The estimator itself never fails (an empty session resolves to a fixed
//! default result). Errors only surface at the edges: configuration files,
//! usage records and malformed audio frames.

use thiserror::Error;

/// Errors that can occur outside of the estimation path.
#[derive(Debug, Error)]
pub enum RangeError {
    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A usage record could not be encoded or decoded.
    #[error("usage record error: {0}")]
    Json(#[from] serde_json::Error),

    /// A configuration file is not valid TOML for `Config`.
    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// A configuration value is out of its allowed range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// An audio frame cannot be transformed (empty or not a power of two).
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RangeError>;
