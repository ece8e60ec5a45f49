//! Error types for brickvol.

use thiserror::Error;

/// The main error type for brickvol core operations.
#[derive(Error, Debug)]
pub enum BrickvolError {
    /// A configuration value is out of its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A brick index does not exist in the volume.
    #[error("brick {index} out of range (volume has {count} bricks)")]
    BrickOutOfRange { index: usize, count: usize },

    /// Data size mismatch.
    #[error("data size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A specialized Result type for brickvol core operations.
pub type Result<T> = std::result::Result<T, BrickvolError>;
