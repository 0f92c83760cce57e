//! Error types for the head pose alignment library.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// Perspective division hit a homogeneous `w` at or near zero, or the camera is singular
    #[error("Degenerate projection: {0}")]
    DegenerateProjection(String),

    /// Face detection cannot seed a pose (zero-area box, missing landmark group)
    #[error("Degenerate detection: {0}")]
    DegenerateDetection(String),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Background refinement worker failed
    #[error("Worker error: {0}")]
    WorkerError(String),

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic I/O error with description
    #[error("I/O error: {0}")]
    IoError(String),
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
