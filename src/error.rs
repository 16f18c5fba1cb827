//! Error types for woodshed
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for the woodshed engine
#[derive(Error, Debug)]
pub enum Error {
    /// Media source unreadable or undecodable
    #[error("Load error: {0}")]
    Load(String),

    /// Audio output host could not be acquired or started
    #[error("Engine start error: {0}")]
    EngineStart(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid timing parameters (seek positions, loop ranges)
    #[error("Invalid timing: {0}")]
    InvalidTiming(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Playlist index outside the current playlist
    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using the woodshed Error
pub type Result<T> = std::result::Result<T, Error>;
