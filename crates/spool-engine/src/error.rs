//! Error types.

use thiserror::Error;

/// Error type.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Persistent storage rejected or failed an operation.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Track index outside `0..NUM_TRACKS`.
    #[error("Invalid track index: {0}")]
    InvalidTrack(usize),

    /// Rejected configuration value.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// The streamer thread is gone; the tape can no longer make progress.
    #[error("Streamer thread is not running")]
    Shutdown,

    /// WAV encoding error.
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;
