//! Error types for the external runner.

use std::path::PathBuf;

/// Errors that can occur while launching or packaging a run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The external program could not be spawned.
    #[error("Failed to spawn {program}: {reason}")]
    SpawnFailed { program: PathBuf, reason: String },

    /// The parameters could not be handed to the runner.
    #[error("Failed to write parameters: {0}")]
    Parameters(#[from] serde_json::Error),

    /// Packaging the output artifacts failed.
    #[error("Failed to bundle artifacts into {path}: {reason}")]
    Bundle { path: PathBuf, reason: String },

    /// Zip archive error.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;
