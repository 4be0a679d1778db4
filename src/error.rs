//! Error types for simforge.

use uuid::Uuid;

use crate::runner::RunnerError;
use crate::simulation::SimulationState;

/// Errors surfaced by the simulation lifecycle manager.
///
/// A nonzero exit of the external runner is not an error here: it shows up
/// as [`SimulationState::Failed`] on the next state read.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// The referenced simulation does not exist (or was already deleted).
    #[error("Simulation with id '{id}' not found")]
    NotFound { id: String },

    /// The requested transition is illegal in the current state.
    #[error("Simulation '{id}' is {state}: {reason}")]
    Conflict {
        id: Uuid,
        state: SimulationState,
        reason: String,
    },

    /// The caller asked for a target state that cannot be requested.
    #[error("{state} is not a supported state")]
    UnsupportedRequest { state: SimulationState },

    /// The external runner could not be started.
    #[error("Runner error: {0}")]
    Runner(#[from] RunnerError),

    /// Filesystem failure while managing a working directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SimulationError {
    pub fn not_found(id: impl ToString) -> Self {
        Self::NotFound { id: id.to_string() }
    }

    /// Coarse category used by callers to pick a response.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::UnsupportedRequest { .. } => ErrorKind::UnsupportedRequest,
            Self::Runner(_) | Self::Io(_) => ErrorKind::Internal,
        }
    }
}

/// Error taxonomy exposed to the outer layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    UnsupportedRequest,
    Internal,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}")]
    MissingRequired { key: String },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Result type for lifecycle operations.
pub type Result<T> = std::result::Result<T, SimulationError>;
