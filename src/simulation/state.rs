//! Simulation state machine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State of a simulation.
///
/// ```text
///            run()                 exit 0
///  CREATED ────────▶ RUNNING ─────────────▶ COMPLETED
///                      │  │     exit != 0
///                      │  └───────────────▶ FAILED
///                      │       stop()
///                      └──────────────────▶ STOPPED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimulationState {
    /// Created, runner never started.
    Created,
    /// External runner launched and not yet observed to exit.
    Running,
    /// Runner exited with status 0.
    Completed,
    /// Runner exited with a nonzero status.
    Failed,
    /// Stopped on request.
    Stopped,
}

impl SimulationState {
    /// Whether the runner may still be executing.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Terminal states never move again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }

    /// Whether the working directory may be reclaimed.
    pub fn is_deletable(&self) -> bool {
        !self.is_active()
    }

    /// Whether a transition to `target` follows the state machine.
    pub fn can_transition_to(&self, target: SimulationState) -> bool {
        use SimulationState::*;

        matches!(
            (*self, target),
            (Created, Running) | (Running, Completed) | (Running, Failed) | (Running, Stopped)
        )
    }

    /// Whether a caller may request this state directly.
    pub fn is_requestable(&self) -> bool {
        matches!(self, Self::Running | Self::Stopped)
    }

    /// Wire name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for SimulationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SimulationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CREATED" => Ok(Self::Created),
            "RUNNING" => Ok(Self::Running),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            "STOPPED" => Ok(Self::Stopped),
            _ => Err(format!(
                "invalid simulation state '{}', expected one of CREATED, RUNNING, COMPLETED, FAILED, STOPPED",
                s
            )),
        }
    }
}

/// A recorded state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: SimulationState,
    pub to: SimulationState,
    pub at: DateTime<Utc>,
    /// Why the change happened, when it was not a plain request.
    pub reason: Option<String>,
}
