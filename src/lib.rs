//! simforge: lifecycle manager for long-running external simulation jobs.
//!
//! ```text
//!  HTTP (api) ──▶ SimulationManager ──▶ SimulationRegistry ──▶ Simulation ──▶ ExternalRunner
//!                                                                  │              │
//!                                                                  └── workdir ◀──┘ results.zip
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod runner;
pub mod simulation;

pub use error::{ErrorKind, Result, SimulationError};
pub use simulation::{SimulationManager, SimulationParameters, SimulationState};
