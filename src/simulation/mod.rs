//! Simulation lifecycle management.
//!
//! - [`Simulation`]: one job, its state machine, and its runner handle
//! - [`SimulationRegistry`]: the in-memory map of live simulations
//! - [`SimulationManager`]: the facade used by the HTTP layer

mod job;
mod manager;
mod parameters;
mod registry;
mod state;

pub use job::{Simulation, SimulationInfo};
pub use manager::{SimulationManager, SimulationSummary};
pub use parameters::SimulationParameters;
pub use registry::{SharedSimulation, SimulationRegistry};
pub use state::{SimulationState, StateTransition};
