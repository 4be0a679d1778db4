//! In-memory registry of simulations.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::{Result, SimulationError};
use crate::simulation::Simulation;

/// A simulation behind its own lock.
///
/// The per-simulation lock serializes the read-check-transition sequences of
/// `run`, `stop`, `delete`, and state reconciliation. It is held across the
/// runner's `start`, so it is an async mutex.
pub type SharedSimulation = Arc<Mutex<Simulation>>;

/// Owns every live simulation.
///
/// Only insert and remove take the write lock; lookups share the read lock
/// and release it before the caller locks the simulation itself.
#[derive(Default)]
pub struct SimulationRegistry {
    simulations: RwLock<HashMap<Uuid, SharedSimulation>>,
}

impl SimulationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a simulation under its pre-assigned id.
    pub async fn insert(&self, simulation: Simulation) -> Uuid {
        let id = simulation.id();
        self.simulations
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(simulation)));
        id
    }

    /// Get a simulation by id.
    pub async fn get(&self, id: Uuid) -> Result<SharedSimulation> {
        self.simulations
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| {
                tracing::error!("Simulation with id '{}' not found", id);
                SimulationError::not_found(id)
            })
    }

    /// Unregister a simulation. Files on disk are left alone.
    pub async fn remove(&self, id: Uuid) -> Result<SharedSimulation> {
        self.simulations
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| SimulationError::not_found(id))
    }

    /// All simulations, in no particular order.
    pub async fn list(&self) -> Vec<SharedSimulation> {
        self.simulations.read().await.values().cloned().collect()
    }

    /// Check if a simulation is registered.
    pub async fn contains(&self, id: Uuid) -> bool {
        self.simulations.read().await.contains_key(&id)
    }

    /// Number of registered simulations.
    pub async fn len(&self) -> usize {
        self.simulations.read().await.len()
    }

    /// Whether no simulation is registered.
    pub async fn is_empty(&self) -> bool {
        self.simulations.read().await.is_empty()
    }
}
