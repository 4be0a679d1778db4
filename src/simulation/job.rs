//! A single simulation: identity, state machine, and runner supervision.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Result, SimulationError};
use crate::runner::{ExternalRunner, KILLED_EXIT_CODE, RunnerHandle};
use crate::simulation::{SimulationParameters, SimulationState, StateTransition};

/// Snapshot of a simulation for callers outside the lock.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationInfo {
    pub id: Uuid,
    pub parameters: SimulationParameters,
    pub state: SimulationState,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    /// Every state change so far, oldest first.
    pub transitions: Vec<StateTransition>,
}

/// One tracked simulation.
///
/// State is evaluated lazily: while `RUNNING`, every read first asks the
/// runner handle whether the computation is still alive and advances to
/// `COMPLETED` or `FAILED` if it is not. Callers serialize access through the
/// per-simulation lock held by the registry.
pub struct Simulation {
    id: Uuid,
    parameters: SimulationParameters,
    state: SimulationState,
    working_dir: PathBuf,
    bundle_path: PathBuf,
    /// Present exactly while `state == Running`.
    handle: Option<Box<dyn RunnerHandle>>,
    exit_code: Option<i32>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    transitions: Vec<StateTransition>,
    deleted: bool,
}

impl Simulation {
    /// Create a simulation and its working directory under `simulations_root`.
    pub async fn create(
        simulations_root: &Path,
        parameters: SimulationParameters,
        runner: &dyn ExternalRunner,
    ) -> Result<Self> {
        let id = Uuid::new_v4();
        let working_dir = simulations_root.join(id.to_string());

        // create_dir (not create_dir_all): the directory must be ours alone.
        tokio::fs::create_dir(&working_dir).await?;

        tracing::info!(
            simulation_id = %id,
            "Simulation created with payload {}",
            parameters.as_value()
        );

        Ok(Self {
            id,
            bundle_path: runner.bundle_path(&working_dir),
            parameters,
            state: SimulationState::Created,
            working_dir,
            handle: None,
            exit_code: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            transitions: Vec::new(),
            deleted: false,
        })
    }

    /// Get the simulation id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Directory owned by this simulation. The runner writes here.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Whether `delete` already reclaimed this simulation.
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Fails with `NotFound` once the simulation has been deleted.
    ///
    /// A caller may still hold the simulation after a concurrent delete
    /// removed it from the registry.
    pub fn ensure_present(&self) -> Result<()> {
        if self.deleted {
            return Err(SimulationError::not_found(self.id));
        }
        Ok(())
    }

    /// Current state, reconciled against the runner first.
    pub fn state(&mut self) -> SimulationState {
        self.reconcile();
        self.state
    }

    /// Path of the output bundle, only once the run completed.
    pub fn output_path(&mut self) -> Option<PathBuf> {
        match self.state() {
            SimulationState::Completed => Some(self.bundle_path.clone()),
            _ => None,
        }
    }

    /// Reconciled snapshot.
    pub fn info(&mut self) -> SimulationInfo {
        self.reconcile();
        SimulationInfo {
            id: self.id,
            parameters: self.parameters.clone(),
            state: self.state,
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            exit_code: self.exit_code,
            transitions: self.transitions.clone(),
        }
    }

    /// Start the external runner.
    pub async fn run(&mut self, runner: &dyn ExternalRunner) -> Result<()> {
        self.ensure_present()?;

        let state = self.state();
        if state == SimulationState::Running {
            tracing::error!(simulation_id = %self.id, "Simulation already in progress");
            return Err(self.conflict("already in progress"));
        }
        if !state.can_transition_to(SimulationState::Running) {
            tracing::error!(simulation_id = %self.id, %state, "Simulation cannot be restarted");
            return Err(self.conflict("cannot be restarted, delete and recreate it"));
        }

        let handle = runner.start(&self.parameters, &self.working_dir).await?;
        self.handle = Some(handle);
        self.transition_to(SimulationState::Running, None)?;

        tracing::info!(simulation_id = %self.id, "Simulation started successfully");
        Ok(())
    }

    /// Terminate the runner and mark the simulation stopped.
    ///
    /// Does not wait for the process to exit.
    pub fn stop(&mut self) -> Result<()> {
        self.ensure_present()?;

        let Some(mut handle) = self.handle.take() else {
            tracing::error!(
                simulation_id = %self.id,
                "No process to stop. Is the simulation running?"
            );
            return Err(self.conflict("no process to stop"));
        };

        handle.terminate();
        self.transition_to(SimulationState::Stopped, Some("stopped on request".to_string()))?;

        tracing::info!(simulation_id = %self.id, "Simulation stopped successfully");
        Ok(())
    }

    /// Remove the working directory. Refused while running.
    pub async fn delete(&mut self) -> Result<()> {
        self.ensure_present()?;

        if !self.state().is_deletable() {
            tracing::error!(simulation_id = %self.id, "Cannot delete a running simulation");
            return Err(self.conflict("cannot delete while running"));
        }

        match tokio::fs::remove_dir_all(&self.working_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    simulation_id = %self.id,
                    working_dir = %self.working_dir.display(),
                    "Working directory already gone"
                );
            }
            Err(e) => return Err(e.into()),
        }
        self.deleted = true;

        tracing::info!(simulation_id = %self.id, "Simulation and related files deleted");
        Ok(())
    }

    fn reconcile(&mut self) {
        if self.state != SimulationState::Running {
            return;
        }
        let Some(handle) = self.handle.as_ref() else {
            return;
        };
        if handle.is_alive() {
            return;
        }

        let code = handle.exit_status().unwrap_or(KILLED_EXIT_CODE);
        self.exit_code = Some(code);
        self.handle = None;

        let result = if code == 0 {
            tracing::info!(simulation_id = %self.id, "Simulation is now completed");
            self.transition_to(SimulationState::Completed, None)
        } else {
            tracing::error!(simulation_id = %self.id, exit_code = code, "Error occurred in simulation");
            self.transition_to(
                SimulationState::Failed,
                Some(format!("runner exited with status {}", code)),
            )
        };
        if let Err(e) = result {
            tracing::error!(simulation_id = %self.id, "Failed to record runner exit: {}", e);
        }
    }

    fn transition_to(&mut self, target: SimulationState, reason: Option<String>) -> Result<()> {
        if !self.state.can_transition_to(target) {
            return Err(self.conflict(&format!("cannot transition to {}", target)));
        }

        let now = Utc::now();
        self.transitions.push(StateTransition {
            from: self.state,
            to: target,
            at: now,
            reason,
        });
        self.state = target;

        if target == SimulationState::Running {
            self.started_at = Some(now);
        } else if target.is_terminal() {
            self.finished_at = Some(now);
        }
        Ok(())
    }

    fn conflict(&self, reason: &str) -> SimulationError {
        SimulationError::Conflict {
            id: self.id,
            state: self.state,
            reason: reason.to_string(),
        }
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("working_dir", &self.working_dir)
            .field("has_handle", &self.handle.is_some())
            .field("deleted", &self.deleted)
            .finish()
    }
}
