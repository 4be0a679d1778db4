//! Lifecycle manager: the single entry point for simulation operations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;

use crate::error::{Result, SimulationError};
use crate::runner::ExternalRunner;
use crate::simulation::registry::{SharedSimulation, SimulationRegistry};
use crate::simulation::{Simulation, SimulationInfo, SimulationParameters, SimulationState};

/// Manages simulations for concurrent callers.
///
/// Every id-based operation resolves the id through the registry first
/// (`NotFound`), then runs the simulation-level operation under that
/// simulation's lock (`Conflict` on illegal transitions). Errors are passed
/// through unchanged and nothing is retried.
pub struct SimulationManager {
    registry: Arc<SimulationRegistry>,
    runner: Arc<dyn ExternalRunner>,
    simulations_root: PathBuf,
}

impl SimulationManager {
    /// Create a manager with an empty registry.
    pub fn new(simulations_root: impl Into<PathBuf>, runner: Arc<dyn ExternalRunner>) -> Self {
        Self::with_registry(Arc::new(SimulationRegistry::new()), simulations_root, runner)
    }

    /// Create a manager over an existing registry.
    pub fn with_registry(
        registry: Arc<SimulationRegistry>,
        simulations_root: impl Into<PathBuf>,
        runner: Arc<dyn ExternalRunner>,
    ) -> Self {
        Self {
            registry,
            runner,
            simulations_root: simulations_root.into(),
        }
    }

    /// The registry backing this manager.
    pub fn registry(&self) -> &Arc<SimulationRegistry> {
        &self.registry
    }

    /// Directory holding every simulation's working directory.
    pub fn simulations_root(&self) -> &Path {
        &self.simulations_root
    }

    /// Create a new simulation and return its id.
    pub async fn create_simulation(&self, parameters: SimulationParameters) -> Result<Uuid> {
        let simulation =
            Simulation::create(&self.simulations_root, parameters, self.runner.as_ref()).await?;
        Ok(self.registry.insert(simulation).await)
    }

    /// Id, parameters, and current state of one simulation.
    pub async fn get_simulation(&self, id: Uuid) -> Result<SimulationInfo> {
        let shared = self.lookup(id).await?;
        let mut simulation = shared.lock().await;
        simulation.ensure_present()?;
        Ok(simulation.info())
    }

    /// Start the external runner of a simulation.
    pub async fn run_simulation(&self, id: Uuid) -> Result<()> {
        let shared = self.lookup(id).await?;
        let mut simulation = shared.lock().await;
        simulation.run(self.runner.as_ref()).await
    }

    /// Force-terminate a running simulation.
    pub async fn stop_simulation(&self, id: Uuid) -> Result<()> {
        let shared = self.lookup(id).await?;
        let mut simulation = shared.lock().await;
        simulation.stop()
    }

    /// Delete a simulation and all of its files.
    pub async fn delete_simulation(&self, id: Uuid) -> Result<()> {
        let shared = self.lookup(id).await?;
        let mut simulation = shared.lock().await;
        simulation.delete().await?;
        // Still under the simulation lock, so nobody observes a deleted
        // simulation through the registry.
        self.registry.remove(id).await?;
        Ok(())
    }

    /// Current state, advanced if the runner finished since the last read.
    pub async fn get_simulation_state(&self, id: Uuid) -> Result<SimulationState> {
        let shared = self.lookup(id).await?;
        let mut simulation = shared.lock().await;
        simulation.ensure_present()?;
        Ok(simulation.state())
    }

    /// Path of the output bundle, `None` until the simulation completed.
    pub async fn get_simulation_output_path(&self, id: Uuid) -> Result<Option<PathBuf>> {
        let shared = self.lookup(id).await?;
        let mut simulation = shared.lock().await;
        simulation.ensure_present()?;
        Ok(simulation.output_path())
    }

    /// Request a target state: `RUNNING` runs, `STOPPED` stops.
    ///
    /// Any other target is rejected before the simulation is looked up.
    pub async fn update_simulation(
        &self,
        id: Uuid,
        target: SimulationState,
    ) -> Result<SimulationState> {
        if !target.is_requestable() {
            tracing::warn!(simulation_id = %id, state = %target, "Unsupported state requested");
            return Err(SimulationError::UnsupportedRequest { state: target });
        }

        if target == SimulationState::Running {
            self.run_simulation(id).await?;
        } else {
            self.stop_simulation(id).await?;
        }
        Ok(target)
    }

    /// Every live simulation with its current state, oldest first.
    pub async fn list_simulations(&self) -> Vec<SimulationInfo> {
        let mut items = Vec::new();
        for shared in self.registry.list().await {
            let mut simulation = shared.lock().await;
            if simulation.is_deleted() {
                continue;
            }
            items.push(simulation.info());
        }
        items.sort_by_key(|info| info.created_at);
        items
    }

    /// Count of simulations per state.
    pub async fn summary(&self) -> SimulationSummary {
        let mut summary = SimulationSummary::default();
        for info in self.list_simulations().await {
            match info.state {
                SimulationState::Created => summary.created += 1,
                SimulationState::Running => summary.running += 1,
                SimulationState::Completed => summary.completed += 1,
                SimulationState::Failed => summary.failed += 1,
                SimulationState::Stopped => summary.stopped += 1,
            }
            summary.total += 1;
        }
        summary
    }

    async fn lookup(&self, id: Uuid) -> Result<SharedSimulation> {
        self.registry.get(id).await
    }
}

/// Summary of all simulations.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SimulationSummary {
    pub total: usize,
    pub created: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub stopped: usize,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::ErrorKind;
    use crate::runner::testing::ScriptedRunner;
    use pretty_assertions::assert_eq;
    use tempfile::{TempDir, tempdir};

    fn manager() -> (TempDir, Arc<ScriptedRunner>, SimulationManager) {
        manager_with(ScriptedRunner::new())
    }

    fn manager_with(runner: ScriptedRunner) -> (TempDir, Arc<ScriptedRunner>, SimulationManager) {
        let dir = tempdir().unwrap();
        let runner = Arc::new(runner);
        let manager = SimulationManager::new(dir.path(), runner.clone());
        (dir, runner, manager)
    }

    fn params() -> SimulationParameters {
        SimulationParameters::new(serde_json::json!({
            "elements": [
                {"element": "C", "weightPercentage": 0.5},
                {"element": "Cr", "weightPercentage": 5}
            ]
        }))
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found_everywhere() {
        let (_dir, _runner, manager) = manager();
        let id = Uuid::new_v4();

        let kinds = vec![
            manager.get_simulation(id).await.unwrap_err().kind(),
            manager.run_simulation(id).await.unwrap_err().kind(),
            manager.stop_simulation(id).await.unwrap_err().kind(),
            manager.delete_simulation(id).await.unwrap_err().kind(),
            manager.get_simulation_state(id).await.unwrap_err().kind(),
            manager
                .get_simulation_output_path(id)
                .await
                .unwrap_err()
                .kind(),
            manager
                .update_simulation(id, SimulationState::Running)
                .await
                .unwrap_err()
                .kind(),
        ];

        assert!(kinds.iter().all(|k| *k == ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (dir, _runner, manager) = manager();
        let id = manager.create_simulation(params()).await.unwrap();

        let info = manager.get_simulation(id).await.unwrap();
        assert_eq!(info.id, id);
        assert_eq!(info.parameters, params());
        assert_eq!(info.state, SimulationState::Created);
        assert!(dir.path().join(id.to_string()).is_dir());
    }

    #[tokio::test]
    async fn test_run_reports_running_until_runner_exits() {
        let (_dir, runner, manager) = manager();
        let id = manager.create_simulation(params()).await.unwrap();

        manager.run_simulation(id).await.unwrap();
        assert_eq!(
            manager.get_simulation_state(id).await.unwrap(),
            SimulationState::Running
        );
        assert_eq!(manager.get_simulation_output_path(id).await.unwrap(), None);

        runner.last_control().finish(0);
        assert_eq!(
            manager.get_simulation_state(id).await.unwrap(),
            SimulationState::Completed
        );
        assert!(manager.get_simulation_output_path(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_second_run_conflicts() {
        let (_dir, runner, manager) = manager();
        let id = manager.create_simulation(params()).await.unwrap();

        manager.run_simulation(id).await.unwrap();
        let err = manager.run_simulation(id).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(runner.starts(), 1);
    }

    #[tokio::test]
    async fn test_failed_run_has_no_output() {
        let (_dir, runner, manager) = manager();
        let id = manager.create_simulation(params()).await.unwrap();

        manager.run_simulation(id).await.unwrap();
        runner.last_control().finish(1);

        assert_eq!(
            manager.get_simulation_state(id).await.unwrap(),
            SimulationState::Failed
        );
        assert_eq!(manager.get_simulation_output_path(id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_stop() {
        let (_dir, runner, manager) = manager();
        let id = manager.create_simulation(params()).await.unwrap();

        let err = manager.stop_simulation(id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        manager.run_simulation(id).await.unwrap();
        manager.stop_simulation(id).await.unwrap();

        assert!(runner.last_control().was_terminated());
        assert_eq!(
            manager.get_simulation_state(id).await.unwrap(),
            SimulationState::Stopped
        );

        let err = manager.stop_simulation(id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_delete_running_is_refused() {
        let (dir, runner, manager) = manager();
        let id = manager.create_simulation(params()).await.unwrap();
        manager.run_simulation(id).await.unwrap();

        let err = manager.delete_simulation(id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(manager.registry().contains(id).await);
        assert!(dir.path().join(id.to_string()).is_dir());

        runner.last_control().finish(0);
        manager.delete_simulation(id).await.unwrap();

        assert!(!dir.path().join(id.to_string()).exists());
        assert_eq!(
            manager.get_simulation(id).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_delete_in_every_non_running_state() {
        let (dir, runner, manager) = manager();

        let created = manager.create_simulation(params()).await.unwrap();

        let stopped = manager.create_simulation(params()).await.unwrap();
        manager.run_simulation(stopped).await.unwrap();
        manager.stop_simulation(stopped).await.unwrap();

        let failed = manager.create_simulation(params()).await.unwrap();
        manager.run_simulation(failed).await.unwrap();
        runner.last_control().finish(7);

        for id in [created, stopped, failed] {
            manager.delete_simulation(id).await.unwrap();
            assert!(!dir.path().join(id.to_string()).exists());
        }
        assert!(manager.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_update_simulation() {
        let (_dir, _runner, manager) = manager();
        let id = manager.create_simulation(params()).await.unwrap();

        let err = manager
            .update_simulation(id, SimulationState::Completed)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedRequest);
        assert_eq!(
            manager.get_simulation_state(id).await.unwrap(),
            SimulationState::Created
        );

        assert_eq!(
            manager
                .update_simulation(id, SimulationState::Running)
                .await
                .unwrap(),
            SimulationState::Running
        );
        assert_eq!(
            manager
                .update_simulation(id, SimulationState::Stopped)
                .await
                .unwrap(),
            SimulationState::Stopped
        );
    }

    #[tokio::test]
    async fn test_list_reflects_live_simulations() {
        let (_dir, runner, manager) = manager();
        assert!(manager.list_simulations().await.is_empty());

        let a = manager.create_simulation(params()).await.unwrap();
        let b = manager.create_simulation(params()).await.unwrap();
        let c = manager.create_simulation(params()).await.unwrap();

        manager.run_simulation(b).await.unwrap();
        runner.last_control().finish(0);
        manager.delete_simulation(c).await.unwrap();

        let items = manager.list_simulations().await;
        let mut states: Vec<_> = items.iter().map(|i| (i.id, i.state)).collect();
        states.sort_by_key(|(id, _)| *id);
        let mut expected = vec![
            (a, SimulationState::Created),
            (b, SimulationState::Completed),
        ];
        expected.sort_by_key(|(id, _)| *id);
        assert_eq!(states, expected);

        let summary = manager.summary().await;
        assert_eq!(
            summary,
            SimulationSummary {
                total: 2,
                created: 1,
                completed: 1,
                ..Default::default()
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_runs_start_exactly_one_runner() {
        let (_dir, runner, manager) =
            manager_with(ScriptedRunner::new().with_start_delay(Duration::from_millis(20)));
        let manager = Arc::new(manager);
        let id = manager.create_simulation(params()).await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            tasks.push(tokio::spawn(
                async move { manager.run_simulation(id).await },
            ));
        }

        let mut ok = 0;
        let mut conflicts = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(()) => ok += 1,
                Err(e) if e.kind() == ErrorKind::Conflict => conflicts += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }

        assert_eq!(ok, 1);
        assert_eq!(conflicts, 7);
        assert_eq!(runner.starts(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_deletes_remove_once() {
        let (_dir, _runner, manager) = manager();
        let manager = Arc::new(manager);
        let id = manager.create_simulation(params()).await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let manager = manager.clone();
            tasks.push(tokio::spawn(
                async move { manager.delete_simulation(id).await },
            ));
        }

        let mut ok = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(()) => ok += 1,
                Err(e) => assert_eq!(e.kind(), ErrorKind::NotFound),
            }
        }
        assert_eq!(ok, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_stop_racing_exit_never_completes_a_stopped_simulation() {
        let (_dir, runner, manager) = manager();
        let manager = Arc::new(manager);

        for _ in 0..50 {
            let id = manager.create_simulation(params()).await.unwrap();
            manager.run_simulation(id).await.unwrap();
            let control = runner.last_control();

            let stopper = {
                let manager = manager.clone();
                tokio::spawn(async move { manager.stop_simulation(id).await })
            };
            let reader = {
                let manager = manager.clone();
                tokio::spawn(async move {
                    control.finish(0);
                    manager.get_simulation_state(id).await
                })
            };

            let stopped = stopper.await.unwrap();
            reader.await.unwrap().unwrap();
            let state = manager.get_simulation_state(id).await.unwrap();

            match stopped {
                Ok(()) => assert_eq!(state, SimulationState::Stopped),
                Err(e) => {
                    assert_eq!(e.kind(), ErrorKind::Conflict);
                    assert_eq!(state, SimulationState::Completed);
                }
            }
            // Later reads never move a settled simulation.
            assert_eq!(manager.get_simulation_state(id).await.unwrap(), state);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_run_racing_delete_leaves_consistent_simulation() {
        let (dir, runner, manager) =
            manager_with(ScriptedRunner::new().with_start_delay(Duration::from_millis(2)));
        let manager = Arc::new(manager);

        for _ in 0..50 {
            let id = manager.create_simulation(params()).await.unwrap();
            let working_dir = dir.path().join(id.to_string());

            let run = {
                let manager = manager.clone();
                tokio::spawn(async move { manager.run_simulation(id).await })
            };
            let delete = {
                let manager = manager.clone();
                tokio::spawn(async move { manager.delete_simulation(id).await })
            };

            let run = run.await.unwrap();
            let delete = delete.await.unwrap();

            match (run, delete) {
                (Ok(()), Err(e)) => {
                    assert_eq!(e.kind(), ErrorKind::Conflict);
                    assert!(working_dir.is_dir());
                    assert_eq!(
                        manager.get_simulation_state(id).await.unwrap(),
                        SimulationState::Running
                    );
                    runner.last_control().finish(0);
                    manager.delete_simulation(id).await.unwrap();
                }
                (Err(e), Ok(())) => {
                    assert_eq!(e.kind(), ErrorKind::NotFound);
                    assert!(!working_dir.exists());
                    assert_eq!(
                        manager.get_simulation(id).await.unwrap_err().kind(),
                        ErrorKind::NotFound
                    );
                }
                (run, delete) => panic!("run: {:?}, delete: {:?}", run, delete),
            }
        }

        assert!(manager.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_start_failure_is_internal() {
        let (_dir, _runner, manager) = manager_with(ScriptedRunner::failing());
        let id = manager.create_simulation(params()).await.unwrap();

        let err = manager.run_simulation(id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(
            manager.get_simulation_state(id).await.unwrap(),
            SimulationState::Created
        );
    }
}
