//! In-memory runner whose computations are finished by the test.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::runner::error::{Result, RunnerError};
use crate::runner::{DEFAULT_BUNDLE_NAME, ExternalRunner, RunnerHandle};
use crate::simulation::SimulationParameters;

#[derive(Default)]
struct Shared {
    exit: Mutex<Option<i32>>,
    terminated: AtomicBool,
}

/// Test-side control of one scripted computation.
#[derive(Clone)]
pub struct ScriptedControl(Arc<Shared>);

impl ScriptedControl {
    /// Make the computation exit with `code`.
    pub fn finish(&self, code: i32) {
        *self.0.exit.lock().unwrap() = Some(code);
    }

    pub fn was_terminated(&self) -> bool {
        self.0.terminated.load(Ordering::SeqCst)
    }
}

struct ScriptedHandle(Arc<Shared>);

impl RunnerHandle for ScriptedHandle {
    fn is_alive(&self) -> bool {
        self.exit_status().is_none()
    }

    fn exit_status(&self) -> Option<i32> {
        *self.0.exit.lock().unwrap()
    }

    fn terminate(&mut self) {
        // Termination lands "later": the exit code is left for the test to set.
        self.0.terminated.store(true, Ordering::SeqCst);
    }
}

/// Runner that records every start and hands out [`ScriptedControl`]s.
#[derive(Default)]
pub struct ScriptedRunner {
    starts: AtomicUsize,
    controls: Mutex<Vec<ScriptedControl>>,
    start_delay: Option<Duration>,
    fail_start: bool,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep inside `start` to widen race windows.
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = Some(delay);
        self
    }

    /// Make every `start` fail.
    pub fn failing() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn last_control(&self) -> ScriptedControl {
        self.controls.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl ExternalRunner for ScriptedRunner {
    async fn start(
        &self,
        _parameters: &SimulationParameters,
        _working_dir: &Path,
    ) -> Result<Box<dyn RunnerHandle>> {
        if self.fail_start {
            return Err(RunnerError::SpawnFailed {
                program: PathBuf::from("scripted"),
                reason: "configured to fail".to_string(),
            });
        }
        if let Some(delay) = self.start_delay {
            tokio::time::sleep(delay).await;
        }

        self.starts.fetch_add(1, Ordering::SeqCst);
        let shared = Arc::new(Shared::default());
        self.controls
            .lock()
            .unwrap()
            .push(ScriptedControl(shared.clone()));
        Ok(Box::new(ScriptedHandle(shared)))
    }

    fn bundle_path(&self, working_dir: &Path) -> PathBuf {
        working_dir.join(DEFAULT_BUNDLE_NAME)
    }
}
