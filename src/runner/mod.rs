//! External runner abstraction.
//!
//! A simulation never touches an OS process directly. It asks an
//! [`ExternalRunner`] to start a computation inside its working directory and
//! keeps the returned [`RunnerHandle`] for as long as the computation may be
//! alive.
//!
//! ```text
//!   Simulation::run ──start(params, workdir)──▶ ExternalRunner
//!         │                                          │
//!         ◀──────────── Box<dyn RunnerHandle> ───────┘
//!         │
//!         ├── is_alive()     non-blocking
//!         ├── exit_status()  Some(code) once dead, 0 = success
//!         └── terminate()    best-effort, fire-and-forget
//! ```

mod bundle;
mod error;
mod process;
#[cfg(test)]
pub(crate) mod testing;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::simulation::SimulationParameters;

pub use bundle::{DEFAULT_BUNDLE_NAME, PARAMETERS_FILE, RUNNER_LOG_FILE, bundle_artifacts};
pub use error::{Result, RunnerError};
pub use process::{BUNDLE_FAILED_EXIT_CODE, KILLED_EXIT_CODE, ProcessHandle, ProcessRunner};

/// Launches external computations.
#[async_trait]
pub trait ExternalRunner: Send + Sync {
    /// Start a computation for `parameters` inside `working_dir`.
    ///
    /// Must return as soon as the computation is spawned.
    async fn start(
        &self,
        parameters: &SimulationParameters,
        working_dir: &Path,
    ) -> Result<Box<dyn RunnerHandle>>;

    /// Where a successful run leaves its output bundle.
    fn bundle_path(&self, working_dir: &Path) -> PathBuf;
}

/// Job-owned reference to one running computation.
pub trait RunnerHandle: Send + Sync {
    /// Non-blocking liveness check.
    fn is_alive(&self) -> bool;

    /// Exit status, defined once [`RunnerHandle::is_alive`] returns false.
    fn exit_status(&self) -> Option<i32>;

    /// Request forceful termination. Does not wait for the computation to exit.
    fn terminate(&mut self);
}
