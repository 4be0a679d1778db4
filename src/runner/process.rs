//! External runner that launches the simulation program as a child process.
//!
//! Each started process gets a small supervisor task. The task reaps the
//! child, packages the artifacts of a successful run, and publishes the final
//! exit status through a watch channel that the [`ProcessHandle`] reads
//! without blocking.
//!
//! ```text
//!   start() ──spawn──▶ child ──────────────┐
//!                                          ▼
//!   ProcessHandle ◀── watch<Option<i32>> ── supervisor ── exit 0 ──▶ bundle_artifacts()
//!        │                                  ▲
//!        └── terminate() ── oneshot ────────┘ (kill)
//! ```

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, watch};

use crate::runner::bundle::{DEFAULT_BUNDLE_NAME, PARAMETERS_FILE, RUNNER_LOG_FILE, bundle_artifacts};
use crate::runner::error::{Result, RunnerError};
use crate::runner::{ExternalRunner, RunnerHandle};
use crate::simulation::SimulationParameters;

/// Exit status reported for a process that died without an exit code
/// (killed by a signal, or lost by its supervisor).
pub const KILLED_EXIT_CODE: i32 = -1;

/// Exit status reported when the program succeeded but its artifacts could
/// not be bundled.
pub const BUNDLE_FAILED_EXIT_CODE: i32 = -2;

/// Runs a configured program inside the simulation's working directory.
///
/// The program receives:
/// - `SIMFORGE_PARAMETERS`: path of the JSON parameters file
/// - `SIMFORGE_OUTPUT_DIR`: the working directory
///
/// stdout and stderr go to `runner.log` in the working directory.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
    args: Vec<String>,
    bundle_name: String,
}

impl ProcessRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            bundle_name: DEFAULT_BUNDLE_NAME.to_string(),
        }
    }

    /// Extra arguments passed to the program.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// File name of the output archive inside the working directory.
    pub fn with_bundle_name(mut self, name: impl Into<String>) -> Self {
        self.bundle_name = name.into();
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Relative program paths with a directory part are resolved against our
    /// own cwd, not the child's.
    fn resolved_program(&self) -> std::io::Result<PathBuf> {
        if self.program.components().count() > 1 && self.program.is_relative() {
            std::path::absolute(&self.program)
        } else {
            Ok(self.program.clone())
        }
    }
}

#[async_trait]
impl ExternalRunner for ProcessRunner {
    async fn start(
        &self,
        parameters: &SimulationParameters,
        working_dir: &Path,
    ) -> Result<Box<dyn RunnerHandle>> {
        let working_dir = std::path::absolute(working_dir)?;
        let program = self.resolved_program()?;

        let parameters_path = working_dir.join(PARAMETERS_FILE);
        tokio::fs::write(&parameters_path, serde_json::to_vec_pretty(parameters)?).await?;

        let stdout_log = tokio::fs::File::create(working_dir.join(RUNNER_LOG_FILE))
            .await?
            .into_std()
            .await;
        let stderr_log = stdout_log.try_clone()?;

        let mut cmd = Command::new(&program);
        cmd.args(&self.args)
            .current_dir(&working_dir)
            .env("SIMFORGE_PARAMETERS", &parameters_path)
            .env("SIMFORGE_OUTPUT_DIR", &working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_log))
            .stderr(Stdio::from(stderr_log));

        let child = cmd.spawn().map_err(|e| RunnerError::SpawnFailed {
            program: program.clone(),
            reason: e.to_string(),
        })?;

        tracing::debug!(
            program = %program.display(),
            pid = ?child.id(),
            working_dir = %working_dir.display(),
            "Spawned external runner"
        );

        let bundle_path = self.bundle_path(&working_dir);
        Ok(Box::new(ProcessHandle::supervise(
            child,
            working_dir,
            bundle_path,
        )))
    }

    fn bundle_path(&self, working_dir: &Path) -> PathBuf {
        working_dir.join(&self.bundle_name)
    }
}

/// Handle to a supervised child process.
///
/// Dropping the handle while the process is alive kills the process.
pub struct ProcessHandle {
    status: watch::Receiver<Option<i32>>,
    kill: Option<oneshot::Sender<()>>,
}

impl ProcessHandle {
    fn supervise(child: Child, working_dir: PathBuf, bundle_path: PathBuf) -> Self {
        let pid = child.id();
        let (status_tx, status_rx) = watch::channel(None);
        let (kill_tx, mut kill_rx) = oneshot::channel();

        tokio::spawn(async move {
            let code = wait_for_exit(child, &mut kill_rx).await;
            let code = finish(code, &mut kill_rx, &working_dir, &bundle_path).await;
            tracing::debug!(pid = ?pid, exit_code = code, "External runner finished");
            status_tx.send_replace(Some(code));
        });

        Self {
            status: status_rx,
            kill: Some(kill_tx),
        }
    }
}

impl RunnerHandle for ProcessHandle {
    fn is_alive(&self) -> bool {
        self.exit_status().is_none()
    }

    fn exit_status(&self) -> Option<i32> {
        // Closed first: the sender only closes after the final publish.
        let closed = self.status.has_changed().is_err();
        let status = *self.status.borrow();
        // A supervisor that went away without publishing lost the process.
        status.or(closed.then_some(KILLED_EXIT_CODE))
    }

    fn terminate(&mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }
}

async fn wait_for_exit(mut child: Child, kill_rx: &mut oneshot::Receiver<()>) -> i32 {
    tokio::select! {
        status = child.wait() => match status {
            Ok(status) => status.code().unwrap_or(KILLED_EXIT_CODE),
            Err(e) => {
                tracing::warn!("Failed to wait for external runner: {}", e);
                KILLED_EXIT_CODE
            }
        },
        // Fires on terminate() and when the handle is dropped.
        _ = kill_rx => {
            if let Err(e) = child.kill().await {
                tracing::warn!("Failed to kill external runner: {}", e);
            }
            KILLED_EXIT_CODE
        }
    }
}

/// Final status of a reaped process, bundling the artifacts of a clean exit.
///
/// A clean exit that raced a stop (or a dropped handle) is reported as killed
/// and left unbundled. Once bundling has begun it runs to completion.
async fn finish(
    code: i32,
    kill_rx: &mut oneshot::Receiver<()>,
    working_dir: &Path,
    bundle_path: &Path,
) -> i32 {
    if code != 0 {
        return code;
    }
    match kill_rx.try_recv() {
        Err(oneshot::error::TryRecvError::Empty) => {
            package(working_dir.to_path_buf(), bundle_path.to_path_buf()).await
        }
        _ => {
            tracing::debug!("External runner stopped before bundling");
            KILLED_EXIT_CODE
        }
    }
}

async fn package(working_dir: PathBuf, bundle_path: PathBuf) -> i32 {
    let result =
        tokio::task::spawn_blocking(move || bundle_artifacts(&working_dir, &bundle_path)).await;

    match result {
        Ok(Ok(_)) => 0,
        Ok(Err(e)) => {
            tracing::error!("Failed to bundle simulation output: {}", e);
            BUNDLE_FAILED_EXIT_CODE
        }
        Err(e) => {
            tracing::error!("Bundling task panicked: {}", e);
            BUNDLE_FAILED_EXIT_CODE
        }
    }
}
