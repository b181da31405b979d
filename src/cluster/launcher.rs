//! Worker process launching.
//!
//! The supervisor never creates processes itself; it goes through a
//! [`WorkerLauncher`]. [`ProcessLauncher`] is the production implementation,
//! re-executing the current binary in worker mode.

use std::ffi::OsString;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::process::Command;

use super::role::WORKER_ID_ENV;
use super::signals::TerminationReason;
use crate::error::{AppError, Result};

/// Future resolving once the worker process has exited.
pub type ExitFuture = Pin<Box<dyn Future<Output = TerminationReason> + Send>>;

/// A freshly spawned worker.
pub struct LaunchedWorker {
    /// OS process id.
    pub pid: u32,
    /// Completes with the termination reason when the process exits.
    pub exit: ExitFuture,
}

impl std::fmt::Debug for LaunchedWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaunchedWorker")
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

/// Creates and signals worker processes on behalf of the supervisor.
pub trait WorkerLauncher: Send + 'static {
    /// Spawn the worker for slot `worker_id`.
    fn launch(&mut self, worker_id: usize) -> Result<LaunchedWorker>;

    /// Ask a live worker to shut down gracefully.
    fn terminate(&mut self, pid: u32) -> Result<()>;
}

/// Launches workers as child processes of a fixed command line.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ProcessLauncher {
    /// Launcher running `program` with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Launcher re-executing this binary as `serve --internal-worker`.
    ///
    /// `forwarded` is appended after the worker flag so CLI overrides given to
    /// the primary reach every worker.
    pub fn current_exe<I, S>(forwarded: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let exe = std::env::current_exe()
            .map_err(|e| AppError::Worker(format!("Failed to get current executable: {}", e)))?;
        Ok(Self::new(exe)
            .arg("serve")
            .arg("--internal-worker")
            .args(forwarded))
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl WorkerLauncher for ProcessLauncher {
    fn launch(&mut self, worker_id: usize) -> Result<LaunchedWorker> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .env(WORKER_ID_ENV, worker_id.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let mut child = cmd
            .spawn()
            .map_err(|e| AppError::Worker(format!("Failed to spawn worker: {}", e)))?;

        let pid = child
            .id()
            .ok_or_else(|| AppError::Worker("Spawned worker has no pid".into()))?;

        let exit = Box::pin(async move {
            match child.wait().await {
                Ok(status) => TerminationReason::from_exit_status(status),
                Err(e) => {
                    tracing::warn!(pid, error = %e, "Failed to wait on worker");
                    TerminationReason::Unknown
                }
            }
        });

        Ok(LaunchedWorker { pid, exit })
    }

    fn terminate(&mut self, pid: u32) -> Result<()> {
        let pid = i32::try_from(pid)
            .map_err(|_| AppError::Worker(format!("Invalid worker pid {}", pid)))?;
        signal::kill(Pid::from_raw(pid), Signal::SIGTERM)
            .map_err(|e| AppError::Worker(format!("Failed to send SIGTERM: {}", e)))
    }
}
