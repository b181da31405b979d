//! Primary/worker process topology.
//!
//! The primary process spawns a pool of worker processes and replaces any
//! worker that exits. Every worker runs the HTTP entry point and binds the
//! same port; the kernel spreads incoming connections across them.
//!
//! # Architecture
//!
//! ```text
//!                     ┌─────────────────┐
//!                     │     Primary     │
//!                     │  (Supervisor)   │
//!                     └────────┬────────┘
//!                              │ spawn / replace on exit
//!               ┌──────────────┼──────────────┐
//!               │              │              │
//!         ┌─────▼─────┐  ┌─────▼─────┐  ┌─────▼─────┐
//!         │ Worker 0  │  │ Worker 1  │  │ Worker N  │
//!         │ HTTP :5000│  │ HTTP :5000│  │ HTTP :5000│
//!         └───────────┘  └───────────┘  └───────────┘
//! ```
//!
//! Restarts are unconditional: no exit-code inspection, no backoff, no cap.
//! A worker that crashes on startup is restarted forever, once per restart
//! delay.

mod launcher;
mod pool;
mod role;
mod signals;

pub use launcher::{ExitFuture, LaunchedWorker, ProcessLauncher, WorkerLauncher};
pub use pool::{
    ExitEvent, PoolStats, Supervisor, WorkerHandle, WorkerPoolConfig, host_parallelism,
};
pub use role::{ProcessRole, WORKER_ID_ENV, worker_id_from_env};
pub use signals::TerminationReason;

use crate::error::Result;
use crate::shutdown::shutdown_signal;

/// Run the entry point of a worker process exactly once.
pub fn run_worker_entry_point<R>(entry: impl FnOnce() -> R) -> R {
    tracing::debug!(
        pid = std::process::id(),
        worker_id = ?worker_id_from_env(),
        "Running worker entry point"
    );
    entry()
}

/// Bootstrap the current process according to its role.
///
/// A primary builds the launcher, supervises the pool until SIGTERM/SIGINT,
/// and returns once every worker has exited. A worker runs `entry` once and
/// never touches the launcher.
pub fn initialize<L, M, E>(
    role: ProcessRole,
    config: WorkerPoolConfig,
    make_launcher: M,
    entry: E,
) -> Result<()>
where
    L: WorkerLauncher,
    M: FnOnce() -> Result<L>,
    E: FnOnce() -> Result<()>,
{
    match role {
        ProcessRole::Primary => {
            let launcher = make_launcher()?;
            let runtime = tokio::runtime::Runtime::new()?;
            let stats = runtime.block_on(async move {
                let supervisor = Supervisor::new(config, launcher);
                supervisor
                    .run(async {
                        let signal = shutdown_signal().await;
                        tracing::info!(signal, "Primary received shutdown signal");
                    })
                    .await
            })?;
            tracing::info!(
                desired = stats.desired,
                total_restarts = stats.total_restarts,
                "Primary exiting"
            );
            Ok(())
        }
        ProcessRole::Worker => run_worker_entry_point(entry),
    }
}
