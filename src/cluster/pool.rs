//! Worker-pool supervisor.
//!
//! Keeps a fixed number of worker processes alive: spawns the pool at
//! startup and, for every worker exit, spawns exactly one replacement after
//! the configured restart delay.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;

use super::launcher::WorkerLauncher;
use super::signals::TerminationReason;
use crate::config::DEFAULT_RESTART_DELAY;
use crate::error::{AppError, Result};

/// Configuration for the worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPoolConfig {
    /// Number of workers to keep alive (0 = one per available CPU).
    pub desired_worker_count: usize,
    /// Wait between a worker exit and its replacement (zero = immediate).
    pub restart_delay: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            desired_worker_count: 0,
            restart_delay: DEFAULT_RESTART_DELAY,
        }
    }
}

impl WorkerPoolConfig {
    /// Effective worker count: the configured value, or host parallelism when 0.
    ///
    /// Never returns zero.
    pub fn resolved_worker_count(&self) -> usize {
        if self.desired_worker_count > 0 {
            self.desired_worker_count
        } else {
            host_parallelism()
        }
    }
}

/// Number of processing units available to this process.
pub fn host_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// A live worker process owned by the supervisor.
///
/// Handles leave the pool when their exit is observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerHandle {
    /// Slot in `0..desired`; a replacement reuses its predecessor's slot.
    pub worker_id: usize,
    /// OS process id.
    pub pid: u32,
    /// Number of times this slot had been filled before this process.
    pub generation: u64,
}

/// A worker exit observed by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitEvent {
    pub worker_id: usize,
    pub pid: u32,
    pub reason: TerminationReason,
}

/// Desired versus actual pool size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Workers the pool is meant to hold.
    pub desired: usize,
    /// Workers currently alive.
    pub alive: usize,
    /// Replacements waiting out the restart delay.
    pub pending_restarts: usize,
    /// Total replacements scheduled since startup.
    pub total_restarts: u64,
}

enum PoolEvent {
    Exited(ExitEvent),
    RestartDue { worker_id: usize },
}

enum Wake {
    Shutdown,
    Event(PoolEvent),
}

/// Primary-side supervisor for a pool of worker processes.
///
/// All handle bookkeeping happens on the task driving [`Supervisor::run`];
/// exit watchers and restart timers only send events back to it.
pub struct Supervisor<L: WorkerLauncher> {
    config: WorkerPoolConfig,
    launcher: L,
    workers: HashMap<u32, WorkerHandle>,
    generations: HashMap<usize, u64>,
    events_tx: mpsc::UnboundedSender<PoolEvent>,
    events_rx: mpsc::UnboundedReceiver<PoolEvent>,
    started: bool,
    shutting_down: bool,
    pending_restarts: usize,
    total_restarts: u64,
}

impl<L: WorkerLauncher> Supervisor<L> {
    pub fn new(config: WorkerPoolConfig, launcher: L) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config,
            launcher,
            workers: HashMap::new(),
            generations: HashMap::new(),
            events_tx,
            events_rx,
            started: false,
            shutting_down: false,
            pending_restarts: 0,
            total_restarts: 0,
        }
    }

    /// Snapshot of desired and live worker counts.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            desired: self.config.resolved_worker_count(),
            alive: self.workers.len(),
            pending_restarts: self.pending_restarts,
            total_restarts: self.total_restarts,
        }
    }

    /// Live worker handles.
    pub fn workers(&self) -> impl Iterator<Item = &WorkerHandle> {
        self.workers.values()
    }

    /// Spawn the initial pool.
    ///
    /// May be called once; a second call fails with [`AppError::AlreadyStarted`].
    /// A spawn failure is returned as-is and is fatal to the caller.
    /// Must run inside a Tokio runtime.
    pub fn spawn_initial_workers(&mut self) -> Result<usize> {
        if self.started {
            return Err(AppError::AlreadyStarted);
        }
        self.started = true;

        let count = self.config.resolved_worker_count();
        tracing::info!(
            pid = std::process::id(),
            workers = count,
            restart_delay_ms = self.config.restart_delay.as_millis() as u64,
            "Primary running, spawning workers"
        );

        for worker_id in 0..count {
            self.launch(worker_id)?;
        }
        Ok(count)
    }

    /// Apply the replace-on-exit policy to one exit event.
    ///
    /// Every exit schedules exactly one replacement for the same slot,
    /// whatever the exit code or signal. Nothing is scheduled once shutdown
    /// has begun. Returns the handle retired from the pool, if the pid was
    /// still tracked.
    pub fn on_worker_exit(&mut self, event: ExitEvent) -> Option<WorkerHandle> {
        let retired = self.workers.remove(&event.pid);
        let generation = retired.as_ref().map(|handle| handle.generation);

        if self.shutting_down {
            tracing::info!(
                pid = event.pid,
                worker_id = event.worker_id,
                generation,
                reason = %event.reason,
                clean = event.reason.is_success(),
                remaining = self.workers.len(),
                "Worker stopped"
            );
            return retired;
        }

        self.pending_restarts += 1;
        self.total_restarts += 1;
        let delay = self.config.restart_delay;

        tracing::warn!(
            pid = event.pid,
            worker_id = event.worker_id,
            generation,
            code = ?event.reason.code(),
            signal = ?event.reason.signal().map(|s| s.as_str()),
            clean = event.reason.is_success(),
            restart_in_ms = delay.as_millis() as u64,
            total_restarts = self.total_restarts,
            "Worker died ({}), restarting",
            event.reason
        );

        let tx = self.events_tx.clone();
        let worker_id = event.worker_id;
        if delay.is_zero() {
            let _ = tx.send(PoolEvent::RestartDue { worker_id });
        } else {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = tx.send(PoolEvent::RestartDue { worker_id });
            });
        }
        retired
    }

    /// Drive the pool until `shutdown` completes and every worker has exited.
    ///
    /// Spawns the initial pool if that has not happened yet. On shutdown,
    /// each live worker receives a termination request and no further
    /// replacements are spawned.
    pub async fn run<F>(mut self, shutdown: F) -> Result<PoolStats>
    where
        F: Future<Output = ()>,
    {
        if !self.started {
            self.spawn_initial_workers()?;
        }

        tokio::pin!(shutdown);

        loop {
            let accepting = !self.shutting_down;
            let wake = tokio::select! {
                _ = &mut shutdown, if accepting => Wake::Shutdown,
                Some(event) = self.events_rx.recv() => Wake::Event(event),
            };

            match wake {
                Wake::Shutdown => self.begin_shutdown(),
                Wake::Event(PoolEvent::Exited(event)) => {
                    self.on_worker_exit(event);
                }
                Wake::Event(PoolEvent::RestartDue { worker_id }) => {
                    self.restart_due(worker_id)?;
                }
            }

            if self.shutting_down && self.workers.is_empty() {
                break;
            }
        }

        tracing::info!(
            total_restarts = self.total_restarts,
            "All workers stopped"
        );
        Ok(self.stats())
    }

    fn restart_due(&mut self, worker_id: usize) -> Result<()> {
        self.pending_restarts = self.pending_restarts.saturating_sub(1);
        if self.shutting_down {
            return Ok(());
        }
        self.launch(worker_id)
    }

    fn begin_shutdown(&mut self) {
        self.shutting_down = true;
        tracing::info!(
            workers = self.workers.len(),
            pending_restarts = self.pending_restarts,
            "Shutdown requested, stopping workers"
        );

        let pids: Vec<u32> = self.workers.keys().copied().collect();
        for pid in pids {
            if let Err(e) = self.launcher.terminate(pid) {
                tracing::debug!(pid, error = %e, "Could not signal worker");
            }
        }
    }

    fn launch(&mut self, worker_id: usize) -> Result<()> {
        let launched = self.launcher.launch(worker_id)?;
        let pid = launched.pid;

        let generation = self.generations.entry(worker_id).or_insert(0);
        let handle = WorkerHandle {
            worker_id,
            pid,
            generation: *generation,
        };
        *generation += 1;

        tracing::info!(
            pid,
            worker_id,
            generation = handle.generation,
            "Worker spawned"
        );
        self.workers.insert(pid, handle);

        let tx = self.events_tx.clone();
        let exit = launched.exit;
        tokio::spawn(async move {
            let reason = exit.await;
            let _ = tx.send(PoolEvent::Exited(ExitEvent {
                worker_id,
                pid,
                reason,
            }));
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::launcher::LaunchedWorker;
    use nix::sys::signal::Signal;
    use std::sync::{Arc, Mutex};
    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;

    #[derive(Default)]
    struct MockState {
        next_pid: u32,
        launched: Vec<(usize, u32)>,
        exits: HashMap<u32, oneshot::Sender<TerminationReason>>,
        terminated: Vec<u32>,
        fail_launches: bool,
    }

    /// In-memory launcher whose "processes" exit when told to.
    #[derive(Clone, Default)]
    struct MockLauncher {
        state: Arc<Mutex<MockState>>,
    }

    impl MockLauncher {
        fn launched(&self) -> Vec<(usize, u32)> {
            self.state.lock().unwrap().launched.clone()
        }

        fn launch_count(&self) -> usize {
            self.state.lock().unwrap().launched.len()
        }

        fn terminated(&self) -> Vec<u32> {
            self.state.lock().unwrap().terminated.clone()
        }

        fn fail_launches(&self) {
            self.state.lock().unwrap().fail_launches = true;
        }

        /// Make the worker with `pid` exit.
        fn exit(&self, pid: u32, reason: TerminationReason) {
            let sender = self.state.lock().unwrap().exits.remove(&pid);
            sender
                .expect("worker is not alive")
                .send(reason)
                .expect("exit watcher dropped");
        }
    }

    impl WorkerLauncher for MockLauncher {
        fn launch(&mut self, worker_id: usize) -> Result<LaunchedWorker> {
            let mut state = self.state.lock().unwrap();
            if state.fail_launches {
                return Err(AppError::Worker("Failed to spawn worker: EAGAIN".into()));
            }
            state.next_pid += 1;
            let pid = 1000 + state.next_pid;
            let (tx, rx) = oneshot::channel();
            state.exits.insert(pid, tx);
            state.launched.push((worker_id, pid));
            Ok(LaunchedWorker {
                pid,
                exit: Box::pin(async move { rx.await.unwrap_or(TerminationReason::Unknown) }),
            })
        }

        fn terminate(&mut self, pid: u32) -> Result<()> {
            let sender = {
                let mut state = self.state.lock().unwrap();
                state.terminated.push(pid);
                state.exits.remove(&pid)
            };
            if let Some(sender) = sender {
                let _ = sender.send(TerminationReason::Signaled(Signal::SIGTERM));
            }
            Ok(())
        }
    }

    fn pool(workers: usize, delay_ms: u64) -> WorkerPoolConfig {
        WorkerPoolConfig {
            desired_worker_count: workers,
            restart_delay: Duration::from_millis(delay_ms),
        }
    }

    /// Start a supervisor on a task; returns the shutdown trigger and join handle.
    fn start(
        config: WorkerPoolConfig,
        launcher: MockLauncher,
    ) -> (oneshot::Sender<()>, JoinHandle<Result<PoolStats>>) {
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let supervisor = Supervisor::new(config, launcher);
        let handle = tokio::spawn(supervisor.run(async move {
            let _ = stop_rx.await;
        }));
        (stop_tx, handle)
    }

    async fn wait_for_launches(launcher: &MockLauncher, count: usize) {
        tokio::time::timeout(Duration::from_secs(30), async {
            while launcher.launch_count() < count {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("timed out waiting for launches");
    }

    #[test]
    fn test_resolved_worker_count() {
        assert_eq!(pool(4, 0).resolved_worker_count(), 4);
        assert_eq!(pool(0, 0).resolved_worker_count(), host_parallelism());
        assert!(pool(0, 0).resolved_worker_count() >= 1);
    }

    #[test]
    fn test_pool_config_default() {
        let config = WorkerPoolConfig::default();
        assert_eq!(config.desired_worker_count, 0);
        assert_eq!(config.restart_delay, Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_spawns_configured_worker_count() {
        let launcher = MockLauncher::default();
        let mut supervisor = Supervisor::new(pool(4, 1000), launcher.clone());
        assert_eq!(launcher.launch_count(), 0);

        let spawned = supervisor.spawn_initial_workers().unwrap();

        assert_eq!(spawned, 4);
        assert_eq!(launcher.launch_count(), 4);
        let ids: Vec<usize> = launcher.launched().iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(
            supervisor.stats(),
            PoolStats {
                desired: 4,
                alive: 4,
                pending_restarts: 0,
                total_restarts: 0,
            }
        );
        assert!(supervisor.workers().all(|w| w.generation == 0));
    }

    #[tokio::test]
    async fn test_zero_workers_uses_host_parallelism() {
        let launcher = MockLauncher::default();
        let mut supervisor = Supervisor::new(pool(0, 1000), launcher.clone());
        let spawned = supervisor.spawn_initial_workers().unwrap();
        assert_eq!(spawned, host_parallelism());
        assert_eq!(launcher.launch_count(), host_parallelism());
    }

    #[tokio::test]
    async fn test_spawn_initial_workers_only_once() {
        let launcher = MockLauncher::default();
        let mut supervisor = Supervisor::new(pool(2, 1000), launcher.clone());
        supervisor.spawn_initial_workers().unwrap();
        let err = supervisor.spawn_initial_workers().unwrap_err();
        assert!(matches!(err, AppError::AlreadyStarted));
        assert_eq!(launcher.launch_count(), 2);
    }

    #[tokio::test]
    async fn test_initial_spawn_failure_is_fatal() {
        let launcher = MockLauncher::default();
        launcher.fail_launches();
        let supervisor = Supervisor::new(pool(2, 1000), launcher.clone());
        let result = supervisor.run(std::future::pending()).await;
        assert!(matches!(result, Err(AppError::Worker(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_is_replaced_once_after_delay() {
        let launcher = MockLauncher::default();
        let (stop, handle) = start(pool(2, 1000), launcher.clone());
        wait_for_launches(&launcher, 2).await;

        let (worker_id, pid) = launcher.launched()[1];
        launcher.exit(pid, TerminationReason::Exited(1));

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(launcher.launch_count(), 2, "replaced before the delay");

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(launcher.launch_count(), 3);
        let (replacement_id, replacement_pid) = launcher.launched()[2];
        assert_eq!(replacement_id, worker_id);
        assert_ne!(replacement_pid, pid);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(launcher.launch_count(), 3, "more than one replacement");

        stop.send(()).unwrap();
        let stats = handle.await.unwrap().unwrap();
        assert_eq!(stats.total_restarts, 1);
        assert_eq!(stats.alive, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_is_unconditional() {
        let launcher = MockLauncher::default();
        let (stop, handle) = start(pool(1, 50), launcher.clone());
        wait_for_launches(&launcher, 1).await;

        let reasons = [
            TerminationReason::Exited(0),
            TerminationReason::Exited(137),
            TerminationReason::Signaled(Signal::SIGKILL),
            TerminationReason::Signaled(Signal::SIGTERM),
        ];
        for (i, reason) in reasons.into_iter().enumerate() {
            let (_, pid) = *launcher.launched().last().unwrap();
            launcher.exit(pid, reason);
            wait_for_launches(&launcher, i + 2).await;
        }

        assert_eq!(launcher.launch_count(), 5);
        assert!(launcher.launched().iter().all(|(id, _)| *id == 0));

        stop.send(()).unwrap();
        let stats = handle.await.unwrap().unwrap();
        assert_eq!(stats.total_restarts, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_exits_are_replaced_independently() {
        let launcher = MockLauncher::default();
        let (stop, handle) = start(pool(3, 1000), launcher.clone());
        wait_for_launches(&launcher, 3).await;

        let launched = launcher.launched();
        launcher.exit(launched[0].1, TerminationReason::Exited(1));
        tokio::time::sleep(Duration::from_millis(300)).await;
        launcher.exit(launched[2].1, TerminationReason::Signaled(Signal::SIGSEGV));

        // First replacement lands at t=1000, second at t=1300.
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert_eq!(launcher.launch_count(), 4);
        assert_eq!(launcher.launched()[3].0, 0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(launcher.launch_count(), 5);
        assert_eq!(launcher.launched()[4].0, 2);

        stop.send(()).unwrap();
        let stats = handle.await.unwrap().unwrap();
        assert_eq!(stats.total_restarts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_restarts_immediately() {
        let launcher = MockLauncher::default();
        let (stop, handle) = start(pool(1, 0), launcher.clone());
        wait_for_launches(&launcher, 1).await;

        let started = tokio::time::Instant::now();
        launcher.exit(launcher.launched()[0].1, TerminationReason::Exited(1));
        wait_for_launches(&launcher, 2).await;
        assert!(started.elapsed() < Duration::from_millis(50));

        stop.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_terminates_workers_without_restarts() {
        let launcher = MockLauncher::default();
        let (stop, handle) = start(pool(3, 1000), launcher.clone());
        wait_for_launches(&launcher, 3).await;

        stop.send(()).unwrap();
        let stats = handle.await.unwrap().unwrap();

        let mut terminated = launcher.terminated();
        terminated.sort_unstable();
        let mut pids: Vec<u32> = launcher.launched().iter().map(|(_, pid)| *pid).collect();
        pids.sort_unstable();
        assert_eq!(terminated, pids);
        assert_eq!(launcher.launch_count(), 3);
        assert_eq!(stats.alive, 0);
        assert_eq!(stats.total_restarts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_restart_dropped_on_shutdown() {
        let launcher = MockLauncher::default();
        let (stop, handle) = start(pool(2, 1000), launcher.clone());
        wait_for_launches(&launcher, 2).await;

        launcher.exit(launcher.launched()[0].1, TerminationReason::Exited(1));
        tokio::time::sleep(Duration::from_millis(100)).await;
        stop.send(()).unwrap();

        let stats = handle.await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(launcher.launch_count(), 2);
        assert_eq!(stats.total_restarts, 1);
        assert_eq!(stats.alive, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replacement_spawn_failure_is_fatal() {
        let launcher = MockLauncher::default();
        let (_stop, handle) = start(pool(1, 10), launcher.clone());
        wait_for_launches(&launcher, 1).await;

        launcher.fail_launches();
        launcher.exit(launcher.launched()[0].1, TerminationReason::Exited(1));

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(AppError::Worker(_))));
    }

    #[tokio::test]
    async fn test_on_worker_exit_tracks_generations() {
        let launcher = MockLauncher::default();
        let mut supervisor = Supervisor::new(pool(1, 0), launcher.clone());
        supervisor.spawn_initial_workers().unwrap();
        let pid = launcher.launched()[0].1;

        let retired = supervisor.on_worker_exit(ExitEvent {
            worker_id: 0,
            pid,
            reason: TerminationReason::Exited(1),
        });
        assert_eq!(
            retired,
            Some(WorkerHandle {
                worker_id: 0,
                pid,
                generation: 0,
            })
        );
        assert_eq!(supervisor.stats().alive, 0);
        assert_eq!(supervisor.stats().pending_restarts, 1);

        supervisor.restart_due(0).unwrap();
        let handle = supervisor.workers().next().unwrap();
        assert_eq!(handle.worker_id, 0);
        assert_eq!(handle.generation, 1);
        assert_ne!(handle.pid, pid);
        assert_eq!(supervisor.stats().pending_restarts, 0);
    }

    #[tokio::test]
    async fn test_exit_of_retired_pid_returns_no_handle() {
        let launcher = MockLauncher::default();
        let mut supervisor = Supervisor::new(pool(1, 0), launcher.clone());
        supervisor.spawn_initial_workers().unwrap();
        let pid = launcher.launched()[0].1;
        let event = ExitEvent {
            worker_id: 0,
            pid,
            reason: TerminationReason::Signaled(Signal::SIGKILL),
        };

        assert!(supervisor.on_worker_exit(event).is_some());
        assert!(supervisor.workers().all(|w| w.pid != pid));
        assert_eq!(supervisor.on_worker_exit(event), None);
    }

    #[tokio::test]
    async fn test_real_processes_are_replaced_until_shutdown() {
        use crate::cluster::ProcessLauncher;

        let launcher = ProcessLauncher::new("sh").args(["-c", "exit 7"]);
        let supervisor = Supervisor::new(pool(1, 50), launcher);
        let stats = supervisor
            .run(tokio::time::sleep(Duration::from_millis(500)))
            .await
            .unwrap();

        assert!(stats.total_restarts >= 2, "{stats:?}");
        assert_eq!(stats.alive, 0);
    }

    #[tokio::test]
    async fn test_real_processes_stop_on_shutdown() {
        use crate::cluster::ProcessLauncher;

        let launcher = ProcessLauncher::new("sleep").arg("60");
        let supervisor = Supervisor::new(pool(2, 1000), launcher);
        let started = std::time::Instant::now();
        let stats = supervisor
            .run(tokio::time::sleep(Duration::from_millis(200)))
            .await
            .unwrap();

        assert_eq!(stats.alive, 0);
        assert_eq!(stats.total_restarts, 0);
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
