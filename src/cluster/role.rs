//! Process role in the primary/worker topology.

/// Environment variable carrying a worker's slot id, set by the primary.
pub const WORKER_ID_ENV: &str = "WEATHER_CLUSTER_WORKER_ID";

/// Role of the current OS process.
///
/// Determined once at startup and passed by value to whichever code path
/// runs next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessRole {
    /// Spawns and supervises workers.
    Primary,
    /// Runs the HTTP entry point.
    Worker,
}

impl ProcessRole {
    /// Determine the role from the hidden `--internal-worker` flag.
    pub fn detect(internal_worker: bool) -> Self {
        if internal_worker {
            Self::Worker
        } else {
            Self::Primary
        }
    }

    pub fn is_primary(self) -> bool {
        self == Self::Primary
    }
}

impl std::fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Worker => write!(f, "worker"),
        }
    }
}

/// Slot id assigned by the primary, if this process is a spawned worker.
pub fn worker_id_from_env() -> Option<usize> {
    std::env::var(WORKER_ID_ENV).ok()?.parse().ok()
}
