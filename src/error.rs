//! Error types

use crate::monitor::LifecycleState;
use thiserror::Error;

/// Errors produced by monitor lifecycle operations.
///
/// The ingestion hot path keeps a boolean contract —
/// [`SqlMonitor::submit`](crate::SqlMonitor::submit) reports dropped or
/// rejected events as `false`, never as an error.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// `start` was called while a session is already active.
    #[error("monitor already started (state: {state:?})")]
    AlreadyStarted {
        /// Lifecycle state observed at the time of the call.
        state: LifecycleState,
    },

    /// The background aggregation worker could not be spawned.
    #[error("failed to spawn aggregation worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}
