//! Monitor configuration structures

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default capacity of the rolling and drain caches.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Default capacity of the ingestion queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;

/// Ingestion pressure mode, fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestMode {
    /// Non-blocking hand-off to the background worker; events are discarded
    /// when the queue is full and `submit` reports failure.
    DropOnFull,
    /// `submit` blocks the caller until queue space is available.
    Blocking,
    /// Aggregation happens synchronously on the caller's thread; no queue,
    /// no background worker.
    Inline,
}

/// Configuration for a [`SqlMonitor`](crate::SqlMonitor) session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Ingestion pressure mode.
    pub mode: IngestMode,

    /// Maximum number of entries in each of the two aggregate caches.
    /// Zero means unbounded.
    pub cache_capacity: usize,

    /// Capacity of the ingestion queue used by the async modes.
    /// Zero selects [`DEFAULT_QUEUE_CAPACITY`]; a zero-capacity rendezvous
    /// queue would make drop-on-full mode reject every event.
    pub queue_capacity: usize,

    /// Snapshot file for persisting the rolling cache across sessions.
    /// `None` disables both save and recover.
    pub data_path: Option<PathBuf>,

    /// Record successful executions only; failed events are accepted by
    /// `submit` but contribute nothing.
    pub success_only: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            mode: IngestMode::DropOnFull,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            data_path: None,
            success_only: false,
        }
    }
}

impl MonitorConfig {
    /// Create a builder pre-populated with the defaults.
    pub fn builder() -> MonitorConfigBuilder {
        MonitorConfigBuilder::new()
    }

    pub(crate) fn queue_capacity_or_default(&self) -> usize {
        if self.queue_capacity == 0 {
            DEFAULT_QUEUE_CAPACITY
        } else {
            self.queue_capacity
        }
    }
}

/// Builder for [`MonitorConfig`].
pub struct MonitorConfigBuilder {
    config: MonitorConfig,
}

impl MonitorConfigBuilder {
    /// Create a new monitor config builder.
    pub fn new() -> Self {
        Self {
            config: MonitorConfig::default(),
        }
    }

    /// Set the ingestion mode.
    pub fn mode(mut self, mode: IngestMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Set the cache capacity (0 = unbounded).
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    /// Set the ingestion queue capacity (0 = default).
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Set the snapshot file path.
    pub fn data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_path = Some(path.into());
        self
    }

    /// Record successful executions only.
    pub fn success_only(mut self, success_only: bool) -> Self {
        self.config.success_only = success_only;
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> MonitorConfig {
        self.config
    }
}

impl Default for MonitorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
