//! Monitor lifecycle and ingestion pipeline

use crate::aggregate::Aggregator;
use crate::config::{IngestMode, MonitorConfig, DEFAULT_QUEUE_CAPACITY};
use crate::error::MonitorError;
use crate::event::QueryEvent;
use crate::fingerprint::{DefaultFingerprinter, Fingerprinter};
use crate::persist;
use crate::stats::StatsReport;
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifecycle state of a monitor session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    /// Never started.
    Uninitialized = 0,
    /// `start` has allocated the session; the worker (if any) has not yet
    /// begun pulling events.
    Initialized = 1,
    /// Steady-state ingestion.
    Running = 2,
    /// `stop` has closed the queue; buffered events are being flushed.
    Draining = 3,
    /// Session fully torn down; `start` is legal again.
    Stopped = 4,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => LifecycleState::Initialized,
            2 => LifecycleState::Running,
            3 => LifecycleState::Draining,
            4 => LifecycleState::Stopped,
            _ => LifecycleState::Uninitialized,
        }
    }
}

struct Queue {
    tx: Sender<QueryEvent>,
    rx: Receiver<QueryEvent>,
}

/// State shared between the monitor handle and the worker thread.
struct MonitorShared {
    state: AtomicU8,
    mode: RwLock<IngestMode>,
    success_only: AtomicBool,
    queue: RwLock<Option<Queue>>,
    data_path: RwLock<Option<PathBuf>>,
    aggregator: Aggregator,
}

impl MonitorShared {
    fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: LifecycleState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// In-process aggregator of per-query-shape execution statistics.
///
/// A monitor session is bounded by [`start`](Self::start) and
/// [`stop`](Self::stop). Between the two, producer threads hand events to
/// [`submit`](Self::submit) under the configured pressure mode, and
/// consumers read the rolling view with [`query_stats`](Self::query_stats)
/// or collect delta batches with
/// [`reset_query_stats`](Self::reset_query_stats).
pub struct SqlMonitor {
    shared: Arc<MonitorShared>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl SqlMonitor {
    /// Create a monitor using the built-in
    /// [`DefaultFingerprinter`](crate::DefaultFingerprinter).
    pub fn new() -> Self {
        Self::with_fingerprinter(Box::new(DefaultFingerprinter))
    }

    /// Create a monitor with an injected fingerprint implementation.
    pub fn with_fingerprinter(fingerprinter: Box<dyn Fingerprinter>) -> Self {
        Self {
            shared: Arc::new(MonitorShared {
                state: AtomicU8::new(LifecycleState::Uninitialized as u8),
                mode: RwLock::new(IngestMode::DropOnFull),
                success_only: AtomicBool::new(false),
                queue: RwLock::new(None),
                data_path: RwLock::new(None),
                aggregator: Aggregator::new(fingerprinter, 0),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.shared.state()
    }

    /// Begin a session: size the caches, recover the snapshot into the
    /// rolling cache, and spawn the background worker for the async modes.
    ///
    /// Legal from [`Uninitialized`](LifecycleState::Uninitialized) and
    /// [`Stopped`](LifecycleState::Stopped); any other state is
    /// [`MonitorError::AlreadyStarted`].
    pub fn start(&self, config: MonitorConfig) -> Result<(), MonitorError> {
        match self.shared.state() {
            LifecycleState::Uninitialized | LifecycleState::Stopped => {}
            state => return Err(MonitorError::AlreadyStarted { state }),
        }
        self.shared.set_state(LifecycleState::Initialized);

        *self.shared.mode.write() = config.mode;
        self.shared
            .success_only
            .store(config.success_only, Ordering::Relaxed);
        self.shared.aggregator.set_capacity(config.cache_capacity);
        *self.shared.data_path.write() = config.data_path.clone();

        if let Some(path) = config.data_path.as_deref() {
            self.recover_snapshot(path);
        }

        match config.mode {
            IngestMode::Inline => {
                *self.shared.queue.write() = None;
                self.shared.set_state(LifecycleState::Running);
            }
            IngestMode::DropOnFull | IngestMode::Blocking => {
                let (tx, rx) = bounded(config.queue_capacity_or_default());
                *self.shared.queue.write() = Some(Queue { tx, rx });

                let shared = Arc::clone(&self.shared);
                let handle = match thread::Builder::new()
                    .name("sqlstats-worker".to_string())
                    .spawn(move || worker_loop(shared))
                {
                    Ok(handle) => handle,
                    Err(err) => {
                        *self.shared.queue.write() = None;
                        self.shared.set_state(LifecycleState::Stopped);
                        return Err(MonitorError::WorkerSpawn(err));
                    }
                };
                *self.worker.lock() = Some(handle);
            }
        }

        info!(
            "sql monitor started (mode: {:?}, cache capacity: {}, queue capacity: {})",
            config.mode, config.cache_capacity, config.queue_capacity
        );
        Ok(())
    }

    /// End the session: close the queue, wait for the worker to flush the
    /// buffered events and exit, persist the rolling cache, and clear both
    /// caches. No-op unless the monitor is started.
    pub fn stop(&self) {
        match self.shared.state() {
            LifecycleState::Initialized | LifecycleState::Running => {}
            _ => return,
        }
        self.shared.set_state(LifecycleState::Draining);

        // Dropping the sender closes the queue: blocked and future submits
        // observe the disconnect, the worker drains what is buffered.
        drop(self.shared.queue.write().take());

        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                warn!("aggregation worker panicked during drain");
            }
        }
        self.shared.set_state(LifecycleState::Stopped);

        self.save_snapshot();
        self.shared.aggregator.clear();
        info!("sql monitor stopped");
    }

    /// Hand one event to the aggregation engine under the session's
    /// pressure mode.
    ///
    /// Returns `false` when the event was not recorded: the monitor is not
    /// started, the queue is full (drop-on-full mode), or the queue has been
    /// closed by shutdown. A failed event filtered out by the success-only
    /// setting reports `true` without recording anything.
    pub fn submit(&self, event: QueryEvent) -> bool {
        if self.shared.success_only.load(Ordering::Relaxed) && !event.success {
            return true;
        }
        match self.shared.state() {
            LifecycleState::Initialized | LifecycleState::Running => {}
            _ => return false,
        }

        let mode = *self.shared.mode.read();
        match mode {
            IngestMode::Inline => {
                self.shared.aggregator.statistics(&event);
                true
            }
            IngestMode::DropOnFull => {
                let Some(tx) = self.sender() else {
                    return false;
                };
                match tx.try_send(event) {
                    Ok(()) => true,
                    Err(TrySendError::Full(_)) => {
                        debug!("event dropped: ingestion queue full");
                        false
                    }
                    Err(TrySendError::Disconnected(_)) => false,
                }
            }
            IngestMode::Blocking => {
                let Some(tx) = self.sender() else {
                    return false;
                };
                tx.send(event).is_ok()
            }
        }
    }

    /// Up to `limit` rows from the rolling cache (0 = all remaining),
    /// starting `offset` entries from the most-recent end, most-recent
    /// first. Non-destructive; empty before `start` and after `stop`.
    pub fn query_stats(&self, limit: usize, offset: usize) -> StatsReport {
        let rolling = self.shared.aggregator.rolling();
        let limit = if limit == 0 { rolling.len() } else { limit };
        StatsReport::from_records(rolling.list_range(limit, offset))
    }

    /// Remove up to `limit` oldest entries from the drain cache (0 = drain
    /// everything currently present) and return them in removal order. A
    /// second call with no intervening events yields zero rows.
    pub fn reset_query_stats(&self, limit: usize) -> StatsReport {
        let drain = self.shared.aggregator.drain();
        let limit = if limit == 0 { drain.len() } else { limit };

        let mut records = Vec::new();
        for _ in 0..limit {
            match drain.remove_oldest() {
                Some((_, stats)) => records.push(stats),
                None => break,
            }
        }
        StatsReport::from_records(records)
    }

    /// Toggle the success-only filter for subsequent submissions.
    pub fn set_success_only(&self, success_only: bool) {
        self.shared.success_only.store(success_only, Ordering::Relaxed);
    }

    /// Resize both caches (0 = unbounded), evicting excess oldest entries
    /// immediately.
    pub fn set_cache_capacity(&self, capacity: usize) {
        self.shared.aggregator.set_capacity(capacity);
    }

    /// Replace the ingestion queue with one of the given capacity
    /// (0 = default). Events buffered in the old queue may be lost, so this
    /// belongs between workloads, not during steady ingestion. No-op for
    /// inline mode and outside a session.
    pub fn set_queue_capacity(&self, capacity: usize) {
        let capacity = if capacity == 0 {
            DEFAULT_QUEUE_CAPACITY
        } else {
            capacity
        };
        let mut slot = self.shared.queue.write();
        if slot.is_none() {
            return;
        }
        let (tx, rx) = bounded(capacity);
        *slot = Some(Queue { tx, rx });
        debug!("ingestion queue replaced (capacity: {})", capacity);
    }

    /// Retarget the snapshot file used by the next save or recover.
    /// `None` disables persistence.
    pub fn set_data_path(&self, path: Option<PathBuf>) {
        *self.shared.data_path.write() = path;
    }

    fn sender(&self) -> Option<Sender<QueryEvent>> {
        // Clone out of the lock so a blocking send never holds it.
        self.shared.queue.read().as_ref().map(|q| q.tx.clone())
    }

    /// Best effort: a missing or unreadable snapshot never prevents the
    /// monitor from starting.
    fn recover_snapshot(&self, path: &Path) {
        match persist::load_records(path) {
            Ok(records) => {
                let count = records.len();
                let rolling = self.shared.aggregator.rolling();
                for stats in records {
                    rolling.put(stats.cache_key(), stats);
                }
                if count > 0 {
                    info!("recovered {} records from {}", count, path.display());
                }
            }
            Err(err) => debug!("no snapshot recovered from {}: {}", path.display(), err),
        }
    }

    fn save_snapshot(&self) {
        let Some(path) = self.shared.data_path.read().clone() else {
            return;
        };
        let rolling = self.shared.aggregator.rolling();
        let records = rolling.list_range(rolling.len(), 0);
        match persist::save_records(&path, &records) {
            Ok(()) => debug!("saved {} records to {}", records.len(), path.display()),
            Err(err) => debug!("failed to save snapshot to {}: {}", path.display(), err),
        }
    }
}

impl Default for SqlMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SqlMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Single background worker: pulls events until the queue is closed and a
/// drain has been requested.
fn worker_loop(shared: Arc<MonitorShared>) {
    // A stop may already have begun before this thread was scheduled; do not
    // clobber Draining.
    let _ = shared.state.compare_exchange(
        LifecycleState::Initialized as u8,
        LifecycleState::Running as u8,
        Ordering::AcqRel,
        Ordering::Acquire,
    );
    debug!("aggregation worker started");

    loop {
        // Re-read the queue slot each pass so a capacity swap is picked up.
        let rx = shared.queue.read().as_ref().map(|q| q.rx.clone());
        let Some(rx) = rx else {
            if shared.state() == LifecycleState::Draining {
                break;
            }
            thread::sleep(Duration::from_millis(1));
            continue;
        };

        match rx.recv_timeout(Duration::from_millis(50)) {
            Ok(event) => shared.aggregator.statistics(&event),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                if shared.state() == LifecycleState::Draining {
                    break;
                }
                // Transient window: the old queue is gone but its
                // replacement is not yet installed.
                thread::sleep(Duration::from_millis(1));
            }
        }
    }

    shared.set_state(LifecycleState::Stopped);
    debug!("aggregation worker stopped");
}
