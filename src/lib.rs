//! In-process SQL query statistics aggregator
//!
//! `sqlstats` ingests a live stream of executed-query events observed at a
//! proxy or gateway boundary and maintains running per-query-shape
//! statistics: execution counts, error counts, first/last seen timestamps,
//! min/max/total execution time, and six latency-range counters. It trades
//! exactness for bounded memory and bounded ingestion latency.
//!
//! Aggregates live in two bounded caches ordered by most-recent write: a
//! *rolling* cache read non-destructively (and persisted across restarts)
//! and a *drain* cache consumed destructively in "since last drain" batches.
//! Producer threads hand events over under one of three pressure modes:
//! drop-on-full, blocking, or inline on the caller's thread.
//!
//! # Example
//!
//! ```
//! use sqlstats::{IngestMode, MonitorConfig, QueryEvent, SqlMonitor};
//!
//! let monitor = SqlMonitor::new();
//! monitor
//!     .start(
//!         MonitorConfig::builder()
//!             .mode(IngestMode::Inline)
//!             .cache_capacity(1000)
//!             .build(),
//!     )
//!     .unwrap();
//!
//! monitor.submit(QueryEvent {
//!     sql: "select a from t where b = 5".to_string(),
//!     success: true,
//!     host: "127.0.0.1:3306".to_string(),
//!     schema: "sbtest".to_string(),
//!     user: "app".to_string(),
//!     exec_time_ms: 1.2,
//!     seen_at: 1_700_000_000,
//! });
//!
//! let report = monitor.query_stats(0, 0);
//! assert_eq!(report.rows.len(), 1);
//! monitor.stop();
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]

pub use cache::EvictionCache;
pub use config::{
    IngestMode, MonitorConfig, MonitorConfigBuilder, DEFAULT_CACHE_CAPACITY,
    DEFAULT_QUEUE_CAPACITY,
};
pub use error::MonitorError;
pub use event::QueryEvent;
pub use fingerprint::{DefaultFingerprinter, Fingerprinter, QueryDigest};
pub use monitor::{LifecycleState, SqlMonitor};
pub use stats::{LatencyBucket, QueryStats, StatsReport, STAT_COLUMNS};

/// Merge-or-create aggregation over the two stats caches
pub mod aggregate;

/// Bounded eviction cache ordered by most-recent write
pub mod cache;

/// Monitor configuration
pub mod config;

/// Error types
pub mod error;

/// Query execution events
pub mod event;

/// Query shape fingerprinting
pub mod fingerprint;

/// Lifecycle controller and ingestion pipeline
pub mod monitor;

/// Snapshot persistence
pub mod persist;

/// Aggregate statistics records and report layout
pub mod stats;
