//! Aggregate statistics records and report layout

use crate::event::QueryEvent;
use crate::fingerprint::QueryDigest;

/// Column names of a stats report, in fixed order.
pub const STAT_COLUMNS: [&str; 18] = [
    "host_addr",
    "schema_name",
    "user_name",
    "digest",
    "digest_text",
    "count_star",
    "count_err",
    "first_seen",
    "last_seen",
    "sum_time",
    "min_time",
    "max_time",
    "count_1ms",
    "count_10ms",
    "count_100ms",
    "count_1s",
    "count_5s",
    "count_others",
];

/// One of six mutually exclusive latency ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyBucket {
    /// Execution time <= 1 ms.
    Le1ms,
    /// 1 ms < execution time <= 10 ms.
    Le10ms,
    /// 10 ms < execution time <= 100 ms.
    Le100ms,
    /// 100 ms < execution time <= 1 s.
    Le1s,
    /// 1 s < execution time <= 5 s.
    Le5s,
    /// Execution time > 5 s.
    Others,
}

impl LatencyBucket {
    /// Classify an execution time in milliseconds; first match wins.
    pub fn classify(exec_time_ms: f64) -> Self {
        if exec_time_ms <= 1.0 {
            LatencyBucket::Le1ms
        } else if exec_time_ms <= 10.0 {
            LatencyBucket::Le10ms
        } else if exec_time_ms <= 100.0 {
            LatencyBucket::Le100ms
        } else if exec_time_ms <= 1000.0 {
            LatencyBucket::Le1s
        } else if exec_time_ms <= 5000.0 {
            LatencyBucket::Le5s
        } else {
            LatencyBucket::Others
        }
    }
}

/// Cumulative statistics for one `(host, schema, user, digest)` tuple.
///
/// Identity fields are set once at creation and never change; every counter
/// is monotone, `min_time`/`max_time` only widen, and `last_seen` advances
/// only when an event carries a strictly greater timestamp. The invariants
/// `count_star == sum(buckets)` and `count_star >= count_err` hold by
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryStats {
    /// Database host address.
    pub host_addr: String,
    /// Schema that was being queried.
    pub schema_name: String,
    /// Connecting user name.
    pub user_name: String,
    /// Short stable identifier of the query shape.
    pub digest: String,
    /// Canonical query text with literal values stripped.
    pub digest_text: String,

    /// Total number of executions observed.
    pub count_star: u64,
    /// Number of failed executions.
    pub count_err: u64,

    /// Unix timestamp of the first observation.
    pub first_seen: i64,
    /// Unix timestamp of the most recent observation.
    pub last_seen: i64,

    /// Total execution time in milliseconds.
    pub sum_time: f64,
    /// Smallest execution time seen so far, milliseconds.
    pub min_time: f64,
    /// Largest execution time seen so far, milliseconds.
    pub max_time: f64,

    /// Executions taking <= 1 ms.
    pub count_1ms: u64,
    /// Executions taking > 1 ms and <= 10 ms.
    pub count_10ms: u64,
    /// Executions taking > 10 ms and <= 100 ms.
    pub count_100ms: u64,
    /// Executions taking > 100 ms and <= 1 s.
    pub count_1s: u64,
    /// Executions taking > 1 s and <= 5 s.
    pub count_5s: u64,
    /// Executions taking > 5 s.
    pub count_others: u64,
}

impl QueryStats {
    /// Seed a new record from the first event of its key.
    pub fn from_event(event: &QueryEvent, digest: &QueryDigest) -> Self {
        let mut stats = Self {
            host_addr: event.host.clone(),
            schema_name: event.schema.clone(),
            user_name: event.user.clone(),
            digest: digest.digest.clone(),
            digest_text: digest.digest_text.clone(),
            count_star: 1,
            count_err: u64::from(!event.success),
            first_seen: event.seen_at,
            last_seen: event.seen_at,
            sum_time: event.exec_time_ms,
            min_time: event.exec_time_ms,
            max_time: event.exec_time_ms,
            count_1ms: 0,
            count_10ms: 0,
            count_100ms: 0,
            count_1s: 0,
            count_5s: 0,
            count_others: 0,
        };
        *stats.bucket_mut(LatencyBucket::classify(event.exec_time_ms)) = 1;
        stats
    }

    /// Fold a further event of the same key into the record.
    pub fn merge(&mut self, event: &QueryEvent) {
        self.count_star += 1;
        if !event.success {
            self.count_err += 1;
        }

        if event.seen_at > self.last_seen {
            self.last_seen = event.seen_at;
        }

        if event.exec_time_ms > self.max_time {
            self.max_time = event.exec_time_ms;
        }
        if event.exec_time_ms < self.min_time {
            self.min_time = event.exec_time_ms;
        }
        self.sum_time += event.exec_time_ms;

        *self.bucket_mut(LatencyBucket::classify(event.exec_time_ms)) += 1;
    }

    /// Cache key identifying this record: `host,schema,user,digest`.
    pub fn cache_key(&self) -> String {
        format!(
            "{},{},{},{}",
            self.host_addr, self.schema_name, self.user_name, self.digest
        )
    }

    /// Render the record as a report row in [`STAT_COLUMNS`] order.
    /// Timing fields carry exactly 3 decimal digits.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.host_addr.clone(),
            self.schema_name.clone(),
            self.user_name.clone(),
            self.digest.clone(),
            self.digest_text.clone(),
            self.count_star.to_string(),
            self.count_err.to_string(),
            self.first_seen.to_string(),
            self.last_seen.to_string(),
            format!("{:.3}", self.sum_time),
            format!("{:.3}", self.min_time),
            format!("{:.3}", self.max_time),
            self.count_1ms.to_string(),
            self.count_10ms.to_string(),
            self.count_100ms.to_string(),
            self.count_1s.to_string(),
            self.count_5s.to_string(),
            self.count_others.to_string(),
        ]
    }

    fn bucket_mut(&mut self, bucket: LatencyBucket) -> &mut u64 {
        match bucket {
            LatencyBucket::Le1ms => &mut self.count_1ms,
            LatencyBucket::Le10ms => &mut self.count_10ms,
            LatencyBucket::Le100ms => &mut self.count_100ms,
            LatencyBucket::Le1s => &mut self.count_1s,
            LatencyBucket::Le5s => &mut self.count_5s,
            LatencyBucket::Others => &mut self.count_others,
        }
    }

    /// Sum of all six bucket counters; always equals `count_star`.
    pub fn bucket_total(&self) -> u64 {
        self.count_1ms
            + self.count_10ms
            + self.count_100ms
            + self.count_1s
            + self.count_5s
            + self.count_others
    }
}

/// Tabular view over a set of [`QueryStats`] records.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsReport {
    /// Column names, fixed order.
    pub columns: &'static [&'static str],
    /// One row per record, rendered per [`QueryStats::to_row`].
    pub rows: Vec<Vec<String>>,
}

impl StatsReport {
    /// Report with the column header and no rows.
    pub fn empty() -> Self {
        Self {
            columns: &STAT_COLUMNS,
            rows: Vec::new(),
        }
    }

    /// Build a report from records, preserving their order.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = QueryStats>,
    {
        Self {
            columns: &STAT_COLUMNS,
            rows: records.into_iter().map(|r| r.to_row()).collect(),
        }
    }
}

impl Default for StatsReport {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::{DefaultFingerprinter, Fingerprinter};

    fn event(exec_time_ms: f64, seen_at: i64, success: bool) -> QueryEvent {
        QueryEvent {
            sql: "select a from t where b = 1".to_string(),
            success,
            host: "127.0.0.1:3306".to_string(),
            schema: "sbtest".to_string(),
            user: "app".to_string(),
            exec_time_ms,
            seen_at,
        }
    }

    fn digest() -> QueryDigest {
        DefaultFingerprinter.fingerprint("select a from t where b = 1")
    }

    #[test]
    fn bucket_boundaries_are_inclusive() {
        assert_eq!(LatencyBucket::classify(0.0), LatencyBucket::Le1ms);
        assert_eq!(LatencyBucket::classify(1.0), LatencyBucket::Le1ms);
        assert_eq!(LatencyBucket::classify(1.001), LatencyBucket::Le10ms);
        assert_eq!(LatencyBucket::classify(10.0), LatencyBucket::Le10ms);
        assert_eq!(LatencyBucket::classify(100.0), LatencyBucket::Le100ms);
        assert_eq!(LatencyBucket::classify(1000.0), LatencyBucket::Le1s);
        assert_eq!(LatencyBucket::classify(5000.0), LatencyBucket::Le5s);
        assert_eq!(LatencyBucket::classify(5000.001), LatencyBucket::Others);
    }

    #[test]
    fn first_event_seeds_all_fields() {
        let stats = QueryStats::from_event(&event(4.4, 100, false), &digest());
        assert_eq!(stats.count_star, 1);
        assert_eq!(stats.count_err, 1);
        assert_eq!(stats.first_seen, 100);
        assert_eq!(stats.last_seen, 100);
        assert_eq!(stats.min_time, 4.4);
        assert_eq!(stats.max_time, 4.4);
        assert_eq!(stats.sum_time, 4.4);
        assert_eq!(stats.count_10ms, 1);
        assert_eq!(stats.bucket_total(), stats.count_star);
    }

    #[test]
    fn merge_widens_and_counts() {
        let mut stats = QueryStats::from_event(&event(4.4, 100, true), &digest());
        stats.merge(&event(0.5, 150, true));
        stats.merge(&event(2000.0, 140, false));

        assert_eq!(stats.count_star, 3);
        assert_eq!(stats.count_err, 1);
        assert_eq!(stats.first_seen, 100);
        assert_eq!(stats.last_seen, 150);
        assert_eq!(stats.min_time, 0.5);
        assert_eq!(stats.max_time, 2000.0);
        assert!((stats.sum_time - 2004.9).abs() < 1e-9);
        assert_eq!(stats.count_1ms, 1);
        assert_eq!(stats.count_10ms, 1);
        assert_eq!(stats.count_5s, 1);
        assert_eq!(stats.bucket_total(), stats.count_star);
        assert!(stats.count_star >= stats.count_err);
    }

    #[test]
    fn last_seen_never_regresses() {
        let mut stats = QueryStats::from_event(&event(1.0, 200, true), &digest());
        stats.merge(&event(1.0, 150, true));
        assert_eq!(stats.last_seen, 200);
    }

    #[test]
    fn row_renders_timings_with_three_decimals() {
        let stats = QueryStats::from_event(&event(1.5, 100, true), &digest());
        let row = stats.to_row();
        assert_eq!(row.len(), STAT_COLUMNS.len());
        assert_eq!(row[9], "1.500");
        assert_eq!(row[10], "1.500");
        assert_eq!(row[11], "1.500");
    }
}
