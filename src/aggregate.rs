//! Merge-or-create aggregation over the two stats caches

use crate::cache::EvictionCache;
use crate::event::QueryEvent;
use crate::fingerprint::{Fingerprinter, QueryDigest};
use crate::stats::QueryStats;

/// Build the cache key identifying one aggregate record.
pub fn cache_key(host: &str, schema: &str, user: &str, digest: &str) -> String {
    format!("{},{},{},{}", host, schema, user, digest)
}

/// Applies events to the rolling and drain caches.
///
/// Every event updates both caches with the same logical merge, so reading
/// one cache or draining the other never perturbs its sibling.
pub struct Aggregator {
    fingerprinter: Box<dyn Fingerprinter>,
    rolling: EvictionCache<String, QueryStats>,
    drain: EvictionCache<String, QueryStats>,
}

impl Aggregator {
    /// Create an aggregator with both caches bounded to `capacity`
    /// (0 = unbounded).
    pub fn new(fingerprinter: Box<dyn Fingerprinter>, capacity: usize) -> Self {
        Self {
            fingerprinter,
            rolling: EvictionCache::new(capacity),
            drain: EvictionCache::new(capacity),
        }
    }

    /// Fingerprint the event and merge it into both caches.
    pub fn statistics(&self, event: &QueryEvent) {
        let digest = self.fingerprinter.fingerprint(&event.sql);
        let key = cache_key(&event.host, &event.schema, &event.user, &digest.digest);

        merge_into(&self.rolling, event, &digest, &key);
        merge_into(&self.drain, event, &digest, &key);
    }

    /// The persisted, non-destructively read aggregate view.
    pub fn rolling(&self) -> &EvictionCache<String, QueryStats> {
        &self.rolling
    }

    /// The aggregate view consumed destructively in delta batches.
    pub fn drain(&self) -> &EvictionCache<String, QueryStats> {
        &self.drain
    }

    /// Resize both caches (0 = unbounded).
    pub fn set_capacity(&self, capacity: usize) {
        self.rolling.resize(capacity);
        self.drain.resize(capacity);
    }

    /// Empty both caches.
    pub fn clear(&self) {
        self.rolling.clear();
        self.drain.clear();
    }
}

// The get-then-put pair is not one critical section: two concurrent inline
// callers updating the same key can both read the pre-update record and the
// second put wins. Accepted, since the async modes funnel all aggregation
// through a single worker.
fn merge_into(
    cache: &EvictionCache<String, QueryStats>,
    event: &QueryEvent,
    digest: &QueryDigest,
    key: &str,
) {
    let stats = match cache.get(key) {
        Some(mut existing) => {
            existing.merge(event);
            existing
        }
        None => QueryStats::from_event(event, digest),
    };
    cache.put(key.to_owned(), stats);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::DefaultFingerprinter;

    fn aggregator() -> Aggregator {
        Aggregator::new(Box::new(DefaultFingerprinter), 0)
    }

    fn event(sql: &str, user: &str, exec_time_ms: f64, seen_at: i64) -> QueryEvent {
        QueryEvent {
            sql: sql.to_string(),
            success: true,
            host: "127.0.0.1:3306".to_string(),
            schema: "sbtest".to_string(),
            user: user.to_string(),
            exec_time_ms,
            seen_at,
        }
    }

    #[test]
    fn same_shape_merges_into_one_record() {
        let agg = aggregator();
        agg.statistics(&event("select a from t where b = 1", "app", 1.0, 100));
        agg.statistics(&event("select a from t where b = 77", "app", 3.0, 101));

        assert_eq!(agg.rolling().len(), 1);
        assert_eq!(agg.drain().len(), 1);
        let stats = &agg.rolling().list_range(1, 0)[0];
        assert_eq!(stats.count_star, 2);
        assert_eq!(stats.sum_time, 4.0);
    }

    #[test]
    fn key_includes_user_and_schema() {
        let agg = aggregator();
        agg.statistics(&event("select a from t", "app", 1.0, 100));
        agg.statistics(&event("select a from t", "batch", 1.0, 100));
        assert_eq!(agg.rolling().len(), 2);
    }

    #[test]
    fn update_relocates_to_most_recent_in_both_caches() {
        let agg = aggregator();
        agg.statistics(&event("select a from t", "app", 1.0, 100));
        agg.statistics(&event("select b from t", "app", 1.0, 101));
        agg.statistics(&event("select a from t", "app", 1.0, 102));

        let rolling = agg.rolling().list_range(10, 0);
        assert_eq!(rolling[0].digest_text, "select a from t");
        // Oldest in the drain cache is now the shape updated least recently.
        let (_, oldest) = agg.drain().remove_oldest().unwrap();
        assert_eq!(oldest.digest_text, "select b from t");
    }

    #[test]
    fn draining_one_cache_leaves_the_other_intact() {
        let agg = aggregator();
        agg.statistics(&event("select a from t", "app", 1.0, 100));
        while agg.drain().remove_oldest().is_some() {}
        assert_eq!(agg.drain().len(), 0);
        assert_eq!(agg.rolling().len(), 1);
    }
}
