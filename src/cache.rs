//! Bounded eviction cache ordered by most-recent write
//!
//! [`EvictionCache`] keeps entries ordered from most- to least-recently
//! *written*: `put` always relocates an entry to the most-recent end, while
//! `get` is read-only with respect to ordering. When an insertion pushes the
//! entry count past the configured capacity the least-recently-written entry
//! is evicted.

use lru::LruCache;
use parking_lot::RwLock;
use std::borrow::Borrow;
use std::hash::Hash;

/// Callback invoked with the key and value of each evicted entry.
pub type EvictionHook<K, V> = Box<dyn Fn(&K, &V) + Send + Sync>;

/// A bounded key-value store ordered by most-recent write.
///
/// All operations serialize against each other through one reader/writer
/// lock scoped to this instance; two instances never share a lock. The
/// eviction hook runs synchronously on the mutating caller's thread while
/// that lock is held, so it must not call back into the cache.
pub struct EvictionCache<K: Hash + Eq, V> {
    inner: RwLock<Inner<K, V>>,
    on_evict: Option<EvictionHook<K, V>>,
}

struct Inner<K: Hash + Eq, V> {
    // Kept unbounded; the wrapper enforces capacity so that eviction timing
    // and hook invocation stay under its control.
    entries: LruCache<K, V>,
    capacity: usize,
}

impl<K: Hash + Eq, V> EvictionCache<K, V> {
    /// Create a cache holding at most `capacity` entries; 0 means unbounded.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: LruCache::unbounded(),
                capacity,
            }),
            on_evict: None,
        }
    }

    /// Create a cache that invokes `hook` for every entry evicted by a
    /// capacity overflow, a resize, or [`clear`](Self::clear).
    pub fn with_eviction_hook(capacity: usize, hook: EvictionHook<K, V>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: LruCache::unbounded(),
                capacity,
            }),
            on_evict: Some(hook),
        }
    }

    /// Insert `value` at the most-recent position, or overwrite and relocate
    /// the existing entry for `key`. Evicts the least-recently-written entry
    /// if the cache grows past its capacity.
    pub fn put(&self, key: K, value: V) {
        let mut inner = self.inner.write();
        inner.entries.put(key, value);
        while inner.capacity != 0 && inner.entries.len() > inner.capacity {
            self.evict_oldest(&mut inner);
        }
    }

    /// Look up a value without touching the write-recency order.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.inner.read().entries.peek(key).cloned()
    }

    /// Evict and return the least-recently-written entry, or `None` when
    /// empty. The eviction hook is not invoked; the caller holds the entry.
    pub fn remove_oldest(&self) -> Option<(K, V)> {
        self.inner.write().entries.pop_lru()
    }

    /// Delete the entry for `key` if present; no-op otherwise.
    pub fn remove<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.write().entries.pop(key);
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// Set a new capacity, evicting from the oldest end until the current
    /// size fits. The excess is measured once at entry; the whole operation
    /// runs under the write lock.
    pub fn resize(&self, capacity: usize) {
        let mut inner = self.inner.write();
        inner.capacity = capacity;
        if capacity != 0 {
            let excess = inner.entries.len().saturating_sub(capacity);
            for _ in 0..excess {
                self.evict_oldest(&mut inner);
            }
        }
    }

    /// Invoke the eviction hook for every remaining entry, then empty the
    /// cache.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        if let Some(hook) = &self.on_evict {
            for (key, value) in inner.entries.iter() {
                hook(key, value);
            }
        }
        inner.entries.clear();
    }

    /// Up to `limit` values starting `offset` entries from the most-recent
    /// end, in most-recent-to-oldest order. Empty when `offset` is out of
    /// range. Traverses from whichever end is nearer to `offset`.
    pub fn list_range(&self, limit: usize, offset: usize) -> Vec<V>
    where
        V: Clone,
    {
        let inner = self.inner.read();
        let len = inner.entries.len();
        if offset >= len {
            return Vec::new();
        }
        let take = limit.min(len - offset);

        if offset <= len / 2 {
            inner
                .entries
                .iter()
                .skip(offset)
                .take(take)
                .map(|(_, v)| v.clone())
                .collect()
        } else {
            let skip_from_back = len - offset - take;
            let mut values: Vec<V> = inner
                .entries
                .iter()
                .rev()
                .skip(skip_from_back)
                .take(take)
                .map(|(_, v)| v.clone())
                .collect();
            values.reverse();
            values
        }
    }

    fn evict_oldest(&self, inner: &mut Inner<K, V>) {
        if let Some((key, value)) = inner.entries.pop_lru() {
            if let Some(hook) = &self.on_evict {
                hook(&key, &value);
            }
        }
    }
}
