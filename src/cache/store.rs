//! Cache Store Module
//!
//! Main cache engine combining a lookup table, an LRU recency list and a
//! skip-list expiration index. Every method here assumes the caller already
//! holds whatever lock protects the store; [`crate::Cache`] provides that lock.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::cache::entry::{expiration_from_ttl, CacheEntry, Clock, SystemClock};
use crate::cache::lru::{NodeId, RecencyList};
use crate::cache::skiplist::SkipList;
use crate::cache::stats::{CacheStats, RemovalCause};
use crate::error::{CacheError, Result};

/// Called once for every entry leaving the cache, while the store is locked.
///
/// The callback must not try to reach the cache it is attached to.
pub type EvictionCallback<K, V> = Box<dyn Fn(&K, &V) + Send + Sync>;

// == LRU Store ==
/// Single-threaded LRU cache with per-entry TTL.
pub struct LruStore<K, V> {
    /// Recency order, front = most recently used
    entries: RecencyList<CacheEntry<K, V>>,
    /// Key to recency handle
    index: HashMap<K, NodeId>,
    /// Expiration timestamp to the keys expiring in that second
    to_expire: SkipList<HashSet<K>>,
    /// Maximum number of entries, 0 = unbounded
    capacity: usize,
    on_evicted: Option<EvictionCallback<K, V>>,
    clock: Arc<dyn Clock>,
    stats: CacheStats,
}

impl<K, V> LruStore<K, V>
where
    K: Eq + Hash + Clone,
{
    // == Constructor ==
    /// Creates a store on the system clock with no eviction callback.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of entries, 0 for unbounded
    pub fn new(capacity: usize) -> Self {
        Self::with_options(capacity, None, Arc::new(SystemClock))
    }

    /// Creates a store with an eviction callback and a custom clock.
    pub fn with_options(
        capacity: usize,
        on_evicted: Option<EvictionCallback<K, V>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            entries: RecencyList::new(),
            index: HashMap::new(),
            to_expire: SkipList::new(),
            capacity,
            on_evicted,
            clock,
            stats: CacheStats::new(),
        }
    }

    /// Current time in Unix seconds, as seen by this store.
    pub fn now(&self) -> i64 {
        self.clock.now_secs()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // == Add ==
    /// Stores a value, optionally expiring `ttl_secs` seconds from now.
    ///
    /// A `ttl_secs` of 0 stores the value without expiration (clearing any
    /// previous one). Re-adding a key replaces its value and TTL and makes
    /// it the most recently used entry.
    ///
    /// Returns `true` for a new key, and for an existing key whose previous
    /// TTL had already run out (the call brings a dead entry back).
    /// Inserting a new key into a full cache evicts one entry first: an
    /// expired one if the expiration index has any, otherwise the least
    /// recently used one.
    ///
    /// # Errors
    /// Returns [`CacheError::InvalidArgument`] for a negative TTL, before
    /// touching any state.
    pub fn add(&mut self, key: K, value: V, ttl_secs: i64) -> Result<bool> {
        if ttl_secs < 0 {
            return Err(CacheError::InvalidArgument(format!(
                "ttl_secs must be >= 0, got {}",
                ttl_secs
            )));
        }

        let now = self.now();
        let expires_at = expiration_from_ttl(now, ttl_secs);

        if let Some(id) = self.index.get(&key).copied() {
            self.entries.move_to_front(id);
            let entry = self.entries.get_mut(id);
            entry.value = value;
            let old = std::mem::replace(&mut entry.expires_at, expires_at);

            if old != expires_at {
                if let Some(ts) = old {
                    self.remove_key_from_expire(&key, ts);
                }
                if let Some(ts) = expires_at {
                    self.add_key_to_expire(key, ts);
                }
            }
            return Ok(matches!(old, Some(ts) if ts < now));
        }

        let id = self
            .entries
            .push_front(CacheEntry::new(key.clone(), value, expires_at));
        if let Some(ts) = expires_at {
            self.add_key_to_expire(key.clone(), ts);
        }
        self.index.insert(key, id);

        if self.capacity != 0 && self.entries.len() > self.capacity {
            self.remove_one_expired_or_oldest(now);
        }
        Ok(true)
    }

    // == Get ==
    /// Returns a live value and marks it most recently used.
    ///
    /// Expired entries read as absent but stay in place until a sweep, an
    /// eviction or a remove reaches them.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let now = self.now();
        match self.index.get(key).copied() {
            Some(id) if self.entries.get(id).is_live(now) => {
                self.entries.move_to_front(id);
                self.stats.record_hit();
                Some(&self.entries.get(id).value)
            }
            _ => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Peek ==
    /// Returns a live value without touching recency order or stats.
    pub fn peek(&self, key: &K) -> Option<&V> {
        let now = self.now();
        let id = *self.index.get(key)?;
        let entry = self.entries.get(id);
        entry.is_live(now).then_some(&entry.value)
    }

    /// Whether `key` is stored, expired or not.
    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    // == Remove ==
    /// Removes an entry, firing the eviction callback. Absent keys are a no-op.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let id = self.index.get(key).copied()?;
        Some(self.remove_node(id, RemovalCause::Explicit))
    }

    // == Length ==
    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Traversal ==
    /// Visits live entries from most to least recently used until `visit`
    /// returns `false`. Does not change recency order.
    pub fn range<F>(&self, visit: F)
    where
        F: FnMut(&K, &V, Option<i64>) -> bool,
    {
        let now = self.now();
        visit_live(self.entries.iter(), now, visit);
    }

    /// Like [`LruStore::range`], from least to most recently used.
    pub fn reverse<F>(&self, visit: F)
    where
        F: FnMut(&K, &V, Option<i64>) -> bool,
    {
        let now = self.now();
        visit_live(self.entries.iter().rev(), now, visit);
    }

    // == Expiration ==
    /// Earliest expiration timestamp currently indexed.
    pub fn next_expiration(&self) -> Option<i64> {
        self.to_expire.head().map(|(ts, _)| ts)
    }

    /// Whether some entry expires at or before `now`.
    pub fn has_expired(&self, now: i64) -> bool {
        matches!(self.to_expire.head(), Some((ts, _)) if ts <= now)
    }

    /// Removes every entry expiring at or before `now` and returns how many
    /// were removed.
    ///
    /// # Panics
    /// Panics if the expiration index names a key the lookup table lacks.
    pub fn drain_expired(&mut self, now: i64) -> usize {
        let mut removed = 0;
        while let Some(key) = self.first_expired_key(now) {
            let id = self.lookup_indexed(&key);
            self.remove_node(id, RemovalCause::Expired);
            removed += 1;
        }
        removed
    }

    // == Stats ==
    /// Returns a snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    // == Invariants ==
    /// Cross-checks the lookup table, the recency list and the expiration
    /// index against each other.
    ///
    /// # Panics
    /// Panics on the first inconsistency found.
    pub fn check_invariants(&self) {
        assert_eq!(
            self.index.len(),
            self.entries.len(),
            "lookup table and recency list differ in size"
        );
        assert_eq!(
            self.entries.iter().count(),
            self.entries.len(),
            "recency list length counter out of sync"
        );

        for (key, &id) in &self.index {
            let entry = self.entries.get(id);
            assert!(entry.key == *key, "lookup table points at another key's entry");
            if let Some(ts) = entry.expires_at {
                assert!(
                    self.to_expire.get(ts).is_some_and(|bucket| bucket.contains(key)),
                    "entry expiring at {} missing from its bucket",
                    ts
                );
            }
        }

        let mut indexed = 0;
        for (ts, bucket) in self.to_expire.iter() {
            assert!(!bucket.is_empty(), "empty bucket left at {}", ts);
            for key in bucket {
                let id = self.lookup_indexed(key);
                assert_eq!(
                    self.entries.get(id).expires_at,
                    Some(ts),
                    "key filed under the wrong expiration bucket"
                );
                indexed += 1;
            }
        }
        let with_ttl = self
            .entries
            .iter()
            .filter(|entry| entry.expires_at.is_some())
            .count();
        assert_eq!(indexed, with_ttl, "expiration index and entries disagree");

        self.to_expire.check_structure();
    }

    // == Internals ==
    fn remove_one_expired_or_oldest(&mut self, now: i64) {
        if let Some(key) = self.first_expired_key(now) {
            debug!("Capacity {} exceeded, evicting an expired entry", self.capacity);
            let id = self.lookup_indexed(&key);
            self.remove_node(id, RemovalCause::Expired);
        } else if let Some(id) = self.entries.back() {
            debug!("Capacity {} exceeded, evicting least recently used entry", self.capacity);
            self.remove_node(id, RemovalCause::Capacity);
        }
    }

    /// Some key from the earliest bucket, if that bucket is due at `now`.
    fn first_expired_key(&self, now: i64) -> Option<K> {
        match self.to_expire.head() {
            Some((ts, bucket)) if ts <= now => Some(
                bucket
                    .iter()
                    .next()
                    .cloned()
                    .expect("empty bucket left in the expiration index"),
            ),
            _ => None,
        }
    }

    fn lookup_indexed(&self, key: &K) -> NodeId {
        self.index
            .get(key)
            .copied()
            .expect("expiration index holds a key missing from the lookup table")
    }

    /// The single removal path: recency list, lookup table, expiration
    /// index, then the callback.
    fn remove_node(&mut self, id: NodeId, cause: RemovalCause) -> V {
        let entry = self.entries.remove(id);
        self.index.remove(&entry.key);
        if let Some(ts) = entry.expires_at {
            self.remove_key_from_expire(&entry.key, ts);
        }
        self.stats.record_removal(cause);
        trace!(?cause, expires_at = ?entry.expires_at, "Removed cache entry");

        if let Some(on_evicted) = &self.on_evicted {
            on_evicted(&entry.key, &entry.value);
        }
        entry.value
    }

    fn remove_key_from_expire(&mut self, key: &K, ts: i64) {
        let bucket = self
            .to_expire
            .get_mut(ts)
            .expect("entry expiration missing from the expiration index");
        bucket.remove(key);
        if bucket.is_empty() {
            self.to_expire.remove(ts);
        }
    }

    fn add_key_to_expire(&mut self, key: K, ts: i64) {
        match self.to_expire.get_mut(ts) {
            Some(bucket) => {
                bucket.insert(key);
            }
            None => self.to_expire.add(ts, HashSet::from([key])),
        }
    }
}

fn visit_live<'a, K, V, I, F>(entries: I, now: i64, mut visit: F)
where
    K: 'a,
    V: 'a,
    I: Iterator<Item = &'a CacheEntry<K, V>>,
    F: FnMut(&K, &V, Option<i64>) -> bool,
{
    for entry in entries.filter(|entry| entry.is_live(now)) {
        if !visit(&entry.key, &entry.value, entry.expires_at) {
            return;
        }
    }
}

impl<K, V> fmt::Debug for LruStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruStore")
            .field("len", &self.entries.len())
            .field("capacity", &self.capacity)
            .field("expiration_buckets", &self.to_expire.len())
            .field("has_eviction_callback", &self.on_evicted.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}
