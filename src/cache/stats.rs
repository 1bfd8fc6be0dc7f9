//! Cache Statistics Module
//!
//! Tracks lookups and the reasons entries left the cache.

use serde::Serialize;

// == Cache Stats ==
/// Cache counters, snapshot-able and serializable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups that returned a live value
    pub hits: u64,
    /// Lookups for absent or expired keys
    pub misses: u64,
    /// Entries evicted to stay within capacity
    pub evictions: u64,
    /// Entries removed because their TTL passed
    pub expirations: u64,
    /// Entries removed by an explicit remove
    pub removals: u64,
    /// Current number of entries, expired-but-unswept included
    pub total_entries: usize,
}

/// Why an entry left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalCause {
    Capacity,
    Expired,
    Explicit,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Counts one removal under its cause.
    pub fn record_removal(&mut self, cause: RemovalCause) {
        match cause {
            RemovalCause::Capacity => self.evictions += 1,
            RemovalCause::Expired => self.expirations += 1,
            RemovalCause::Explicit => self.removals += 1,
        }
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
