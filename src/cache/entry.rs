//! Cache Entry Module
//!
//! Defines individual cache entries and the clock that decides their freshness.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

// == Cache Entry ==
/// A single cache entry: key, value and optional expiration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<K, V> {
    /// The key, duplicated here so tail eviction can find the lookup slot
    pub key: K,
    /// The stored value
    pub value: V,
    /// Expiration timestamp (Unix seconds), None = no expiration
    pub expires_at: Option<i64>,
}

impl<K, V> CacheEntry<K, V> {
    // == Constructor ==
    /// Creates a new entry expiring at `expires_at`.
    pub fn new(key: K, value: V, expires_at: Option<i64>) -> Self {
        Self {
            key,
            value,
            expires_at,
        }
    }

    // == Is Live ==
    /// Whether the entry may still be served at `now`.
    ///
    /// Boundary condition: an entry expiring at second `t` is still live during
    /// second `t` and dead from `t + 1`.
    pub fn is_live(&self, now: i64) -> bool {
        match self.expires_at {
            Some(expires) => expires >= now,
            None => true,
        }
    }

    /// Whether the entry carries a TTL that has passed at `now`.
    pub fn is_expired(&self, now: i64) -> bool {
        !self.is_live(now)
    }
}

/// Converts a TTL in seconds into an absolute expiration timestamp.
///
/// `0` means "never expires".
pub fn expiration_from_ttl(now: i64, ttl_secs: i64) -> Option<i64> {
    (ttl_secs > 0).then(|| now.saturating_add(ttl_secs))
}

// == Clock ==
/// Source of the current time in Unix seconds.
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> i64;
}

/// Wall clock backed by chrono.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// A clock that only moves when told to.
///
/// Lets tests cross TTL boundaries without sleeping.
#[derive(Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    /// Moves the clock forward by `secs`.
    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualClock")
            .field("now", &self.now_secs())
            .finish()
    }
}
