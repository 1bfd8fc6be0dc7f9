//! Shared Cache Handle
//!
//! Wraps an [`LruStore`] in a single reader/writer lock and owns the
//! background sweep task.
//!
//! # Locking
//! Every method takes the lock once and releases it before returning.
//! Bodies passed to [`Cache::view`], [`Cache::update`] and
//! [`Cache::compare_and_set`], and the eviction callback, run while the lock
//! is held. They are synchronous, so they cannot await this handle's own
//! methods; blocking on them from inside (e.g. through `block_on`) deadlocks.

use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::cache::entry::{Clock, SystemClock};
use crate::cache::stats::CacheStats;
use crate::cache::store::{EvictionCallback, LruStore};
use crate::cache::txn::{RTxn, Txn};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_sweep_task, SweepHandle};

// == Cache ==
/// Thread-safe LRU cache with per-entry TTL.
pub struct Cache<K, V> {
    store: Arc<RwLock<LruStore<K, V>>>,
    sweeper: Mutex<Option<SweepHandle>>,
    closed: AtomicBool,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructors ==
    /// Starts building a cache.
    pub fn builder() -> CacheBuilder<K, V> {
        CacheBuilder::new()
    }

    /// Creates a cache.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of entries, 0 for unbounded
    /// * `sweep_interval_secs` - Seconds between background sweeps, 0 for none
    /// * `on_evicted` - Called for every entry that leaves the cache
    ///
    /// # Errors
    /// Returns [`CacheError::NoRuntime`] if a sweep is requested outside a
    /// tokio runtime.
    pub fn new(
        capacity: usize,
        sweep_interval_secs: u64,
        on_evicted: Option<EvictionCallback<K, V>>,
    ) -> Result<Self> {
        let mut builder = Self::builder()
            .capacity(capacity)
            .sweep_interval_secs(sweep_interval_secs);
        builder.on_evicted = on_evicted;
        builder.build()
    }

    /// Creates a cache from the capacity and sweep interval in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.capacity, config.sweep_interval_secs, None)
    }

    // == Writes ==
    /// Stores a value, see [`LruStore::add`].
    pub async fn add(&self, key: K, value: V, ttl_secs: i64) -> Result<bool> {
        self.store.write().await.add(key, value, ttl_secs)
    }

    /// Returns a live value and marks it most recently used.
    ///
    /// Takes the exclusive lock, since refreshing recency reorders the list.
    pub async fn get(&self, key: &K) -> Option<V> {
        self.store.write().await.get(key).cloned()
    }

    /// Removes an entry and returns its value. Absent keys are a no-op.
    pub async fn remove(&self, key: &K) -> Option<V> {
        self.store.write().await.remove(key)
    }

    /// Removes every expired entry now instead of waiting for a sweep.
    pub async fn purge_expired(&self) -> usize {
        let mut store = self.store.write().await;
        let now = store.now();
        store.drain_expired(now)
    }

    // == Reads ==
    /// Number of stored entries, including expired ones not yet swept.
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    pub async fn capacity(&self) -> usize {
        self.store.read().await.capacity()
    }

    /// Visits live entries from most to least recently used until `visit`
    /// returns `false`.
    pub async fn range<F>(&self, visit: F)
    where
        F: FnMut(&K, &V, Option<i64>) -> bool,
    {
        self.store.read().await.range(visit)
    }

    /// Visits live entries from least to most recently used until `visit`
    /// returns `false`.
    pub async fn reverse<F>(&self, visit: F)
    where
        F: FnMut(&K, &V, Option<i64>) -> bool,
    {
        self.store.read().await.reverse(visit)
    }

    pub async fn stats(&self) -> CacheStats {
        self.store.read().await.stats()
    }

    /// Earliest expiration timestamp (Unix seconds) still indexed.
    pub async fn next_expiration(&self) -> Option<i64> {
        self.store.read().await.next_expiration()
    }

    // == Transactions ==
    /// Runs `body` under the shared lock.
    pub async fn view<R, F>(&self, body: F) -> R
    where
        F: FnOnce(&RTxn<'_, K, V>) -> R,
    {
        let store = self.store.read().await;
        body(&RTxn::new(&store))
    }

    /// Runs `body` under the exclusive lock.
    pub async fn update<R, F>(&self, body: F) -> R
    where
        F: FnOnce(&mut Txn<'_, K, V>) -> R,
    {
        let mut store = self.store.write().await;
        body(&mut Txn::new(&mut store))
    }

    /// Reads `key` and hands the current value (`None` if absent or expired)
    /// to `body` without releasing the exclusive lock in between.
    pub async fn compare_and_set<R, F>(&self, key: &K, body: F) -> R
    where
        F: FnOnce(Option<V>, &mut Txn<'_, K, V>) -> R,
    {
        let mut store = self.store.write().await;
        let current = store.get(key).cloned();
        body(current, &mut Txn::new(&mut store))
    }

    // == Shutdown ==
    /// Stops the background sweep and waits for it to exit.
    ///
    /// The cache stays usable afterwards, with expired entries reclaimed
    /// only by eviction, [`Cache::remove`] or [`Cache::purge_expired`].
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            warn!("Cache closed more than once");
            return;
        }
        if let Some(sweeper) = self.sweeper.lock().await.take() {
            sweeper.stop().await;
        }
    }
}

impl<K, V> Drop for Cache<K, V> {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.get_mut().as_ref() {
            sweeper.signal_stop();
        }
    }
}

impl<K, V> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

// == Cache Builder ==
/// Collects the options of a [`Cache`].
pub struct CacheBuilder<K, V> {
    capacity: usize,
    sweep_interval_secs: u64,
    on_evicted: Option<EvictionCallback<K, V>>,
    clock: Arc<dyn Clock>,
}

impl<K, V> CacheBuilder<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Unbounded, no sweep, no callback, system clock.
    pub fn new() -> Self {
        Self {
            capacity: 0,
            sweep_interval_secs: 0,
            on_evicted: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Maximum number of entries, 0 for unbounded.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Seconds between background sweeps, 0 to disable the sweep task.
    pub fn sweep_interval_secs(mut self, secs: u64) -> Self {
        self.sweep_interval_secs = secs;
        self
    }

    /// Callback for every entry leaving the cache. It runs under the
    /// exclusive lock and must not reach back into the cache.
    pub fn on_evicted<F>(mut self, on_evicted: F) -> Self
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.on_evicted = Some(Box::new(on_evicted));
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the cache and, if configured, starts its sweep task.
    ///
    /// # Errors
    /// Returns [`CacheError::NoRuntime`] if a sweep is requested outside a
    /// tokio runtime.
    pub fn build(self) -> Result<Cache<K, V>> {
        let store = Arc::new(RwLock::new(LruStore::with_options(
            self.capacity,
            self.on_evicted,
            self.clock,
        )));

        let sweeper = if self.sweep_interval_secs > 0 {
            Handle::try_current().map_err(|_| CacheError::NoRuntime)?;
            Some(spawn_sweep_task(store.clone(), self.sweep_interval_secs))
        } else {
            None
        };

        debug!(
            capacity = self.capacity,
            sweep_interval_secs = self.sweep_interval_secs,
            "Cache created"
        );

        Ok(Cache {
            store,
            sweeper: Mutex::new(sweeper),
            closed: AtomicBool::new(false),
        })
    }
}

impl<K, V> Default for CacheBuilder<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
