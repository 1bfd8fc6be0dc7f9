//! Expiration Sweep Task
//!
//! Background task that periodically removes expired cache entries.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::LruStore;

// == Sweep Handle ==
/// Handle to a running sweep task.
#[derive(Debug)]
pub struct SweepHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SweepHandle {
    /// Asks the task to stop without waiting for it.
    pub fn signal_stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Stops the task and waits until it has exited. No sweep runs after
    /// this returns.
    ///
    /// A panic inside the task is resumed on the caller.
    pub async fn stop(self) {
        self.signal_stop();
        match self.handle.await {
            Ok(()) => info!("Expiration sweep task stopped"),
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => warn!("Expiration sweep task ended abnormally: {}", err),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Spawns a background task that sweeps expired entries every
/// `sweep_interval_secs` seconds.
///
/// Each tick peeks the earliest expiration under a read lock and only takes
/// the write lock when something is due.
///
/// # Panics
/// Must be called from within a tokio runtime.
pub fn spawn_sweep_task<K, V>(
    store: Arc<RwLock<LruStore<K, V>>>,
    sweep_interval_secs: u64,
) -> SweepHandle
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    let interval = Duration::from_secs(sweep_interval_secs);
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        info!(
            "Starting expiration sweep task with interval of {} seconds",
            sweep_interval_secs
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    let removed = sweep_once(&store).await;
                    if removed > 0 {
                        info!("Expiration sweep: removed {} expired entries", removed);
                    } else {
                        debug!("Expiration sweep: no expired entries found");
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        debug!("Expiration sweep task received shutdown signal");
                        return;
                    }
                }
            }
        }
    });

    SweepHandle {
        shutdown_tx,
        handle,
    }
}

/// Runs one sweep pass and returns the number of entries removed.
///
/// The write lock is taken only if the read-locked peek finds an expired
/// bucket; it then drains every bucket due at the time of the peek.
pub async fn sweep_once<K, V>(store: &RwLock<LruStore<K, V>>) -> usize
where
    K: Eq + Hash + Clone,
{
    let now = {
        let guard = store.read().await;
        let now = guard.now();
        if !guard.has_expired(now) {
            return 0;
        }
        now
    };

    store.write().await.drain_expired(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;

    const T0: i64 = 1_700_000_000;

    fn shared_store() -> (Arc<RwLock<LruStore<String, String>>>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(T0));
        let store = LruStore::with_options(100, None, clock.clone());
        (Arc::new(RwLock::new(store)), clock)
    }

    #[tokio::test]
    async fn test_sweep_once_drains_due_buckets() {
        let (store, clock) = shared_store();
        {
            let mut guard = store.write().await;
            guard.add("a".into(), "1".into(), 1).unwrap();
            guard.add("b".into(), "2".into(), 2).unwrap();
            guard.add("c".into(), "3".into(), 100).unwrap();
        }

        assert_eq!(sweep_once(&store).await, 0);

        clock.advance(3);
        assert_eq!(sweep_once(&store).await, 2);

        let guard = store.read().await;
        assert_eq!(guard.len(), 1);
        assert_eq!(guard.next_expiration(), Some(T0 + 100));
        guard.check_invariants();
    }

    #[tokio::test]
    async fn test_sweep_task_removes_expired_entries() {
        let (store, clock) = shared_store();
        {
            let mut guard = store.write().await;
            guard.add("expire_soon".into(), "value".into(), 1).unwrap();
            guard.add("long_lived".into(), "value".into(), 3600).unwrap();
        }

        let handle = spawn_sweep_task(store.clone(), 1);
        clock.advance(2);

        // Wait for at least one tick
        tokio::time::sleep(Duration::from_millis(1500)).await;

        {
            let mut guard = store.write().await;
            assert_eq!(guard.len(), 1, "Expired entry should have been swept");
            assert_eq!(guard.get(&"long_lived".into()), Some(&"value".to_string()));
        }

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_sweep_task_stops_promptly() {
        let (store, _) = shared_store();
        let handle = spawn_sweep_task(store, 3600);

        // Returns long before the first tick would fire
        tokio::time::timeout(Duration::from_secs(5), handle.stop())
            .await
            .expect("stop should not wait for the sweep interval");
    }

    #[tokio::test]
    async fn test_sweep_task_exits_on_signal() {
        let (store, _) = shared_store();
        let handle = spawn_sweep_task(store.clone(), 3600);
        handle.signal_stop();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should exit after the stop signal");
        // The task released its clone of the store
        assert_eq!(Arc::strong_count(&store), 1);
    }
}
