//! Transaction Handles
//!
//! Views over a store whose lock is already held by [`crate::Cache::view`],
//! [`crate::Cache::update`] or [`crate::Cache::compare_and_set`].

use std::hash::Hash;

use crate::cache::store::LruStore;
use crate::error::Result;

// == Read-Write Transaction ==
/// Handle passed to exclusive-lock bodies.
pub struct Txn<'a, K, V> {
    store: &'a mut LruStore<K, V>,
}

impl<'a, K, V> Txn<'a, K, V>
where
    K: Eq + Hash + Clone,
{
    pub(crate) fn new(store: &'a mut LruStore<K, V>) -> Self {
        Self { store }
    }

    /// See [`LruStore::add`].
    pub fn add(&mut self, key: K, value: V, ttl_secs: i64) -> Result<bool> {
        self.store.add(key, value, ttl_secs)
    }

    /// See [`LruStore::get`]; refreshes recency like a plain lookup.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.store.get(key)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.store.remove(key)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

// == Read-Only Transaction ==
/// Handle passed to shared-lock bodies.
///
/// Reads through this handle do not refresh recency: moving an entry to the
/// front is a write, and a shared hold allows none.
pub struct RTxn<'a, K, V> {
    store: &'a LruStore<K, V>,
}

impl<'a, K, V> RTxn<'a, K, V>
where
    K: Eq + Hash + Clone,
{
    pub(crate) fn new(store: &'a LruStore<K, V>) -> Self {
        Self { store }
    }

    pub fn get(&self, key: &K) -> Option<&'a V> {
        self.store.peek(key)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_txn_operations_share_the_store() {
        let mut store: LruStore<&str, i32> = LruStore::new(10);
        {
            let mut txn = Txn::new(&mut store);
            assert!(txn.add("a", 1, 0).unwrap());
            assert!(txn.add("b", 2, 0).unwrap());
            assert_eq!(txn.get(&"a"), Some(&1));
            assert_eq!(txn.remove(&"b"), Some(2));
            assert_eq!(txn.len(), 1);
        }
        assert_eq!(store.len(), 1);
        store.check_invariants();
    }

    #[test]
    fn test_rtxn_reads_without_touching_recency() {
        let mut store: LruStore<&str, i32> = LruStore::new(2);
        store.add("a", 1, 0).unwrap();
        store.add("b", 2, 0).unwrap();

        let value = {
            let rtxn = RTxn::new(&store);
            assert_eq!(rtxn.len(), 2);
            assert!(!rtxn.is_empty());
            rtxn.get(&"a").copied()
        };
        assert_eq!(value, Some(1));

        // "a" is still the LRU tail, so it is the one evicted
        store.add("c", 3, 0).unwrap();
        assert!(store.peek(&"a").is_none());
        assert_eq!(store.stats().hits, 0);
    }
}
