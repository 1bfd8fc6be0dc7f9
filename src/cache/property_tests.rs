//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the store and the skip list against simple models.

use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::cache::{LruStore, ManualClock, SkipList};

// == Test Configuration ==
const T0: i64 = 1_700_000_000;

// == Strategies ==
/// Small key space so operations collide often
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-h]{1,2}"
}

#[derive(Debug, Clone)]
enum CacheOp {
    Add { key: String, value: u32, ttl: i64 },
    Get { key: String },
    Remove { key: String },
    Tick { secs: i64 },
    Sweep,
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        4 => (key_strategy(), any::<u32>(), 0i64..4)
            .prop_map(|(key, value, ttl)| CacheOp::Add { key, value, ttl }),
        3 => key_strategy().prop_map(|key| CacheOp::Get { key }),
        1 => key_strategy().prop_map(|key| CacheOp::Remove { key }),
        1 => (1i64..3).prop_map(|secs| CacheOp::Tick { secs }),
        1 => Just(CacheOp::Sweep),
    ]
}

#[derive(Debug, Clone)]
enum SkipOp {
    Add(i64, u16),
    Remove(i64),
}

fn skip_op_strategy() -> impl Strategy<Value = SkipOp> {
    prop_oneof![
        3 => (-50i64..50, any::<u16>()).prop_map(|(k, v)| SkipOp::Add(k, v)),
        1 => (-50i64..50).prop_map(SkipOp::Remove),
    ]
}

fn manual_store(capacity: usize) -> (LruStore<String, u32>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(T0));
    (LruStore::with_options(capacity, None, clock.clone()), clock)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // Skip list behaves like an ordered map
    #[test]
    fn prop_skiplist_matches_btreemap(
        ops in prop::collection::vec(skip_op_strategy(), 1..200),
        seed in any::<u64>(),
        max_level in 1usize..8,
    ) {
        let mut list = SkipList::with_seed(max_level, seed);
        let mut model = BTreeMap::new();

        for op in ops {
            match op {
                SkipOp::Add(k, v) => {
                    list.add(k, v);
                    model.insert(k, v);
                }
                SkipOp::Remove(k) => {
                    prop_assert_eq!(list.remove(k), model.remove(&k));
                    prop_assert!(list.get(k).is_none());
                }
            }
        }

        list.check_structure();
        prop_assert_eq!(list.len(), model.len());
        prop_assert_eq!(list.head().map(|(k, v)| (k, *v)), model.iter().next().map(|(k, v)| (*k, *v)));
        for k in -55i64..55 {
            prop_assert_eq!(list.get(k), model.get(&k));
        }
        let listed: Vec<(i64, u16)> = list.iter().map(|(k, v)| (k, *v)).collect();
        let expected: Vec<(i64, u16)> = model.iter().map(|(k, v)| (*k, *v)).collect();
        prop_assert_eq!(listed, expected);
    }

    // Every operation leaves the three indices consistent, and the size
    // bookkeeping matches a model of which keys are present
    #[test]
    fn prop_store_invariants_hold(
        ops in prop::collection::vec(cache_op_strategy(), 1..150),
        capacity in 0usize..6,
    ) {
        let (mut store, clock) = manual_store(capacity);
        let mut present: HashSet<String> = HashSet::new();

        for op in ops {
            let before = store.len();
            let may_drop = match op {
                CacheOp::Add { key, value, ttl } => {
                    let existed = present.contains(&key);
                    store.add(key.clone(), value, ttl).unwrap();
                    if existed {
                        prop_assert_eq!(store.len(), before, "Re-adding must not change len");
                    } else {
                        prop_assert!(store.len() == before + 1 || (capacity > 0 && store.len() == capacity));
                    }
                    present.insert(key);
                    // Capacity eviction may take one other key
                    1
                }
                CacheOp::Get { key } => {
                    let _ = store.get(&key);
                    prop_assert_eq!(store.len(), before, "Lookups never remove entries");
                    0
                }
                CacheOp::Remove { key } => {
                    let removed = store.remove(&key).is_some();
                    prop_assert_eq!(removed, present.contains(&key));
                    present.remove(&key);
                    0
                }
                CacheOp::Tick { secs } => {
                    clock.advance(secs);
                    0
                }
                CacheOp::Sweep => {
                    let now = store.now();
                    store.drain_expired(now);
                    prop_assert!(!store.has_expired(now));
                    usize::MAX
                }
            };

            let tracked = present.len();
            present.retain(|k| store.contains_key(k));
            prop_assert!(tracked - present.len() <= may_drop, "Keys vanished outside an eviction path");

            store.check_invariants();
            if capacity > 0 {
                prop_assert!(store.len() <= capacity, "len {} over capacity {}", store.len(), capacity);
            }
            prop_assert_eq!(store.len(), present.len());
        }
    }

    // Values read back are the last ones written while the entry is live
    #[test]
    fn prop_store_get_returns_last_write(
        writes in prop::collection::vec((key_strategy(), any::<u32>()), 1..100),
    ) {
        let (mut store, _) = manual_store(0);
        let mut model = HashMap::new();

        for (key, value) in writes {
            store.add(key.clone(), value, 5).unwrap();
            model.insert(key, value);
        }
        for (key, value) in &model {
            prop_assert_eq!(store.get(key), Some(value));
        }
    }

    // A TTL of t seconds is live through second now + t and gone after
    #[test]
    fn prop_ttl_boundary(ttl in 1i64..100, probe in 0i64..200) {
        let (mut store, clock) = manual_store(0);
        store.add("k".to_string(), 1, ttl).unwrap();

        clock.advance(probe);
        let live = store.get(&"k".to_string()).is_some();
        prop_assert_eq!(live, probe <= ttl);
        prop_assert_eq!(store.len(), 1);
    }

    // Range and reverse visit the same live keys in opposite orders
    #[test]
    fn prop_range_reverse_mirror(
        ops in prop::collection::vec(cache_op_strategy(), 1..80),
    ) {
        let (mut store, clock) = manual_store(0);
        for op in ops {
            match op {
                CacheOp::Add { key, value, ttl } => {
                    store.add(key, value, ttl).unwrap();
                }
                CacheOp::Get { key } => {
                    let _ = store.get(&key);
                }
                CacheOp::Remove { key } => {
                    store.remove(&key);
                }
                CacheOp::Tick { secs } => clock.advance(secs),
                CacheOp::Sweep => {}
            }
        }

        let mut forward = Vec::new();
        store.range(|k, _, _| {
            forward.push(k.clone());
            true
        });
        let mut backward = Vec::new();
        store.reverse(|k, _, _| {
            backward.push(k.clone());
            true
        });
        backward.reverse();

        prop_assert_eq!(&forward, &backward);
        let unique: HashSet<_> = forward.iter().collect();
        prop_assert_eq!(unique.len(), forward.len(), "Each live key is visited once");
        for key in &forward {
            prop_assert!(store.peek(key).is_some());
        }
    }
}

// Property tests for LRU eviction behavior
proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // With no TTLs, the least recently touched key is the next victim
    #[test]
    fn prop_lru_eviction_order(
        keys in prop::collection::hash_set("[a-z]{1,6}", 2..10),
        touch_index in 0usize..100,
        new_key in "[0-9]{1,4}",
    ) {
        let keys: Vec<String> = keys.into_iter().collect();
        let capacity = keys.len();
        let (mut store, _) = manual_store(capacity);

        for (i, key) in keys.iter().enumerate() {
            store.add(key.clone(), i as u32, 0).unwrap();
        }

        // The touched key moves to the front; the oldest untouched key goes next
        let touched = &keys[touch_index % capacity];
        store.get(touched).unwrap();
        let expected_victim = if touched == &keys[0] { &keys[1] } else { &keys[0] };

        store.add(new_key.clone(), 0, 0).unwrap();

        prop_assert_eq!(store.len(), capacity);
        prop_assert!(store.peek(expected_victim).is_none(), "{} should have been evicted", expected_victim);
        prop_assert!(store.peek(touched).is_some());
        prop_assert!(store.peek(&new_key).is_some());
    }
}
