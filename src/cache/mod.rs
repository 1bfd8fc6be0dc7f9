//! Cache Module
//!
//! Provides in-memory caching with LRU eviction and per-entry TTL expiration,
//! plus the skip list used as the expiration index.

mod engine;
mod entry;
mod lru;
pub mod skiplist;
mod stats;
mod store;
mod txn;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use engine::{Cache, CacheBuilder};
pub use entry::{CacheEntry, Clock, ManualClock, SystemClock};
pub use lru::RecencyList;
pub use skiplist::SkipList;
pub use stats::{CacheStats, RemovalCause};
pub use store::{EvictionCallback, LruStore};
pub use txn::{RTxn, Txn};
