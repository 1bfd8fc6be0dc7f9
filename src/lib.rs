//! lru_ttl - An in-process LRU cache with per-entry TTL
//!
//! Entries are ordered by recency for LRU eviction and indexed by expiration
//! second in a skip list, so both the least recently used entry and the next
//! entry to expire are found cheaply. A background task sweeps expired
//! entries on a fixed interval.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{Cache, CacheBuilder, CacheStats, Clock, ManualClock, RTxn, SkipList, SystemClock, Txn};
pub use config::Config;
pub use error::{CacheError, Result};
