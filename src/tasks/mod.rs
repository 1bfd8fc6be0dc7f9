//! Background Tasks Module
//!
//! Contains background tasks that run periodically while a cache is alive.
//!
//! # Tasks
//! - Expiration sweep: removes expired cache entries at a configured interval

mod sweep;

pub use sweep::{spawn_sweep_task, sweep_once, SweepHandle};
