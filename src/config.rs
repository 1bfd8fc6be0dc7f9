//! Configuration Module
//!
//! Handles loading cache configuration from environment variables.

use std::env;
use std::str::FromStr;

use crate::error::{CacheError, Result};

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of entries, 0 = unbounded
    pub capacity: usize,
    /// Background sweep interval in seconds, 0 = no sweep task
    pub sweep_interval_secs: u64,
    /// Number of keys the demo binary inserts
    pub demo_keys: usize,
    /// TTL in seconds the demo binary gives to half of its keys
    pub demo_ttl_secs: i64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// Missing or unparsable values fall back to the defaults.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Maximum cache entries (default: 1000)
    /// - `SWEEP_INTERVAL` - Sweep frequency in seconds (default: 1)
    /// - `DEMO_KEYS` - Keys inserted by the demo binary (default: 100)
    /// - `DEMO_TTL` - TTL in seconds for demo keys (default: 2)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            capacity: lenient("CACHE_CAPACITY").unwrap_or(defaults.capacity),
            sweep_interval_secs: lenient("SWEEP_INTERVAL").unwrap_or(defaults.sweep_interval_secs),
            demo_keys: lenient("DEMO_KEYS").unwrap_or(defaults.demo_keys),
            demo_ttl_secs: lenient("DEMO_TTL").unwrap_or(defaults.demo_ttl_secs),
        }
    }

    /// Like [`Config::from_env`], but a variable that is set and fails to
    /// parse is reported instead of silently replaced by its default.
    pub fn try_from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            capacity: strict("CACHE_CAPACITY")?.unwrap_or(defaults.capacity),
            sweep_interval_secs: strict("SWEEP_INTERVAL")?.unwrap_or(defaults.sweep_interval_secs),
            demo_keys: strict("DEMO_KEYS")?.unwrap_or(defaults.demo_keys),
            demo_ttl_secs: strict("DEMO_TTL")?.unwrap_or(defaults.demo_ttl_secs),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: 1000,
            sweep_interval_secs: 1,
            demo_keys: 100,
            demo_ttl_secs: 2,
        }
    }
}

fn lenient<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

fn strict<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| CacheError::Config(format!("{}={}", name, raw))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.capacity, 1000);
        assert_eq!(config.sweep_interval_secs, 1);
        assert_eq!(config.demo_keys, 100);
        assert_eq!(config.demo_ttl_secs, 2);
    }

    // Env vars are process-global, so everything touching them lives in one test.
    #[test]
    fn test_config_from_env() {
        env::remove_var("CACHE_CAPACITY");
        env::remove_var("SWEEP_INTERVAL");
        env::remove_var("DEMO_KEYS");
        env::remove_var("DEMO_TTL");
        assert_eq!(Config::from_env(), Config::default());
        assert_eq!(Config::try_from_env().unwrap(), Config::default());

        env::set_var("CACHE_CAPACITY", "2");
        env::set_var("SWEEP_INTERVAL", "0");
        let config = Config::try_from_env().unwrap();
        assert_eq!(config.capacity, 2);
        assert_eq!(config.sweep_interval_secs, 0);

        env::set_var("CACHE_CAPACITY", "lots");
        assert_eq!(Config::from_env().capacity, 1000);
        assert!(matches!(Config::try_from_env(), Err(CacheError::Config(_))));

        env::remove_var("CACHE_CAPACITY");
        env::remove_var("SWEEP_INTERVAL");
    }
}
