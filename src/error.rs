//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
///
/// Absent keys are never errors; lookups report them through `Option`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Caller passed an argument outside the operation's contract
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A background sweep was requested outside a tokio runtime
    #[error("No tokio runtime available to run the sweep task")]
    NoRuntime,

    /// A configuration value could not be parsed
    #[error("Invalid configuration: {0}")]
    Config(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
