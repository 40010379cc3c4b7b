// src/utils/errors.rs
//! Error types for the engine pool
//!
//! Checkout is the only path that surfaces errors to application code;
//! daemon and watchdog failures are logged and recovered locally, because
//! a background task has no caller to observe them.

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by the engine pool and its collaborators
#[derive(Debug, Error)]
pub enum EngineError {
    /// Checkout retries exhausted under sustained load
    #[error("no engine available after {retries} retries ({waited_millis}ms waited)")]
    EngineNotAvailable { retries: u32, waited_millis: u64 },

    /// Checkout attempted on a pool that is closed or closing
    #[error("engine pool is closed")]
    PoolClosed,

    /// Configuration rejected by validation
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),

    /// Lazy runtime construction failed
    #[error("failed to create runtime: {0}")]
    RuntimeCreation(String),

    /// Failure reported by the underlying runtime
    #[error("runtime error: {0}")]
    Runtime(String),

    /// Execution was forcibly interrupted by an engine guard
    #[error("execution terminated by watchdog")]
    ExecutionTerminated,
}

impl EngineError {
    /// Whether the failed execution may be continued on the same engine.
    ///
    /// A watchdog kill is final for the interrupted script; everything else
    /// leaves the caller free to retry.
    pub fn continuable(&self) -> bool {
        !matches!(self, EngineError::ExecutionTerminated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminated_is_not_continuable() {
        assert!(!EngineError::ExecutionTerminated.continuable());
        assert!(EngineError::PoolClosed.continuable());
        assert!(EngineError::EngineNotAvailable {
            retries: 3,
            waited_millis: 15
        }
        .continuable());
    }

    #[test]
    fn test_display_includes_retry_budget() {
        let error = EngineError::EngineNotAvailable {
            retries: 5,
            waited_millis: 40,
        };
        let message = error.to_string();
        assert!(message.contains("5 retries"));
        assert!(message.contains("40ms"));
    }
}
