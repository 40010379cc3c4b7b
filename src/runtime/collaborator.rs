// src/runtime/collaborator.rs
//! The abstract runtime collaborator consumed by the pool
//!
//! The pool never looks inside a runtime: it only needs lifecycle and
//! interruption hooks. Embedders implement these two traits around their
//! engine of choice; everything engine-specific (value conversion, module
//! loading, heap statistics) stays on the embedder's side of the seam.

use crate::pool::config::PoolConfig;
use crate::registry;
use crate::utils::errors::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One embedded script-execution context.
///
/// A runtime is only ever driven by a single logical owner at a time (the
/// thread that checked its engine out), but `terminate_execution` and the
/// liveness probes must be callable from a watchdog task while the owner is
/// executing, so every method takes `&self`.
pub trait ScriptRuntime: Send + Sync + 'static {
    /// Tear the runtime down. `force` skips any cooperative draining.
    fn close(&self, force: bool) -> Result<()>;

    /// Whether the runtime has been closed
    fn is_closed(&self) -> bool;

    /// Whether the runtime is currently executing a script
    fn is_in_use(&self) -> bool;

    /// Signal the runtime to abort the execution in flight.
    ///
    /// This is an interrupt, not a teardown: the runtime stays usable.
    fn terminate_execution(&self) -> Result<()>;

    /// Discard global script state (the cheap reset)
    fn reset_context(&self) -> Result<()>;

    /// Discard the whole isolate state (the expensive reset)
    fn reset_isolate(&self) -> Result<()>;

    /// Hint the runtime that now is a good moment to collect garbage
    fn low_memory_notification(&self);
}

/// Constructs runtimes for lazy pool slots
pub trait RuntimeFactory: Send + Sync + 'static {
    type Runtime: ScriptRuntime;

    /// Create one runtime instance. Called while no pool lock is held.
    fn create_runtime(&self, config: &PoolConfig) -> Result<Self::Runtime>;
}

/// Process-wide runtime construction/teardown counters.
///
/// Lives in the typed singleton registry; every pool in the process reports
/// into the same census.
#[derive(Debug, Default)]
pub struct RuntimeCensus {
    created: AtomicU64,
    closed: AtomicU64,
}

impl RuntimeCensus {
    /// The process-wide census instance
    pub fn global() -> Arc<RuntimeCensus> {
        registry::singleton::<RuntimeCensus>()
    }

    pub(crate) fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_closed(&self) {
        self.closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Runtimes constructed since process start
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Runtimes closed since process start
    pub fn closed(&self) -> u64 {
        self.closed.load(Ordering::Relaxed)
    }

    /// Runtimes currently alive
    pub fn live(&self) -> u64 {
        self.created().saturating_sub(self.closed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_census_is_monotonic() {
        let census = RuntimeCensus::global();
        let created_before = census.created();
        let closed_before = census.closed();
        census.record_created();
        census.record_closed();
        assert!(census.created() > created_before);
        assert!(census.closed() > closed_before);
    }

    #[test]
    fn test_census_live_never_underflows() {
        let census = RuntimeCensus::default();
        census.record_closed();
        assert_eq!(census.live(), 0);
    }
}
