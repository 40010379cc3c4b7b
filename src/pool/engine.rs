// src/pool/engine.rs
//! Pooled engine handle
//!
//! Wraps one runtime instance with its slot index, active flag and usage
//! bookkeeping. Engines are created lazily by the pool, cycle between the
//! idle and active sets across checkouts, and are destroyed only by the
//! daemon's eviction pass or at pool shutdown.

use crate::pool::config::PoolConfig;
use crate::pool::engine_guard::EngineGuard;
use crate::pool::engine_pool::EnginePool;
use crate::runtime::collaborator::{RuntimeCensus, ScriptRuntime};
use crate::utils::errors::Result;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::warn;

/// Usage bookkeeping for one engine, on the monotonic clock
#[derive(Debug)]
pub(crate) struct EngineUsage {
    last_active: Mutex<Instant>,
    last_reset: Mutex<Instant>,
    used_count: AtomicU64,
}

impl EngineUsage {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            last_active: Mutex::new(now),
            last_reset: Mutex::new(now),
            used_count: AtomicU64::new(0),
        }
    }

    fn touch(&self) {
        *self.last_active.lock() = Instant::now();
    }

    fn reset(&self) {
        self.used_count.store(0, Ordering::Relaxed);
        *self.last_reset.lock() = Instant::now();
    }
}

/// A pooled handle around one runtime instance
pub struct Engine<R: ScriptRuntime> {
    index: usize,
    runtime: R,
    pool: Weak<EnginePool<R>>,
    config: Arc<PoolConfig>,
    active: AtomicBool,
    usage: EngineUsage,
}

impl<R: ScriptRuntime> Engine<R> {
    pub(crate) fn new(
        index: usize,
        runtime: R,
        pool: Weak<EnginePool<R>>,
        config: Arc<PoolConfig>,
    ) -> Self {
        RuntimeCensus::global().record_created();
        Self {
            index,
            runtime,
            pool,
            config,
            active: AtomicBool::new(false),
            usage: EngineUsage::new(),
        }
    }

    /// Stable slot index in `[0, pool_max_size)`
    pub fn index(&self) -> usize {
        self.index
    }

    /// The owned runtime. Marks the engine active and touches its
    /// last-active timestamp.
    pub fn runtime(&self) -> &R {
        self.set_active(true);
        &self.runtime
    }

    /// Runtime access without the activation side effect, for the daemon
    /// and watchdogs.
    pub(crate) fn runtime_ref(&self) -> &R {
        &self.runtime
    }

    /// Whether the engine is checked out
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Whether the underlying runtime has been closed
    pub fn is_closed(&self) -> bool {
        self.runtime.is_closed()
    }

    /// Checkouts since creation or last reset
    pub fn used_count(&self) -> u64 {
        self.usage.used_count.load(Ordering::Relaxed)
    }

    /// Time since the last activation or deactivation
    pub fn idle_duration(&self) -> Duration {
        self.usage.last_active.lock().elapsed()
    }

    pub(crate) fn since_last_reset(&self) -> Duration {
        self.usage.last_reset.lock().elapsed()
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
        self.usage.touch();
    }

    /// Checkout bookkeeping: mark active and count the use
    pub(crate) fn activate(&self) {
        self.set_active(true);
        self.usage.used_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Discard the runtime's global script state and zero the usage stats
    pub fn reset_context(&self) -> Result<()> {
        self.runtime.reset_context()?;
        self.usage.reset();
        Ok(())
    }

    /// Discard the runtime's whole isolate state and zero the usage stats
    pub fn reset_isolate(&self) -> Result<()> {
        self.runtime.reset_isolate()?;
        self.usage.reset();
        Ok(())
    }

    /// Forward a GC hint to the runtime
    pub fn send_gc_notification(&self) {
        self.runtime.low_memory_notification();
    }

    /// Cooperative close hands the engine back to its pool; forced close
    /// tears the runtime down unconditionally (eviction, shutdown).
    pub fn close(&self, force: bool) -> Result<()> {
        self.set_active(false);
        if force {
            if self.config.gc_before_engine_close {
                self.runtime.low_memory_notification();
            }
            self.runtime.close(true)?;
            RuntimeCensus::global().record_closed();
            Ok(())
        } else {
            match self.pool.upgrade() {
                Some(pool) => {
                    pool.release_engine(self);
                    Ok(())
                }
                None => {
                    // Pool already gone; nothing to return the slot to.
                    warn!(index = self.index, "cooperative close without a pool; closing runtime");
                    self.runtime.close(true)?;
                    RuntimeCensus::global().record_closed();
                    Ok(())
                }
            }
        }
    }

    /// Arm a watchdog with the configured default timeout.
    ///
    /// Associated function in the `Arc::downgrade` style: the guard keeps a
    /// weak back-reference, never ownership.
    pub fn guard(this: &Arc<Self>) -> EngineGuard<R> {
        Self::guard_with_timeout(this, this.config.default_guard_timeout())
    }

    /// Arm a watchdog that interrupts the runtime once `timeout` elapses
    pub fn guard_with_timeout(this: &Arc<Self>, timeout: Duration) -> EngineGuard<R> {
        EngineGuard::arm(this, timeout, Arc::clone(&this.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::mock::MockRuntime;

    fn standalone_engine() -> Engine<MockRuntime> {
        Engine::new(
            0,
            MockRuntime::default(),
            Weak::new(),
            Arc::new(PoolConfig::default()),
        )
    }

    #[test]
    fn test_runtime_access_marks_active() {
        let engine = standalone_engine();
        assert!(!engine.is_active());
        let _ = engine.runtime();
        assert!(engine.is_active());
    }

    #[test]
    fn test_activate_counts_uses() {
        let engine = standalone_engine();
        engine.activate();
        engine.activate();
        assert_eq!(engine.used_count(), 2);
    }

    #[test]
    fn test_reset_context_zeroes_usage() {
        let engine = standalone_engine();
        engine.activate();
        assert_eq!(engine.used_count(), 1);
        engine.reset_context().unwrap();
        assert_eq!(engine.used_count(), 0);
        assert_eq!(engine.runtime_ref().context_resets(), 1);
    }

    #[test]
    fn test_force_close_tears_down_runtime() {
        let engine = standalone_engine();
        engine.close(true).unwrap();
        assert!(engine.is_closed());
        assert!(!engine.is_active());
    }

    #[test]
    fn test_force_close_sends_gc_when_configured() {
        let config = PoolConfig {
            gc_before_engine_close: true,
            ..Default::default()
        };
        let engine = Engine::new(0, MockRuntime::default(), Weak::new(), Arc::new(config));
        engine.close(true).unwrap();
        assert_eq!(engine.runtime_ref().gc_notifications(), 1);
    }

    #[test]
    fn test_cooperative_close_without_pool_closes_runtime() {
        let engine = standalone_engine();
        engine.close(false).unwrap();
        assert!(engine.is_closed());
    }
}
