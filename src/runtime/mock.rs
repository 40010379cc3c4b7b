// src/runtime/mock.rs
//! Flag-and-counter test double for the runtime collaborator
//!
//! Used by this crate's tests and benches, and handy for embedders wiring
//! the pool before a real engine exists. Executions are simulated by
//! toggling the in-use flag; every lifecycle hook counts its calls.

use crate::pool::config::PoolConfig;
use crate::runtime::collaborator::{RuntimeFactory, ScriptRuntime};
use crate::utils::errors::{EngineError, Result};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// In-memory stand-in for an embedded script runtime
#[derive(Debug, Default)]
pub struct MockRuntime {
    closed: AtomicBool,
    in_use: AtomicBool,
    terminations: AtomicU32,
    context_resets: AtomicU32,
    isolate_resets: AtomicU32,
    gc_notifications: AtomicU32,
}

impl MockRuntime {
    /// Simulate entering/leaving a script execution
    pub fn set_in_use(&self, in_use: bool) {
        self.in_use.store(in_use, Ordering::SeqCst);
    }

    /// Times `terminate_execution` was called
    pub fn terminations(&self) -> u32 {
        self.terminations.load(Ordering::SeqCst)
    }

    /// Times `reset_context` was called
    pub fn context_resets(&self) -> u32 {
        self.context_resets.load(Ordering::SeqCst)
    }

    /// Times `reset_isolate` was called
    pub fn isolate_resets(&self) -> u32 {
        self.isolate_resets.load(Ordering::SeqCst)
    }

    /// Times `low_memory_notification` was called
    pub fn gc_notifications(&self) -> u32 {
        self.gc_notifications.load(Ordering::SeqCst)
    }
}

impl ScriptRuntime for MockRuntime {
    fn close(&self, _force: bool) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.in_use.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn is_in_use(&self) -> bool {
        self.in_use.load(Ordering::SeqCst)
    }

    fn terminate_execution(&self) -> Result<()> {
        self.terminations.fetch_add(1, Ordering::SeqCst);
        self.in_use.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn reset_context(&self) -> Result<()> {
        self.context_resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn reset_isolate(&self) -> Result<()> {
        self.isolate_resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn low_memory_notification(&self) {
        self.gc_notifications.fetch_add(1, Ordering::SeqCst);
    }
}

/// Factory producing [`MockRuntime`]s, with fault injection for tests
#[derive(Debug, Default)]
pub struct MockFactory {
    created: AtomicU32,
    failures_remaining: AtomicU32,
}

impl MockFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next `count` constructions fail
    pub fn fail_next(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Runtimes constructed by this factory
    pub fn created(&self) -> u32 {
        self.created.load(Ordering::SeqCst)
    }
}

impl RuntimeFactory for MockFactory {
    type Runtime = MockRuntime;

    fn create_runtime(&self, _config: &PoolConfig) -> Result<MockRuntime> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0
            && self
                .failures_remaining
                .compare_exchange(remaining, remaining - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            return Err(EngineError::RuntimeCreation("injected failure".to_string()));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(MockRuntime::default())
    }
}
