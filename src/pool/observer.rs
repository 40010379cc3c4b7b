// src/pool/observer.rs
//! Read-only observers for pool traversal
//!
//! `EnginePool::observe` walks every live runtime under the internal lock
//! and applies caller-supplied observers, so statistics never see a slot
//! mid-eviction. Returning `false` from an observer stops the traversal.

use crate::runtime::collaborator::ScriptRuntime;

/// Callback applied to each live runtime during an `observe` traversal
pub trait RuntimeObserver<R: ScriptRuntime>: Send {
    /// Observe one runtime; return `false` to stop the traversal
    fn observe(&mut self, runtime: &R) -> bool;
}

/// Counts live (constructed) runtimes
#[derive(Debug, Default)]
pub struct LiveRuntimeCounter {
    count: usize,
}

impl LiveRuntimeCounter {
    pub fn count(&self) -> usize {
        self.count
    }
}

impl<R: ScriptRuntime> RuntimeObserver<R> for LiveRuntimeCounter {
    fn observe(&mut self, _runtime: &R) -> bool {
        self.count += 1;
        true
    }
}

/// Tallies how many live runtimes are executing vs. sitting idle
#[derive(Debug, Default)]
pub struct InUseCollector {
    in_use: usize,
    idle: usize,
}

impl InUseCollector {
    pub fn in_use(&self) -> usize {
        self.in_use
    }

    pub fn idle(&self) -> usize {
        self.idle
    }
}

impl<R: ScriptRuntime> RuntimeObserver<R> for InUseCollector {
    fn observe(&mut self, runtime: &R) -> bool {
        if runtime.is_in_use() {
            self.in_use += 1;
        } else {
            self.idle += 1;
        }
        true
    }
}
