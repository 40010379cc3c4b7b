// src/pool/engine_guard.rs
//! Single-shot execution watchdog
//!
//! A guard is armed against one checked-out engine with a timeout. A
//! background task polls elapsed time on the monotonic clock and, once the
//! timeout is exceeded while the runtime is executing, signals the runtime
//! to abort. Termination is an interrupt, not a teardown: the engine stays
//! valid and reusable afterwards.
//!
//! Cancellation is cooperative: `cancel()` sets the quitting flag, which
//! the watchdog observes at its next poll tick, so callers must treat the
//! interrupt as asynchronous relative to the cancel call.

use crate::pool::config::PoolConfig;
use crate::pool::engine::Engine;
use crate::runtime::collaborator::ScriptRuntime;
use crate::utils::debug;
use metrics::counter;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{error, warn};

/// Watchdog bound to one checked-out engine
///
/// The guard's lifetime must not outlive its engine's checkout period.
/// Dropping the guard closes it.
pub struct EngineGuard<R: ScriptRuntime> {
    timeout_millis: Arc<AtomicU64>,
    quitting: Arc<AtomicBool>,
    skip_in_debug_mode: Arc<AtomicBool>,
    closed: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
    _marker: std::marker::PhantomData<fn() -> R>,
}

impl<R: ScriptRuntime> EngineGuard<R> {
    /// Arm a watchdog task against `engine`
    pub(crate) fn arm(engine: &Arc<Engine<R>>, timeout: Duration, config: Arc<PoolConfig>) -> Self {
        let timeout_millis = Arc::new(AtomicU64::new(timeout.as_millis() as u64));
        let quitting = Arc::new(AtomicBool::new(false));
        let skip_in_debug_mode = Arc::new(AtomicBool::new(true));

        let task = tokio::spawn(Self::watch(
            Arc::downgrade(engine),
            Arc::clone(&timeout_millis),
            Arc::clone(&quitting),
            Arc::clone(&skip_in_debug_mode),
            config.guard_check_interval(),
        ));

        Self {
            timeout_millis,
            quitting,
            skip_in_debug_mode,
            closed: AtomicBool::new(false),
            task: Mutex::new(Some(task)),
            _marker: std::marker::PhantomData,
        }
    }

    async fn watch(
        engine: Weak<Engine<R>>,
        timeout_millis: Arc<AtomicU64>,
        quitting: Arc<AtomicBool>,
        skip_in_debug_mode: Arc<AtomicBool>,
        check_interval: Duration,
    ) {
        let started = Instant::now();
        loop {
            if quitting.load(Ordering::Acquire) {
                break;
            }
            // The engine may be released or even evicted while we watch.
            let Some(engine) = engine.upgrade() else { break };
            if !engine.is_active() {
                break;
            }
            if skip_in_debug_mode.load(Ordering::Relaxed) && debug::debugger_attached() {
                break;
            }
            let timeout = Duration::from_millis(timeout_millis.load(Ordering::Relaxed));
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                if engine.runtime_ref().is_in_use() {
                    // Only interrupt a runtime that is actually executing.
                    match engine.runtime_ref().terminate_execution() {
                        Ok(()) => {
                            counter!("isopool.guard_terminations").increment(1);
                            warn!(
                                index = engine.index(),
                                elapsed_millis = elapsed.as_millis() as u64,
                                "execution terminated by guard"
                            );
                        }
                        Err(e) => {
                            error!(index = engine.index(), error = %e, "guard failed to terminate execution");
                        }
                    }
                }
                break;
            }
            drop(engine);
            tokio::time::sleep(check_interval).await;
        }
        quitting.store(true, Ordering::Release);
    }

    /// Ask the watchdog to stop. Observed at its next poll tick.
    pub fn cancel(&self) {
        self.quitting.store(true, Ordering::Release);
    }

    /// Whether the watchdog has fired or been cancelled
    pub fn is_quitting(&self) -> bool {
        self.quitting.load(Ordering::Acquire)
    }

    /// Current timeout in milliseconds
    pub fn timeout_millis(&self) -> u64 {
        self.timeout_millis.load(Ordering::Relaxed)
    }

    /// Adjust the deadline of an armed guard
    pub fn set_timeout_millis(&self, timeout_millis: u64) {
        self.timeout_millis.store(timeout_millis, Ordering::Relaxed);
    }

    /// Let the watchdog fire even while a debugger is attached
    pub fn enable_in_debug_mode(&self) {
        self.skip_in_debug_mode.store(false, Ordering::Relaxed);
    }

    /// Suppress firing while a debugger is attached (the default)
    pub fn disable_in_debug_mode(&self) {
        self.skip_in_debug_mode.store(true, Ordering::Relaxed);
    }

    /// Cancel the watchdog and reap its task. Idempotent; cancels even if
    /// the guard already fired.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel();
        if let Some(task) = self.task.lock().take() {
            if !task.is_finished() {
                task.abort();
            }
        }
    }
}

impl<R: ScriptRuntime> Drop for EngineGuard<R> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::mock::MockRuntime;
    use std::sync::Weak as StdWeak;

    fn guarded_engine(guard_interval_millis: u64) -> Arc<Engine<MockRuntime>> {
        let config = PoolConfig {
            engine_guard_check_interval_millis: guard_interval_millis,
            ..Default::default()
        };
        Arc::new(Engine::new(
            0,
            MockRuntime::default(),
            StdWeak::new(),
            Arc::new(config),
        ))
    }

    #[tokio::test]
    async fn test_guard_fires_on_timeout() {
        let engine = guarded_engine(10);
        engine.activate();
        engine.runtime_ref().set_in_use(true);

        let guard = Engine::guard_with_timeout(&engine, Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert_eq!(engine.runtime_ref().terminations(), 1);
        assert!(guard.is_quitting());
        // Termination is a signal: the engine survives it.
        assert!(!engine.is_closed());
    }

    #[tokio::test]
    async fn test_guard_does_not_fire_before_timeout() {
        let engine = guarded_engine(10);
        engine.activate();
        engine.runtime_ref().set_in_use(true);

        let guard = Engine::guard_with_timeout(&engine, Duration::from_secs(60));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!guard.is_quitting());
        assert_eq!(engine.runtime_ref().terminations(), 0);

        guard.close();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(guard.is_quitting());
        assert_eq!(engine.runtime_ref().terminations(), 0);
    }

    #[tokio::test]
    async fn test_guard_skips_idle_runtime_at_deadline() {
        let engine = guarded_engine(10);
        engine.activate();
        // Active checkout, but no script in flight when the timer expires.
        engine.runtime_ref().set_in_use(false);

        let guard = Engine::guard_with_timeout(&engine, Duration::from_millis(30));
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(guard.is_quitting());
        assert_eq!(engine.runtime_ref().terminations(), 0);
    }

    #[tokio::test]
    async fn test_guard_exits_when_engine_released() {
        let engine = guarded_engine(10);
        engine.activate();
        engine.runtime_ref().set_in_use(true);

        let guard = Engine::guard_with_timeout(&engine, Duration::from_millis(200));
        engine.set_active(false);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(guard.is_quitting());
        assert_eq!(engine.runtime_ref().terminations(), 0);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let engine = guarded_engine(10);
        engine.activate();
        let guard = Engine::guard_with_timeout(&engine, Duration::from_secs(60));
        guard.close();
        guard.close();
        assert!(guard.is_quitting());
    }

    #[tokio::test]
    async fn test_set_timeout_extends_deadline() {
        let engine = guarded_engine(50);
        engine.activate();
        engine.runtime_ref().set_in_use(true);

        let guard = Engine::guard_with_timeout(&engine, Duration::from_millis(120));
        guard.set_timeout_millis(60_000);
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(engine.runtime_ref().terminations(), 0);
        guard.close();
    }
}
