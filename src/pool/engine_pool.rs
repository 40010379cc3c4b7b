// src/pool/engine_pool.rs
//! Fixed-capacity engine pool with a housekeeping daemon
//!
//! Slots live in exactly one of three sets at any quiescent point:
//!
//! ```text
//! EnginePool
//! ├─ idle:     [0, 3, ...]   constructed, unused, ready (FIFO reuse)
//! ├─ active:   (derived)     checked out by callers
//! └─ released: [1, 2, ...]   empty, awaiting lazy construction
//! ```
//!
//! Single-slot transitions ride lock-free queues; whole-pool scans (the
//! daemon's eviction pass, `observe`, shutdown reconciliation) serialize
//! on one internal lock so no scan sees a slot mid-mutation. A counting
//! semaphore bounds how many slots may be under construction or active at
//! once; checkout backs off with bounded, randomized retries instead of
//! blocking forever.

use crate::pool::config::PoolConfig;
use crate::pool::engine::Engine;
use crate::pool::engine_guard::EngineGuard;
use crate::pool::observer::RuntimeObserver;
use crate::runtime::collaborator::{RuntimeFactory, ScriptRuntime};
use crate::utils::errors::{EngineError, Result};
use crossbeam::queue::ArrayQueue;
use metrics::{counter, gauge};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Fixed-capacity registry of engine slots with checkout/release admission
/// control and a background eviction/reset daemon
pub struct EnginePool<R: ScriptRuntime> {
    config: Arc<PoolConfig>,
    factory: Arc<dyn RuntimeFactory<Runtime = R>>,

    /// Slot array; the internal lock serializing whole-pool scans
    engines: Mutex<Vec<Option<Arc<Engine<R>>>>>,

    /// Constructed, unused slot indices (FIFO)
    idle_indexes: ArrayQueue<usize>,

    /// Empty slot indices awaiting lazy construction
    released_indexes: ArrayQueue<usize>,

    /// Admission permits: capacity not currently active or under construction
    admission: Semaphore,

    /// Daemon sleep/wake signal; carries no data-protection duty
    daemon_wakeup: Arc<Notify>,

    active: AtomicBool,
    quitting: AtomicBool,
    daemon: Mutex<Option<JoinHandle<()>>>,
}

impl<R: ScriptRuntime> EnginePool<R> {
    /// Start a pool: validate the config, seed every slot as released and
    /// spawn the housekeeping daemon. Capacity is frozen from here on.
    ///
    /// Must be called within a tokio runtime.
    pub fn new(
        config: PoolConfig,
        factory: Arc<dyn RuntimeFactory<Runtime = R>>,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        let capacity = config.pool_max_size;

        let released_indexes = ArrayQueue::new(capacity);
        for index in 0..capacity {
            let _ = released_indexes.push(index);
        }

        let pool = Arc::new(Self {
            config: Arc::new(config),
            factory,
            engines: Mutex::new(vec![None; capacity]),
            idle_indexes: ArrayQueue::new(capacity),
            released_indexes,
            admission: Semaphore::new(capacity),
            daemon_wakeup: Arc::new(Notify::new()),
            active: AtomicBool::new(false),
            quitting: AtomicBool::new(false),
            daemon: Mutex::new(None),
        });

        let daemon = tokio::spawn(Self::daemon_loop(Arc::downgrade(&pool)));
        *pool.daemon.lock() = Some(daemon);
        pool.active.store(true, Ordering::Release);
        info!(
            capacity,
            min_size = pool.config.pool_min_size,
            "engine pool started"
        );
        Ok(pool)
    }

    /// The pool's frozen configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Check an engine out, waiting with bounded randomized retries.
    ///
    /// Prefers FIFO reuse of an idle engine; otherwise constructs one
    /// lazily in a released slot. Fails with
    /// [`EngineError::EngineNotAvailable`] once the retry budget is spent.
    pub async fn get_engine(self: &Arc<Self>) -> Result<Arc<Engine<R>>> {
        debug!("engine checkout begins");
        let wait_started = Instant::now();
        let mut retries: u32 = 0;
        let mut next_wait_warning = self.config.wait_log_interval();

        loop {
            if !self.is_active() || self.is_quitting() {
                return Err(EngineError::PoolClosed);
            }
            if let Ok(permit) = self.admission.try_acquire() {
                // The permit travels with the engine until release_engine.
                permit.forget();
                match self.checkout_slot() {
                    Ok(Some(engine)) => {
                        engine.activate();
                        counter!("isopool.checkouts").increment(1);
                        gauge!("isopool.idle_engines").set(self.idle_engine_count() as f64);
                        debug!(index = engine.index(), "engine checkout ends");
                        return Ok(engine);
                    }
                    Ok(None) => {
                        // Both queues momentarily empty: a slot is in flight
                        // between idle and released under the daemon. Retry.
                        self.admission.add_permits(1);
                    }
                    Err(e) => {
                        self.admission.add_permits(1);
                        error!(error = %e, "engine construction failed");
                    }
                }
            }

            if retries >= self.config.wait_for_engine_max_retry_count {
                let waited_millis = wait_started.elapsed().as_millis() as u64;
                warn!(retries, waited_millis, "engine checkout retries exhausted");
                return Err(EngineError::EngineNotAvailable {
                    retries,
                    waited_millis,
                });
            }
            retries += 1;
            if wait_started.elapsed() >= next_wait_warning {
                warn!(
                    waited_millis = wait_started.elapsed().as_millis() as u64,
                    retries, "still waiting for an engine"
                );
                next_wait_warning += self.config.wait_log_interval();
            }
            tokio::time::sleep(self.random_backoff()).await;
        }
    }

    /// Return an engine to the pool. Never blocks and never fails: release
    /// must not be throttled by the admission control that gates checkout.
    pub fn release_engine(&self, engine: &Engine<R>) {
        debug!(index = engine.index(), "engine release begins");
        engine.set_active(false);
        if self.is_quitting() || !self.is_active() {
            // Shutdown reconciliation owns the slots now.
            debug!(index = engine.index(), "release after close ignored");
            return;
        }
        if self.config.auto_send_gc_notification {
            engine.send_gc_notification();
        }
        if self.idle_indexes.push(engine.index()).is_err() {
            warn!(
                index = engine.index(),
                "idle queue rejected index; duplicate release?"
            );
            return;
        }
        self.admission.add_permits(1);
        counter!("isopool.releases").increment(1);
        self.wake_up_daemon();
        debug!(index = engine.index(), "engine release ends");
    }

    /// Arm a watchdog for a checked-out engine
    pub fn get_guard(&self, engine: &Arc<Engine<R>>, timeout: Duration) -> EngineGuard<R> {
        Engine::guard_with_timeout(engine, timeout)
    }

    /// Apply observers to every live runtime under the internal lock.
    ///
    /// Returns the number of engines processed; an observer returning
    /// `false` stops the traversal early.
    pub fn observe(&self, observers: &mut [&mut dyn RuntimeObserver<R>]) -> usize {
        if observers.is_empty() {
            return 0;
        }
        let engines = self.engines.lock();
        let mut processed = 0;
        'scan: for slot in engines.iter() {
            let Some(engine) = slot else { continue };
            processed += 1;
            for observer in observers.iter_mut() {
                if !observer.observe(engine.runtime_ref()) {
                    break 'scan;
                }
            }
        }
        processed
    }

    /// Constructed engines currently sitting unused
    pub fn idle_engine_count(&self) -> usize {
        self.idle_indexes.len()
    }

    /// Empty slots awaiting lazy construction
    pub fn released_engine_count(&self) -> usize {
        self.released_indexes.len()
    }

    /// Checked-out engines, derived from capacity minus the other two sets
    pub fn active_engine_count(&self) -> usize {
        self.config
            .pool_max_size
            .saturating_sub(self.idle_engine_count())
            .saturating_sub(self.released_engine_count())
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn is_quitting(&self) -> bool {
        self.quitting.load(Ordering::Acquire)
    }

    /// Cut the daemon's sleep short, e.g. after a release
    pub fn wake_up_daemon(&self) {
        self.daemon_wakeup.notify_one();
    }

    /// Shut the pool down: stop the daemon, force-terminate anything still
    /// executing, close every live engine and leave all slots released.
    pub async fn close(&self) {
        debug!("engine pool close begins");
        self.quitting.store(true, Ordering::Release);
        self.wake_up_daemon();

        let daemon = self.daemon.lock().take();
        if let Some(mut daemon) = daemon {
            match tokio::time::timeout(self.config.shutdown_timeout(), &mut daemon).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "daemon task failed"),
                Err(_) => {
                    warn!(
                        timeout_seconds = self.config.pool_shutdown_timeout_seconds,
                        "daemon did not stop in time; forcing shutdown"
                    );
                    daemon.abort();
                    // The daemon never holds the slot lock across an await,
                    // so reconciling from here cannot deadlock.
                    self.run_shutdown_pass();
                }
            }
        }

        self.active.store(false, Ordering::Release);
        self.quitting.store(false, Ordering::Release);
        debug!("engine pool close ends");
    }

    fn random_backoff(&self) -> Duration {
        let delays = &self.config.wait_for_engine_sleep_interval_millis;
        let millis = delays.choose(&mut rand::thread_rng()).copied().unwrap_or(5);
        Duration::from_millis(millis)
    }

    /// Pop an engine for checkout: idle first, then lazy construction.
    fn checkout_slot(self: &Arc<Self>) -> Result<Option<Arc<Engine<R>>>> {
        if let Some(index) = self.idle_indexes.pop() {
            let engine = self.engines.lock()[index].clone();
            return match engine {
                Some(engine) => Ok(Some(engine)),
                None => {
                    // Raced the eviction pass: an idle index with an empty
                    // slot. Heal by constructing in place; checkout must
                    // never hand out an invalid engine.
                    error!(index, "idle index resolved to an empty slot; reconstructing");
                    self.construct_engine(index).map(Some)
                }
            };
        }
        if let Some(index) = self.released_indexes.pop() {
            return self.construct_engine(index).map(Some);
        }
        Ok(None)
    }

    fn construct_engine(self: &Arc<Self>, index: usize) -> Result<Arc<Engine<R>>> {
        match self.factory.create_runtime(&self.config) {
            Ok(runtime) => {
                let engine = Arc::new(Engine::new(
                    index,
                    runtime,
                    Arc::downgrade(self),
                    Arc::clone(&self.config),
                ));
                self.engines.lock()[index] = Some(Arc::clone(&engine));
                counter!("isopool.constructions").increment(1);
                debug!(index, "constructed engine");
                Ok(engine)
            }
            Err(e) => {
                // Hand the slot back so capacity is not leaked.
                let _ = self.released_indexes.push(index);
                Err(e)
            }
        }
    }

    async fn daemon_loop(pool: Weak<Self>) {
        debug!("engine pool daemon begins");
        let wakeup = match pool.upgrade() {
            Some(pool) => Arc::clone(&pool.daemon_wakeup),
            None => return,
        };
        loop {
            // Holding only a Weak between cycles lets a pool dropped without
            // close() shut its daemon down.
            let Some(pool) = pool.upgrade() else { return };
            if pool.is_quitting() {
                pool.run_shutdown_pass();
                break;
            }
            pool.run_maintenance_pass();
            let check_interval = pool.config.daemon_check_interval();
            drop(pool);
            let _ = tokio::time::timeout(check_interval, wakeup.notified()).await;
        }
        debug!("engine pool daemon ends");
    }

    /// One housekeeping cycle: evict over-idle engines beyond the minimum
    /// and context-reset long-lived ones.
    fn run_maintenance_pass(&self) {
        let mut engines = self.engines.lock();
        // Snapshot at the top of the cycle so engines released mid-scan are
        // not evicted in the same pass.
        let initial_idle_count = self.idle_indexes.len();
        for _ in self.config.pool_min_size..initial_idle_count {
            let immediate_idle_count = self.idle_indexes.len();
            let Some(index) = self.idle_indexes.pop() else { break };
            let Some(engine) = engines[index].clone() else {
                error!(index, "idle index resolved to an empty slot; reclassifying as released");
                let _ = self.released_indexes.push(index);
                continue;
            };
            let expired = engine.idle_duration() >= self.config.idle_timeout();
            if immediate_idle_count > self.config.pool_max_size || expired {
                if let Err(e) = engine.close(true) {
                    error!(index, error = %e, "failed to close idle engine");
                }
                engines[index] = None;
                let _ = self.released_indexes.push(index);
                counter!("isopool.evictions").increment(1);
                debug!(index, "evicted idle engine");
            } else {
                if let Some(reset_after) = self.config.reset_engine_timeout() {
                    if engine.since_last_reset() >= reset_after {
                        debug!(index, "periodic context reset begins");
                        if let Err(e) = engine.reset_context() {
                            error!(index, error = %e, "failed to reset idle engine");
                        }
                        debug!(index, "periodic context reset ends");
                    }
                }
                let _ = self.idle_indexes.push(index);
            }
        }
        gauge!("isopool.idle_engines").set(self.idle_engine_count() as f64);
        gauge!("isopool.released_engines").set(self.released_engine_count() as f64);
    }

    /// Final pass: terminate still-active executions, close every live
    /// engine and leave each slot index exactly once in released.
    fn run_shutdown_pass(&self) {
        info!(
            active = self.active_engine_count(),
            idle = self.idle_engine_count(),
            capacity = self.config.pool_max_size,
            "engine pool daemon quitting"
        );
        let mut engines = self.engines.lock();
        for (index, slot) in engines.iter_mut().enumerate() {
            if let Some(engine) = slot.take() {
                if engine.is_active() {
                    if let Err(e) = engine.runtime_ref().terminate_execution() {
                        error!(index, error = %e, "failed to terminate active engine");
                    }
                }
                if let Err(e) = engine.close(true) {
                    error!(index, error = %e, "failed to close engine");
                }
            }
        }
        while self.idle_indexes.pop().is_some() {}
        while self.released_indexes.pop().is_some() {}
        for index in 0..engines.len() {
            let _ = self.released_indexes.push(index);
        }
    }
}
