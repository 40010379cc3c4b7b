// src/pool/config.rs
//! Engine pool configuration
//!
//! Sizes, timeouts and the checkout retry/backoff schedule. A pool
//! snapshots its configuration into an `Arc` when it starts, so the
//! values are frozen for the pool's lifetime by construction.

use crate::utils::errors::{EngineError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Hard upper bound on pool capacity
pub const MAX_POOL_SIZE: usize = 4096;

/// Default watchdog timeout for guards armed without an explicit one
pub const DEFAULT_ENGINE_GUARD_TIMEOUT_MILLIS: u64 = 30_000;

/// Default watchdog poll interval
pub const DEFAULT_ENGINE_GUARD_CHECK_INTERVAL_MILLIS: u64 = 1_000;

/// Default idle lifetime before an engine beyond the minimum is evicted
pub const DEFAULT_POOL_IDLE_TIMEOUT_SECONDS: u64 = 60;

/// Default daemon housekeeping cadence
pub const DEFAULT_POOL_DAEMON_CHECK_INTERVAL_MILLIS: u64 = 1_000;

/// Default age at which a long-lived engine gets a context reset
pub const DEFAULT_RESET_ENGINE_TIMEOUT_SECONDS: u64 = 3_600;

/// Default grace period for the daemon to stop on close
pub const DEFAULT_POOL_SHUTDOWN_TIMEOUT_SECONDS: u64 = 5;

/// Default checkout retry budget
pub const DEFAULT_WAIT_FOR_ENGINE_MAX_RETRY_COUNT: u32 = 500;

/// Default cadence of slow-checkout warnings
pub const DEFAULT_WAIT_FOR_ENGINE_LOG_INTERVAL_MILLIS: u64 = 1_000;

/// Default candidate backoff delays for checkout retries
pub const DEFAULT_WAIT_FOR_ENGINE_SLEEP_INTERVAL_MILLIS: [u64; 6] = [5, 6, 7, 8, 9, 10];

/// Configuration consumed by the pool, its daemon and its guards
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Engines retained through idle eviction (>= 1)
    pub pool_min_size: usize,

    /// Total slot capacity, frozen when the pool starts (>= min, <= 4096)
    pub pool_max_size: usize,

    /// Idle lifetime before an engine beyond the minimum is evicted (> 0)
    pub pool_idle_timeout_seconds: u64,

    /// Daemon housekeeping cadence (> 0)
    pub pool_daemon_check_interval_millis: u64,

    /// Age at which a long-lived engine gets a context reset; 0 disables
    pub reset_engine_timeout_seconds: u64,

    /// Checkout retry budget; 0 fails on the first unavailable attempt
    pub wait_for_engine_max_retry_count: u32,

    /// Candidate backoff delays, one chosen at random per retry (non-empty)
    pub wait_for_engine_sleep_interval_millis: Vec<u64>,

    /// Cadence of warnings while a checkout waits
    pub wait_for_engine_log_interval_millis: u64,

    /// Grace period for the daemon to stop on close (> 0)
    pub pool_shutdown_timeout_seconds: u64,

    /// Watchdog timeout for guards armed without an explicit one
    pub default_engine_guard_timeout_millis: u64,

    /// Watchdog poll interval (> 0)
    pub engine_guard_check_interval_millis: u64,

    /// Send a GC hint to the runtime on every release
    pub auto_send_gc_notification: bool,

    /// Send a GC hint before force-closing a runtime
    pub gc_before_engine_close: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let cpu_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            pool_min_size: (cpu_count / 2).max(1),
            pool_max_size: cpu_count.max(1),
            pool_idle_timeout_seconds: DEFAULT_POOL_IDLE_TIMEOUT_SECONDS,
            pool_daemon_check_interval_millis: DEFAULT_POOL_DAEMON_CHECK_INTERVAL_MILLIS,
            reset_engine_timeout_seconds: DEFAULT_RESET_ENGINE_TIMEOUT_SECONDS,
            wait_for_engine_max_retry_count: DEFAULT_WAIT_FOR_ENGINE_MAX_RETRY_COUNT,
            wait_for_engine_sleep_interval_millis: DEFAULT_WAIT_FOR_ENGINE_SLEEP_INTERVAL_MILLIS
                .to_vec(),
            wait_for_engine_log_interval_millis: DEFAULT_WAIT_FOR_ENGINE_LOG_INTERVAL_MILLIS,
            pool_shutdown_timeout_seconds: DEFAULT_POOL_SHUTDOWN_TIMEOUT_SECONDS,
            default_engine_guard_timeout_millis: DEFAULT_ENGINE_GUARD_TIMEOUT_MILLIS,
            engine_guard_check_interval_millis: DEFAULT_ENGINE_GUARD_CHECK_INTERVAL_MILLIS,
            auto_send_gc_notification: true,
            gc_before_engine_close: false,
        }
    }
}

impl PoolConfig {
    /// Load configuration from a TOML/YAML/JSON file with an `ISOPOOL_`
    /// environment overlay, then validate it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix("ISOPOOL"))
            .build()
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        let config: PoolConfig = settings
            .try_deserialize()
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pool cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.pool_min_size < 1 {
            return Err(EngineError::InvalidConfig(
                "pool_min_size must be at least 1".to_string(),
            ));
        }
        if self.pool_max_size < self.pool_min_size {
            return Err(EngineError::InvalidConfig(format!(
                "pool_max_size ({}) must be >= pool_min_size ({})",
                self.pool_max_size, self.pool_min_size
            )));
        }
        if self.pool_max_size > MAX_POOL_SIZE {
            return Err(EngineError::InvalidConfig(format!(
                "pool_max_size ({}) exceeds the hard bound of {MAX_POOL_SIZE}",
                self.pool_max_size
            )));
        }
        if self.pool_idle_timeout_seconds == 0 {
            return Err(EngineError::InvalidConfig(
                "pool_idle_timeout_seconds must be positive".to_string(),
            ));
        }
        if self.pool_daemon_check_interval_millis == 0 {
            return Err(EngineError::InvalidConfig(
                "pool_daemon_check_interval_millis must be positive".to_string(),
            ));
        }
        if self.pool_shutdown_timeout_seconds == 0 {
            return Err(EngineError::InvalidConfig(
                "pool_shutdown_timeout_seconds must be positive".to_string(),
            ));
        }
        if self.engine_guard_check_interval_millis == 0 {
            return Err(EngineError::InvalidConfig(
                "engine_guard_check_interval_millis must be positive".to_string(),
            ));
        }
        if self.wait_for_engine_sleep_interval_millis.is_empty() {
            return Err(EngineError::InvalidConfig(
                "wait_for_engine_sleep_interval_millis must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_idle_timeout_seconds)
    }

    pub fn daemon_check_interval(&self) -> Duration {
        Duration::from_millis(self.pool_daemon_check_interval_millis)
    }

    /// `None` when periodic reset is disabled
    pub fn reset_engine_timeout(&self) -> Option<Duration> {
        (self.reset_engine_timeout_seconds > 0)
            .then(|| Duration::from_secs(self.reset_engine_timeout_seconds))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_shutdown_timeout_seconds)
    }

    pub fn default_guard_timeout(&self) -> Duration {
        Duration::from_millis(self.default_engine_guard_timeout_millis)
    }

    pub fn guard_check_interval(&self) -> Duration {
        Duration::from_millis(self.engine_guard_check_interval_millis)
    }

    pub fn wait_log_interval(&self) -> Duration {
        Duration::from_millis(self.wait_for_engine_log_interval_millis)
    }
}
