// src/lib.rs
//! Isopool — bounded engine pool and execution watchdog
//!
//! This library lets many application tasks execute scripts on a small set
//! of heavyweight, stateful engine instances without each caller paying for
//! a fresh engine, and without any single execution being able to hang the
//! process forever.
//!
//! # Architecture
//!
//! - **pool**: checkout/release admission control, lazy construction, the
//!   idle-eviction/reset daemon and the per-checkout watchdog
//! - **runtime**: the abstract `ScriptRuntime`/`RuntimeFactory` seam the
//!   embedded engine plugs into, plus a mock for tests
//! - **registry**: process-wide typed singletons behind one owning module
//! - **utils**: errors, debugger detection
//!
//! # Example
//!
//! ```no_run
//! use isopool::{EnginePool, MockFactory, MockRuntime, PoolConfig, RuntimeFactory};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn demo() -> isopool::Result<()> {
//! let factory: Arc<dyn RuntimeFactory<Runtime = MockRuntime>> = MockFactory::new();
//! let pool = EnginePool::new(PoolConfig::default(), factory)?;
//!
//! let engine = pool.get_engine().await?;
//! let guard = pool.get_guard(&engine, Duration::from_secs(30));
//! // ... drive engine.runtime() ...
//! guard.close();
//! pool.release_engine(&engine);
//!
//! pool.close().await;
//! # Ok(())
//! # }
//! ```

// Public module exports
pub mod pool;
pub mod registry;
pub mod runtime;
pub mod utils;

// Re-export commonly used types
pub use pool::config::{PoolConfig, MAX_POOL_SIZE};
pub use pool::engine::Engine;
pub use pool::engine_guard::EngineGuard;
pub use pool::engine_pool::EnginePool;
pub use pool::observer::{InUseCollector, LiveRuntimeCounter, RuntimeObserver};
pub use runtime::collaborator::{RuntimeCensus, RuntimeFactory, ScriptRuntime};
pub use runtime::mock::{MockFactory, MockRuntime};
pub use utils::errors::{EngineError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_HASH: &str = env!("GIT_HASH");

/// Library build information
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_timestamp: &'static str,
    pub rustc_version: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            version: VERSION,
            git_hash: GIT_HASH,
            build_timestamp: env!("BUILD_TIMESTAMP"),
            rustc_version: env!("RUSTC_VERSION"),
        }
    }
}
