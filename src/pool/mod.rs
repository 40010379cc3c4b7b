// src/pool/mod.rs
//! Engine pool, watchdog and configuration
//!
//! This module provides the resource-management core:
//!
//! - **Engine Pool**: fixed-capacity checkout/release of engine slots with
//!   admission control and lazy construction
//! - **Engine**: pooled handle around one runtime with usage bookkeeping
//! - **Engine Guard**: per-checkout watchdog that interrupts runaway
//!   executions without destroying the engine
//! - **Config**: sizes, timeouts and the retry/backoff schedule, frozen
//!   when the pool starts
//! - **Observer**: read-only traversal callbacks for statistics
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     EnginePool (N slots)                 │
//! │   idle ──► checkout ──► active ──► release ──► idle      │
//! │     ▲                                                    │
//! │     │ lazy construction            eviction / reset      │
//! │  released ◄──────────────────────── daemon (background)  │
//! │                                                          │
//! │  EngineGuard ── watches one checked-out engine ── fires  │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod engine;
pub mod engine_guard;
pub mod engine_pool;
pub mod observer;

// Re-export commonly used types
pub use config::{PoolConfig, MAX_POOL_SIZE};
pub use engine::Engine;
pub use engine_guard::EngineGuard;
pub use engine_pool::EnginePool;
pub use observer::{InUseCollector, LiveRuntimeCounter, RuntimeObserver};
