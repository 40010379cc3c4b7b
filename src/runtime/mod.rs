// src/runtime/mod.rs
//! Runtime collaborator seam
//!
//! The pool treats the embedded engine as an external collaborator behind
//! two traits:
//!
//! - **ScriptRuntime**: lifecycle and interruption hooks on one execution
//!   context
//! - **RuntimeFactory**: lazy construction of runtimes for empty pool slots
//!
//! A process-wide [`RuntimeCensus`] counts constructions and teardowns
//! across every pool in the process. [`mock`] provides a test double.

pub mod collaborator;
pub mod mock;

pub use collaborator::{RuntimeCensus, RuntimeFactory, ScriptRuntime};
pub use mock::{MockFactory, MockRuntime};
