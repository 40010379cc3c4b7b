// src/registry.rs
//! Process-wide typed singleton registry
//!
//! One owning module for global state that would otherwise end up as
//! scattered statics: a concurrent map keyed by `TypeId`, populated on
//! first use and never evicted. Entries must be `Default` so first access
//! constructs them.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::any::{Any, TypeId};
use std::sync::Arc;

static SINGLETONS: Lazy<DashMap<TypeId, Arc<dyn Any + Send + Sync>>> = Lazy::new(DashMap::new);

/// Get the process-wide singleton of type `T`, constructing it on first use.
///
/// Every caller receives a clone of the same `Arc`; the entry lives for the
/// remainder of the process.
pub fn singleton<T>() -> Arc<T>
where
    T: Default + Send + Sync + 'static,
{
    let entry = SINGLETONS
        .entry(TypeId::of::<T>())
        .or_insert_with(|| Arc::new(T::default()) as Arc<dyn Any + Send + Sync>);
    match Arc::clone(entry.value()).downcast::<T>() {
        Ok(value) => value,
        Err(_) => unreachable!("registry entry keyed by TypeId downcasts to its own type"),
    }
}
