//! Live-updatable configuration handle.
//!
//! Reads are lock-free `ArcSwap` loads, so the gate can consult the current
//! configuration on every call without contending with writers.

use std::sync::Arc;

use arc_swap::ArcSwap;

/// Shared, swappable value. Clones observe the same updates.
#[derive(Debug)]
pub struct LiveConfig<T> {
    inner: Arc<ArcSwap<T>>,
}

impl<T> Clone for LiveConfig<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T> LiveConfig<T> {
    /// Wrap an initial value.
    pub fn new(value: T) -> Self {
        Self { inner: Arc::new(ArcSwap::from_pointee(value)) }
    }

    /// Snapshot the current value.
    pub fn get(&self) -> Arc<T> {
        self.inner.load_full()
    }

    /// Replace the value entirely.
    pub fn set(&self, value: T) {
        self.inner.store(Arc::new(value));
    }

    /// Derive a new value from the current one.
    ///
    /// Concurrent updaters may race; the closure is re-run until its result
    /// is installed on top of the value it was computed from.
    pub fn update<F>(&self, f: F)
    where
        F: Fn(&T) -> T,
    {
        self.inner.rcu(|cur| f(cur));
    }
}
