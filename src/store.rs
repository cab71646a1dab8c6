//! In-memory bucket storage.
//!
//! Keys live in a [`DashMap`] of shared cells. The map's shard lock is only
//! held for lookups, inserts and removals; per-key read-modify-write happens
//! under the bucket's own `Mutex` after the shard guard has been dropped.
//! Removal takes the shard lock and then the bucket lock, and nothing takes
//! them in the opposite order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dashmap::DashMap;

use crate::bucket::BucketState;
use crate::error::QuotaError;
use crate::key::QuotaKey;

/// A bucket plus the lock that serializes access to it.
#[derive(Debug)]
pub struct BucketCell {
    state: Mutex<BucketState>,
    evicted: AtomicBool,
}

impl BucketCell {
    fn new(state: BucketState) -> Self {
        Self { state: Mutex::new(state), evicted: AtomicBool::new(false) }
    }

    /// Lock the bucket. A poisoned lock is recovered: every mutation of the
    /// counters is a single assignment, so a panicking holder cannot leave
    /// them half-updated.
    pub fn lock(&self) -> MutexGuard<'_, BucketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True once the cell has been removed from its store. Only meaningful
    /// while holding [`lock`](Self::lock); a caller that sees `true` must look
    /// the key up again.
    pub fn is_evicted(&self) -> bool {
        self.evicted.load(Ordering::Acquire)
    }

    fn mark_evicted(&self) {
        self.evicted.store(true, Ordering::Release);
    }
}

/// Mapping from key to exactly one bucket.
#[derive(Debug)]
pub struct BucketStore<K: QuotaKey> {
    buckets: DashMap<K, Arc<BucketCell>>,
    shards: usize,
}

impl<K: QuotaKey> Default for BucketStore<K> {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_SHARDS)
    }
}

impl<K: QuotaKey> BucketStore<K> {
    /// Create a store split into `shards` independently locked stripes.
    ///
    /// The count is rounded up to a power of two, minimum 2.
    pub fn new(shards: usize) -> Self {
        let shards = shards.max(2).next_power_of_two();
        Self { buckets: DashMap::with_shard_amount(shards), shards }
    }

    /// Number of stripes.
    pub fn shard_count(&self) -> usize {
        self.shards
    }

    fn validate(key: &K) -> Result<(), QuotaError> {
        if key.is_valid() {
            Ok(())
        } else {
            Err(QuotaError::InvalidKey { key: format!("{:?}", key) })
        }
    }

    /// Existing bucket for `key`, or a new empty one whose window starts at `now`.
    pub fn get_or_create(
        &self,
        key: &K,
        period: Duration,
        now: u64,
    ) -> Result<Arc<BucketCell>, QuotaError> {
        self.get_or_create_with(key, || BucketState::new(period, now))
    }

    /// Like [`get_or_create`](Self::get_or_create) with a caller-built initial state.
    ///
    /// `init` runs at most once, and only if this call performs the insert.
    pub fn get_or_create_with<F>(&self, key: &K, init: F) -> Result<Arc<BucketCell>, QuotaError>
    where
        F: FnOnce() -> BucketState,
    {
        Self::validate(key)?;
        if let Some(cell) = self.buckets.get(key) {
            return Ok(cell.value().clone());
        }
        let cell = self
            .buckets
            .entry(key.clone())
            .or_insert_with(|| {
                tracing::trace!(target: "quotagate::store", key = ?key, "bucket created");
                Arc::new(BucketCell::new(init()))
            })
            .value()
            .clone();
        Ok(cell)
    }

    /// Bucket for `key` if one exists. Never creates.
    pub fn get(&self, key: &K) -> Option<Arc<BucketCell>> {
        self.buckets.get(key).map(|cell| cell.value().clone())
    }

    /// Remove `key`, waiting for any in-flight operation on it to finish.
    ///
    /// Returns the bucket's final state.
    pub fn remove(&self, key: &K) -> Option<BucketState> {
        let mut last = None;
        self.buckets.remove_if(key, |_, cell| {
            let state = cell.lock();
            cell.mark_evicted();
            last = Some(state.clone());
            true
        })?;
        last
    }

    /// Remove every bucket for which `keep` returns `false`.
    ///
    /// `keep` runs under the bucket's lock. Returns what was removed.
    pub fn retain<F>(&self, mut keep: F) -> Vec<(K, BucketState)>
    where
        F: FnMut(&K, &BucketState) -> bool,
    {
        let mut removed = Vec::new();
        self.buckets.retain(|key, cell| {
            let state = cell.lock();
            if keep(key, &state) {
                return true;
            }
            cell.mark_evicted();
            removed.push((key.clone(), state.clone()));
            false
        });
        removed
    }

    /// Walk all known keys.
    ///
    /// The keys are copied out first so no map guard is held while the caller
    /// iterates; keys inserted or removed concurrently may or may not appear.
    /// No ordering guarantee.
    pub fn keys(&self) -> std::vec::IntoIter<K> {
        let keys: Vec<K> = self.buckets.iter().map(|entry| entry.key().clone()).collect();
        keys.into_iter()
    }

    /// Number of buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// True if no bucket exists.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
