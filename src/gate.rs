//! The quota gate: per-key fixed-period admission control.
//!
//! Each key owns a bucket that is issued quota with [`QuotaGate::fill`] and
//! drawn down with [`QuotaGate::deduct`]. Quota is valid for one period; once
//! more than a full period has elapsed since the window started, the next
//! operation on that key discards whatever was left and starts a new, empty
//! window (or one pre-filled with `auto_fill`).
//!
//! ```rust
//! use quotagate::{GateConfig, ManualClock, QuotaGate};
//! use std::time::Duration;
//!
//! let clock = ManualClock::default();
//! let gate = QuotaGate::<&'static str>::new(GateConfig::default()).with_clock(clock.clone());
//!
//! assert_eq!(gate.fill(&"alice", 100).unwrap(), 100);
//! assert!(gate.deduct(&"alice", 99).unwrap());
//! assert!(!gate.deduct(&"alice", 3).unwrap());
//!
//! clock.advance(Duration::from_secs(61));
//! assert!(!gate.deduct(&"alice", 1).unwrap()); // new window, nothing issued yet
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::bucket::{BucketState, QuotaSnapshot};
use crate::clock::{Clock, MonotonicClock};
use crate::config::GateConfig;
use crate::error::QuotaError;
use crate::key::QuotaKey;
use crate::live::LiveConfig;
use crate::store::BucketStore;
use crate::telemetry::{DenyReason, NullObserver, QuotaEvent, QuotaObserver};

/// Outcome of an admission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The amount was consumed.
    Granted {
        /// Quota left in the window.
        remaining: u64,
    },
    /// Nothing was consumed.
    Denied {
        /// Quota left in the window.
        available: u64,
        /// Why the request did not fit.
        reason: DenyReason,
        /// Time until the key's window rolls over.
        retry_after: Duration,
    },
}

impl Admission {
    /// Helper to check if granted.
    pub fn is_granted(&self) -> bool {
        matches!(self, Admission::Granted { .. })
    }
}

/// Per-key leaky-bucket quota gate.
///
/// Clones share the same store, clock, configuration and observer.
pub struct QuotaGate<K: QuotaKey> {
    store: Arc<BucketStore<K>>,
    clock: Arc<dyn Clock>,
    config: LiveConfig<GateConfig>,
    observer: Arc<dyn QuotaObserver<K>>,
}

impl<K: QuotaKey> Clone for QuotaGate<K> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
            config: self.config.clone(),
            observer: self.observer.clone(),
        }
    }
}

impl<K: QuotaKey> std::fmt::Debug for QuotaGate<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaGate")
            .field("config", &self.config.get())
            .field("buckets", &self.store.len())
            .field("clock", &self.clock)
            .finish()
    }
}

/// Result of resolving rollover inside a locked section.
struct Rollover {
    discarded: Option<u64>,
}

impl<K: QuotaKey> QuotaGate<K> {
    /// Create a gate with its own empty store and a monotonic clock.
    ///
    /// `config` is assumed valid; build it with [`GateConfig::builder`].
    pub fn new(config: GateConfig) -> Self {
        let store = Arc::new(BucketStore::new(config.shards()));
        Self::with_store(config, store)
    }

    /// Create a gate over an existing store, e.g. one shared with a metrics exporter.
    pub fn with_store(config: GateConfig, store: Arc<BucketStore<K>>) -> Self {
        Self {
            store,
            clock: Arc::new(MonotonicClock::default()),
            config: LiveConfig::new(config),
            observer: Arc::new(NullObserver),
        }
    }

    /// Override the clock (useful for deterministic tests).
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Receive a [`QuotaEvent`] for every state change.
    pub fn with_observer<O: QuotaObserver<K> + 'static>(mut self, observer: O) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    /// Live configuration handle. Changes apply to windows started afterwards.
    pub fn config(&self) -> &LiveConfig<GateConfig> {
        &self.config
    }

    /// Underlying store.
    pub fn store(&self) -> &Arc<BucketStore<K>> {
        &self.store
    }

    /// Current time according to the gate's clock.
    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    /// Issue `amount` more quota to `key` for the current window; returns what is now available.
    ///
    /// A zero `amount` clears the current window's counters instead of adding
    /// anything: after `fill(k, 0)` the bucket is Empty until the next fill.
    pub fn fill(&self, key: &K, amount: u64) -> Result<u64, QuotaError> {
        self.fill_at(key, amount, self.now_millis())
    }

    /// [`fill`](Self::fill) at an explicit time.
    pub fn fill_at(&self, key: &K, amount: u64, now: u64) -> Result<u64, QuotaError> {
        let cfg = self.config.get();
        let initial = cfg.auto_fill().unwrap_or(0);
        let (rolled, available) = self.with_bucket(key, &cfg, now, |bucket| -> Result<_, QuotaError> {
            let base = if bucket.has_rolled_over(now) { initial } else { bucket.max_quota() };
            if base.checked_add(amount).is_none() {
                return Err(QuotaError::InvalidAmount {
                    amount,
                    reason: "max_quota would overflow",
                });
            }
            let rolled = Self::resolve_rollover(bucket, now, initial);
            if amount == 0 {
                bucket.clear();
                return Ok((rolled, 0));
            }
            let available = bucket.issue(amount).ok_or(QuotaError::InvalidAmount {
                amount,
                reason: "max_quota would overflow",
            })?;
            Ok((rolled, available))
        })??;

        self.report_rollover(key, &rolled);
        if amount == 0 {
            info!(target: "quotagate::gate", key = ?key, "zero fill cleared window");
            self.observer.on_event(key, &QuotaEvent::Cleared);
        } else {
            debug!(target: "quotagate::gate", key = ?key, amount, available, "quota filled");
            self.observer.on_event(key, &QuotaEvent::Filled { amount, available });
        }
        Ok(available)
    }

    /// Try to consume `amount` from `key`'s bucket. `Ok(false)` means denied.
    ///
    /// All-or-nothing: on denial the bucket is left untouched.
    pub fn deduct(&self, key: &K, amount: u64) -> Result<bool, QuotaError> {
        self.deduct_at(key, amount, self.now_millis())
    }

    /// [`deduct`](Self::deduct) at an explicit time.
    pub fn deduct_at(&self, key: &K, amount: u64, now: u64) -> Result<bool, QuotaError> {
        self.admit_at(key, amount, now).map(|a| a.is_granted())
    }

    /// Like [`deduct`](Self::deduct) but reports remaining quota or why it was denied.
    pub fn admit(&self, key: &K, amount: u64) -> Result<Admission, QuotaError> {
        self.admit_at(key, amount, self.now_millis())
    }

    /// [`admit`](Self::admit) at an explicit time.
    pub fn admit_at(&self, key: &K, amount: u64, now: u64) -> Result<Admission, QuotaError> {
        let cfg = self.config.get();
        let initial = cfg.auto_fill().unwrap_or(0);
        let (rolled, admission) = self.with_bucket(key, &cfg, now, |bucket| {
            let rolled = Self::resolve_rollover(bucket, now, initial);
            let admission = if rolled.discarded.is_some() && bucket.max_quota() == 0 {
                // The window just started and nothing has been issued in it.
                Self::denied(bucket, now, DenyReason::NotFilled)
            } else if bucket.consume(amount) {
                Admission::Granted { remaining: bucket.available() }
            } else if bucket.max_quota() == 0 {
                Self::denied(bucket, now, DenyReason::NotFilled)
            } else {
                Self::denied(bucket, now, DenyReason::Insufficient)
            };
            (rolled, admission)
        })?;

        self.report_rollover(key, &rolled);
        match admission {
            Admission::Granted { remaining } => {
                debug!(target: "quotagate::gate", key = ?key, amount, remaining, "deduct granted");
                self.observer.on_event(key, &QuotaEvent::Granted { amount, remaining });
            }
            Admission::Denied { available, reason, .. } => {
                debug!(target: "quotagate::gate", key = ?key, amount, available, %reason, "deduct denied");
                self.observer.on_event(key, &QuotaEvent::Denied { amount, available, reason });
            }
        }
        Ok(admission)
    }

    /// Read-only view of `key`'s bucket, taken under its lock. `None` for unknown keys.
    ///
    /// The snapshot shows stored counters; a window that has expired but not
    /// yet been touched still reports its old values.
    pub fn inspect(&self, key: &K) -> Result<Option<QuotaSnapshot>, QuotaError> {
        Self::check_key(key)?;
        Ok(self.store.get(key).map(|cell| {
            let state = cell.lock();
            state.snapshot()
        }))
    }

    /// Start a fresh window for `key` now, discarding its counters.
    pub fn reset(&self, key: &K) -> Result<(), QuotaError> {
        self.reset_at(key, self.now_millis())
    }

    /// [`reset`](Self::reset) at an explicit time.
    pub fn reset_at(&self, key: &K, now: u64) -> Result<(), QuotaError> {
        let cfg = self.config.get();
        let initial = cfg.auto_fill().unwrap_or(0);
        self.with_bucket(key, &cfg, now, |bucket| bucket.begin_period(now, initial))?;
        info!(target: "quotagate::gate", key = ?key, "window reset");
        self.observer.on_event(key, &QuotaEvent::Reset);
        Ok(())
    }

    /// How long until `key`'s current window rolls over. `None` for unknown keys.
    pub fn retry_after(&self, key: &K) -> Result<Option<Duration>, QuotaError> {
        self.retry_after_at(key, self.now_millis())
    }

    /// [`retry_after`](Self::retry_after) at an explicit time.
    pub fn retry_after_at(&self, key: &K, now: u64) -> Result<Option<Duration>, QuotaError> {
        Self::check_key(key)?;
        Ok(self.store.get(key).map(|cell| {
            let state = cell.lock();
            Self::until_rollover(&state, now)
        }))
    }

    /// Remove `key` from the store. Waits for in-flight operations on the key.
    pub fn evict(&self, key: &K) -> Result<Option<QuotaSnapshot>, QuotaError> {
        Self::check_key(key)?;
        let removed = self.store.remove(key);
        if let Some(state) = &removed {
            self.report_eviction(key, state);
        }
        Ok(removed.map(|s| s.snapshot()))
    }

    /// Remove every bucket whose window started longer than `retention` ago
    /// and has also run past its own period. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(self.now_millis())
    }

    /// [`sweep`](Self::sweep) at an explicit time.
    pub fn sweep_at(&self, now: u64) -> usize {
        let retention = self.config.get().retention();
        let removed = self.store.retain(|_, state| {
            // A bucket keeps the period it was created with, which can outlast
            // a retention shortened later.
            let horizon = retention.max(state.period());
            u128::from(now.saturating_sub(state.period_start())) <= horizon.as_millis()
        });
        for (key, state) in &removed {
            self.report_eviction(key, state);
        }
        if !removed.is_empty() {
            debug!(target: "quotagate::gate", evicted = removed.len(), "sweep finished");
        }
        removed.len()
    }

    /// Iterate known keys. Safe to call gate operations while iterating.
    pub fn keys(&self) -> std::vec::IntoIter<K> {
        self.store.keys()
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// True if no key is tracked.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Run `f` on the live bucket for `key` while holding its lock.
    ///
    /// Retries the lookup if the bucket was evicted between lookup and lock,
    /// so an update is never applied to a bucket that is no longer stored.
    fn with_bucket<R, F>(&self, key: &K, cfg: &GateConfig, now: u64, f: F) -> Result<R, QuotaError>
    where
        F: FnOnce(&mut BucketState) -> R,
    {
        let period = cfg.period();
        let initial = cfg.auto_fill().unwrap_or(0);
        loop {
            let cell = self.store.get_or_create_with(key, || {
                let mut state = BucketState::new(period, now);
                state.begin_period(now, initial);
                state
            })?;
            let mut state = cell.lock();
            if cell.is_evicted() {
                continue;
            }
            return Ok(f(&mut state));
        }
    }

    fn resolve_rollover(bucket: &mut BucketState, now: u64, initial: u64) -> Rollover {
        if !bucket.has_rolled_over(now) {
            return Rollover { discarded: None };
        }
        let discarded = bucket.available();
        bucket.begin_period(now, initial);
        Rollover { discarded: Some(discarded) }
    }

    fn denied(bucket: &BucketState, now: u64, reason: DenyReason) -> Admission {
        Admission::Denied {
            available: bucket.available(),
            reason,
            retry_after: Self::until_rollover(bucket, now),
        }
    }

    fn until_rollover(bucket: &BucketState, now: u64) -> Duration {
        if bucket.has_rolled_over(now) {
            return Duration::ZERO;
        }
        // Rollover needs strictly more than one period to have elapsed.
        bucket.remaining_in_period(now).saturating_add(Duration::from_millis(1))
    }

    fn check_key(key: &K) -> Result<(), QuotaError> {
        if key.is_valid() {
            Ok(())
        } else {
            Err(QuotaError::InvalidKey { key: format!("{:?}", key) })
        }
    }

    fn report_rollover(&self, key: &K, rolled: &Rollover) {
        if let Some(discarded) = rolled.discarded {
            info!(target: "quotagate::gate", key = ?key, discarded, "window rolled over");
            self.observer.on_event(key, &QuotaEvent::RolledOver { discarded });
        }
    }

    fn report_eviction(&self, key: &K, state: &BucketState) {
        let unused = state.available();
        if unused > 0 {
            warn!(target: "quotagate::gate", key = ?key, unused, "evicted bucket with unused quota");
        } else {
            debug!(target: "quotagate::gate", key = ?key, "bucket evicted");
        }
        self.observer.on_event(key, &QuotaEvent::Evicted { unused });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::BucketPhase;
    use crate::clock::ManualClock;
    use crate::telemetry::MemoryObserver;

    const SEC: u64 = 1_000;

    fn gate() -> QuotaGate<&'static str> {
        QuotaGate::new(GateConfig::default()).with_clock(ManualClock::default())
    }

    fn snapshot(gate: &QuotaGate<&'static str>, key: &'static str) -> QuotaSnapshot {
        gate.inspect(&key).unwrap().expect("bucket exists")
    }

    #[test]
    fn fill_then_deduct_leaves_remainder() {
        let gate = gate();
        assert_eq!(gate.fill_at(&"k", 100, 0).unwrap(), 100);
        assert!(gate.deduct_at(&"k", 99, SEC).unwrap());
        assert_eq!(snapshot(&gate, "k").available, 1);
    }

    #[test]
    fn insufficient_deduct_changes_nothing() {
        let gate = gate();
        gate.fill_at(&"k", 100, 0).unwrap();
        gate.deduct_at(&"k", 99, SEC).unwrap();
        let before = snapshot(&gate, "k");
        assert!(!gate.deduct_at(&"k", 3, 2 * SEC).unwrap());
        assert!(!gate.deduct_at(&"k", 3, 3 * SEC).unwrap());
        assert_eq!(snapshot(&gate, "k"), before);
    }

    #[test]
    fn rollover_discards_unused_quota() {
        let gate = gate();
        gate.fill_at(&"k", 100, 0).unwrap();
        assert!(!gate.deduct_at(&"k", 50, 61 * SEC).unwrap());
        let snap = snapshot(&gate, "k");
        assert_eq!((snap.max_quota, snap.quota_consumed), (0, 0));
        assert_eq!(snap.period_start, 61 * SEC);
    }

    #[test]
    fn deduct_exactly_at_period_boundary_is_same_window() {
        let gate = gate();
        gate.fill_at(&"k", 10, 0).unwrap();
        assert!(gate.deduct_at(&"k", 10, 60 * SEC).unwrap());
        assert_eq!(snapshot(&gate, "k").phase, BucketPhase::Exhausted);
    }

    #[test]
    fn never_filled_key_denies() {
        let gate = gate();
        assert!(!gate.deduct_at(&"k", 5, 0).unwrap());
        assert_eq!(snapshot(&gate, "k").phase, BucketPhase::Empty);
    }

    #[test]
    fn zero_fill_clears_active_window() {
        let gate = gate();
        gate.fill_at(&"k", 100, 0).unwrap();
        gate.deduct_at(&"k", 40, SEC).unwrap();
        assert_eq!(gate.fill_at(&"k", 0, 2 * SEC).unwrap(), 0);
        let snap = snapshot(&gate, "k");
        assert_eq!((snap.max_quota, snap.quota_consumed), (0, 0));
        assert_eq!(snap.period_start, 0, "zero fill keeps the window start");
        assert!(!gate.deduct_at(&"k", 1, 3 * SEC).unwrap());
    }

    #[test]
    fn zero_deduct_is_granted_without_mutation() {
        let gate = gate();
        assert!(gate.deduct_at(&"k", 0, 0).unwrap());
        gate.fill_at(&"k", 5, 0).unwrap();
        assert!(gate.deduct_at(&"k", 0, SEC).unwrap());
        assert_eq!(snapshot(&gate, "k").quota_consumed, 0);
    }

    #[test]
    fn zero_deduct_right_after_rollover_is_denied() {
        let gate = gate();
        gate.fill_at(&"k", 5, 0).unwrap();
        assert!(!gate.deduct_at(&"k", 0, 120 * SEC).unwrap());
    }

    #[test]
    fn fill_accumulates_within_window() {
        let gate = gate();
        gate.fill_at(&"k", 10, 0).unwrap();
        gate.deduct_at(&"k", 10, SEC).unwrap();
        assert_eq!(gate.fill_at(&"k", 5, 2 * SEC).unwrap(), 5);
        let snap = snapshot(&gate, "k");
        assert_eq!((snap.max_quota, snap.quota_consumed), (15, 10));
    }

    #[test]
    fn overflowing_fill_is_rejected_before_mutation() {
        let gate = gate();
        gate.fill_at(&"k", u64::MAX, 0).unwrap();
        let err = gate.fill_at(&"k", 1, SEC).unwrap_err();
        assert!(err.is_invalid_amount());
        assert_eq!(snapshot(&gate, "k").max_quota, u64::MAX);
    }

    #[test]
    fn invalid_key_is_rejected_everywhere() {
        let gate = QuotaGate::<String>::new(GateConfig::default()).with_clock(ManualClock::default());
        let blank = String::from("  ");
        assert!(gate.fill(&blank, 1).unwrap_err().is_invalid_key());
        assert!(gate.deduct(&blank, 1).unwrap_err().is_invalid_key());
        assert!(gate.inspect(&blank).unwrap_err().is_invalid_key());
        assert!(gate.evict(&blank).unwrap_err().is_invalid_key());
        assert!(gate.is_empty());
    }

    #[test]
    fn clock_going_backwards_does_not_reset() {
        let gate = gate();
        gate.fill_at(&"k", 10, 100 * SEC).unwrap();
        assert!(gate.deduct_at(&"k", 4, 0).unwrap());
        assert_eq!(snapshot(&gate, "k").available, 6);
    }

    #[test]
    fn auto_fill_refills_each_window() {
        let cfg = GateConfig::builder().period(Duration::from_secs(10)).auto_fill(3).build().unwrap();
        let gate = QuotaGate::<&'static str>::new(cfg).with_clock(ManualClock::default());
        assert!(gate.deduct_at(&"k", 3, 0).unwrap());
        assert!(!gate.deduct_at(&"k", 1, SEC).unwrap());
        assert!(gate.deduct_at(&"k", 2, 11 * SEC).unwrap());
        assert_eq!(snapshot(&gate, "k").available, 1);
    }

    #[test]
    fn reset_starts_new_window_now() {
        let gate = gate();
        gate.fill_at(&"k", 10, 0).unwrap();
        gate.reset_at(&"k", 30 * SEC).unwrap();
        let snap = snapshot(&gate, "k");
        assert_eq!((snap.max_quota, snap.period_start), (0, 30 * SEC));
    }

    #[test]
    fn denied_admission_reports_retry_after() {
        let gate = gate();
        gate.fill_at(&"k", 1, 0).unwrap();
        gate.deduct_at(&"k", 1, 0).unwrap();
        match gate.admit_at(&"k", 1, 20 * SEC).unwrap() {
            Admission::Denied { reason, retry_after, available } => {
                assert_eq!(reason, DenyReason::Insufficient);
                assert_eq!(available, 0);
                assert_eq!(retry_after, Duration::from_millis(40_001));
            }
            other => panic!("expected denial, got {:?}", other),
        }
        assert_eq!(gate.retry_after_at(&"k", 20 * SEC).unwrap(), Some(Duration::from_millis(40_001)));
        assert_eq!(gate.retry_after_at(&"other", 0).unwrap(), None);
    }

    #[test]
    fn sweep_evicts_only_stale_buckets() {
        let cfg = GateConfig::builder()
            .period(Duration::from_secs(10))
            .retention(Duration::from_secs(30))
            .build()
            .unwrap();
        let gate = QuotaGate::<&'static str>::new(cfg).with_clock(ManualClock::default());
        gate.fill_at(&"old", 1, 0).unwrap();
        gate.fill_at(&"new", 1, 25 * SEC).unwrap();
        assert_eq!(gate.sweep_at(31 * SEC), 1);
        assert!(gate.inspect(&"old").unwrap().is_none());
        assert!(gate.inspect(&"new").unwrap().is_some());
    }

    #[test]
    fn evicted_key_starts_over() {
        let gate = gate();
        gate.fill_at(&"k", 10, 0).unwrap();
        let removed = gate.evict(&"k").unwrap().expect("was present");
        assert_eq!(removed.available, 10);
        assert!(!gate.deduct_at(&"k", 1, SEC).unwrap());
    }

    #[test]
    fn observer_sees_state_changes_in_order() {
        let events = MemoryObserver::new();
        let gate = gate().with_observer(events.clone());
        gate.fill_at(&"k", 2, 0).unwrap();
        gate.deduct_at(&"k", 1, SEC).unwrap();
        gate.deduct_at(&"k", 5, 2 * SEC).unwrap();
        gate.deduct_at(&"k", 1, 100 * SEC).unwrap();
        gate.fill_at(&"k", 0, 101 * SEC).unwrap();

        let kinds: Vec<QuotaEvent> = events.events().into_iter().map(|(_, e)| e).collect();
        assert_eq!(
            kinds,
            vec![
                QuotaEvent::Filled { amount: 2, available: 2 },
                QuotaEvent::Granted { amount: 1, remaining: 1 },
                QuotaEvent::Denied { amount: 5, available: 1, reason: DenyReason::Insufficient },
                QuotaEvent::RolledOver { discarded: 1 },
                QuotaEvent::Denied { amount: 1, available: 0, reason: DenyReason::NotFilled },
                QuotaEvent::Cleared,
            ]
        );
    }

    #[test]
    fn config_updates_apply_to_new_buckets_only() {
        let gate = gate();
        gate.fill_at(&"a", 1, 0).unwrap();
        gate.config().update(|cfg| {
            GateConfig::builder()
                .period(Duration::from_secs(5))
                .retention(cfg.retention())
                .build()
                .unwrap_or_else(|_| cfg.clone())
        });
        gate.fill_at(&"b", 1, 0).unwrap();
        assert_eq!(snapshot(&gate, "a").period, Duration::from_secs(60));
        assert_eq!(snapshot(&gate, "b").period, Duration::from_secs(5));
    }

    #[test]
    fn very_long_period_denies_without_overflow() {
        let cfg = GateConfig::builder().period(Duration::MAX).build().unwrap();
        assert_eq!(cfg.retention(), Duration::MAX);
        let gate = QuotaGate::new(cfg).with_clock(ManualClock::default());

        gate.fill_at(&1u64, 1, 0).unwrap();
        match gate.admit_at(&1, 5, 0).unwrap() {
            Admission::Denied { reason, retry_after, .. } => {
                assert_eq!(reason, DenyReason::Insufficient);
                assert_eq!(retry_after, Duration::MAX);
            }
            other => panic!("expected denial, got {:?}", other),
        }
        assert_eq!(gate.retry_after_at(&1, 0).unwrap(), Some(Duration::MAX));
        assert!(gate.retry_after_at(&1, u64::MAX).unwrap().is_some());
        assert_eq!(gate.sweep_at(u64::MAX), 0);
        assert!(gate.deduct_at(&1, 1, u64::MAX).unwrap());
    }

    #[test]
    fn sweep_keeps_buckets_inside_their_own_window_after_period_shrinks() {
        let gate = gate();
        gate.fill_at(&"a", 100, 0).unwrap();
        gate.config().set(
            GateConfig::builder().period(Duration::from_secs(5)).build().unwrap(),
        );
        assert_eq!(gate.config().get().retention(), Duration::from_secs(50));

        assert_eq!(gate.sweep_at(55 * SEC), 0);
        assert!(gate.deduct_at(&"a", 10, 56 * SEC).unwrap());
        assert_eq!(snapshot(&gate, "a").available, 90);

        // Once the bucket's own 60s window is over it is past retention too.
        assert_eq!(gate.sweep_at(60 * SEC + 1), 1);
        assert!(gate.inspect(&"a").unwrap().is_none());
    }
}
