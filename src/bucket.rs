//! Per-key bucket record.

use std::time::Duration;

/// Coarse state of a bucket within its current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BucketPhase {
    /// No quota issued this window.
    Empty,
    /// Quota issued and some still available.
    Active,
    /// Every issued unit has been consumed.
    Exhausted,
}

/// Quota accounting for one key.
///
/// Pure data: callers must hold the key's lock in the store before reading
/// and writing it as a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketState {
    period: Duration,
    period_start: u64,
    max_quota: u64,
    quota_consumed: u64,
}

impl BucketState {
    /// Fresh, empty bucket whose first window starts at `now`.
    pub fn new(period: Duration, now: u64) -> Self {
        Self { period, period_start: now, max_quota: 0, quota_consumed: 0 }
    }

    /// Window length, fixed at creation.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Millisecond timestamp at which the current window began.
    pub fn period_start(&self) -> u64 {
        self.period_start
    }

    /// Quota issued this window.
    pub fn max_quota(&self) -> u64 {
        self.max_quota
    }

    /// Quota deducted this window.
    pub fn quota_consumed(&self) -> u64 {
        self.quota_consumed
    }

    /// `max_quota - quota_consumed`.
    pub fn available(&self) -> u64 {
        self.max_quota - self.quota_consumed
    }

    /// True once more than one full period has elapsed since `period_start`.
    ///
    /// A `now` earlier than `period_start` never counts as a rollover.
    pub fn has_rolled_over(&self, now: u64) -> bool {
        u128::from(now.saturating_sub(self.period_start)) > self.period.as_millis()
    }

    /// Milliseconds left in the current window, measured from `now`.
    pub fn remaining_in_period(&self, now: u64) -> Duration {
        let elapsed = Duration::from_millis(now.saturating_sub(self.period_start));
        self.period.saturating_sub(elapsed)
    }

    /// Which phase the counters describe.
    pub fn phase(&self) -> BucketPhase {
        if self.max_quota == 0 {
            BucketPhase::Empty
        } else if self.quota_consumed < self.max_quota {
            BucketPhase::Active
        } else {
            BucketPhase::Exhausted
        }
    }

    /// Share of issued quota already consumed, in percent. `0.0` when nothing was issued.
    pub fn usage_percentage(&self) -> f64 {
        if self.max_quota == 0 {
            return 0.0;
        }
        (self.quota_consumed as f64 / self.max_quota as f64) * 100.0
    }

    /// Start a new window at `now` holding `initial` quota.
    pub(crate) fn begin_period(&mut self, now: u64, initial: u64) {
        self.period_start = now;
        self.max_quota = initial;
        self.quota_consumed = 0;
    }

    /// Drop the current window's counters but keep its start time.
    pub(crate) fn clear(&mut self) {
        self.max_quota = 0;
        self.quota_consumed = 0;
    }

    /// Add quota; `None` if `max_quota` would overflow.
    pub(crate) fn issue(&mut self, amount: u64) -> Option<u64> {
        self.max_quota = self.max_quota.checked_add(amount)?;
        Some(self.available())
    }

    /// Consume `amount` if it fits entirely; otherwise leave the bucket untouched.
    pub(crate) fn consume(&mut self, amount: u64) -> bool {
        if self.available() < amount {
            return false;
        }
        self.quota_consumed += amount;
        true
    }

    pub(crate) fn snapshot(&self) -> QuotaSnapshot {
        QuotaSnapshot {
            period: self.period,
            period_start: self.period_start,
            max_quota: self.max_quota,
            quota_consumed: self.quota_consumed,
            available: self.available(),
            phase: self.phase(),
            usage_percentage: self.usage_percentage(),
        }
    }
}

/// Read-only view of a bucket taken under its lock.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QuotaSnapshot {
    /// Window length.
    pub period: Duration,
    /// Current window start (millis).
    pub period_start: u64,
    /// Quota issued this window.
    pub max_quota: u64,
    /// Quota consumed this window.
    pub quota_consumed: u64,
    /// `max_quota - quota_consumed`.
    pub available: u64,
    /// Phase at snapshot time.
    pub phase: BucketPhase,
    /// Consumed share of issued quota, in percent.
    pub usage_percentage: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn new_bucket_is_empty() {
        let b = BucketState::new(MINUTE, 5);
        assert_eq!(b.phase(), BucketPhase::Empty);
        assert_eq!(b.available(), 0);
        assert_eq!(b.period_start(), 5);
        assert_eq!(b.usage_percentage(), 0.0);
    }

    #[test]
    fn rollover_is_strictly_after_period() {
        let b = BucketState::new(MINUTE, 1_000);
        assert!(!b.has_rolled_over(61_000));
        assert!(b.has_rolled_over(61_001));
    }

    #[test]
    fn clock_going_backwards_is_not_a_rollover() {
        let b = BucketState::new(MINUTE, 100_000);
        assert!(!b.has_rolled_over(0));
        assert_eq!(b.remaining_in_period(0), MINUTE);
    }

    #[test]
    fn consume_is_all_or_nothing() {
        let mut b = BucketState::new(MINUTE, 0);
        b.issue(10);
        assert!(!b.consume(11));
        assert_eq!(b.quota_consumed(), 0);
        assert!(b.consume(10));
        assert_eq!(b.phase(), BucketPhase::Exhausted);
        assert!(b.consume(0));
        assert!(!b.consume(1));
    }

    #[test]
    fn issue_rejects_overflow_without_mutation() {
        let mut b = BucketState::new(MINUTE, 0);
        b.issue(u64::MAX);
        assert_eq!(b.issue(1), None);
        assert_eq!(b.max_quota(), u64::MAX);
    }

    #[test]
    fn usage_percentage_tracks_consumption() {
        let mut b = BucketState::new(MINUTE, 0);
        b.issue(200);
        b.consume(50);
        assert_eq!(b.phase(), BucketPhase::Active);
        assert!((b.usage_percentage() - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn remaining_in_period_counts_down() {
        let b = BucketState::new(MINUTE, 0);
        assert_eq!(b.remaining_in_period(45_000), Duration::from_secs(15));
        assert_eq!(b.remaining_in_period(90_000), Duration::ZERO);
    }
}
