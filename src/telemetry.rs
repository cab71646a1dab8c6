//! Structured events emitted by the quota gate.
//!
//! Every state change the gate makes is reported to a [`QuotaObserver`] after
//! the key's lock has been released. Observers must be cheap and must not
//! call back into the gate for the same key while handling an event.
//!
//! ```rust
//! use quotagate::telemetry::{MemoryObserver, QuotaEvent};
//! use quotagate::{GateConfig, ManualClock, QuotaGate};
//!
//! let events = MemoryObserver::new();
//! let gate = QuotaGate::<String>::new(GateConfig::default())
//!     .with_clock(ManualClock::default())
//!     .with_observer(events.clone());
//!
//! gate.fill(&"caller".to_string(), 10).unwrap();
//! assert!(matches!(events.events()[0].1, QuotaEvent::Filled { amount: 10, .. }));
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Why a deduction was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Nothing was issued in the current window (including a window that just started).
    NotFilled,
    /// Quota was issued but less than the requested amount remains.
    Insufficient,
}

impl DenyReason {
    /// Short machine-readable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::NotFilled => "quota_not_filled",
            DenyReason::Insufficient => "quota_insufficient",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events describing bucket state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaEvent {
    /// A window ended; whatever was left unused is gone.
    RolledOver {
        /// Quota that was still available when the window ended.
        discarded: u64,
    },
    /// Quota was added.
    Filled {
        /// Amount added.
        amount: u64,
        /// Available quota afterwards.
        available: u64,
    },
    /// A zero-amount fill cleared the current window's counters.
    Cleared,
    /// A deduction was admitted.
    Granted {
        /// Amount consumed.
        amount: u64,
        /// Available quota afterwards.
        remaining: u64,
    },
    /// A deduction was refused; the bucket is unchanged.
    Denied {
        /// Amount requested.
        amount: u64,
        /// Available quota at the time of the request.
        available: u64,
        /// Why.
        reason: DenyReason,
    },
    /// An explicit reset started a new window.
    Reset,
    /// The bucket was removed from the store.
    Evicted {
        /// Quota still available at eviction.
        unused: u64,
    },
}

impl fmt::Display for QuotaEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaEvent::RolledOver { discarded } => write!(f, "RolledOver(discarded={})", discarded),
            QuotaEvent::Filled { amount, available } => {
                write!(f, "Filled(+{}, available={})", amount, available)
            }
            QuotaEvent::Cleared => write!(f, "Cleared"),
            QuotaEvent::Granted { amount, remaining } => {
                write!(f, "Granted({}, remaining={})", amount, remaining)
            }
            QuotaEvent::Denied { amount, available, reason } => {
                write!(f, "Denied({}, available={}, reason={})", amount, available, reason)
            }
            QuotaEvent::Reset => write!(f, "Reset"),
            QuotaEvent::Evicted { unused } => write!(f, "Evicted(unused={})", unused),
        }
    }
}

/// Consumer of gate events.
pub trait QuotaObserver<K>: Send + Sync + fmt::Debug {
    /// Called once per event, outside the key's lock.
    fn on_event(&self, key: &K, event: &QuotaEvent);
}

impl<K, O: QuotaObserver<K> + ?Sized> QuotaObserver<K> for Arc<O> {
    fn on_event(&self, key: &K, event: &QuotaEvent) {
        (**self).on_event(key, event)
    }
}

/// Discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullObserver;

impl<K> QuotaObserver<K> for NullObserver {
    fn on_event(&self, _key: &K, _event: &QuotaEvent) {}
}

/// Logs every event through `tracing` at INFO level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver;

impl<K: fmt::Debug> QuotaObserver<K> for LogObserver {
    fn on_event(&self, key: &K, event: &QuotaEvent) {
        tracing::info!(target: "quotagate::telemetry", key = ?key, event = %event, "quota_event");
    }
}

/// Keeps events in memory, oldest evicted first once `capacity` is reached.
#[derive(Clone, Debug)]
pub struct MemoryObserver<K> {
    events: Arc<Mutex<VecDeque<(K, QuotaEvent)>>>,
    capacity: usize,
    evicted: Arc<AtomicU64>,
}

impl<K> MemoryObserver<K> {
    /// Creates a bounded observer (default cap: 10,000).
    pub fn new() -> Self {
        Self::with_capacity(10_000)
    }

    /// Creates a bounded observer with explicit capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            capacity: capacity.max(1),
            evicted: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of events stored.
    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears all stored events.
    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of events dropped to stay within capacity.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}

impl<K: Clone> MemoryObserver<K> {
    /// Snapshot of stored events, oldest first.
    pub fn events(&self) -> Vec<(K, QuotaEvent)> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).iter().cloned().collect()
    }
}

impl<K> Default for MemoryObserver<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> QuotaObserver<K> for MemoryObserver<K>
where
    K: Clone + Send + fmt::Debug,
{
    fn on_event(&self, key: &K, event: &QuotaEvent) {
        let mut guard = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.len() >= self.capacity {
            guard.pop_front();
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        guard.push_back((key.clone(), *event));
    }
}

/// Broadcasts events to any number of async subscribers.
///
/// Slow subscribers miss events once the channel buffer fills; publishing never blocks.
#[derive(Clone, Debug)]
pub struct StreamingObserver<K> {
    sender: tokio::sync::broadcast::Sender<(K, QuotaEvent)>,
    dropped: Arc<AtomicU64>,
}

impl<K: Clone> StreamingObserver<K> {
    /// Creates an observer with the given buffer capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity.max(1));
        Self { sender, dropped: Arc::new(AtomicU64::new(0)) }
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<(K, QuotaEvent)> {
        self.sender.subscribe()
    }

    /// Events published while nobody was subscribed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<K> QuotaObserver<K> for StreamingObserver<K>
where
    K: Clone + Send + Sync + fmt::Debug,
{
    fn on_event(&self, key: &K, event: &QuotaEvent) {
        if self.sender.send((key.clone(), *event)).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}
