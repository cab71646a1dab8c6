//! Async admission interface and tower middleware.
//!
//! - [`RateLimiter`]: the trait middleware talks to. [`QuotaGate`] implements it.
//! - [`RateLimitLayer`]: Tower middleware that asks a limiter before forwarding.
//! - [`Decision`]: the result of a check (Allowed/Denied).
//!
//! The middleware doesn't know how limiting works or how keys are derived:
//! callers pass a closure that maps each request to `(key, cost)`.

use std::time::Duration;

use crate::error::QuotaError;
use crate::gate::{Admission, QuotaGate};
use crate::key::QuotaKey;

pub mod middleware;
pub use middleware::{RateLimitLayer, RateLimitService};

/// The decision returned by a rate limiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed.
    Allowed {
        /// Quota remaining in the window after this acquisition.
        /// Useful for `X-RateLimit-Remaining` headers.
        remaining: u64,
    },
    /// The request is denied.
    Denied {
        /// How long the caller should wait before retrying.
        /// Useful for `Retry-After` headers.
        wait: Duration,
        /// Reason for denial (e.g. "quota_insufficient").
        reason: &'static str,
    },
}

impl Decision {
    /// Helper to check if allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

impl From<Admission> for Decision {
    fn from(admission: Admission) -> Self {
        match admission {
            Admission::Granted { remaining } => Decision::Allowed { remaining },
            Admission::Denied { reason, retry_after, .. } => {
                Decision::Denied { wait: retry_after, reason: reason.as_str() }
            }
        }
    }
}

/// Core interface for admission checks keyed by caller.
#[async_trait::async_trait]
pub trait RateLimiter<K>: Send + Sync {
    /// Attempt to acquire `permits` units of quota for `key`.
    async fn acquire(&self, key: &K, permits: u64) -> Result<Decision, QuotaError>;
}

#[async_trait::async_trait]
impl<K: QuotaKey> RateLimiter<K> for QuotaGate<K> {
    async fn acquire(&self, key: &K, permits: u64) -> Result<Decision, QuotaError> {
        self.admit(key, permits).map(Decision::from)
    }
}
