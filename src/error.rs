//! Error types for the quota gate.
//!
//! A denied deduction is not an error: `deduct` returns `Ok(false)`. The
//! variants here are programmer errors and are always surfaced to the caller.
use std::time::Duration;

/// Structural errors from gate and store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuotaError {
    /// The key cannot identify a bucket (e.g. `None` or an empty string).
    #[error("invalid quota key: {key}")]
    InvalidKey {
        /// Debug rendering of the rejected key.
        key: String,
    },
    /// The amount cannot be applied without breaking the bucket's counters.
    #[error("invalid amount {amount}: {reason}")]
    InvalidAmount {
        /// Amount passed by the caller.
        amount: u64,
        /// Why it was rejected.
        reason: &'static str,
    },
}

impl QuotaError {
    /// Check if this error is due to a rejected key.
    pub fn is_invalid_key(&self) -> bool {
        matches!(self, Self::InvalidKey { .. })
    }

    /// Check if this error is due to a rejected amount.
    pub fn is_invalid_amount(&self) -> bool {
        matches!(self, Self::InvalidAmount { .. })
    }
}

/// Errors produced when validating a [`GateConfig`](crate::GateConfig).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Period must be at least one millisecond.
    #[error("period must be >= 1ms (got {0:?})")]
    InvalidPeriod(Duration),
    /// Retention must cover at least one full period.
    #[error("retention {retention:?} is shorter than period {period:?}")]
    RetentionTooShort {
        /// Configured retention horizon.
        retention: Duration,
        /// Configured period.
        period: Duration,
    },
    /// At least one shard is required.
    #[error("shards must be > 0")]
    ZeroShards,
}

/// Error returned by [`RateLimitService`](crate::rate_limit::RateLimitService).
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError<E> {
    /// The gate denied the request.
    #[error("rate limited ({reason}); retry after {wait:?}")]
    RateLimited {
        /// How long until the key's window rolls over.
        wait: Duration,
        /// Short machine-readable reason.
        reason: &'static str,
    },
    /// The gate refused the key or amount outright.
    #[error(transparent)]
    Rejected(QuotaError),
    /// The wrapped service failed.
    #[error("{0}")]
    Inner(#[source] E),
}

impl<E> AdmissionError<E> {
    /// Check if this error is a rate-limit denial.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Get the inner error if this is an Inner variant.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }

    /// Suggested wait for denied requests.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { wait, .. } => Some(*wait),
            _ => None,
        }
    }
}
