//! Gate configuration.

use std::time::Duration;

use crate::error::ConfigError;

/// Default window length.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(60);
/// Default number of independently locked store shards.
pub const DEFAULT_SHARDS: usize = 16;
/// Default retention, expressed in periods.
const DEFAULT_RETENTION_PERIODS: u32 = 10;

/// Validated settings for a [`QuotaGate`](crate::QuotaGate).
///
/// `period` and `auto_fill` are read on every operation, so updates made through
/// [`QuotaGate::config`](crate::QuotaGate::config) apply to windows that start
/// afterwards. `shards` is fixed once the gate is built.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GateConfig {
    period: Duration,
    auto_fill: Option<u64>,
    retention: Duration,
    shards: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            auto_fill: None,
            retention: DEFAULT_PERIOD * DEFAULT_RETENTION_PERIODS,
            shards: DEFAULT_SHARDS,
        }
    }
}

impl GateConfig {
    /// Start building a config from the defaults.
    pub fn builder() -> GateConfigBuilder {
        GateConfigBuilder::default()
    }

    /// Window length for newly created buckets.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Quota every new window starts with, if any.
    pub fn auto_fill(&self) -> Option<u64> {
        self.auto_fill
    }

    /// How long an untouched bucket survives a sweep.
    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Store shard count.
    pub fn shards(&self) -> usize {
        self.shards
    }

    /// Check the invariants the builder enforces. Useful after deserializing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period < Duration::from_millis(1) {
            return Err(ConfigError::InvalidPeriod(self.period));
        }
        if self.retention < self.period {
            return Err(ConfigError::RetentionTooShort {
                retention: self.retention,
                period: self.period,
            });
        }
        if self.shards == 0 {
            return Err(ConfigError::ZeroShards);
        }
        Ok(())
    }
}

/// Builder for [`GateConfig`].
///
/// Retention defaults to ten periods unless set explicitly.
#[derive(Debug, Clone, Default)]
pub struct GateConfigBuilder {
    period: Option<Duration>,
    auto_fill: Option<u64>,
    retention: Option<Duration>,
    shards: Option<usize>,
}

impl GateConfigBuilder {
    /// Window length.
    pub fn period(mut self, period: Duration) -> Self {
        self.period = Some(period);
        self
    }

    /// Quota granted automatically at the start of every window.
    pub fn auto_fill(mut self, quota: u64) -> Self {
        self.auto_fill = Some(quota);
        self
    }

    /// Sweep horizon; must be at least one period.
    pub fn retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    /// Store shard count; must be > 0.
    pub fn shards(mut self, shards: usize) -> Self {
        self.shards = Some(shards);
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<GateConfig, ConfigError> {
        let period = self.period.unwrap_or(DEFAULT_PERIOD);
        let retention = self
            .retention
            .unwrap_or_else(|| period.saturating_mul(DEFAULT_RETENTION_PERIODS));
        let cfg = GateConfig {
            period,
            auto_fill: self.auto_fill,
            retention,
            shards: self.shards.unwrap_or(DEFAULT_SHARDS),
        };
        cfg.validate()?;
        Ok(cfg)
    }
}
