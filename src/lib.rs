#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # quotagate
//!
//! Per-key leaky-bucket quota gate for admission control.
//!
//! Every key (caller id, API token, IP address...) gets a bucket. Quota is
//! issued into the bucket with `fill` and drawn down with `deduct`. Quota only
//! lives for one fixed period: once a window ends, whatever was left is
//! discarded and the next window starts empty.
//!
//! ## Features
//!
//! - **All-or-nothing deduction**: a request either fits entirely or changes nothing
//! - **Per-key locking** over a striped store, so unrelated keys never contend
//! - **Injectable clock** for deterministic tests
//! - **Retention sweeps** to bound memory, on demand or on a tokio interval
//! - **Structured events** through pluggable observers, plus `tracing` logs
//! - **Tower middleware** that charges each request against a key
//!
//! ## Quick Start
//!
//! ```rust
//! use quotagate::{GateConfig, QuotaGate};
//! use std::time::Duration;
//!
//! let config = GateConfig::builder()
//!     .period(Duration::from_secs(60))
//!     .build()
//!     .expect("valid config");
//! let gate = QuotaGate::<String>::new(config);
//!
//! let caller = "tenant-42".to_string();
//! gate.fill(&caller, 100)?;
//! if gate.deduct(&caller, 10)? {
//!     // do the work
//! }
//! # Ok::<(), quotagate::QuotaError>(())
//! ```

pub mod bucket;
pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod key;
pub mod live;
pub mod rate_limit;
pub mod store;
pub mod sweeper;
pub mod telemetry;

// Re-exports
pub use bucket::{BucketPhase, BucketState, QuotaSnapshot};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{GateConfig, GateConfigBuilder};
pub use error::{AdmissionError, ConfigError, QuotaError};
pub use gate::{Admission, QuotaGate};
pub use key::QuotaKey;
pub use live::LiveConfig;
pub use rate_limit::{Decision, RateLimitLayer, RateLimitService, RateLimiter};
pub use store::BucketStore;
pub use sweeper::SweeperHandle;
pub use telemetry::{DenyReason, QuotaEvent, QuotaObserver};
