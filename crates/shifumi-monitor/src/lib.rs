//! Startup availability probing and retry pacing for shifumi.
//!
//! Neither service may read or write the log before its topics exist and
//! the broker accepts writes. [`AvailabilityMonitor`] checks exactly that,
//! retrying forever with exponential [`Backoff`] until a canary write
//! succeeds. The same backoff paces the round resolver's reconnects.
//!
//! # Integration
//!
//! ```ignore
//! let monitor = AvailabilityMonitor::new(Arc::clone(&log), config);
//! let report = monitor.wait_until_available().await;
//! // only now start consumers and producers
//! ```

mod availability;
mod backoff;

pub use availability::{
    AvailabilityConfig, AvailabilityMonitor, AvailabilityReport, CANARY_VALUE,
};
pub use backoff::{Backoff, BackoffPolicy};
