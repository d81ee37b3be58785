//! Exponential backoff.

use std::time::Duration;

use tracing::warn;

/// Bounds for an exponential backoff sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// First delay, and the delay after a [`Backoff::reset`].
    pub base: Duration,
    /// Delays never exceed this.
    pub max: Duration,
}

impl Default for BackoffPolicy {
    /// 10 seconds doubling up to 2 minutes: the startup probe cadence.
    fn default() -> Self {
        Self {
            base: Duration::from_secs(10),
            max: Duration::from_secs(120),
        }
    }
}

impl BackoffPolicy {
    /// Smallest base accepted by [`validated`](Self::validated).
    pub const MIN_BASE: Duration = Duration::from_millis(1);

    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Fix any out-of-range values so the policy is safe to use.
    ///
    /// Called by [`Backoff::new`]. Rules:
    /// - a zero `base` becomes [`Self::MIN_BASE`] (a zero base would
    ///   never grow and turn retries into a busy loop);
    /// - `max` is raised to `base` if it is smaller.
    pub fn validated(mut self) -> Self {
        if self.base.is_zero() {
            warn!("backoff base is zero, using minimum");
            self.base = Self::MIN_BASE;
        }
        if self.max < self.base {
            warn!(
                base = ?self.base,
                max = ?self.max,
                "backoff max below base, raising to base"
            );
            self.max = self.base;
        }
        self
    }
}

/// Stateful delay sequence: `base, 2·base, 4·base, …` capped at `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        let policy = policy.validated();
        Self {
            base: policy.base,
            max: policy.max,
            current: policy.base,
        }
    }

    /// Returns the delay to wait now and doubles the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        let next = self.current.checked_mul(2).unwrap_or(self.max);
        self.current = std::cmp::min(next, self.max);
        delay
    }

    /// The delay the next call to [`next_delay`](Self::next_delay)
    /// will return.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Starts over from `base`. Call after a success.
    pub fn reset(&mut self) {
        self.current = self.base;
    }
}
