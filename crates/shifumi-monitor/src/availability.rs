//! Startup availability probing.

use std::sync::Arc;
use std::time::Duration;

use shifumi_log::{CANARY_KEY, EventLog, LogError};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::{Backoff, BackoffPolicy};

/// Payload of the canary record.
pub const CANARY_VALUE: &[u8] = b"availability probe";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to probe and how patiently.
#[derive(Debug, Clone)]
pub struct AvailabilityConfig {
    /// Topics that must exist. The canary is written to the first one.
    pub topics: Vec<String>,
    /// Delay between failed probes.
    pub backoff: BackoffPolicy,
}

impl AvailabilityConfig {
    /// Probes `topics` with the default backoff (10 s doubling to 2 min).
    pub fn new<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topics: topics.into_iter().map(Into::into).collect(),
            backoff: BackoffPolicy::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Outcome of [`AvailabilityMonitor::wait_until_available`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityReport {
    /// Probes made, including the successful one.
    pub attempts: u32,
    /// Time spent from the first probe to success.
    pub waited: Duration,
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

/// Blocks startup until the log is usable.
pub struct AvailabilityMonitor<L: EventLog> {
    log: Arc<L>,
    config: AvailabilityConfig,
}

impl<L: EventLog> AvailabilityMonitor<L> {
    pub fn new(log: Arc<L>, config: AvailabilityConfig) -> Self {
        Self { log, config }
    }

    /// Makes one attempt: creates every topic, then writes the canary.
    ///
    /// Topic creation is idempotent, so a probe can be repeated safely.
    pub async fn probe(&self) -> Result<(), LogError> {
        for topic in &self.config.topics {
            self.log.create_topic(topic).await?;
            debug!(%topic, "topic ready");
        }
        if let Some(topic) = self.config.topics.first() {
            let offset =
                self.log.append(topic, CANARY_KEY, CANARY_VALUE).await?;
            debug!(%topic, offset, "canary written");
        }
        Ok(())
    }

    /// Probes until one probe succeeds, sleeping with exponential backoff
    /// in between. Never gives up.
    pub async fn wait_until_available(&self) -> AvailabilityReport {
        let mut backoff = Backoff::new(self.config.backoff);
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts = attempts.saturating_add(1);
            match self.probe().await {
                Ok(()) => {
                    let waited = started.elapsed();
                    info!(
                        attempts,
                        waited = ?waited,
                        topics = ?self.config.topics,
                        "log available"
                    );
                    return AvailabilityReport { attempts, waited };
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    warn!(
                        attempts,
                        error = %e,
                        retry_in = ?delay,
                        "log unavailable, retrying"
                    );
                    time::sleep(delay).await;
                }
            }
        }
    }
}
