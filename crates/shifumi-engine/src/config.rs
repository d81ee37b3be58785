//! Engine configuration.

use std::time::Duration;

use shifumi_monitor::BackoffPolicy;

/// Topic names, consumer groups and timing for both services.
///
/// Both services must agree on topic names; everything else is local to
/// the service that uses it.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Where choice events are appended.
    pub choice_topic: String,

    /// Where session snapshots are appended.
    pub snapshot_topic: String,

    /// Consumer group of the round resolver.
    pub resolver_group: String,

    /// Consumer group of the `/stats` stream.
    pub stats_group: String,

    /// How long a snapshot lookup may take before it reports
    /// [`SnapshotLookup::TimedOut`](crate::SnapshotLookup::TimedOut).
    pub read_deadline: Duration,

    /// Pace of the resolver's reconnects after a read failure.
    pub reconnect: BackoffPolicy,

    /// Attempts per choice when the repository reports a version conflict.
    pub max_cas_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            choice_topic: "player-choices".to_string(),
            snapshot_topic: "game-results".to_string(),
            resolver_group: "game-logic".to_string(),
            stats_group: "live-stats-consumer".to_string(),
            read_deadline: Duration::from_secs(5),
            reconnect: BackoffPolicy::new(
                Duration::from_secs(2),
                Duration::from_secs(60),
            ),
            max_cas_attempts: 3,
        }
    }
}

impl EngineConfig {
    /// Topics both services need before they start.
    pub fn topics(&self) -> Vec<String> {
        vec![self.choice_topic.clone(), self.snapshot_topic.clone()]
    }

    pub fn with_read_deadline(mut self, deadline: Duration) -> Self {
        self.read_deadline = deadline;
        self
    }
}
