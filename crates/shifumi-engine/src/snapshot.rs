//! Reading the latest snapshot of a session from the snapshot log.

use std::sync::Arc;
use std::time::Duration;

use shifumi_log::{EventLog, LogError, LogReader, StartFrom};
use shifumi_protocol::{Codec, JsonCodec, SessionId};
use shifumi_session::Session;

use crate::{EngineConfig, EngineError};

/// Result of a snapshot lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotLookup {
    /// The latest snapshot of the session.
    Found(Session),
    /// The whole log was read and no snapshot carries this ID. The
    /// session may still exist with its first snapshot not yet published.
    Absent,
    /// The deadline passed before the scan finished. Says nothing about
    /// whether the session exists.
    TimedOut,
}

impl SnapshotLookup {
    /// The snapshot, if one was found.
    pub fn into_session(self) -> Option<Session> {
        match self {
            Self::Found(session) => Some(session),
            Self::Absent | Self::TimedOut => None,
        }
    }
}

/// Resolves "current state of session X" from the snapshot log.
///
/// Each lookup notes the topic's end offset, then scans from the earliest
/// record up to it. An empty or missing topic answers `Absent` without
/// scanning.
pub struct SnapshotReader<L: EventLog> {
    log: Arc<L>,
    topic: String,
    deadline: Duration,
    codec: JsonCodec,
}

impl<L: EventLog> SnapshotReader<L> {
    pub fn new(log: Arc<L>, config: &EngineConfig) -> Self {
        Self {
            log,
            topic: config.snapshot_topic.clone(),
            deadline: config.read_deadline,
            codec: JsonCodec,
        }
    }

    /// The deadline applied to every lookup.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Looks up the latest snapshot of `session_id`.
    ///
    /// When several snapshots match, the one with the highest `version`
    /// wins; equal versions resolve to the later record. Records that
    /// fail to decode are skipped.
    ///
    /// # Errors
    /// Log failures are returned as errors, never as `Absent` or
    /// `TimedOut`.
    pub async fn lookup(
        &self,
        session_id: &SessionId,
    ) -> Result<SnapshotLookup, EngineError> {
        match tokio::time::timeout(self.deadline, self.scan(session_id)).await
        {
            Ok(Ok(Some(session))) => Ok(SnapshotLookup::Found(session)),
            Ok(Ok(None)) => Ok(SnapshotLookup::Absent),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::warn!(
                    %session_id,
                    deadline = ?self.deadline,
                    "snapshot lookup timed out"
                );
                Ok(SnapshotLookup::TimedOut)
            }
        }
    }

    async fn scan(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<Session>, EngineError> {
        let end = match self.log.end_offset(&self.topic).await {
            Ok(0) | Err(LogError::UnknownTopic(_)) => return Ok(None),
            Ok(end) => end,
            Err(e) => return Err(e.into()),
        };

        let mut reader =
            self.log.reader(&self.topic, StartFrom::Earliest).await?;
        let mut latest: Option<Session> = None;

        while let Some(record) = reader.next().await? {
            if record.has_key(session_id.as_bytes()) {
                match self.codec.decode::<Session>(&record.value) {
                    Ok(session) if session.session_id == *session_id => {
                        let newer = latest
                            .as_ref()
                            .is_none_or(|l| session.version >= l.version);
                        if newer {
                            latest = Some(session);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(
                        %session_id,
                        offset = record.offset,
                        error = %e,
                        "undecodable snapshot skipped"
                    ),
                }
            }
            if record.offset + 1 >= end {
                break;
            }
        }

        Ok(latest)
    }
}
