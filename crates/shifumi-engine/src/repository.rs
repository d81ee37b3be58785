//! Resolver storage that falls back to the snapshot log.

use std::sync::Arc;

use shifumi_log::EventLog;
use shifumi_protocol::SessionId;
use shifumi_session::{
    InMemorySessionRepository, RepositoryError, Session, SessionRepository,
};

use crate::{EngineConfig, SnapshotLookup, SnapshotReader};

/// A [`SessionRepository`] that keeps sessions in memory and recovers
/// unknown ones from the snapshot log.
///
/// A restarted resolver starts with an empty cache; the first choice for
/// an existing session reads its latest snapshot and continues from
/// there instead of starting the match over.
pub struct LogBackedRepository<L: EventLog> {
    cache: InMemorySessionRepository,
    reader: SnapshotReader<L>,
}

impl<L: EventLog> LogBackedRepository<L> {
    pub fn new(log: Arc<L>, config: &EngineConfig) -> Self {
        Self {
            cache: InMemorySessionRepository::new(),
            reader: SnapshotReader::new(log, config),
        }
    }

    /// Number of sessions held in memory.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

impl<L: EventLog> SessionRepository for LogBackedRepository<L> {
    async fn get(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<Session>, RepositoryError> {
        if let Some(session) = self.cache.get(session_id).await? {
            return Ok(Some(session));
        }

        let lookup = self
            .reader
            .lookup(session_id)
            .await
            .map_err(|e| RepositoryError::Backend(e.to_string()))?;
        match lookup {
            SnapshotLookup::Found(session) => {
                tracing::info!(
                    %session_id,
                    version = session.version,
                    "session recovered from snapshot log"
                );
                self.cache.seed(session).map(Some)
            }
            SnapshotLookup::Absent => Ok(None),
            SnapshotLookup::TimedOut => {
                Err(RepositoryError::Unavailable(session_id.clone()))
            }
        }
    }

    async fn compare_and_swap(
        &self,
        expected_version: Option<u64>,
        session: Session,
    ) -> Result<(), RepositoryError> {
        self.cache.compare_and_swap(expected_version, session).await
    }
}
