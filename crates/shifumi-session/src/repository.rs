//! Where the round resolver keeps sessions between choice events.
//!
//! Writers never overwrite blindly. Every write names the version it was
//! computed from, and the repository refuses it if the stored session has
//! moved on. That turns "two writers raced" into an explicit
//! [`RepositoryError::VersionConflict`] instead of a lost update.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{PoisonError, RwLock};

use shifumi_protocol::SessionId;

use crate::{RepositoryError, Session};

/// Keyed session storage with compare-and-swap writes.
pub trait SessionRepository: Send + Sync + 'static {
    /// Returns the stored session, or `None` if there is none.
    fn get(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<Option<Session>, RepositoryError>> + Send;

    /// Stores `session` if the stored version equals `expected_version`.
    ///
    /// `expected_version = None` means the session must not exist yet.
    ///
    /// # Errors
    /// Returns [`RepositoryError::VersionConflict`] when the stored
    /// version (or absence) differs from `expected_version`.
    fn compare_and_swap(
        &self,
        expected_version: Option<u64>,
        session: Session,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

// ---------------------------------------------------------------------------
// InMemorySessionRepository
// ---------------------------------------------------------------------------

/// A process-local repository.
///
/// One `RwLock` guards the whole map but it is only held for the
/// check-and-swap itself, never while a session is being computed, so
/// unrelated sessions don't wait on each other's round logic.
#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl InMemorySessionRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stores a session observed elsewhere (e.g. recovered from the
    /// snapshot log) unless a newer version is already held.
    ///
    /// Returns the session now stored.
    pub fn seed(&self, session: Session) -> Result<Session, RepositoryError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        let stored = sessions
            .entry(session.session_id.clone())
            .and_modify(|current| {
                if session.version > current.version {
                    *current = session.clone();
                }
            })
            .or_insert_with(|| session.clone());
        Ok(stored.clone())
    }

    fn swap(
        &self,
        expected_version: Option<u64>,
        session: Session,
    ) -> Result<(), RepositoryError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        let found = sessions.get(&session.session_id).map(|s| s.version);
        if found != expected_version {
            return Err(RepositoryError::VersionConflict {
                session_id: session.session_id,
                expected: expected_version,
                found,
            });
        }
        sessions.insert(session.session_id.clone(), session);
        Ok(())
    }
}

impl SessionRepository for InMemorySessionRepository {
    async fn get(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<Session>, RepositoryError> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(sessions.get(session_id).cloned())
    }

    async fn compare_and_swap(
        &self,
        expected_version: Option<u64>,
        session: Session,
    ) -> Result<(), RepositoryError> {
        let session_id = session.session_id.clone();
        let version = session.version;
        self.swap(expected_version, session)?;
        tracing::debug!(%session_id, version, "session stored");
        Ok(())
    }
}
