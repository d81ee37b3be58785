//! Error types for the session layer.

use shifumi_protocol::{PlayerSlot, SessionId};

/// Reasons a choice cannot be applied to a session.
///
/// None of these are failures of the system: the resolver logs them,
/// republishes the unchanged snapshot and moves on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The session is finished; nothing mutates it any more.
    #[error("session {session_id} already finished")]
    GameFinished {
        session_id: SessionId,
        winner: Option<PlayerSlot>,
    },

    /// The slot already recorded a choice for the current round.
    #[error("{slot} already played round {round}")]
    AlreadyPlayed { slot: PlayerSlot, round: u32 },

    /// The choice was accepted for a round that is no longer current.
    #[error("choice for round {got} arrived during round {current}")]
    StaleRound { current: u32, got: u32 },

    /// The choice event names a different session.
    #[error("choice for session {got} applied to session {expected}")]
    WrongSession { expected: SessionId, got: SessionId },
}

/// Errors from a [`SessionRepository`](crate::SessionRepository).
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The stored version differs from the caller's expectation.
    /// `found` is `None` when nothing is stored yet.
    #[error(
        "version conflict on session {session_id}: expected {expected:?}, found {found:?}"
    )]
    VersionConflict {
        session_id: SessionId,
        expected: Option<u64>,
        found: Option<u64>,
    },

    /// The session's state could not be observed in time. This is not
    /// a confirmed absence.
    #[error("session {0} could not be read in time")]
    Unavailable(SessionId),

    /// A lock guarding the store was poisoned by a panicking writer.
    #[error("repository lock poisoned")]
    LockPoisoned,

    /// The backing store failed.
    #[error("repository backend failed: {0}")]
    Backend(String),
}
