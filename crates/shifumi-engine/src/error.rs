//! Error types for the engine layer.

use shifumi_log::LogError;
use shifumi_protocol::{PlayerSlot, ProtocolError, SessionId};
use shifumi_session::RepositoryError;

/// Infrastructure failures: the log, the codec or the repository broke.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The append-only log failed (unreachable, unknown topic, ...).
    #[error(transparent)]
    Log(#[from] LogError),

    /// A value could not be encoded or a record could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The session repository failed or kept conflicting.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// How a failure should be surfaced to whoever caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input. Resubmitting the same request will fail again.
    Validation,
    /// The request is valid but clashes with the session's state.
    Conflict,
    /// The session is confirmed not to exist.
    NotFound,
    /// The session's state could not be observed in time.
    Unavailable,
    /// Something on the server side broke.
    Infrastructure,
}

/// Why a submission was rejected.
///
/// The `Display` text of every variant except `Infrastructure` is meant
/// for the submitting client.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The choice is missing or not rock/paper/scissors.
    #[error("Invalid choice. Must be rock, paper, or scissors.")]
    InvalidChoice(String),

    /// A slot was requested for a session that doesn't exist yet.
    #[error(
        "Player ID cannot be provided without a session ID for the first player."
    )]
    SlotWithoutSession,

    /// The requested slot is not `"1"` or `"2"`.
    #[error("Invalid PlayerID for session.")]
    InvalidPlayerSlot(String),

    /// No snapshot could be read before the deadline, or the session was
    /// created but its first snapshot is not published yet.
    #[error(
        "Session ID does not exist, or the server is busy processing another player's choice."
    )]
    SessionUnavailable(SessionId),

    /// Neither the snapshot log nor the choice log has seen the session.
    #[error("Session {0} does not exist.")]
    SessionNotFound(SessionId),

    /// The session is finished.
    #[error("Game has already finished. {} won!", winner_label(.winner))]
    GameFinished {
        session_id: SessionId,
        winner: Option<PlayerSlot>,
    },

    /// Both slots are taken for this round.
    #[error("Session is full; Player 2 has already joined.")]
    SessionFull(SessionId),

    /// Slot 2 tried to join before slot 1 played.
    #[error("Player 2 cannot join yet, waiting for Player 1 to play.")]
    WaitingForFirstPlayer(SessionId),

    /// The requested slot already played this round.
    #[error("Player has already played this round")]
    AlreadyPlayed {
        session_id: SessionId,
        slot: PlayerSlot,
        round: u32,
    },

    /// The choice could not be emitted.
    #[error("failed to submit choice: {0}")]
    Infrastructure(#[from] EngineError),
}

fn winner_label(winner: &Option<PlayerSlot>) -> String {
    match winner {
        Some(slot) => slot.to_string(),
        None => "Nobody".to_string(),
    }
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidChoice(_)
            | Self::SlotWithoutSession
            | Self::InvalidPlayerSlot(_) => ErrorKind::Validation,
            Self::SessionUnavailable(_) => ErrorKind::Unavailable,
            Self::SessionNotFound(_) => ErrorKind::NotFound,
            Self::GameFinished { .. }
            | Self::SessionFull(_)
            | Self::WaitingForFirstPlayer(_)
            | Self::AlreadyPlayed { .. } => ErrorKind::Conflict,
            Self::Infrastructure(_) => ErrorKind::Infrastructure,
        }
    }
}
