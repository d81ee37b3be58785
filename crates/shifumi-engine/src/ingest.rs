//! Choice ingestion: validate a submission and emit a choice event.
//!
//! Ingestion never mutates a session. It checks the request against the
//! latest published snapshot, decides which slot the submitter plays,
//! and appends one [`PlayerChoice`] to the choice log. That append is its
//! only side effect.
//!
//! There is no deduplication and no lock across ingest instances: two
//! requests can both pass validation against the same snapshot. The
//! resolver applies whichever event it sees first and ignores the other.

use std::sync::Arc;

use shifumi_log::{EventLog, LogError, LogReader, StartFrom};
use shifumi_protocol::{
    Choice, ChoiceRequest, ChoiceResponse, Codec, JsonCodec, PlayerChoice,
    PlayerSlot, SessionId,
};
use shifumi_session::{Session, generate_session_id};

use crate::{
    EngineConfig, EngineError, IngestError, SnapshotLookup, SnapshotReader,
};

/// An accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub session_id: SessionId,
    pub slot: PlayerSlot,
    /// The round the choice was accepted for.
    pub round_number: u32,
    /// `true` if this submission created the session.
    pub created_session: bool,
    /// Offset of the choice event on the choice log.
    pub offset: u64,
}

impl Submission {
    /// The HTTP response body for this submission.
    pub fn response(&self) -> ChoiceResponse {
        ChoiceResponse::submitted(self.session_id.clone(), self.slot)
    }
}

/// Decides which slot a submitter plays in `session`.
///
/// With no requested slot, the submitter can only be the second player
/// joining after slot 1 has played.
///
/// # Errors
/// - [`IngestError::GameFinished`] if the session is finished
/// - [`IngestError::SessionFull`] if slot 2 already played this round
/// - [`IngestError::WaitingForFirstPlayer`] if slot 1 hasn't played yet
/// - [`IngestError::InvalidPlayerSlot`] if `requested` isn't `"1"`/`"2"`
/// - [`IngestError::AlreadyPlayed`] if the requested slot already played
pub fn assign_slot(
    session: &Session,
    requested: Option<&str>,
) -> Result<PlayerSlot, IngestError> {
    let session_id = &session.session_id;
    if session.is_finished() {
        return Err(IngestError::GameFinished {
            session_id: session_id.clone(),
            winner: session.winner,
        });
    }

    match requested {
        None => {
            if session.has_played(PlayerSlot::Two) {
                Err(IngestError::SessionFull(session_id.clone()))
            } else if session.has_played(PlayerSlot::One) {
                Ok(PlayerSlot::Two)
            } else {
                Err(IngestError::WaitingForFirstPlayer(session_id.clone()))
            }
        }
        Some(raw) => {
            let slot: PlayerSlot = raw
                .parse()
                .map_err(|_| IngestError::InvalidPlayerSlot(raw.to_string()))?;
            if session.has_played(slot) {
                return Err(IngestError::AlreadyPlayed {
                    session_id: session_id.clone(),
                    slot,
                    round: session.current_round,
                });
            }
            Ok(slot)
        }
    }
}

/// The ingest side of the engine.
pub struct ChoiceIngestor<L: EventLog> {
    log: Arc<L>,
    reader: SnapshotReader<L>,
    choice_topic: String,
    codec: JsonCodec,
}

impl<L: EventLog> ChoiceIngestor<L> {
    pub fn new(log: Arc<L>, config: &EngineConfig) -> Self {
        Self {
            reader: SnapshotReader::new(Arc::clone(&log), config),
            log,
            choice_topic: config.choice_topic.clone(),
            codec: JsonCodec,
        }
    }

    /// Validates `request` and appends the resulting choice event.
    ///
    /// Without a session ID a new session is generated and the submitter
    /// becomes slot 1. With one, the latest snapshot decides the slot.
    /// A session that exists on the choice log but has no snapshot yet is
    /// reported as [`IngestError::SessionUnavailable`].
    pub async fn submit(
        &self,
        request: &ChoiceRequest,
    ) -> Result<Submission, IngestError> {
        let raw_choice = request.choice().unwrap_or_default();
        let choice: Choice = raw_choice
            .parse()
            .map_err(|_| IngestError::InvalidChoice(raw_choice.to_string()))?;

        let event = match request.session_id() {
            None => {
                if request.player_id().is_some() {
                    return Err(IngestError::SlotWithoutSession);
                }
                PlayerChoice {
                    slot: PlayerSlot::One,
                    session_id: generate_session_id(),
                    choice,
                    round_number: 1,
                    is_session_init: true,
                }
            }
            Some(id) => {
                let session_id = SessionId::from(id);
                let session = match self.reader.lookup(&session_id).await? {
                    SnapshotLookup::Found(session) => session,
                    SnapshotLookup::Absent => {
                        return Err(self.unpublished(session_id).await?);
                    }
                    SnapshotLookup::TimedOut => {
                        return Err(IngestError::SessionUnavailable(session_id));
                    }
                };
                let slot = assign_slot(&session, request.player_id())?;
                PlayerChoice {
                    slot,
                    session_id,
                    choice,
                    round_number: session.current_round,
                    is_session_init: false,
                }
            }
        };

        let payload = self.codec.encode(&event).map_err(EngineError::from)?;
        let offset = self
            .log
            .append(&self.choice_topic, event.session_id.as_bytes(), &payload)
            .await
            .map_err(EngineError::from)?;

        tracing::info!(
            session_id = %event.session_id,
            slot = %event.slot,
            round = event.round_number,
            new_session = event.is_session_init,
            offset,
            "choice submitted"
        );

        Ok(Submission {
            session_id: event.session_id,
            slot: event.slot,
            round_number: event.round_number,
            created_session: event.is_session_init,
            offset,
        })
    }

    /// Explains a session with no snapshot yet.
    ///
    /// A choice event keyed by the ID means the session was created and
    /// the resolver hasn't published it: `SessionUnavailable`. Only when
    /// the choice log has never seen the ID is it `SessionNotFound`.
    async fn unpublished(
        &self,
        session_id: SessionId,
    ) -> Result<IngestError, EngineError> {
        let deadline = self.reader.deadline();
        match tokio::time::timeout(deadline, self.choice_seen(&session_id)).await
        {
            Ok(Ok(false)) => Ok(IngestError::SessionNotFound(session_id)),
            Ok(Ok(true)) => {
                tracing::debug!(%session_id, "session created but not yet published");
                Ok(IngestError::SessionUnavailable(session_id))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::warn!(%session_id, ?deadline, "choice log scan timed out");
                Ok(IngestError::SessionUnavailable(session_id))
            }
        }
    }

    /// Whether any choice event on the choice log is keyed by `session_id`.
    async fn choice_seen(
        &self,
        session_id: &SessionId,
    ) -> Result<bool, EngineError> {
        let end = match self.log.end_offset(&self.choice_topic).await {
            Ok(0) | Err(LogError::UnknownTopic(_)) => return Ok(false),
            Ok(end) => end,
            Err(e) => return Err(e.into()),
        };

        let mut reader = self
            .log
            .reader(&self.choice_topic, StartFrom::Earliest)
            .await?;
        while let Some(record) = reader.next().await? {
            if record.has_key(session_id.as_bytes()) {
                return Ok(true);
            }
            if record.offset + 1 >= end {
                break;
            }
        }
        Ok(false)
    }
}
