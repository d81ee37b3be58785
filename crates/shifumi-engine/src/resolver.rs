//! The round resolver: the only writer of session state.
//!
//! Consumes choice events in log order, applies each to its session,
//! stores the result with a compare-and-swap and republishes the
//! snapshot. Republishing happens after every event, including ones that
//! only recorded a single slot and ones that were ignored, so readers
//! always see the latest state.

use std::sync::Arc;
use std::time::Duration;

use shifumi_log::{EventLog, LogReader, Record, StartFrom};
use shifumi_monitor::Backoff;
use shifumi_protocol::{Codec, JsonCodec, PlayerChoice};
use shifumi_session::{
    ChoiceApplied, RepositoryError, Session, SessionError, SessionRepository,
};
use tokio::sync::watch;

use crate::{EngineConfig, EngineError, SessionPublisher};

/// What handling one choice event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The choice changed the session.
    Applied(ChoiceApplied),
    /// The choice was not applicable (finished session, slot already
    /// played, stale round). The session is unchanged.
    Ignored(SessionError),
    /// The record was an availability canary.
    Skipped,
}

/// Applies choice events to sessions.
pub struct RoundResolver<R: SessionRepository, L: EventLog> {
    repo: R,
    log: Arc<L>,
    publisher: SessionPublisher<L>,
    config: EngineConfig,
    codec: JsonCodec,
}

impl<R: SessionRepository, L: EventLog> RoundResolver<R, L> {
    pub fn new(repo: R, log: Arc<L>, config: EngineConfig) -> Self {
        Self {
            repo,
            publisher: SessionPublisher::new(Arc::clone(&log), &config),
            log,
            config,
            codec: JsonCodec,
        }
    }

    /// The repository sessions are stored in.
    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Decodes and applies one record from the choice log.
    ///
    /// # Errors
    /// Returns [`EngineError::Protocol`] for a payload that isn't a
    /// choice event. The caller logs it and moves on.
    pub async fn handle_record(
        &self,
        record: &Record,
    ) -> Result<ResolveOutcome, EngineError> {
        if record.is_canary() {
            tracing::debug!(offset = record.offset, "canary record skipped");
            return Ok(ResolveOutcome::Skipped);
        }
        let choice: PlayerChoice = self.codec.decode(&record.value)?;
        if !record.key.is_empty() && !record.has_key(choice.session_id.as_bytes())
        {
            tracing::warn!(
                offset = record.offset,
                session_id = %choice.session_id,
                "choice event key does not match its session"
            );
        }
        self.apply(&choice).await
    }

    /// Applies one choice event and republishes the session.
    ///
    /// A session that has never been seen is created. If the repository
    /// reports a version conflict, the session is re-read and the choice
    /// re-applied, up to `max_cas_attempts` times.
    ///
    /// Applying the same event twice is safe: the second time the slot
    /// has already played (or the round has moved on), so the choice is
    /// ignored and the stored session is republished. That covers a
    /// retry after the swap succeeded but the publish failed.
    pub async fn apply(
        &self,
        choice: &PlayerChoice,
    ) -> Result<ResolveOutcome, EngineError> {
        let session_id = &choice.session_id;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let stored = self.repo.get(session_id).await?;
            let expected = stored.as_ref().map(|s| s.version);
            let mut session = match stored {
                Some(session) => session,
                None => Session::new(session_id.clone()),
            };

            let applied = match session.apply_choice(choice) {
                Ok(applied) => applied,
                Err(reason) => {
                    tracing::warn!(
                        %session_id,
                        slot = %choice.slot,
                        %reason,
                        "choice ignored"
                    );
                    if expected.is_some() {
                        self.publisher.publish(&session).await?;
                    }
                    return Ok(ResolveOutcome::Ignored(reason));
                }
            };

            match self.repo.compare_and_swap(expected, session.clone()).await {
                Ok(()) => {}
                Err(RepositoryError::VersionConflict { .. })
                    if attempt < self.config.max_cas_attempts =>
                {
                    tracing::warn!(%session_id, attempt, "version conflict, retrying");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }

            if expected.is_none() {
                tracing::info!(%session_id, "session created");
            }
            self.publisher.publish(&session).await?;
            log_applied(&session, &applied);
            return Ok(ResolveOutcome::Applied(applied));
        }
    }

    /// Consumes the choice log until `shutdown` flips or the log closes.
    ///
    /// Read failures drop the reader, wait with exponential backoff and
    /// reconnect. A record that fails for any reason other than a
    /// malformed payload is retried with the same backoff until it is
    /// handled or shutdown is signalled; the backoff resets after every
    /// handled record. Malformed records are logged and skipped.
    pub async fn run(
        &self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), EngineError> {
        let mut backoff = Backoff::new(self.config.reconnect);
        let topic = &self.config.choice_topic;
        let start = StartFrom::Group(self.config.resolver_group.clone());

        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            let mut reader = match self.log.reader(topic, start.clone()).await {
                Ok(reader) => reader,
                Err(e) => {
                    let delay = backoff.next_delay();
                    tracing::warn!(error = %e, retry_in = ?delay, "choice reader unavailable");
                    if sleep_or_shutdown(delay, &mut shutdown).await {
                        return Ok(());
                    }
                    continue;
                }
            };
            tracing::info!(%topic, group = %self.config.resolver_group, "resolver consuming");

            loop {
                let next = tokio::select! {
                    _ = shutdown.changed() => {
                        tracing::info!("resolver shutting down");
                        return Ok(());
                    }
                    next = reader.next() => next,
                };

                match next {
                    Ok(Some(record)) => {
                        if self
                            .handle_with_retry(&record, &mut backoff, &mut shutdown)
                            .await
                        {
                            tracing::info!(
                                offset = record.offset,
                                "resolver shutting down before the record was handled"
                            );
                            return Ok(());
                        }
                        backoff.reset();
                    }
                    Ok(None) => {
                        tracing::info!("choice log closed, resolver stopping");
                        return Ok(());
                    }
                    Err(e) => {
                        let delay = backoff.next_delay();
                        tracing::warn!(error = %e, retry_in = ?delay, "choice read failed, reconnecting");
                        if sleep_or_shutdown(delay, &mut shutdown).await {
                            return Ok(());
                        }
                        break;
                    }
                }
            }
        }
    }

    /// Handles `record`, retrying failures of the log or the repository.
    ///
    /// Returns `true` if shutdown was signalled while waiting to retry.
    async fn handle_with_retry(
        &self,
        record: &Record,
        backoff: &mut Backoff,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        loop {
            match self.handle_record(record).await {
                Ok(outcome) => {
                    tracing::debug!(offset = record.offset, ?outcome, "choice handled");
                    return false;
                }
                Err(EngineError::Protocol(e)) => {
                    tracing::warn!(offset = record.offset, error = %e, "malformed choice event skipped");
                    return false;
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    tracing::error!(
                        offset = record.offset,
                        error = %e,
                        retry_in = ?delay,
                        "choice event failed, retrying"
                    );
                    if sleep_or_shutdown(delay, shutdown).await {
                        return true;
                    }
                }
            }
        }
    }
}

fn log_applied(session: &Session, applied: &ChoiceApplied) {
    let session_id = &session.session_id;
    let phase = session.phase();
    match applied {
        ChoiceApplied::Recorded { slot, round } => {
            tracing::info!(%session_id, %slot, round, %phase, "choice recorded, waiting for the other player");
        }
        ChoiceApplied::RoundResolved { round, outcome } => {
            tracing::info!(
                %session_id,
                round,
                ?outcome,
                %phase,
                player1_wins = session.player1_wins,
                player2_wins = session.player2_wins,
                draws = session.draws,
                "round resolved"
            );
        }
        ChoiceApplied::GameFinished { round, winner, .. } => {
            tracing::info!(%session_id, round, %winner, "game finished");
        }
    }
}

/// Sleeps for `delay`. Returns `true` if shutdown was signalled first.
async fn sleep_or_shutdown(
    delay: Duration,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = shutdown.changed() => true,
    }
}
