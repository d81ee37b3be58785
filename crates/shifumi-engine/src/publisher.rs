//! Appending session snapshots.

use std::sync::Arc;

use shifumi_log::EventLog;
use shifumi_protocol::{Codec, JsonCodec};
use shifumi_session::Session;

use crate::{EngineConfig, EngineError};

/// Appends the full session, keyed by session ID, to the snapshot log.
///
/// The append is not coordinated with readers: a lookup racing with a
/// publish may see the previous snapshot.
pub struct SessionPublisher<L: EventLog> {
    log: Arc<L>,
    topic: String,
    codec: JsonCodec,
}

impl<L: EventLog> SessionPublisher<L> {
    pub fn new(log: Arc<L>, config: &EngineConfig) -> Self {
        Self {
            log,
            topic: config.snapshot_topic.clone(),
            codec: JsonCodec,
        }
    }

    /// Publishes `session` and returns the snapshot's offset.
    pub async fn publish(&self, session: &Session) -> Result<u64, EngineError> {
        let payload = self.codec.encode(session)?;
        let offset = self
            .log
            .append(&self.topic, session.session_id.as_bytes(), &payload)
            .await?;
        tracing::debug!(
            session_id = %session.session_id,
            version = session.version,
            round = session.current_round,
            offset,
            "snapshot published"
        );
        Ok(offset)
    }
}
