//! HTTP handlers for both services.
//!
//! `POST /play` turns a request into a choice event. `GET /stats` tails
//! the snapshot log and streams each snapshot as one JSON line. Both
//! services answer `GET /health`.

use std::sync::Arc;

use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures_util::Stream;
use shifumi_engine::{ChoiceIngestor, EngineConfig, ErrorKind, IngestError};
use shifumi_log::{EventLog, LogError, LogReader, Record, StartFrom};
use shifumi_protocol::{ChoiceRequest, ChoiceResponse, Codec, JsonCodec};
use shifumi_session::Session;
use tokio::sync::watch;

/// Message returned for every infrastructure failure on `/play`.
pub(crate) const SUBMIT_FAILED: &str = "Failed to submit choice";

/// Shared state of the ingest service.
pub(crate) struct IngestState<L: EventLog> {
    pub(crate) ingestor: ChoiceIngestor<L>,
}

/// Shared state of the game-logic service.
pub(crate) struct LogicState<L: EventLog> {
    pub(crate) log: Arc<L>,
    pub(crate) config: EngineConfig,
    /// Flips to `true` when the server shuts down; open streams end.
    pub(crate) shutdown: watch::Receiver<bool>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// An error response: a status code and `{"error": message}`.
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        let status = match err.kind() {
            ErrorKind::Validation | ErrorKind::Unavailable => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Infrastructure => {
                tracing::error!(error = %err, "choice submission failed");
                return Self::internal(SUBMIT_FAILED);
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::debug!(status = %self.status, message = %self.message, "request rejected");
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub(crate) async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `POST /play`
pub(crate) async fn play<L: EventLog>(
    State(state): State<Arc<IngestState<L>>>,
    body: Result<Json<ChoiceRequest>, JsonRejection>,
) -> Result<Json<ChoiceResponse>, ApiError> {
    let Json(request) =
        body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let submission = state.ingestor.submit(&request).await?;
    Ok(Json(submission.response()))
}

/// `GET /stats`
///
/// Streams from the stats consumer group's committed position, so a
/// reconnecting client picks up where the group left off.
pub(crate) async fn stats<L: EventLog>(
    State(state): State<Arc<LogicState<L>>>,
) -> Result<Response, ApiError> {
    let start = StartFrom::Group(state.config.stats_group.clone());
    let reader = state
        .log
        .reader(&state.config.snapshot_topic, start)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "stats reader unavailable");
            ApiError::internal("Failed to read game results")
        })?;
    tracing::info!(group = %state.config.stats_group, "stats stream opened");

    let body = Body::from_stream(snapshot_lines(reader, state.shutdown.clone()));
    Ok(([(header::CONTENT_TYPE, "application/x-ndjson")], body).into_response())
}

/// One newline-terminated snapshot per record, until shutdown, the end of
/// the log, or a read error. A read error is yielded once and ends the
/// stream.
fn snapshot_lines<R: LogReader>(
    reader: R,
    shutdown: watch::Receiver<bool>,
) -> impl Stream<Item = Result<Bytes, LogError>> + Send + 'static {
    futures_util::stream::unfold(Some((reader, shutdown)), |state| async move {
        let Some((mut reader, mut shutdown)) = state else {
            return None;
        };
        loop {
            let next = tokio::select! {
                _ = shutdown.changed() => return None,
                next = reader.next() => next,
            };
            match next {
                Ok(Some(record)) => {
                    if let Some(line) = snapshot_line(&record) {
                        return Some((Ok(line), Some((reader, shutdown))));
                    }
                }
                Ok(None) => return None,
                Err(e) => {
                    tracing::warn!(error = %e, "stats stream read failed");
                    return Some((Err(e), None));
                }
            }
        }
    })
}

fn snapshot_line(record: &Record) -> Option<Bytes> {
    if record.is_canary() {
        return None;
    }
    let codec = JsonCodec;
    let session: Session = match codec.decode(&record.value) {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(offset = record.offset, error = %e, "undecodable snapshot skipped");
            return None;
        }
    };
    let mut line = codec.encode(&session).ok()?;
    line.push(b'\n');
    Some(Bytes::from(line))
}
