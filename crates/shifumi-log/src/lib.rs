//! Append-only log abstraction for shifumi.
//!
//! The ingest service and the game-logic service share no memory. Every
//! piece of state they exchange goes through a replicated append-only log
//! (Kafka in production). This crate provides the [`EventLog`] and
//! [`LogReader`] traits that abstract over it, plus two implementations:
//!
//! - [`MemoryLog`]: an in-process log for tests and local runs.
//! - `KafkaLog`: the production log, behind the `kafka` feature.
//!
//! # Feature Flags
//!
//! - `kafka`: Kafka log via `rdkafka` (needs librdkafka at build time)
//!
//! # Assumptions
//!
//! Every topic has a single partition, so offsets are dense and start at
//! zero and the broker preserves append order for the whole topic.

mod error;
#[cfg(feature = "kafka")]
mod kafka;
mod memory;

pub use error::LogError;
#[cfg(feature = "kafka")]
pub use kafka::{KafkaConfig, KafkaLog, KafkaReader};
pub use memory::{MemoryLog, MemoryReader};

use std::future::Future;

/// Key of the synthetic record written by availability probes.
///
/// Consumers skip records carrying this key.
pub const CANARY_KEY: &[u8] = b"__canary__";

/// A record read back from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// The topic the record was read from.
    pub topic: String,
    /// Position of the record within its (single-partition) topic.
    pub offset: u64,
    /// The record key. Empty when the record was written without one.
    pub key: Vec<u8>,
    /// The record payload.
    pub value: Vec<u8>,
}

impl Record {
    /// Returns `true` if this record was written by an availability probe.
    pub fn is_canary(&self) -> bool {
        self.key == CANARY_KEY
    }

    /// Returns `true` if the record key equals `key`.
    pub fn has_key(&self, key: &[u8]) -> bool {
        self.key == key
    }
}

/// Where a new reader starts consuming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartFrom {
    /// The first record still on the log. Offsets are not committed.
    Earliest,
    /// Only records appended after the reader was created.
    Latest,
    /// The committed position of a consumer group, or the earliest
    /// record if the group has never committed. Offsets are committed
    /// as records are handed out.
    Group(String),
}

/// The append-only log both services talk to.
///
/// Method futures are `Send` so the log can be used from handlers and
/// spawned tasks without extra bounds at every call site.
pub trait EventLog: Send + Sync + 'static {
    /// The reader type produced by [`reader`](Self::reader).
    type Reader: LogReader;

    /// Creates `topic` if it does not exist. An existing topic is success.
    fn create_topic(
        &self,
        topic: &str,
    ) -> impl Future<Output = Result<(), LogError>> + Send;

    /// Appends one record and waits for the acknowledgement.
    ///
    /// Returns the offset the record was written at.
    fn append(
        &self,
        topic: &str,
        key: &[u8],
        value: &[u8],
    ) -> impl Future<Output = Result<u64, LogError>> + Send;

    /// Returns the offset the next appended record will get, i.e. the
    /// number of records in the topic. Zero means the topic is empty.
    ///
    /// # Errors
    /// Returns [`LogError::UnknownTopic`] if the topic does not exist.
    fn end_offset(
        &self,
        topic: &str,
    ) -> impl Future<Output = Result<u64, LogError>> + Send;

    /// Opens a reader on `topic`.
    fn reader(
        &self,
        topic: &str,
        start: StartFrom,
    ) -> impl Future<Output = Result<Self::Reader, LogError>> + Send;
}

/// A cursor over one topic.
pub trait LogReader: Send + 'static {
    /// Waits for the next record.
    ///
    /// Returns `Ok(None)` when the log has been closed and no more records
    /// will arrive.
    fn next(
        &mut self,
    ) -> impl Future<Output = Result<Option<Record>, LogError>> + Send;
}
