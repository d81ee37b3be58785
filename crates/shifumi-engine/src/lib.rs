//! Session coordination and round resolution for shifumi.
//!
//! The two services never share memory. The ingest side validates a
//! submission against the latest published snapshot and appends a choice
//! event; the game-logic side consumes choice events, applies them to its
//! sessions, and appends a fresh snapshot after every one.
//!
//! ```text
//! client → ChoiceIngestor ──(player-choices)──→ RoundResolver
//!              ↑                                     │
//!        SnapshotReader ←──(game-results)── SessionPublisher
//! ```
//!
//! # Key types
//!
//! - [`ChoiceIngestor`]: validates a request and emits a choice event
//! - [`SnapshotReader`]: latest snapshot for a session, within a deadline
//! - [`RoundResolver`]: applies choice events, runs the consumer loop
//! - [`SessionPublisher`]: appends snapshots
//! - [`LogBackedRepository`]: resolver storage that recovers from the log
//! - [`EngineConfig`]: topics, consumer groups, deadlines

mod config;
mod error;
mod ingest;
mod publisher;
mod repository;
mod resolver;
mod snapshot;

pub use config::EngineConfig;
pub use error::{EngineError, ErrorKind, IngestError};
pub use ingest::{ChoiceIngestor, Submission, assign_slot};
pub use publisher::SessionPublisher;
pub use repository::LogBackedRepository;
pub use resolver::{ResolveOutcome, RoundResolver};
pub use snapshot::{SnapshotLookup, SnapshotReader};
