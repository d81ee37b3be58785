//! Error types for the log layer.

/// Errors that can occur while talking to the append-only log.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The client could not be created or the broker is unreachable.
    #[error("log unavailable: {0}")]
    Unavailable(String),

    /// A topic could not be created (anything other than "already exists").
    #[error("failed to create topic {topic}: {reason}")]
    CreateTopic { topic: String, reason: String },

    /// The topic does not exist on the log.
    #[error("unknown topic {0}")]
    UnknownTopic(String),

    /// An append was not acknowledged.
    #[error("append to {topic} failed: {reason}")]
    Append { topic: String, reason: String },

    /// Reading the next record failed.
    #[error("read from {topic} failed: {reason}")]
    Read { topic: String, reason: String },
}
