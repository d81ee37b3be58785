//! Error types for the protocol layer.
//!
//! Each shifumi crate defines its own error enum. A `ProtocolError`
//! always means a value could not be parsed or (de)serialized; it never
//! means the log or a session misbehaved.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, missing required fields, or a
    /// choice outside rock/paper/scissors inside a choice event.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A choice string that is not exactly `rock`, `paper` or `scissors`.
    #[error("invalid choice: {0:?}")]
    InvalidChoice(String),

    /// A player slot string that is not `"1"` or `"2"`.
    #[error("invalid player slot: {0:?}")]
    InvalidSlot(String),
}
