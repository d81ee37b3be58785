//! Codec trait and implementations for log record payloads.
//!
//! Every value that lands on the log (choice events, session snapshots)
//! goes through a [`Codec`]. The engine never calls `serde_json` directly;
//! it holds a codec and asks it to encode or decode.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` lets a codec live inside long-running tasks
/// such as the round resolver's consumer loop.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Snapshots are JSON on the log so the `/stats` stream can forward them
/// as-is and operators can read the topic with stock Kafka tooling.
///
/// This is behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use shifumi_protocol::{
///     Choice, Codec, JsonCodec, PlayerChoice, PlayerSlot, SessionId,
/// };
///
/// let codec = JsonCodec;
///
/// let event = PlayerChoice {
///     slot: PlayerSlot::One,
///     session_id: SessionId::from("aB3dE5gH7j"),
///     choice: Choice::Rock,
///     round_number: 1,
///     is_session_init: true,
/// };
///
/// let bytes = codec.encode(&event).unwrap();
/// let decoded: PlayerChoice = codec.decode(&bytes).unwrap();
/// assert_eq!(event, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
