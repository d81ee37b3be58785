//! Wire protocol for shifumi.
//!
//! This crate defines what travels between the ingest service, the
//! append-only log, and the game-logic service:
//!
//! - **Types** ([`SessionId`], [`PlayerSlot`], [`Choice`],
//!   [`PlayerChoice`]): the choice events and their identities.
//! - **HTTP bodies** ([`ChoiceRequest`], [`ChoiceResponse`]): what a
//!   client sends to `/play` and what it gets back.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how values are turned
//!   into log record payloads and back.
//! - **Errors** ([`ProtocolError`]): what can go wrong while doing so.
//!
//! # Architecture
//!
//! The protocol layer knows nothing about the log or about game rules.
//! It only knows how to name things and how to (de)serialize them.
//!
//! ```text
//! HTTP (ChoiceRequest) → Protocol (PlayerChoice) → Log (bytes)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod error;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Choice, ChoiceRequest, ChoiceResponse, PlayerChoice, PlayerSlot,
    SessionId, SUBMITTED_STATUS,
};
