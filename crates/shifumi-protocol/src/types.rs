//! Core protocol types for shifumi's wire format.
//!
//! These are the structures that get serialized onto the choice log and
//! into HTTP bodies. Field names follow the JSON wire format exactly, so
//! existing consumers of the `player-choices` topic keep working.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// The `status` string returned for every accepted submission.
pub const SUBMITTED_STATUS: &str = "Choice submitted successfully";

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a game session.
///
/// Newtype over `String` so a session ID can't be confused with any other
/// string (a topic name, a choice). `#[serde(transparent)]` keeps the JSON
/// representation a plain string: `"aB3dE5gH7j"`.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps an existing ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the ID as bytes, which is how it is used as a log key.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Returns `true` for the empty ID.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// One of the two seats in a session.
///
/// On the wire a slot is the string `"1"` or `"2"` (the `player_id`
/// field). For humans it reads `Player 1` / `Player 2`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
pub enum PlayerSlot {
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
}

impl PlayerSlot {
    /// Both slots, in seating order.
    pub const ALL: [PlayerSlot; 2] = [PlayerSlot::One, PlayerSlot::Two];

    /// The wire form: `"1"` or `"2"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::One => "1",
            Self::Two => "2",
        }
    }
}

impl fmt::Display for PlayerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Player {}", self.as_str())
    }
}

impl FromStr for PlayerSlot {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" => Ok(Self::One),
            "2" => Ok(Self::Two),
            other => Err(ProtocolError::InvalidSlot(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Choice
// ---------------------------------------------------------------------------

/// A hand: rock, paper or scissors.
///
/// Serialized lowercase. Parsing is exact, `"Rock"` is rejected.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    Rock,
    Paper,
    Scissors,
}

impl Choice {
    /// Every choice, handy for exhaustive tests.
    pub const ALL: [Choice; 3] = [Choice::Rock, Choice::Paper, Choice::Scissors];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rock => "rock",
            Self::Paper => "paper",
            Self::Scissors => "scissors",
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Choice {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rock" => Ok(Self::Rock),
            "paper" => Ok(Self::Paper),
            "scissors" => Ok(Self::Scissors),
            other => Err(ProtocolError::InvalidChoice(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// PlayerChoice: the choice event
// ---------------------------------------------------------------------------

/// A single submitted choice, as appended to the choice log.
///
/// Produced once per accepted submission by the ingest service and
/// consumed once by the round resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerChoice {
    /// Which seat made the choice.
    #[serde(rename = "player_id")]
    pub slot: PlayerSlot,

    /// The session the choice belongs to. Also the record key.
    pub session_id: SessionId,

    /// The hand played.
    pub choice: Choice,

    /// The round the ingest service saw as current when it accepted the
    /// choice. `0` means unknown (events written without the field) and
    /// is applied to whatever round is current.
    #[serde(default)]
    pub round_number: u32,

    /// `true` for the first choice of a freshly generated session.
    #[serde(default, rename = "init_session")]
    pub is_session_init: bool,
}

// ---------------------------------------------------------------------------
// HTTP bodies
// ---------------------------------------------------------------------------

/// The body of a `POST /play` request.
///
/// All fields are optional strings on the wire; an empty string means the
/// same as an absent field. Validation happens in the ingest service, not
/// during deserialization, so every rule produces its own error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub player_id: Option<String>,
    #[serde(default)]
    pub choice: Option<String>,
}

impl ChoiceRequest {
    /// Builds a request for `choice` with no session and no slot.
    pub fn new(choice: impl Into<String>) -> Self {
        Self {
            choice: Some(choice.into()),
            ..Self::default()
        }
    }

    /// Sets the session ID.
    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Sets the requested slot (`"1"` or `"2"`).
    pub fn player(mut self, player_id: impl Into<String>) -> Self {
        self.player_id = Some(player_id.into());
        self
    }

    /// The session ID, with empty strings treated as absent.
    pub fn session_id(&self) -> Option<&str> {
        non_empty(&self.session_id)
    }

    /// The requested slot, with empty strings treated as absent.
    pub fn player_id(&self) -> Option<&str> {
        non_empty(&self.player_id)
    }

    /// The raw choice string, with empty strings treated as absent.
    pub fn choice(&self) -> Option<&str> {
        non_empty(&self.choice)
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

/// The body of a successful `POST /play` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceResponse {
    pub session_id: SessionId,
    pub player_id: PlayerSlot,
    pub status: String,
}

impl ChoiceResponse {
    /// The response for an accepted submission.
    pub fn submitted(session_id: SessionId, player_id: PlayerSlot) -> Self {
        Self {
            session_id,
            player_id,
            status: SUBMITTED_STATUS.to_string(),
        }
    }
}
