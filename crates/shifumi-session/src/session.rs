//! The session snapshot and the rules for applying a choice to it.
//!
//! A [`Session`] is the full record of one match. It is what the
//! resolver keeps in its repository and what gets appended to the
//! snapshot log after every choice. Only [`Session::apply_choice`]
//! mutates it.

use std::fmt;

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use shifumi_protocol::{PlayerChoice, PlayerSlot, SessionId};

use crate::{RoundOutcome, SessionError, resolve};

/// Round wins needed to finish a session.
pub const WINS_TO_FINISH: u32 = 3;

/// Length of generated session IDs.
pub const SESSION_ID_LEN: usize = 10;

/// Generates a fresh session ID: 10 characters from `[a-zA-Z0-9]`.
pub fn generate_session_id() -> SessionId {
    let id: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect();
    SessionId::from(id)
}

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// Whether a session still accepts choices.
///
/// `InProgress → Finished` happens exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Finished,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => write!(f, "in_progress"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

// ---------------------------------------------------------------------------
// RoundPhase
// ---------------------------------------------------------------------------

/// Where the current round stands, derived from a session.
///
/// ```text
/// AwaitingPlayer1 ──(slot 1)──→ AwaitingPlayer2 ──(slot 2)──→ RoundResolved
///        ↑                                                        │
///        └──────────────(no one at 3 wins: next round)────────────┤
///                                                                 ▼
///                                                             Finished
/// ```
///
/// Slot 2 may also play first; the phase stays `AwaitingPlayer1` until
/// slot 1 catches up. `RoundResolved` is transient: after resolution the
/// session either moves to the next round or is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    AwaitingPlayer1,
    AwaitingPlayer2,
    RoundResolved,
    Finished,
}

impl RoundPhase {
    /// Returns `true` once nothing can change the session any more.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished)
    }
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingPlayer1 => write!(f, "AwaitingPlayer1"),
            Self::AwaitingPlayer2 => write!(f, "AwaitingPlayer2"),
            Self::RoundResolved => write!(f, "RoundResolved"),
            Self::Finished => write!(f, "Finished"),
        }
    }
}

// ---------------------------------------------------------------------------
// RoundResult
// ---------------------------------------------------------------------------

/// One round of a session.
///
/// Created empty when the round starts. Each slot's choice is filled in
/// once; after both are filled and the round is resolved it never
/// changes again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResult {
    pub round_number: u32,
    #[serde(default)]
    pub player1: Option<PlayerChoice>,
    #[serde(default)]
    pub player2: Option<PlayerChoice>,
    /// Outcome message, empty until the round is resolved.
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub outcome: Option<RoundOutcome>,
}

impl RoundResult {
    /// An unplayed round.
    pub fn pending(round_number: u32) -> Self {
        Self {
            round_number,
            player1: None,
            player2: None,
            result: String::new(),
            outcome: None,
        }
    }

    /// The choice recorded for `slot`, if any.
    pub fn choice_of(&self, slot: PlayerSlot) -> Option<&PlayerChoice> {
        match slot {
            PlayerSlot::One => self.player1.as_ref(),
            PlayerSlot::Two => self.player2.as_ref(),
        }
    }
}

// ---------------------------------------------------------------------------
// ChoiceApplied
// ---------------------------------------------------------------------------

/// What applying a choice did to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChoiceApplied {
    /// The choice was recorded; the other slot still has to play.
    Recorded { slot: PlayerSlot, round: u32 },
    /// Both slots played; the round was resolved and the next one started.
    RoundResolved { round: u32, outcome: RoundOutcome },
    /// Both slots played and the winner reached the win threshold.
    GameFinished {
        round: u32,
        outcome: RoundOutcome,
        winner: PlayerSlot,
    },
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The full state of one match, as stored and as published.
///
/// Serialized field names are the snapshot wire format read by the
/// ingest service and streamed by `/stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub status: SessionStatus,
    #[serde(rename = "round")]
    pub current_round: u32,
    pub player1_has_played: bool,
    pub player2_has_played: bool,
    pub rounds: Vec<RoundResult>,
    pub player1_wins: u32,
    pub player2_wins: u32,
    pub draws: u32,
    pub winner: Option<PlayerSlot>,
    /// Incremented on every mutation. Repositories compare-and-swap on it.
    #[serde(default)]
    pub version: u64,
}

impl Session {
    /// A fresh session: round 1, nobody has played, version 0.
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            status: SessionStatus::InProgress,
            current_round: 1,
            player1_has_played: false,
            player2_has_played: false,
            rounds: vec![RoundResult::pending(1)],
            player1_wins: 0,
            player2_wins: 0,
            draws: 0,
            winner: None,
            version: 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status == SessionStatus::Finished
    }

    /// Whether `slot` has recorded a choice for the current round.
    pub fn has_played(&self, slot: PlayerSlot) -> bool {
        match slot {
            PlayerSlot::One => self.player1_has_played,
            PlayerSlot::Two => self.player2_has_played,
        }
    }

    /// Rounds won by `slot`.
    pub fn wins(&self, slot: PlayerSlot) -> u32 {
        match slot {
            PlayerSlot::One => self.player1_wins,
            PlayerSlot::Two => self.player2_wins,
        }
    }

    pub fn phase(&self) -> RoundPhase {
        if self.is_finished() {
            RoundPhase::Finished
        } else if !self.player1_has_played {
            RoundPhase::AwaitingPlayer1
        } else if !self.player2_has_played {
            RoundPhase::AwaitingPlayer2
        } else {
            RoundPhase::RoundResolved
        }
    }

    /// The entry for the current round, if present.
    pub fn current_round_result(&self) -> Option<&RoundResult> {
        self.rounds
            .iter()
            .rev()
            .find(|r| r.round_number == self.current_round)
    }

    /// Applies one choice event.
    ///
    /// Records the choice for its slot, and if both slots have now
    /// played, resolves the round: tallies the outcome, then either
    /// finishes the session (a player reached [`WINS_TO_FINISH`]) or
    /// opens the next round. `version` is incremented on success.
    ///
    /// # Errors
    /// The session is left untouched when:
    /// - it is finished ([`SessionError::GameFinished`]),
    /// - the slot already played this round ([`SessionError::AlreadyPlayed`]),
    /// - the event targets another round ([`SessionError::StaleRound`]),
    /// - the event targets another session ([`SessionError::WrongSession`]).
    pub fn apply_choice(
        &mut self,
        choice: &PlayerChoice,
    ) -> Result<ChoiceApplied, SessionError> {
        if choice.session_id != self.session_id {
            return Err(SessionError::WrongSession {
                expected: self.session_id.clone(),
                got: choice.session_id.clone(),
            });
        }
        let phase = self.phase();
        if phase.is_terminal() {
            return Err(SessionError::GameFinished {
                session_id: self.session_id.clone(),
                winner: self.winner,
            });
        }
        if choice.round_number != 0 && choice.round_number != self.current_round
        {
            return Err(SessionError::StaleRound {
                current: self.current_round,
                got: choice.round_number,
            });
        }
        let slot = choice.slot;
        let round = self.current_round;
        let open = match phase {
            RoundPhase::AwaitingPlayer1 => !self.has_played(slot),
            RoundPhase::AwaitingPlayer2 => slot == PlayerSlot::Two,
            RoundPhase::RoundResolved | RoundPhase::Finished => false,
        };
        if !open {
            return Err(SessionError::AlreadyPlayed { slot, round });
        }

        let entry = self.current_round_entry();
        let mut recorded = choice.clone();
        recorded.round_number = round;
        match slot {
            PlayerSlot::One => entry.player1 = Some(recorded),
            PlayerSlot::Two => entry.player2 = Some(recorded),
        }
        match slot {
            PlayerSlot::One => self.player1_has_played = true,
            PlayerSlot::Two => self.player2_has_played = true,
        }
        self.version += 1;

        match self.resolve_current_round() {
            Some(applied) => Ok(applied),
            None => Ok(ChoiceApplied::Recorded { slot, round }),
        }
    }

    /// Returns the entry for the current round, creating it if missing.
    fn current_round_entry(&mut self) -> &mut RoundResult {
        let current = self.current_round;
        if self.rounds.last().map(|r| r.round_number) != Some(current) {
            self.rounds.push(RoundResult::pending(current));
        }
        let last = self.rounds.len() - 1;
        &mut self.rounds[last]
    }

    /// Resolves the current round if both choices are in.
    fn resolve_current_round(&mut self) -> Option<ChoiceApplied> {
        if !(self.player1_has_played && self.player2_has_played) {
            return None;
        }
        let round = self.current_round;
        let entry = self.current_round_entry();
        let (player1, player2) = match (&entry.player1, &entry.player2) {
            (Some(a), Some(b)) => (a.choice, b.choice),
            _ => return None,
        };

        let outcome = resolve(player1, player2);
        entry.result = outcome.describe(player1, player2);
        entry.outcome = Some(outcome);

        match outcome.winner() {
            Some(PlayerSlot::One) => self.player1_wins += 1,
            Some(PlayerSlot::Two) => self.player2_wins += 1,
            None => self.draws += 1,
        }

        let finished_by = PlayerSlot::ALL
            .into_iter()
            .find(|slot| self.wins(*slot) >= WINS_TO_FINISH);
        if let Some(winner) = finished_by {
            self.status = SessionStatus::Finished;
            self.winner = Some(winner);
            tracing::info!(
                session_id = %self.session_id,
                %winner,
                round,
                "session finished"
            );
            return Some(ChoiceApplied::GameFinished {
                round,
                outcome,
                winner,
            });
        }

        self.current_round += 1;
        self.rounds.push(RoundResult::pending(self.current_round));
        self.player1_has_played = false;
        self.player2_has_played = false;
        Some(ChoiceApplied::RoundResolved { round, outcome })
    }
}
