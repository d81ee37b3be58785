//! The outcome rule: rock beats scissors, paper beats rock, scissors
//! beats paper, identical hands draw.

use serde::{Deserialize, Serialize};
use shifumi_protocol::{Choice, PlayerSlot};

/// The result of one fully played round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundOutcome {
    Player1Wins,
    Player2Wins,
    Draw,
}

impl RoundOutcome {
    /// The winning slot, or `None` for a draw.
    pub fn winner(self) -> Option<PlayerSlot> {
        match self {
            Self::Player1Wins => Some(PlayerSlot::One),
            Self::Player2Wins => Some(PlayerSlot::Two),
            Self::Draw => None,
        }
    }

    /// Human-readable description stored in the round's `result` field.
    pub fn describe(self, player1: Choice, player2: Choice) -> String {
        match self {
            Self::Player1Wins => {
                format!("Player 1 wins: {player1} beats {player2}")
            }
            Self::Player2Wins => {
                format!("Player 2 wins: {player2} beats {player1}")
            }
            Self::Draw => format!("Draw: both chose {player1}"),
        }
    }
}

/// Returns `true` if `a` beats `b`.
fn beats(a: Choice, b: Choice) -> bool {
    matches!(
        (a, b),
        (Choice::Rock, Choice::Scissors)
            | (Choice::Paper, Choice::Rock)
            | (Choice::Scissors, Choice::Paper)
    )
}

/// Resolves a round from player 1's and player 2's choices.
pub fn resolve(player1: Choice, player2: Choice) -> RoundOutcome {
    if player1 == player2 {
        RoundOutcome::Draw
    } else if beats(player1, player2) {
        RoundOutcome::Player1Wins
    } else {
        RoundOutcome::Player2Wins
    }
}
