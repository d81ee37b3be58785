//! Game session state for shifumi.
//!
//! This crate owns everything about one match between two players:
//!
//! 1. **State**: the [`Session`] snapshot and its round history
//! 2. **Rules**: who wins a round ([`resolve`]) and when the game ends
//! 3. **Storage**: where the resolver keeps sessions between choices
//!    ([`SessionRepository`], [`InMemorySessionRepository`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Engine (above)   ← applies choice events, publishes snapshots
//!     ↕
//! Session (this crate)  ← session state machine and repositories
//!     ↕
//! Protocol (below) ← SessionId, PlayerSlot, Choice, PlayerChoice
//! ```

mod error;
mod repository;
mod rules;
mod session;

pub use error::{RepositoryError, SessionError};
pub use repository::{InMemorySessionRepository, SessionRepository};
pub use rules::{RoundOutcome, resolve};
pub use session::{
    ChoiceApplied, RoundPhase, RoundResult, SESSION_ID_LEN, Session,
    SessionStatus, WINS_TO_FINISH, generate_session_id,
};
