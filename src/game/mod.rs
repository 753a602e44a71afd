//! Game rules and match bookkeeping
//!
//! Every game type implements [`GameRules`]. Shared scoring and history
//! live in [`book::MatchBook`], which each variant owns.

pub mod book;
pub mod chess;
pub mod coin_flip;
pub mod r#match;
pub mod registry;
pub mod rps;
pub mod simultaneous;
pub mod snapshot;
pub mod tictactoe;

pub use book::{MatchBook, MatchStatus, Player, RoundRecord};
pub use r#match::{ActiveMatch, AppliedMove, MatchRegistry, MatchSummary, MoveRequest, PlayerMove};
pub use registry::{GameConfig, GameRegistry, RegistryError};
pub use snapshot::PublicState;

/// Opaque player identifier, unique within a match
pub type PlayerId = String;

/// Result of an accepted move
#[derive(Debug, Clone, Default)]
pub struct MoveOutcome {
    /// The move closed a round and a record was appended
    pub round_completed: bool,
    /// The match reached its terminal state on this move
    pub match_over: bool,
    /// The record appended by this move, if any
    pub resolved: Option<RoundRecord>,
}

impl MoveOutcome {
    /// An accepted move that did not close a round
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn resolved(record: RoundRecord, match_over: bool) -> Self {
        Self {
            round_completed: true,
            match_over,
            resolved: Some(record),
        }
    }
}

/// Why a move was not accepted. Rejections never mutate state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveRejection {
    #[error("game not in progress")]
    MatchFinished,

    #[error("player {0} is not in this match")]
    UnknownPlayer(PlayerId),

    #[error("not your turn, waiting on {waiting_on}")]
    NotYourTurn { waiting_on: PlayerId },

    #[error("already moved this round")]
    AlreadyMoved,

    #[error("invalid move '{raw}': {reason}")]
    InvalidMove { raw: String, reason: String },

    #[error("position {0} is already taken")]
    CellOccupied(u8),

    /// A decision arrived for a move request that has since been answered
    #[error("move request is no longer outstanding")]
    RequestExpired,
}

impl MoveRejection {
    pub fn invalid(raw: &str, reason: impl Into<String>) -> Self {
        Self::InvalidMove {
            raw: raw.to_string(),
            reason: reason.into(),
        }
    }

    /// The move itself was bad, as opposed to arriving at the wrong time
    pub fn is_illegal_move(&self) -> bool {
        matches!(self, Self::InvalidMove { .. } | Self::CellOccupied(_))
    }
}

/// Capability set shared by all game types
pub trait GameRules: Send {
    /// Shared scoring, history and status
    fn book(&self) -> &MatchBook;

    /// Check a move without applying it
    fn validate_move(&self, player_id: &str, raw: &str) -> Result<(), MoveRejection>;

    /// Validate and apply a move. The only state-mutating entry point.
    fn submit_move(&mut self, player_id: &str, raw: &str) -> Result<MoveOutcome, MoveRejection>;

    /// Players whose move is currently accepted
    fn awaiting(&self) -> Vec<PlayerId>;

    /// Moves the given player could legally submit right now
    fn available_moves(&self, player_id: &str) -> Vec<String>;

    /// Human-readable rules for agents
    fn instructions(&self) -> String;

    /// Read-only projection safe to send to any party
    fn public_state(&self) -> PublicState;

    fn is_over(&self) -> bool {
        self.book().status() == MatchStatus::Finished
    }
}
