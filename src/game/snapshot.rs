//! Public state projection
//!
//! Snapshots are sent to agents and spectators alike, so they only carry
//! information every party may see. In simultaneous games that means who
//! has moved, never what they played.

use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use super::book::{MatchStatus, Player, RoundRecord};
use super::coin_flip::CoinSide;
use super::PlayerId;

/// Read-only view of a match
#[derive(Debug, Clone, Serialize)]
pub struct PublicState {
    pub match_id: Uuid,
    pub game: String,
    pub round: u32,
    pub max_rounds: u32,
    pub players: Vec<Player>,
    pub history: Vec<RoundRecord>,
    pub status: MatchStatus,
    pub winner_id: Option<PlayerId>,
    /// Players whose move is currently accepted
    pub awaiting: Vec<PlayerId>,
    /// Legal moves for the awaited players
    pub available_moves: Vec<String>,
    pub instructions: String,
    pub detail: GameDetail,
}

impl PublicState {
    pub fn is_awaiting(&self, player_id: &str) -> bool {
        self.awaiting.iter().any(|p| p == player_id)
    }

    pub fn scores(&self) -> BTreeMap<PlayerId, u32> {
        self.players
            .iter()
            .map(|p| (p.id.clone(), p.score))
            .collect()
    }
}

/// Game-specific visible fields
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameDetail {
    RockPaperScissors {
        /// Players who have locked in a move for the pending round
        submitted: Vec<PlayerId>,
    },
    CoinFlip {
        submitted: Vec<PlayerId>,
        last_flip: Option<CoinSide>,
    },
    TicTacToe {
        /// Cells 0-8, row-major
        board: Vec<Option<char>>,
        marks: BTreeMap<PlayerId, char>,
        current_turn: Option<PlayerId>,
        /// Zero-indexed completed line on the board shown, if any
        winning_line: Option<[usize; 3]>,
    },
    Chess {
        fen: String,
        white: PlayerId,
        black: PlayerId,
        turn: Option<PlayerId>,
        is_check: bool,
        is_checkmate: bool,
        is_stalemate: bool,
        is_draw: bool,
        /// How the game ended, once it has
        ending: Option<String>,
        /// SAN move list, oldest first
        moves: Vec<String>,
        legal_moves: Vec<String>,
    },
}
