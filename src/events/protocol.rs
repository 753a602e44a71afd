//! Arena notification events
//! These are the payloads pushed to every subscriber of the event stream

use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::game::{Player, PlayerId, PublicState, RoundRecord};

/// Outcome of the settlement step for a finished match
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PayoutStatus {
    Paid { reference: String },
    Failed { reason: String },
    /// Nothing to pay (draw, zero prize, no address)
    Skipped { reason: String },
}

/// Events emitted by the arena
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArenaEvent {
    /// A registration was accepted
    PlayerJoined {
        player_id: PlayerId,
        name: String,
        game: String,
        /// Set when this registration completed a pair
        match_id: Option<Uuid>,
    },

    MatchStarted {
        match_id: Uuid,
        game: String,
        players: Vec<Player>,
        state: PublicState,
    },

    /// The arbiter is waiting on this player's move
    MoveRequested {
        match_id: Uuid,
        player_id: PlayerId,
        round: u32,
    },

    /// An accepted move in a turn-based game
    MoveMade {
        match_id: Uuid,
        player_id: PlayerId,
        #[serde(rename = "move")]
        mv: String,
        commentary: Option<String>,
        state: PublicState,
    },

    RoundResult {
        match_id: Uuid,
        result: RoundRecord,
        scores: BTreeMap<PlayerId, u32>,
        commentary: BTreeMap<PlayerId, String>,
        state: PublicState,
    },

    MatchOver {
        match_id: Uuid,
        game: String,
        /// None for a draw
        winner_id: Option<PlayerId>,
        final_scores: BTreeMap<PlayerId, u32>,
        rounds_played: usize,
        state: PublicState,
    },

    Payout {
        match_id: Uuid,
        winner_id: Option<PlayerId>,
        recipient: Option<String>,
        amount: u64,
        #[serde(flatten)]
        status: PayoutStatus,
    },
}

impl ArenaEvent {
    /// Event name used on the wire (SSE `event:` field)
    pub fn name(&self) -> &'static str {
        match self {
            ArenaEvent::PlayerJoined { .. } => "player-joined",
            ArenaEvent::MatchStarted { .. } => "match-started",
            ArenaEvent::MoveRequested { .. } => "move-requested",
            ArenaEvent::MoveMade { .. } => "move-made",
            ArenaEvent::RoundResult { .. } => "round-result",
            ArenaEvent::MatchOver { .. } => "match-over",
            ArenaEvent::Payout { .. } => "payout",
        }
    }

    pub fn match_id(&self) -> Option<Uuid> {
        match self {
            ArenaEvent::PlayerJoined { match_id, .. } => *match_id,
            ArenaEvent::MatchStarted { match_id, .. }
            | ArenaEvent::MoveRequested { match_id, .. }
            | ArenaEvent::MoveMade { match_id, .. }
            | ArenaEvent::RoundResult { match_id, .. }
            | ArenaEvent::MatchOver { match_id, .. }
            | ArenaEvent::Payout { match_id, .. } => Some(*match_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payout_event_flattens_status() {
        let event = ArenaEvent::Payout {
            match_id: Uuid::nil(),
            winner_id: Some("p1".to_string()),
            recipient: Some("addr".to_string()),
            amount: 20,
            status: PayoutStatus::Paid {
                reference: "tx-1".to_string(),
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "payout");
        assert_eq!(json["status"], "paid");
        assert_eq!(json["reference"], "tx-1");
        assert_eq!(event.name(), "payout");
    }

    #[test]
    fn test_player_joined_without_match() {
        let event = ArenaEvent::PlayerJoined {
            player_id: "p1".to_string(),
            name: "One".to_string(),
            game: "rps".to_string(),
            match_id: None,
        };
        assert_eq!(event.name(), "player-joined");
        assert_eq!(event.match_id(), None);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "player_joined");
    }
}
