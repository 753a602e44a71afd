//! Match bookkeeping shared by every game type

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::snapshot::{GameDetail, PublicState};
use super::{MoveRejection, PlayerId};

/// Match status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Active,
    Finished,
}

/// Player seated in a match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Model or agent label, if the agent reported one
    pub model: Option<String>,
    /// Rounds won in this match
    pub score: u32,
}

impl Player {
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            model: None,
            score: 0,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

/// One resolved round, appended to the match history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    /// 1-based round number
    pub round: u32,
    pub moves: BTreeMap<PlayerId, String>,
    /// None on a tie
    pub winner: Option<PlayerId>,
    pub explanation: String,
}

/// Scores, round counter, status and history for one match.
///
/// Player order is fixed at construction and is meaningful to the games
/// (first mover, colour assignment).
#[derive(Debug, Clone)]
pub struct MatchBook {
    match_id: Uuid,
    game: String,
    players: [Player; 2],
    round: u32,
    max_rounds: u32,
    status: MatchStatus,
    winner: Option<PlayerId>,
    history: Vec<RoundRecord>,
}

impl MatchBook {
    pub fn new(match_id: Uuid, game: impl Into<String>, players: [Player; 2], max_rounds: u32) -> Self {
        let players = players.map(|mut p| {
            p.score = 0;
            p
        });

        Self {
            match_id,
            game: game.into(),
            players,
            round: 0,
            max_rounds: max_rounds.max(1),
            status: MatchStatus::Active,
            winner: None,
            history: Vec::new(),
        }
    }

    pub fn match_id(&self) -> Uuid {
        self.match_id
    }

    pub fn game(&self) -> &str {
        &self.game
    }

    pub fn players(&self) -> &[Player; 2] {
        &self.players
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    pub fn status(&self) -> MatchStatus {
        self.status
    }

    pub fn winner_id(&self) -> Option<&PlayerId> {
        self.winner.as_ref()
    }

    pub fn player_index(&self, id: &str) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }

    pub fn player_id(&self, index: usize) -> &PlayerId {
        &self.players[index].id
    }

    /// Reject when finished, otherwise resolve the player's seat index
    pub fn seat(&self, player_id: &str) -> Result<usize, MoveRejection> {
        if self.status == MatchStatus::Finished {
            return Err(MoveRejection::MatchFinished);
        }
        self.player_index(player_id)
            .ok_or_else(|| MoveRejection::UnknownPlayer(player_id.to_string()))
    }

    /// Wins that clinch a best-of-`max_rounds` match
    pub fn wins_needed(&self) -> u32 {
        (self.max_rounds + 1) / 2
    }

    /// Append a round, bump the counter and credit the winner
    pub fn record_round(
        &mut self,
        moves: BTreeMap<PlayerId, String>,
        winner: Option<usize>,
        explanation: impl Into<String>,
    ) -> RoundRecord {
        debug_assert!(self.round < self.max_rounds);

        self.round += 1;
        if let Some(idx) = winner {
            self.players[idx].score += 1;
        }

        let record = RoundRecord {
            round: self.round,
            moves,
            winner: winner.map(|idx| self.players[idx].id.clone()),
            explanation: explanation.into(),
        };
        self.history.push(record.clone());
        record
    }

    /// Best-of-N completion: first to a majority wins; at the round cap the
    /// higher score wins and equal scores draw. Returns true once finished.
    pub fn settle_best_of(&mut self) -> bool {
        let needed = self.wins_needed();
        if let Some(idx) = self.players.iter().position(|p| p.score >= needed) {
            self.finish(Some(idx));
        } else if self.round >= self.max_rounds {
            self.finish(self.leader());
        }
        self.status == MatchStatus::Finished
    }

    /// Seat with the strictly higher score
    pub fn leader(&self) -> Option<usize> {
        let [a, b] = &self.players;
        match a.score.cmp(&b.score) {
            std::cmp::Ordering::Greater => Some(0),
            std::cmp::Ordering::Less => Some(1),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Enter the terminal state. No-op if already finished.
    pub fn finish(&mut self, winner: Option<usize>) {
        if self.status == MatchStatus::Finished {
            return;
        }
        self.status = MatchStatus::Finished;
        self.winner = winner.map(|idx| self.players[idx].id.clone());
    }

    pub fn snapshot(
        &self,
        awaiting: Vec<PlayerId>,
        available_moves: Vec<String>,
        instructions: String,
        detail: GameDetail,
    ) -> PublicState {
        PublicState {
            match_id: self.match_id,
            game: self.game.clone(),
            round: self.round,
            max_rounds: self.max_rounds,
            players: self.players.to_vec(),
            history: self.history.clone(),
            status: self.status,
            winner_id: self.winner.clone(),
            awaiting,
            available_moves,
            instructions,
            detail,
        }
    }
}
