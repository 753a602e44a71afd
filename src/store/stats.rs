//! Lifetime per-player statistics for this process run

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::game::{Player, PlayerId, RoundRecord};

/// Aggregate results for one player
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerStats {
    pub player_id: PlayerId,
    pub name: String,
    pub model: Option<String>,
    pub round_wins: u32,
    pub round_losses: u32,
    pub round_ties: u32,
    pub matches_played: u32,
    pub matches_won: u32,
    pub matches_drawn: u32,
    /// Prize amounts actually paid out
    pub earnings: u64,
    pub last_seen: DateTime<Utc>,
}

impl PlayerStats {
    fn new(player: &Player) -> Self {
        Self {
            player_id: player.id.clone(),
            name: player.name.clone(),
            model: player.model.clone(),
            round_wins: 0,
            round_losses: 0,
            round_ties: 0,
            matches_played: 0,
            matches_won: 0,
            matches_drawn: 0,
            earnings: 0,
            last_seen: Utc::now(),
        }
    }
}

/// Stats store operations
#[derive(Clone, Default)]
pub struct StatsStore {
    players: Arc<DashMap<PlayerId, PlayerStats>>,
}

impl StatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, player: &Player, f: impl FnOnce(&mut PlayerStats)) {
        let mut entry = self
            .players
            .entry(player.id.clone())
            .or_insert_with(|| PlayerStats::new(player));
        entry.name = player.name.clone();
        entry.last_seen = Utc::now();
        f(&mut entry);
    }

    /// Credit a resolved round to both seats
    pub fn record_round(&self, record: &RoundRecord, players: &[Player]) {
        for player in players {
            self.update(player, |stats| match &record.winner {
                None => stats.round_ties += 1,
                Some(winner) if *winner == player.id => stats.round_wins += 1,
                Some(_) => stats.round_losses += 1,
            });
        }
    }

    pub fn record_match(&self, players: &[Player], winner_id: Option<&str>) {
        for player in players {
            self.update(player, |stats| {
                stats.matches_played += 1;
                match winner_id {
                    None => stats.matches_drawn += 1,
                    Some(winner) if winner == player.id => stats.matches_won += 1,
                    Some(_) => {}
                }
            });
        }
    }

    pub fn record_earnings(&self, player_id: &str, amount: u64) {
        if let Some(mut stats) = self.players.get_mut(player_id) {
            stats.earnings = stats.earnings.saturating_add(amount);
        }
    }

    pub fn get(&self, player_id: &str) -> Option<PlayerStats> {
        self.players.get(player_id).map(|s| s.clone())
    }

    /// Everyone, best record first
    pub fn leaderboard(&self) -> Vec<PlayerStats> {
        let mut all: Vec<PlayerStats> = self.players.iter().map(|s| s.value().clone()).collect();
        all.sort_by(|a, b| {
            b.matches_won
                .cmp(&a.matches_won)
                .then(b.round_wins.cmp(&a.round_wins))
                .then(a.player_id.cmp(&b.player_id))
        });
        all
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn players() -> Vec<Player> {
        vec![Player::new("a", "Alpha"), Player::new("b", "Beta")]
    }

    fn round(winner: Option<&str>) -> RoundRecord {
        RoundRecord {
            round: 1,
            moves: BTreeMap::new(),
            winner: winner.map(str::to_string),
            explanation: String::new(),
        }
    }

    #[test]
    fn test_rounds_and_matches_accumulate() {
        let store = StatsStore::new();
        store.record_round(&round(Some("a")), &players());
        store.record_round(&round(None), &players());
        store.record_round(&round(Some("b")), &players());
        store.record_match(&players(), Some("a"));
        store.record_match(&players(), None);

        let a = store.get("a").unwrap();
        assert_eq!((a.round_wins, a.round_losses, a.round_ties), (1, 1, 1));
        assert_eq!((a.matches_played, a.matches_won, a.matches_drawn), (2, 1, 1));

        let b = store.get("b").unwrap();
        assert_eq!(b.matches_won, 0);
        assert_eq!(b.matches_drawn, 1);
    }

    #[test]
    fn test_leaderboard_orders_by_wins() {
        let store = StatsStore::new();
        store.record_match(&players(), Some("b"));
        store.record_earnings("b", 40);
        store.record_earnings("nobody", 40);

        let board = store.leaderboard();
        assert_eq!(board[0].player_id, "b");
        assert_eq!(board[0].earnings, 40);
        assert_eq!(store.len(), 2);
    }
}
