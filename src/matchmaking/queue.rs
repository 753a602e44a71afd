//! Lobby: registrants waiting for an opponent, one queue per game type

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use crate::game::PlayerId;

/// Player waiting in the lobby
#[derive(Debug, Clone)]
pub struct Registrant {
    pub player_id: PlayerId,
    pub name: String,
    pub model: Option<String>,
    /// Where a prize for this player is sent
    pub payout_address: Option<String>,
    pub queued_at: Instant,
}

impl Registrant {
    pub fn new(player_id: impl Into<PlayerId>, name: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            name: name.into(),
            model: None,
            payout_address: None,
            queued_at: Instant::now(),
        }
    }

    /// How long this player has been waiting
    pub fn wait_time(&self) -> Duration {
        self.queued_at.elapsed()
    }
}

/// The lobby
#[derive(Debug, Default)]
pub struct Lobby {
    queues: HashMap<String, VecDeque<Registrant>>,
}

impl Lobby {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a registrant. Returns a pair, oldest first, when this completes one.
    pub fn enqueue(&mut self, game: &str, registrant: Registrant) -> Option<[Registrant; 2]> {
        let queue = self.queues.entry(game.to_string()).or_default();
        queue.retain(|r| r.player_id != registrant.player_id);

        match queue.pop_front() {
            Some(waiting) => Some([waiting, registrant]),
            None => {
                queue.push_back(registrant);
                None
            }
        }
    }

    /// Check if a player is waiting
    pub fn contains(&self, player_id: &str) -> bool {
        self.queues
            .values()
            .any(|q| q.iter().any(|r| r.player_id == player_id))
    }

    /// Players waiting for the given game
    pub fn waiting_for(&self, game: &str) -> usize {
        self.queues.get(game).map_or(0, VecDeque::len)
    }

    /// Get total waiting players
    pub fn total_waiting(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_registrant_forms_a_pair() {
        let mut lobby = Lobby::new();
        assert!(lobby.enqueue("rps", Registrant::new("a", "A")).is_none());
        assert!(lobby.contains("a"));
        assert_eq!(lobby.waiting_for("rps"), 1);

        let pair = lobby.enqueue("rps", Registrant::new("b", "B")).unwrap();
        assert_eq!(pair[0].player_id, "a");
        assert_eq!(pair[1].player_id, "b");
        assert_eq!(lobby.total_waiting(), 0);
    }

    #[test]
    fn test_games_do_not_mix() {
        let mut lobby = Lobby::new();
        lobby.enqueue("rps", Registrant::new("a", "A"));
        assert!(lobby.enqueue("chess", Registrant::new("b", "B")).is_none());
        assert_eq!(lobby.total_waiting(), 2);
    }

    #[test]
    fn test_requeue_does_not_pair_player_with_itself() {
        let mut lobby = Lobby::new();
        lobby.enqueue("chess", Registrant::new("a", "A"));
        assert!(lobby.enqueue("chess", Registrant::new("a", "A")).is_none());
        assert_eq!(lobby.waiting_for("chess"), 1);
    }
}
