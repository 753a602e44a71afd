//! Picks uniformly among the legal moves in the public state

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::{Decision, DecisionError, DecisionProvider};
use crate::game::PublicState;

pub struct RandomProvider {
    rng: Mutex<ChaCha8Rng>,
}

impl RandomProvider {
    pub fn new() -> Self {
        Self::seeded(rand::random())
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    /// Any one of `moves`
    pub fn pick(&self, moves: &[String]) -> Option<String> {
        moves.choose(&mut *self.rng.lock()).cloned()
    }
}

impl Default for RandomProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DecisionProvider for RandomProvider {
    async fn decide(&self, state: &PublicState, player_id: &str) -> Result<Decision, DecisionError> {
        if !state.is_awaiting(player_id) {
            return Err(DecisionError::NoLegalMoves);
        }
        self.pick(&state.available_moves)
            .map(Decision::new)
            .ok_or(DecisionError::NoLegalMoves)
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::book::{MatchBook, Player};
    use crate::game::tictactoe::TicTacToe;
    use crate::game::GameRules;
    use uuid::Uuid;

    fn board() -> TicTacToe {
        TicTacToe::new(MatchBook::new(
            Uuid::new_v4(),
            "tictactoe",
            [Player::new("x", "X"), Player::new("o", "O")],
            3,
        ))
    }

    #[tokio::test]
    async fn test_picks_a_legal_move_for_the_awaited_player() {
        let mut game = board();
        game.submit_move("x", "5").unwrap();
        let provider = RandomProvider::seeded(3);

        for _ in 0..20 {
            let decision = provider.decide(&game.public_state(), "o").await.unwrap();
            assert_ne!(decision.mv, "5");
            assert!(game.validate_move("o", &decision.mv).is_ok());
        }
    }

    #[tokio::test]
    async fn test_refuses_when_player_is_not_awaited() {
        let game = board();
        let provider = RandomProvider::seeded(3);
        let err = provider.decide(&game.public_state(), "o").await.unwrap_err();
        assert!(matches!(err, DecisionError::NoLegalMoves));
    }

    #[test]
    fn test_same_seed_same_picks() {
        let moves: Vec<String> = (1..=9).map(|n| n.to_string()).collect();
        let a = RandomProvider::seeded(11);
        let b = RandomProvider::seeded(11);
        for _ in 0..10 {
            assert_eq!(a.pick(&moves), b.pick(&moves));
        }
        assert_eq!(a.pick(&[]), None);
    }
}
