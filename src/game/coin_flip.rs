//! Coin flip guessing game
//!
//! Each player guesses a side, then the arbiter flips. A round is won by
//! the only player who guessed right; both or neither right is a tie.

use std::fmt;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::book::MatchBook;
use super::simultaneous::{Showdown, SimultaneousGame, Verdict};
use super::snapshot::GameDetail;
use super::PlayerId;

pub type CoinFlip = SimultaneousGame<CoinFlipRules>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoinSide {
    Heads,
    Tails,
}

impl CoinSide {
    pub fn parse(raw: &str) -> Option<CoinSide> {
        let word = raw
            .trim()
            .trim_matches(|c: char| !c.is_ascii_alphanumeric())
            .to_ascii_lowercase();
        match word.as_str() {
            "heads" | "head" | "h" => Some(CoinSide::Heads),
            "tails" | "tail" | "t" => Some(CoinSide::Tails),
            _ => None,
        }
    }
}

impl fmt::Display for CoinSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoinSide::Heads => f.write_str("heads"),
            CoinSide::Tails => f.write_str("tails"),
        }
    }
}

/// Pseudo-random flips from a per-match seed
pub struct CoinFlipRules {
    rng: ChaCha8Rng,
    last_flip: Option<CoinSide>,
}

impl CoinFlipRules {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            last_flip: None,
        }
    }

    fn flip(&mut self) -> CoinSide {
        if self.rng.gen_bool(0.5) {
            CoinSide::Heads
        } else {
            CoinSide::Tails
        }
    }
}

impl Showdown for CoinFlipRules {
    type Symbol = CoinSide;

    fn parse(&self, raw: &str) -> Result<CoinSide, String> {
        CoinSide::parse(raw).ok_or_else(|| "expected heads or tails".to_string())
    }

    fn symbols(&self) -> Vec<String> {
        vec![CoinSide::Heads.to_string(), CoinSide::Tails.to_string()]
    }

    fn judge(&mut self, guesses: [CoinSide; 2], names: [&str; 2]) -> Verdict {
        let flip = self.flip();
        self.last_flip = Some(flip);

        let correct = guesses.map(|guess| guess == flip);
        match correct {
            [true, false] => Verdict {
                winner: Some(0),
                explanation: format!("Coin landed {flip}, only {} called it", names[0]),
            },
            [false, true] => Verdict {
                winner: Some(1),
                explanation: format!("Coin landed {flip}, only {} called it", names[1]),
            },
            [true, true] => Verdict {
                winner: None,
                explanation: format!("Coin landed {flip}, both called it, round tied"),
            },
            [false, false] => Verdict {
                winner: None,
                explanation: format!("Coin landed {flip}, nobody called it, round tied"),
            },
        }
    }

    fn instructions(&self, book: &MatchBook) -> String {
        format!(
            "Coin flip, best of {}: guess the side before the flip. A round goes to \
             the only player who guessed right; first to {} round wins takes the match. \
             Reply with exactly one of: heads, tails.",
            book.max_rounds(),
            book.wins_needed()
        )
    }

    fn detail(&self, submitted: Vec<PlayerId>) -> GameDetail {
        GameDetail::CoinFlip {
            submitted,
            last_flip: self.last_flip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::book::Player;
    use crate::game::GameRules;
    use uuid::Uuid;

    fn new_game(seed: u64) -> CoinFlip {
        let book = MatchBook::new(
            Uuid::new_v4(),
            "coinflip",
            [Player::new("a", "A"), Player::new("b", "B")],
            5,
        );
        SimultaneousGame::new(book, CoinFlipRules::new(seed))
    }

    #[test]
    fn test_opposite_guesses_always_produce_a_winner() {
        for seed in 0..20 {
            let mut game = new_game(seed);
            game.submit_move("a", "heads").unwrap();
            let outcome = game.submit_move("b", "tails").unwrap();
            let record = outcome.resolved.unwrap();
            let GameDetail::CoinFlip { last_flip, .. } = game.public_state().detail else {
                panic!("expected coin flip detail");
            };
            let flip = last_flip.unwrap();

            let expected = if flip == CoinSide::Heads { "a" } else { "b" };
            assert_eq!(record.winner.as_deref(), Some(expected));
        }
    }

    #[test]
    fn test_matching_guesses_always_tie() {
        let mut game = new_game(7);
        game.submit_move("a", "tails").unwrap();
        let outcome = game.submit_move("b", "T").unwrap();
        assert_eq!(outcome.resolved.unwrap().winner, None);
        assert_eq!(game.book().players()[0].score, 0);
        assert_eq!(game.book().players()[1].score, 0);
    }

    #[test]
    fn test_same_seed_flips_the_same_way() {
        let mut a = CoinFlipRules::new(99);
        let mut b = CoinFlipRules::new(99);
        for _ in 0..10 {
            assert_eq!(a.flip(), b.flip());
        }
    }

    #[test]
    fn test_rejects_non_coin_guess() {
        let game = new_game(1);
        assert!(game.validate_move("a", "edge").is_err());
        assert!(game.validate_move("a", "Heads!").is_ok());
    }
}
