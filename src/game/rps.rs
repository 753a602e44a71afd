//! Rock-paper-scissors

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::book::MatchBook;
use super::simultaneous::{Showdown, SimultaneousGame, Verdict};
use super::snapshot::GameDetail;
use super::PlayerId;

pub type RockPaperScissors = SimultaneousGame<RpsRules>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Throw {
    Rock,
    Paper,
    Scissors,
}

impl Throw {
    pub const ALL: [Throw; 3] = [Throw::Rock, Throw::Paper, Throw::Scissors];

    /// The throw this one defeats
    pub fn beats(self) -> Throw {
        match self {
            Throw::Rock => Throw::Scissors,
            Throw::Scissors => Throw::Paper,
            Throw::Paper => Throw::Rock,
        }
    }

    /// Greater means `self` wins
    pub fn duel(self, other: Throw) -> Ordering {
        if self == other {
            Ordering::Equal
        } else if self.beats() == other {
            Ordering::Greater
        } else {
            Ordering::Less
        }
    }

    pub fn parse(raw: &str) -> Option<Throw> {
        let word = raw
            .trim()
            .trim_matches(|c: char| !c.is_ascii_alphanumeric())
            .to_ascii_lowercase();
        match word.as_str() {
            "rock" | "r" => Some(Throw::Rock),
            "paper" | "p" => Some(Throw::Paper),
            "scissors" | "scissor" | "s" => Some(Throw::Scissors),
            _ => None,
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Throw::Rock => "crushes",
            Throw::Paper => "covers",
            Throw::Scissors => "cut",
        }
    }
}

impl fmt::Display for Throw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Throw::Rock => "rock",
            Throw::Paper => "paper",
            Throw::Scissors => "scissors",
        };
        f.write_str(s)
    }
}

/// Cyclic dominance of size three
#[derive(Debug, Default)]
pub struct RpsRules;

impl Showdown for RpsRules {
    type Symbol = Throw;

    fn parse(&self, raw: &str) -> Result<Throw, String> {
        Throw::parse(raw).ok_or_else(|| "expected one of rock, paper, scissors".to_string())
    }

    fn symbols(&self) -> Vec<String> {
        Throw::ALL.iter().map(Throw::to_string).collect()
    }

    fn judge(&mut self, [a, b]: [Throw; 2], [name_a, name_b]: [&str; 2]) -> Verdict {
        match a.duel(b) {
            Ordering::Equal => Verdict {
                winner: None,
                explanation: format!("Both threw {a}, round tied"),
            },
            Ordering::Greater => Verdict {
                winner: Some(0),
                explanation: format!("{a} {} {b}, {name_a} wins the round", a.verb()),
            },
            Ordering::Less => Verdict {
                winner: Some(1),
                explanation: format!("{b} {} {a}, {name_b} wins the round", b.verb()),
            },
        }
    }

    fn instructions(&self, book: &MatchBook) -> String {
        format!(
            "Rock-paper-scissors, best of {}: first to {} round wins takes the match. \
             Rock beats scissors, scissors beat paper, paper beats rock. \
             Reply with exactly one of: rock, paper, scissors.",
            book.max_rounds(),
            book.wins_needed()
        )
    }

    fn detail(&self, submitted: Vec<PlayerId>) -> GameDetail {
        GameDetail::RockPaperScissors { submitted }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::book::{MatchStatus, Player};
    use crate::game::{GameRules, MoveRejection};
    use proptest::prelude::*;
    use uuid::Uuid;

    fn new_game() -> RockPaperScissors {
        let book = MatchBook::new(
            Uuid::new_v4(),
            "rps",
            [Player::new("P1", "Alpha"), Player::new("P2", "Beta")],
            9,
        );
        SimultaneousGame::new(book, RpsRules)
    }

    fn throw_strategy() -> impl Strategy<Value = Throw> {
        prop_oneof![Just(Throw::Rock), Just(Throw::Paper), Just(Throw::Scissors)]
    }

    proptest! {
        #[test]
        fn prop_duel_is_antisymmetric(a in throw_strategy(), b in throw_strategy()) {
            prop_assert_eq!(a.duel(b), b.duel(a).reverse());
            prop_assert_eq!(a.duel(b) == Ordering::Equal, a == b);
        }
    }

    #[test]
    fn test_cycle_of_dominance() {
        assert_eq!(Throw::Rock.duel(Throw::Scissors), Ordering::Greater);
        assert_eq!(Throw::Scissors.duel(Throw::Paper), Ordering::Greater);
        assert_eq!(Throw::Paper.duel(Throw::Rock), Ordering::Greater);
        for t in Throw::ALL {
            assert_eq!(t.duel(t), Ordering::Equal);
        }
    }

    #[test]
    fn test_parse_is_lenient_about_case_and_punctuation() {
        assert_eq!(Throw::parse(" Rock. "), Some(Throw::Rock));
        assert_eq!(Throw::parse("SCISSORS"), Some(Throw::Scissors));
        assert_eq!(Throw::parse("p"), Some(Throw::Paper));
        assert_eq!(Throw::parse("lizard"), None);
    }

    #[test]
    fn test_second_submission_is_rejected_and_first_kept() {
        let mut game = new_game();
        let outcome = game.submit_move("P1", "rock").unwrap();
        assert!(!outcome.round_completed);

        assert_eq!(
            game.submit_move("P1", "paper").unwrap_err(),
            MoveRejection::AlreadyMoved
        );

        let outcome = game.submit_move("P2", "scissors").unwrap();
        let record = outcome.resolved.unwrap();
        assert_eq!(record.moves["P1"], "rock");
        assert_eq!(record.winner.as_deref(), Some("P1"));
    }

    #[test]
    fn test_pending_move_is_not_leaked() {
        let mut game = new_game();
        game.submit_move("P1", "paper").unwrap();

        let state = game.public_state();
        assert_eq!(state.awaiting, vec!["P2".to_string()]);
        match &state.detail {
            GameDetail::RockPaperScissors { submitted } => {
                assert_eq!(submitted, &vec!["P1".to_string()])
            }
            other => panic!("unexpected detail {other:?}"),
        }
        assert!(state.history.is_empty());
        let json = serde_json::to_string(&state).unwrap();
        assert!(!json.contains("\"P1\":\"paper\""));
    }

    #[test]
    fn test_unknown_symbol_is_rejected_without_mutation() {
        let mut game = new_game();
        let err = game.submit_move("P1", "dynamite").unwrap_err();
        assert!(err.is_illegal_move());
        assert_eq!(game.awaiting().len(), 2);
        assert_eq!(game.book().round(), 0);
    }

    #[test]
    fn test_full_match_scenario() {
        let mut game = new_game();

        game.submit_move("P1", "rock").unwrap();
        let first = game.submit_move("P2", "scissors").unwrap();
        assert!(first.round_completed);
        assert_eq!(game.book().players()[0].score, 1);
        assert_eq!(game.book().players()[1].score, 0);

        game.submit_move("P1", "paper").unwrap();
        let tie = game.submit_move("P2", "paper").unwrap();
        assert!(tie.round_completed);
        assert_eq!(tie.resolved.unwrap().winner, None);
        assert_eq!(game.book().round(), 2);
        assert_eq!(game.book().players()[0].score, 1);

        // P1 takes the next four rounds; the fourth clinches 5 wins.
        for n in 0..4 {
            game.submit_move("P2", "scissors").unwrap();
            let outcome = game.submit_move("P1", "rock").unwrap();
            assert!(outcome.round_completed);
            assert_eq!(outcome.match_over, n == 3);
        }

        assert_eq!(game.book().status(), MatchStatus::Finished);
        assert_eq!(game.book().winner_id().map(String::as_str), Some("P1"));
        assert_eq!(game.book().players()[0].score, 5);
        assert_eq!(game.public_state().history.len(), 6);
        assert_eq!(game.book().round(), 6);

        assert_eq!(
            game.submit_move("P2", "rock").unwrap_err(),
            MoveRejection::MatchFinished
        );
        assert!(game.awaiting().is_empty());
    }
}
