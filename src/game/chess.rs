//! Chess, a single decisive game per match
//!
//! Legality and board mutation are delegated to shakmaty. Moves arrive in
//! standard algebraic notation; the string `resign` concedes. The match has
//! exactly one round, recorded when the game reaches a terminal position.

use std::collections::{BTreeMap, HashMap};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use shakmaty::fen::{Epd, Fen};
use shakmaty::san::{San, SanError, SanPlus};
use shakmaty::{Chess, Color, EnPassantMode, Move, Position};

use super::book::MatchBook;
use super::snapshot::{GameDetail, PublicState};
use super::{GameRules, MoveOutcome, MoveRejection, PlayerId};

/// Ply cap used when none is configured
pub const DEFAULT_MAX_PLIES: u32 = 200;

const RESIGN: &str = "resign";

/// How a chess game ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ending {
    Checkmate { winner: usize },
    Resignation { winner: usize },
    Stalemate,
    InsufficientMaterial,
    Repetition,
    FiftyMoves,
    PlyLimit,
}

impl Ending {
    pub fn winner(self) -> Option<usize> {
        match self {
            Ending::Checkmate { winner } | Ending::Resignation { winner } => Some(winner),
            _ => None,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Ending::Checkmate { .. } => "checkmate",
            Ending::Resignation { .. } => "resignation",
            Ending::Stalemate => "stalemate",
            Ending::InsufficientMaterial => "insufficient material",
            Ending::Repetition => "threefold repetition",
            Ending::FiftyMoves => "fifty-move rule",
            Ending::PlyLimit => "move limit reached",
        }
    }

    fn is_draw(self) -> bool {
        self.winner().is_none()
    }
}

enum Action {
    Play(Move),
    Resign,
}

pub struct ChessGame {
    book: MatchBook,
    position: Chess,
    /// Seat playing white
    white: usize,
    sans: Vec<String>,
    /// Occurrences of each position, for repetition
    seen: HashMap<String, u8>,
    ending: Option<Ending>,
    max_plies: u32,
}

impl ChessGame {
    /// Colours are assigned once, from the match seed
    pub fn new(book: MatchBook, seed: u64, max_plies: u32) -> Self {
        let white = ChaCha8Rng::seed_from_u64(seed).gen_range(0..2);
        Self::with_white(book, white, max_plies)
    }

    pub fn with_white(book: MatchBook, white: usize, max_plies: u32) -> Self {
        let mut game = Self {
            book,
            position: Chess::default(),
            white: white.min(1),
            sans: Vec::new(),
            seen: HashMap::new(),
            ending: None,
            max_plies: max_plies.max(1),
        };
        let key = game.position_key();
        game.seen.insert(key, 1);
        game
    }

    pub fn white_id(&self) -> &PlayerId {
        self.book.player_id(self.white)
    }

    pub fn black_id(&self) -> &PlayerId {
        self.book.player_id(1 - self.white)
    }

    pub fn fen(&self) -> String {
        Fen::from_position(&self.position, EnPassantMode::Legal).to_string()
    }

    fn seat_of(&self, color: Color) -> usize {
        match color {
            Color::White => self.white,
            Color::Black => 1 - self.white,
        }
    }

    fn position_key(&self) -> String {
        Epd::from_position(&self.position, EnPassantMode::Legal).to_string()
    }

    fn parse_move(&self, raw: &str) -> Result<Move, MoveRejection> {
        // Agents often castle with zeros
        let text = raw.trim().replace('0', "O");
        let san = SanPlus::from_ascii(text.as_bytes())
            .map_err(|_| MoveRejection::invalid(raw, "not standard algebraic notation"))?;
        san.san.to_move(&self.position).map_err(|e| match e {
            SanError::IllegalSan => MoveRejection::invalid(raw, "illegal in the current position"),
            SanError::AmbiguousSan => {
                MoveRejection::invalid(raw, "ambiguous, add the origin file or rank")
            }
        })
    }

    fn check(&self, player_id: &str, raw: &str) -> Result<(usize, Action), MoveRejection> {
        let seat = self.book.seat(player_id)?;
        if raw.trim().eq_ignore_ascii_case(RESIGN) {
            return Ok((seat, Action::Resign));
        }

        let to_move = self.seat_of(self.position.turn());
        if seat != to_move {
            return Err(MoveRejection::NotYourTurn {
                waiting_on: self.book.player_id(to_move).clone(),
            });
        }
        Ok((seat, Action::Play(self.parse_move(raw)?)))
    }

    fn detect_ending(&self) -> Option<Ending> {
        let pos = &self.position;
        if pos.is_checkmate() {
            Some(Ending::Checkmate {
                winner: self.seat_of(!pos.turn()),
            })
        } else if pos.is_stalemate() {
            Some(Ending::Stalemate)
        } else if pos.is_insufficient_material() {
            Some(Ending::InsufficientMaterial)
        } else if self.seen.get(&self.position_key()).copied().unwrap_or(0) >= 3 {
            Some(Ending::Repetition)
        } else if pos.halfmoves() >= 100 {
            Some(Ending::FiftyMoves)
        } else if self.sans.len() as u32 >= self.max_plies {
            Some(Ending::PlyLimit)
        } else {
            None
        }
    }

    fn moves_by_seat(&self) -> BTreeMap<PlayerId, String> {
        let mut split: [Vec<&str>; 2] = [Vec::new(), Vec::new()];
        for (ply, san) in self.sans.iter().enumerate() {
            let color = if ply % 2 == 0 { Color::White } else { Color::Black };
            split[self.seat_of(color)].push(san);
        }
        split
            .iter()
            .enumerate()
            .map(|(seat, sans)| (self.book.player_id(seat).clone(), sans.join(" ")))
            .collect()
    }

    fn conclude(&mut self, ending: Ending) -> MoveOutcome {
        self.ending = Some(ending);
        let explanation = match ending.winner() {
            Some(seat) => format!(
                "{} wins by {}",
                self.book.players()[seat].name,
                ending.describe()
            ),
            None => format!("Drawn by {}", ending.describe()),
        };
        let record = self
            .book
            .record_round(self.moves_by_seat(), ending.winner(), explanation);
        self.book.finish(ending.winner());
        MoveOutcome::resolved(record, true)
    }

    fn legal_sans(&self) -> Vec<String> {
        self.position
            .legal_moves()
            .iter()
            .map(|m| San::from_move(&self.position, *m).to_string())
            .collect()
    }
}

impl GameRules for ChessGame {
    fn book(&self) -> &MatchBook {
        &self.book
    }

    fn validate_move(&self, player_id: &str, raw: &str) -> Result<(), MoveRejection> {
        self.check(player_id, raw).map(|_| ())
    }

    fn submit_move(&mut self, player_id: &str, raw: &str) -> Result<MoveOutcome, MoveRejection> {
        let (seat, action) = self.check(player_id, raw)?;

        let m = match action {
            Action::Resign => {
                return Ok(self.conclude(Ending::Resignation { winner: 1 - seat }));
            }
            Action::Play(m) => m,
        };

        let san = SanPlus::from_move_and_play_unchecked(&mut self.position, m);
        self.sans.push(san.to_string());
        *self.seen.entry(self.position_key()).or_insert(0) += 1;

        match self.detect_ending() {
            Some(ending) => Ok(self.conclude(ending)),
            None => Ok(MoveOutcome::pending()),
        }
    }

    fn awaiting(&self) -> Vec<PlayerId> {
        if self.is_over() {
            return Vec::new();
        }
        vec![self.book.player_id(self.seat_of(self.position.turn())).clone()]
    }

    fn available_moves(&self, player_id: &str) -> Vec<String> {
        if self.is_over() || !self.awaiting().iter().any(|p| p == player_id) {
            return Vec::new();
        }
        self.legal_sans()
    }

    fn instructions(&self) -> String {
        format!(
            "Chess, one game decides the match. {} plays white, {} plays black. \
             Reply with one legal move in standard algebraic notation (e.g. e4, Nf3, \
             O-O, exd5, e8=Q), or 'resign' to concede. The game is drawn after {} plies.",
            self.book.players()[self.white].name,
            self.book.players()[1 - self.white].name,
            self.max_plies
        )
    }

    fn public_state(&self) -> PublicState {
        let awaiting = self.awaiting();
        let legal = if self.is_over() {
            Vec::new()
        } else {
            self.legal_sans()
        };

        let detail = GameDetail::Chess {
            fen: self.fen(),
            white: self.white_id().clone(),
            black: self.black_id().clone(),
            turn: awaiting.first().cloned(),
            is_check: self.position.is_check(),
            is_checkmate: matches!(self.ending, Some(Ending::Checkmate { .. })),
            is_stalemate: self.ending == Some(Ending::Stalemate),
            is_draw: self.ending.is_some_and(Ending::is_draw),
            ending: self.ending.map(|e| e.describe().to_string()),
            moves: self.sans.clone(),
            legal_moves: legal.clone(),
        };
        self.book
            .snapshot(awaiting, legal, self.instructions(), detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::book::{MatchStatus, Player};
    use shakmaty::CastlingMode;
    use uuid::Uuid;

    fn new_game(white: usize, max_plies: u32) -> ChessGame {
        let book = MatchBook::new(
            Uuid::new_v4(),
            "chess",
            [Player::new("p1", "One"), Player::new("p2", "Two")],
            1,
        );
        ChessGame::with_white(book, white, max_plies)
    }

    /// White to move from an arbitrary position, p1 playing white
    fn from_fen(fen: &str) -> ChessGame {
        let mut game = new_game(0, DEFAULT_MAX_PLIES);
        let setup: Fen = fen.parse().unwrap();
        game.position = setup.into_position(CastlingMode::Standard).unwrap();
        game
    }

    fn play(game: &mut ChessGame, sans: &[&str]) -> MoveOutcome {
        let mut last = MoveOutcome::pending();
        for san in sans {
            let mover = game.awaiting()[0].clone();
            last = game.submit_move(&mover, san).unwrap();
        }
        last
    }

    #[test]
    fn test_fools_mate_finishes_with_black_as_winner() {
        let mut game = new_game(0, DEFAULT_MAX_PLIES);
        let outcome = play(&mut game, &["f3", "e5", "g4", "Qh4#"]);

        assert!(outcome.round_completed);
        assert!(outcome.match_over);
        assert_eq!(game.book().status(), MatchStatus::Finished);
        assert_eq!(game.book().winner_id().map(String::as_str), Some("p2"));
        assert_eq!(game.book().round(), 1);

        let state = game.public_state();
        match &state.detail {
            GameDetail::Chess {
                is_checkmate,
                is_check,
                moves,
                ..
            } => {
                assert!(*is_checkmate);
                assert!(*is_check);
                assert_eq!(moves.last().map(String::as_str), Some("Qh4#"));
            }
            other => panic!("unexpected detail {other:?}"),
        }

        assert_eq!(
            game.submit_move("p1", "a3").unwrap_err(),
            MoveRejection::MatchFinished
        );
    }

    #[test]
    fn test_colour_assignment_follows_seat() {
        let mut game = new_game(1, DEFAULT_MAX_PLIES);
        assert_eq!(game.white_id(), "p2");
        assert_eq!(game.awaiting(), vec!["p2".to_string()]);

        let err = game.submit_move("p1", "e4").unwrap_err();
        assert_eq!(
            err,
            MoveRejection::NotYourTurn {
                waiting_on: "p2".to_string()
            }
        );
        assert_eq!(
            game.fen(),
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
        );
    }

    #[test]
    fn test_seeded_assignment_is_stable() {
        let book = || {
            MatchBook::new(
                Uuid::new_v4(),
                "chess",
                [Player::new("p1", "One"), Player::new("p2", "Two")],
                1,
            )
        };
        let a = ChessGame::new(book(), 42, DEFAULT_MAX_PLIES);
        let b = ChessGame::new(book(), 42, DEFAULT_MAX_PLIES);
        assert_eq!(a.white_id(), b.white_id());
    }

    #[test]
    fn test_illegal_and_garbage_moves_are_rejected() {
        let mut game = new_game(0, DEFAULT_MAX_PLIES);
        assert!(game.submit_move("p1", "e5").unwrap_err().is_illegal_move());
        assert!(game.submit_move("p1", "hello").unwrap_err().is_illegal_move());
        assert!(game.sans.is_empty());
        assert!(game.submit_move("p1", "e4").is_ok());
    }

    #[test]
    fn test_resignation_awards_opponent() {
        let mut game = new_game(0, DEFAULT_MAX_PLIES);
        play(&mut game, &["e4"]);
        let outcome = game.submit_move("p1", "resign").unwrap();
        assert!(outcome.match_over);
        assert_eq!(game.book().winner_id().map(String::as_str), Some("p2"));
        assert_eq!(game.ending, Some(Ending::Resignation { winner: 1 }));
    }

    #[test]
    fn test_ply_limit_draws() {
        let mut game = new_game(0, 4);
        let outcome = play(&mut game, &["Nf3", "Nf6", "Ng1", "Ng8"]);
        assert!(outcome.match_over);
        assert_eq!(game.book().winner_id(), None);
        assert_eq!(game.ending, Some(Ending::PlyLimit));
    }

    #[test]
    fn test_threefold_repetition_draws() {
        let mut game = new_game(0, DEFAULT_MAX_PLIES);
        let shuffle = ["Nf3", "Nf6", "Ng1", "Ng8"];
        let outcome = play(&mut game, &shuffle);
        assert!(!outcome.match_over);
        let outcome = play(&mut game, &shuffle);
        assert!(outcome.match_over);
        assert_eq!(game.ending, Some(Ending::Repetition));
    }

    #[test]
    fn test_stalemate_draws() {
        let mut game = new_game(0, DEFAULT_MAX_PLIES);
        let outcome = play(
            &mut game,
            &[
                "e3", "a5", "Qh5", "Ra6", "Qxa5", "h5", "h4", "Rah6", "Qxc7", "f6", "Qxd7+",
                "Kf7", "Qxb7", "Qd3", "Qxb8", "Qh7", "Qxc8", "Kg6", "Qe6",
            ],
        );

        assert!(outcome.match_over);
        assert_eq!(outcome.resolved.unwrap().winner, None);
        assert_eq!(game.ending, Some(Ending::Stalemate));
        assert_eq!(game.book().winner_id(), None);
        match game.public_state().detail {
            GameDetail::Chess {
                is_stalemate,
                is_draw,
                legal_moves,
                ..
            } => {
                assert!(is_stalemate);
                assert!(is_draw);
                assert!(legal_moves.is_empty());
            }
            other => panic!("unexpected detail {other:?}"),
        }
    }

    #[test]
    fn test_bare_kings_draw_on_insufficient_material() {
        let mut game = from_fen("4k3/8/8/8/8/8/4p3/4K3 w - - 0 1");
        let outcome = game.submit_move("p1", "Kxe2").unwrap();
        assert!(outcome.match_over);
        assert_eq!(game.ending, Some(Ending::InsufficientMaterial));
        assert_eq!(game.book().winner_id(), None);
    }

    #[test]
    fn test_fifty_quiet_moves_draw() {
        let mut game = from_fen("4k3/8/8/8/8/8/R7/4K3 w - - 99 80");
        let outcome = game.submit_move("p1", "Ra3").unwrap();
        assert!(outcome.match_over);
        assert_eq!(game.ending, Some(Ending::FiftyMoves));
    }

    #[test]
    fn test_castling_with_zeros_is_accepted() {
        let mut game = new_game(0, DEFAULT_MAX_PLIES);
        play(&mut game, &["e4", "e5", "Nf3", "Nc6", "Bc4", "Bc5", "0-0"]);
        assert_eq!(game.sans.last().map(String::as_str), Some("O-O"));
    }
}
