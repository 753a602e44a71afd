//! Tic-tac-toe, played as a best-of-N series of boards
//!
//! Seat 0 plays X and always opens a board; seat 1 plays O. Positions are
//! numbered 1-9, row-major. A completed line or a full board resolves a
//! sub-round, after which the board and turn order reset.

use std::collections::BTreeMap;

use super::book::MatchBook;
use super::snapshot::{GameDetail, PublicState};
use super::{GameRules, MoveOutcome, MoveRejection, PlayerId};

/// Rows, columns, diagonals (zero-indexed cells)
pub const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    pub fn for_seat(seat: usize) -> Mark {
        if seat == 0 {
            Mark::X
        } else {
            Mark::O
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Mark::X => 'X',
            Mark::O => 'O',
        }
    }
}

pub type Board = [Option<Mark>; 9];

/// First line holding three equal marks
pub fn winning_line(board: &Board) -> Option<(Mark, [usize; 3])> {
    LINES.iter().find_map(|line| {
        let [a, b, c] = *line;
        match board[a] {
            Some(mark) if board[b] == Some(mark) && board[c] == Some(mark) => Some((mark, *line)),
            _ => None,
        }
    })
}

fn parse_position(raw: &str) -> Result<u8, MoveRejection> {
    let trimmed = raw.trim().trim_end_matches('.');
    match trimmed.parse::<u8>() {
        Ok(pos @ 1..=9) => Ok(pos),
        _ => Err(MoveRejection::invalid(raw, "expected a position from 1 to 9")),
    }
}

pub struct TicTacToe {
    book: MatchBook,
    board: Board,
    /// Seat whose move is accepted next
    cursor: usize,
    winning_line: Option<[usize; 3]>,
    /// Positions played on the current board, per seat
    placed: [Vec<u8>; 2],
}

impl TicTacToe {
    pub fn new(book: MatchBook) -> Self {
        Self {
            book,
            board: [None; 9],
            cursor: 0,
            winning_line: None,
            placed: [Vec::new(), Vec::new()],
        }
    }

    fn check(&self, player_id: &str, raw: &str) -> Result<(usize, u8), MoveRejection> {
        let seat = self.book.seat(player_id)?;
        if seat != self.cursor {
            return Err(MoveRejection::NotYourTurn {
                waiting_on: self.book.player_id(self.cursor).clone(),
            });
        }
        let pos = parse_position(raw)?;
        if self.board[pos as usize - 1].is_some() {
            return Err(MoveRejection::CellOccupied(pos));
        }
        Ok((seat, pos))
    }

    fn placed_moves(&self) -> BTreeMap<PlayerId, String> {
        self.placed
            .iter()
            .enumerate()
            .map(|(seat, cells)| {
                let list: Vec<String> = cells.iter().map(u8::to_string).collect();
                (self.book.player_id(seat).clone(), list.join(","))
            })
            .collect()
    }

    fn reset_board(&mut self) {
        self.board = [None; 9];
        self.cursor = 0;
        self.winning_line = None;
        self.placed = [Vec::new(), Vec::new()];
    }

    fn close_sub_round(&mut self, winner: Option<usize>, explanation: String) -> MoveOutcome {
        let record = self
            .book
            .record_round(self.placed_moves(), winner, explanation);
        let match_over = self.book.settle_best_of();
        if !match_over {
            self.reset_board();
        }
        MoveOutcome::resolved(record, match_over)
    }
}

impl GameRules for TicTacToe {
    fn book(&self) -> &MatchBook {
        &self.book
    }

    fn validate_move(&self, player_id: &str, raw: &str) -> Result<(), MoveRejection> {
        self.check(player_id, raw).map(|_| ())
    }

    fn submit_move(&mut self, player_id: &str, raw: &str) -> Result<MoveOutcome, MoveRejection> {
        let (seat, pos) = self.check(player_id, raw)?;

        let mark = Mark::for_seat(seat);
        self.board[pos as usize - 1] = Some(mark);
        self.placed[seat].push(pos);

        if let Some((_, line)) = winning_line(&self.board) {
            self.winning_line = Some(line);
            let cells: Vec<String> = line.iter().map(|c| (c + 1).to_string()).collect();
            let explanation = format!(
                "{} completes {}-in-a-row on {}",
                self.book.players()[seat].name,
                mark.as_char(),
                cells.join("-")
            );
            return Ok(self.close_sub_round(Some(seat), explanation));
        }

        if self.board.iter().all(Option::is_some) {
            return Ok(self.close_sub_round(None, "Board full, sub-round drawn".to_string()));
        }

        self.cursor = 1 - seat;
        Ok(MoveOutcome::pending())
    }

    fn awaiting(&self) -> Vec<PlayerId> {
        if self.is_over() {
            return Vec::new();
        }
        vec![self.book.player_id(self.cursor).clone()]
    }

    fn available_moves(&self, player_id: &str) -> Vec<String> {
        if self.is_over() || self.book.player_index(player_id) != Some(self.cursor) {
            return Vec::new();
        }
        self.board
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_none())
            .map(|(idx, _)| (idx + 1).to_string())
            .collect()
    }

    fn instructions(&self) -> String {
        format!(
            "Tic-tac-toe, best of {} boards: first to {} boards wins. {} plays X and \
             opens every board, {} plays O. Positions are 1-9, left to right, top to \
             bottom. Reply with the number of an empty position.",
            self.book.max_rounds(),
            self.book.wins_needed(),
            self.book.players()[0].name,
            self.book.players()[1].name
        )
    }

    fn public_state(&self) -> PublicState {
        let awaiting = self.awaiting();
        let available = awaiting
            .first()
            .map(|p| self.available_moves(p))
            .unwrap_or_default();
        let marks = (0..2)
            .map(|seat| (self.book.player_id(seat).clone(), Mark::for_seat(seat).as_char()))
            .collect();

        let detail = GameDetail::TicTacToe {
            board: self.board.iter().map(|c| c.map(Mark::as_char)).collect(),
            marks,
            current_turn: awaiting.first().cloned(),
            winning_line: self.winning_line,
        };
        self.book
            .snapshot(awaiting, available, self.instructions(), detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::book::{MatchStatus, Player};
    use proptest::prelude::*;
    use uuid::Uuid;

    fn new_game(max_rounds: u32) -> TicTacToe {
        TicTacToe::new(MatchBook::new(
            Uuid::new_v4(),
            "tictactoe",
            [Player::new("x", "Ex"), Player::new("o", "Oh")],
            max_rounds,
        ))
    }

    fn play(game: &mut TicTacToe, moves: &[u8]) -> MoveOutcome {
        let mut last = MoveOutcome::pending();
        for (i, pos) in moves.iter().enumerate() {
            let player = if i % 2 == 0 { "x" } else { "o" };
            last = game.submit_move(player, &pos.to_string()).unwrap();
        }
        last
    }

    proptest! {
        #[test]
        fn prop_each_line_alone_wins(idx in 0usize..8, use_o in any::<bool>()) {
            let mark = if use_o { Mark::O } else { Mark::X };
            let mut board: Board = [None; 9];
            for cell in LINES[idx] {
                board[cell] = Some(mark);
            }
            prop_assert_eq!(winning_line(&board), Some((mark, LINES[idx])));
        }

        #[test]
        fn prop_mixed_line_never_wins(idx in 0usize..8, odd in 0usize..3) {
            let mut board: Board = [None; 9];
            for (i, cell) in LINES[idx].iter().enumerate() {
                board[*cell] = Some(if i == odd { Mark::O } else { Mark::X });
            }
            prop_assert_eq!(winning_line(&board), None);
        }
    }

    #[test]
    fn test_left_column_scenario() {
        let mut game = new_game(3);
        let outcome = play(&mut game, &[1, 2, 4, 5, 7]);

        assert!(outcome.round_completed);
        assert!(!outcome.match_over);
        assert_eq!(outcome.resolved.unwrap().winner.as_deref(), Some("x"));
        assert_eq!(game.book().players()[0].score, 1);

        // Fresh board, X opens again
        assert!(game.board.iter().all(Option::is_none));
        assert_eq!(game.winning_line, None);
        assert_eq!(game.awaiting(), vec!["x".to_string()]);
    }

    #[test]
    fn test_next_board_does_not_show_previous_line() {
        let mut game = new_game(3);
        play(&mut game, &[1, 2, 4, 5, 7]);
        game.submit_move("x", "9").unwrap();

        match game.public_state().detail {
            GameDetail::TicTacToe {
                board,
                winning_line,
                ..
            } => {
                assert_eq!(board.iter().filter(|c| c.is_none()).count(), 8);
                assert_eq!(winning_line, None);
            }
            other => panic!("unexpected detail {other:?}"),
        }
    }

    #[test]
    fn test_final_board_keeps_its_line() {
        let mut game = new_game(3);
        play(&mut game, &[1, 2, 4, 5, 7]);
        let outcome = play(&mut game, &[1, 2, 4, 5, 7]);
        assert!(outcome.match_over);

        match game.public_state().detail {
            GameDetail::TicTacToe { winning_line, .. } => {
                assert_eq!(winning_line, Some([0, 3, 6]));
            }
            other => panic!("unexpected detail {other:?}"),
        }
    }

    #[test]
    fn test_out_of_turn_move_leaves_state_untouched() {
        let mut game = new_game(3);
        let err = game.submit_move("o", "5").unwrap_err();
        assert_eq!(
            err,
            MoveRejection::NotYourTurn {
                waiting_on: "x".to_string()
            }
        );
        assert!(game.board.iter().all(Option::is_none));
        assert_eq!(game.awaiting(), vec!["x".to_string()]);
    }

    #[test]
    fn test_occupied_and_out_of_range_positions() {
        let mut game = new_game(3);
        game.submit_move("x", "5").unwrap();
        assert_eq!(
            game.submit_move("o", "5").unwrap_err(),
            MoveRejection::CellOccupied(5)
        );
        assert!(game.submit_move("o", "10").unwrap_err().is_illegal_move());
        assert!(game.submit_move("o", "zero").unwrap_err().is_illegal_move());
        assert_eq!(game.awaiting(), vec!["o".to_string()]);
    }

    #[test]
    fn test_full_board_is_a_tie() {
        let mut game = new_game(3);
        // X O X / X O O / O X X
        let outcome = play(&mut game, &[1, 2, 3, 5, 4, 6, 8, 7, 9]);
        assert!(outcome.round_completed);
        assert_eq!(outcome.resolved.unwrap().winner, None);
        assert_eq!(game.book().round(), 1);
        assert_eq!(game.book().players()[0].score, 0);
        assert_eq!(game.book().players()[1].score, 0);
    }

    #[test]
    fn test_two_boards_clinch_best_of_three() {
        let mut game = new_game(3);
        play(&mut game, &[1, 2, 4, 5, 7]);
        let outcome = play(&mut game, &[3, 1, 5, 2, 7]);
        assert!(outcome.match_over);
        assert_eq!(game.book().status(), MatchStatus::Finished);
        assert_eq!(game.book().winner_id().map(String::as_str), Some("x"));
        assert_eq!(game.winning_line, Some([2, 4, 6]));
        assert!(game.submit_move("o", "9").is_err());
    }

    #[test]
    fn test_available_moves_only_for_current_player() {
        let mut game = new_game(3);
        game.submit_move("x", "1").unwrap();
        assert!(game.available_moves("x").is_empty());
        assert_eq!(game.available_moves("o").len(), 8);
        assert!(!game.available_moves("o").contains(&"1".to_string()));
    }
}
