//! Simultaneous-choice games
//!
//! Both players lock in a symbol for the pending round; the round resolves
//! atomically once both slots are filled. The symbol comparison itself is
//! delegated to a [`Showdown`] implementation.

use std::collections::BTreeMap;
use std::fmt;

use super::book::MatchBook;
use super::snapshot::{GameDetail, PublicState};
use super::{GameRules, MoveOutcome, MoveRejection, PlayerId};

/// Outcome of comparing one pair of symbols
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Seat index of the round winner, None on a tie
    pub winner: Option<usize>,
    pub explanation: String,
}

/// Rules for one simultaneous-choice game
pub trait Showdown: Send + 'static {
    type Symbol: Copy + Eq + fmt::Display + Send;

    fn parse(&self, raw: &str) -> Result<Self::Symbol, String>;

    /// Every symbol a player may submit
    fn symbols(&self) -> Vec<String>;

    /// Compare the two seats' symbols, in seat order
    fn judge(&mut self, moves: [Self::Symbol; 2], names: [&str; 2]) -> Verdict;

    fn instructions(&self, book: &MatchBook) -> String;

    fn detail(&self, submitted: Vec<PlayerId>) -> GameDetail;
}

/// Moves collected for the round in progress, one slot per seat
#[derive(Debug, Clone)]
pub struct PendingRound<T> {
    slots: [Option<T>; 2],
}

impl<T> PendingRound<T> {
    pub fn new() -> Self {
        Self { slots: [None, None] }
    }

    pub fn has_moved(&self, seat: usize) -> bool {
        self.slots[seat].is_some()
    }

    pub fn submit(&mut self, seat: usize, symbol: T) -> Result<(), MoveRejection> {
        if self.has_moved(seat) {
            return Err(MoveRejection::AlreadyMoved);
        }
        self.slots[seat] = Some(symbol);
        Ok(())
    }

    /// Seats that have already locked in a move
    pub fn submitted(&self) -> Vec<usize> {
        (0..2).filter(|&seat| self.has_moved(seat)).collect()
    }

    /// Take both moves and clear the round, if it is complete
    pub fn take_complete(&mut self) -> Option<[T; 2]> {
        if !(self.has_moved(0) && self.has_moved(1)) {
            return None;
        }
        match (self.slots[0].take(), self.slots[1].take()) {
            (Some(a), Some(b)) => Some([a, b]),
            _ => None,
        }
    }
}

impl<T> Default for PendingRound<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A best-of-N match of simultaneous rounds
pub struct SimultaneousGame<S: Showdown> {
    book: MatchBook,
    pending: PendingRound<S::Symbol>,
    rules: S,
}

impl<S: Showdown> SimultaneousGame<S> {
    pub fn new(book: MatchBook, rules: S) -> Self {
        Self {
            book,
            pending: PendingRound::new(),
            rules,
        }
    }

    fn check(&self, player_id: &str, raw: &str) -> Result<(usize, S::Symbol), MoveRejection> {
        let seat = self.book.seat(player_id)?;
        if self.pending.has_moved(seat) {
            return Err(MoveRejection::AlreadyMoved);
        }
        let symbol = self
            .rules
            .parse(raw)
            .map_err(|reason| MoveRejection::invalid(raw, reason))?;
        Ok((seat, symbol))
    }

    fn submitted_ids(&self) -> Vec<PlayerId> {
        self.pending
            .submitted()
            .into_iter()
            .map(|seat| self.book.player_id(seat).clone())
            .collect()
    }
}

impl<S: Showdown> GameRules for SimultaneousGame<S> {
    fn book(&self) -> &MatchBook {
        &self.book
    }

    fn validate_move(&self, player_id: &str, raw: &str) -> Result<(), MoveRejection> {
        self.check(player_id, raw).map(|_| ())
    }

    fn submit_move(&mut self, player_id: &str, raw: &str) -> Result<MoveOutcome, MoveRejection> {
        let (seat, symbol) = self.check(player_id, raw)?;
        self.pending.submit(seat, symbol)?;

        let Some(moves) = self.pending.take_complete() else {
            return Ok(MoveOutcome::pending());
        };

        let names = [
            self.book.players()[0].name.as_str(),
            self.book.players()[1].name.as_str(),
        ];
        let verdict = self.rules.judge(moves, names);
        let played: BTreeMap<PlayerId, String> = moves
            .iter()
            .enumerate()
            .map(|(seat, symbol)| (self.book.player_id(seat).clone(), symbol.to_string()))
            .collect();

        let record = self
            .book
            .record_round(played, verdict.winner, verdict.explanation);
        let match_over = self.book.settle_best_of();

        Ok(MoveOutcome::resolved(record, match_over))
    }

    fn awaiting(&self) -> Vec<PlayerId> {
        if self.is_over() {
            return Vec::new();
        }
        (0..2)
            .filter(|&seat| !self.pending.has_moved(seat))
            .map(|seat| self.book.player_id(seat).clone())
            .collect()
    }

    fn available_moves(&self, player_id: &str) -> Vec<String> {
        if self.awaiting().iter().any(|p| p == player_id) {
            self.rules.symbols()
        } else {
            Vec::new()
        }
    }

    fn instructions(&self) -> String {
        self.rules.instructions(&self.book)
    }

    fn public_state(&self) -> PublicState {
        let awaiting = self.awaiting();
        let available = if awaiting.is_empty() {
            Vec::new()
        } else {
            self.rules.symbols()
        };
        self.book.snapshot(
            awaiting,
            available,
            self.instructions(),
            self.rules.detail(self.submitted_ids()),
        )
    }
}
