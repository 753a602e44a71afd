//! Active matches and the registry that owns them

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use super::book::{MatchStatus, Player};
use super::snapshot::PublicState;
use super::{GameRules, MoveOutcome, MoveRejection, PlayerId};

/// An outstanding request for one player's move
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    pub player_id: PlayerId,
    /// Identifies this request; answers carrying an older ticket are refused
    pub ticket: u64,
}

/// A move on its way into a match
#[derive(Debug, Clone)]
pub struct PlayerMove {
    pub player_id: PlayerId,
    pub raw: String,
    pub commentary: Option<String>,
    /// Set when the move answers a request issued by the arbiter
    pub ticket: Option<u64>,
}

impl PlayerMove {
    pub fn new(player_id: impl Into<PlayerId>, raw: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            raw: raw.into(),
            commentary: None,
            ticket: None,
        }
    }

    pub fn with_commentary(mut self, commentary: Option<String>) -> Self {
        self.commentary = commentary;
        self
    }

    pub fn answering(mut self, ticket: u64) -> Self {
        self.ticket = Some(ticket);
        self
    }
}

/// Result of an accepted move, captured inside the match lock
#[derive(Debug, Clone)]
pub struct AppliedMove {
    pub player_id: PlayerId,
    /// Move as submitted, trimmed
    pub raw: String,
    pub outcome: MoveOutcome,
    /// State right after the move
    pub state: PublicState,
    /// Requests issued as a consequence of this move
    pub to_request: Vec<MoveRequest>,
    /// Commentary released by this move (the whole round for simultaneous games)
    pub commentary: BTreeMap<PlayerId, String>,
}

/// Everything guarded by the match lock
struct MatchSlot {
    rules: Box<dyn GameRules>,
    /// Outstanding request ticket per player
    requested: HashMap<PlayerId, u64>,
    next_ticket: u64,
    /// Commentary held back until the round resolves
    commentary: BTreeMap<PlayerId, String>,
}

impl MatchSlot {
    /// Awaited players with no outstanding request get a fresh ticket
    fn claim_requests(&mut self) -> Vec<MoveRequest> {
        if self.rules.is_over() {
            return Vec::new();
        }
        let mut issued = Vec::new();
        for player_id in self.rules.awaiting() {
            if self.requested.contains_key(&player_id) {
                continue;
            }
            self.next_ticket += 1;
            self.requested.insert(player_id.clone(), self.next_ticket);
            issued.push(MoveRequest {
                player_id,
                ticket: self.next_ticket,
            });
        }
        issued
    }
}

/// One running match. Every move goes through a single short critical section.
pub struct ActiveMatch {
    pub id: Uuid,
    pub game: String,
    pub turn_based: bool,
    /// Amount paid to the winner
    pub prize: u64,
    pub created_at: DateTime<Utc>,
    payout_addresses: HashMap<PlayerId, String>,
    inner: Mutex<MatchSlot>,
    settling: AtomicBool,
}

impl ActiveMatch {
    pub fn new(
        rules: Box<dyn GameRules>,
        turn_based: bool,
        prize: u64,
        payout_addresses: HashMap<PlayerId, String>,
    ) -> Self {
        Self {
            id: rules.book().match_id(),
            game: rules.book().game().to_string(),
            turn_based,
            prize,
            created_at: Utc::now(),
            payout_addresses,
            inner: Mutex::new(MatchSlot {
                rules,
                requested: HashMap::new(),
                next_ticket: 0,
                commentary: BTreeMap::new(),
            }),
            settling: AtomicBool::new(false),
        }
    }

    pub fn public_state(&self) -> PublicState {
        self.inner.lock().rules.public_state()
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.inner
            .lock()
            .rules
            .book()
            .players()
            .iter()
            .map(|p| p.id.clone())
            .collect()
    }

    pub fn is_over(&self) -> bool {
        self.inner.lock().rules.is_over()
    }

    pub fn available_moves(&self, player_id: &str) -> Vec<String> {
        self.inner.lock().rules.available_moves(player_id)
    }

    pub fn validate(&self, player_id: &str, raw: &str) -> Result<(), MoveRejection> {
        self.inner.lock().rules.validate_move(player_id, raw)
    }

    /// Issue requests for awaited players that have none outstanding
    pub fn claim_requests(&self) -> Vec<MoveRequest> {
        self.inner.lock().claim_requests()
    }

    /// Drop a request that will never be answered so it can be issued again
    pub fn release_request(&self, request: &MoveRequest) {
        let mut slot = self.inner.lock();
        if slot.requested.get(&request.player_id) == Some(&request.ticket) {
            slot.requested.remove(&request.player_id);
        }
    }

    /// Apply a move. Application, round resolution, next-request bookkeeping
    /// and `announce` all run under the match lock, so announcements for one
    /// match are observed in move order. `announce` must not call back into
    /// this match.
    pub fn submit<F>(&self, mv: PlayerMove, announce: F) -> Result<AppliedMove, MoveRejection>
    where
        F: FnOnce(&AppliedMove),
    {
        let mut slot = self.inner.lock();

        if let Some(ticket) = mv.ticket {
            if slot.requested.get(&mv.player_id) != Some(&ticket) {
                return Err(MoveRejection::RequestExpired);
            }
        }

        let raw = mv.raw.trim().to_string();
        let outcome = slot.rules.submit_move(&mv.player_id, &raw)?;

        slot.requested.remove(&mv.player_id);
        if let Some(text) = mv.commentary.filter(|c| !c.trim().is_empty()) {
            slot.commentary.insert(mv.player_id.clone(), text);
        }

        let commentary = if self.turn_based || outcome.round_completed {
            std::mem::take(&mut slot.commentary)
        } else {
            BTreeMap::new()
        };
        let to_request = slot.claim_requests();

        let applied = AppliedMove {
            player_id: mv.player_id,
            raw,
            outcome,
            state: slot.rules.public_state(),
            to_request,
            commentary,
        };
        announce(&applied);
        Ok(applied)
    }

    /// Check-and-set the settlement flag. Only the first caller gets true.
    pub fn begin_settlement(&self) -> bool {
        self.settling
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn payout_address(&self, player_id: &str) -> Option<&str> {
        self.payout_addresses.get(player_id).map(String::as_str)
    }

    pub fn summary(&self) -> MatchSummary {
        let slot = self.inner.lock();
        let book = slot.rules.book();
        MatchSummary {
            match_id: self.id,
            game: self.game.clone(),
            players: book.players().to_vec(),
            round: book.round(),
            max_rounds: book.max_rounds(),
            status: book.status(),
            winner_id: book.winner_id().cloned(),
            created_at: self.created_at,
        }
    }
}

/// Listing entry for an active match
#[derive(Debug, Clone, Serialize)]
pub struct MatchSummary {
    pub match_id: Uuid,
    pub game: String,
    pub players: Vec<Player>,
    pub round: u32,
    pub max_rounds: u32,
    pub status: MatchStatus,
    pub winner_id: Option<PlayerId>,
    pub created_at: DateTime<Utc>,
}

/// Registry of all active matches
pub struct MatchRegistry {
    matches: DashMap<Uuid, Arc<ActiveMatch>>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self {
            matches: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<ActiveMatch>> {
        self.matches.get(id).map(|m| m.value().clone())
    }

    pub fn insert(&self, handle: Arc<ActiveMatch>) {
        self.matches.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<Arc<ActiveMatch>> {
        self.matches.remove(id).map(|(_, h)| h)
    }

    pub fn active_matches(&self) -> usize {
        self.matches.len()
    }

    pub fn total_players(&self) -> usize {
        self.matches.len() * 2
    }

    pub fn summaries(&self) -> Vec<MatchSummary> {
        // Collect handles first so no shard lock is held while a match lock is taken
        let handles: Vec<Arc<ActiveMatch>> =
            self.matches.iter().map(|m| m.value().clone()).collect();
        let mut summaries: Vec<MatchSummary> = handles.iter().map(|h| h.summary()).collect();
        summaries.sort_by_key(|s| s.created_at);
        summaries
    }
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}
