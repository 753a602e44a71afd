//! Arena service - registration, match lifecycle, move routing and settlement

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::agents::DecisionProvider;
use crate::events::{ArenaEvent, EventBus, PayoutStatus};
use crate::game::{
    ActiveMatch, AppliedMove, GameConfig, GameRegistry, MatchRegistry, MatchSummary,
    MoveOutcome, MoveRejection, MoveRequest, Player, PlayerId, PlayerMove, PublicState,
    RegistryError,
};
use crate::payments::{
    payout_with_retry, prize_for, EntryGate, GateError, PlayerClaim, RetryPolicy, Settlement,
};
use crate::store::StatsStore;
use crate::util::rate_limit::PlayerRateLimiter;

use super::queue::{Lobby, Registrant};

/// Tunables for the arena
#[derive(Debug, Clone)]
pub struct ArenaSettings {
    /// How long a decision provider gets before a random legal move is played
    pub decision_timeout: Duration,
    /// Ask the decision provider for moves; otherwise agents submit their own
    pub auto_play: bool,
    /// House cut of the pot in basis points
    pub house_fee_bps: u32,
    pub payout_retry: RetryPolicy,
    pub move_rate_per_sec: u32,
}

impl Default for ArenaSettings {
    fn default() -> Self {
        Self {
            decision_timeout: Duration::from_secs(20),
            auto_play: true,
            house_fee_bps: 0,
            payout_retry: RetryPolicy::default(),
            move_rate_per_sec: 5,
        }
    }
}

/// External collaborators the arena talks to
#[derive(Clone)]
pub struct Collaborators {
    pub gate: Arc<dyn EntryGate>,
    pub decisions: Arc<dyn DecisionProvider>,
    pub settlement: Arc<dyn Settlement>,
}

/// Registration request
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub player_id: PlayerId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub model: Option<String>,
    pub game: String,
    /// Overrides the payer from the payment receipt
    #[serde(default)]
    pub payout_address: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegistrationStatus {
    /// In the lobby until an opponent registers for the same game
    Waiting { game: String, waiting: usize },
    Matched { match_id: Uuid, state: PublicState },
}

/// Registration failures
#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Entry denied: {0}")]
    EntryDenied(#[from] GateError),

    #[error("Player {0} is already waiting or playing")]
    AlreadyRegistered(PlayerId),

    #[error("Invalid registration: {0}")]
    InvalidRegistration(String),
}

/// Move submitted by an agent
#[derive(Debug, Clone, Deserialize)]
pub struct MoveSubmission {
    pub match_id: Uuid,
    pub player_id: PlayerId,
    #[serde(rename = "move")]
    pub mv: String,
    #[serde(default)]
    pub commentary: Option<String>,
}

/// Answer to a move submission. Rejections are answers, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveReceipt {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_over: Option<bool>,
}

impl MoveReceipt {
    pub fn accepted(outcome: &MoveOutcome) -> Self {
        Self {
            accepted: true,
            reason: None,
            round_completed: Some(outcome.round_completed),
            match_over: Some(outcome.match_over),
        }
    }

    pub fn rejected(reason: impl ToString) -> Self {
        Self {
            accepted: false,
            reason: Some(reason.to_string()),
            round_completed: None,
            match_over: None,
        }
    }
}

/// The arena
pub struct ArenaService {
    games: GameRegistry,
    matches: Arc<MatchRegistry>,
    lobby: Mutex<Lobby>,
    /// Map of player -> current match
    player_matches: DashMap<PlayerId, Uuid>,
    /// Players between the busy check and their lobby seat
    admitting: DashSet<PlayerId>,
    stats: StatsStore,
    events: EventBus,
    collaborators: Collaborators,
    move_limiter: PlayerRateLimiter,
    settings: ArenaSettings,
}

impl ArenaService {
    pub fn new(games: GameRegistry, collaborators: Collaborators, settings: ArenaSettings) -> Self {
        Self {
            games,
            matches: Arc::new(MatchRegistry::new()),
            lobby: Mutex::new(Lobby::new()),
            player_matches: DashMap::new(),
            admitting: DashSet::new(),
            stats: StatsStore::new(),
            events: EventBus::default(),
            collaborators,
            move_limiter: PlayerRateLimiter::new(settings.move_rate_per_sec),
            settings,
        }
    }

    pub fn games(&self) -> &GameRegistry {
        &self.games
    }

    pub fn matches(&self) -> &Arc<MatchRegistry> {
        &self.matches
    }

    pub fn stats(&self) -> &StatsStore {
        &self.stats
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Get current lobby size
    pub fn waiting_players(&self) -> usize {
        self.lobby.lock().total_waiting()
    }

    /// Get player's current match ID
    #[cfg(test)]
    pub fn player_match(&self, player_id: &str) -> Option<Uuid> {
        self.player_matches.get(player_id).map(|r| *r)
    }

    pub fn match_state(&self, match_id: &Uuid) -> Option<PublicState> {
        self.matches.get(match_id).map(|h| h.public_state())
    }

    /// Drop rate-limit state for idle players
    pub fn prune_rate_limits(&self) {
        self.move_limiter.prune();
    }

    pub fn match_summaries(&self) -> Vec<MatchSummary> {
        self.matches.summaries()
    }

    fn is_busy(&self, player_id: &str) -> bool {
        self.player_matches.contains_key(player_id) || self.lobby.lock().contains(player_id)
    }

    /// Reserve the player for one registration attempt, before any payment is taken
    fn admit(&self, player_id: &str) -> Result<Admission<'_>, ArenaError> {
        if !self.admitting.insert(player_id.to_string()) {
            return Err(ArenaError::AlreadyRegistered(player_id.to_string()));
        }
        let admission = Admission {
            pending: &self.admitting,
            player_id: player_id.to_string(),
        };
        if self.is_busy(player_id) {
            return Err(ArenaError::AlreadyRegistered(player_id.to_string()));
        }
        Ok(admission)
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Admit a player through the entry gate and seat them in the lobby.
    /// The second registrant for a game starts a match.
    pub async fn register(
        self: &Arc<Self>,
        registration: Registration,
        proof: Option<String>,
    ) -> Result<RegistrationStatus, ArenaError> {
        let player_id = registration.player_id.trim().to_string();
        if player_id.is_empty() {
            return Err(ArenaError::InvalidRegistration(
                "player_id must be non-empty".to_string(),
            ));
        }
        let name = match registration.name.trim() {
            "" => player_id.clone(),
            name => name.to_string(),
        };

        let config = self
            .games
            .config(&registration.game)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownGame(registration.game.clone()))?;

        let _admission = self.admit(&player_id)?;

        let mut payer = None;
        if config.entry_fee > 0 {
            let claim = PlayerClaim {
                player_id: player_id.clone(),
                purpose: config.id.clone(),
                amount_due: config.entry_fee,
                proof,
            };
            let grant = self
                .collaborators
                .gate
                .check_entry(&claim)
                .await
                .map_err(|err| {
                    debug!(player_id = %player_id, game = %config.id, error = %err, "Entry denied");
                    err
                })?;
            debug!(
                player_id = %player_id,
                game = %config.id,
                paid = grant.amount_paid,
                "Entry fee accepted"
            );
            payer = grant.payer;
        }

        let mut registrant = Registrant::new(player_id.clone(), name.clone());
        registrant.model = registration.model;
        registrant.payout_address = registration.payout_address.or(payer);

        let match_id = Uuid::new_v4();
        let (pair, waiting) = {
            let mut lobby = self.lobby.lock();
            if self.player_matches.contains_key(&player_id) || lobby.contains(&player_id) {
                return Err(ArenaError::AlreadyRegistered(player_id));
            }
            let pair = lobby.enqueue(&config.id, registrant);
            if let Some(pair) = &pair {
                for r in pair {
                    self.player_matches.insert(r.player_id.clone(), match_id);
                }
            }
            (pair, lobby.waiting_for(&config.id))
        };

        info!(
            player_id = %player_id,
            game = %config.id,
            paired = pair.is_some(),
            "Player registered"
        );
        self.events.publish(ArenaEvent::PlayerJoined {
            player_id,
            name,
            game: config.id.clone(),
            match_id: pair.as_ref().map(|_| match_id),
        });

        let Some(pair) = pair else {
            return Ok(RegistrationStatus::Waiting {
                game: config.id,
                waiting,
            });
        };

        let seated: Vec<PlayerId> = pair.iter().map(|r| r.player_id.clone()).collect();
        match self.start_match(match_id, &config, pair) {
            Ok(state) => Ok(RegistrationStatus::Matched { match_id, state }),
            Err(err) => {
                error!(match_id = %match_id, game = %config.id, error = %err, "Cannot start match");
                for player_id in seated {
                    self.player_matches.remove(&player_id);
                }
                Err(err.into())
            }
        }
    }

    /// Instantiate the game and ask for the opening move(s)
    fn start_match(
        self: &Arc<Self>,
        match_id: Uuid,
        config: &GameConfig,
        pair: [Registrant; 2],
    ) -> Result<PublicState, RegistryError> {
        let waited_ms = pair[0].wait_time().as_millis() as u64;
        let payout_addresses: HashMap<PlayerId, String> = pair
            .iter()
            .filter_map(|r| Some((r.player_id.clone(), r.payout_address.clone()?)))
            .collect();
        let players = pair.map(|r| Player::new(r.player_id, r.name).with_model(r.model));

        let seed = rand::random::<u64>();
        let rules = self.games.create_game(&config.id, match_id, players, seed)?;
        let prize = prize_for(config.entry_fee, self.settings.house_fee_bps);
        let handle = Arc::new(ActiveMatch::new(
            rules,
            config.turn_based,
            prize,
            payout_addresses,
        ));

        let state = handle.public_state();
        info!(
            match_id = %match_id,
            game = %config.id,
            seed,
            prize,
            waited_ms,
            "Created new match"
        );
        self.events.publish(ArenaEvent::MatchStarted {
            match_id,
            game: config.id.clone(),
            players: state.players.clone(),
            state: state.clone(),
        });

        let requests = handle.claim_requests();
        self.announce_requests(match_id, &requests, state.round);
        self.matches.insert(handle.clone());
        self.dispatch(&handle, requests);

        Ok(state)
    }

    // ========================================================================
    // Moves
    // ========================================================================

    /// Move submitted by an agent. Always answers; never errors.
    pub async fn submit_move(
        self: &Arc<Self>,
        submission: MoveSubmission,
        proof: Option<String>,
    ) -> MoveReceipt {
        let MoveSubmission {
            match_id,
            player_id,
            mv,
            commentary,
        } = submission;

        if !self.move_limiter.check(&player_id) {
            debug!(player_id = %player_id, "Move rate limited");
            return MoveReceipt::rejected("too many moves, slow down");
        }

        let Some(handle) = self.matches.get(&match_id) else {
            debug!(match_id = %match_id, player_id = %player_id, "Move for unknown match");
            return MoveReceipt::rejected("match not found");
        };

        // Only charge for moves that would be accepted
        if let Err(rejection) = handle.validate(&player_id, &mv) {
            debug!(match_id = %match_id, player_id = %player_id, reason = %rejection, "Move rejected");
            return MoveReceipt::rejected(rejection);
        }

        let move_fee = self.games.config(&handle.game).map_or(0, |c| c.move_fee);
        if move_fee > 0 {
            let claim = PlayerClaim {
                player_id: player_id.clone(),
                purpose: format!("move in {}", handle.game),
                amount_due: move_fee,
                proof,
            };
            if let Err(err) = self.collaborators.gate.check_entry(&claim).await {
                debug!(match_id = %match_id, player_id = %player_id, error = %err, "Move fee unpaid");
                return MoveReceipt::rejected(format!("move fee unpaid: {err}"));
            }
        }

        let mv = PlayerMove::new(player_id.clone(), mv).with_commentary(commentary);
        match self.apply_move(&handle, mv) {
            Ok(outcome) => MoveReceipt::accepted(&outcome),
            Err(rejection) => {
                debug!(match_id = %match_id, player_id = %player_id, reason = %rejection, "Move rejected");
                MoveReceipt::rejected(rejection)
            }
        }
    }

    /// Single path for every move, agent-submitted or provider-chosen
    fn apply_move(
        self: &Arc<Self>,
        handle: &Arc<ActiveMatch>,
        mv: PlayerMove,
    ) -> Result<MoveOutcome, MoveRejection> {
        let match_id = handle.id;
        let turn_based = handle.turn_based;
        let game = handle.game.clone();

        let applied = handle.submit(mv, |applied| {
            self.announce_move(match_id, &game, turn_based, applied)
        })?;

        if applied.outcome.match_over {
            let service = Arc::clone(self);
            let handle = Arc::clone(handle);
            tokio::spawn(async move {
                service.settle(handle).await;
            });
        } else {
            self.dispatch(handle, applied.to_request);
        }
        Ok(applied.outcome)
    }

    /// Runs under the match lock; must not touch the match itself
    fn announce_move(&self, match_id: Uuid, game: &str, turn_based: bool, applied: &AppliedMove) {
        let state = &applied.state;

        if turn_based {
            self.events.publish(ArenaEvent::MoveMade {
                match_id,
                player_id: applied.player_id.clone(),
                mv: applied.raw.clone(),
                commentary: applied.commentary.get(&applied.player_id).cloned(),
                state: state.clone(),
            });
        }

        if let Some(record) = &applied.outcome.resolved {
            self.stats.record_round(record, &state.players);
            info!(
                match_id = %match_id,
                round = record.round,
                winner = ?record.winner,
                "Round resolved"
            );
            self.events.publish(ArenaEvent::RoundResult {
                match_id,
                result: record.clone(),
                scores: state.scores(),
                commentary: applied.commentary.clone(),
                state: state.clone(),
            });
        }

        if applied.outcome.match_over {
            self.stats
                .record_match(&state.players, state.winner_id.as_deref());
            info!(
                match_id = %match_id,
                game = %game,
                winner = ?state.winner_id,
                rounds = state.history.len(),
                "Match over"
            );
            self.events.publish(ArenaEvent::MatchOver {
                match_id,
                game: game.to_string(),
                winner_id: state.winner_id.clone(),
                final_scores: state.scores(),
                rounds_played: state.history.len(),
                state: state.clone(),
            });
        } else {
            self.announce_requests(match_id, &applied.to_request, state.round);
        }
    }

    fn announce_requests(&self, match_id: Uuid, requests: &[MoveRequest], round: u32) {
        for request in requests {
            self.events.publish(ArenaEvent::MoveRequested {
                match_id,
                player_id: request.player_id.clone(),
                round,
            });
        }
    }

    // ========================================================================
    // Decisions
    // ========================================================================

    /// Hand requests to the decision provider, one task each
    fn dispatch(self: &Arc<Self>, handle: &Arc<ActiveMatch>, requests: Vec<MoveRequest>) {
        if !self.settings.auto_play {
            return;
        }
        for request in requests {
            let service = Arc::clone(self);
            let handle = Arc::clone(handle);
            tokio::spawn(async move {
                service.run_decision(handle, request).await;
            });
        }
    }

    async fn run_decision(self: Arc<Self>, handle: Arc<ActiveMatch>, request: MoveRequest) {
        let state = handle.public_state();
        if !state.is_awaiting(&request.player_id) {
            handle.release_request(&request);
            return;
        }

        let provider = self.collaborators.decisions.name();
        let decided = tokio::time::timeout(
            self.settings.decision_timeout,
            self.collaborators
                .decisions
                .decide(&state, &request.player_id),
        )
        .await;

        match decided {
            Ok(Ok(decision)) => {
                let mv = PlayerMove::new(request.player_id.clone(), decision.mv)
                    .with_commentary(decision.commentary)
                    .answering(request.ticket);
                match self.apply_move(&handle, mv) {
                    Ok(_) => return,
                    Err(rejection) if rejection.is_illegal_move() => {
                        warn!(
                            match_id = %handle.id,
                            player_id = %request.player_id,
                            provider,
                            reason = %rejection,
                            "Provider move rejected, playing a random legal move"
                        );
                    }
                    Err(rejection) => {
                        debug!(
                            match_id = %handle.id,
                            player_id = %request.player_id,
                            reason = %rejection,
                            "Decision no longer needed"
                        );
                        return;
                    }
                }
            }
            Ok(Err(err)) => {
                warn!(
                    match_id = %handle.id,
                    player_id = %request.player_id,
                    provider,
                    error = %err,
                    "Decision provider failed, playing a random legal move"
                );
            }
            Err(_) => {
                warn!(
                    match_id = %handle.id,
                    player_id = %request.player_id,
                    provider,
                    timeout_ms = self.settings.decision_timeout.as_millis() as u64,
                    "Decision provider timed out, playing a random legal move"
                );
            }
        }

        self.play_fallback(&handle, request);
    }

    fn play_fallback(self: &Arc<Self>, handle: &Arc<ActiveMatch>, request: MoveRequest) {
        let moves = handle.available_moves(&request.player_id);
        let Some(choice) = moves.choose(&mut rand::thread_rng()).cloned() else {
            debug!(match_id = %handle.id, player_id = %request.player_id, "No legal move to fall back on");
            handle.release_request(&request);
            return;
        };

        let mv = PlayerMove::new(request.player_id.clone(), choice).answering(request.ticket);
        if let Err(rejection) = self.apply_move(handle, mv) {
            debug!(
                match_id = %handle.id,
                player_id = %request.player_id,
                reason = %rejection,
                "Fallback move not applied"
            );
            handle.release_request(&request);
        }
    }

    // ========================================================================
    // Settlement
    // ========================================================================

    /// Settle a finished match by id. Returns false if it was already settled.
    #[cfg(test)]
    pub async fn settle_match(&self, match_id: Uuid) -> bool {
        match self.matches.get(&match_id) {
            Some(handle) => self.settle(handle).await,
            None => false,
        }
    }

    /// Pay the winner once, then evict the match. Returns false when the
    /// match is still running or another caller got here first.
    pub async fn settle(&self, handle: Arc<ActiveMatch>) -> bool {
        if !handle.is_over() || !handle.begin_settlement() {
            return false;
        }

        let state = handle.public_state();
        let winner_id = state.winner_id.clone();
        let recipient = winner_id
            .as_deref()
            .and_then(|w| handle.payout_address(w))
            .map(str::to_string);

        let status = match (&winner_id, &recipient) {
            (None, _) => PayoutStatus::Skipped {
                reason: "match drawn".to_string(),
            },
            (Some(_), _) if handle.prize == 0 => PayoutStatus::Skipped {
                reason: "no prize".to_string(),
            },
            (Some(winner), None) => {
                warn!(match_id = %handle.id, winner_id = %winner, "Winner has no payout address");
                PayoutStatus::Skipped {
                    reason: "winner has no payout address".to_string(),
                }
            }
            (Some(winner), Some(address)) => {
                match payout_with_retry(
                    self.collaborators.settlement.as_ref(),
                    address,
                    handle.prize,
                    self.settings.payout_retry,
                )
                .await
                {
                    Ok(reference) => {
                        info!(
                            match_id = %handle.id,
                            winner_id = %winner,
                            amount = handle.prize,
                            reference = %reference,
                            "Prize paid"
                        );
                        self.stats.record_earnings(winner, handle.prize);
                        PayoutStatus::Paid { reference }
                    }
                    Err(err) => {
                        error!(
                            match_id = %handle.id,
                            winner_id = %winner,
                            amount = handle.prize,
                            error = %err,
                            "Prize not paid, needs manual settlement"
                        );
                        PayoutStatus::Failed {
                            reason: err.to_string(),
                        }
                    }
                }
            }
        };

        self.evict(&handle);
        self.events.publish(ArenaEvent::Payout {
            match_id: handle.id,
            winner_id,
            recipient,
            amount: handle.prize,
            status,
        });
        true
    }

    /// Drop the match and free its players for new registrations
    fn evict(&self, handle: &ActiveMatch) {
        self.matches.remove(&handle.id);
        for player_id in handle.player_ids() {
            self.player_matches.remove_if(&player_id, |_, m| *m == handle.id);
        }
        info!(match_id = %handle.id, "Match removed from registry");
    }
}

/// Releases the registration reservation when dropped
struct Admission<'a> {
    pending: &'a DashSet<PlayerId>,
    player_id: PlayerId,
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.player_id);
    }
}
