//! Application state shared across routes

use std::sync::Arc;

use tracing::info;

use crate::agents::{DecisionError, DecisionProvider, HttpDecisionProvider, RandomProvider};
use crate::config::Config;
use crate::game::registry::StandardGames;
use crate::game::{GameRegistry, RegistryError};
use crate::matchmaking::{ArenaService, ArenaSettings, Collaborators};
use crate::payments::{
    DryRunSettlement, EntryGate, FacilitatorSettlement, OpenGate, ReceiptGate, RetryPolicy,
    Settlement,
};

/// Startup failures while wiring the arena
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Decision provider: {0}")]
    Decisions(#[from] DecisionError),

    #[error("Settlement client: {0}")]
    Settlement(#[source] reqwest::Error),
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub arena: Arc<ArenaService>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, StartupError> {
        let games = GameRegistry::standard(StandardGames {
            entry_fee: config.entry_fee,
            move_fee: config.move_fee,
            chess_max_plies: config.chess_max_plies,
        })?;

        let gate: Arc<dyn EntryGate> = match &config.entry_gate_secret {
            Some(secret) => Arc::new(ReceiptGate::new(secret.clone())),
            None => {
                info!("No ENTRY_GATE_SECRET, entry is open");
                Arc::new(OpenGate)
            }
        };

        let decisions: Arc<dyn DecisionProvider> = match &config.decision_provider_url {
            Some(url) => Arc::new(HttpDecisionProvider::new(url, config.decision_timeout)?),
            None => {
                info!("No DECISION_PROVIDER_URL, agents play random legal moves");
                Arc::new(RandomProvider::new())
            }
        };

        let settlement: Arc<dyn Settlement> = match &config.settlement_url {
            Some(url) => Arc::new(
                FacilitatorSettlement::new(
                    url,
                    config.settlement_api_key.clone(),
                    config.settlement_timeout,
                )
                .map_err(StartupError::Settlement)?,
            ),
            None => {
                info!("No SETTLEMENT_URL, payouts run in dry-run mode");
                Arc::new(DryRunSettlement)
            }
        };

        let settings = ArenaSettings {
            decision_timeout: config.decision_timeout,
            auto_play: config.auto_play,
            house_fee_bps: config.house_fee_bps,
            payout_retry: RetryPolicy::new(config.payout_max_attempts)
                .with_attempt_timeout(config.settlement_timeout),
            move_rate_per_sec: config.move_rate_per_sec,
        };

        let arena = Arc::new(ArenaService::new(
            games,
            Collaborators {
                gate,
                decisions,
                settlement,
            },
            settings,
        ));

        Ok(Self {
            config: Arc::new(config),
            arena,
        })
    }
}
