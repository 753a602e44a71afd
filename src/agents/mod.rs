//! Decision providers: who picks a move when the arbiter asks for one

pub mod http;
pub mod random;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::game::PublicState;

pub use http::HttpDecisionProvider;
pub use random::RandomProvider;

/// A move chosen by an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    #[serde(rename = "move")]
    pub mv: String,
    #[serde(default)]
    pub commentary: Option<String>,
}

impl Decision {
    pub fn new(mv: impl Into<String>) -> Self {
        Self {
            mv: mv.into(),
            commentary: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Agent API error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("Agent returned an empty move")]
    EmptyMove,

    #[error("No legal moves available")]
    NoLegalMoves,
}

/// Picks a move for one player given the public match state
#[async_trait]
pub trait DecisionProvider: Send + Sync {
    async fn decide(&self, state: &PublicState, player_id: &str) -> Result<Decision, DecisionError>;

    /// Label used in logs
    fn name(&self) -> &'static str;
}
