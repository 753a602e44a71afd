//! Remote agent reached over HTTP

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{Decision, DecisionError, DecisionProvider};
use crate::game::PublicState;

#[derive(Serialize)]
struct DecideRequest<'a> {
    player_id: &'a str,
    state: &'a PublicState,
}

/// POSTs the public state to `{base_url}/decide`
#[derive(Clone)]
pub struct HttpDecisionProvider {
    client: Client,
    base_url: String,
}

impl HttpDecisionProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DecisionError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/decide", self.base_url)
    }
}

#[async_trait]
impl DecisionProvider for HttpDecisionProvider {
    async fn decide(&self, state: &PublicState, player_id: &str) -> Result<Decision, DecisionError> {
        let response = self
            .client
            .post(self.endpoint())
            .json(&DecideRequest { player_id, state })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DecisionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let decision: Decision = response.json().await?;
        if decision.mv.trim().is_empty() {
            return Err(DecisionError::EmptyMove);
        }
        Ok(decision)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let provider =
            HttpDecisionProvider::new("http://agent.local:9000/", Duration::from_secs(1)).unwrap();
        assert_eq!(provider.endpoint(), "http://agent.local:9000/decide");
    }

    #[test]
    fn test_decision_wire_shape() {
        let decision: Decision =
            serde_json::from_str(r#"{"move":"e4","commentary":"King's pawn"}"#).unwrap();
        assert_eq!(decision.mv, "e4");
        assert_eq!(decision.commentary.as_deref(), Some("King's pawn"));

        let bare: Decision = serde_json::from_str(r#"{"move":"rock"}"#).unwrap();
        assert_eq!(bare.commentary, None);
    }
}
