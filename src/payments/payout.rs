//! Prize settlement: the payout call, its retry policy and prize arithmetic

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettlementError {
    /// Network trouble or rate limiting; worth another attempt
    #[error("transient settlement failure: {0}")]
    Transient(String),

    /// Invalid recipient, insufficient funds and the like
    #[error("settlement rejected: {0}")]
    Permanent(String),
}

impl SettlementError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SettlementError::Transient(_))
    }
}

/// Transfers a prize; returns the transaction reference
#[async_trait]
pub trait Settlement: Send + Sync {
    async fn payout(&self, recipient: &str, amount: u64) -> Result<String, SettlementError>;
}

/// Logs the payout and returns a synthetic reference
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunSettlement;

#[async_trait]
impl Settlement for DryRunSettlement {
    async fn payout(&self, recipient: &str, amount: u64) -> Result<String, SettlementError> {
        let reference = format!("dry-{}", Uuid::new_v4());
        info!(recipient = %recipient, amount, reference = %reference, "Dry-run payout");
        Ok(reference)
    }
}

#[derive(Serialize)]
struct PayoutRequest<'a> {
    recipient: &'a str,
    amount: u64,
}

#[derive(Deserialize)]
struct PayoutResponse {
    #[serde(alias = "tx_hash", alias = "transaction")]
    reference: String,
}

/// Payout facilitator reached over HTTP
#[derive(Clone)]
pub struct FacilitatorSettlement {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl FacilitatorSettlement {
    /// `timeout` bounds each request, connect through body
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

/// 429 and 5xx are retried; any other failure status is final
pub fn classify_status(status: StatusCode, body: String) -> SettlementError {
    let detail = format!("{} - {}", status.as_u16(), body);
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        SettlementError::Transient(detail)
    } else {
        SettlementError::Permanent(detail)
    }
}

#[async_trait]
impl Settlement for FacilitatorSettlement {
    async fn payout(&self, recipient: &str, amount: u64) -> Result<String, SettlementError> {
        let mut request = self
            .client
            .post(format!("{}/payout", self.base_url))
            .json(&PayoutRequest { recipient, amount });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SettlementError::Transient(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let body: PayoutResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                SettlementError::Transient(e.to_string())
            } else {
                SettlementError::Permanent(format!("unreadable receipt: {e}"))
            }
        })?;
        Ok(body.reference)
    }
}

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// A single attempt that runs longer counts as a transient failure
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Delay after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

/// Pay out, retrying transient failures until the budget runs out
pub async fn payout_with_retry(
    settlement: &dyn Settlement,
    recipient: &str,
    amount: u64,
    policy: RetryPolicy,
) -> Result<String, SettlementError> {
    let mut attempt = 1;
    loop {
        let result =
            match tokio::time::timeout(policy.attempt_timeout, settlement.payout(recipient, amount))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(SettlementError::Transient(format!(
                    "no answer within {} ms",
                    policy.attempt_timeout.as_millis()
                ))),
            };

        match result {
            Ok(reference) => return Ok(reference),
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    recipient = %recipient,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Payout failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Winner's share of a two-player pot after the house cut
pub fn prize_for(entry_fee: u64, house_fee_bps: u32) -> u64 {
    let pot = entry_fee.saturating_mul(2);
    let cut = (pot as u128 * house_fee_bps.min(10_000) as u128 / 10_000) as u64;
    pot - cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails transiently a fixed number of times, then succeeds
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
        permanent: bool,
    }

    #[async_trait]
    impl Settlement for Flaky {
        async fn payout(&self, _recipient: &str, _amount: u64) -> Result<String, SettlementError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.permanent {
                return Err(SettlementError::Permanent("invalid recipient".to_string()));
            }
            if call <= self.failures {
                Err(SettlementError::Transient("rate limited".to_string()))
            } else {
                Ok(format!("tx-{call}"))
            }
        }
    }

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            attempt_timeout: Duration::from_millis(50),
        }
    }

    /// Accepts the call and never answers
    struct Silent {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Settlement for Silent {
        async fn payout(&self, _recipient: &str, _amount: u64) -> Result<String, SettlementError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let flaky = Flaky {
            failures: 2,
            calls: AtomicU32::new(0),
            permanent: false,
        };
        let reference = payout_with_retry(&flaky, "addr", 10, fast(4)).await.unwrap();
        assert_eq!(reference, "tx-3");
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_budget_is_bounded() {
        let flaky = Flaky {
            failures: 10,
            calls: AtomicU32::new(0),
            permanent: false,
        };
        let err = payout_with_retry(&flaky, "addr", 10, fast(3)).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let flaky = Flaky {
            failures: 0,
            calls: AtomicU32::new(0),
            permanent: true,
        };
        let err = payout_with_retry(&flaky, "addr", 10, fast(4)).await.unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unanswered_payout_times_out_and_exhausts_budget() {
        let silent = Silent {
            calls: AtomicU32::new(0),
        };
        let err = payout_with_retry(&silent, "addr", 10, fast(3)).await.unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("no answer within 50 ms"));
        assert_eq!(silent.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_facilitator_client_builds_with_timeout() {
        let settlement =
            FacilitatorSettlement::new("https://pay.example/", None, Duration::from_secs(2))
                .unwrap();
        assert_eq!(settlement.base_url, "https://pay.example");
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(250));
        assert_eq!(policy.delay_after(2), Duration::from_millis(500));
        assert_eq!(policy.delay_after(3), Duration::from_secs(1));
        assert_eq!(policy.delay_after(10), Duration::from_secs(4));
    }

    #[test]
    fn test_status_classification() {
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()).is_transient());
        assert!(classify_status(StatusCode::BAD_GATEWAY, String::new()).is_transient());
        assert!(!classify_status(StatusCode::BAD_REQUEST, String::new()).is_transient());
        assert!(!classify_status(StatusCode::PAYMENT_REQUIRED, String::new()).is_transient());
    }

    #[test]
    fn test_prize_after_house_cut() {
        assert_eq!(prize_for(10_000, 0), 20_000);
        assert_eq!(prize_for(10_000, 250), 19_500);
        assert_eq!(prize_for(10_000, 20_000), 0);
        assert_eq!(prize_for(0, 500), 0);
    }

    #[test]
    fn test_dry_run_reference() {
        let reference = tokio_test::block_on(DryRunSettlement.payout("addr", 5));
        tokio_test::assert_ok!(&reference);
        assert!(reference.unwrap().starts_with("dry-"));
    }
}
