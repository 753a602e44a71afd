//! Entry gate: decides whether a registration or paid move may proceed
//!
//! The receipt travels in the `X-PAYMENT` header as base64 JSON
//! `{payer, amount, nonce, signature}`, where `signature` is the hex
//! HMAC-SHA256 of `"{payer}:{amount}:{nonce}"` under the shared secret.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use dashmap::DashSet;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// What the gate is asked to admit
#[derive(Debug, Clone)]
pub struct PlayerClaim {
    pub player_id: String,
    /// Game type or purpose of the charge, for logs
    pub purpose: String,
    /// Amount owed, smallest currency unit
    pub amount_due: u64,
    /// Raw `X-PAYMENT` header value, if any
    pub proof: Option<String>,
}

/// An admitted claim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryGrant {
    /// Who paid; a default payout address
    pub payer: Option<String>,
    pub amount_paid: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("payment receipt required")]
    MissingReceipt,

    #[error("malformed payment receipt: {0}")]
    MalformedReceipt(String),

    #[error("payment receipt signature does not verify")]
    BadSignature,

    #[error("paid {paid}, {required} required")]
    Underpaid { paid: u64, required: u64 },

    #[error("payment receipt {0} was already used")]
    Replayed(String),
}

#[async_trait]
pub trait EntryGate: Send + Sync {
    async fn check_entry(&self, claim: &PlayerClaim) -> Result<EntryGrant, GateError>;
}

/// Admits everyone
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenGate;

#[async_trait]
impl EntryGate for OpenGate {
    async fn check_entry(&self, _claim: &PlayerClaim) -> Result<EntryGrant, GateError> {
        Ok(EntryGrant {
            payer: None,
            amount_paid: 0,
        })
    }
}

/// Signed payment receipt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub payer: String,
    pub amount: u64,
    pub nonce: String,
    pub signature: String,
}

impl Receipt {
    fn signed_payload(&self) -> String {
        format!("{}:{}:{}", self.payer, self.amount, self.nonce)
    }

    pub fn decode(header: &str) -> Result<Self, GateError> {
        let bytes = STANDARD
            .decode(header.trim())
            .map_err(|e| GateError::MalformedReceipt(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| GateError::MalformedReceipt(e.to_string()))
    }
}

fn keyed_mac(secret: &str, payload: &str) -> Result<HmacSha256, GateError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| GateError::BadSignature)?;
    mac.update(payload.as_bytes());
    Ok(mac)
}

/// Build a signed `X-PAYMENT` header value
#[cfg(test)]
pub fn sign_receipt(secret: &str, payer: &str, amount: u64, nonce: &str) -> Result<String, GateError> {
    let mut receipt = Receipt {
        payer: payer.to_string(),
        amount,
        nonce: nonce.to_string(),
        signature: String::new(),
    };
    let mac = keyed_mac(secret, &receipt.signed_payload())?;
    receipt.signature = hex::encode(mac.finalize().into_bytes());

    let json =
        serde_json::to_vec(&receipt).map_err(|e| GateError::MalformedReceipt(e.to_string()))?;
    Ok(STANDARD.encode(json))
}

/// Verifies HMAC-signed receipts and refuses replayed nonces
pub struct ReceiptGate {
    secret: String,
    /// Nonces already redeemed
    spent: DashSet<String>,
}

impl ReceiptGate {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            spent: DashSet::new(),
        }
    }

    fn verify_signature(&self, receipt: &Receipt) -> Result<(), GateError> {
        let provided = hex::decode(receipt.signature.trim()).map_err(|_| GateError::BadSignature)?;
        keyed_mac(&self.secret, &receipt.signed_payload())?
            .verify_slice(&provided)
            .map_err(|_| GateError::BadSignature)
    }

    #[cfg(test)]
    pub fn spent_receipts(&self) -> usize {
        self.spent.len()
    }
}

#[async_trait]
impl EntryGate for ReceiptGate {
    async fn check_entry(&self, claim: &PlayerClaim) -> Result<EntryGrant, GateError> {
        let header = claim.proof.as_deref().ok_or(GateError::MissingReceipt)?;
        let receipt = Receipt::decode(header)?;
        self.verify_signature(&receipt)?;

        if receipt.amount < claim.amount_due {
            return Err(GateError::Underpaid {
                paid: receipt.amount,
                required: claim.amount_due,
            });
        }

        if !self.spent.insert(receipt.nonce.clone()) {
            return Err(GateError::Replayed(receipt.nonce));
        }

        debug!(
            player_id = %claim.player_id,
            payer = %receipt.payer,
            amount = receipt.amount,
            purpose = %claim.purpose,
            "Payment receipt accepted"
        );

        Ok(EntryGrant {
            payer: Some(receipt.payer),
            amount_paid: receipt.amount,
        })
    }
}
