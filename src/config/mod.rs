//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::game::chess::DEFAULT_MAX_PLIES;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// `LOG_FORMAT=json` switches to JSON log lines
    pub log_json: bool,
    /// Allowed client origins for CORS, comma-separated
    pub client_origin: String,

    /// Entry fee per player, smallest currency unit
    pub entry_fee: u64,
    /// Fee per externally submitted move; 0 disables it
    pub move_fee: u64,
    /// House cut of the pot in basis points
    pub house_fee_bps: u32,

    /// HMAC secret for payment receipts; unset admits everyone
    pub entry_gate_secret: Option<String>,
    /// Payout facilitator; unset pays out in dry-run mode
    pub settlement_url: Option<String>,
    /// Required alongside `settlement_url`
    pub settlement_api_key: Option<String>,
    pub payout_max_attempts: u32,
    /// Per-attempt bound on a payout call
    pub settlement_timeout: Duration,

    /// Remote agent endpoint; unset plays random legal moves
    pub decision_provider_url: Option<String>,
    pub decision_timeout: Duration,
    /// Ask the decision provider for moves
    pub auto_play: bool,

    /// Chess ply cap, reaching it is a draw
    pub chess_max_plies: u32,
    /// Per-player move submissions per second
    pub move_rate_per_sec: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match get("PORT") {
            Some(port) => format!("0.0.0.0:{}", port.trim()),
            None => get("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        let house_fee_bps = parse_or(&get, "HOUSE_FEE_BPS", 0u32)?;
        if house_fee_bps > 10_000 {
            return Err(ConfigError::Invalid {
                key: "HOUSE_FEE_BPS",
                value: house_fee_bps.to_string(),
            });
        }

        let auto_play = match get("AUTO_PLAY") {
            None => true,
            Some(value) => {
                let flag = value.trim().to_ascii_lowercase();
                match flag.as_str() {
                    "1" | "true" | "yes" | "on" => true,
                    "0" | "false" | "no" | "off" => false,
                    _ => return Err(ConfigError::Invalid { key: "AUTO_PLAY", value }),
                }
            }
        };

        let settlement_url = get("SETTLEMENT_URL");
        let settlement_api_key = get("SETTLEMENT_API_KEY");
        if settlement_url.is_some() && settlement_api_key.is_none() {
            return Err(ConfigError::Missing("SETTLEMENT_API_KEY"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_json: get("LOG_FORMAT").is_some_and(|f| f.trim().eq_ignore_ascii_case("json")),
            client_origin: get("CLIENT_ORIGIN")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),

            entry_fee: parse_or(&get, "ENTRY_FEE", 10_000u64)?,
            move_fee: parse_or(&get, "MOVE_FEE", 0u64)?,
            house_fee_bps,

            entry_gate_secret: get("ENTRY_GATE_SECRET"),
            settlement_url,
            settlement_api_key,
            payout_max_attempts: parse_or(&get, "PAYOUT_MAX_ATTEMPTS", 4u32)?.max(1),
            settlement_timeout: Duration::from_millis(
                parse_or(&get, "SETTLEMENT_TIMEOUT_MS", 10_000u64)?.max(1),
            ),

            decision_provider_url: get("DECISION_PROVIDER_URL"),
            decision_timeout: Duration::from_millis(parse_or(&get, "DECISION_TIMEOUT_MS", 20_000u64)?),
            auto_play,

            chess_max_plies: parse_or(&get, "CHESS_MAX_PLIES", DEFAULT_MAX_PLIES)?,
            move_rate_per_sec: parse_or(&get, "MOVE_RATE_PER_SEC", 5u32)?,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("Invalid server address format")]
    InvalidAddress,
}
