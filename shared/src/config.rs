use std::str::FromStr;

use anyhow::Context;
use dotenv::dotenv;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub wallet_address: String,
    pub default_leverage: u32,
    pub warmup_candles: usize,
    pub poll_candles: usize,
    /// Overrides the interval/5 poll cadence when set.
    pub poll_interval_ms: Option<u64>,
    pub fetch_timeout_secs: u64,
    pub order_timeout_secs: u64,
    pub paper_balance: f64,
    pub paper_slippage_bps: f64,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenv().ok();

        Ok(Config {
            api_url: std::env::var("HYPERLIQUID_API_URL")
                .unwrap_or_else(|_| "https://api.hyperliquid.xyz".to_string()),
            wallet_address: std::env::var("WALLET_ADDRESS")
                .unwrap_or_else(|_| "paper-wallet".to_string()),
            default_leverage: parse_env("DEFAULT_LEVERAGE", 10)?,
            warmup_candles: parse_env("WARMUP_CANDLES", 200)?,
            poll_candles: parse_env("POLL_CANDLES", 250)?,
            poll_interval_ms: parse_optional_env("POLL_INTERVAL_MS")?,
            fetch_timeout_secs: parse_env("FETCH_TIMEOUT_SECS", 10)?,
            order_timeout_secs: parse_env("ORDER_TIMEOUT_SECS", 15)?,
            paper_balance: parse_env("PAPER_BALANCE", 1000.0)?,
            paper_slippage_bps: parse_env("PAPER_SLIPPAGE_BPS", 0.0)?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "https://api.hyperliquid.xyz".to_string(),
            wallet_address: "paper-wallet".to_string(),
            default_leverage: 10,
            warmup_candles: 200,
            poll_candles: 250,
            poll_interval_ms: None,
            fetch_timeout_secs: 10,
            order_timeout_secs: 15,
            paper_balance: 1000.0,
            paper_slippage_bps: 0.0,
        }
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T, anyhow::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("config key {key} has invalid value {raw:?}")),
        Err(_) => Ok(default),
    }
}

fn parse_optional_env<T>(key: &str) -> Result<Option<T>, anyhow::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("config key {key} has invalid value {raw:?}")),
        _ => Ok(None),
    }
}
