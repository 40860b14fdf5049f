//! Runtime settings of the live engine

use std::time::Duration;

use shared::Config;

use crate::portfolio::DEFAULT_LEVERAGE;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Leverage for new live positions
    pub leverage: u32,
    /// Candles fetched when an instance starts
    pub warmup_candles: usize,
    /// Candles fetched on every poll
    pub poll_candles: usize,
    /// Fixed poll cadence; `None` polls five times per candle interval
    pub poll_interval: Option<Duration>,
    pub fetch_timeout: Duration,
    pub order_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            leverage: DEFAULT_LEVERAGE,
            warmup_candles: 200,
            poll_candles: 250,
            poll_interval: None,
            fetch_timeout: Duration::from_secs(10),
            order_timeout: Duration::from_secs(15),
        }
    }
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            leverage: config.default_leverage,
            warmup_candles: config.warmup_candles,
            poll_candles: config.poll_candles,
            poll_interval: config.poll_interval_ms.map(Duration::from_millis),
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
            order_timeout: Duration::from_secs(config.order_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_config_defaults() {
        assert_eq!(EngineSettings::from(&Config::default()), EngineSettings::default());
    }

    #[test]
    fn poll_override_is_carried() {
        let config = Config {
            poll_interval_ms: Some(250),
            ..Config::default()
        };
        let settings = EngineSettings::from(&config);
        assert_eq!(settings.poll_interval, Some(Duration::from_millis(250)));
    }
}
