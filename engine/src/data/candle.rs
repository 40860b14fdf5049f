//! OHLCV candle data structures

use serde::{Deserialize, Serialize};
use tracing::debug;

/// One OHLCV bar as delivered by the market-data venue.
///
/// Prices and volume travel as decimal text; the `*_price` accessors
/// convert them on demand. Field names on the wire are the venue's
/// single-letter keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Open time in milliseconds since epoch
    #[serde(rename = "t")]
    pub open_time: i64,
    /// Close time in milliseconds since epoch
    #[serde(rename = "T")]
    pub close_time: i64,
    /// Market symbol (e.g., "BTC")
    #[serde(rename = "s", default)]
    pub symbol: String,
    /// Interval (e.g., "5m", "1h", "1d")
    #[serde(rename = "i", default)]
    pub interval: String,
    #[serde(rename = "o")]
    pub open: String,
    #[serde(rename = "h")]
    pub high: String,
    #[serde(rename = "l")]
    pub low: String,
    #[serde(rename = "c")]
    pub close: String,
    #[serde(rename = "v")]
    pub volume: String,
    /// Venue sequence number (trade count for the bar)
    #[serde(rename = "n", default)]
    pub sequence: u64,
}

impl Candle {
    /// Create a new candle from numeric prices
    pub fn new(
        open_time: i64,
        close_time: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            open_time,
            close_time,
            symbol: String::new(),
            interval: String::new(),
            open: open.to_string(),
            high: high.to_string(),
            low: low.to_string(),
            close: close.to_string(),
            volume: volume.to_string(),
            sequence: 0,
        }
    }

    /// Tag the candle with its market
    pub fn with_market(mut self, symbol: impl Into<String>, interval: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self.interval = interval.into();
        self
    }

    pub fn open_price(&self) -> f64 {
        parse_decimal(&self.open)
    }

    pub fn high_price(&self) -> f64 {
        parse_decimal(&self.high)
    }

    pub fn low_price(&self) -> f64 {
        parse_decimal(&self.low)
    }

    pub fn close_price(&self) -> f64 {
        parse_decimal(&self.close)
    }

    pub fn volume_amount(&self) -> f64 {
        parse_decimal(&self.volume)
    }

    /// Get median price (HL/2)
    pub fn median_price(&self) -> f64 {
        (self.high_price() + self.low_price()) / 2.0
    }

    /// Get total range (high - low)
    pub fn range(&self) -> f64 {
        self.high_price() - self.low_price()
    }
}

/// Unparseable or non-finite text reads as zero.
fn parse_decimal(raw: &str) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => {
            debug!(raw, "unparseable candle value, using 0");
            0.0
        }
    }
}

/// Get close prices as vector
pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(Candle::close_price).collect()
}

/// Get high prices as vector
pub fn highs(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(Candle::high_price).collect()
}

/// Get low prices as vector
pub fn lows(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(Candle::low_price).collect()
}

/// Sort by open time (oldest first) and drop repeated timestamps, keeping the latest copy.
pub fn normalize(candles: &mut Vec<Candle>) {
    candles.reverse();
    candles.sort_by_key(|c| c.open_time);
    candles.dedup_by_key(|c| c.open_time);
}

/// True when open times strictly increase.
pub fn is_ordered(candles: &[Candle]) -> bool {
    candles.windows(2).all(|w| w[0].open_time < w[1].open_time)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_venue_payload() {
        let raw = r#"{"t":1700000000000,"T":1700003599999,"s":"BTC","i":"1h",
            "o":"37000.5","h":"37210","l":"36900.25","c":"37100","v":"12.5","n":431}"#;
        let candle: Candle = serde_json::from_str(raw).unwrap();

        assert_eq!(candle.open_time, 1_700_000_000_000);
        assert_eq!(candle.symbol, "BTC");
        assert_eq!(candle.sequence, 431);
        assert_eq!(candle.low_price(), 36900.25);
        assert_eq!(candle.median_price(), (37210.0 + 36900.25) / 2.0);
    }

    #[test]
    fn garbage_prices_read_as_zero() {
        let mut candle = Candle::new(0, 59_999, 1.0, 2.0, 0.5, 1.5, 10.0);
        candle.close = "n/a".to_string();
        candle.high = "inf".to_string();
        assert_eq!(candle.close_price(), 0.0);
        assert_eq!(candle.high_price(), 0.0);
    }

    #[test]
    fn normalize_keeps_latest_duplicate() {
        let mut candles = vec![
            Candle::new(120, 179, 1.0, 1.0, 1.0, 3.0, 0.0),
            Candle::new(60, 119, 1.0, 1.0, 1.0, 2.0, 0.0),
            Candle::new(120, 179, 1.0, 1.0, 1.0, 4.0, 0.0),
        ];
        normalize(&mut candles);

        assert!(is_ordered(&candles));
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].close_price(), 4.0);
    }
}
