//! HTTP candle source backed by the Hyperliquid info endpoint

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::data::{interval_millis, normalize, Candle, CandleSource};
use crate::error::FetchError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotRequest<'a> {
    coin: &'a str,
    interval: &'a str,
    start_time: i64,
    end_time: i64,
}

#[derive(Debug, Serialize)]
struct InfoRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    req: SnapshotRequest<'a>,
}

/// Candle source that calls `POST {base_url}/info` with a `candleSnapshot` request
#[derive(Debug, Clone)]
pub struct HyperliquidCandleSource {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HyperliquidCandleSource {
    /// Create a source; every request is bounded by `timeout`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into(),
            timeout,
            client,
        })
    }

    async fn snapshot(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
        end_time: i64,
    ) -> Result<Vec<Candle>, FetchError> {
        let step = interval_millis(interval)
            .ok_or_else(|| FetchError::UnsupportedInterval(interval.to_string()))?;
        let span = step.saturating_mul(i64::try_from(limit).unwrap_or(i64::MAX));
        let request = InfoRequest {
            kind: "candleSnapshot",
            req: SnapshotRequest {
                coin: symbol,
                interval,
                start_time: end_time.saturating_sub(span),
                end_time,
            },
        };

        let url = format!("{}/info", self.base_url.trim_end_matches('/'));
        debug!(%url, symbol, interval, limit, "requesting candle snapshot");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout {
                        symbol: symbol.to_string(),
                        interval: interval.to_string(),
                        timeout: self.timeout,
                    }
                } else {
                    FetchError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(FetchError::Transport(format!(
                "candle snapshot error ({}): {}",
                status, error_text
            )));
        }

        let mut candles: Vec<Candle> = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        normalize(&mut candles);
        let start = candles.len().saturating_sub(limit);
        Ok(candles.split_off(start))
    }
}

#[async_trait]
impl CandleSource for HyperliquidCandleSource {
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, FetchError> {
        let now = chrono::Utc::now().timestamp_millis();
        self.snapshot(symbol, interval, limit, now).await
    }

    async fn fetch_candles_before(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
        before: i64,
    ) -> Result<Vec<Candle>, FetchError> {
        let candles = self.snapshot(symbol, interval, limit, before - 1).await?;
        Ok(candles.into_iter().filter(|c| c.open_time < before).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_request_wire_shape() {
        let request = InfoRequest {
            kind: "candleSnapshot",
            req: SnapshotRequest {
                coin: "BTC",
                interval: "1h",
                start_time: 1,
                end_time: 2,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "candleSnapshot",
                "req": {"coin": "BTC", "interval": "1h", "startTime": 1, "endTime": 2}
            })
        );
    }

    #[tokio::test]
    async fn unsupported_interval_fails_before_any_request() {
        let source =
            HyperliquidCandleSource::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        assert!(matches!(
            source.fetch_candles("BTC", "7m", 10).await,
            Err(FetchError::UnsupportedInterval(_))
        ));
    }
}
