//! Candle sources

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::data::{normalize, Candle};
use crate::error::FetchError;

/// Anything that can serve a recent window of candles for a market.
///
/// Returned sequences are ordered by open time with no duplicates.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// The most recent `limit` candles
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, FetchError>;

    /// Up to `limit` candles that opened strictly before `before` (ms)
    async fn fetch_candles_before(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
        before: i64,
    ) -> Result<Vec<Candle>, FetchError>;
}

/// In-memory candle store keyed by symbol and interval.
///
/// Used for replaying recorded data and for driving the live engine in tests:
/// [`push`](Self::push) with a new open time simulates a fresh candle, with an
/// existing open time it simulates an intra-candle update.
#[derive(Debug, Default)]
pub struct MemoryCandleSource {
    candles: RwLock<HashMap<String, Vec<Candle>>>,
    failures: AtomicUsize,
    fetches: AtomicUsize,
}

impl MemoryCandleSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get storage key from symbol and interval
    fn key(symbol: &str, interval: &str) -> String {
        format!("{}:{}", symbol, interval)
    }

    /// Replace the stored series for a market
    pub fn insert(&self, symbol: &str, interval: &str, mut candles: Vec<Candle>) {
        normalize(&mut candles);
        let mut store = self.candles.write().unwrap_or_else(|e| e.into_inner());
        store.insert(Self::key(symbol, interval), candles);
    }

    /// Append a candle, replacing any candle with the same open time
    pub fn push(&self, symbol: &str, interval: &str, candle: Candle) {
        let mut store = self.candles.write().unwrap_or_else(|e| e.into_inner());
        let series = store.entry(Self::key(symbol, interval)).or_default();
        series.push(candle);
        normalize(series);
    }

    /// Make the next `count` fetches fail with a transport error
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Number of fetch calls served so far, including failed ones
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of stored candles for a market
    pub fn len(&self, symbol: &str, interval: &str) -> usize {
        let store = self.candles.read().unwrap_or_else(|e| e.into_inner());
        store.get(&Self::key(symbol, interval)).map_or(0, Vec::len)
    }

    fn take_failure(&self) -> bool {
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn select(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
        before: Option<i64>,
    ) -> Result<Vec<Candle>, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.take_failure() {
            return Err(FetchError::Transport("injected fetch failure".to_string()));
        }

        let store = self.candles.read().unwrap_or_else(|e| e.into_inner());
        let series = store
            .get(&Self::key(symbol, interval))
            .ok_or_else(|| FetchError::Empty {
                symbol: symbol.to_string(),
                interval: interval.to_string(),
            })?;

        let end = match before {
            Some(before) => series.partition_point(|c| c.open_time < before),
            None => series.len(),
        };
        let start = end.saturating_sub(limit);
        Ok(series[start..end].to_vec())
    }
}

#[async_trait]
impl CandleSource for MemoryCandleSource {
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, FetchError> {
        self.select(symbol, interval, limit, None)
    }

    async fn fetch_candles_before(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
        before: i64,
    ) -> Result<Vec<Candle>, FetchError> {
        self.select(symbol, interval, limit, Some(before))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(count: i64) -> Vec<Candle> {
        (0..count)
            .map(|i| Candle::new(i * 60_000, i * 60_000 + 59_999, 1.0, 1.0, 1.0, i as f64, 0.0))
            .collect()
    }

    #[tokio::test]
    async fn test_fetch_latest_window() {
        let source = MemoryCandleSource::new();
        source.insert("BTC", "1m", series(10));

        let candles = source.fetch_candles("BTC", "1m", 3).await.unwrap();
        let closes: Vec<f64> = candles.iter().map(Candle::close_price).collect();
        assert_eq!(closes, vec![7.0, 8.0, 9.0]);
    }

    #[tokio::test]
    async fn test_fetch_before_is_exclusive() {
        let source = MemoryCandleSource::new();
        source.insert("BTC", "1m", series(10));

        let candles = source
            .fetch_candles_before("BTC", "1m", 2, 5 * 60_000)
            .await
            .unwrap();
        let opens: Vec<i64> = candles.iter().map(|c| c.open_time).collect();
        assert_eq!(opens, vec![3 * 60_000, 4 * 60_000]);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let source = MemoryCandleSource::new();
        source.insert("ETH", "5m", series(3));
        source.fail_next(1);

        assert!(matches!(
            source.fetch_candles("ETH", "5m", 3).await,
            Err(FetchError::Transport(_))
        ));
        assert_eq!(source.fetch_candles("ETH", "5m", 3).await.unwrap().len(), 3);
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_unknown_market_is_empty_error() {
        let source = MemoryCandleSource::new();
        assert!(matches!(
            source.fetch_candles("SOL", "1h", 10).await,
            Err(FetchError::Empty { .. })
        ));
    }
}
