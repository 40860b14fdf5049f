//! Error taxonomy shared by the backtester, the position manager and the live engine

use std::time::Duration;
use thiserror::Error;

/// Failure reported by a candle source. Always transient: callers may retry.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("candle request for {symbol} {interval} timed out after {timeout:?}")]
    Timeout {
        symbol: String,
        interval: String,
        timeout: Duration,
    },
    #[error("candle request failed: {0}")]
    Transport(String),
    #[error("candle response could not be decoded: {0}")]
    Decode(String),
    #[error("no candles available for {symbol} {interval}")]
    Empty { symbol: String, interval: String },
    #[error("unsupported interval: {0}")]
    UnsupportedInterval(String),
}

/// Failure reported by an exchange adapter while placing or closing an order.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrderError {
    #[error("order rejected by venue: {0}")]
    Rejected(String),
    #[error("no open position for {0}")]
    NoPosition(String),
    #[error("order request timed out after {0:?}")]
    Timeout(Duration),
    #[error("venue unavailable: {0}")]
    Unavailable(String),
}

/// Engine-wide error
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),
    #[error("strategy instance not found: {0}")]
    NotFound(String),
    #[error("strategy instance already running: {0}")]
    AlreadyRunning(String),
    #[error("strategy instance is already stopping: {0}")]
    Stopping(String),
    #[error("strategy initialization failed: {0}")]
    Initialization(String),
    #[error("insufficient data: need at least {required} candles, got {actual}")]
    InsufficientData { required: usize, actual: usize },
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Order(#[from] OrderError),
}

impl EngineError {
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias
pub type Result<T, E = EngineError> = std::result::Result<T, E>;
