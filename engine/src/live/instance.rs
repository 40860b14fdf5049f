//! State of one running strategy instance

use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::live::StopSignal;
use crate::portfolio::{ExecutionConfig, Position, PositionHandle, Side};
use crate::strategy::{StrategyMetadata, Visualization};

/// Lifecycle of a live instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

#[derive(Debug, Default)]
struct PositionBook {
    current: Option<Position>,
    closed: Vec<Position>,
}

#[derive(Debug, Default)]
struct MarketView {
    last_candle_time: Option<i64>,
    last_price: Option<f64>,
    visualization: Option<Visualization>,
}

/// A strategy bound to a market and execution settings.
///
/// The polling task is the only writer of the position book while the
/// instance runs; stop closes the position only after that task has ended.
#[derive(Debug)]
pub struct LiveStrategy {
    id: String,
    metadata: StrategyMetadata,
    symbol: String,
    interval: String,
    config: ExecutionConfig,
    state: Mutex<InstanceState>,
    book: Mutex<PositionBook>,
    market: Mutex<MarketView>,
    stop: StopSignal,
}

/// Point-in-time view of an instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningStrategyInfo {
    pub id: String,
    pub strategy_id: String,
    pub strategy_name: String,
    pub strategy_version: String,
    pub symbol: String,
    pub interval: String,
    pub config: ExecutionConfig,
    pub state: InstanceState,
    pub is_running: bool,
    pub has_position: bool,
    pub position_side: Option<Side>,
    pub position_size: Option<f64>,
    pub entry_price: Option<f64>,
    pub closed_trades: usize,
    pub realized_pnl: f64,
    pub last_candle_time: Option<i64>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl LiveStrategy {
    pub fn new(
        id: impl Into<String>,
        metadata: StrategyMetadata,
        symbol: impl Into<String>,
        interval: impl Into<String>,
        config: ExecutionConfig,
    ) -> Self {
        Self {
            id: id.into(),
            metadata,
            symbol: symbol.into(),
            interval: interval.into(),
            config,
            state: Mutex::new(InstanceState::Starting),
            book: Mutex::new(PositionBook::default()),
            market: Mutex::new(MarketView::default()),
            stop: StopSignal::new(),
        }
    }

    pub fn interval(&self) -> &str {
        &self.interval
    }

    pub fn metadata(&self) -> &StrategyMetadata {
        &self.metadata
    }

    pub fn state(&self) -> InstanceState {
        *lock(&self.state)
    }

    pub fn set_state(&self, state: InstanceState) {
        *lock(&self.state) = state;
    }

    /// Mark running unless a stop already began
    pub(crate) fn mark_running(&self) {
        let mut state = lock(&self.state);
        if *state == InstanceState::Starting {
            *state = InstanceState::Running;
        }
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    pub fn is_running(&self) -> bool {
        !self.stop.is_triggered()
            && matches!(self.state(), InstanceState::Starting | InstanceState::Running)
    }

    /// Closed positions in close order
    pub fn closed_positions(&self) -> Vec<Position> {
        lock(&self.book).closed.clone()
    }

    pub fn last_candle_time(&self) -> Option<i64> {
        lock(&self.market).last_candle_time
    }

    pub fn last_price(&self) -> Option<f64> {
        lock(&self.market).last_price
    }

    pub fn visualization(&self) -> Option<Visualization> {
        lock(&self.market).visualization.clone()
    }

    pub(crate) fn record_price(&self, price: f64) {
        lock(&self.market).last_price = Some(price);
    }

    /// Remember the newest candle; returns false if it is not newer than the last one seen
    pub(crate) fn advance_candle(&self, open_time: i64) -> bool {
        let mut market = lock(&self.market);
        if market.last_candle_time.is_some_and(|seen| open_time <= seen) {
            return false;
        }
        market.last_candle_time = Some(open_time);
        true
    }

    pub(crate) fn set_visualization(&self, visualization: Option<Visualization>) {
        lock(&self.market).visualization = visualization;
    }

    pub fn info(&self) -> RunningStrategyInfo {
        let (current, closed_trades, realized_pnl) = {
            let book = lock(&self.book);
            (
                book.current.clone().filter(|p| p.is_open),
                book.closed.len(),
                book.closed.iter().map(|p| p.pnl).sum(),
            )
        };

        RunningStrategyInfo {
            id: self.id.clone(),
            strategy_id: self.metadata.id.clone(),
            strategy_name: self.metadata.name.clone(),
            strategy_version: self.metadata.version.clone(),
            symbol: self.symbol.clone(),
            interval: self.interval.clone(),
            config: self.config.clone(),
            state: self.state(),
            is_running: self.is_running(),
            has_position: current.is_some(),
            position_side: current.as_ref().map(|p| p.side),
            position_size: current.as_ref().map(|p| p.size),
            entry_price: current.as_ref().map(|p| p.entry_price),
            closed_trades,
            realized_pnl,
            last_candle_time: self.last_candle_time(),
        }
    }
}

impl PositionHandle for LiveStrategy {
    fn id(&self) -> &str {
        &self.id
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    fn position(&self) -> Option<Position> {
        lock(&self.book).current.clone()
    }

    fn commit(&self, current: Option<Position>, closed: Option<Position>) {
        let mut book = lock(&self.book);
        book.current = current;
        book.closed.extend(closed);
    }
}
