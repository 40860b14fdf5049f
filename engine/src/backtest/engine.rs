//! Backtesting engine
//!
//! Replays a strategy's signals over a candle sequence into a ledger of
//! positions. At most one position is open at a time: a signal on the open
//! position's side is ignored, an opposite signal closes it at the signal's
//! candle and opens the new side there. Anything still open at the end is
//! closed at the last close.
//!
//! The simulation is a pure function of its inputs: no clock, no randomness.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backtest::Metrics;
use crate::data::Candle;
use crate::portfolio::{ExecutionConfig, ExitReason, Position};
use crate::strategy::{Analysis, Signal, Strategy, StrategyMetadata, Visualization};

/// Backtest result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestResult {
    pub strategy_name: String,
    pub strategy_version: String,
    /// Every position in the order it was opened
    pub positions: Vec<Position>,
    pub signals: Vec<Signal>,
    /// Overlay series sit at the top level of the serialized result
    #[serde(flatten)]
    pub visualization: Option<Visualization>,
    #[serde(flatten)]
    pub metrics: Metrics,
}

/// Backtesting engine
#[derive(Debug, Clone, Default)]
pub struct Backtester;

impl Backtester {
    pub fn new() -> Self {
        Self
    }

    /// Analyse `candles` with `strategy` and simulate the resulting signals
    pub fn run_strategy(
        &self,
        strategy: &dyn Strategy,
        symbol: &str,
        candles: &[Candle],
        config: &ExecutionConfig,
    ) -> BacktestResult {
        let analysis = strategy.analyze(candles);
        self.run(symbol, candles, analysis, config, &strategy.metadata())
    }

    /// Simulate precomputed signals
    pub fn run(
        &self,
        symbol: &str,
        candles: &[Candle],
        analysis: Analysis,
        config: &ExecutionConfig,
        metadata: &StrategyMetadata,
    ) -> BacktestResult {
        let Analysis {
            signals,
            visualization,
        } = analysis;

        let positions = simulate(symbol, candles, &signals, config);
        let metrics = Metrics::calculate(&positions);
        debug!(
            strategy = %metadata.id,
            symbol,
            candles = candles.len(),
            signals = signals.len(),
            trades = metrics.total_trades,
            total_pnl = metrics.total_pnl,
            "backtest finished"
        );

        BacktestResult {
            strategy_name: metadata.name.clone(),
            strategy_version: metadata.version.clone(),
            positions,
            signals,
            visualization,
            metrics,
        }
    }
}

fn simulate(
    symbol: &str,
    candles: &[Candle],
    signals: &[Signal],
    config: &ExecutionConfig,
) -> Vec<Position> {
    let Some(last) = candles.last() else {
        return Vec::new();
    };

    let mut ordered: Vec<&Signal> = signals.iter().collect();
    ordered.sort_by_key(|s| s.index);

    let mut ledger: Vec<Position> = Vec::new();
    let mut current: Option<Position> = None;

    for signal in ordered {
        let Some(side) = signal.side() else {
            continue;
        };
        if !config.trade_direction.allows(side) {
            continue;
        }
        if signal.index >= candles.len() {
            warn!(index = signal.index, candles = candles.len(), "signal outside candle range");
            continue;
        }

        match current.take() {
            Some(open) if open.side == side => {
                current = Some(open);
                continue;
            }
            Some(open) => {
                ledger.push(close_at(
                    open,
                    candles,
                    signal.index,
                    signal.price,
                    ExitReason::TrendReversal,
                ));
            }
            None => {}
        }

        let id = format!("bt-{}", ledger.len() + 1);
        current = Some(
            Position::open(id, symbol, side, config.position_size, signal.price, signal.time)
                .with_entry_index(signal.index),
        );
    }

    if let Some(open) = current {
        let exit_index = candles.len() - 1;
        ledger.push(close_at(
            open,
            candles,
            exit_index,
            last.close_price(),
            ExitReason::EndOfPeriod,
        ));
    }

    ledger
}

/// Close at `exit_index`, folding in the lows and highs of every candle after
/// the entry candle up to and including the exit candle.
fn close_at(
    mut position: Position,
    candles: &[Candle],
    exit_index: usize,
    exit_price: f64,
    reason: ExitReason,
) -> Position {
    let first = position.entry_index.map_or(exit_index, |entry| entry + 1);
    for candle in candles.iter().take(exit_index + 1).skip(first) {
        position.observe_price(candle.low_price());
        position.observe_price(candle.high_price());
    }

    position.close(
        exit_price,
        candles[exit_index].open_time,
        Some(exit_index),
        reason,
    );
    position
}
