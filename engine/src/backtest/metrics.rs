//! Backtest performance metrics

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::portfolio::Position;

/// Performance summary derived from closed positions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub total_pnl: f64,
    /// Total P&L relative to the average capital per trade
    pub total_pnl_percent: f64,
    pub win_rate: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub average_win: f64,
    /// Magnitude of the average losing trade (positive)
    pub average_loss: f64,
    pub profit_factor: f64,
    /// Worst excursion of any position (zero or negative)
    pub max_drawdown: f64,
    pub max_drawdown_percent: f64,
    pub sharpe_ratio: f64,
    pub longest_win_streak: usize,
    pub longest_loss_streak: usize,
    #[serde(with = "duration_millis")]
    pub average_hold_time: Duration,
}

impl Metrics {
    /// Calculate metrics from a ledger. Open positions are ignored; a trade
    /// with zero P&L counts as a loss.
    pub fn calculate(positions: &[Position]) -> Self {
        let closed: Vec<&Position> = positions.iter().filter(|p| !p.is_open).collect();
        if closed.is_empty() {
            return Self::default();
        }

        let total_trades = closed.len();
        let mut total_pnl = 0.0;
        let mut total_win = 0.0;
        let mut total_loss = 0.0;
        let mut winning_trades = 0;
        let mut losing_trades = 0;
        let mut win_streak = 0;
        let mut loss_streak = 0;
        let mut longest_win_streak = 0;
        let mut longest_loss_streak = 0;
        let mut max_drawdown: f64 = 0.0;
        let mut max_drawdown_percent: f64 = 0.0;
        let mut capital = 0.0;
        let mut hold_millis: i64 = 0;

        for position in &closed {
            total_pnl += position.pnl;
            capital += position.entry_value();
            hold_millis += position.hold_millis();
            max_drawdown = max_drawdown.min(position.max_drawdown);
            max_drawdown_percent = max_drawdown_percent.min(position.max_drawdown_percent);

            if position.pnl > 0.0 {
                winning_trades += 1;
                total_win += position.pnl;
                win_streak += 1;
                loss_streak = 0;
                longest_win_streak = longest_win_streak.max(win_streak);
            } else {
                losing_trades += 1;
                total_loss += position.pnl.abs();
                loss_streak += 1;
                win_streak = 0;
                longest_loss_streak = longest_loss_streak.max(loss_streak);
            }
        }

        let average_capital = capital / total_trades as f64;

        Self {
            total_pnl,
            total_pnl_percent: if average_capital > 0.0 {
                total_pnl / average_capital * 100.0
            } else {
                0.0
            },
            win_rate: winning_trades as f64 / total_trades as f64 * 100.0,
            total_trades,
            winning_trades,
            losing_trades,
            average_win: if winning_trades > 0 {
                total_win / winning_trades as f64
            } else {
                0.0
            },
            average_loss: if losing_trades > 0 {
                total_loss / losing_trades as f64
            } else {
                0.0
            },
            profit_factor: if total_loss > 0.0 {
                total_win / total_loss
            } else {
                0.0
            },
            max_drawdown,
            max_drawdown_percent,
            sharpe_ratio: sharpe_ratio(&closed),
            longest_win_streak,
            longest_loss_streak,
            average_hold_time: Duration::from_millis(
                u64::try_from(hold_millis / total_trades as i64).unwrap_or(0),
            ),
        }
    }

    /// Calculate expectancy
    pub fn expectancy(&self) -> f64 {
        if self.total_trades == 0 {
            return 0.0;
        }
        (self.win_rate / 100.0 * self.average_win)
            - ((100.0 - self.win_rate) / 100.0 * self.average_loss)
    }
}

/// Mean over population standard deviation of per-trade returns; not annualised
fn sharpe_ratio(closed: &[&Position]) -> f64 {
    if closed.len() < 2 {
        return 0.0;
    }
    let returns: Vec<f64> = closed.iter().map(|p| p.pnl_percent / 100.0).collect();
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    let std_dev = variance.sqrt();
    if std_dev > 0.0 {
        mean / std_dev
    } else {
        0.0
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
