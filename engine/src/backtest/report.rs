//! Backtest report generation

use crate::backtest::BacktestResult;

/// Backtest report
#[derive(Debug)]
pub struct BacktestReport {
    result: BacktestResult,
    expectancy: f64,
}

impl BacktestReport {
    /// Create new report from result
    pub fn new(result: BacktestResult) -> Self {
        let expectancy = result.metrics.expectancy();
        Self { result, expectancy }
    }

    /// Format report as string
    pub fn format(&self) -> String {
        let m = &self.result.metrics;
        let mut report = format!(
            r#"
Backtest Results: {} v{}
================
Total P&L: ${:.2} ({:.2}%)
Number of Trades: {}
Winning Trades: {}
Losing Trades: {}
Win Rate: {:.2}%
Average Win: ${:.2}
Average Loss: ${:.2}
Profit Factor: {:.2}
Expectancy: ${:.2}
Maximum Drawdown: ${:.2} ({:.2}%)
Sharpe Ratio: {:.2}
Longest Win Streak: {}
Longest Loss Streak: {}
Average Hold Time: {:.1}h
"#,
            self.result.strategy_name,
            self.result.strategy_version,
            m.total_pnl,
            m.total_pnl_percent,
            m.total_trades,
            m.winning_trades,
            m.losing_trades,
            m.win_rate,
            m.average_win,
            m.average_loss,
            m.profit_factor,
            self.expectancy,
            m.max_drawdown,
            m.max_drawdown_percent,
            m.sharpe_ratio,
            m.longest_win_streak,
            m.longest_loss_streak,
            m.average_hold_time.as_secs_f64() / 3_600.0,
        );

        if !self.result.positions.is_empty() {
            report.push_str("\nTrades\n------\n");
            for position in &self.result.positions {
                report.push_str(&format!(
                    "{:<6} {:<5} entry {:>12.4} exit {:>12.4} pnl {:>10.2} ({:+.2}%) {}\n",
                    position.id,
                    position.side,
                    position.entry_price,
                    position.exit_price.unwrap_or(position.entry_price),
                    position.pnl,
                    position.pnl_percent,
                    position.exit_reason.map(|r| r.as_str()).unwrap_or("open"),
                ));
            }
        }

        report
    }

    /// Get result reference
    pub fn result(&self) -> &BacktestResult {
        &self.result
    }

    pub fn expectancy(&self) -> f64 {
        self.expectancy
    }
}
