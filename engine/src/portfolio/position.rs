//! Position tracking

use std::fmt;

use serde::{Deserialize, Serialize};

/// Position side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Long position
    Long,
    /// Short position
    Short,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Long => "LONG",
            Side::Short => "SHORT",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Why a position was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitReason {
    #[serde(rename = "Trend Reversal")]
    TrendReversal,
    #[serde(rename = "End of Period")]
    EndOfPeriod,
    #[serde(rename = "Take Profit")]
    TakeProfit,
    #[serde(rename = "Stop Loss")]
    StopLoss,
    #[serde(rename = "Strategy Stopped")]
    StrategyStopped,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::TrendReversal => "Trend Reversal",
            ExitReason::EndOfPeriod => "End of Period",
            ExitReason::TakeProfit => "Take Profit",
            ExitReason::StopLoss => "Stop Loss",
            ExitReason::StrategyStopped => "Strategy Stopped",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Percent move from `entry` to `price` in the position's favour
pub fn pnl_percent(side: Side, entry: f64, price: f64) -> f64 {
    if entry == 0.0 {
        return 0.0;
    }
    let diff = match side {
        Side::Long => price - entry,
        Side::Short => entry - price,
    };
    diff / entry * 100.0
}

/// Trading position.
///
/// Exit fields are populated exactly when `is_open` is false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Position ID
    pub id: String,
    pub symbol: String,
    pub side: Side,
    /// Quantity in base units
    pub size: f64,
    pub leverage: u32,
    /// Candle index of the entry, when opened from an indexed signal
    pub entry_index: Option<usize>,
    pub entry_price: f64,
    /// Entry time in ms
    pub entry_time: i64,
    pub is_open: bool,
    pub exit_index: Option<usize>,
    pub exit_price: Option<f64>,
    pub exit_time: Option<i64>,
    pub exit_reason: Option<ExitReason>,
    /// Realized P&L, set on close
    pub pnl: f64,
    pub pnl_percent: f64,
    /// Worst unrealized P&L seen while open (zero or negative)
    pub max_drawdown: f64,
    pub max_drawdown_percent: f64,
    /// Best unrealized P&L seen while open (zero or positive)
    pub max_profit: f64,
    pub max_profit_percent: f64,
}

impl Position {
    /// Create new open position
    pub fn open(
        id: impl Into<String>,
        symbol: impl Into<String>,
        side: Side,
        size: f64,
        entry_price: f64,
        entry_time: i64,
    ) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            side,
            size,
            leverage: 1,
            entry_index: None,
            entry_price,
            entry_time,
            is_open: true,
            exit_index: None,
            exit_price: None,
            exit_time: None,
            exit_reason: None,
            pnl: 0.0,
            pnl_percent: 0.0,
            max_drawdown: 0.0,
            max_drawdown_percent: 0.0,
            max_profit: 0.0,
            max_profit_percent: 0.0,
        }
    }

    pub fn with_entry_index(mut self, index: usize) -> Self {
        self.entry_index = Some(index);
        self
    }

    pub fn with_leverage(mut self, leverage: u32) -> Self {
        self.leverage = leverage;
        self
    }

    /// Unrealized P&L percentage at `price`
    pub fn unrealized_pnl_percent(&self, price: f64) -> f64 {
        pnl_percent(self.side, self.entry_price, price)
    }

    /// Unrealized P&L at `price`
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.entry_value() * self.unrealized_pnl_percent(price) / 100.0
    }

    /// Get entry value
    pub fn entry_value(&self) -> f64 {
        self.entry_price * self.size
    }

    /// Fold a seen price into the excursion extremes
    pub fn observe_price(&mut self, price: f64) {
        let percent = self.unrealized_pnl_percent(price);
        if percent < self.max_drawdown_percent {
            self.max_drawdown_percent = percent;
            self.max_drawdown = self.unrealized_pnl(price);
        }
        if percent > self.max_profit_percent {
            self.max_profit_percent = percent;
            self.max_profit = self.unrealized_pnl(price);
        }
    }

    /// Stamp the exit and realize P&L. The exit price also counts as an excursion.
    pub fn close(
        &mut self,
        exit_price: f64,
        exit_time: i64,
        exit_index: Option<usize>,
        reason: ExitReason,
    ) {
        self.observe_price(exit_price);
        self.is_open = false;
        self.exit_index = exit_index;
        self.exit_price = Some(exit_price);
        self.exit_time = Some(exit_time);
        self.exit_reason = Some(reason);
        self.pnl_percent = self.unrealized_pnl_percent(exit_price);
        self.pnl = self.unrealized_pnl(exit_price);
    }

    /// Milliseconds between entry and exit; zero while open
    pub fn hold_millis(&self) -> i64 {
        self.exit_time
            .map_or(0, |exit| (exit - self.entry_time).max(0))
    }
}
