//! Execution settings attached to a backtest or a live instance

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::portfolio::Side;
use crate::Result;

/// Which signal sides may open positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    Long,
    Short,
    #[default]
    Both,
}

impl TradeDirection {
    pub fn allows(self, side: Side) -> bool {
        match self {
            TradeDirection::Both => true,
            TradeDirection::Long => side == Side::Long,
            TradeDirection::Short => side == Side::Short,
        }
    }
}

/// Position sizing, direction filter and exit thresholds.
///
/// A threshold of zero disables it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionConfig {
    pub position_size: f64,
    #[serde(default)]
    pub trade_direction: TradeDirection,
    #[serde(default)]
    pub take_profit_percent: f64,
    #[serde(default)]
    pub stop_loss_percent: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            position_size: 1.0,
            trade_direction: TradeDirection::Both,
            take_profit_percent: 0.0,
            stop_loss_percent: 0.0,
        }
    }
}

impl ExecutionConfig {
    pub fn new(position_size: f64, trade_direction: TradeDirection) -> Self {
        Self {
            position_size,
            trade_direction,
            ..Self::default()
        }
    }

    pub fn with_take_profit(mut self, percent: f64) -> Self {
        self.take_profit_percent = percent;
        self
    }

    pub fn with_stop_loss(mut self, percent: f64) -> Self {
        self.stop_loss_percent = percent;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.position_size.is_finite() && self.position_size > 0.0) {
            return Err(EngineError::invalid_parameter(
                "positionSize",
                format!("must be a positive number, got {}", self.position_size),
            ));
        }
        for (name, value) in [
            ("takeProfitPercent", self.take_profit_percent),
            ("stopLossPercent", self.stop_loss_percent),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(EngineError::invalid_parameter(
                    name,
                    format!("must be zero or positive, got {value}"),
                ));
            }
        }
        Ok(())
    }
}
