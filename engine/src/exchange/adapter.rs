//! Exchange adapter contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OrderError;
use crate::portfolio::{Position, Side};

/// Account balance as reported by the venue (decimal text)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceInfo {
    pub account_value: String,
    pub total_raw_usd: String,
    pub withdrawable: String,
    pub total_margin_used: String,
}

/// Open position as reported by the venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivePosition {
    pub coin: String,
    pub side: Side,
    pub size: f64,
    pub entry_price: f64,
    pub position_value: f64,
    pub unrealized_pnl: f64,
    pub return_on_equity: f64,
    pub leverage: f64,
    pub liquidation_price: f64,
    pub margin_used: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub balance: BalanceInfo,
    pub positions: Vec<ActivePosition>,
}

/// Venue abstraction used by the position manager and the facade.
///
/// Implementations must be callable concurrently from many live instances.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Open a position with a market order. The returned position carries the
    /// fill price as `entry_price`; zero means the venue did not report one.
    async fn open_position(
        &self,
        symbol: &str,
        side: Side,
        size: f64,
        leverage: u32,
    ) -> Result<Position, OrderError>;

    /// Flatten `size` of the position on `symbol`
    async fn close_position(&self, symbol: &str, size: f64) -> Result<(), OrderError>;

    async fn positions(&self) -> Result<Vec<ActivePosition>, OrderError>;

    /// Account value
    async fn balance(&self) -> Result<f64, OrderError>;

    async fn portfolio(&self) -> Result<PortfolioSummary, OrderError>;

    /// Wallet address the adapter trades for
    fn address(&self) -> String;

    /// Latest price the caller observed for `symbol`. Venues with their own
    /// order book ignore it; simulated venues fill orders against it.
    fn update_mark(&self, _symbol: &str, _price: f64) {}
}
