//! In-memory paper trading venue

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::OrderError;
use crate::exchange::{ActivePosition, BalanceInfo, ExchangeAdapter, Order, OrderSide, PortfolioSummary};
use crate::portfolio::{pnl_percent, Position, Side};

#[derive(Debug, Clone)]
struct PaperPosition {
    side: Side,
    size: f64,
    entry_price: f64,
    leverage: u32,
}

#[derive(Debug, Default)]
struct PaperState {
    balance: f64,
    marks: HashMap<String, f64>,
    positions: HashMap<String, PaperPosition>,
    orders: Vec<Order>,
    fail_opens: usize,
    fail_closes: usize,
    latency: Duration,
}

/// Deterministic venue: market orders fill at the current mark price moved
/// against the trader by a fixed slippage. One net position per symbol.
///
/// Failures and latency can be injected to exercise error paths.
#[derive(Debug)]
pub struct PaperExchange {
    address: String,
    slippage_bps: f64,
    state: Mutex<PaperState>,
    open_calls: AtomicUsize,
    close_calls: AtomicUsize,
}

impl PaperExchange {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            address: "paper-wallet".to_string(),
            slippage_bps: 0.0,
            state: Mutex::new(PaperState {
                balance: initial_balance,
                ..PaperState::default()
            }),
            open_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_slippage_bps(mut self, bps: f64) -> Self {
        self.slippage_bps = bps.max(0.0);
        self
    }

    /// Set the price orders on `symbol` fill at
    pub fn set_mark_price(&self, symbol: &str, price: f64) {
        self.state().marks.insert(symbol.to_string(), price);
    }

    /// Delay every order call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = latency;
    }

    /// Reject the next `count` open calls
    pub fn fail_next_opens(&self, count: usize) {
        self.state().fail_opens = count;
    }

    /// Reject the next `count` close calls
    pub fn fail_next_closes(&self, count: usize) {
        self.state().fail_closes = count;
    }

    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Every order seen so far, in submission order
    pub fn orders(&self) -> Vec<Order> {
        self.state().orders.clone()
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.state().positions.contains_key(symbol)
    }

    fn state(&self) -> MutexGuard<'_, PaperState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn simulate_latency(&self) {
        let latency = self.state().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    /// Fill price for an order on `side` given the mark
    fn fill_price(&self, side: OrderSide, mark: f64) -> f64 {
        let slip = self.slippage_bps / 10_000.0;
        match side {
            OrderSide::Buy => mark * (1.0 + slip),
            OrderSide::Sell => mark * (1.0 - slip),
        }
    }

    fn active_position(symbol: &str, position: &PaperPosition, mark: f64) -> ActivePosition {
        let mark = if mark > 0.0 { mark } else { position.entry_price };
        let value = position.size * mark;
        let margin = value / f64::from(position.leverage.max(1));
        let unrealized =
            position.size * position.entry_price * pnl_percent(position.side, position.entry_price, mark) / 100.0;
        ActivePosition {
            coin: symbol.to_string(),
            side: position.side,
            size: position.size,
            entry_price: position.entry_price,
            position_value: value,
            unrealized_pnl: unrealized,
            return_on_equity: if margin > 0.0 { unrealized / margin } else { 0.0 },
            leverage: f64::from(position.leverage),
            liquidation_price: 0.0,
            margin_used: margin,
        }
    }

    fn snapshot(state: &PaperState) -> Vec<ActivePosition> {
        let mut positions: Vec<ActivePosition> = state
            .positions
            .iter()
            .map(|(symbol, position)| {
                let mark = state.marks.get(symbol).copied().unwrap_or(0.0);
                Self::active_position(symbol, position, mark)
            })
            .collect();
        positions.sort_by(|a, b| a.coin.cmp(&b.coin));
        positions
    }
}

#[async_trait]
impl ExchangeAdapter for PaperExchange {
    async fn open_position(
        &self,
        symbol: &str,
        side: Side,
        size: f64,
        leverage: u32,
    ) -> Result<Position, OrderError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let order_side = OrderSide::opening(side);
        let order_id = Uuid::new_v4().to_string();
        let mut state = self.state();

        if state.fail_opens > 0 {
            state.fail_opens -= 1;
            state
                .orders
                .push(Order::rejected(order_id, symbol, order_side, size, false));
            warn!(symbol, %side, "paper venue rejected open order");
            return Err(OrderError::Rejected("injected open failure".to_string()));
        }

        let mark = state.marks.get(symbol).copied().unwrap_or(0.0);
        let fill = self.fill_price(order_side, mark);
        state.orders.push(Order::filled(
            order_id.clone(),
            symbol,
            order_side,
            size,
            fill,
            false,
        ));
        state.positions.insert(
            symbol.to_string(),
            PaperPosition {
                side,
                size,
                entry_price: fill,
                leverage,
            },
        );

        info!(symbol, %side, size, fill, "paper position opened");
        Ok(Position::open(
            order_id,
            symbol,
            side,
            size,
            fill,
            chrono::Utc::now().timestamp_millis(),
        )
        .with_leverage(leverage))
    }

    async fn close_position(&self, symbol: &str, size: f64) -> Result<(), OrderError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let order_id = Uuid::new_v4().to_string();
        let mut state = self.state();

        let Some(position) = state.positions.get(symbol).cloned() else {
            debug!(symbol, "close on a flat symbol is a no-op");
            return Ok(());
        };
        let order_side = OrderSide::closing(position.side);

        if state.fail_closes > 0 {
            state.fail_closes -= 1;
            state
                .orders
                .push(Order::rejected(order_id, symbol, order_side, size, true));
            warn!(symbol, "paper venue rejected close order");
            return Err(OrderError::Rejected("injected close failure".to_string()));
        }

        let mark = state.marks.get(symbol).copied().unwrap_or(0.0);
        let fill = if mark > 0.0 {
            self.fill_price(order_side, mark)
        } else {
            position.entry_price
        };
        let realized = position.size
            * position.entry_price
            * pnl_percent(position.side, position.entry_price, fill)
            / 100.0;

        state.balance += realized;
        state.positions.remove(symbol);
        state
            .orders
            .push(Order::filled(order_id, symbol, order_side, size, fill, true));

        info!(symbol, fill, realized, "paper position closed");
        Ok(())
    }

    async fn positions(&self) -> Result<Vec<ActivePosition>, OrderError> {
        Ok(Self::snapshot(&self.state()))
    }

    async fn balance(&self) -> Result<f64, OrderError> {
        Ok(self.state().balance)
    }

    async fn portfolio(&self) -> Result<PortfolioSummary, OrderError> {
        let state = self.state();
        let positions = Self::snapshot(&state);
        let unrealized: f64 = positions.iter().map(|p| p.unrealized_pnl).sum();
        let margin: f64 = positions.iter().map(|p| p.margin_used).sum();
        let account_value = state.balance + unrealized;

        Ok(PortfolioSummary {
            balance: BalanceInfo {
                account_value: format!("{:.2}", account_value),
                total_raw_usd: format!("{:.2}", state.balance),
                withdrawable: format!("{:.2}", (account_value - margin).max(0.0)),
                total_margin_used: format!("{:.2}", margin),
            },
            positions,
        })
    }

    fn address(&self) -> String {
        self.address.clone()
    }

    fn update_mark(&self, symbol: &str, price: f64) {
        if price.is_finite() && price > 0.0 {
            self.set_mark_price(symbol, price);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fills_at_mark_with_slippage() {
        let venue = PaperExchange::new(1_000.0).with_slippage_bps(10.0);
        venue.set_mark_price("BTC", 100.0);

        let long = venue.open_position("BTC", Side::Long, 1.0, 5).await.unwrap();
        assert!((long.entry_price - 100.1).abs() < 1e-9);
        assert_eq!(long.leverage, 5);
        assert!(venue.has_position("BTC"));

        venue.set_mark_price("ETH", 50.0);
        let short = venue.open_position("ETH", Side::Short, 2.0, 5).await.unwrap();
        assert!((short.entry_price - 49.95).abs() < 1e-9);
    }

    #[tokio::test]
    async fn close_realizes_pnl_into_balance() {
        let venue = PaperExchange::new(1_000.0);
        venue.set_mark_price("BTC", 100.0);
        venue.open_position("BTC", Side::Long, 2.0, 1).await.unwrap();

        venue.set_mark_price("BTC", 110.0);
        let summary = venue.portfolio().await.unwrap();
        assert_eq!(summary.balance.account_value, "1020.00");
        assert_eq!(summary.positions.len(), 1);

        venue.close_position("BTC", 2.0).await.unwrap();
        assert!((venue.balance().await.unwrap() - 1_020.0).abs() < 1e-9);
        assert!(venue.positions().await.unwrap().is_empty());
        assert_eq!(venue.orders().len(), 2);
    }

    #[tokio::test]
    async fn injected_failures_leave_state_untouched() {
        let venue = PaperExchange::new(1_000.0);
        venue.set_mark_price("SOL", 20.0);
        venue.fail_next_opens(1);

        assert!(venue.open_position("SOL", Side::Long, 1.0, 1).await.is_err());
        assert!(!venue.has_position("SOL"));

        venue.open_position("SOL", Side::Long, 1.0, 1).await.unwrap();
        venue.fail_next_closes(1);
        assert!(venue.close_position("SOL", 1.0).await.is_err());
        assert!(venue.has_position("SOL"));
        assert_eq!(venue.open_calls(), 2);
        assert_eq!(venue.close_calls(), 1);
    }

    #[tokio::test]
    async fn observed_prices_become_marks() {
        let venue = PaperExchange::new(1_000.0);
        venue.update_mark("BTC", 200.0);
        venue.update_mark("BTC", f64::NAN);
        venue.update_mark("BTC", 0.0);

        let long = venue.open_position("BTC", Side::Long, 1.0, 1).await.unwrap();
        assert_eq!(long.entry_price, 200.0);

        venue.update_mark("BTC", 210.0);
        venue.close_position("BTC", 1.0).await.unwrap();
        assert!((venue.balance().await.unwrap() - 1_010.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn closing_flat_symbol_is_ok() {
        let venue = PaperExchange::new(10.0).with_address("0xabc");
        assert!(venue.close_position("DOGE", 1.0).await.is_ok());
        assert_eq!(venue.address(), "0xabc");
    }
}
