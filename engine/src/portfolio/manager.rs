//! Live position manager
//!
//! Turns signals and price checks into exchange orders for a single live
//! instance. State lives behind a [`PositionHandle`]; the manager reads the
//! current position, talks to the venue, then publishes the outcome with one
//! `commit` so readers never observe a half-applied reversal.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::error::OrderError;
use crate::exchange::ExchangeAdapter;
use crate::portfolio::{ExecutionConfig, ExitReason, Position, Side};
use crate::strategy::Signal;

/// Leverage applied to new positions unless configured otherwise
pub const DEFAULT_LEVERAGE: u32 = 10;

/// Position state of one live instance, as seen by the manager
pub trait PositionHandle: Send + Sync {
    /// Instance id, used for logging
    fn id(&self) -> &str;
    fn symbol(&self) -> &str;
    fn config(&self) -> &ExecutionConfig;
    /// Current position, if any
    fn position(&self) -> Option<Position>;
    /// Replace the current position and append `closed` to the ledger in one step
    fn commit(&self, current: Option<Position>, closed: Option<Position>);
}

/// Result of handling a signal
#[derive(Debug, Clone, PartialEq)]
pub enum SignalOutcome {
    /// Not a long/short signal
    Ignored,
    /// Side excluded by the trade direction setting
    Filtered,
    /// Already positioned on the signal's side
    AlreadyPositioned,
    Opened(Position),
    /// The opposite position was closed and a new one opened
    Reversed { closed: Position, opened: Position },
}

/// Result of a close request
#[derive(Debug, Clone, PartialEq)]
pub enum CloseOutcome {
    NoPosition,
    Closed(Position),
}

/// Result of a take-profit / stop-loss check
#[derive(Debug, Clone, PartialEq)]
pub enum TpSlOutcome {
    NoPosition,
    /// Neither threshold reached
    Held { pnl_percent: f64 },
    Triggered(Position),
}

/// Executes orders for live instances through an exchange adapter
pub struct PositionManager {
    exchange: Arc<dyn ExchangeAdapter>,
    leverage: AtomicU32,
    order_timeout: Duration,
}

impl PositionManager {
    pub fn new(exchange: Arc<dyn ExchangeAdapter>, order_timeout: Duration) -> Self {
        Self {
            exchange,
            leverage: AtomicU32::new(DEFAULT_LEVERAGE),
            order_timeout,
        }
    }

    pub fn with_leverage(self, leverage: u32) -> Self {
        self.set_leverage(leverage);
        self
    }

    pub fn leverage(&self) -> u32 {
        self.leverage.load(Ordering::Relaxed)
    }

    /// Leverage for positions opened from now on
    pub fn set_leverage(&self, leverage: u32) {
        self.leverage.store(leverage.max(1), Ordering::Relaxed);
    }

    pub fn exchange(&self) -> &Arc<dyn ExchangeAdapter> {
        &self.exchange
    }

    /// Forward an observed market price to the venue
    pub fn update_mark(&self, symbol: &str, price: f64) {
        self.exchange.update_mark(symbol, price);
    }

    /// Act on a signal: open, reverse, or do nothing.
    ///
    /// When a reversal's close succeeds but the new open fails, the close is
    /// still published and the error is returned.
    pub async fn handle_signal(
        &self,
        handle: &dyn PositionHandle,
        signal: &Signal,
        current_price: f64,
    ) -> Result<SignalOutcome, OrderError> {
        let Some(side) = signal.side() else {
            return Ok(SignalOutcome::Ignored);
        };

        info!(
            instance = handle.id(),
            symbol = handle.symbol(),
            %side,
            price = signal.price,
            reason = %signal.reason,
            "📈 Signal received"
        );

        if !handle.config().trade_direction.allows(side) {
            info!(instance = handle.id(), %side, "signal filtered by trade direction");
            return Ok(SignalOutcome::Filtered);
        }

        let mut closed = None;
        if let Some(existing) = handle.position().filter(|p| p.is_open) {
            if existing.side == side {
                info!(instance = handle.id(), %side, "already positioned, ignoring signal");
                return Ok(SignalOutcome::AlreadyPositioned);
            }
            info!(
                instance = handle.id(),
                from = %existing.side,
                to = %side,
                "closing position before reversal"
            );
            closed = Some(
                self.close_on_venue(handle, existing, current_price, ExitReason::TrendReversal)
                    .await?,
            );
        }

        match self.open_on_venue(handle, side, signal, current_price).await {
            Ok(opened) => {
                handle.commit(Some(opened.clone()), closed.clone());
                Ok(match closed {
                    Some(closed) => SignalOutcome::Reversed { closed, opened },
                    None => SignalOutcome::Opened(opened),
                })
            }
            Err(e) => {
                if closed.is_some() {
                    handle.commit(None, closed);
                }
                Err(e)
            }
        }
    }

    /// Close the handle's open position at `price`
    pub async fn close_position(
        &self,
        handle: &dyn PositionHandle,
        price: f64,
        reason: ExitReason,
    ) -> Result<CloseOutcome, OrderError> {
        let Some(position) = handle.position().filter(|p| p.is_open) else {
            return Ok(CloseOutcome::NoPosition);
        };

        let closed = self.close_on_venue(handle, position, price, reason).await?;
        handle.commit(None, Some(closed.clone()));
        Ok(CloseOutcome::Closed(closed))
    }

    /// Close the open position when take-profit or stop-loss is reached.
    /// Take-profit is evaluated first.
    pub async fn check_tp_sl(
        &self,
        handle: &dyn PositionHandle,
        current_price: f64,
    ) -> Result<TpSlOutcome, OrderError> {
        let Some(mut position) = handle.position().filter(|p| p.is_open) else {
            return Ok(TpSlOutcome::NoPosition);
        };

        position.observe_price(current_price);
        let pnl_percent = position.unrealized_pnl_percent(current_price);
        let config = handle.config();

        let reason = if config.take_profit_percent > 0.0 && pnl_percent >= config.take_profit_percent
        {
            Some(ExitReason::TakeProfit)
        } else if config.stop_loss_percent > 0.0 && pnl_percent <= -config.stop_loss_percent {
            Some(ExitReason::StopLoss)
        } else {
            None
        };

        let Some(reason) = reason else {
            handle.commit(Some(position), None);
            return Ok(TpSlOutcome::Held { pnl_percent });
        };

        info!(
            instance = handle.id(),
            symbol = handle.symbol(),
            %reason,
            pnl_percent,
            "🎯 Exit threshold reached"
        );

        match self
            .close_on_venue(handle, position.clone(), current_price, reason)
            .await
        {
            Ok(closed) => {
                handle.commit(None, Some(closed.clone()));
                Ok(TpSlOutcome::Triggered(closed))
            }
            Err(e) => {
                // keep the refreshed excursions; the close is retried on the next check
                handle.commit(Some(position), None);
                Err(e)
            }
        }
    }

    async fn open_on_venue(
        &self,
        handle: &dyn PositionHandle,
        side: Side,
        signal: &Signal,
        current_price: f64,
    ) -> Result<Position, OrderError> {
        let size = handle.config().position_size;
        let leverage = self.leverage();

        let mut position = self
            .bounded(self.exchange.open_position(handle.symbol(), side, size, leverage))
            .await
            .map_err(|e| {
                error!(instance = handle.id(), symbol = handle.symbol(), error = %e, "failed to open position");
                e
            })?;

        if position.entry_price <= 0.0 {
            position.entry_price = current_price;
        }
        position.symbol = handle.symbol().to_string();
        position.side = side;
        position.size = size;
        position.leverage = leverage;
        position.entry_index = Some(signal.index);

        info!(
            instance = handle.id(),
            symbol = handle.symbol(),
            %side,
            size,
            entry = position.entry_price,
            leverage,
            "✅ Position opened"
        );
        Ok(position)
    }

    async fn close_on_venue(
        &self,
        handle: &dyn PositionHandle,
        mut position: Position,
        price: f64,
        reason: ExitReason,
    ) -> Result<Position, OrderError> {
        self.bounded(self.exchange.close_position(handle.symbol(), position.size))
            .await
            .map_err(|e| {
                warn!(instance = handle.id(), symbol = handle.symbol(), %reason, error = %e, "failed to close position");
                e
            })?;

        position.close(price, chrono::Utc::now().timestamp_millis(), None, reason);
        info!(
            instance = handle.id(),
            symbol = handle.symbol(),
            %reason,
            exit = price,
            pnl = position.pnl,
            pnl_percent = position.pnl_percent,
            "💰 Position closed"
        );
        Ok(position)
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, OrderError>>,
    ) -> Result<T, OrderError> {
        tokio::time::timeout(self.order_timeout, call)
            .await
            .unwrap_or(Err(OrderError::Timeout(self.order_timeout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::PaperExchange;
    use crate::portfolio::TradeDirection;
    use std::sync::Mutex;

    struct TestHandle {
        config: ExecutionConfig,
        book: Mutex<(Option<Position>, Vec<Position>)>,
        commits: Mutex<usize>,
    }

    impl TestHandle {
        fn new(config: ExecutionConfig) -> Self {
            Self {
                config,
                book: Mutex::new((None, Vec::new())),
                commits: Mutex::new(0),
            }
        }

        fn with_position(self, position: Position) -> Self {
            self.book.lock().unwrap().0 = Some(position);
            self
        }

        fn closed(&self) -> Vec<Position> {
            self.book.lock().unwrap().1.clone()
        }
    }

    impl PositionHandle for TestHandle {
        fn id(&self) -> &str {
            "test"
        }
        fn symbol(&self) -> &str {
            "BTC"
        }
        fn config(&self) -> &ExecutionConfig {
            &self.config
        }
        fn position(&self) -> Option<Position> {
            self.book.lock().unwrap().0.clone()
        }
        fn commit(&self, current: Option<Position>, closed: Option<Position>) {
            let mut book = self.book.lock().unwrap();
            book.0 = current;
            book.1.extend(closed);
            *self.commits.lock().unwrap() += 1;
        }
    }

    fn manager(venue: Arc<PaperExchange>) -> PositionManager {
        PositionManager::new(venue, Duration::from_secs(1))
    }

    fn long_at_100() -> Position {
        Position::open("p1", "BTC", Side::Long, 1.0, 100.0, 0)
    }

    fn tp_sl_config() -> ExecutionConfig {
        ExecutionConfig::default()
            .with_take_profit(5.0)
            .with_stop_loss(5.0)
    }

    #[tokio::test]
    async fn take_profit_fires_at_threshold() {
        let m = manager(Arc::new(PaperExchange::new(1_000.0)));
        let handle = TestHandle::new(tp_sl_config()).with_position(long_at_100());

        let outcome = m.check_tp_sl(&handle, 105.5).await.unwrap();
        let TpSlOutcome::Triggered(closed) = outcome else {
            panic!("expected take profit, got {outcome:?}");
        };
        assert_eq!(closed.exit_reason, Some(ExitReason::TakeProfit));
        assert!((closed.pnl_percent - 5.5).abs() < 1e-9);
        assert!(handle.position().is_none());
        assert_eq!(handle.closed().len(), 1);
    }

    #[tokio::test]
    async fn stop_loss_fires_at_threshold() {
        let m = manager(Arc::new(PaperExchange::new(1_000.0)));
        let handle = TestHandle::new(tp_sl_config()).with_position(long_at_100());

        let outcome = m.check_tp_sl(&handle, 94.0).await.unwrap();
        assert!(matches!(
            outcome,
            TpSlOutcome::Triggered(ref p) if p.exit_reason == Some(ExitReason::StopLoss)
        ));
    }

    #[tokio::test]
    async fn inside_band_holds_and_records_excursion() {
        let venue = Arc::new(PaperExchange::new(1_000.0));
        let m = manager(venue.clone());
        let handle = TestHandle::new(tp_sl_config()).with_position(long_at_100());

        let outcome = m.check_tp_sl(&handle, 102.0).await.unwrap();
        assert!(matches!(
            outcome,
            TpSlOutcome::Held { pnl_percent } if (pnl_percent - 2.0).abs() < 1e-9
        ));

        let position = handle.position().unwrap();
        assert!(position.is_open);
        assert!((position.max_profit_percent - 2.0).abs() < 1e-9);
        assert_eq!(venue.close_calls(), 0);
    }

    #[tokio::test]
    async fn zero_thresholds_never_fire() {
        let m = manager(Arc::new(PaperExchange::new(1_000.0)));
        let handle = TestHandle::new(ExecutionConfig::default()).with_position(long_at_100());
        assert!(matches!(
            m.check_tp_sl(&handle, 10.0).await.unwrap(),
            TpSlOutcome::Held { .. }
        ));
    }

    #[tokio::test]
    async fn failed_close_keeps_position_open() {
        let venue = Arc::new(PaperExchange::new(1_000.0));
        venue.set_mark_price("BTC", 100.0);
        venue.open_position("BTC", Side::Long, 1.0, 1).await.unwrap();
        venue.fail_next_closes(1);

        let m = manager(venue.clone());
        let handle = TestHandle::new(tp_sl_config()).with_position(long_at_100());

        assert!(m.check_tp_sl(&handle, 110.0).await.is_err());
        assert!(handle.position().unwrap().is_open);
        assert!(handle.closed().is_empty());

        // retried on the next evaluation
        assert!(matches!(
            m.check_tp_sl(&handle, 110.0).await.unwrap(),
            TpSlOutcome::Triggered(_)
        ));
    }

    #[tokio::test]
    async fn reversal_commits_once() {
        let venue = Arc::new(PaperExchange::new(1_000.0));
        venue.set_mark_price("BTC", 90.0);
        let m = manager(venue.clone());
        let handle = TestHandle::new(ExecutionConfig::default()).with_position(long_at_100());

        let signal = Signal::short(7, 90.0, 0, "Trend Reversal");
        let outcome = m.handle_signal(&handle, &signal, 90.0).await.unwrap();

        let SignalOutcome::Reversed { closed, opened } = outcome else {
            panic!("expected reversal, got {outcome:?}");
        };
        assert_eq!(closed.exit_reason, Some(ExitReason::TrendReversal));
        assert_eq!(opened.side, Side::Short);
        assert_eq!(opened.entry_index, Some(7));
        assert_eq!(opened.leverage, DEFAULT_LEVERAGE);
        assert_eq!(*handle.commits.lock().unwrap(), 1);
        assert_eq!(handle.position().unwrap().side, Side::Short);
    }

    #[tokio::test]
    async fn reversal_with_failed_open_publishes_the_close() {
        let venue = Arc::new(PaperExchange::new(1_000.0));
        venue.set_mark_price("BTC", 100.0);
        venue.open_position("BTC", Side::Long, 1.0, 1).await.unwrap();
        venue.set_mark_price("BTC", 95.0);
        venue.fail_next_opens(1);

        let m = manager(venue.clone());
        let handle = TestHandle::new(ExecutionConfig::default()).with_position(long_at_100());
        let signal = Signal::short(4, 95.0, 0, "Trend Reversal");

        let result = m.handle_signal(&handle, &signal, 95.0).await;
        assert!(matches!(result, Err(OrderError::Rejected(_))));

        assert!(handle.position().is_none());
        let closed = handle.closed();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].exit_reason, Some(ExitReason::TrendReversal));
        assert_eq!(closed[0].exit_price, Some(95.0));
        assert_eq!(*handle.commits.lock().unwrap(), 1);
        assert!(!venue.has_position("BTC"));
    }

    #[tokio::test]
    async fn same_side_and_filtered_signals_do_nothing() {
        let venue = Arc::new(PaperExchange::new(1_000.0));
        let m = manager(venue.clone());

        let handle = TestHandle::new(ExecutionConfig::default()).with_position(long_at_100());
        let signal = Signal::long(3, 101.0, 0, "Trend Reversal");
        assert_eq!(
            m.handle_signal(&handle, &signal, 101.0).await.unwrap(),
            SignalOutcome::AlreadyPositioned
        );

        let long_only = TestHandle::new(ExecutionConfig::new(1.0, TradeDirection::Long));
        let signal = Signal::short(3, 101.0, 0, "Trend Reversal");
        assert_eq!(
            m.handle_signal(&long_only, &signal, 101.0).await.unwrap(),
            SignalOutcome::Filtered
        );
        assert_eq!(venue.open_calls(), 0);
    }

    #[tokio::test]
    async fn zero_fill_price_falls_back_to_current() {
        // no mark price set: the paper venue reports a zero fill
        let m = manager(Arc::new(PaperExchange::new(1_000.0)));
        let handle = TestHandle::new(ExecutionConfig::default());
        let signal = Signal::long(0, 42.0, 0, "Trend Reversal");

        let outcome = m.handle_signal(&handle, &signal, 42.5).await.unwrap();
        assert!(matches!(outcome, SignalOutcome::Opened(ref p) if p.entry_price == 42.5));
    }

    #[tokio::test]
    async fn slow_venue_times_out() {
        let venue = Arc::new(PaperExchange::new(1_000.0));
        venue.set_latency(Duration::from_millis(200));
        let m = PositionManager::new(venue, Duration::from_millis(20));
        let handle = TestHandle::new(ExecutionConfig::default());
        let signal = Signal::long(0, 1.0, 0, "Trend Reversal");

        assert!(matches!(
            m.handle_signal(&handle, &signal, 1.0).await,
            Err(OrderError::Timeout(_))
        ));
        assert!(handle.position().is_none());
    }
}
