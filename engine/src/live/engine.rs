//! Live strategy engine
//!
//! Runs any number of strategy instances concurrently, one tokio task per
//! instance. The instance table is the only shared structure; it is guarded
//! by an async reader/writer lock that is never held across exchange I/O.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::data::{normalize, poll_period, require_interval, Candle, CandleSource};
use crate::error::EngineError;
use crate::live::{EngineSettings, InstanceState, LiveStrategy, RunningStrategyInfo};
use crate::portfolio::{
    CloseOutcome, ExecutionConfig, ExitReason, Position, PositionHandle, PositionManager,
    SignalOutcome, TpSlOutcome,
};
use crate::strategy::{Params, Strategy, StrategyRegistry};
use crate::Result;

struct Slot {
    instance: Arc<LiveStrategy>,
    task: Option<JoinHandle<()>>,
    /// A stop is closing this instance's position
    closing: bool,
}

/// Concurrent runner for live strategy instances
pub struct LiveEngine {
    registry: Arc<StrategyRegistry>,
    source: Arc<dyn CandleSource>,
    positions: Arc<PositionManager>,
    settings: EngineSettings,
    instances: RwLock<HashMap<String, Slot>>,
}

impl LiveEngine {
    pub fn new(
        registry: Arc<StrategyRegistry>,
        source: Arc<dyn CandleSource>,
        positions: Arc<PositionManager>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            registry,
            source,
            positions,
            settings,
            instances: RwLock::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn positions(&self) -> &Arc<PositionManager> {
        &self.positions
    }

    /// Start a strategy instance under `id`.
    ///
    /// Everything that can fail is checked before the instance is
    /// registered, so a failed start leaves no trace.
    pub async fn start_strategy(
        &self,
        id: &str,
        strategy_id: &str,
        symbol: &str,
        interval: &str,
        params: &Params,
        config: ExecutionConfig,
    ) -> Result<RunningStrategyInfo> {
        if id.trim().is_empty() {
            return Err(EngineError::invalid_parameter("id", "must not be empty"));
        }
        if symbol.trim().is_empty() {
            return Err(EngineError::invalid_parameter("symbol", "must not be empty"));
        }
        require_interval(interval)?;
        let period = match self.settings.poll_interval {
            Some(period) => period,
            None => poll_period(interval)?,
        };
        config.validate()?;

        let mut strategy = self.registry.get(strategy_id)?;
        strategy.validate_params(params)?;
        strategy.initialize(params)?;

        let instance = Arc::new(LiveStrategy::new(
            id,
            strategy.metadata(),
            symbol,
            interval,
            config,
        ));

        let mut instances = self.instances.write().await;
        if instances.contains_key(id) {
            warn!(instance = id, "strategy instance already running");
            return Err(EngineError::AlreadyRunning(id.to_string()));
        }

        info!(
            instance = id,
            strategy_id,
            symbol,
            interval,
            poll_ms = period.as_millis() as u64,
            "🚀 Starting strategy instance"
        );

        let task = InstanceTask {
            instance: Arc::clone(&instance),
            strategy,
            source: Arc::clone(&self.source),
            positions: Arc::clone(&self.positions),
            warmup_candles: self.settings.warmup_candles,
            poll_candles: self.settings.poll_candles,
            fetch_timeout: self.settings.fetch_timeout,
            period,
        };
        let handle = tokio::spawn(task.run());
        instances.insert(
            id.to_string(),
            Slot {
                instance: Arc::clone(&instance),
                task: Some(handle),
                closing: false,
            },
        );
        drop(instances);

        Ok(instance.info())
    }

    /// Stop an instance and close its open position with "Strategy Stopped".
    ///
    /// The instance keeps its id in the table until the close succeeds, so
    /// the id cannot be reused meanwhile. If the close fails the instance
    /// stays listed, not running, with the position still open, and a later
    /// stop retries the close.
    pub async fn stop_strategy(&self, id: &str) -> Result<CloseOutcome> {
        let (instance, task) = {
            let mut instances = self.instances.write().await;
            let slot = instances
                .get_mut(id)
                .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
            if slot.closing {
                return Err(EngineError::Stopping(id.to_string()));
            }
            slot.closing = true;
            slot.instance.set_state(InstanceState::Stopping);
            slot.instance.stop_signal().trigger();
            (Arc::clone(&slot.instance), slot.task.take())
        };
        info!(instance = id, "🛑 Stopping strategy instance");

        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(instance = id, error = %e, "strategy task ended abnormally");
            }
        }

        let price = instance
            .last_price()
            .or_else(|| instance.position().map(|p| p.entry_price))
            .unwrap_or_default();

        let closed = self
            .positions
            .close_position(&*instance, price, ExitReason::StrategyStopped)
            .await;

        let mut instances = self.instances.write().await;
        match closed {
            Ok(outcome) => {
                instances.remove(id);
                drop(instances);
                instance.set_state(InstanceState::Stopped);
                info!(instance = id, "✅ Strategy instance stopped");
                Ok(outcome)
            }
            Err(e) => {
                if let Some(slot) = instances.get_mut(id) {
                    slot.closing = false;
                }
                error!(instance = id, error = %e, "failed to close position on stop, keeping instance");
                Err(e.into())
            }
        }
    }

    /// Stop every instance; returns how many were stopped cleanly
    pub async fn stop_all(&self) -> usize {
        let ids: Vec<String> = self.instances.read().await.keys().cloned().collect();
        let mut stopped = 0;
        for id in ids {
            match self.stop_strategy(&id).await {
                Ok(_) => stopped += 1,
                Err(EngineError::NotFound(_)) => {
                    debug!(instance = %id, "instance already gone");
                }
                Err(EngineError::Stopping(_)) => {
                    debug!(instance = %id, "instance already being stopped");
                }
                Err(e) => error!(instance = %id, error = %e, "failed to stop instance"),
            }
        }
        stopped
    }

    /// Snapshot of all instances, ordered by id
    pub async fn running_strategies(&self) -> Vec<RunningStrategyInfo> {
        let mut infos: Vec<RunningStrategyInfo> = {
            let instances = self.instances.read().await;
            instances.values().map(|slot| slot.instance.info()).collect()
        };
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    pub async fn strategy_info(&self, id: &str) -> Result<RunningStrategyInfo> {
        let instances = self.instances.read().await;
        instances
            .get(id)
            .map(|slot| slot.instance.info())
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    /// Closed positions of an instance, in close order
    pub async fn closed_positions(&self, id: &str) -> Result<Vec<Position>> {
        let instances = self.instances.read().await;
        instances
            .get(id)
            .map(|slot| slot.instance.closed_positions())
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    pub async fn is_running(&self, id: &str) -> bool {
        let instances = self.instances.read().await;
        instances.get(id).is_some_and(|slot| slot.instance.is_running())
    }

    pub async fn len(&self) -> usize {
        self.instances.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Drop for LiveEngine {
    fn drop(&mut self) {
        for (id, slot) in self.instances.get_mut().drain() {
            slot.instance.stop_signal().trigger();
            if slot.instance.position().is_some_and(|p| p.is_open) {
                warn!(instance = %id, "engine dropped with an open position");
            }
        }
    }
}

/// Everything one instance's polling loop owns
struct InstanceTask {
    instance: Arc<LiveStrategy>,
    strategy: Box<dyn Strategy>,
    source: Arc<dyn CandleSource>,
    positions: Arc<PositionManager>,
    warmup_candles: usize,
    poll_candles: usize,
    fetch_timeout: Duration,
    period: Duration,
}

impl InstanceTask {
    async fn run(self) {
        let id = self.instance.id().to_string();
        self.instance.mark_running();
        info!(instance = %id, "▶️ Strategy instance running");

        let mut warmed = self.warm_up().await;

        let mut timer = tokio::time::interval(self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer.tick().await; // first tick completes immediately

        loop {
            tokio::select! {
                biased;
                _ = self.instance.stop_signal().stopped() => break,
                _ = timer.tick() => {}
            }

            if !warmed {
                warmed = self.warm_up().await;
                continue;
            }
            self.poll().await;
        }

        debug!(instance = %id, "polling loop exited");
    }

    /// Initial history fetch; the newest candle is treated as already seen
    async fn warm_up(&self) -> bool {
        let Some(candles) = self.fetch(self.warmup_candles).await else {
            return false;
        };
        let Some(last) = candles.last() else {
            return false;
        };

        self.observe_price(last.close_price());
        self.instance.advance_candle(last.open_time);
        self.instance
            .set_visualization(self.strategy.analyze(&candles).visualization);

        info!(
            instance = self.instance.id(),
            candles = candles.len(),
            last_candle = last.open_time,
            "📥 Warm-up candles loaded"
        );
        true
    }

    async fn poll(&self) {
        let Some(candles) = self.fetch(self.poll_candles).await else {
            return;
        };
        let Some(last) = candles.last() else {
            return;
        };
        let price = last.close_price();
        self.observe_price(price);

        if !self.instance.advance_candle(last.open_time) {
            self.check_exits(price).await;
            return;
        }

        let analysis = self.strategy.analyze(&candles);
        let trend = analysis
            .visualization
            .as_ref()
            .and_then(|v| v.current_side());
        self.instance.set_visualization(analysis.visualization);

        let last_index = candles.len() - 1;
        let fresh = analysis
            .signals
            .iter()
            .rev()
            .find(|s| s.index == last_index && s.signal_type.is_actionable());

        let Some(signal) = fresh else {
            debug!(
                instance = self.instance.id(),
                trend = ?trend,
                price,
                "no signal on the new candle"
            );
            return;
        };

        if self.instance.stop_signal().is_triggered() {
            return;
        }

        match self.positions.handle_signal(&*self.instance, signal, price).await {
            Ok(SignalOutcome::Opened(p)) | Ok(SignalOutcome::Reversed { opened: p, .. }) => {
                debug!(instance = self.instance.id(), side = %p.side, "position updated from signal");
            }
            Ok(outcome) => {
                debug!(instance = self.instance.id(), ?outcome, "signal left position unchanged");
            }
            Err(e) => {
                error!(instance = self.instance.id(), error = %e, "❌ Signal execution failed");
            }
        }
    }

    /// Remember the latest close and let the venue mark to it
    fn observe_price(&self, price: f64) {
        self.instance.record_price(price);
        self.positions.update_mark(self.instance.symbol(), price);
    }

    async fn check_exits(&self, price: f64) {
        match self.positions.check_tp_sl(&*self.instance, price).await {
            Ok(TpSlOutcome::Triggered(p)) => {
                debug!(instance = self.instance.id(), reason = ?p.exit_reason, "exit threshold closed position");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(instance = self.instance.id(), error = %e, "exit close failed, retrying next tick");
            }
        }
    }

    /// Fetch the newest candles, giving up early when the instance stops
    async fn fetch(&self, limit: usize) -> Option<Vec<Candle>> {
        let symbol = self.instance.symbol();
        let interval = self.instance.interval();
        let request = tokio::time::timeout(
            self.fetch_timeout,
            self.source.fetch_candles(symbol, interval, limit),
        );

        let result = tokio::select! {
            biased;
            _ = self.instance.stop_signal().stopped() => return None,
            result = request => result,
        };

        match result {
            Ok(Ok(mut candles)) => {
                normalize(&mut candles);
                if candles.is_empty() {
                    warn!(instance = self.instance.id(), symbol, interval, "candle source returned nothing");
                    return None;
                }
                Some(candles)
            }
            Ok(Err(e)) => {
                warn!(instance = self.instance.id(), symbol, interval, error = %e, "⚠️ Candle fetch failed, retrying next tick");
                None
            }
            Err(_) => {
                warn!(
                    instance = self.instance.id(),
                    symbol,
                    interval,
                    timeout_ms = self.fetch_timeout.as_millis() as u64,
                    "⚠️ Candle fetch timed out, retrying next tick"
                );
                None
            }
        }
    }
}
