//! Entry points for a UI or transport layer
//!
//! [`Terminal`] wires the registry, a candle source, an exchange adapter and
//! the live engine together and exposes the operations a front end calls.

use std::sync::Arc;
use std::time::Duration;

use shared::Config;
use tracing::{debug, info};

use crate::backtest::{BacktestResult, Backtester};
use crate::data::{normalize, require_interval, Candle, CandleSource, HyperliquidCandleSource};
use crate::error::{EngineError, FetchError};
use crate::exchange::{ActivePosition, ExchangeAdapter, PaperExchange, PortfolioSummary};
use crate::live::{EngineSettings, LiveEngine, RunningStrategyInfo};
use crate::portfolio::{CloseOutcome, ExecutionConfig, PositionManager};
use crate::strategy::{ParameterDef, Params, StrategyMetadata, StrategyRegistry};
use crate::Result;

pub struct Terminal {
    registry: Arc<StrategyRegistry>,
    source: Arc<dyn CandleSource>,
    exchange: Arc<dyn ExchangeAdapter>,
    engine: LiveEngine,
    backtester: Backtester,
    fetch_timeout: Duration,
}

impl Terminal {
    pub fn new(
        registry: Arc<StrategyRegistry>,
        source: Arc<dyn CandleSource>,
        exchange: Arc<dyn ExchangeAdapter>,
        settings: EngineSettings,
    ) -> Self {
        let positions = Arc::new(
            PositionManager::new(Arc::clone(&exchange), settings.order_timeout)
                .with_leverage(settings.leverage),
        );
        let fetch_timeout = settings.fetch_timeout;
        let engine = LiveEngine::new(
            Arc::clone(&registry),
            Arc::clone(&source),
            positions,
            settings,
        );

        Self {
            registry,
            source,
            exchange,
            engine,
            backtester: Backtester::new(),
            fetch_timeout,
        }
    }

    /// Hyperliquid market data with a paper venue for orders
    pub fn paper(config: &Config) -> Result<Self> {
        let settings = EngineSettings::from(config);
        let source = HyperliquidCandleSource::new(config.api_url.clone(), settings.fetch_timeout)?;
        let exchange = PaperExchange::new(config.paper_balance)
            .with_address(config.wallet_address.clone())
            .with_slippage_bps(config.paper_slippage_bps);

        info!(
            api_url = %config.api_url,
            wallet = %config.wallet_address,
            balance = config.paper_balance,
            "🔧 Paper terminal configured"
        );

        Ok(Self::new(
            Arc::new(StrategyRegistry::with_builtins()),
            Arc::new(source),
            Arc::new(exchange),
            settings,
        ))
    }

    pub fn registry(&self) -> &Arc<StrategyRegistry> {
        &self.registry
    }

    pub fn engine(&self) -> &LiveEngine {
        &self.engine
    }

    pub fn available_strategies(&self) -> Vec<StrategyMetadata> {
        self.registry.list()
    }

    pub fn strategy_params(&self, strategy_id: &str) -> Result<Vec<ParameterDef>> {
        Ok(self.registry.metadata(strategy_id)?.parameters)
    }

    pub async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        require_interval(interval)?;
        let request = self.source.fetch_candles(symbol, interval, limit);
        self.bounded_fetch(symbol, interval, request).await
    }

    /// Candles that opened strictly before `before` (ms), for paging back through history
    pub async fn fetch_candles_before(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
        before: i64,
    ) -> Result<Vec<Candle>> {
        require_interval(interval)?;
        let request = self
            .source
            .fetch_candles_before(symbol, interval, limit, before);
        self.bounded_fetch(symbol, interval, request).await
    }

    /// Backtest a registered strategy over the most recent `limit` candles
    pub async fn run_backtest(
        &self,
        strategy_id: &str,
        symbol: &str,
        interval: &str,
        limit: usize,
        params: &Params,
        config: &ExecutionConfig,
    ) -> Result<BacktestResult> {
        if limit == 0 {
            return Err(EngineError::invalid_parameter("limit", "must be positive"));
        }
        config.validate()?;

        let mut strategy = self.registry.get(strategy_id)?;
        strategy.validate_params(params)?;
        strategy.initialize(params)?;

        let candles = self.fetch_candles(symbol, interval, limit).await?;
        if candles.len() < strategy.warmup_candles() {
            debug!(
                strategy_id,
                required = strategy.warmup_candles(),
                actual = candles.len(),
                "not enough candles for signals"
            );
        }

        info!(strategy_id, symbol, interval, candles = candles.len(), "📊 Running backtest");
        Ok(self
            .backtester
            .run_strategy(strategy.as_ref(), symbol, &candles, config))
    }

    pub async fn start_strategy(
        &self,
        id: &str,
        strategy_id: &str,
        symbol: &str,
        interval: &str,
        params: &Params,
        config: ExecutionConfig,
    ) -> Result<RunningStrategyInfo> {
        self.engine
            .start_strategy(id, strategy_id, symbol, interval, params, config)
            .await
    }

    pub async fn stop_strategy(&self, id: &str) -> Result<CloseOutcome> {
        self.engine.stop_strategy(id).await
    }

    pub async fn running_strategies(&self) -> Vec<RunningStrategyInfo> {
        self.engine.running_strategies().await
    }

    pub fn wallet_address(&self) -> String {
        self.exchange.address()
    }

    pub async fn portfolio_summary(&self) -> Result<PortfolioSummary> {
        Ok(self.exchange.portfolio().await?)
    }

    pub async fn active_positions(&self) -> Result<Vec<ActivePosition>> {
        Ok(self.exchange.positions().await?)
    }

    /// Stop every running strategy
    pub async fn shutdown(&self) -> usize {
        let stopped = self.engine.stop_all().await;
        info!(stopped, "👋 Terminal shut down");
        stopped
    }

    async fn bounded_fetch(
        &self,
        symbol: &str,
        interval: &str,
        request: impl std::future::Future<Output = std::result::Result<Vec<Candle>, FetchError>>,
    ) -> Result<Vec<Candle>> {
        let mut candles = tokio::time::timeout(self.fetch_timeout, request)
            .await
            .map_err(|_| FetchError::Timeout {
                symbol: symbol.to_string(),
                interval: interval.to_string(),
                timeout: self.fetch_timeout,
            })??;
        normalize(&mut candles);
        Ok(candles)
    }
}
