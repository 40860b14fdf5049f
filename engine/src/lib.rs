//! Terminal engine: pluggable trading strategies over a stream of price candles
//!
//! The same strategy contract drives two execution paths:
//! - **Backtesting**: a deterministic replay of a strategy's signals into a
//!   position ledger with performance metrics.
//! - **Live trading**: independent polling tasks, one per running strategy
//!   instance, that open and close positions through an exchange adapter.
//!
//! # Modules
//!
//! - **data**: candles, candle sources and interval arithmetic
//! - **indicators**: weighted and Hull moving averages
//! - **strategy**: strategy contract, parameter definitions, registry and built-in strategies
//! - **backtest**: the simulator, metrics and text reports
//! - **portfolio**: position model and the live position manager
//! - **exchange**: exchange adapter contract and the in-memory paper venue
//! - **live**: the concurrent live-strategy engine
//! - **terminal**: entry points consumed by a UI or transport layer
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use terminal_engine::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let source = Arc::new(MemoryCandleSource::new());
//!     let exchange = Arc::new(PaperExchange::new(1_000.0));
//!     let terminal = Terminal::new(
//!         Arc::new(StrategyRegistry::with_builtins()),
//!         source,
//!         exchange,
//!         EngineSettings::default(),
//!     );
//!     let result = terminal
//!         .run_backtest("max-trend", "BTC", "1h", 500, &Params::new(), &ExecutionConfig::default())
//!         .await?;
//!     println!("{}", BacktestReport::new(result).format());
//!     Ok(())
//! }
//! ```

pub mod backtest;
pub mod data;
pub mod error;
pub mod exchange;
pub mod indicators;
pub mod live;
pub mod portfolio;
pub mod strategy;
pub mod terminal;

// Re-export commonly used types
pub mod prelude {
    pub use crate::backtest::{BacktestReport, BacktestResult, Backtester, Metrics};
    pub use crate::data::{
        interval_duration, normalize, Candle, CandleSource, HyperliquidCandleSource,
        MemoryCandleSource, SUPPORTED_INTERVALS,
    };
    pub use crate::error::{EngineError, FetchError, OrderError, Result};
    pub use crate::exchange::{ActivePosition, ExchangeAdapter, PaperExchange, PortfolioSummary};
    pub use crate::live::{EngineSettings, InstanceState, LiveEngine, RunningStrategyInfo};
    pub use crate::portfolio::{
        CloseOutcome, ExecutionConfig, ExitReason, Position, PositionManager, Side,
        SignalOutcome, TpSlOutcome, TradeDirection,
    };
    pub use crate::strategy::{
        Analysis, MaxTrendStrategy, ParameterDef, Params, Signal, SignalType, Strategy,
        StrategyMetadata, StrategyRegistry, Visualization,
    };
    pub use crate::terminal::Terminal;
}

pub use error::{EngineError, FetchError, OrderError, Result};
