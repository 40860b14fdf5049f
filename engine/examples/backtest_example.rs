//! Example: Backtesting the Max Trend strategy on synthetic candles
//!
//! Pass `--live` to pull real candles from the configured Hyperliquid endpoint
//! instead.

use std::sync::Arc;

use serde_json::json;
use terminal_engine::backtest::BacktestReport;
use terminal_engine::data::{Candle, MemoryCandleSource};
use terminal_engine::exchange::PaperExchange;
use terminal_engine::live::EngineSettings;
use terminal_engine::portfolio::{ExecutionConfig, TradeDirection};
use terminal_engine::strategy::StrategyRegistry;
use terminal_engine::terminal::Terminal;

fn create_test_candles(count: usize, base_price: f64) -> Vec<Candle> {
    let hour = 3_600_000;
    (0..count)
        .map(|i| {
            // slow swing plus a drift that turns halfway through
            let swing = 15.0 * (i as f64 * std::f64::consts::TAU / 90.0).sin();
            let drift = if i < count / 2 { i as f64 * 0.05 } else { (count - i) as f64 * 0.05 };
            let close = base_price + swing + drift;
            let t = i as i64 * hour;
            Candle::new(t, t + hour - 1, close, close + 1.5, close - 1.5, close, 1_000.0)
                .with_market("BTC", "1h")
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    shared::init_tracing();

    println!("=== Terminal Engine Backtest Example ===\n");

    let terminal = if std::env::args().any(|arg| arg == "--live") {
        let config = shared::Config::from_env()?;
        println!("Fetching candles from {}...", config.api_url);
        Terminal::paper(&config)?
    } else {
        println!("Creating synthetic candle data...");
        let source = Arc::new(MemoryCandleSource::new());
        source.insert("BTC", "1h", create_test_candles(600, 100.0));
        Terminal::new(
            Arc::new(StrategyRegistry::with_builtins()),
            source,
            Arc::new(PaperExchange::new(10_000.0)),
            EngineSettings::default(),
        )
    };

    for strategy in terminal.available_strategies() {
        println!("Strategy: {} v{} ({})", strategy.name, strategy.version, strategy.id);
        for param in &strategy.parameters {
            println!("  - {} (default {})", param.label, param.default_value);
        }
    }

    let params = json!({"factor": 1.5}).as_object().cloned().unwrap_or_default();
    let config = ExecutionConfig::new(1.0, TradeDirection::Both);

    println!("\nRunning backtest...");
    let result = terminal
        .run_backtest("max-trend", "BTC", "1h", 600, &params, &config)
        .await?;

    println!("{}", BacktestReport::new(result).format());

    Ok(())
}
