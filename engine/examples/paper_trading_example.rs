//! Example: Running a live strategy instance against the paper venue
//!
//! Candles come from the configured Hyperliquid endpoint; orders only touch
//! the in-memory paper exchange. Stops after `RUN_SECS` seconds (default 60)
//! or on Ctrl-C, closing any open position.

use std::time::Duration;

use terminal_engine::portfolio::ExecutionConfig;
use terminal_engine::strategy::Params;
use terminal_engine::terminal::Terminal;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    shared::init_tracing();

    let config = shared::Config::from_env()?;
    let run_secs: u64 = std::env::var("RUN_SECS")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(60);

    let terminal = Terminal::paper(&config)?;
    info!(wallet = %terminal.wallet_address(), "paper terminal ready");

    let execution = ExecutionConfig::default()
        .with_take_profit(3.0)
        .with_stop_loss(2.0);
    let started = terminal
        .start_strategy("btc-trend", "max-trend", "BTC", "1m", &Params::new(), execution)
        .await?;
    info!(id = %started.id, strategy = %started.strategy_name, "strategy started");

    let mut status = tokio::time::interval(Duration::from_secs(15));
    let deadline = tokio::time::sleep(Duration::from_secs(run_secs));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => break,
            _ = status.tick() => {
                for instance in terminal.running_strategies().await {
                    info!(
                        id = %instance.id,
                        has_position = instance.has_position,
                        side = ?instance.position_side,
                        closed_trades = instance.closed_trades,
                        realized_pnl = instance.realized_pnl,
                        "status"
                    );
                }
            }
        }
    }

    terminal.shutdown().await;
    let portfolio = terminal.portfolio_summary().await?;
    println!("Final account value: {}", portfolio.balance.account_value);

    Ok(())
}
