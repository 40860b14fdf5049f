//! Live engine tests driven by an in-memory candle source and the paper venue

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use terminal_engine::data::{Candle, MemoryCandleSource};
use terminal_engine::exchange::{ExchangeAdapter, PaperExchange};
use terminal_engine::live::{EngineSettings, InstanceState, LiveEngine, RunningStrategyInfo};
use terminal_engine::portfolio::{CloseOutcome, ExecutionConfig, ExitReason, PositionManager, Side};
use terminal_engine::strategy::{
    Params, Signal, Strategy, StrategyMetadata, StrategyRegistry, Visualization,
};
use terminal_engine::{EngineError, OrderError, Result};

const MINUTE: i64 = 60_000;

/// Goes long on every rising close and short on every falling one
struct StepStrategy;

impl Strategy for StepStrategy {
    fn metadata(&self) -> StrategyMetadata {
        StrategyMetadata {
            id: "step".to_string(),
            name: "Step".to_string(),
            version: "0.1".to_string(),
            description: "Follows the last close-to-close move".to_string(),
            parameters: Vec::new(),
        }
    }

    fn initialize(&mut self, _params: &Params) -> Result<()> {
        Ok(())
    }

    fn warmup_candles(&self) -> usize {
        2
    }

    fn generate_signals(&self, candles: &[Candle]) -> Vec<Signal> {
        candles
            .windows(2)
            .enumerate()
            .filter_map(|(i, pair)| {
                let (prev, next) = (pair[0].close_price(), pair[1].close_price());
                let index = i + 1;
                let time = pair[1].open_time;
                if next > prev {
                    Some(Signal::long(index, next, time, "Step Up"))
                } else if next < prev {
                    Some(Signal::short(index, next, time, "Step Down"))
                } else {
                    None
                }
            })
            .collect()
    }

    fn visualization(&self, _candles: &[Candle]) -> Option<Visualization> {
        None
    }
}

fn candle(minute: i64, close: f64) -> Candle {
    let t = minute * MINUTE;
    Candle::new(t, t + MINUTE - 1, close, close, close, close, 1.0)
}

struct Harness {
    engine: Arc<LiveEngine>,
    source: Arc<MemoryCandleSource>,
    venue: Arc<PaperExchange>,
}

fn harness() -> Harness {
    let registry = Arc::new(StrategyRegistry::with_builtins());
    registry.register("step", || Box::new(StepStrategy));

    let source = Arc::new(MemoryCandleSource::new());
    source.insert("BTC", "1m", vec![candle(0, 100.0), candle(1, 100.0)]);

    let venue = Arc::new(PaperExchange::new(10_000.0));
    let settings = EngineSettings {
        warmup_candles: 10,
        poll_candles: 10,
        poll_interval: Some(Duration::from_millis(10)),
        fetch_timeout: Duration::from_secs(1),
        order_timeout: Duration::from_secs(1),
        ..EngineSettings::default()
    };
    let positions = Arc::new(PositionManager::new(venue.clone(), settings.order_timeout));
    let engine = Arc::new(LiveEngine::new(registry, source.clone(), positions, settings));

    Harness {
        engine,
        source,
        venue,
    }
}

/// Poll an instance's snapshot until `check` passes or about three seconds elapse
async fn wait_until(
    engine: &LiveEngine,
    id: &str,
    check: impl Fn(&RunningStrategyInfo) -> bool,
) -> bool {
    for _ in 0..300 {
        if engine.strategy_info(id).await.is_ok_and(|info| check(&info)) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

impl Harness {
    async fn start(&self, id: &str, config: ExecutionConfig) {
        self.engine
            .start_strategy(id, "step", "BTC", "1m", &Params::new(), config)
            .await
            .unwrap();
        let warmed =
            wait_until(&self.engine, id, |info| info.last_candle_time == Some(MINUTE)).await;
        assert!(warmed, "instance never finished warm-up");
    }

    /// Push a rising candle and wait for the long to open
    async fn open_long(&self, id: &str) {
        self.venue.set_mark_price("BTC", 105.0);
        self.source.push("BTC", "1m", candle(2, 105.0));
        let opened = wait_until(&self.engine, id, |info| info.has_position).await;
        assert!(opened, "signal never opened a position");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fresh_signal_opens_and_reverses() {
    let h = harness();
    h.start("s1", ExecutionConfig::default()).await;
    h.open_long("s1").await;

    let info = h.engine.strategy_info("s1").await.unwrap();
    assert_eq!(info.position_side, Some(Side::Long));
    assert_eq!(info.entry_price, Some(105.0));
    assert_eq!(info.state, InstanceState::Running);

    h.venue.set_mark_price("BTC", 99.0);
    h.source.push("BTC", "1m", candle(3, 99.0));
    let reversed =
        wait_until(&h.engine, "s1", |info| info.position_side == Some(Side::Short)).await;
    assert!(reversed);

    let closed = h.engine.closed_positions("s1").await.unwrap();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].exit_reason, Some(ExitReason::TrendReversal));

    h.engine.stop_all().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn take_profit_fires_between_candles() {
    let h = harness();
    h.start("tp", ExecutionConfig::default().with_take_profit(5.0)).await;
    h.open_long("tp").await;

    // same open time: an intra-candle price update, not a new candle
    h.venue.set_mark_price("BTC", 111.0);
    h.source.push("BTC", "1m", candle(2, 111.0));

    let closed = wait_until(&h.engine, "tp", |info| info.closed_trades == 1).await;
    assert!(closed);

    let ledger = h.engine.closed_positions("tp").await.unwrap();
    assert_eq!(ledger[0].exit_reason, Some(ExitReason::TakeProfit));
    assert_eq!(ledger[0].exit_price, Some(111.0));
    assert!(!h.engine.strategy_info("tp").await.unwrap().has_position);
    assert!(!h.venue.has_position("BTC"));

    h.engine.stop_all().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_closes_open_position() {
    let h = harness();
    h.start("stop", ExecutionConfig::default()).await;
    h.open_long("stop").await;

    let outcome = h.engine.stop_strategy("stop").await.unwrap();
    let CloseOutcome::Closed(position) = outcome else {
        panic!("expected a close, got {outcome:?}");
    };
    assert_eq!(position.exit_reason, Some(ExitReason::StrategyStopped));
    assert_eq!(position.exit_price, Some(105.0));
    assert!(h.engine.is_empty().await);
    assert!(!h.venue.has_position("BTC"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_close_on_stop_keeps_position_visible() {
    let h = harness();
    h.start("sticky", ExecutionConfig::default()).await;
    h.open_long("sticky").await;

    h.venue.fail_next_closes(1);
    let err = h.engine.stop_strategy("sticky").await.unwrap_err();
    assert!(matches!(err, EngineError::Order(OrderError::Rejected(_))));

    let snapshot = h.engine.running_strategies().await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, "sticky");
    assert!(snapshot[0].has_position);
    assert!(!snapshot[0].is_running);

    // a second stop retries the close
    assert!(matches!(
        h.engine.stop_strategy("sticky").await.unwrap(),
        CloseOutcome::Closed(_)
    ));
    assert!(h.engine.is_empty().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn venue_books_follow_polled_prices() {
    let h = harness();
    h.start("books", ExecutionConfig::default()).await;

    // no manual marks: the venue only sees what the instance polls
    h.source.push("BTC", "1m", candle(2, 105.0));
    assert!(wait_until(&h.engine, "books", |info| info.has_position).await);
    assert_eq!(h.engine.strategy_info("books").await.unwrap().entry_price, Some(105.0));

    h.source.push("BTC", "1m", candle(3, 99.0));
    let reversed =
        wait_until(&h.engine, "books", |info| info.position_side == Some(Side::Short)).await;
    assert!(reversed);

    let mut realized: f64 = h
        .engine
        .closed_positions("books")
        .await
        .unwrap()
        .iter()
        .map(|p| p.pnl)
        .sum();
    if let CloseOutcome::Closed(p) = h.engine.stop_strategy("books").await.unwrap() {
        realized += p.pnl;
    }
    assert!((realized + 6.0).abs() < 1e-9, "realized {realized}");

    let balance = h.venue.balance().await.unwrap();
    assert!((balance - (10_000.0 + realized)).abs() < 1e-9, "balance {balance}");

    let orders = h.venue.orders();
    assert_eq!(orders.len(), 4);
    assert!(orders.iter().all(|o| o.avg_fill_price.is_some_and(|fill| fill > 0.0)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn id_stays_reserved_while_a_failing_close_runs() {
    let h = Arc::new(harness());
    h.start("slow", ExecutionConfig::default()).await;
    h.open_long("slow").await;

    h.venue.set_latency(Duration::from_millis(200));
    h.venue.fail_next_closes(1);
    let stopping = {
        let h = Arc::clone(&h);
        tokio::spawn(async move { h.engine.stop_strategy("slow").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = h
        .engine
        .start_strategy("slow", "step", "BTC", "1m", &Params::new(), ExecutionConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AlreadyRunning(ref id) if id == "slow"));
    assert!(matches!(
        h.engine.stop_strategy("slow").await,
        Err(EngineError::Stopping(_))
    ));

    let result = stopping.await.unwrap();
    assert!(matches!(result, Err(EngineError::Order(OrderError::Rejected(_)))));

    let info = h.engine.strategy_info("slow").await.unwrap();
    assert!(info.has_position);
    assert_eq!(info.position_side, Some(Side::Long));
    assert!(!info.is_running);
    assert!(h.venue.has_position("BTC"));

    h.venue.set_latency(Duration::ZERO);
    assert!(matches!(
        h.engine.stop_strategy("slow").await.unwrap(),
        CloseOutcome::Closed(_)
    ));
    assert!(h.engine.is_empty().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fetch_failures_are_retried() {
    let h = harness();
    h.source.fail_next(3);
    h.start("retry", ExecutionConfig::default()).await;
    assert!(h.source.fetch_count() >= 4);

    h.open_long("retry").await;
    h.engine.stop_all().await;
}

#[tokio::test]
async fn duplicate_start_is_rejected() {
    let h = harness();
    h.engine
        .start_strategy("dup", "step", "BTC", "1m", &Params::new(), ExecutionConfig::default())
        .await
        .unwrap();

    let err = h
        .engine
        .start_strategy("dup", "max-trend", "ETH", "1h", &Params::new(), ExecutionConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AlreadyRunning(ref id) if id == "dup"));

    let snapshot = h.engine.running_strategies().await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].strategy_id, "step");

    h.engine.stop_all().await;
}

#[tokio::test]
async fn stopping_unknown_id_changes_nothing() {
    let h = harness();
    h.engine
        .start_strategy("keep", "step", "BTC", "1m", &Params::new(), ExecutionConfig::default())
        .await
        .unwrap();

    assert!(matches!(
        h.engine.stop_strategy("ghost").await,
        Err(EngineError::NotFound(ref id)) if id == "ghost"
    ));
    let ids: Vec<String> = h
        .engine
        .running_strategies()
        .await
        .into_iter()
        .map(|info| info.id)
        .collect();
    assert_eq!(ids, vec!["keep".to_string()]);

    h.engine.stop_all().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_start_stop_keeps_table_consistent() {
    let h = harness();
    let ids: Vec<String> = (0..6).map(|i| format!("c{i}")).collect();
    let net: Arc<HashMap<String, AtomicI64>> =
        Arc::new(ids.iter().map(|id| (id.clone(), AtomicI64::new(0))).collect());

    let mut workers = Vec::new();
    for worker in 0..8u64 {
        let engine = Arc::clone(&h.engine);
        let ids = ids.clone();
        let net = Arc::clone(&net);
        workers.push(tokio::spawn(async move {
            let mut rng = StdRng::seed_from_u64(worker);
            for _ in 0..40 {
                let id = &ids[rng.gen_range(0..ids.len())];
                if rng.gen_bool(0.5) {
                    let started = engine
                        .start_strategy(id, "step", "ETH", "1m", &Params::new(), ExecutionConfig::default())
                        .await;
                    match started {
                        Ok(_) => {
                            net[id].fetch_add(1, Ordering::SeqCst);
                        }
                        Err(EngineError::AlreadyRunning(_)) => {}
                        Err(e) => panic!("unexpected start error: {e}"),
                    }
                } else {
                    match engine.stop_strategy(id).await {
                        Ok(_) => {
                            net[id].fetch_sub(1, Ordering::SeqCst);
                        }
                        Err(EngineError::NotFound(_)) | Err(EngineError::Stopping(_)) => {}
                        Err(e) => panic!("unexpected stop error: {e}"),
                    }
                }
                tokio::task::yield_now().await;
            }
        }));
    }
    for worker in workers {
        worker.await.unwrap();
    }

    let snapshot = h.engine.running_strategies().await;
    let present: HashSet<String> = snapshot.iter().map(|info| info.id.clone()).collect();
    assert_eq!(present.len(), snapshot.len(), "duplicate ids in snapshot");

    for id in &ids {
        let balance = net[id].load(Ordering::SeqCst);
        assert!(balance == 0 || balance == 1, "{id} started {balance} times net");
        assert_eq!(present.contains(id), balance == 1, "{id} presence mismatch");
    }

    h.engine.stop_all().await;
    assert!(h.engine.is_empty().await);
}
