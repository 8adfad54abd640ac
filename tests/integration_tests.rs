//! End-to-end tests wiring the engine, switch, and backtest together

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use momentum_trader::backtest::{compare_strategies, run_backtest, BacktestConfig};
use momentum_trader::engine::{CycleAction, EngineConfig, TradingEngine};
use momentum_trader::events::EventCategory;
use momentum_trader::exchange::{AccountBalances, Balance, ExchangeApi, ExchangeError, OrderAck};
use momentum_trader::optimizer::{optimize_parameters, ParamGrid};
use momentum_trader::switch::SqliteSwitch;
use momentum_trader::types::{Candle, Side, Symbol};

/// Scripted exchange whose price can be moved between cycles
struct ScriptedExchange {
    price: Arc<Mutex<f64>>,
    candles: Vec<Candle>,
    available: f64,
    orders: Arc<AtomicUsize>,
}

impl ScriptedExchange {
    fn new(candles: Vec<Candle>, available: f64) -> (Self, Arc<Mutex<f64>>, Arc<AtomicUsize>) {
        let price = Arc::new(Mutex::new(candles.last().map(|c| c.close).unwrap_or(0.0)));
        let orders = Arc::new(AtomicUsize::new(0));
        let exchange = ScriptedExchange {
            price: price.clone(),
            candles,
            available,
            orders: orders.clone(),
        };
        (exchange, price, orders)
    }
}

impl ExchangeApi for ScriptedExchange {
    async fn fetch_current_price(&self, _symbol: &Symbol) -> Result<f64, ExchangeError> {
        Ok(*self.price.lock().unwrap())
    }

    async fn fetch_recent_candles(
        &self,
        _symbol: &Symbol,
        count: usize,
        _interval: &str,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let start = self.candles.len().saturating_sub(count);
        Ok(self.candles[start..].to_vec())
    }

    async fn fetch_balances(&self) -> Result<AccountBalances, ExchangeError> {
        let mut balances = AccountBalances::new();
        balances.insert(
            "USDT".to_string(),
            Balance {
                available: self.available,
                locked: 0.0,
            },
        );
        Ok(balances)
    }

    async fn place_market_order(
        &self,
        _side: Side,
        _size: f64,
        _symbol: &Symbol,
    ) -> Result<OrderAck, ExchangeError> {
        let n = self.orders.fetch_add(1, Ordering::SeqCst);
        Ok(OrderAck::filled(format!("order-{}", n + 1)))
    }
}

fn uptrend_candles(n: usize) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let close = 100.0 + i as f64 * 1.5;
            Candle {
                timestamp: i as i64 * 3_600_000,
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.5,
                close,
                volume: 1_000.0,
            }
        })
        .collect()
}

#[tokio::test]
async fn full_lifecycle_open_then_take_profit() {
    let (exchange, price, orders) = ScriptedExchange::new(uptrend_candles(100), 10_000.0);
    let switch = SqliteSwitch::in_memory().unwrap();
    switch.set_enabled(true).unwrap();

    let mut engine = TradingEngine::new(EngineConfig::default(), exchange, switch);
    let mut events = engine.events().subscribe();

    // First cycle: the uptrend produces a bullish entry
    let report = engine.run_evaluation_cycle().await;
    assert!(matches!(report.action, CycleAction::Opened { .. }));
    assert_eq!(engine.open_positions().len(), 1);
    assert_eq!(orders.load(Ordering::SeqCst), 1);

    let target = engine.open_positions()[0].take_profit;
    assert!(target > *price.lock().unwrap());

    // Price gaps through the target: the next cycle closes the position
    // (a closing order plus a fresh entry at the new price)
    *price.lock().unwrap() = target + 1.0;
    let report = engine.run_evaluation_cycle().await;
    assert_eq!(report.closed.len(), 1);

    let stats = engine.trading_statistics();
    assert_eq!(stats.closed_trades, 1);
    assert_eq!(stats.winning_trades, 1);
    assert!(stats.realized_pnl > 0.0);

    // The event stream narrated the whole run
    let mut categories = Vec::new();
    while let Ok(event) = events.try_recv() {
        categories.push(event.category);
    }
    assert!(categories.contains(&EventCategory::Cycle));
    assert!(categories.contains(&EventCategory::Signal));
    assert!(categories.contains(&EventCategory::Trade));
    assert!(categories.contains(&EventCategory::Position));
}

#[tokio::test]
async fn disabled_switch_blocks_all_orders() {
    let (exchange, _price, orders) = ScriptedExchange::new(uptrend_candles(100), 10_000.0);
    let switch = SqliteSwitch::in_memory().unwrap();
    // Never enabled: the fresh store reports disabled

    let mut engine = TradingEngine::new(EngineConfig::default(), exchange, switch);
    for _ in 0..3 {
        let report = engine.run_evaluation_cycle().await;
        assert!(matches!(report.action, CycleAction::Skipped(_)));
    }

    assert_eq!(orders.load(Ordering::SeqCst), 0);
    assert!(engine.open_positions().is_empty());
}

#[tokio::test]
async fn flipping_the_switch_mid_run_takes_effect_next_cycle() {
    let (exchange, _price, orders) = ScriptedExchange::new(uptrend_candles(100), 10_000.0);
    let switch = SqliteSwitch::in_memory().unwrap();
    switch.set_enabled(true).unwrap();

    let mut engine = TradingEngine::new(EngineConfig::default(), exchange, switch);

    let report = engine.run_evaluation_cycle().await;
    assert!(matches!(report.action, CycleAction::Opened { .. }));
    let placed = orders.load(Ordering::SeqCst);

    // Operators flip the persisted flag; no restart needed
    engine.trading_switch().set_enabled(false).unwrap();
    let report = engine.run_evaluation_cycle().await;
    assert!(matches!(report.action, CycleAction::Skipped(_)));
    assert_eq!(orders.load(Ordering::SeqCst), placed);
}

#[test]
fn backtest_replay_is_idempotent() {
    let candles = uptrend_candles(250);
    let config = BacktestConfig::default();

    let a = run_backtest(&candles, &config);
    let b = run_backtest(&candles, &config);

    assert_eq!(a.total_trades, b.total_trades);
    assert!((a.final_balance - b.final_balance).abs() < 1e-9);
    assert!((a.total_return_pct - b.total_return_pct).abs() < 1e-9);
}

#[test]
fn strategy_comparison_covers_every_entry() {
    let candles = uptrend_candles(200);
    let configs = vec![
        ("default".to_string(), BacktestConfig::default()),
        (
            "cautious".to_string(),
            BacktestConfig {
                min_confidence: 90.0,
                ..Default::default()
            },
        ),
        (
            "aggressive".to_string(),
            BacktestConfig {
                max_positions: 5,
                max_consecutive_trades: 10,
                ..Default::default()
            },
        ),
    ];

    let results = compare_strategies(&candles, &configs);

    assert_eq!(results.len(), 3);
    for (_, result) in &results {
        assert_eq!(
            result.winning_trades + result.losing_trades,
            result.total_trades
        );
    }
    // A 90% confidence floor can never be met by a 2-of-3 vote split
    assert_eq!(results["cautious"].total_trades, 0);
}

#[test]
fn optimizer_best_dominates_the_grid() {
    let candles = uptrend_candles(200);
    let grid = ParamGrid {
        min_confidence: vec![60.0, 95.0],
        base_fraction: vec![0.05, 0.20],
        ..Default::default()
    };

    let opt = optimize_parameters(&candles, &BacktestConfig::default(), &grid).unwrap();

    assert_eq!(opt.ranked.len(), 4);
    for point in &opt.ranked {
        assert!(opt.best.result.total_return_pct >= point.result.total_return_pct);
    }
}
