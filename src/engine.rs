//! Trading decision engine
//!
//! One `run_evaluation_cycle` call is the unit of work: gate on the
//! persisted switch, snapshot market and account state, derive a signal,
//! manage exits on open positions, then decide whether to enter. Cycles are
//! driven sequentially by the scheduler; the engine holds `&mut self` for
//! the whole cycle so two evaluations can never interleave.
//!
//! Collaborator failures never abort the process. A failed price fetch or a
//! rejected order degrades the current cycle to a no-op, emits an event, and
//! the next interval gets a fresh attempt.

use chrono::{Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::events::{EventBus, EventCategory, StatusEvent};
use crate::exchange::ExchangeApi;
use crate::indicators::{self, MIN_SIGNAL_CANDLES};
use crate::ledger::PositionLedger;
use crate::risk::RiskConfig;
use crate::switch::{SwitchState, TradingSwitch};
use crate::types::{Position, Side, SignalKind, Symbol, TradeSignal, TradingState};

/// Decision engine parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_symbol")]
    pub symbol: Symbol,
    #[serde(default = "default_interval")]
    pub interval: String,
    /// Candles fetched per cycle; must cover the signal warm-up
    #[serde(default = "default_candle_count")]
    pub candle_count: usize,
    /// Asset whose free balance funds new entries
    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,
    /// Minimum signal confidence (percent) to act on
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Cap on simultaneously open positions
    #[serde(default = "default_max_positions")]
    pub max_positions: usize,
    /// Overtrading guard: entries allowed since the last neutral signal
    #[serde(default = "default_max_consecutive_trades")]
    pub max_consecutive_trades: u32,
    /// Favorable move (percent) required before scaling into a winner
    #[serde(default = "default_scale_in_threshold_pct")]
    pub scale_in_threshold_pct: f64,
    #[serde(default)]
    pub time_filter: TimeFilter,
    #[serde(default)]
    pub risk: RiskConfig,
}

fn default_symbol() -> Symbol {
    Symbol::new("BTCUSDT")
}

fn default_interval() -> String {
    "1h".to_string()
}

fn default_candle_count() -> usize {
    100
}

fn default_quote_asset() -> String {
    "USDT".to_string()
}

fn default_min_confidence() -> f64 {
    60.0
}

fn default_max_positions() -> usize {
    3
}

fn default_max_consecutive_trades() -> u32 {
    3
}

fn default_scale_in_threshold_pct() -> f64 {
    2.0
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            symbol: default_symbol(),
            interval: default_interval(),
            candle_count: default_candle_count(),
            quote_asset: default_quote_asset(),
            min_confidence: default_min_confidence(),
            max_positions: default_max_positions(),
            max_consecutive_trades: default_max_consecutive_trades(),
            scale_in_threshold_pct: default_scale_in_threshold_pct(),
            time_filter: TimeFilter::default(),
            risk: RiskConfig::default(),
        }
    }
}

/// Optional wall-clock filter for low-liquidity periods
///
/// Disabled by default; all times are UTC.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeFilter {
    #[serde(default)]
    pub enabled: bool,
    /// Skip Saturday and Sunday entirely
    #[serde(default)]
    pub skip_weekends: bool,
    /// Inclusive start of the skipped hour window
    #[serde(default)]
    pub quiet_start_hour: Option<u32>,
    /// Exclusive end of the skipped hour window; may wrap past midnight
    #[serde(default)]
    pub quiet_end_hour: Option<u32>,
}

impl TimeFilter {
    fn should_skip(&self, now: chrono::DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }
        if self.skip_weekends {
            let weekday = now.weekday();
            if weekday == chrono::Weekday::Sat || weekday == chrono::Weekday::Sun {
                return true;
            }
        }
        if let (Some(start), Some(end)) = (self.quiet_start_hour, self.quiet_end_hour) {
            let hour = now.hour();
            let in_window = if start <= end {
                hour >= start && hour < end
            } else {
                hour >= start || hour < end
            };
            if in_window {
                return true;
            }
        }
        false
    }
}

/// What one evaluation cycle decided
#[derive(Debug, Clone, PartialEq)]
pub enum CycleAction {
    /// The cycle stopped before the decision step
    Skipped(String),
    /// Neutral signal; the consecutive-trade counter was reset
    NoTrade,
    Opened { position_id: u64 },
    ScaledIn { position_id: u64 },
    /// Entry was attempted but refused (order rejected, balance too low)
    Rejected(String),
    MaxPositions,
}

/// Summary of one evaluation cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub signal: Option<TradeSignal>,
    /// Ids of positions closed by exit management this cycle
    pub closed: Vec<u64>,
    pub action: CycleAction,
}

impl CycleReport {
    fn skipped(cycle: u64, reason: impl Into<String>) -> Self {
        CycleReport {
            cycle,
            signal: None,
            closed: Vec::new(),
            action: CycleAction::Skipped(reason.into()),
        }
    }
}

/// Aggregate trading statistics over the engine's lifetime
#[derive(Debug, Clone, Serialize)]
pub struct TradingStatistics {
    pub cycles: u64,
    pub open_positions: usize,
    pub total_invested: f64,
    pub closed_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub realized_pnl: f64,
    pub consecutive_trades: u32,
}

/// The decision engine
///
/// Generic over its collaborators so cycles run identically against the live
/// REST client and against mocks in tests.
pub struct TradingEngine<E, S> {
    config: EngineConfig,
    exchange: E,
    switch: S,
    events: EventBus,
    ledger: PositionLedger,
    state: TradingState,
    cycle_count: u64,
}

impl<E: ExchangeApi, S: TradingSwitch> TradingEngine<E, S> {
    pub fn new(config: EngineConfig, exchange: E, switch: S) -> Self {
        TradingEngine {
            config,
            exchange,
            switch,
            events: EventBus::new(),
            ledger: PositionLedger::new(),
            state: TradingState::default(),
            cycle_count: 0,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn trading_switch(&self) -> &S {
        &self.switch
    }

    pub fn open_positions(&self) -> Vec<&Position> {
        self.ledger.open_positions()
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn state(&self) -> &TradingState {
        &self.state
    }

    pub fn trading_statistics(&self) -> TradingStatistics {
        let closed = self.ledger.closed_positions();
        let winning = closed
            .iter()
            .filter(|p| p.pnl.unwrap_or(0.0) > 0.0)
            .count();

        TradingStatistics {
            cycles: self.cycle_count,
            open_positions: self.ledger.open_count(),
            total_invested: self.ledger.total_invested(),
            closed_trades: closed.len(),
            winning_trades: winning,
            losing_trades: closed.len() - winning,
            realized_pnl: self.ledger.realized_pnl(),
            consecutive_trades: self.state.consecutive_trades,
        }
    }

    /// Run one full evaluation cycle
    pub async fn run_evaluation_cycle(&mut self) -> CycleReport {
        self.cycle_count += 1;
        let cycle = self.cycle_count;

        self.events.publish(
            StatusEvent::new(EventCategory::Cycle, "evaluation cycle started")
                .with("cycle", cycle),
        );

        // Switch gate. Unknown fails safe: no storage answer, no trading.
        match self.switch.state() {
            SwitchState::Enabled => {}
            SwitchState::Disabled => {
                self.state.last_action = None;
                self.events
                    .publish(StatusEvent::new(EventCategory::Cycle, "trading disabled"));
                return CycleReport::skipped(cycle, "trading disabled");
            }
            SwitchState::Unknown => {
                self.state.last_action = None;
                warn!("Switch state unknown, treating as disabled");
                self.events.publish(StatusEvent::new(
                    EventCategory::Risk,
                    "switch state unknown, failing safe",
                ));
                return CycleReport::skipped(cycle, "switch state unknown");
            }
        }

        if self.config.time_filter.should_skip(Utc::now()) {
            self.events.publish(StatusEvent::new(
                EventCategory::Cycle,
                "outside configured trading hours",
            ));
            return CycleReport::skipped(cycle, "outside trading hours");
        }

        // Snapshot market and account state; any failure ends the cycle
        let symbol = self.config.symbol.clone();
        let price = match self.exchange.fetch_current_price(&symbol).await {
            Ok(p) => p,
            Err(e) => {
                warn!("Price fetch failed: {}", e);
                self.events.publish(
                    StatusEvent::new(EventCategory::Error, "price fetch failed")
                        .with("error", e.to_string()),
                );
                return CycleReport::skipped(cycle, "price unavailable");
            }
        };

        let candles = match self
            .exchange
            .fetch_recent_candles(&symbol, self.config.candle_count, &self.config.interval)
            .await
        {
            Ok(c) => c,
            Err(e) => {
                warn!("Candle fetch failed: {}", e);
                self.events.publish(
                    StatusEvent::new(EventCategory::Error, "candle fetch failed")
                        .with("error", e.to_string()),
                );
                return CycleReport::skipped(cycle, "candles unavailable");
            }
        };
        if candles.len() < MIN_SIGNAL_CANDLES {
            self.events.publish(
                StatusEvent::new(EventCategory::Cycle, "insufficient candle history")
                    .with("candles", candles.len()),
            );
            return CycleReport::skipped(cycle, "insufficient candle history");
        }

        let available = match self.exchange.fetch_balances().await {
            Ok(balances) => balances
                .get(&self.config.quote_asset)
                .map(|b| b.available)
                .unwrap_or(0.0),
            Err(e) => {
                warn!("Balance fetch failed: {}", e);
                self.events.publish(
                    StatusEvent::new(EventCategory::Error, "balance fetch failed")
                        .with("error", e.to_string()),
                );
                return CycleReport::skipped(cycle, "balances unavailable");
            }
        };

        let signal = indicators::generate_signal(&candles);
        info!(
            "Cycle {}: {:?} signal at {:.2}% confidence, price {:.2}",
            cycle, signal.kind, signal.confidence, price
        );
        self.events.publish(
            StatusEvent::new(EventCategory::Signal, signal.reason.clone())
                .with("kind", signal.kind)
                .with("confidence", signal.confidence)
                .with("price", price),
        );

        // Exits are managed before any entry decision
        let closed = self.manage_exits(price).await;

        // A neutral read resets the overtrading counter and ends the cycle
        if signal.kind == SignalKind::Neutral {
            self.state.reset_consecutive();
            self.events
                .publish(StatusEvent::new(EventCategory::Cycle, "neutral signal, no trade"));
            return CycleReport {
                cycle,
                signal: Some(signal),
                closed,
                action: CycleAction::NoTrade,
            };
        }

        if signal.confidence < self.config.min_confidence {
            self.events.publish(
                StatusEvent::new(EventCategory::Cycle, "confidence below threshold")
                    .with("confidence", signal.confidence)
                    .with("threshold", self.config.min_confidence),
            );
            return CycleReport {
                cycle,
                signal: Some(signal),
                closed,
                action: CycleAction::Skipped("confidence below threshold".into()),
            };
        }

        if self.state.consecutive_trades >= self.config.max_consecutive_trades {
            self.events.publish(
                StatusEvent::new(EventCategory::Risk, "overtrading guard active")
                    .with("consecutive_trades", self.state.consecutive_trades),
            );
            return CycleReport {
                cycle,
                signal: Some(signal),
                closed,
                action: CycleAction::Skipped("overtrading guard".into()),
            };
        }

        let side = signal
            .kind
            .side()
            .expect("directional signal has a side");
        let action = self.execute_entry(side, &signal, price, available).await;

        CycleReport {
            cycle,
            signal: Some(signal),
            closed,
            action,
        }
    }

    /// Check stop-loss / take-profit on every open position at this price
    async fn manage_exits(&mut self, price: f64) -> Vec<u64> {
        let triggered: Vec<(u64, Side, f64, &'static str)> = self
            .ledger
            .open_positions()
            .iter()
            .filter_map(|p| {
                let reason = match p.side {
                    Side::Buy if price <= p.stop_loss => Some("stop loss"),
                    Side::Buy if price >= p.take_profit => Some("take profit"),
                    Side::Sell if price >= p.stop_loss => Some("stop loss"),
                    Side::Sell if price <= p.take_profit => Some("take profit"),
                    _ => None,
                };
                reason.map(|r| (p.id, p.side, p.size, r))
            })
            .collect();

        let mut closed = Vec::new();
        for (id, side, size, reason) in triggered {
            let symbol = self.config.symbol.clone();
            match self
                .exchange
                .place_market_order(side.opposite(), size, &symbol)
                .await
            {
                Ok(ack) if ack.success => {
                    let now = Utc::now().timestamp_millis();
                    if let Some(pos) = self.ledger.close(id, price, now, reason) {
                        info!(
                            "Closed position {} at {:.2} ({}): pnl {:.2}",
                            id,
                            price,
                            reason,
                            pos.pnl.unwrap_or(0.0)
                        );
                        self.events.publish(
                            StatusEvent::new(EventCategory::Position, "position closed")
                                .with("position_id", id)
                                .with("reason", reason)
                                .with("exit_price", price)
                                .with("pnl", pos.pnl),
                        );
                        closed.push(id);
                    }
                }
                Ok(ack) => {
                    // Exchange refused the closing order; the position stays
                    // open and next cycle tries again
                    warn!(
                        "Closing order for position {} rejected: {:?}",
                        id, ack.error_message
                    );
                    self.events.publish(
                        StatusEvent::new(EventCategory::Error, "closing order rejected")
                            .with("position_id", id)
                            .with("error", ack.error_message),
                    );
                }
                Err(e) => {
                    warn!("Closing order for position {} failed: {}", id, e);
                    self.events.publish(
                        StatusEvent::new(EventCategory::Error, "closing order failed")
                            .with("position_id", id)
                            .with("error", e.to_string()),
                    );
                }
            }
        }
        closed
    }

    /// Decide between scaling into a winner, opening fresh, or standing down
    async fn execute_entry(
        &mut self,
        side: Side,
        signal: &TradeSignal,
        price: f64,
        available: f64,
    ) -> CycleAction {
        if self.ledger.open_count() >= self.config.max_positions {
            self.events.publish(
                StatusEvent::new(EventCategory::Cycle, "maximum positions reached")
                    .with("open_positions", self.ledger.open_count()),
            );
            return CycleAction::MaxPositions;
        }

        // Scale-in compares against the last same-direction position only
        let scale_in = self
            .ledger
            .last_open_in_direction(side)
            .map(|last| {
                let threshold = self.config.scale_in_threshold_pct / 100.0;
                match side {
                    Side::Buy => price >= last.entry_price * (1.0 + threshold),
                    Side::Sell => price <= last.entry_price * (1.0 - threshold),
                }
            })
            .unwrap_or(false);

        let full_size = self
            .config
            .risk
            .position_size(available, signal.confidence, price);
        let size = if scale_in { full_size / 2.0 } else { full_size };
        let order_value = size * price;

        if order_value < self.config.risk.min_order_value {
            self.events.publish(
                StatusEvent::new(EventCategory::Risk, "order below exchange minimum")
                    .with("order_value", order_value),
            );
            return CycleAction::Rejected("order below exchange minimum".into());
        }
        if order_value > available {
            self.events.publish(
                StatusEvent::new(EventCategory::Risk, "insufficient balance for entry")
                    .with("order_value", order_value)
                    .with("available", available),
            );
            return CycleAction::Rejected("insufficient balance".into());
        }

        let symbol = self.config.symbol.clone();
        let ack = match self.exchange.place_market_order(side, size, &symbol).await {
            Ok(ack) => ack,
            Err(e) => {
                warn!("Entry order failed: {}", e);
                self.events.publish(
                    StatusEvent::new(EventCategory::Error, "entry order failed")
                        .with("error", e.to_string()),
                );
                return CycleAction::Rejected(e.to_string());
            }
        };
        if !ack.success {
            warn!("Entry order rejected: {:?}", ack.error_message);
            self.events.publish(
                StatusEvent::new(EventCategory::Error, "entry order rejected")
                    .with("error", ack.error_message.clone()),
            );
            return CycleAction::Rejected(
                ack.error_message.unwrap_or_else(|| "order rejected".into()),
            );
        }

        let atr = signal.indicators.map(|i| i.atr).unwrap_or(0.0);
        let levels = self.config.risk.exit_levels(price, atr, side);
        let now = Utc::now().timestamp_millis();
        let position_id = self
            .ledger
            .open(price, size, side, levels.stop_loss, levels.take_profit, now)
            .id;

        self.state.record_trade(side, price);

        let label = if scale_in { "scaled into" } else { "opened" };
        info!(
            "Position {} {} {} at {:.2}, size {:.6}, stop {:.2}, target {:.2}",
            position_id, label, side, price, size, levels.stop_loss, levels.take_profit
        );
        self.events.publish(
            StatusEvent::new(EventCategory::Trade, format!("position {}", label))
                .with("position_id", position_id)
                .with("side", side)
                .with("price", price)
                .with("size", size)
                .with("stop_loss", levels.stop_loss)
                .with("take_profit", levels.take_profit),
        );

        if scale_in {
            CycleAction::ScaledIn { position_id }
        } else {
            CycleAction::Opened { position_id }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{AccountBalances, Balance, ExchangeError, OrderAck};
    use crate::types::Candle;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockExchange {
        price: f64,
        candles: Vec<Candle>,
        available: f64,
        reject_orders: bool,
        orders: Mutex<Vec<(Side, f64)>>,
        order_seq: AtomicUsize,
    }

    impl MockExchange {
        fn new(price: f64, candles: Vec<Candle>, available: f64) -> Self {
            MockExchange {
                price,
                candles,
                available,
                reject_orders: false,
                orders: Mutex::new(Vec::new()),
                order_seq: AtomicUsize::new(1),
            }
        }

        fn order_count(&self) -> usize {
            self.orders.lock().unwrap().len()
        }
    }

    impl ExchangeApi for MockExchange {
        async fn fetch_current_price(&self, _symbol: &Symbol) -> Result<f64, ExchangeError> {
            Ok(self.price)
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
            side: Side,
            size: f64,
            _symbol: &Symbol,
        ) -> Result<OrderAck, ExchangeError> {
            if self.reject_orders {
                return Ok(OrderAck::rejected("MIN_NOTIONAL"));
            }
            self.orders.lock().unwrap().push((side, size));
            let id = self.order_seq.fetch_add(1, Ordering::SeqCst);
            Ok(OrderAck::filled(id.to_string()))
        }
    }

    struct StaticSwitch(SwitchState);

    impl TradingSwitch for StaticSwitch {
        fn state(&self) -> SwitchState {
            self.0
        }
    }

    fn uptrend_candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let close = 100.0 + i as f64 * 1.5;
                Candle {
                    timestamp: i as i64 * 60_000,
                    open: close - 0.5,
                    high: close + 1.0,
                    low: close - 1.5,
                    close,
                    volume: 1_000.0,
                }
            })
            .collect()
    }

    /// Slow decline ending in one sharp recovery candle: price closes above
    /// the slow EMA while the fast EMA is still below it, and RSI lands
    /// mid-range. One bullish and one bearish vote, so no majority forms.
    fn split_vote_candles() -> Vec<Candle> {
        let mut candles: Vec<Candle> = (0..59)
            .map(|i| {
                let close = 130.0 - 0.5 * i as f64;
                Candle {
                    timestamp: i as i64 * 60_000,
                    open: close + 0.5,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1_000.0,
                }
            })
            .collect();
        candles.push(Candle {
            timestamp: 59 * 60_000,
            open: 101.0,
            high: 108.5,
            low: 100.5,
            close: 108.0,
            volume: 1_000.0,
        });
        candles
    }

    fn engine_with(
        candles: Vec<Candle>,
        price: f64,
        state: SwitchState,
    ) -> TradingEngine<MockExchange, StaticSwitch> {
        let exchange = MockExchange::new(price, candles, 10_000.0);
        TradingEngine::new(EngineConfig::default(), exchange, StaticSwitch(state))
    }

    #[tokio::test]
    async fn test_disabled_switch_stops_cycle() {
        let candles = uptrend_candles(100);
        let price = candles.last().unwrap().close;
        let mut engine = engine_with(candles, price, SwitchState::Disabled);

        let report = engine.run_evaluation_cycle().await;

        assert_eq!(
            report.action,
            CycleAction::Skipped("trading disabled".into())
        );
        assert!(engine.open_positions().is_empty());
        assert_eq!(engine.exchange.order_count(), 0);
        assert_eq!(engine.state.last_action, None);
    }

    #[tokio::test]
    async fn test_unknown_switch_fails_safe() {
        let candles = uptrend_candles(100);
        let price = candles.last().unwrap().close;
        let mut engine = engine_with(candles, price, SwitchState::Unknown);

        let report = engine.run_evaluation_cycle().await;

        assert!(matches!(report.action, CycleAction::Skipped(_)));
        assert_eq!(engine.exchange.order_count(), 0);
    }

    #[tokio::test]
    async fn test_uptrend_opens_buy_position() {
        let candles = uptrend_candles(100);
        let price = candles.last().unwrap().close;
        let mut engine = engine_with(candles, price, SwitchState::Enabled);

        let report = engine.run_evaluation_cycle().await;

        let position_id = match report.action {
            CycleAction::Opened { position_id } => position_id,
            other => panic!("expected Opened, got {:?}", other),
        };
        let positions = engine.open_positions();
        assert_eq!(positions.len(), 1);

        let pos = positions[0];
        assert_eq!(pos.id, position_id);
        assert_eq!(pos.side, Side::Buy);
        assert!(pos.stop_loss < pos.entry_price);
        assert!(pos.take_profit > pos.entry_price);
        assert_eq!(engine.state.consecutive_trades, 1);
        assert_eq!(engine.exchange.order_count(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_candles_skips() {
        let candles = uptrend_candles(30);
        let price = candles.last().unwrap().close;
        let mut engine = engine_with(candles, price, SwitchState::Enabled);

        let report = engine.run_evaluation_cycle().await;

        assert_eq!(
            report.action,
            CycleAction::Skipped("insufficient candle history".into())
        );
        assert!(engine.open_positions().is_empty());
    }

    #[tokio::test]
    async fn test_overtrading_guard_blocks_entries() {
        let candles = uptrend_candles(100);
        let price = candles.last().unwrap().close;
        let mut engine = engine_with(candles, price, SwitchState::Enabled);
        engine.config.max_positions = 10;

        // Three opens exhaust the allowance, the fourth is guarded
        for _ in 0..3 {
            let report = engine.run_evaluation_cycle().await;
            assert!(matches!(
                report.action,
                CycleAction::Opened { .. } | CycleAction::ScaledIn { .. }
            ));
        }
        let report = engine.run_evaluation_cycle().await;

        assert_eq!(
            report.action,
            CycleAction::Skipped("overtrading guard".into())
        );
        assert_eq!(engine.exchange.order_count(), 3);
    }

    #[tokio::test]
    async fn test_neutral_signal_resets_guard() {
        let candles = split_vote_candles();
        let price = candles.last().unwrap().close;
        let mut engine = engine_with(candles, price, SwitchState::Enabled);
        engine.state.consecutive_trades = 3;

        let report = engine.run_evaluation_cycle().await;

        assert_eq!(report.action, CycleAction::NoTrade);
        assert_eq!(engine.state.consecutive_trades, 0);
        assert_eq!(engine.exchange.order_count(), 0);
    }

    #[tokio::test]
    async fn test_max_positions_blocks_new_entry() {
        let candles = uptrend_candles(100);
        let price = candles.last().unwrap().close;
        let mut engine = engine_with(candles, price, SwitchState::Enabled);
        engine.config.max_positions = 1;
        engine.config.max_consecutive_trades = 10;

        let first = engine.run_evaluation_cycle().await;
        assert!(matches!(first.action, CycleAction::Opened { .. }));

        let second = engine.run_evaluation_cycle().await;
        assert_eq!(second.action, CycleAction::MaxPositions);
        assert_eq!(engine.open_positions().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_order_records_nothing() {
        let candles = uptrend_candles(100);
        let price = candles.last().unwrap().close;
        let mut exchange = MockExchange::new(price, candles, 10_000.0);
        exchange.reject_orders = true;
        let mut engine = TradingEngine::new(
            EngineConfig::default(),
            exchange,
            StaticSwitch(SwitchState::Enabled),
        );

        let report = engine.run_evaluation_cycle().await;

        assert!(matches!(report.action, CycleAction::Rejected(_)));
        assert!(engine.open_positions().is_empty());
        assert_eq!(engine.state.consecutive_trades, 0);
    }

    #[tokio::test]
    async fn test_take_profit_closes_position() {
        let candles = uptrend_candles(100);
        let price = candles.last().unwrap().close;
        let mut engine = engine_with(candles, price, SwitchState::Enabled);

        let report = engine.run_evaluation_cycle().await;
        assert!(matches!(report.action, CycleAction::Opened { .. }));
        let target = engine.open_positions()[0].take_profit;

        // Price jumps through the target; exit management closes the position
        engine.exchange.price = target + 1.0;
        let report = engine.run_evaluation_cycle().await;

        assert_eq!(report.closed.len(), 1);
        let stats = engine.trading_statistics();
        assert_eq!(stats.closed_trades, 1);
        assert_eq!(stats.winning_trades, 1);
        assert!(stats.realized_pnl > 0.0);
    }

    #[test]
    fn test_time_filter_weekend() {
        let filter = TimeFilter {
            enabled: true,
            skip_weekends: true,
            quiet_start_hour: None,
            quiet_end_hour: None,
        };
        // 2024-01-06 is a Saturday, 2024-01-08 a Monday
        let saturday = chrono::DateTime::parse_from_rfc3339("2024-01-06T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let monday = chrono::DateTime::parse_from_rfc3339("2024-01-08T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        assert!(filter.should_skip(saturday));
        assert!(!filter.should_skip(monday));
    }

    #[test]
    fn test_time_filter_wrapping_hours() {
        let filter = TimeFilter {
            enabled: true,
            skip_weekends: false,
            quiet_start_hour: Some(22),
            quiet_end_hour: Some(2),
        };
        let late = chrono::DateTime::parse_from_rfc3339("2024-01-08T23:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let early = chrono::DateTime::parse_from_rfc3339("2024-01-08T01:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let midday = chrono::DateTime::parse_from_rfc3339("2024-01-08T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        assert!(filter.should_skip(late));
        assert!(filter.should_skip(early));
        assert!(!filter.should_skip(midday));
    }
}
