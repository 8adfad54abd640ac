//! Historical backtest engine
//!
//! Replays a candle series through the same signal, risk, and ledger logic
//! the live engine uses. The evaluation starts once enough history has
//! accumulated for the signal warm-up and walks forward one candle at a
//! time over an expanding window, so every decision only sees data that was
//! available at that point.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::indicators::{self, MIN_SIGNAL_CANDLES};
use crate::ledger::PositionLedger;
use crate::risk::RiskConfig;
use crate::types::{Candle, Position, Side, SignalKind, TradingState};

/// Backtest parameters
///
/// Mirrors the live engine's decision knobs plus the starting balance.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestConfig {
    pub initial_balance: f64,
    pub min_confidence: f64,
    pub max_positions: usize,
    pub max_consecutive_trades: u32,
    pub scale_in_threshold_pct: f64,
    pub risk: RiskConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_balance: 10_000.0,
            min_confidence: 60.0,
            max_positions: 3,
            max_consecutive_trades: 3,
            scale_in_threshold_pct: 2.0,
            risk: RiskConfig::default(),
        }
    }
}

/// Aggregate result of one backtest run
#[derive(Debug, Clone, Serialize)]
pub struct BacktestResult {
    pub initial_balance: f64,
    pub final_balance: f64,
    /// Percent return over the whole run
    pub total_return_pct: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Percent of closed trades with positive P&L
    pub win_rate_pct: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    /// Average winning trade divided by average losing trade; 0 when there
    /// are no losing trades
    pub profit_factor: f64,
    /// Deepest peak-to-trough drop of mark-to-market equity, in percent
    pub max_drawdown_pct: f64,
    /// Every closed trade in the order it was opened
    pub trades: Vec<Position>,
}

/// Run a backtest over the candle series
///
/// Fewer candles than the warm-up requirement produce a result with zero
/// trades and the balance untouched.
pub fn run_backtest(candles: &[Candle], config: &BacktestConfig) -> BacktestResult {
    let mut cash = config.initial_balance;
    let mut ledger = PositionLedger::new();
    let mut state = TradingState::default();
    let mut peak_equity = config.initial_balance;
    let mut max_drawdown_pct = 0.0f64;

    for i in MIN_SIGNAL_CANDLES..candles.len() {
        let window = &candles[..=i];
        let candle = &candles[i];
        let price = candle.close;

        let signal = indicators::generate_signal(window);

        // Exits first, against this candle's close
        let triggered: Vec<(u64, &'static str)> = ledger
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
                reason.map(|r| (p.id, r))
            })
            .collect();
        for (id, reason) in triggered {
            if let Some(pos) = ledger.close(id, price, candle.timestamp, reason) {
                cash += pos.entry_value() + pos.pnl.unwrap_or(0.0);
                debug!(
                    "Backtest close {} at {:.2} ({}): pnl {:.2}",
                    id,
                    price,
                    reason,
                    pos.pnl.unwrap_or(0.0)
                );
            }
        }

        if signal.kind == SignalKind::Neutral {
            state.reset_consecutive();
        } else if signal.confidence >= config.min_confidence
            && state.consecutive_trades < config.max_consecutive_trades
            && ledger.open_count() < config.max_positions
        {
            let side = signal.kind.side().expect("directional signal has a side");

            let scale_in = ledger
                .last_open_in_direction(side)
                .map(|last| {
                    let threshold = config.scale_in_threshold_pct / 100.0;
                    match side {
                        Side::Buy => price >= last.entry_price * (1.0 + threshold),
                        Side::Sell => price <= last.entry_price * (1.0 - threshold),
                    }
                })
                .unwrap_or(false);

            let full_size = config.risk.position_size(cash, signal.confidence, price);
            let size = if scale_in { full_size / 2.0 } else { full_size };
            let order_value = size * price;

            if order_value >= config.risk.min_order_value && order_value <= cash {
                let atr = signal.indicators.map(|ind| ind.atr).unwrap_or(0.0);
                let levels = config.risk.exit_levels(price, atr, side);
                ledger.open(
                    price,
                    size,
                    side,
                    levels.stop_loss,
                    levels.take_profit,
                    candle.timestamp,
                );
                cash -= order_value;
                state.record_trade(side, price);
            }
        }

        // Track mark-to-market drawdown against the running peak
        let equity: f64 = cash
            + ledger
                .open_positions()
                .iter()
                .map(|p| p.entry_value() + p.unrealized_pnl(price))
                .sum::<f64>();
        if equity > peak_equity {
            peak_equity = equity;
        } else if peak_equity > 0.0 {
            let drawdown = (peak_equity - equity) / peak_equity * 100.0;
            max_drawdown_pct = max_drawdown_pct.max(drawdown);
        }
    }

    // Whatever is still open gets marked out at the final close
    if let Some(last) = candles.last() {
        let open_ids: Vec<u64> = ledger.open_positions().iter().map(|p| p.id).collect();
        for id in open_ids {
            if let Some(pos) = ledger.close(id, last.close, last.timestamp, "end of backtest") {
                cash += pos.entry_value() + pos.pnl.unwrap_or(0.0);
            }
        }
    }

    summarize(config.initial_balance, cash, &ledger, max_drawdown_pct)
}

fn summarize(
    initial_balance: f64,
    final_balance: f64,
    ledger: &PositionLedger,
    max_drawdown_pct: f64,
) -> BacktestResult {
    let closed = ledger.closed_positions();
    let total_trades = closed.len();

    let mut winning_trades = 0usize;
    let mut gross_profit = 0.0f64;
    let mut gross_loss = 0.0f64;
    for pos in &closed {
        let pnl = pos.pnl.unwrap_or(0.0);
        if pnl > 0.0 {
            winning_trades += 1;
            gross_profit += pnl;
        } else {
            gross_loss += -pnl;
        }
    }
    let losing_trades = total_trades - winning_trades;

    let win_rate_pct = if total_trades > 0 {
        winning_trades as f64 / total_trades as f64 * 100.0
    } else {
        0.0
    };

    let avg_win = if winning_trades > 0 {
        gross_profit / winning_trades as f64
    } else {
        0.0
    };
    let avg_loss = if losing_trades > 0 {
        gross_loss / losing_trades as f64
    } else {
        0.0
    };
    let profit_factor = if avg_loss > 0.0 { avg_win / avg_loss } else { 0.0 };

    let total_return_pct = if initial_balance > 0.0 {
        (final_balance - initial_balance) / initial_balance * 100.0
    } else {
        0.0
    };

    BacktestResult {
        initial_balance,
        final_balance,
        total_return_pct,
        total_trades,
        winning_trades,
        losing_trades,
        win_rate_pct,
        avg_win,
        avg_loss,
        profit_factor,
        max_drawdown_pct,
        trades: closed.into_iter().cloned().collect(),
    }
}

/// Run the same candle series under several named configurations
///
/// Results come back ordered by name so comparison output is stable.
pub fn compare_strategies(
    candles: &[Candle],
    configs: &[(String, BacktestConfig)],
) -> BTreeMap<String, BacktestResult> {
    configs
        .iter()
        .map(|(name, config)| (name.clone(), run_backtest(candles, config)))
        .collect()
}
