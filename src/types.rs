//! Core data types used across the trading system

use serde::{Deserialize, Serialize};

/// OHLCV candlestick data
///
/// `timestamp` is milliseconds since the Unix epoch. Series are always
/// ordered chronologically, oldest first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Trading pair symbol
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new(s: impl Into<String>) -> Self {
        Symbol(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The order side that closes a position held in this direction
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Composite signal direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Bullish,
    Bearish,
    Neutral,
}

impl SignalKind {
    /// Order side implied by a directional signal, `None` for neutral
    pub fn side(self) -> Option<Side> {
        match self {
            SignalKind::Bullish => Some(Side::Buy),
            SignalKind::Bearish => Some(Side::Sell),
            SignalKind::Neutral => None,
        }
    }
}

/// Latest indicator values backing a signal
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub rsi: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub atr: f64,
    pub price: f64,
}

/// Trading signal produced once per evaluation cycle
///
/// `confidence` is a percentage in `[0, 100]`. When the candle history is
/// too short to evaluate, confidence is 0 and `indicators` is `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSignal {
    pub kind: SignalKind,
    pub confidence: f64,
    pub reason: String,
    pub indicators: Option<IndicatorSnapshot>,
}

impl TradeSignal {
    pub fn neutral(reason: impl Into<String>) -> Self {
        TradeSignal {
            kind: SignalKind::Neutral,
            confidence: 0.0,
            reason: reason.into(),
            indicators: None,
        }
    }
}

/// Position lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Open,
    Closed,
}

/// An open or closed position owned by the ledger
///
/// Stop loss and take profit are fixed at entry and never revised while the
/// position is open. The open -> closed transition happens exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: u64,
    pub entry_price: f64,
    /// Size in base-asset units
    pub size: f64,
    pub side: Side,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Milliseconds since the Unix epoch
    pub entry_time: i64,
    pub status: PositionStatus,
    pub exit_price: Option<f64>,
    pub exit_time: Option<i64>,
    pub pnl: Option<f64>,
    pub exit_reason: Option<String>,
}

impl Position {
    /// Quote-currency value at entry
    pub fn entry_value(&self) -> f64 {
        self.entry_price * self.size
    }

    /// Mark-to-market profit at the given price
    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        match self.side {
            Side::Buy => (current_price - self.entry_price) * self.size,
            Side::Sell => (self.entry_price - current_price) * self.size,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }
}

/// Per-process trading state consulted by the decision engine
///
/// This is an explicit context object owned by the engine, not authoritative
/// trade history (the ledger is). `consecutive_trades` caps overtrading and
/// resets whenever a neutral signal is observed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradingState {
    pub last_action: Option<Side>,
    pub last_trade_price: Option<f64>,
    pub consecutive_trades: u32,
}

impl TradingState {
    pub fn record_trade(&mut self, side: Side, price: f64) {
        self.last_action = Some(side);
        self.last_trade_price = Some(price);
        self.consecutive_trades += 1;
    }

    pub fn reset_consecutive(&mut self) {
        self.consecutive_trades = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrealized_pnl_direction_aware() {
        let pos = Position {
            id: 1,
            entry_price: 100.0,
            size: 2.0,
            side: Side::Buy,
            stop_loss: 90.0,
            take_profit: 115.0,
            entry_time: 0,
            status: PositionStatus::Open,
            exit_price: None,
            exit_time: None,
            pnl: None,
            exit_reason: None,
        };
        assert_eq!(pos.unrealized_pnl(110.0), 20.0);

        let short = Position {
            side: Side::Sell,
            ..pos
        };
        assert_eq!(short.unrealized_pnl(110.0), -20.0);
    }

    #[test]
    fn test_trading_state_reset() {
        let mut state = TradingState::default();
        state.record_trade(Side::Buy, 100.0);
        state.record_trade(Side::Buy, 102.0);
        assert_eq!(state.consecutive_trades, 2);
        assert_eq!(state.last_action, Some(Side::Buy));

        state.reset_consecutive();
        assert_eq!(state.consecutive_trades, 0);
        // last action survives the reset; only the counter is cleared
        assert_eq!(state.last_action, Some(Side::Buy));
    }
}
