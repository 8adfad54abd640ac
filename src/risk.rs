//! Risk management: exit levels and position sizing
//!
//! Stop-loss and take-profit distances are expressed in ATR multiples so the
//! exit width adapts to current volatility. Position size scales with signal
//! confidence and is floored at the exchange-imposed minimum order value.

use serde::{Deserialize, Serialize};

use crate::types::Side;

/// Stop-loss / take-profit pair computed at entry time
///
/// Not persisted; recomputed per position when it is opened and fixed for
/// the lifetime of the position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitLevels {
    pub stop_loss: f64,
    pub take_profit: f64,
}

/// Risk and sizing parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Fraction of available balance committed at full confidence
    #[serde(default = "default_base_fraction")]
    pub base_fraction: f64,
    /// Exchange-imposed minimum order value in quote currency
    #[serde(default = "default_min_order_value")]
    pub min_order_value: f64,
    /// Stop-loss distance in ATR multiples
    #[serde(default = "default_stop_atr_multiple")]
    pub stop_atr_multiple: f64,
    /// Take-profit distance in ATR multiples
    #[serde(default = "default_take_profit_atr_multiple")]
    pub take_profit_atr_multiple: f64,
}

fn default_base_fraction() -> f64 {
    0.10
}

fn default_min_order_value() -> f64 {
    10.0
}

fn default_stop_atr_multiple() -> f64 {
    2.0
}

fn default_take_profit_atr_multiple() -> f64 {
    3.0
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            base_fraction: default_base_fraction(),
            min_order_value: default_min_order_value(),
            stop_atr_multiple: default_stop_atr_multiple(),
            take_profit_atr_multiple: default_take_profit_atr_multiple(),
        }
    }
}

impl RiskConfig {
    /// Compute volatility-scaled exit levels for an entry
    ///
    /// Buy positions stop below and target above the entry; sell positions
    /// are mirrored. The caller supplies a non-negative ATR; no bounds
    /// checking is performed here.
    pub fn exit_levels(&self, entry_price: f64, atr: f64, side: Side) -> ExitLevels {
        match side {
            Side::Buy => ExitLevels {
                stop_loss: entry_price - atr * self.stop_atr_multiple,
                take_profit: entry_price + atr * self.take_profit_atr_multiple,
            },
            Side::Sell => ExitLevels {
                stop_loss: entry_price + atr * self.stop_atr_multiple,
                take_profit: entry_price - atr * self.take_profit_atr_multiple,
            },
        }
    }

    /// Compute position size in base-asset units
    ///
    /// `available_balance * base_fraction * (confidence / 100)` converted to
    /// asset units, floored at the minimum the exchange will accept. Never
    /// negative.
    pub fn position_size(
        &self,
        available_balance: f64,
        confidence_pct: f64,
        current_price: f64,
    ) -> f64 {
        if current_price <= 0.0 {
            return 0.0;
        }

        let confidence = (confidence_pct / 100.0).clamp(0.0, 1.0);
        let base_size = available_balance.max(0.0) * self.base_fraction * confidence
            / current_price;
        let min_size = self.min_order_value / current_price;

        base_size.max(min_size)
    }
}
