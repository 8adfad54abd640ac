//! In-memory position ledger
//!
//! Owns every position the engine opens and the single open -> closed
//! transition. Ids are handed out from a monotonic counter so rapid
//! successive opens within one process can never collide.

use crate::types::{Position, PositionStatus, Side};

/// Ledger of open and closed positions, in insertion order
#[derive(Debug, Default)]
pub struct PositionLedger {
    positions: Vec<Position>,
    next_id: u64,
}

impl PositionLedger {
    pub fn new() -> Self {
        PositionLedger {
            positions: Vec::new(),
            next_id: 1,
        }
    }

    /// Open a new position and append it to the ledger
    ///
    /// `entry_time` is supplied by the caller (wall clock for live trading,
    /// candle timestamp for backtests) so replay results stay deterministic.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        &mut self,
        entry_price: f64,
        size: f64,
        side: Side,
        stop_loss: f64,
        take_profit: f64,
        entry_time: i64,
    ) -> &Position {
        let id = self.next_id;
        self.next_id += 1;

        self.positions.push(Position {
            id,
            entry_price,
            size,
            side,
            stop_loss,
            take_profit,
            entry_time,
            status: PositionStatus::Open,
            exit_price: None,
            exit_time: None,
            pnl: None,
            exit_reason: None,
        });

        self.positions.last().expect("position just pushed")
    }

    /// Close the matching open position, computing realized P&L
    ///
    /// Returns `None` when no open position with this id exists; closed
    /// positions are not found twice. That is a benign no-op for the caller,
    /// not an error.
    pub fn close(&mut self, id: u64, exit_price: f64, exit_time: i64, reason: &str) -> Option<Position> {
        let pos = self
            .positions
            .iter_mut()
            .find(|p| p.id == id && p.status == PositionStatus::Open)?;

        let pnl = match pos.side {
            Side::Buy => (exit_price - pos.entry_price) * pos.size,
            Side::Sell => (pos.entry_price - exit_price) * pos.size,
        };

        pos.status = PositionStatus::Closed;
        pos.exit_price = Some(exit_price);
        pos.exit_time = Some(exit_time);
        pos.pnl = Some(pnl);
        pos.exit_reason = Some(reason.to_string());

        Some(pos.clone())
    }

    /// Open positions in insertion order
    pub fn open_positions(&self) -> Vec<&Position> {
        self.positions.iter().filter(|p| p.is_open()).collect()
    }

    /// Number of currently open positions
    pub fn open_count(&self) -> usize {
        self.positions.iter().filter(|p| p.is_open()).count()
    }

    /// Most recently opened position still open in the given direction
    pub fn last_open_in_direction(&self, side: Side) -> Option<&Position> {
        self.positions
            .iter()
            .filter(|p| p.is_open() && p.side == side)
            .next_back()
    }

    /// Sum of `entry_price * size` over open positions
    pub fn total_invested(&self) -> f64 {
        self.positions
            .iter()
            .filter(|p| p.is_open())
            .map(|p| p.entry_value())
            .sum()
    }

    /// Total realized P&L over closed positions
    pub fn realized_pnl(&self) -> f64 {
        self.positions.iter().filter_map(|p| p.pnl).sum()
    }

    /// Every position ever opened, in insertion order
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Closed positions in insertion order
    pub fn closed_positions(&self) -> Vec<&Position> {
        self.positions.iter().filter(|p| !p.is_open()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_open_assigns_unique_ids() {
        let mut ledger = PositionLedger::new();
        let a = ledger.open(100.0, 1.0, Side::Buy, 95.0, 110.0, 0).id;
        let b = ledger.open(100.0, 1.0, Side::Buy, 95.0, 110.0, 0).id;
        let c = ledger.open(100.0, 1.0, Side::Sell, 105.0, 90.0, 0).id;

        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_eq!(ledger.open_count(), 3);
    }

    #[test]
    fn test_close_round_trip() {
        let mut ledger = PositionLedger::new();
        let id = ledger.open(100.0, 2.0, Side::Buy, 95.0, 110.0, 1_000).id;

        let closed = ledger.close(id, 110.0, 2_000, "take profit").unwrap();
        assert_eq!(closed.status, PositionStatus::Closed);
        assert_relative_eq!(closed.pnl.unwrap(), 20.0);
        assert_eq!(closed.exit_price, Some(110.0));
        assert_eq!(closed.exit_time, Some(2_000));
        assert_eq!(closed.exit_reason.as_deref(), Some("take profit"));

        // Second close on the same id is a benign no-op
        assert!(ledger.close(id, 120.0, 3_000, "again").is_none());
        assert_eq!(ledger.open_count(), 0);
    }

    #[test]
    fn test_close_sell_pnl_is_negated_form() {
        let mut ledger = PositionLedger::new();
        let id = ledger.open(100.0, 2.0, Side::Sell, 105.0, 90.0, 0).id;

        let closed = ledger.close(id, 90.0, 1, "take profit").unwrap();
        assert_relative_eq!(closed.pnl.unwrap(), 20.0);
    }

    #[test]
    fn test_close_unknown_id_is_none() {
        let mut ledger = PositionLedger::new();
        assert!(ledger.close(42, 100.0, 0, "stop loss").is_none());
    }

    #[test]
    fn test_total_invested_counts_open_only() {
        let mut ledger = PositionLedger::new();
        let id = ledger.open(100.0, 1.0, Side::Buy, 95.0, 110.0, 0).id;
        ledger.open(200.0, 0.5, Side::Buy, 190.0, 220.0, 0);

        assert_relative_eq!(ledger.total_invested(), 200.0);

        ledger.close(id, 110.0, 1, "take profit");
        assert_relative_eq!(ledger.total_invested(), 100.0);
    }

    #[test]
    fn test_last_open_in_direction() {
        let mut ledger = PositionLedger::new();
        ledger.open(100.0, 1.0, Side::Buy, 95.0, 110.0, 0);
        let second = ledger.open(105.0, 1.0, Side::Buy, 100.0, 115.0, 1).id;
        ledger.open(103.0, 1.0, Side::Sell, 108.0, 95.0, 2);

        let last_buy = ledger.last_open_in_direction(Side::Buy).unwrap();
        assert_eq!(last_buy.id, second);
        assert_relative_eq!(last_buy.entry_price, 105.0);
    }
}
