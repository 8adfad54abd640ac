//! Exchange collaborator contract
//!
//! The decision engine depends on this trait, not on a concrete client, so
//! cycles can be driven against the live REST client or against mocks in
//! tests. Every method returns a typed error: the engine's "skip this
//! cycle" branches match on failure variants instead of navigating around
//! missing data.

pub mod client;
pub mod types;

pub use client::{ClientConfig, RestExchange};
pub use types::{Balance, OrderAck};

use std::collections::HashMap;
use thiserror::Error;

use crate::types::{Candle, Side, Symbol};

/// Failure taxonomy for exchange calls
///
/// All variants are recoverable from the engine's perspective: the current
/// cycle degrades to a no-op and the scheduler tries again next interval.
/// Retries within a call belong to the transport, not the engine.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("exchange api error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed exchange response: {0}")]
    Parse(String),
}

/// Account balances keyed by asset code
pub type AccountBalances = HashMap<String, Balance>;

/// Exchange operations the decision engine consumes
///
/// Calls within one evaluation cycle are issued sequentially; bounded
/// timeouts are the implementation's responsibility.
#[allow(async_fn_in_trait)]
pub trait ExchangeApi {
    /// Latest traded price for the symbol
    async fn fetch_current_price(&self, symbol: &Symbol) -> Result<f64, ExchangeError>;

    /// Recent candles in chronological order, at most `count` of them
    async fn fetch_recent_candles(
        &self,
        symbol: &Symbol,
        count: usize,
        interval: &str,
    ) -> Result<Vec<Candle>, ExchangeError>;

    /// All account balances
    async fn fetch_balances(&self) -> Result<AccountBalances, ExchangeError>;

    /// Place a market order
    ///
    /// A rejected order is not a transport failure: it comes back as
    /// `Ok(OrderAck { success: false, .. })` with the exchange's message.
    async fn place_market_order(
        &self,
        side: Side,
        size: f64,
        symbol: &Symbol,
    ) -> Result<OrderAck, ExchangeError>;
}
