//! Momentum trading bot: indicator-driven signals, risk-managed entries,
//! and historical backtesting against the same decision logic.
//!
//! The crate is organized around one unit of work, the evaluation cycle:
//! [`engine::TradingEngine::run_evaluation_cycle`] gates on the persisted
//! [`switch`], snapshots market data through the [`exchange`] contract,
//! derives a composite signal from [`indicators`], applies [`risk`] sizing
//! and exit levels, and records outcomes in the [`ledger`]. The
//! [`backtest`] engine replays the identical logic over historical candles,
//! and [`optimizer`] grid-searches its parameters.

pub mod backtest;
pub mod config;
pub mod data;
pub mod engine;
pub mod events;
pub mod exchange;
pub mod indicators;
pub mod ledger;
pub mod optimizer;
pub mod risk;
pub mod switch;
pub mod types;

pub use backtest::{run_backtest, BacktestConfig, BacktestResult};
pub use engine::{CycleAction, CycleReport, EngineConfig, TradingEngine};
pub use ledger::PositionLedger;
pub use risk::RiskConfig;
pub use switch::{SqliteSwitch, SwitchState, TradingSwitch};
pub use types::{Candle, Position, Side, SignalKind, Symbol, TradeSignal};
