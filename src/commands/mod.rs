//! CLI subcommand implementations

pub mod backtest;
pub mod live;
pub mod optimize;
pub mod signal;

use anyhow::Result;
use clap::Subcommand;
use tracing::info;

use momentum_trader::config::Config;
use momentum_trader::switch::{SqliteSwitch, TradingSwitch};

/// Operator actions on the persisted trading switch
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum SwitchAction {
    /// Enable live trading
    On,
    /// Disable live trading
    Off,
    /// Print the current switch state
    Status,
}

pub fn switch_cmd(config: Config, action: SwitchAction) -> Result<()> {
    let switch = SqliteSwitch::open(&config.switch_db)?;

    match action {
        SwitchAction::On => switch.set_enabled(true)?,
        SwitchAction::Off => switch.set_enabled(false)?,
        SwitchAction::Status => {
            info!("Trading switch: {:?}", switch.state());
        }
    }

    Ok(())
}
