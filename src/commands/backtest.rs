//! Backtest subcommand

use anyhow::Result;
use tracing::info;

use momentum_trader::backtest::run_backtest;
use momentum_trader::config::Config;
use momentum_trader::data;

pub fn run(config: Config, data_path: &str) -> Result<()> {
    let candles = data::load_candles(data_path)?;
    let bt_config = config.backtest_config();

    info!(
        "Backtesting {} candles with min confidence {:.0}%, max {} positions",
        candles.len(),
        bt_config.min_confidence,
        bt_config.max_positions
    );

    let result = run_backtest(&candles, &bt_config);

    info!("=== Backtest Result ===");
    info!(
        "Balance: {:.2} -> {:.2} ({:+.2}%)",
        result.initial_balance, result.final_balance, result.total_return_pct
    );
    info!(
        "Trades: {} ({} wins / {} losses, {:.1}% win rate)",
        result.total_trades, result.winning_trades, result.losing_trades, result.win_rate_pct
    );
    info!(
        "Avg win: {:.2}, avg loss: {:.2}, profit factor: {:.2}",
        result.avg_win, result.avg_loss, result.profit_factor
    );
    info!("Max drawdown: {:.2}%", result.max_drawdown_pct);

    Ok(())
}
