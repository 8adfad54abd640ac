//! Grid-search subcommand

use anyhow::{bail, Result};
use tracing::info;

use momentum_trader::config::Config;
use momentum_trader::data;
use momentum_trader::optimizer::{optimize_parameters_with_progress, ParamGrid};

pub fn run(config: Config, data_path: &str, top: usize) -> Result<()> {
    let candles = data::load_candles(data_path)?;
    let base = config.backtest_config();
    let grid = config.grid.clone().unwrap_or_else(default_grid);

    let Some(opt) = optimize_parameters_with_progress(&candles, &base, &grid) else {
        bail!("Parameter grid expanded to zero combinations");
    };

    info!("=== Top {} of {} combinations ===", top.min(opt.ranked.len()), opt.ranked.len());
    for (rank, point) in opt.ranked.iter().take(top).enumerate() {
        info!(
            "#{:<2} return {:+7.2}%  trades {:>3}  win rate {:5.1}%  conf>={:>4.0}  frac {:.2}  stop {:.1}xATR  target {:.1}xATR",
            rank + 1,
            point.result.total_return_pct,
            point.result.total_trades,
            point.result.win_rate_pct,
            point.config.min_confidence,
            point.config.risk.base_fraction,
            point.config.risk.stop_atr_multiple,
            point.config.risk.take_profit_atr_multiple,
        );
    }

    let best = &opt.best;
    info!(
        "Best: {:+.2}% with min confidence {:.0}, base fraction {:.2}, stop {:.1}xATR, target {:.1}xATR, scale-in {:.1}%",
        best.result.total_return_pct,
        best.config.min_confidence,
        best.config.risk.base_fraction,
        best.config.risk.stop_atr_multiple,
        best.config.risk.take_profit_atr_multiple,
        best.config.scale_in_threshold_pct,
    );

    Ok(())
}

/// Default sweep when the config file carries no grid section
fn default_grid() -> ParamGrid {
    ParamGrid {
        min_confidence: vec![60.0, 70.0, 80.0],
        base_fraction: vec![0.05, 0.10, 0.20],
        stop_atr_multiple: vec![1.5, 2.0, 2.5],
        take_profit_atr_multiple: vec![2.0, 3.0, 4.0],
        scale_in_threshold_pct: vec![],
    }
}
