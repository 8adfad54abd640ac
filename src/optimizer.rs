//! Grid-search parameter optimization
//!
//! Expands value lists for the tunable strategy parameters into the full
//! cartesian grid, backtests every combination in parallel, and ranks the
//! outcomes by total return. Backtests are pure functions of their inputs,
//! so rayon can fan them out without coordination.

use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::backtest::{run_backtest, BacktestConfig, BacktestResult};
use crate::types::Candle;

/// Value lists for each tunable parameter
///
/// Empty lists fall back to the base configuration's value, so a grid can
/// sweep a single parameter without spelling out the rest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamGrid {
    #[serde(default)]
    pub min_confidence: Vec<f64>,
    #[serde(default)]
    pub base_fraction: Vec<f64>,
    #[serde(default)]
    pub stop_atr_multiple: Vec<f64>,
    #[serde(default)]
    pub take_profit_atr_multiple: Vec<f64>,
    #[serde(default)]
    pub scale_in_threshold_pct: Vec<f64>,
}

impl ParamGrid {
    /// Expand the grid into concrete backtest configurations
    pub fn expand(&self, base: &BacktestConfig) -> Vec<BacktestConfig> {
        let or_base = |values: &[f64], fallback: f64| -> Vec<f64> {
            if values.is_empty() {
                vec![fallback]
            } else {
                values.to_vec()
            }
        };

        let axes = vec![
            or_base(&self.min_confidence, base.min_confidence),
            or_base(&self.base_fraction, base.risk.base_fraction),
            or_base(&self.stop_atr_multiple, base.risk.stop_atr_multiple),
            or_base(
                &self.take_profit_atr_multiple,
                base.risk.take_profit_atr_multiple,
            ),
            or_base(&self.scale_in_threshold_pct, base.scale_in_threshold_pct),
        ];

        axes.into_iter()
            .multi_cartesian_product()
            .map(|combo| {
                let mut config = base.clone();
                config.min_confidence = combo[0];
                config.risk.base_fraction = combo[1];
                config.risk.stop_atr_multiple = combo[2];
                config.risk.take_profit_atr_multiple = combo[3];
                config.scale_in_threshold_pct = combo[4];
                config
            })
            .collect()
    }
}

/// One grid point and its backtest outcome
#[derive(Debug, Clone, Serialize)]
pub struct GridPoint {
    pub config: BacktestConfig,
    pub result: BacktestResult,
}

/// Outcome of a grid search
#[derive(Debug, Clone, Serialize)]
pub struct Optimization {
    pub best: GridPoint,
    /// Every evaluated point, best first
    pub ranked: Vec<GridPoint>,
}

/// Backtest every grid combination and rank by total return
///
/// Returns `None` only for an empty grid, which cannot happen through
/// [`ParamGrid::expand`]. Ties keep the earlier grid point.
pub fn optimize_parameters(
    candles: &[Candle],
    base: &BacktestConfig,
    grid: &ParamGrid,
) -> Option<Optimization> {
    let configs = grid.expand(base);
    optimize_over(candles, configs, None)
}

/// Same as [`optimize_parameters`] with a progress bar for interactive runs
pub fn optimize_parameters_with_progress(
    candles: &[Candle],
    base: &BacktestConfig,
    grid: &ParamGrid,
) -> Option<Optimization> {
    let configs = grid.expand(base);
    let bar = ProgressBar::new(configs.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} combinations ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let result = optimize_over(candles, configs, Some(&bar));
    bar.finish_with_message("grid search complete");
    result
}

fn optimize_over(
    candles: &[Candle],
    configs: Vec<BacktestConfig>,
    bar: Option<&ProgressBar>,
) -> Option<Optimization> {
    if configs.is_empty() {
        return None;
    }

    let mut ranked: Vec<(usize, GridPoint)> = configs
        .into_par_iter()
        .enumerate()
        .map(|(idx, config)| {
            let result = run_backtest(candles, &config);
            if let Some(bar) = bar {
                bar.inc(1);
            }
            (idx, GridPoint { config, result })
        })
        .collect();

    // Best return first; grid order breaks ties
    ranked.sort_by(|(ia, a), (ib, b)| {
        b.result
            .total_return_pct
            .partial_cmp(&a.result.total_return_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(ia.cmp(ib))
    });

    let ranked: Vec<GridPoint> = ranked.into_iter().map(|(_, point)| point).collect();
    let best = ranked[0].clone();

    Some(Optimization { best, ranked })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trending_candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let close = 100.0 + i as f64;
                Candle {
                    timestamp: i as i64 * 3_600_000,
                    open: close - 0.5,
                    high: close + 0.4,
                    low: close - 0.6,
                    close,
                    volume: 1_000.0,
                }
            })
            .collect()
    }

    #[test]
    fn test_expand_cartesian_size() {
        let grid = ParamGrid {
            min_confidence: vec![60.0, 70.0],
            base_fraction: vec![0.05, 0.10, 0.20],
            stop_atr_multiple: vec![],
            take_profit_atr_multiple: vec![3.0],
            scale_in_threshold_pct: vec![],
        };
        let configs = grid.expand(&BacktestConfig::default());

        // 2 x 3 x 1 (fallback) x 1 x 1 (fallback)
        assert_eq!(configs.len(), 6);
        let default_stop = crate::risk::RiskConfig::default().stop_atr_multiple;
        assert!(configs
            .iter()
            .all(|c| c.risk.stop_atr_multiple == default_stop));
    }

    #[test]
    fn test_empty_grid_expands_to_base() {
        let configs = ParamGrid::default().expand(&BacktestConfig::default());
        assert_eq!(configs.len(), 1);
    }

    #[test]
    fn test_best_is_head_of_ranking() {
        let candles = trending_candles(200);
        let grid = ParamGrid {
            min_confidence: vec![60.0, 95.0],
            base_fraction: vec![0.05, 0.20],
            ..Default::default()
        };

        let opt = optimize_parameters(&candles, &BacktestConfig::default(), &grid).unwrap();

        assert_eq!(opt.ranked.len(), 4);
        assert_eq!(
            opt.best.result.total_return_pct,
            opt.ranked[0].result.total_return_pct
        );
        for pair in opt.ranked.windows(2) {
            assert!(pair[0].result.total_return_pct >= pair[1].result.total_return_pct);
        }
    }
}
