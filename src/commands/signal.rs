//! One-shot signal readout, no orders placed

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

use momentum_trader::config::Config;
use momentum_trader::exchange::{ClientConfig, ExchangeApi, RestExchange};
use momentum_trader::indicators;

pub async fn run(config: Config) -> Result<()> {
    let client_config = ClientConfig::default()
        .with_base_url(&config.exchange.base_url)
        .with_timeout(Duration::from_secs(config.exchange.timeout_secs));
    let exchange = RestExchange::new(client_config);

    let engine = &config.engine;
    let candles = exchange
        .fetch_recent_candles(&engine.symbol, engine.candle_count, &engine.interval)
        .await
        .context("Failed to fetch candles")?;
    let price = exchange
        .fetch_current_price(&engine.symbol)
        .await
        .context("Failed to fetch price")?;

    let signal = indicators::generate_signal(&candles);

    info!("{} @ {:.2} ({} candles, {})", engine.symbol, price, candles.len(), engine.interval);
    info!(
        "Signal: {:?} at {:.1}% confidence ({})",
        signal.kind, signal.confidence, signal.reason
    );
    if let Some(ind) = signal.indicators {
        info!(
            "Indicators: RSI {:.1}, EMA5 {:.2}, EMA20 {:.2}, ATR {:.2}",
            ind.rsi, ind.ema_fast, ind.ema_slow, ind.atr
        );
        let levels_side = signal.kind.side();
        if let Some(side) = levels_side {
            let levels = engine.risk.exit_levels(price, ind.atr, side);
            info!(
                "Would enter {} with stop {:.2} / target {:.2}",
                side, levels.stop_loss, levels.take_profit
            );
        }
    }

    Ok(())
}
