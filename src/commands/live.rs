//! Live trading loop

use anyhow::Result;
use std::time::Duration;
use tracing::{error, info};

use momentum_trader::config::Config;
use momentum_trader::engine::TradingEngine;
use momentum_trader::events::EventCategory;
use momentum_trader::exchange::{ClientConfig, RestExchange};
use momentum_trader::switch::SqliteSwitch;

pub async fn run(config: Config, interval_secs: u64) -> Result<()> {
    let mut client_config = ClientConfig::default()
        .with_base_url(&config.exchange.base_url)
        .with_timeout(Duration::from_secs(config.exchange.timeout_secs));
    if let (Some(key), Some(secret)) = (
        config.exchange.api_key.clone(),
        config.exchange.api_secret.clone(),
    ) {
        client_config = client_config.with_credentials(key, secret);
    }

    let exchange = RestExchange::new(client_config);
    let switch = SqliteSwitch::open(&config.switch_db)?;
    let mut engine = TradingEngine::new(config.engine.clone(), exchange, switch);

    // Mirror the event stream into the log so the cycle's reasoning is
    // visible without a separate observer
    let mut events = engine.events().subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event.category {
                EventCategory::Error => error!("[event] {}", event.message),
                _ => info!("[event] {}", event.message),
            }
        }
    });

    info!(
        "Live trading loop started: {} every {}s (flip with the `switch` subcommand)",
        config.engine.symbol, interval_secs
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = engine.run_evaluation_cycle().await;
                let stats = engine.trading_statistics();
                info!(
                    "Cycle {} done: {:?} ({} open, realized pnl {:.2})",
                    report.cycle, report.action, stats.open_positions, stats.realized_pnl
                );
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    let stats = engine.trading_statistics();
    info!(
        "Final: {} cycles, {} closed trades ({} wins), realized pnl {:.2}, {} still open",
        stats.cycles,
        stats.closed_trades,
        stats.winning_trades,
        stats.realized_pnl,
        stats.open_positions
    );

    Ok(())
}
