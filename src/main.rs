use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

use momentum_trader::config::Config;

#[derive(Parser)]
#[command(name = "momentum-trader")]
#[command(about = "Indicator-driven trading bot with backtesting", long_about = None)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json", global = true)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the live trading loop
    Live {
        /// Seconds between evaluation cycles
        #[arg(short, long, default_value_t = 60)]
        interval: u64,
    },
    /// Fetch market data and print the current signal, placing no orders
    Signal,
    /// Replay a historical candle file through the strategy
    Backtest {
        /// CSV candle file (timestamp,open,high,low,close,volume)
        #[arg(short, long)]
        data: String,
    },
    /// Grid-search strategy parameters over a historical candle file
    Optimize {
        /// CSV candle file (timestamp,open,high,low,close,volume)
        #[arg(short, long)]
        data: String,
        /// How many ranked combinations to print
        #[arg(short, long, default_value_t = 10)]
        top: usize,
    },
    /// Flip or inspect the persisted trading switch
    Switch {
        #[command(subcommand)]
        action: commands::SwitchAction,
    },
}

fn setup_logging(command: &str) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::daily("logs", format!("{}.log", command));
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,hyper=warn,reqwest=warn,rustls=warn")
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let command_name = match &cli.command {
        Commands::Live { .. } => "live",
        Commands::Signal => "signal",
        Commands::Backtest { .. } => "backtest",
        Commands::Optimize { .. } => "optimize",
        Commands::Switch { .. } => "switch",
    };
    let _guard = setup_logging(command_name);

    let config = Config::from_file(&cli.config).unwrap_or_else(|e| {
        tracing::warn!("Using default configuration: {}", e);
        Config::default()
    });

    match cli.command {
        Commands::Live { interval } => commands::live::run(config, interval).await,
        Commands::Signal => commands::signal::run(config).await,
        Commands::Backtest { data } => commands::backtest::run(config, &data),
        Commands::Optimize { data, top } => commands::optimize::run(config, &data, top),
        Commands::Switch { action } => commands::switch_cmd(config, action),
    }
}
