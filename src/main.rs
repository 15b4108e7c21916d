use anyhow::Result;
use backtester::commands::{
    backtest, list_strategies, parse_end_date, parse_parameters, parse_start_date, sweep,
};
use backtester::config::BacktestConfig;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "backtester")]
#[command(about = "Event-driven trading strategy backtesting engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest a single strategy over a CSV candle file
    Backtest {
        /// Path to a CSV file with timestamp,open,high,low,close,volume rows
        data_file: PathBuf,
        /// Strategy to run (see list-strategies)
        #[arg(long)]
        strategy: String,
        /// Symbol the series belongs to
        #[arg(long, default_value = "BTC/USDT")]
        symbol: String,
        /// Backtest window start (YYYY-MM-DD)
        #[arg(long)]
        start: String,
        /// Backtest window end (YYYY-MM-DD, inclusive)
        #[arg(long)]
        end: String,
        /// Starting capital
        #[arg(long, default_value_t = 10_000.0)]
        capital: f64,
        /// Commission as a fraction of notional per side (0.001 = 0.1%)
        #[arg(long, default_value_t = 0.001)]
        commission: f64,
        /// Slippage as a fraction of price (0.0005 = 0.05%)
        #[arg(long, default_value_t = 0.0005)]
        slippage: f64,
        /// Maximum concurrently open positions
        #[arg(long, default_value_t = 5)]
        max_positions: usize,
        /// Candles skipped before signal generation starts
        #[arg(long, default_value_t = 50)]
        warmup: usize,
        /// Enable a global trailing stop at this percentage below the peak
        #[arg(long)]
        trailing_stop_percent: Option<f64>,
        /// Strategy parameter overrides as key=value (repeatable)
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
        /// Use the fast vectorized path instead of the event-driven replay
        #[arg(long)]
        vectorized: bool,
        /// Write the full result as JSON to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Backtest every bundled strategy over the same series and rank them
    Sweep {
        /// Path to a CSV file with timestamp,open,high,low,close,volume rows
        data_file: PathBuf,
        /// Symbol the series belongs to
        #[arg(long, default_value = "BTC/USDT")]
        symbol: String,
        /// Backtest window start (YYYY-MM-DD)
        #[arg(long)]
        start: String,
        /// Backtest window end (YYYY-MM-DD, inclusive)
        #[arg(long)]
        end: String,
        /// Starting capital
        #[arg(long, default_value_t = 10_000.0)]
        capital: f64,
        /// Candles skipped before signal generation starts
        #[arg(long, default_value_t = 50)]
        warmup: usize,
    },
    /// List the bundled strategies
    ListStrategies,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Backtest {
            data_file,
            strategy,
            symbol,
            start,
            end,
            capital,
            commission,
            slippage,
            max_positions,
            warmup,
            trailing_stop_percent,
            params,
            vectorized,
            output,
        } => {
            let mut config = BacktestConfig::new(parse_start_date(&start)?, parse_end_date(&end)?)
                .with_initial_capital(capital)
                .with_commission(commission)
                .with_slippage(slippage)
                .with_max_positions(max_positions)
                .with_warmup_period(warmup);
            if let Some(percent) = trailing_stop_percent {
                config = config.with_trailing_stop(true, percent);
            }

            let parameters = parse_parameters(&params)?;
            info!("Backtesting {} on {}", strategy, symbol);
            backtest::run(
                &data_file,
                &strategy,
                &symbol,
                parameters,
                config,
                vectorized,
                output.as_deref(),
            )
            .await?;
        }
        Commands::Sweep {
            data_file,
            symbol,
            start,
            end,
            capital,
            warmup,
        } => {
            let config = BacktestConfig::new(parse_start_date(&start)?, parse_end_date(&end)?)
                .with_initial_capital(capital)
                .with_warmup_period(warmup);
            sweep::run(&data_file, &symbol, config).await?;
        }
        Commands::ListStrategies => {
            list_strategies::run().await?;
        }
    }

    Ok(())
}
