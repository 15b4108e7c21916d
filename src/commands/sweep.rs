use crate::config::BacktestConfig;
use crate::data_file::load_candles_csv;
use crate::runner::{run_sweep, SweepTask};
use crate::strategy::StrategyRegistry;
use anyhow::Result;
use log::info;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

/// Backtest every registered strategy over the same series and print a
/// leaderboard ranked by total return.
pub async fn run(data_file: &Path, symbol: &str, config: BacktestConfig) -> Result<()> {
    let candles = load_candles_csv(data_file)?;
    info!(
        "Loaded {} candles from {}",
        candles.len(),
        data_file.display()
    );

    let registry = StrategyRegistry::with_builtins();
    let tasks: Vec<SweepTask> = registry
        .list()
        .into_iter()
        .map(|algorithm_id| SweepTask {
            algorithm_id,
            symbol: symbol.to_string(),
            parameters: HashMap::new(),
        })
        .collect();

    let mut outcomes = run_sweep(&registry, tasks, &config, &candles);
    outcomes.sort_by(|a, b| {
        let a_return = a
            .run
            .as_ref()
            .map(|r| r.metrics.total_return_percentage)
            .unwrap_or(f64::NEG_INFINITY);
        let b_return = b
            .run
            .as_ref()
            .map(|r| r.metrics.total_return_percentage)
            .unwrap_or(f64::NEG_INFINITY);
        b_return.partial_cmp(&a_return).unwrap_or(Ordering::Equal)
    });

    println!(
        "{:<20} {:>10} {:>8} {:>8} {:>9} {:>8}",
        "strategy", "return %", "trades", "win %", "max dd %", "sharpe"
    );
    for outcome in &outcomes {
        match &outcome.run {
            Ok(result) => {
                let metrics = &result.metrics;
                println!(
                    "{:<20} {:>10.2} {:>8} {:>8.1} {:>9.2} {:>8.2}",
                    outcome.algorithm_id,
                    metrics.total_return_percentage,
                    metrics.total_trades,
                    metrics.win_rate,
                    metrics.max_drawdown_percentage,
                    metrics.sharpe_ratio,
                );
            }
            Err(error) => {
                println!("{:<20} failed: {}", outcome.algorithm_id, error);
            }
        }
    }

    Ok(())
}
