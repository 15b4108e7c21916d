use crate::config::BacktestConfig;
use crate::data_file::load_candles_csv;
use crate::engine::BacktestEngine;
use crate::strategy::StrategyRegistry;
use anyhow::{Context, Result};
use log::info;
use std::collections::HashMap;
use std::path::Path;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    data_file: &Path,
    algorithm_id: &str,
    symbol: &str,
    parameters: HashMap<String, f64>,
    config: BacktestConfig,
    vectorized: bool,
    output: Option<&Path>,
) -> Result<()> {
    let candles = load_candles_csv(data_file)?;
    info!(
        "Loaded {} candles from {}",
        candles.len(),
        data_file.display()
    );

    let registry = StrategyRegistry::with_builtins();
    let mut strategy = registry.create(algorithm_id, symbol, parameters)?;
    let mut engine = BacktestEngine::new(config);

    let result = if vectorized {
        engine.run_vectorized(strategy.as_mut(), &candles)?
    } else {
        engine.run(strategy.as_mut(), &candles)?
    };

    println!("{}", result.summary());
    if vectorized {
        println!("(vectorized fast path: no commissions, slippage or per-trade metrics)");
    }

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write result to {}", path.display()))?;
        info!("Wrote result JSON to {}", path.display());
    }

    Ok(())
}
