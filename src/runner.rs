use crate::config::BacktestConfig;
use crate::engine::BacktestEngine;
use crate::models::{BacktestResult, Candle};
use crate::strategy::StrategyRegistry;
use crossbeam_channel::{bounded, Receiver, Sender};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::collections::HashMap;
use std::thread;

pub struct SweepTask {
    pub algorithm_id: String,
    pub symbol: String,
    pub parameters: HashMap<String, f64>,
}

pub struct SweepOutcome {
    pub algorithm_id: String,
    pub run: Result<BacktestResult, String>,
}

/// Run one backtest per task across worker threads.
///
/// Every task gets a freshly constructed engine instance; engine state is
/// never shared between concurrent runs. Each run itself stays strictly
/// single-threaded.
pub fn run_sweep(
    registry: &StrategyRegistry,
    tasks: Vec<SweepTask>,
    config: &BacktestConfig,
    candles: &[Candle],
) -> Vec<SweepOutcome> {
    let total = tasks.len();
    if total == 0 {
        return Vec::new();
    }

    let num_workers = total.min(num_cpus::get().max(1));
    info!(
        "Running {} backtest{} on {} worker thread{}",
        total,
        if total == 1 { "" } else { "s" },
        num_workers,
        if num_workers == 1 { "" } else { "s" }
    );

    let (task_tx, task_rx): (Sender<SweepTask>, Receiver<SweepTask>) = bounded(total);
    let (result_tx, result_rx): (Sender<SweepOutcome>, Receiver<SweepOutcome>) = bounded(total);

    let progress = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}") {
        progress.set_style(style);
    }

    let mut outcomes = Vec::with_capacity(total);

    thread::scope(|scope| {
        for _ in 0..num_workers {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                while let Ok(task) = task_rx.recv() {
                    let SweepTask {
                        algorithm_id,
                        symbol,
                        parameters,
                    } = task;

                    let run = registry
                        .create(&algorithm_id, &symbol, parameters)
                        .map_err(|err| err.to_string())
                        .and_then(|mut strategy| {
                            let mut engine = BacktestEngine::new(config.clone());
                            engine
                                .run(strategy.as_mut(), candles)
                                .map_err(|err| err.to_string())
                        });

                    if result_tx.send(SweepOutcome { algorithm_id, run }).is_err() {
                        break;
                    }
                }
            });
        }

        for task in tasks {
            task_tx
                .send(task)
                .expect("task channel is sized to the task count");
        }
        drop(task_tx);
        drop(result_tx);

        while let Ok(outcome) = result_rx.recv() {
            if let Err(error) = &outcome.run {
                warn!("backtest for {} failed: {}", outcome.algorithm_id, error);
            }
            progress.inc(1);
            outcomes.push(outcome);
        }
    });

    progress.finish_and_clear();
    // Arrival order depends on worker scheduling; keep the output stable.
    outcomes.sort_by(|a, b| a.algorithm_id.cmp(&b.algorithm_id));
    outcomes
}
