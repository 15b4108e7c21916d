use anyhow::Result;
use backtester::config::BacktestConfig;
use backtester::engine::BacktestEngine;
use backtester::models::{Candle, Signal, SignalType};
use backtester::strategy::{Strategy, StrategyState};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashMap;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn candle(index: usize, close: f64) -> Candle {
    Candle {
        timestamp: base_time() + Duration::hours(index as i64),
        open: close,
        high: close + 0.5,
        low: close - 0.5,
        close,
        volume: 1_000.0,
    }
}

fn wavy_candles(count: usize) -> Vec<Candle> {
    (0..count)
        .map(|i| candle(i, 100.0 + (i as f64 * 0.6).sin() * 10.0))
        .collect()
}

fn config_for(candles: &[Candle]) -> BacktestConfig {
    BacktestConfig::new(
        candles.first().unwrap().timestamp,
        candles.last().unwrap().timestamp,
    )
    .with_warmup_period(0)
    .with_commission(0.0)
    .with_slippage(0.0)
}

struct ScriptedStrategy {
    symbols: Vec<String>,
    script: Vec<(usize, Signal)>,
}

impl Strategy for ScriptedStrategy {
    fn algorithm_id(&self) -> &str {
        "scripted"
    }

    fn symbols(&self) -> &[String] {
        &self.symbols
    }

    fn generate_buy_signals(&mut self, candles: &[Candle]) -> Result<HashMap<String, Vec<bool>>> {
        let mut series = vec![false; candles.len()];
        for (index, signal) in &self.script {
            if *index < candles.len() && signal.signal_type == SignalType::Buy {
                series[*index] = true;
            }
        }
        Ok(HashMap::from([(self.symbols[0].clone(), series)]))
    }

    fn generate_sell_signals(&mut self, candles: &[Candle]) -> Result<HashMap<String, Vec<bool>>> {
        let mut series = vec![false; candles.len()];
        for (index, signal) in &self.script {
            if *index < candles.len() && signal.signal_type == SignalType::Sell {
                series[*index] = true;
            }
        }
        Ok(HashMap::from([(self.symbols[0].clone(), series)]))
    }

    fn latest_signals(&mut self, candles: &[Candle], _state: &mut StrategyState) -> Vec<Signal> {
        let current = candles.len() - 1;
        self.script
            .iter()
            .filter(|(index, _)| *index == current)
            .map(|(_, signal)| signal.clone())
            .collect()
    }
}

fn scripted(symbol: &str, script: Vec<(usize, Signal)>) -> ScriptedStrategy {
    ScriptedStrategy {
        symbols: vec![symbol.to_string()],
        script,
    }
}

fn buy(symbol: &str) -> Signal {
    Signal::new(SignalType::Buy, symbol, 0.0, base_time())
}

fn sell(symbol: &str) -> Signal {
    Signal::new(SignalType::Sell, symbol, 0.0, base_time())
}

#[test]
fn drawdown_matches_running_peak_definition() {
    let candles = wavy_candles(80);
    let config = config_for(&candles);
    let mut engine = BacktestEngine::new(config);
    let mut strategy = scripted("AAA", vec![(0, buy("AAA"))]);

    let result = engine.run(&mut strategy, &candles).unwrap();

    let mut running_peak = f64::NEG_INFINITY;
    for point in &result.equity_curve {
        running_peak = running_peak.max(point.equity);
        let expected = running_peak - point.equity;
        assert!(
            (point.drawdown - expected).abs() < 1e-9,
            "drawdown {} vs expected {}",
            point.drawdown,
            expected
        );
        let expected_pct = if running_peak > 0.0 {
            expected / running_peak * 100.0
        } else {
            0.0
        };
        assert!((point.drawdown_percentage - expected_pct).abs() < 1e-9);
    }
}

#[test]
fn winning_only_run_reports_infinite_profit_factor() {
    // Close 100 until candle 9, then 120: one profitable round trip.
    let candles: Vec<Candle> = (0..30)
        .map(|i| candle(i, if i < 10 { 100.0 } else { 120.0 }))
        .collect();
    let config = config_for(&candles);
    let mut engine = BacktestEngine::new(config);
    let mut strategy = scripted("AAA", vec![(2, buy("AAA")), (20, sell("AAA"))]);

    let result = engine.run(&mut strategy, &candles).unwrap();
    assert_eq!(result.metrics.total_trades, 1);
    assert_eq!(result.metrics.winning_trades, 1);
    assert!(result.metrics.profit_factor.is_infinite());
    assert_eq!(result.metrics.max_consecutive_wins, 1);
    assert_eq!(result.metrics.max_consecutive_losses, 0);
}

#[test]
fn signal_free_run_reports_default_metrics() {
    let candles = wavy_candles(40);
    let config = config_for(&candles);
    let mut engine = BacktestEngine::new(config);
    let mut strategy = scripted("AAA", vec![]);

    let result = engine.run(&mut strategy, &candles).unwrap();
    assert!(result.trades.is_empty());
    // Zero trades: an all-default metrics object, not an error.
    assert_eq!(result.metrics.total_trades, 0);
    assert_eq!(result.metrics.total_return, 0.0);
    assert_eq!(result.metrics.sharpe_ratio, 0.0);
    assert_eq!(result.equity_curve.len(), 40);
}

#[test]
fn result_serializes_with_string_enums_and_iso_timestamps() {
    let candles: Vec<Candle> = (0..20)
        .map(|i| candle(i, if i < 10 { 100.0 } else { 90.0 }))
        .collect();
    let config = config_for(&candles);
    let mut engine = BacktestEngine::new(config);
    let entry = buy("AAA").with_metadata("stop_loss", 95.0);
    let mut strategy = scripted("AAA", vec![(2, entry)]);

    let result = engine.run(&mut strategy, &candles).unwrap();
    assert_eq!(result.trades.len(), 1);

    let value: serde_json::Value = serde_json::to_value(&result).unwrap();
    let trade = &value["trades"][0];
    assert_eq!(trade["trade_type"], "stop_loss");
    assert_eq!(trade["side"], "long");
    assert!(trade["entry_time"]
        .as_str()
        .unwrap()
        .starts_with("2024-01-01T"));
    assert!(value["equity_curve"][0]["drawdownPercentage"].is_number());
    assert!(value["config"]["initial_capital"].is_number());

    // And the whole document deserializes back.
    let roundtrip: backtester::models::BacktestResult =
        serde_json::from_value(value).unwrap();
    assert_eq!(roundtrip.trades.len(), result.trades.len());
}

#[test]
fn vectorized_mode_is_all_in_and_cost_free() {
    // 100 for 10 candles, 110 for 10, then 99 for the rest.
    let candles: Vec<Candle> = (0..30)
        .map(|i| {
            let close = if i < 10 {
                100.0
            } else if i < 20 {
                110.0
            } else {
                99.0
            };
            candle(i, close)
        })
        .collect();
    let config = config_for(&candles).with_initial_capital(10_000.0);
    let mut engine = BacktestEngine::new(config);
    let mut strategy = scripted("AAA", vec![(0, buy("AAA")), (15, sell("AAA"))]);

    let result = engine.run_vectorized(&mut strategy, &candles).unwrap();

    // All-in at 100, liquidated at 110: equity locks at 11_000 and ignores
    // the later slide to 99.
    assert!((result.metrics.total_return - 1_000.0).abs() < 1e-9);
    assert!((result.metrics.total_return_percentage - 10.0).abs() < 1e-9);
    assert!(result.trades.is_empty());
    assert_eq!(result.equity_curve.len(), 30);
    let last = result.equity_curve.last().unwrap();
    assert!((last.equity - 11_000.0).abs() < 1e-9);
    assert!((last.cash - 11_000.0).abs() < 1e-9);
    assert_eq!(last.position_value, 0.0);
    // No per-trade metrics on the fast path.
    assert_eq!(result.metrics.total_trades, 0);
    assert_eq!(result.metrics.sharpe_ratio, 0.0);

    // Mark-to-market happens every step while the position is held.
    let held_point = &result.equity_curve[12];
    assert!((held_point.equity - 11_000.0).abs() < 1e-9);
    assert_eq!(held_point.cash, 0.0);
}

#[test]
fn engine_reset_restores_initial_state() {
    let candles = wavy_candles(40);
    let config = config_for(&candles);
    let mut engine = BacktestEngine::new(config.clone());
    let mut strategy = scripted("AAA", vec![(1, buy("AAA")), (20, sell("AAA"))]);

    let first = engine.run(&mut strategy, &candles).unwrap();
    assert_eq!(first.trades.len(), 1);

    // run() resets on entry: a second run over the same engine with a fresh
    // strategy reproduces the first result exactly.
    let mut strategy_again = scripted("AAA", vec![(1, buy("AAA")), (20, sell("AAA"))]);
    let second = engine.run(&mut strategy_again, &candles).unwrap();
    assert_eq!(
        serde_json::to_string(&first.trades).unwrap(),
        serde_json::to_string(&second.trades).unwrap()
    );
    assert_eq!(
        serde_json::to_string(&first.equity_curve).unwrap(),
        serde_json::to_string(&second.equity_curve).unwrap()
    );

    engine.reset();
    assert_eq!(engine.cash(), config.initial_capital);
    assert!(engine.open_positions().is_empty());
    assert!(engine.trades().is_empty());
    assert!(engine.equity_curve().is_empty());
}

#[test]
fn summary_renders_the_key_figures() {
    let candles: Vec<Candle> = (0..30)
        .map(|i| candle(i, if i < 15 { 100.0 } else { 110.0 }))
        .collect();
    let config = config_for(&candles);
    let mut engine = BacktestEngine::new(config);
    let mut strategy = scripted("AAA", vec![(2, buy("AAA")), (20, sell("AAA"))]);

    let result = engine.run(&mut strategy, &candles).unwrap();
    let summary = result.summary();
    assert!(summary.contains("Backtest summary"));
    assert!(summary.contains("Trades: 1"));
    assert!(summary.contains("Win rate: 100.0%"));
}
