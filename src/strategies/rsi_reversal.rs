use crate::candle_utils::closes;
use crate::indicators;
use crate::models::Candle;
use crate::param_utils::{get_param_f64, get_param_usize};
use anyhow::Result;
use std::collections::HashMap;

/// RSI mean-reversion strategy: buys when RSI recovers up through the
/// oversold level, sells when it falls back down through the overbought level.
pub struct RsiReversalStrategy {
    symbols: Vec<String>,
    period: usize,
    oversold_level: f64,
    overbought_level: f64,
}

impl RsiReversalStrategy {
    pub fn new(symbol: impl Into<String>, parameters: HashMap<String, f64>) -> Self {
        Self {
            symbols: vec![symbol.into()],
            period: get_param_usize(&parameters, "period", 14, 2),
            oversold_level: get_param_f64(&parameters, "oversoldLevel", 30.0),
            overbought_level: get_param_f64(&parameters, "overboughtLevel", 70.0),
        }
    }

    fn rsi_series(&self, candles: &[Candle]) -> Vec<f64> {
        indicators::rsi(&closes(candles), self.period)
    }
}

impl super::Strategy for RsiReversalStrategy {
    fn algorithm_id(&self) -> &str {
        "rsi-reversal"
    }

    fn symbols(&self) -> &[String] {
        &self.symbols
    }

    fn min_data_points(&self) -> usize {
        self.period + 1
    }

    fn generate_buy_signals(&mut self, candles: &[Candle]) -> Result<HashMap<String, Vec<bool>>> {
        let mut signals = HashMap::new();
        if candles.len() < self.min_data_points() {
            return Ok(signals);
        }

        let rsi = self.rsi_series(candles);
        let mut series = vec![false; candles.len()];
        for i in 1..rsi.len() {
            // Oversold and now rising back above the threshold
            series[i] = rsi[i - 1] < self.oversold_level && rsi[i] > self.oversold_level;
        }

        signals.insert(self.symbols[0].clone(), series);
        Ok(signals)
    }

    fn generate_sell_signals(&mut self, candles: &[Candle]) -> Result<HashMap<String, Vec<bool>>> {
        let mut signals = HashMap::new();
        if candles.len() < self.min_data_points() {
            return Ok(signals);
        }

        let rsi = self.rsi_series(candles);
        let mut series = vec![false; candles.len()];
        for i in 1..rsi.len() {
            // Overbought and now falling back below the threshold
            series[i] = rsi[i - 1] > self.overbought_level && rsi[i] < self.overbought_level;
        }

        signals.insert(self.symbols[0].clone(), series);
        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Strategy;
    use chrono::{Duration, TimeZone, Utc};

    fn candles_from_closes(values: &[f64]) -> Vec<Candle> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                timestamp: base + Duration::hours(i as i64),
                open: close,
                high: close + 0.5,
                low: close - 0.5,
                close,
                volume: 1_000.0,
            })
            .collect()
    }

    #[test]
    fn buys_on_oversold_recovery() {
        // Steep sell-off drives RSI under 30, then a bounce lifts it back.
        let mut values: Vec<f64> = (0..30).map(|i| 200.0 - (i as f64) * 4.0).collect();
        values.extend((0..10).map(|i| 84.0 + (i as f64) * 5.0));
        let candles = candles_from_closes(&values);

        let mut strategy = RsiReversalStrategy::new("AAA", HashMap::new());
        let buys = strategy.generate_buy_signals(&candles).unwrap();
        let series = buys.get("AAA").expect("series for AAA");
        assert!(series.iter().any(|&flag| flag));
    }

    #[test]
    fn too_short_window_yields_no_series() {
        let candles = candles_from_closes(&[100.0, 101.0, 102.0]);
        let mut strategy = RsiReversalStrategy::new("AAA", HashMap::new());
        assert!(strategy.generate_buy_signals(&candles).unwrap().is_empty());
        assert!(strategy.generate_sell_signals(&candles).unwrap().is_empty());
    }
}
