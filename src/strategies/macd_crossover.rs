use crate::candle_utils::closes;
use crate::indicators;
use crate::models::Candle;
use crate::param_utils::get_param_usize;
use anyhow::Result;
use std::collections::HashMap;

/// MACD crossover strategy: buys on a bullish cross of the MACD line over its
/// signal line, sells on the bearish cross.
pub struct MacdCrossoverStrategy {
    symbols: Vec<String>,
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
}

impl MacdCrossoverStrategy {
    pub fn new(symbol: impl Into<String>, parameters: HashMap<String, f64>) -> Self {
        Self {
            symbols: vec![symbol.into()],
            fast_period: get_param_usize(&parameters, "fastPeriod", 12, 1),
            slow_period: get_param_usize(&parameters, "slowPeriod", 26, 2),
            signal_period: get_param_usize(&parameters, "signalPeriod", 9, 1),
        }
    }

    fn lines(&self, candles: &[Candle]) -> (Vec<f64>, Vec<f64>) {
        let (macd_line, signal_line, _) = indicators::macd(
            &closes(candles),
            self.fast_period,
            self.slow_period,
            self.signal_period,
        );
        (macd_line, signal_line)
    }
}

impl super::Strategy for MacdCrossoverStrategy {
    fn algorithm_id(&self) -> &str {
        "macd-crossover"
    }

    fn symbols(&self) -> &[String] {
        &self.symbols
    }

    fn min_data_points(&self) -> usize {
        self.slow_period + self.signal_period
    }

    fn generate_buy_signals(&mut self, candles: &[Candle]) -> Result<HashMap<String, Vec<bool>>> {
        let mut signals = HashMap::new();
        if candles.len() < self.min_data_points() {
            return Ok(signals);
        }

        let (macd_line, signal_line) = self.lines(candles);
        signals.insert(
            self.symbols[0].clone(),
            indicators::crossover(&macd_line, &signal_line),
        );
        Ok(signals)
    }

    fn generate_sell_signals(&mut self, candles: &[Candle]) -> Result<HashMap<String, Vec<bool>>> {
        let mut signals = HashMap::new();
        if candles.len() < self.min_data_points() {
            return Ok(signals);
        }

        let (macd_line, signal_line) = self.lines(candles);
        signals.insert(
            self.symbols[0].clone(),
            indicators::crossunder(&macd_line, &signal_line),
        );
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
    fn trend_reversal_produces_both_crosses() {
        // Downtrend, then a sustained uptrend, then a downtrend again.
        let mut values: Vec<f64> = (0..40).map(|i| 150.0 - i as f64).collect();
        values.extend((0..40).map(|i| 110.0 + (i as f64) * 1.5));
        values.extend((0..40).map(|i| 170.0 - (i as f64) * 1.5));
        let candles = candles_from_closes(&values);

        let mut strategy = MacdCrossoverStrategy::new("AAA", HashMap::new());
        let buys = strategy.generate_buy_signals(&candles).unwrap();
        let sells = strategy.generate_sell_signals(&candles).unwrap();

        assert!(buys.get("AAA").unwrap().iter().any(|&flag| flag));
        assert!(sells.get("AAA").unwrap().iter().any(|&flag| flag));
    }
}
