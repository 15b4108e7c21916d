use crate::models::{Candle, Signal};
use crate::param_utils::get_param_f64;
use anyhow::Result;
use std::collections::HashMap;

/// Buys once on the first evaluated candle and never sells. Useful as a
/// benchmark anchor and in engine tests.
pub struct BuyAndHoldStrategy {
    symbols: Vec<String>,
    position_size_pct: f64,
    bought: bool,
}

impl BuyAndHoldStrategy {
    pub fn new(symbol: impl Into<String>, parameters: HashMap<String, f64>) -> Self {
        Self {
            symbols: vec![symbol.into()],
            position_size_pct: get_param_f64(&parameters, "positionSizePct", 0.0),
            bought: false,
        }
    }
}

impl super::Strategy for BuyAndHoldStrategy {
    fn algorithm_id(&self) -> &str {
        "buy-and-hold"
    }

    fn symbols(&self) -> &[String] {
        &self.symbols
    }

    fn generate_buy_signals(&mut self, candles: &[Candle]) -> Result<HashMap<String, Vec<bool>>> {
        let mut signals = HashMap::new();
        if candles.is_empty() {
            return Ok(signals);
        }

        let mut series = vec![false; candles.len()];
        if !self.bought {
            *series.last_mut().expect("non-empty series") = true;
            self.bought = true;
        }

        signals.insert(self.symbols[0].clone(), series);
        Ok(signals)
    }

    fn generate_sell_signals(&mut self, candles: &[Candle]) -> Result<HashMap<String, Vec<bool>>> {
        let mut signals = HashMap::new();
        if candles.is_empty() {
            return Ok(signals);
        }
        signals.insert(self.symbols[0].clone(), vec![false; candles.len()]);
        Ok(signals)
    }

    fn decorate_signal(&self, mut signal: Signal) -> Signal {
        if self.position_size_pct > 0.0 {
            signal.metadata.insert(
                "position_size_pct".to_string(),
                self.position_size_pct.into(),
            );
        }
        signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{Strategy, StrategyState};
    use chrono::{Duration, TimeZone, Utc};

    fn flat_series(count: i64) -> Vec<Candle> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..count)
            .map(|i| Candle {
                timestamp: base + Duration::hours(i),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0,
                volume: 1_000.0,
            })
            .collect()
    }

    #[test]
    fn buys_exactly_once() {
        let candles = flat_series(10);
        let mut strategy = BuyAndHoldStrategy::new("AAA", HashMap::new());
        let mut state = StrategyState::default();

        let first = strategy.latest_signals(&candles[..5], &mut state);
        assert_eq!(first.len(), 1);
        assert_eq!(state.signals_generated, 1);

        let second = strategy.latest_signals(&candles, &mut state);
        assert!(second.is_empty());
    }

    #[test]
    fn sizing_hint_is_attached_when_configured() {
        let candles = flat_series(5);
        let mut params = HashMap::new();
        params.insert("positionSizePct".to_string(), 25.0);
        let mut strategy = BuyAndHoldStrategy::new("AAA", params);
        let mut state = StrategyState::default();

        let signals = strategy.latest_signals(&candles, &mut state);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].metadata_f64("position_size_pct"), Some(25.0));
    }
}
