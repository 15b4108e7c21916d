use crate::candle_utils::closes;
use crate::indicators;
use crate::models::Candle;
use crate::param_utils::get_param_usize;
use anyhow::Result;
use std::collections::HashMap;

/// EMA crossover trend strategy: buys when the short EMA crosses above the
/// long EMA, sells on the opposite cross.
pub struct EmaCrossoverStrategy {
    symbols: Vec<String>,
    short_period: usize,
    long_period: usize,
}

impl EmaCrossoverStrategy {
    pub fn new(symbol: impl Into<String>, parameters: HashMap<String, f64>) -> Self {
        Self {
            symbols: vec![symbol.into()],
            short_period: get_param_usize(&parameters, "shortPeriod", 9, 1),
            long_period: get_param_usize(&parameters, "longPeriod", 21, 2),
        }
    }

    fn emas(&self, candles: &[Candle]) -> (Vec<f64>, Vec<f64>) {
        let prices = closes(candles);
        (
            indicators::ema(&prices, self.short_period),
            indicators::ema(&prices, self.long_period),
        )
    }
}

impl super::Strategy for EmaCrossoverStrategy {
    fn algorithm_id(&self) -> &str {
        "ema-crossover"
    }

    fn symbols(&self) -> &[String] {
        &self.symbols
    }

    fn min_data_points(&self) -> usize {
        self.long_period
    }

    fn generate_buy_signals(&mut self, candles: &[Candle]) -> Result<HashMap<String, Vec<bool>>> {
        let mut signals = HashMap::new();
        if candles.len() < self.min_data_points() {
            return Ok(signals);
        }

        let (short_ema, long_ema) = self.emas(candles);
        signals.insert(
            self.symbols[0].clone(),
            indicators::crossover(&short_ema, &long_ema),
        );
        Ok(signals)
    }

    fn generate_sell_signals(&mut self, candles: &[Candle]) -> Result<HashMap<String, Vec<bool>>> {
        let mut signals = HashMap::new();
        if candles.len() < self.min_data_points() {
            return Ok(signals);
        }

        let (short_ema, long_ema) = self.emas(candles);
        signals.insert(
            self.symbols[0].clone(),
            indicators::crossunder(&short_ema, &long_ema),
        );
        Ok(signals)
    }
}
