use crate::candle_utils::closes;
use crate::indicators;
use crate::models::Candle;
use crate::param_utils::{get_param_f64, get_param_usize};
use anyhow::Result;
use std::collections::HashMap;

/// Bollinger band mean-reversion strategy: buys when the close drops below
/// the lower band, sells when it rises above the upper band.
pub struct BollingerBandsStrategy {
    symbols: Vec<String>,
    period: usize,
    std_dev: f64,
}

impl BollingerBandsStrategy {
    pub fn new(symbol: impl Into<String>, parameters: HashMap<String, f64>) -> Self {
        Self {
            symbols: vec![symbol.into()],
            period: get_param_usize(&parameters, "period", 20, 2),
            std_dev: get_param_f64(&parameters, "stdDev", 2.0),
        }
    }
}

impl super::Strategy for BollingerBandsStrategy {
    fn algorithm_id(&self) -> &str {
        "bollinger-bands"
    }

    fn symbols(&self) -> &[String] {
        &self.symbols
    }

    fn min_data_points(&self) -> usize {
        self.period
    }

    fn generate_buy_signals(&mut self, candles: &[Candle]) -> Result<HashMap<String, Vec<bool>>> {
        let mut signals = HashMap::new();
        if candles.len() < self.min_data_points() {
            return Ok(signals);
        }

        let prices = closes(candles);
        let (_, _, lower) = indicators::bollinger_bands(&prices, self.period, self.std_dev);
        let series = prices
            .iter()
            .zip(lower.iter())
            .enumerate()
            .map(|(i, (&close, &band))| i + 1 >= self.period && close < band)
            .collect();

        signals.insert(self.symbols[0].clone(), series);
        Ok(signals)
    }

    fn generate_sell_signals(&mut self, candles: &[Candle]) -> Result<HashMap<String, Vec<bool>>> {
        let mut signals = HashMap::new();
        if candles.len() < self.min_data_points() {
            return Ok(signals);
        }

        let prices = closes(candles);
        let (_, upper, _) = indicators::bollinger_bands(&prices, self.period, self.std_dev);
        let series = prices
            .iter()
            .zip(upper.iter())
            .enumerate()
            .map(|(i, (&close, &band))| i + 1 >= self.period && close > band)
            .collect();

        signals.insert(self.symbols[0].clone(), series);
        Ok(signals)
    }
}
