use crate::models::{Candle, Position, Signal, SignalType};
use anyhow::{anyhow, Result};
use log::warn;
use std::collections::{BTreeMap, HashMap};

/// Polymorphic strategy contract.
///
/// A strategy must be able to produce, for a window of historical candles,
/// one boolean sequence per symbol for buys and one for sells. Everything
/// else (discrete signal derivation, lifecycle callbacks) has defaults.
pub trait Strategy {
    fn algorithm_id(&self) -> &str;

    fn symbols(&self) -> &[String];

    /// Minimum number of candles required before signals are meaningful.
    fn min_data_points(&self) -> usize {
        1
    }

    /// Symbol -> boolean series aligned with the window; `true` marks a buy.
    fn generate_buy_signals(&mut self, candles: &[Candle]) -> Result<HashMap<String, Vec<bool>>>;

    /// Symbol -> boolean series aligned with the window; `true` marks a sell.
    fn generate_sell_signals(&mut self, candles: &[Candle]) -> Result<HashMap<String, Vec<bool>>>;

    fn on_position_opened(&mut self, _position: &Position) {}

    fn on_position_closed(&mut self, _position: &Position, _reason: &str) {}

    /// Hook for attaching metadata (sizing hints, stop/target levels) to the
    /// discrete signals derived by `latest_signals`. Identity by default.
    fn decorate_signal(&self, signal: Signal) -> Signal {
        signal
    }

    /// Discrete signals for the latest point of the window, derived from the
    /// boolean sequences. A failing generator is logged and recorded on the
    /// run state, and treated as "no signals this step" so one bad step does
    /// not abort a whole replay.
    fn latest_signals(&mut self, candles: &[Candle], state: &mut StrategyState) -> Vec<Signal> {
        let mut signals = Vec::new();
        let Some(last) = candles.last() else {
            return signals;
        };

        match self.generate_buy_signals(candles) {
            Ok(buy_map) => {
                let ordered: BTreeMap<String, Vec<bool>> = buy_map.into_iter().collect();
                for (symbol, series) in ordered {
                    if series.last().copied().unwrap_or(false) {
                        let signal = self.decorate_signal(
                            Signal::new(SignalType::Buy, symbol, last.close, last.timestamp)
                                .with_reason(format!("Buy signal from {}", self.algorithm_id())),
                        );
                        state.record_signal(&signal);
                        signals.push(signal);
                    }
                }
            }
            Err(err) => {
                warn!(
                    "{}: buy signal generation failed: {:#}",
                    self.algorithm_id(),
                    err
                );
                state.record_error(format!("buy signal generation failed: {:#}", err));
            }
        }

        match self.generate_sell_signals(candles) {
            Ok(sell_map) => {
                let ordered: BTreeMap<String, Vec<bool>> = sell_map.into_iter().collect();
                for (symbol, series) in ordered {
                    if series.last().copied().unwrap_or(false) {
                        let signal = self.decorate_signal(
                            Signal::new(SignalType::Sell, symbol, last.close, last.timestamp)
                                .with_reason(format!("Sell signal from {}", self.algorithm_id())),
                        );
                        state.record_signal(&signal);
                        signals.push(signal);
                    }
                }
            }
            Err(err) => {
                warn!(
                    "{}: sell signal generation failed: {:#}",
                    self.algorithm_id(),
                    err
                );
                state.record_error(format!("sell signal generation failed: {:#}", err));
            }
        }

        signals
    }
}

/// Per-run strategy bookkeeping written by the engine's fault policy.
#[derive(Debug, Clone, Default)]
pub struct StrategyState {
    pub last_signal: Option<Signal>,
    pub signals_generated: u32,
    pub trades_executed: u32,
    pub errors: Vec<String>,
}

const MAX_RECORDED_ERRORS: usize = 100;

impl StrategyState {
    pub fn record_signal(&mut self, signal: &Signal) {
        self.last_signal = Some(signal.clone());
        self.signals_generated += 1;
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        if self.errors.len() > MAX_RECORDED_ERRORS {
            let excess = self.errors.len() - MAX_RECORDED_ERRORS;
            self.errors.drain(..excess);
        }
    }
}

pub type StrategyFactory =
    Box<dyn Fn(&str, HashMap<String, f64>) -> Box<dyn Strategy + Send> + Send + Sync>;

/// Explicit strategy registry. Held and passed around as an instance so each
/// test (and each process) can build its own table instead of sharing a
/// global one.
#[derive(Default)]
pub struct StrategyRegistry {
    factories: BTreeMap<String, StrategyFactory>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry preloaded with the bundled strategies.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("rsi-reversal", |symbol, params| {
            Box::new(RsiReversalStrategy::new(symbol, params))
        });
        registry.register("macd-crossover", |symbol, params| {
            Box::new(MacdCrossoverStrategy::new(symbol, params))
        });
        registry.register("bollinger-bands", |symbol, params| {
            Box::new(BollingerBandsStrategy::new(symbol, params))
        });
        registry.register("ema-crossover", |symbol, params| {
            Box::new(EmaCrossoverStrategy::new(symbol, params))
        });
        registry.register("buy-and-hold", |symbol, params| {
            Box::new(BuyAndHoldStrategy::new(symbol, params))
        });
        registry
    }

    pub fn register<F>(&mut self, algorithm_id: &str, factory: F)
    where
        F: Fn(&str, HashMap<String, f64>) -> Box<dyn Strategy + Send> + Send + Sync + 'static,
    {
        self.factories
            .insert(algorithm_id.to_string(), Box::new(factory));
    }

    pub fn create(
        &self,
        algorithm_id: &str,
        symbol: &str,
        parameters: HashMap<String, f64>,
    ) -> Result<Box<dyn Strategy + Send>> {
        let factory = self
            .factories
            .get(algorithm_id)
            .ok_or_else(|| anyhow!("unknown strategy: {}", algorithm_id))?;
        Ok(factory(symbol, parameters))
    }

    pub fn list(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }
}

#[path = "strategies/rsi_reversal.rs"]
pub mod rsi_reversal;

pub use rsi_reversal::RsiReversalStrategy;

#[path = "strategies/macd_crossover.rs"]
pub mod macd_crossover;

pub use macd_crossover::MacdCrossoverStrategy;

#[path = "strategies/bollinger_bands.rs"]
pub mod bollinger_bands;

pub use bollinger_bands::BollingerBandsStrategy;

#[path = "strategies/ema_crossover.rs"]
pub mod ema_crossover;

pub use ema_crossover::EmaCrossoverStrategy;

#[path = "strategies/buy_and_hold.rs"]
pub mod buy_and_hold;

pub use buy_and_hold::BuyAndHoldStrategy;
