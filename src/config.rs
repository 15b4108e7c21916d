use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::BacktestError;

fn default_initial_capital() -> f64 {
    10_000.0
}
fn default_commission() -> f64 {
    0.001
} // 0.1% of notional per side
fn default_slippage() -> f64 {
    0.0005
} // 0.05%, applied adversely on entry and exit
fn default_max_positions() -> usize {
    5
}
fn default_warmup_period() -> usize {
    50
}
fn default_trailing_stop_percent() -> f64 {
    2.0
}
fn default_risk_free_rate() -> f64 {
    0.02
}
fn default_periods_per_year() -> f64 {
    252.0
}
fn default_position_size_pct() -> f64 {
    10.0
}

/// Configuration for a single backtest run. Immutable once handed to the
/// engine; `validate()` is checked at `run()` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,

    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,

    /// Commission as a fraction of notional, charged on both entry and exit.
    #[serde(default = "default_commission")]
    pub commission: f64,

    /// Slippage as a fraction of price, applied adversely on both entry and exit.
    #[serde(default = "default_slippage")]
    pub slippage: f64,

    #[serde(default = "default_max_positions")]
    pub max_positions: usize,

    /// Number of leading candles skipped before signal generation starts, so
    /// indicators have history to stabilize on.
    #[serde(default = "default_warmup_period")]
    pub warmup_period: usize,

    /// Default entry allocation when a signal carries no `position_size_pct`
    /// hint, as a percentage of current cash.
    #[serde(default = "default_position_size_pct")]
    pub position_size_pct: f64,

    /// Global trailing stop applied to every open position. Distinct from the
    /// per-symbol trailing rules in the risk rule set.
    #[serde(default)]
    pub trailing_stop: bool,
    #[serde(default = "default_trailing_stop_percent")]
    pub trailing_stop_percent: f64,

    /// Declared for configuration compatibility; the event-driven engine is
    /// long-only and validation rejects `true`.
    #[serde(default)]
    pub enable_shorting: bool,

    /// Annual risk-free rate used by Sharpe/Sortino (fraction, not percent).
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,

    /// Annualization factor for volatility (252 trading days by default).
    #[serde(default = "default_periods_per_year")]
    pub periods_per_year: f64,
}

impl BacktestConfig {
    pub fn new(start_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Self {
        Self {
            start_date,
            end_date,
            initial_capital: default_initial_capital(),
            commission: default_commission(),
            slippage: default_slippage(),
            max_positions: default_max_positions(),
            warmup_period: default_warmup_period(),
            position_size_pct: default_position_size_pct(),
            trailing_stop: false,
            trailing_stop_percent: default_trailing_stop_percent(),
            enable_shorting: false,
            risk_free_rate: default_risk_free_rate(),
            periods_per_year: default_periods_per_year(),
        }
    }

    pub fn with_initial_capital(mut self, capital: f64) -> Self {
        self.initial_capital = capital;
        self
    }

    pub fn with_commission(mut self, commission: f64) -> Self {
        self.commission = commission;
        self
    }

    pub fn with_slippage(mut self, slippage: f64) -> Self {
        self.slippage = slippage;
        self
    }

    pub fn with_max_positions(mut self, max_positions: usize) -> Self {
        self.max_positions = max_positions;
        self
    }

    pub fn with_warmup_period(mut self, warmup_period: usize) -> Self {
        self.warmup_period = warmup_period;
        self
    }

    pub fn with_position_size_pct(mut self, pct: f64) -> Self {
        self.position_size_pct = pct;
        self
    }

    pub fn with_trailing_stop(mut self, enabled: bool, percent: f64) -> Self {
        self.trailing_stop = enabled;
        self.trailing_stop_percent = percent;
        self
    }

    pub fn with_risk_free_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = rate;
        self
    }

    pub fn with_periods_per_year(mut self, periods: f64) -> Self {
        self.periods_per_year = periods;
        self
    }

    pub fn validate(&self) -> Result<(), BacktestError> {
        if self.start_date >= self.end_date {
            return Err(BacktestError::Config(
                "start_date must be before end_date".to_string(),
            ));
        }
        if self.initial_capital <= 0.0 || !self.initial_capital.is_finite() {
            return Err(BacktestError::Config(
                "initial_capital must be positive".to_string(),
            ));
        }
        if self.commission < 0.0 || !self.commission.is_finite() {
            return Err(BacktestError::Config(
                "commission cannot be negative".to_string(),
            ));
        }
        if self.slippage < 0.0 || !self.slippage.is_finite() {
            return Err(BacktestError::Config(
                "slippage cannot be negative".to_string(),
            ));
        }
        if self.max_positions < 1 {
            return Err(BacktestError::Config(
                "max_positions must be at least 1".to_string(),
            ));
        }
        if self.position_size_pct <= 0.0 || !self.position_size_pct.is_finite() {
            return Err(BacktestError::Config(
                "position_size_pct must be positive".to_string(),
            ));
        }
        if self.trailing_stop
            && (self.trailing_stop_percent <= 0.0 || !self.trailing_stop_percent.is_finite())
        {
            return Err(BacktestError::Config(
                "trailing_stop_percent must be positive when trailing_stop is enabled".to_string(),
            ));
        }
        if self.enable_shorting {
            return Err(BacktestError::Config(
                "enable_shorting is not supported by the event-driven engine".to_string(),
            ));
        }
        if self.periods_per_year <= 0.0 {
            return Err(BacktestError::Config(
                "periods_per_year must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn dates() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn default_config_is_valid() {
        let (start, end) = dates();
        let config = BacktestConfig::new(start, end);
        assert!(config.validate().is_ok());
        assert_eq!(config.warmup_period, 50);
        assert_eq!(config.max_positions, 5);
    }

    #[test]
    fn rejects_inverted_date_range() {
        let (start, end) = dates();
        let config = BacktestConfig::new(end, start);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_capital_and_commission() {
        let (start, end) = dates();
        assert!(BacktestConfig::new(start, end)
            .with_initial_capital(0.0)
            .validate()
            .is_err());
        assert!(BacktestConfig::new(start, end)
            .with_commission(-0.001)
            .validate()
            .is_err());
        assert!(BacktestConfig::new(start, end)
            .with_max_positions(0)
            .validate()
            .is_err());
    }

    #[test]
    fn rejects_shorting_flag() {
        let (start, end) = dates();
        let mut config = BacktestConfig::new(start, end);
        config.enable_shorting = true;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("enable_shorting"));
    }
}
