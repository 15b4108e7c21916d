use crate::models::PositionSide;
use serde::{Deserialize, Serialize};

/// Symbol used by wildcard rule rows. Lookups are exact: a wildcard row is
/// only found when the caller asks for `WILDCARD_SYMBOL` literally.
pub const WILDCARD_SYMBOL: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopLossKind {
    Fixed,
    AtrBased,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TakeProfitKind {
    Fixed,
    Trailing,
}

/// How much of the portfolio a new position may take.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSizeRule {
    pub symbol: String,
    pub percentage_of_portfolio: f64,
    pub fixed_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub min_amount: Option<f64>,
    pub risk_per_trade: Option<f64>,
}

impl PositionSizeRule {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            percentage_of_portfolio: 10.0,
            fixed_amount: None,
            max_amount: None,
            min_amount: None,
            risk_per_trade: None,
        }
    }

    pub fn with_percentage(mut self, percentage: f64) -> Self {
        self.percentage_of_portfolio = percentage;
        self
    }

    pub fn with_fixed_amount(mut self, amount: f64) -> Self {
        self.fixed_amount = Some(amount);
        self
    }

    pub fn with_bounds(mut self, min_amount: Option<f64>, max_amount: Option<f64>) -> Self {
        self.min_amount = min_amount;
        self.max_amount = max_amount;
        self
    }

    pub fn with_risk_per_trade(mut self, risk_pct: f64) -> Self {
        self.risk_per_trade = Some(risk_pct);
        self
    }

    /// Position size in base units.
    ///
    /// A fixed amount wins over the portfolio percentage. Risk-based sizing
    /// (risk budget divided by per-unit stop distance) can only shrink the
    /// candidate, never grow it. The min/max notional bounds are applied
    /// last, min first.
    pub fn calculate_size(
        &self,
        portfolio_value: f64,
        current_price: f64,
        stop_loss_price: Option<f64>,
    ) -> f64 {
        if current_price <= 0.0 {
            return 0.0;
        }

        let mut size = if let Some(fixed_amount) = self.fixed_amount {
            fixed_amount / current_price
        } else {
            portfolio_value * (self.percentage_of_portfolio / 100.0) / current_price
        };

        if let (Some(stop_price), Some(risk_pct)) = (stop_loss_price, self.risk_per_trade) {
            let risk_amount = portfolio_value * (risk_pct / 100.0);
            let price_risk = (current_price - stop_price).abs();
            if price_risk > 0.0 {
                size = size.min(risk_amount / price_risk);
            }
        }

        if let Some(min_amount) = self.min_amount {
            size = size.max(min_amount / current_price);
        }
        if let Some(max_amount) = self.max_amount {
            size = size.min(max_amount / current_price);
        }

        size
    }
}

/// When and where to take profit on a position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TakeProfitRule {
    pub symbol: String,
    pub percentage_threshold: f64,
    pub kind: TakeProfitKind,
    pub trailing: bool,
    pub trailing_offset: f64,
}

impl TakeProfitRule {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            percentage_threshold: 10.0,
            kind: TakeProfitKind::Fixed,
            trailing: false,
            trailing_offset: 2.0,
        }
    }

    pub fn with_threshold(mut self, percentage: f64) -> Self {
        self.percentage_threshold = percentage;
        self
    }

    pub fn with_trailing(mut self, offset: f64) -> Self {
        self.kind = TakeProfitKind::Trailing;
        self.trailing = true;
        self.trailing_offset = offset;
        self
    }

    pub fn target_price(&self, entry_price: f64, side: PositionSide) -> f64 {
        match side {
            PositionSide::Long => entry_price * (1.0 + self.percentage_threshold / 100.0),
            PositionSide::Short => entry_price * (1.0 - self.percentage_threshold / 100.0),
        }
    }

    /// Trailing target ratcheted from the best observed price, in the
    /// direction of the position's favor. `None` when trailing is off.
    pub fn update_trailing(&self, best_price: f64, side: PositionSide) -> Option<f64> {
        if !self.trailing {
            return None;
        }
        Some(match side {
            PositionSide::Long => best_price * (1.0 - self.trailing_offset / 100.0),
            PositionSide::Short => best_price * (1.0 + self.trailing_offset / 100.0),
        })
    }
}

/// When and where to cut losses on a position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopLossRule {
    pub symbol: String,
    pub percentage_threshold: f64,
    pub kind: StopLossKind,
    pub atr_multiplier: f64,
    pub trailing: bool,
    pub trailing_offset: f64,
    /// Unrealized profit (percent of entry) required before the trailing
    /// stop arms. Zero arms it immediately.
    pub trailing_activation: f64,
}

impl StopLossRule {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            percentage_threshold: 5.0,
            kind: StopLossKind::Fixed,
            atr_multiplier: 2.0,
            trailing: false,
            trailing_offset: 2.0,
            trailing_activation: 0.0,
        }
    }

    pub fn with_threshold(mut self, percentage: f64) -> Self {
        self.percentage_threshold = percentage;
        self
    }

    pub fn atr_based(mut self, multiplier: f64) -> Self {
        self.kind = StopLossKind::AtrBased;
        self.atr_multiplier = multiplier;
        self
    }

    pub fn with_trailing(mut self, offset: f64, activation: f64) -> Self {
        self.trailing = true;
        self.trailing_offset = offset;
        self.trailing_activation = activation;
        self
    }

    /// Initial stop price: fixed percentage from entry, or ATR distance when
    /// the rule is ATR-based and an ATR value is supplied.
    pub fn stop_price(&self, entry_price: f64, side: PositionSide, atr: Option<f64>) -> f64 {
        if self.kind == StopLossKind::AtrBased {
            if let Some(atr) = atr {
                let offset = atr * self.atr_multiplier;
                return match side {
                    PositionSide::Long => entry_price - offset,
                    PositionSide::Short => entry_price + offset,
                };
            }
        }

        match side {
            PositionSide::Long => entry_price * (1.0 - self.percentage_threshold / 100.0),
            PositionSide::Short => entry_price * (1.0 + self.percentage_threshold / 100.0),
        }
    }

    /// Trailing stop from the best observed price. Returns `None` until
    /// trailing is both enabled and activated by enough unrealized profit;
    /// a returned level never retreats (callers keep the max of old and new
    /// for longs, min for shorts — the engine's ratchet does exactly that).
    pub fn update_trailing(
        &self,
        best_price: f64,
        entry_price: f64,
        side: PositionSide,
    ) -> Option<f64> {
        if !self.trailing {
            return None;
        }

        if self.trailing_activation > 0.0 && entry_price > 0.0 {
            let profit_pct = match side {
                PositionSide::Long => ((best_price - entry_price) / entry_price) * 100.0,
                PositionSide::Short => ((entry_price - best_price) / entry_price) * 100.0,
            };
            if profit_pct < self.trailing_activation {
                return None;
            }
        }

        Some(match side {
            PositionSide::Long => best_price * (1.0 - self.trailing_offset / 100.0),
            PositionSide::Short => best_price * (1.0 + self.trailing_offset / 100.0),
        })
    }
}

/// Complete risk configuration: three independent symbol-keyed rule tables.
///
/// The event-driven backtest engine does not consult this during replay
/// (entry sizing is inlined there); the rule set is the contract consumed by
/// external portfolio-management collaborators.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskConfig {
    pub position_sizes: Vec<PositionSizeRule>,
    pub take_profits: Vec<TakeProfitRule>,
    pub stop_losses: Vec<StopLossRule>,
    pub max_open_positions: usize,
    pub max_portfolio_risk: f64,
}

impl RiskConfig {
    /// Exact-symbol lookup; no implicit wildcard fallback. Callers wanting
    /// the fallback chain query the symbol first and `"*"` second.
    pub fn position_size(&self, symbol: &str) -> Option<&PositionSizeRule> {
        self.position_sizes.iter().find(|rule| rule.symbol == symbol)
    }

    pub fn take_profit(&self, symbol: &str) -> Option<&TakeProfitRule> {
        self.take_profits.iter().find(|rule| rule.symbol == symbol)
    }

    pub fn stop_loss(&self, symbol: &str) -> Option<&StopLossRule> {
        self.stop_losses.iter().find(|rule| rule.symbol == symbol)
    }
}

/// 1% risk per trade, tight stops, few concurrent positions.
pub fn conservative_risk() -> RiskConfig {
    RiskConfig {
        position_sizes: vec![PositionSizeRule::new(WILDCARD_SYMBOL)
            .with_percentage(5.0)
            .with_risk_per_trade(1.0)],
        take_profits: vec![TakeProfitRule::new(WILDCARD_SYMBOL)
            .with_threshold(5.0)
            .with_trailing(1.5)],
        stop_losses: vec![StopLossRule::new(WILDCARD_SYMBOL).with_threshold(2.0)],
        max_open_positions: 3,
        max_portfolio_risk: 10.0,
    }
}

pub fn moderate_risk() -> RiskConfig {
    RiskConfig {
        position_sizes: vec![PositionSizeRule::new(WILDCARD_SYMBOL)
            .with_percentage(10.0)
            .with_risk_per_trade(2.0)],
        take_profits: vec![TakeProfitRule::new(WILDCARD_SYMBOL)
            .with_threshold(10.0)
            .with_trailing(2.0)],
        stop_losses: vec![StopLossRule::new(WILDCARD_SYMBOL)
            .with_threshold(5.0)
            .with_trailing(2.0, 3.0)],
        max_open_positions: 5,
        max_portfolio_risk: 20.0,
    }
}

pub fn aggressive_risk() -> RiskConfig {
    RiskConfig {
        position_sizes: vec![PositionSizeRule::new(WILDCARD_SYMBOL)
            .with_percentage(15.0)
            .with_risk_per_trade(5.0)],
        take_profits: vec![TakeProfitRule::new(WILDCARD_SYMBOL)
            .with_threshold(20.0)
            .with_trailing(3.0)],
        stop_losses: vec![StopLossRule::new(WILDCARD_SYMBOL)
            .with_threshold(8.0)
            .with_trailing(3.0, 5.0)],
        max_open_positions: 10,
        max_portfolio_risk: 40.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_sizing_allocates_portfolio_fraction() {
        let rule = PositionSizeRule::new("AAA").with_percentage(10.0);
        let size = rule.calculate_size(10_000.0, 100.0, None);
        assert!((size - 10.0).abs() < 1e-9);
    }

    #[test]
    fn fixed_amount_wins_over_percentage() {
        let rule = PositionSizeRule::new("AAA")
            .with_percentage(10.0)
            .with_fixed_amount(500.0);
        let size = rule.calculate_size(10_000.0, 100.0, None);
        assert!((size - 5.0).abs() < 1e-9);
    }

    #[test]
    fn risk_based_sizing_only_shrinks() {
        let rule = PositionSizeRule::new("AAA")
            .with_percentage(50.0)
            .with_risk_per_trade(1.0);

        // Stop 5 below entry: risk budget 100 / 5 = 20 units, below the
        // 50-unit percentage candidate.
        let capped = rule.calculate_size(10_000.0, 100.0, Some(95.0));
        assert!((capped - 20.0).abs() < 1e-9);

        // A very wide risk budget must not inflate the candidate.
        let wide = PositionSizeRule::new("AAA")
            .with_percentage(1.0)
            .with_risk_per_trade(50.0);
        let uncapped = wide.calculate_size(10_000.0, 100.0, Some(95.0));
        assert!((uncapped - 1.0).abs() < 1e-9);
    }

    #[test]
    fn notional_bounds_clamp_size() {
        let rule = PositionSizeRule::new("AAA")
            .with_percentage(1.0)
            .with_bounds(Some(500.0), Some(800.0));
        // 1% of 10k = 100 notional, below the 500 floor.
        let floored = rule.calculate_size(10_000.0, 100.0, None);
        assert!((floored - 5.0).abs() < 1e-9);

        let rule = PositionSizeRule::new("AAA")
            .with_percentage(50.0)
            .with_bounds(Some(500.0), Some(800.0));
        let capped = rule.calculate_size(10_000.0, 100.0, None);
        assert!((capped - 8.0).abs() < 1e-9);
    }

    #[test]
    fn take_profit_targets_mirror_by_side() {
        let rule = TakeProfitRule::new("AAA").with_threshold(10.0);
        assert!((rule.target_price(100.0, PositionSide::Long) - 110.0).abs() < 1e-9);
        assert!((rule.target_price(100.0, PositionSide::Short) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn stop_loss_fixed_and_atr_variants() {
        let fixed = StopLossRule::new("AAA").with_threshold(5.0);
        assert!((fixed.stop_price(100.0, PositionSide::Long, None) - 95.0).abs() < 1e-9);
        assert!((fixed.stop_price(100.0, PositionSide::Short, None) - 105.0).abs() < 1e-9);

        let atr = StopLossRule::new("AAA").atr_based(2.0);
        assert!((atr.stop_price(100.0, PositionSide::Long, Some(3.0)) - 94.0).abs() < 1e-9);
        assert!((atr.stop_price(100.0, PositionSide::Short, Some(3.0)) - 106.0).abs() < 1e-9);
        // Without an ATR value the rule falls back to the fixed threshold.
        assert!((atr.stop_price(100.0, PositionSide::Long, None) - 95.0).abs() < 1e-9);
    }

    #[test]
    fn trailing_stop_waits_for_activation() {
        let rule = StopLossRule::new("AAA").with_threshold(5.0).with_trailing(2.0, 3.0);

        // Only 1% above entry: not armed yet.
        assert!(rule
            .update_trailing(101.0, 100.0, PositionSide::Long)
            .is_none());

        // 5% above entry: armed, trails 2% below the best price.
        let level = rule
            .update_trailing(105.0, 100.0, PositionSide::Long)
            .unwrap();
        assert!((level - 105.0 * 0.98).abs() < 1e-9);
    }

    #[test]
    fn wildcard_rows_need_explicit_lookup() {
        let config = moderate_risk();
        assert!(config.position_size("BTC/USDT").is_none());
        assert!(config.position_size(WILDCARD_SYMBOL).is_some());
        assert!(config.stop_loss(WILDCARD_SYMBOL).is_some());
        assert!(config.take_profit(WILDCARD_SYMBOL).is_some());
    }

    #[test]
    fn presets_scale_in_the_expected_direction() {
        let conservative = conservative_risk();
        let aggressive = aggressive_risk();
        assert!(conservative.max_open_positions < aggressive.max_open_positions);
        let conservative_pct = conservative.position_sizes[0].percentage_of_portfolio;
        let aggressive_pct = aggressive.position_sizes[0].percentage_of_portfolio;
        assert!(conservative_pct < aggressive_pct);
    }
}
