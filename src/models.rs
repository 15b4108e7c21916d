use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::config::BacktestConfig;

/// One fixed-interval market data point. Series are expected to be ordered by
/// strictly increasing timestamp; the engine never interpolates missing candles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    Buy,
    Sell,
    Hold,
    CloseLong,
    CloseShort,
    NoSignal,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::Buy => "buy",
            SignalType::Sell => "sell",
            SignalType::Hold => "hold",
            SignalType::CloseLong => "close_long",
            SignalType::CloseShort => "close_short",
            SignalType::NoSignal => "no_signal",
        }
    }
}

/// Trading signal emitted by a strategy for a single time step.
///
/// Metadata may carry numeric hints the engine understands: `stop_loss`,
/// `take_profit` and `position_size_pct`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub signal_type: SignalType,
    pub symbol: String,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub confidence: f64,
    pub reason: String,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl Signal {
    pub fn new(
        signal_type: SignalType,
        symbol: impl Into<String>,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            signal_type,
            symbol: symbol.into(),
            price,
            timestamp,
            confidence: 1.0,
            reason: String::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: f64) -> Self {
        self.metadata
            .insert(key.to_string(), Value::from(value));
        self
    }

    /// Hold and NoSignal are bookkeeping-only; everything else requires action.
    pub fn is_actionable(&self) -> bool {
        !matches!(self.signal_type, SignalType::Hold | SignalType::NoSignal)
    }

    pub fn metadata_f64(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).and_then(Value::as_f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSide::Long => "long",
            PositionSide::Short => "short",
        }
    }
}

/// An open position inside a backtest run.
///
/// `highest_price`/`lowest_price` start at the entry price and only widen as
/// new highs/lows are observed; they drive trailing-stop ratchets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub symbol: String,
    pub side: PositionSide,
    pub entry_price: f64,
    pub size: f64,
    pub entry_time: DateTime<Utc>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub trailing_stop: Option<f64>,
    pub highest_price: f64,
    pub lowest_price: f64,
}

impl Position {
    pub fn open(
        id: impl Into<String>,
        symbol: impl Into<String>,
        side: PositionSide,
        entry_price: f64,
        size: f64,
        entry_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            side,
            entry_price,
            size,
            entry_time,
            stop_loss: None,
            take_profit: None,
            trailing_stop: None,
            highest_price: entry_price,
            lowest_price: entry_price,
        }
    }

    /// Widen the observed price range with a new candle's high/low.
    pub fn update_price_tracking(&mut self, high: f64, low: f64) {
        self.highest_price = self.highest_price.max(high);
        self.lowest_price = self.lowest_price.min(low);
    }

    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        match self.side {
            PositionSide::Long => (current_price - self.entry_price) * self.size,
            PositionSide::Short => (self.entry_price - current_price) * self.size,
        }
    }

    pub fn unrealized_pnl_percentage(&self, current_price: f64) -> f64 {
        if self.entry_price == 0.0 {
            return 0.0;
        }
        match self.side {
            PositionSide::Long => ((current_price - self.entry_price) / self.entry_price) * 100.0,
            PositionSide::Short => ((self.entry_price - current_price) / self.entry_price) * 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeType {
    Entry,
    Exit,
    StopLoss,
    TakeProfit,
    Liquidation,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Entry => "entry",
            TradeType::Exit => "exit",
            TradeType::StopLoss => "stop_loss",
            TradeType::TakeProfit => "take_profit",
            TradeType::Liquidation => "liquidation",
        }
    }
}

/// A completed round trip. Immutable once created; the engine's trade list is
/// append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub position_id: String,
    pub symbol: String,
    pub side: PositionSide,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub pnl: f64,
    pub pnl_percentage: f64,
    pub trade_type: TradeType,
    pub commission: f64,
    pub holding_time_seconds: i64,
}

impl Trade {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        position_id: impl Into<String>,
        symbol: impl Into<String>,
        side: PositionSide,
        entry_price: f64,
        exit_price: f64,
        size: f64,
        entry_time: DateTime<Utc>,
        exit_time: DateTime<Utc>,
        pnl: f64,
        pnl_percentage: f64,
        trade_type: TradeType,
        commission: f64,
    ) -> Self {
        Self {
            id: id.into(),
            position_id: position_id.into(),
            symbol: symbol.into(),
            side,
            entry_price,
            exit_price,
            size,
            entry_time,
            exit_time,
            pnl,
            pnl_percentage,
            trade_type,
            commission,
            holding_time_seconds: (exit_time - entry_time).num_seconds(),
        }
    }

    /// PnL is already net of commission.
    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }
}

/// One point of the equity curve, appended per processed candle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
    pub cash: f64,
    pub position_value: f64,
    pub drawdown: f64,
    pub drawdown_percentage: f64,
}

/// Performance metrics derived once at run end from the full trade list and
/// equity curve. Every ratio with a possibly-zero denominator keeps its zero
/// default instead of propagating NaN; the one deliberate infinity is the
/// profit factor with no losing trades.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestMetrics {
    pub total_return: f64,
    pub total_return_percentage: f64,
    pub annualized_return: f64,

    pub total_trades: i32,
    pub winning_trades: i32,
    pub losing_trades: i32,
    pub win_rate: f64,

    pub avg_win: f64,
    pub avg_loss: f64,
    pub avg_trade: f64,

    pub largest_win: f64,
    pub largest_loss: f64,
    pub max_consecutive_wins: i32,
    pub max_consecutive_losses: i32,

    pub profit_factor: f64,
    pub risk_reward_ratio: f64,
    pub expectancy: f64,

    pub max_drawdown: f64,
    pub max_drawdown_percentage: f64,
    pub avg_drawdown: f64,
    pub max_drawdown_duration_days: i32,

    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,

    pub volatility: f64,
    pub variance: f64,
    pub std_dev: f64,

    pub avg_holding_time_hours: f64,
    pub trading_days: i64,
    pub trades_per_day: f64,
}

/// Result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub id: String,
    pub config: BacktestConfig,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: BacktestMetrics,
    pub open_positions: Vec<Position>,
}

impl BacktestResult {
    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map(|point| point.equity)
            .unwrap_or(self.config.initial_capital)
    }

    pub fn summary(&self) -> String {
        let metrics = &self.metrics;
        format!(
            "Backtest summary\n\
             ════════════════════════════════════════\n\
             Period: {} → {} ({} days)\n\
             Candles processed: {}\n\
             ────────────────────────────────────────\n\
             Initial capital: {:.2}\n\
             Final equity: {:.2}\n\
             Total return: {:.2} ({:.2}%)\n\
             Annualized return: {:.2}%\n\
             ────────────────────────────────────────\n\
             Trades: {} (won {}, lost {})\n\
             Win rate: {:.1}%\n\
             Profit factor: {:.2}\n\
             Expectancy: {:.2}\n\
             ────────────────────────────────────────\n\
             Sharpe ratio: {:.2}\n\
             Sortino ratio: {:.2}\n\
             Calmar ratio: {:.2}\n\
             Max drawdown: {:.2} ({:.2}%)\n\
             ════════════════════════════════════════",
            self.config.start_date.format("%Y-%m-%d"),
            self.config.end_date.format("%Y-%m-%d"),
            metrics.trading_days,
            self.equity_curve.len(),
            self.config.initial_capital,
            self.final_equity(),
            metrics.total_return,
            metrics.total_return_percentage,
            metrics.annualized_return,
            metrics.total_trades,
            metrics.winning_trades,
            metrics.losing_trades,
            metrics.win_rate,
            metrics.profit_factor,
            metrics.expectancy,
            metrics.sharpe_ratio,
            metrics.sortino_ratio,
            metrics.calmar_ratio,
            metrics.max_drawdown,
            metrics.max_drawdown_percentage,
        )
    }
}
