use crate::candle_utils::{date_window, is_strictly_ordered};
use crate::config::BacktestConfig;
use crate::metrics::MetricsCalculator;
use crate::models::{
    BacktestMetrics, BacktestResult, Candle, EquityPoint, Position, PositionSide, Signal,
    SignalType, Trade, TradeType,
};
use crate::strategy::{Strategy, StrategyState};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BacktestError {
    /// Invalid configuration; detected before any candle is processed.
    #[error("invalid backtest configuration: {0}")]
    Config(String),

    /// Empty or unusable price series; the run terminates with no partial result.
    #[error("no data to backtest: {0}")]
    NoData(String),

    /// Strategy failure outside the per-step recovery path.
    #[error("strategy failure: {0}")]
    Strategy(String),
}

/// Event-driven backtest engine.
///
/// Owns the cash/position ledger and drives the replay: per candle it checks
/// exit orders, updates price tracking, asks the strategy for signals,
/// executes them against the ledger and records equity. One engine instance
/// serves one run at a time; `run()` resets all state on entry, and reruns
/// with identical inputs are bit-identical (counter-based ids, no clock or
/// randomness inside the replay path).
pub struct BacktestEngine {
    config: BacktestConfig,
    cash: f64,
    /// Open positions keyed by symbol; at most one position per symbol.
    positions: BTreeMap<String, Position>,
    trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
    peak_equity: f64,
    position_counter: u64,
    trade_counter: u64,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        let initial_capital = config.initial_capital;
        Self {
            config,
            cash: initial_capital,
            positions: BTreeMap::new(),
            trades: Vec::new(),
            equity_curve: Vec::new(),
            peak_equity: initial_capital,
            position_counter: 0,
            trade_counter: 0,
        }
    }

    /// Return all state to configuration-derived initial values.
    pub fn reset(&mut self) {
        self.cash = self.config.initial_capital;
        self.positions.clear();
        self.trades.clear();
        self.equity_curve.clear();
        self.peak_equity = self.config.initial_capital;
        self.position_counter = 0;
        self.trade_counter = 0;
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn open_positions(&self) -> &BTreeMap<String, Position> {
        &self.positions
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    /// Run the event-driven replay of `candles` against `strategy`.
    ///
    /// The series is filtered to `[start_date, end_date]` (inclusive) first;
    /// an empty series is an error, not an empty result. The strategy only
    /// ever sees the window up to and including the current candle.
    pub fn run(
        &mut self,
        strategy: &mut dyn Strategy,
        candles: &[Candle],
    ) -> Result<BacktestResult, BacktestError> {
        self.config.validate()?;
        self.reset();

        if candles.is_empty() {
            return Err(BacktestError::NoData("empty price series".to_string()));
        }
        if !is_strictly_ordered(candles) {
            return Err(BacktestError::NoData(
                "price series is not strictly ordered by timestamp".to_string(),
            ));
        }

        let series = date_window(candles, self.config.start_date, self.config.end_date);
        if series.is_empty() {
            return Err(BacktestError::NoData(
                "no candles inside the configured date range".to_string(),
            ));
        }

        info!(
            "Starting backtest for {} over {} candles",
            strategy.algorithm_id(),
            series.len()
        );

        let mut strategy_state = StrategyState::default();
        let warmup = self.config.warmup_period.min(series.len());

        for i in warmup..series.len() {
            let candle = &series[i];

            // 1. Pending exit orders fire before anything else sees the candle.
            self.check_exit_orders(candle.high, candle.low, candle.timestamp);

            // 2. Widen tracked ranges and ratchet global trailing stops.
            self.update_position_prices(candle.high, candle.low);

            // 3. Strategy sees history up to and including this candle.
            let signals = strategy.latest_signals(&series[..=i], &mut strategy_state);

            // 4. Execute in the order received.
            for signal in &signals {
                self.process_signal(signal, candle);
            }

            // 5. Mark open positions at the close and record equity.
            self.record_equity(candle.timestamp, candle.close);
        }

        if !strategy_state.errors.is_empty() {
            warn!(
                "{} signal-generation fault{} recovered during the run",
                strategy_state.errors.len(),
                if strategy_state.errors.len() == 1 { "" } else { "s" }
            );
        }

        let metrics =
            MetricsCalculator::calculate(&self.trades, &self.equity_curve, &self.config);

        info!(
            "Backtest finished: {} trades, {} open positions, final equity {:.2}",
            self.trades.len(),
            self.positions.len(),
            self.equity_curve
                .last()
                .map(|p| p.equity)
                .unwrap_or(self.config.initial_capital)
        );

        Ok(BacktestResult {
            id: Uuid::new_v4().to_string(),
            config: self.config.clone(),
            trades: self.trades.clone(),
            equity_curve: self.equity_curve.clone(),
            metrics,
            open_positions: self.positions.values().cloned().collect(),
        })
    }

    /// Fast vectorized simulation over full-series buy/sell boolean sequences.
    ///
    /// Single asset, single position, all-in sizing, no commission or
    /// slippage: equity is 100% in the asset while a buy-flagged position is
    /// held, fully liquidated on a sell flag, and marked to market every
    /// step. Trades realism for speed; its result carries the equity series
    /// and total-return figures only and is not a substitute for the
    /// event-driven mode's metrics.
    pub fn run_vectorized(
        &mut self,
        strategy: &mut dyn Strategy,
        candles: &[Candle],
    ) -> Result<BacktestResult, BacktestError> {
        self.config.validate()?;
        self.reset();

        let series = date_window(candles, self.config.start_date, self.config.end_date);

        let buy_map = strategy
            .generate_buy_signals(series)
            .map_err(|err| BacktestError::Strategy(format!("{:#}", err)))?;
        let sell_map = strategy
            .generate_sell_signals(series)
            .map_err(|err| BacktestError::Strategy(format!("{:#}", err)))?;

        let symbol = strategy
            .symbols()
            .first()
            .cloned()
            .or_else(|| buy_map.keys().min().cloned());
        let Some(symbol) = symbol else {
            return Ok(self.empty_vectorized_result());
        };

        let empty = Vec::new();
        let buy_series = buy_map.get(&symbol).unwrap_or(&empty);
        let sell_series = sell_map.get(&symbol).unwrap_or(&empty);

        let mut equity = self.config.initial_capital;
        let mut position_size = 0.0_f64;

        for (i, candle) in series.iter().enumerate() {
            let close = candle.close;
            let buy = buy_series.get(i).copied().unwrap_or(false);
            let sell = sell_series.get(i).copied().unwrap_or(false);

            if buy && position_size == 0.0 && close > 0.0 {
                position_size = equity / close;
            } else if sell && position_size > 0.0 {
                equity = position_size * close;
                position_size = 0.0;
            }

            if position_size > 0.0 {
                equity = position_size * close;
            }

            self.peak_equity = self.peak_equity.max(equity);
            let drawdown = self.peak_equity - equity;
            let drawdown_percentage = if self.peak_equity > 0.0 {
                (drawdown / self.peak_equity) * 100.0
            } else {
                0.0
            };
            self.equity_curve.push(EquityPoint {
                timestamp: candle.timestamp,
                equity,
                cash: if position_size > 0.0 { 0.0 } else { equity },
                position_value: if position_size > 0.0 { equity } else { 0.0 },
                drawdown,
                drawdown_percentage,
            });
        }

        let total_return = equity - self.config.initial_capital;
        let metrics = BacktestMetrics {
            total_return,
            total_return_percentage: (total_return / self.config.initial_capital) * 100.0,
            ..Default::default()
        };

        Ok(BacktestResult {
            id: Uuid::new_v4().to_string(),
            config: self.config.clone(),
            trades: Vec::new(),
            equity_curve: self.equity_curve.clone(),
            metrics,
            open_positions: Vec::new(),
        })
    }

    fn empty_vectorized_result(&self) -> BacktestResult {
        BacktestResult {
            id: Uuid::new_v4().to_string(),
            config: self.config.clone(),
            trades: Vec::new(),
            equity_curve: Vec::new(),
            metrics: BacktestMetrics::default(),
            open_positions: Vec::new(),
        }
    }

    fn process_signal(&mut self, signal: &Signal, candle: &Candle) {
        if !signal.is_actionable() {
            return;
        }

        match signal.signal_type {
            SignalType::Buy => {
                if self.positions.len() >= self.config.max_positions {
                    debug!(
                        "buy for {} skipped: max positions ({}) reached",
                        signal.symbol, self.config.max_positions
                    );
                    return;
                }
                self.open_position(signal, candle);
            }
            SignalType::Sell | SignalType::CloseLong | SignalType::CloseShort => {
                self.close_position(&signal.symbol, candle, TradeType::Exit);
            }
            SignalType::Hold | SignalType::NoSignal => {}
        }
    }

    fn open_position(&mut self, signal: &Signal, candle: &Candle) {
        if self.positions.contains_key(&signal.symbol) {
            debug!("buy for {} skipped: position already open", signal.symbol);
            return;
        }

        let mut position_value = self.cash * (self.config.position_size_pct / 100.0);
        if let Some(pct) = signal.metadata_f64("position_size_pct") {
            position_value = self.cash * (pct / 100.0);
        }

        // Entry fills adversely above the close.
        let entry_price = candle.close * (1.0 + self.config.slippage);
        if entry_price <= 0.0 || position_value <= 0.0 {
            debug!("buy for {} skipped: degenerate price or size", signal.symbol);
            return;
        }

        let size = position_value / entry_price;
        let commission = position_value * self.config.commission;

        if position_value + commission > self.cash {
            debug!(
                "buy for {} skipped: insufficient cash (need {:.2}, have {:.2})",
                signal.symbol,
                position_value + commission,
                self.cash
            );
            return;
        }

        self.cash -= position_value + commission;

        self.position_counter += 1;
        let position_id = format!("pos_{}", self.position_counter);
        let mut position = Position::open(
            position_id.clone(),
            signal.symbol.clone(),
            PositionSide::Long,
            entry_price,
            size,
            candle.timestamp,
        );
        position.stop_loss = signal.metadata_f64("stop_loss");
        position.take_profit = signal.metadata_f64("take_profit");

        debug!(
            "opened {} for {}: {:.6} @ {:.4}",
            position_id, signal.symbol, size, entry_price
        );
        self.positions.insert(signal.symbol.clone(), position);
    }

    /// Close the open position for `symbol` at the candle close, adjusted
    /// adversely for slippage. Missing position is a normal policy outcome.
    fn close_position(&mut self, symbol: &str, candle: &Candle, trade_type: TradeType) {
        let Some(position) = self.positions.remove(symbol) else {
            debug!("sell for {} skipped: no open position", symbol);
            return;
        };

        let exit_price = candle.close * (1.0 - self.config.slippage);
        self.settle_close(position, exit_price, candle.timestamp, trade_type);
    }

    /// Close a position at an exact trigger price (stop-loss / take-profit).
    fn close_position_at_price(
        &mut self,
        symbol: &str,
        price: f64,
        timestamp: DateTime<Utc>,
        trade_type: TradeType,
    ) {
        let Some(position) = self.positions.remove(symbol) else {
            return;
        };
        self.settle_close(position, price, timestamp, trade_type);
    }

    fn settle_close(
        &mut self,
        position: Position,
        exit_price: f64,
        timestamp: DateTime<Utc>,
        trade_type: TradeType,
    ) {
        let position_value = exit_price * position.size;
        let commission = position_value * self.config.commission;
        // Entry commission was taken from cash at open; only the exit side
        // reduces the realized pnl here.
        let pnl = position.unrealized_pnl(exit_price) - commission;

        self.cash += position_value - commission;

        self.trade_counter += 1;
        let trade = Trade::new(
            format!("trade_{}", self.trade_counter),
            position.id.clone(),
            position.symbol.clone(),
            position.side,
            position.entry_price,
            exit_price,
            position.size,
            position.entry_time,
            timestamp,
            pnl,
            position.unrealized_pnl_percentage(exit_price),
            trade_type,
            commission,
        );

        debug!(
            "closed {} ({}) at {:.4}, pnl {:.2}",
            position.id,
            trade.trade_type.as_str(),
            exit_price,
            pnl
        );
        self.trades.push(trade);
    }

    /// Test every open position against its exit levels. Per position only
    /// one trigger fires per candle: stop-loss takes priority over
    /// take-profit, which takes priority over the trailing stop, because a
    /// conservative replay must not assume favorable intrabar execution
    /// order.
    fn check_exit_orders(&mut self, high: f64, low: f64, timestamp: DateTime<Utc>) {
        let mut to_close: Vec<(String, TradeType, f64)> = Vec::new();

        for (symbol, position) in &self.positions {
            if let Some(stop_loss) = position.stop_loss.filter(|&stop| low <= stop) {
                to_close.push((symbol.clone(), TradeType::StopLoss, stop_loss));
            } else if let Some(take_profit) =
                position.take_profit.filter(|&target| high >= target)
            {
                to_close.push((symbol.clone(), TradeType::TakeProfit, take_profit));
            } else if let Some(trailing) = position.trailing_stop.filter(|&stop| low <= stop) {
                to_close.push((symbol.clone(), TradeType::StopLoss, trailing));
            }
        }

        for (symbol, trade_type, price) in to_close {
            self.close_position_at_price(&symbol, price, timestamp, trade_type);
        }
    }

    /// Widen each position's observed price range and, when the global
    /// trailing stop is enabled, ratchet the trailing level upward from the
    /// highest observed price. The level never moves down.
    fn update_position_prices(&mut self, high: f64, low: f64) {
        let trailing_enabled = self.config.trailing_stop;
        let trailing_percent = self.config.trailing_stop_percent;

        for position in self.positions.values_mut() {
            position.update_price_tracking(high, low);

            if trailing_enabled && position.side == PositionSide::Long {
                let candidate = position.highest_price * (1.0 - trailing_percent / 100.0);
                match position.trailing_stop {
                    Some(current) if candidate <= current => {}
                    _ => position.trailing_stop = Some(candidate),
                }
            }
        }
    }

    fn record_equity(&mut self, timestamp: DateTime<Utc>, close: f64) {
        let position_value: f64 = self
            .positions
            .values()
            .map(|position| position.size * close)
            .sum();
        let equity = self.cash + position_value;

        self.peak_equity = self.peak_equity.max(equity);
        let drawdown = self.peak_equity - equity;
        let drawdown_percentage = if self.peak_equity > 0.0 {
            (drawdown / self.peak_equity) * 100.0
        } else {
            0.0
        };

        self.equity_curve.push(EquityPoint {
            timestamp,
            equity,
            cash: self.cash,
            position_value,
            drawdown,
            drawdown_percentage,
        });
    }
}
