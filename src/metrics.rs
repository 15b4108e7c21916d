use crate::config::BacktestConfig;
use crate::models::{BacktestMetrics, EquityPoint, Trade};
use statrs::statistics::Statistics;

pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Reduce the full trade list and equity curve into a metrics report.
    ///
    /// Called exactly once at run end; nothing here is updated
    /// incrementally. With zero trades the all-default report is returned,
    /// not an error.
    pub fn calculate(
        trades: &[Trade],
        equity_curve: &[EquityPoint],
        config: &BacktestConfig,
    ) -> BacktestMetrics {
        let mut metrics = BacktestMetrics::default();

        if trades.is_empty() {
            return metrics;
        }

        metrics.total_trades = trades.len() as i32;
        metrics.winning_trades = trades.iter().filter(|t| t.is_winner()).count() as i32;
        metrics.losing_trades = metrics.total_trades - metrics.winning_trades;
        metrics.win_rate = (metrics.winning_trades as f64 / metrics.total_trades as f64) * 100.0;

        let wins: Vec<f64> = trades
            .iter()
            .filter(|t| t.is_winner())
            .map(|t| t.pnl)
            .collect();
        let losses: Vec<f64> = trades
            .iter()
            .filter(|t| !t.is_winner())
            .map(|t| t.pnl)
            .collect();

        if !wins.is_empty() {
            metrics.avg_win = wins.clone().mean();
            metrics.largest_win = wins.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        }
        if !losses.is_empty() {
            metrics.avg_loss = losses.clone().mean();
            metrics.largest_loss = losses.iter().copied().fold(f64::INFINITY, f64::min);
        }
        metrics.avg_trade = trades.iter().map(|t| t.pnl).sum::<f64>() / trades.len() as f64;

        let gross_profit: f64 = wins.iter().sum();
        let gross_loss: f64 = losses.iter().sum::<f64>().abs();
        metrics.profit_factor = if gross_loss == 0.0 {
            if gross_profit > 0.0 {
                f64::INFINITY
            } else {
                0.0
            }
        } else {
            (gross_profit / gross_loss).abs()
        };

        if metrics.avg_loss != 0.0 {
            metrics.risk_reward_ratio = (metrics.avg_win / metrics.avg_loss).abs();
        }

        let win_prob = metrics.winning_trades as f64 / metrics.total_trades as f64;
        let loss_prob = metrics.losing_trades as f64 / metrics.total_trades as f64;
        metrics.expectancy = win_prob * metrics.avg_win - loss_prob * metrics.avg_loss.abs();

        let days = (config.end_date - config.start_date).num_days();

        if let Some(final_point) = equity_curve.last() {
            metrics.total_return = final_point.equity - config.initial_capital;
            metrics.total_return_percentage =
                (metrics.total_return / config.initial_capital) * 100.0;

            if days > 0 {
                let growth = 1.0 + metrics.total_return_percentage / 100.0;
                if growth > 0.0 {
                    metrics.annualized_return =
                        (growth.powf(365.0 / days as f64) - 1.0) * 100.0;
                }
            }

            let drawdown_percentages: Vec<f64> =
                equity_curve.iter().map(|p| p.drawdown_percentage).collect();
            metrics.max_drawdown_percentage = drawdown_percentages
                .iter()
                .copied()
                .fold(0.0_f64, f64::max);
            metrics.max_drawdown = equity_curve
                .iter()
                .map(|p| p.drawdown)
                .fold(0.0_f64, f64::max);
            metrics.avg_drawdown = drawdown_percentages.clone().mean();
            metrics.max_drawdown_duration_days = Self::max_drawdown_duration(equity_curve);

            let returns = Self::period_returns(equity_curve);
            if returns.len() >= 2 {
                let std_dev = returns.clone().std_dev();
                metrics.std_dev = std_dev;
                metrics.variance = std_dev * std_dev;
                metrics.volatility = std_dev * config.periods_per_year.sqrt();

                if metrics.volatility > 0.0 {
                    metrics.sharpe_ratio = (metrics.annualized_return / 100.0
                        - config.risk_free_rate)
                        / metrics.volatility;
                }

                let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
                if downside.len() >= 2 {
                    let downside_std = downside.std_dev() * config.periods_per_year.sqrt();
                    if downside_std > 0.0 {
                        metrics.sortino_ratio = (metrics.annualized_return / 100.0
                            - config.risk_free_rate)
                            / downside_std;
                    }
                }
            }

            if metrics.max_drawdown_percentage > 0.0 {
                metrics.calmar_ratio =
                    metrics.annualized_return / metrics.max_drawdown_percentage;
            }
        }

        let holding_hours: Vec<f64> = trades
            .iter()
            .map(|t| t.holding_time_seconds as f64 / 3600.0)
            .collect();
        if !holding_hours.is_empty() {
            metrics.avg_holding_time_hours = holding_hours.mean();
        }

        metrics.trading_days = days;
        if days > 0 {
            metrics.trades_per_day = metrics.total_trades as f64 / days as f64;
        }

        let (max_wins, max_losses) = Self::consecutive_wins_losses(trades);
        metrics.max_consecutive_wins = max_wins;
        metrics.max_consecutive_losses = max_losses;

        metrics
    }

    /// Simple period-over-period returns from the equity curve.
    fn period_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
        equity_curve
            .windows(2)
            .filter_map(|pair| {
                let prev = pair[0].equity;
                let curr = pair[1].equity;
                if prev > 0.0 {
                    Some((curr - prev) / prev)
                } else {
                    None
                }
            })
            .collect()
    }

    /// Longest consecutive run of candles spent below the running peak.
    fn max_drawdown_duration(equity_curve: &[EquityPoint]) -> i32 {
        let mut max_duration = 0;
        let mut current = 0;

        for point in equity_curve {
            if point.drawdown > 0.0 {
                current += 1;
            } else {
                max_duration = max_duration.max(current);
                current = 0;
            }
        }

        max_duration.max(current)
    }

    fn consecutive_wins_losses(trades: &[Trade]) -> (i32, i32) {
        let mut max_wins = 0;
        let mut max_losses = 0;
        let mut current_wins = 0;
        let mut current_losses = 0;

        for trade in trades {
            if trade.is_winner() {
                current_wins += 1;
                current_losses = 0;
                max_wins = max_wins.max(current_wins);
            } else {
                current_losses += 1;
                current_wins = 0;
                max_losses = max_losses.max(current_losses);
            }
        }

        (max_wins, max_losses)
    }
}
