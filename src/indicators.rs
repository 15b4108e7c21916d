use crate::models::Candle;

pub fn sma(prices: &[f64], period: usize) -> Vec<f64> {
    if prices.is_empty() {
        return Vec::new();
    }
    if period <= 1 || prices.len() < period {
        return prices.to_vec();
    }

    let mut values = Vec::with_capacity(prices.len());
    for _ in 0..period - 1 {
        values.push(prices[0]);
    }

    let mut window_sum: f64 = prices[..period].iter().sum();
    values.push(window_sum / period as f64);
    for i in period..prices.len() {
        window_sum += prices[i] - prices[i - period];
        values.push(window_sum / period as f64);
    }

    values
}

pub fn ema(prices: &[f64], period: usize) -> Vec<f64> {
    if prices.is_empty() {
        return Vec::new();
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut values = Vec::with_capacity(prices.len());
    values.push(prices[0]);

    for i in 1..prices.len() {
        let next = (prices[i] * multiplier) + (values[i - 1] * (1.0 - multiplier));
        values.push(next);
    }

    values
}

fn rsi_from_avgs(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

/// Wilder-smoothed RSI. Values before the warm-up index are pinned to the
/// neutral 50.0.
pub fn rsi(prices: &[f64], period: usize) -> Vec<f64> {
    if prices.is_empty() {
        return Vec::new();
    }
    if period == 0 || prices.len() < period + 1 {
        return vec![50.0; prices.len()];
    }

    let mut values = vec![50.0; prices.len()];
    let mut sum_gain = 0.0_f64;
    let mut sum_loss = 0.0_f64;
    for i in 1..=period {
        let delta = prices[i] - prices[i - 1];
        if delta >= 0.0 {
            sum_gain += delta;
        } else {
            sum_loss += -delta;
        }
    }

    let mut avg_gain = sum_gain / period as f64;
    let mut avg_loss = sum_loss / period as f64;
    values[period] = rsi_from_avgs(avg_gain, avg_loss);

    for i in (period + 1)..prices.len() {
        let delta = prices[i] - prices[i - 1];
        let gain = if delta > 0.0 { delta } else { 0.0 };
        let loss = if delta < 0.0 { -delta } else { 0.0 };
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
        values[i] = rsi_from_avgs(avg_gain, avg_loss);
    }

    values
}

pub fn macd(
    prices: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let fast_ema = ema(prices, fast_period);
    let slow_ema = ema(prices, slow_period);

    let mut macd_line = Vec::with_capacity(prices.len());
    for i in 0..prices.len() {
        macd_line.push(fast_ema[i] - slow_ema[i]);
    }

    let signal_line = ema(&macd_line, signal_period);

    let mut histogram = Vec::with_capacity(prices.len());
    for i in 0..macd_line.len() {
        histogram.push(macd_line[i] - signal_line[i]);
    }

    (macd_line, signal_line, histogram)
}

/// Bollinger bands aligned to the input length: (middle, upper, lower).
/// Head values before the first full window collapse onto the first price.
pub fn bollinger_bands(
    prices: &[f64],
    period: usize,
    std_dev: f64,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    if prices.is_empty() || period == 0 {
        return (Vec::new(), Vec::new(), Vec::new());
    }

    let middle = sma(prices, period);
    let mut upper = Vec::with_capacity(prices.len());
    let mut lower = Vec::with_capacity(prices.len());

    for i in 0..prices.len() {
        if i + 1 < period {
            upper.push(middle[i]);
            lower.push(middle[i]);
            continue;
        }
        let window = &prices[i + 1 - period..=i];
        let mean = middle[i];
        let variance =
            window.iter().map(|&value| (value - mean).powi(2)).sum::<f64>() / period as f64;
        let deviation = variance.sqrt();
        upper.push(mean + std_dev * deviation);
        lower.push(mean - std_dev * deviation);
    }

    (middle, upper, lower)
}

/// ATR over a candle slice, aligned to the input length. The first value uses
/// high-low only (no previous close); values before the warm-up index average
/// whatever true ranges exist so far.
pub fn atr(candles: &[Candle], period: usize) -> Vec<f64> {
    if candles.is_empty() || period == 0 {
        return Vec::new();
    }

    let mut tr_values = Vec::with_capacity(candles.len());
    for i in 0..candles.len() {
        let candle = &candles[i];
        let prev_close = if i > 0 {
            candles[i - 1].close
        } else {
            candle.close
        };
        let tr = (candle.high - candle.low)
            .max((candle.high - prev_close).abs())
            .max((candle.low - prev_close).abs());
        tr_values.push(tr);
    }

    let mut values = Vec::with_capacity(candles.len());
    for i in 0..tr_values.len() {
        let start = i.saturating_sub(period - 1);
        let window = &tr_values[start..=i];
        values.push(window.iter().sum::<f64>() / window.len() as f64);
    }

    values
}

/// ATR at a single index, for rule arithmetic that only needs the latest value.
pub fn atr_at(candles: &[Candle], index: usize, period: usize) -> Option<f64> {
    if index >= candles.len() || period == 0 {
        return None;
    }
    atr(&candles[..=index], period).last().copied()
}

/// Stochastic oscillator (%K smoothed, %D), aligned to the input length.
pub fn stochastic(
    candles: &[Candle],
    k_period: usize,
    smooth_k: usize,
    d_period: usize,
) -> (Vec<f64>, Vec<f64>) {
    if candles.is_empty() || k_period == 0 {
        return (Vec::new(), Vec::new());
    }

    let mut raw_k = Vec::with_capacity(candles.len());
    for i in 0..candles.len() {
        let start = i.saturating_sub(k_period - 1);
        let window = &candles[start..=i];
        let low_min = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let high_max = window
            .iter()
            .map(|c| c.high)
            .fold(f64::NEG_INFINITY, f64::max);
        let range = high_max - low_min;
        if range > 0.0 {
            raw_k.push(100.0 * (candles[i].close - low_min) / range);
        } else {
            raw_k.push(50.0);
        }
    }

    let k = sma(&raw_k, smooth_k.max(1));
    let d = sma(&k, d_period.max(1));
    (k, d)
}

/// True where `first` crosses above `second` between consecutive points.
pub fn crossover(first: &[f64], second: &[f64]) -> Vec<bool> {
    let len = first.len().min(second.len());
    let mut values = vec![false; len];
    for i in 1..len {
        values[i] = first[i - 1] <= second[i - 1] && first[i] > second[i];
    }
    values
}

/// True where `first` crosses below `second` between consecutive points.
pub fn crossunder(first: &[f64], second: &[f64]) -> Vec<bool> {
    let len = first.len().min(second.len());
    let mut values = vec![false; len];
    for i in 1..len {
        values[i] = first[i - 1] >= second[i - 1] && first[i] < second[i];
    }
    values
}
