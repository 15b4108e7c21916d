use crate::models::Candle;
use chrono::{DateTime, Utc};

/// Restricts a time-ordered candle slice to `[start, end]`, inclusive on both
/// bounds. Assumes the input is already sorted by timestamp.
pub fn date_window(
    candles: &[Candle],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> &[Candle] {
    let from = candles.partition_point(|c| c.timestamp < start);
    let to = candles.partition_point(|c| c.timestamp <= end);
    &candles[from..to]
}

/// Checks that timestamps are strictly increasing.
pub fn is_strictly_ordered(candles: &[Candle]) -> bool {
    candles
        .windows(2)
        .all(|pair| pair[0].timestamp < pair[1].timestamp)
}

pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

pub fn highs(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.high).collect()
}

pub fn lows(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.low).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn series(count: i64) -> Vec<Candle> {
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
    fn date_window_is_inclusive_on_both_bounds() {
        let candles = series(10);
        let start = candles[2].timestamp;
        let end = candles[7].timestamp;
        let window = date_window(&candles, start, end);
        assert_eq!(window.len(), 6);
        assert_eq!(window.first().unwrap().timestamp, start);
        assert_eq!(window.last().unwrap().timestamp, end);
    }

    #[test]
    fn date_window_outside_range_is_empty() {
        let candles = series(5);
        let start = candles.last().unwrap().timestamp + Duration::days(1);
        let end = start + Duration::days(2);
        assert!(date_window(&candles, start, end).is_empty());
    }

    #[test]
    fn ordering_check_catches_duplicates() {
        let mut candles = series(3);
        assert!(is_strictly_ordered(&candles));
        candles[2].timestamp = candles[1].timestamp;
        assert!(!is_strictly_ordered(&candles));
    }
}
