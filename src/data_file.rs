use crate::models::Candle;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CandleRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

/// Load an OHLCV series from a CSV file with columns
/// `timestamp,open,high,low,close,volume`. Timestamps may be milliseconds
/// since epoch, RFC 3339, `YYYY-MM-DD HH:MM:SS` or a plain date. Rows are
/// sorted by timestamp on the way in.
pub fn load_candles_csv(path: &Path) -> Result<Vec<Candle>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open candle file {}", path.display()))?;

    let mut candles = Vec::new();
    for (index, row) in reader.deserialize::<CandleRow>().enumerate() {
        let row = row.with_context(|| format!("invalid candle row {}", index + 1))?;
        let timestamp = parse_timestamp(&row.timestamp)
            .with_context(|| format!("invalid timestamp in row {}", index + 1))?;
        candles.push(Candle {
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }

    if candles.is_empty() {
        return Err(anyhow!("candle file {} contains no rows", path.display()));
    }

    candles.sort_by_key(|candle| candle.timestamp);
    Ok(candles)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let trimmed = raw.trim();

    if let Ok(millis) = trimmed.parse::<i64>() {
        return Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| anyhow!("timestamp {} is out of range", millis));
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&parsed));
    }

    if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&parsed.and_hms_opt(0, 0, 0).expect("valid midnight")));
    }

    Err(anyhow!("unrecognized timestamp format: {}", raw))
}
