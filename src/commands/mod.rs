pub mod backtest;
pub mod list_strategies;
pub mod sweep;

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::collections::HashMap;

/// Parse a `YYYY-MM-DD` date as the first instant of that day (UTC).
pub fn parse_start_date(raw: &str) -> Result<DateTime<Utc>> {
    let date = parse_date(raw)?;
    Ok(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("valid midnight")))
}

/// Parse a `YYYY-MM-DD` date as the last second of that day (UTC), so the
/// inclusive range covers the whole trading day.
pub fn parse_end_date(raw: &str) -> Result<DateTime<Utc>> {
    let date = parse_date(raw)?;
    Ok(Utc.from_utc_datetime(&date.and_hms_opt(23, 59, 59).expect("valid end of day")))
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| anyhow!("expected a YYYY-MM-DD date, got '{}'", raw))
}

/// Parse repeated `key=value` strategy parameters into a parameter map.
pub fn parse_parameters(raw: &[String]) -> Result<HashMap<String, f64>> {
    let mut parameters = HashMap::new();
    for entry in raw {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("expected key=value parameter, got '{}'", entry))?;
        let parsed = value
            .trim()
            .parse::<f64>()
            .map_err(|_| anyhow!("parameter '{}' must be numeric, got '{}'", key, value))?;
        if !parsed.is_finite() {
            return Err(anyhow!("parameter '{}' must be finite", key));
        }
        parameters.insert(key.trim().to_string(), parsed);
    }
    Ok(parameters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_helpers_bracket_the_day() {
        let start = parse_start_date("2024-03-05").unwrap();
        let end = parse_end_date("2024-03-05").unwrap();
        assert!(start < end);
        assert_eq!(start.format("%H:%M:%S").to_string(), "00:00:00");
        assert_eq!(end.format("%H:%M:%S").to_string(), "23:59:59");
        assert!(parse_start_date("03/05/2024").is_err());
    }

    #[test]
    fn parameters_parse_and_reject_garbage() {
        let parsed = parse_parameters(&["period=21".to_string(), "stdDev=2.5".to_string()]).unwrap();
        assert_eq!(parsed.get("period"), Some(&21.0));
        assert_eq!(parsed.get("stdDev"), Some(&2.5));

        assert!(parse_parameters(&["period".to_string()]).is_err());
        assert!(parse_parameters(&["period=abc".to_string()]).is_err());
        assert!(parse_parameters(&["period=inf".to_string()]).is_err());
    }
}
