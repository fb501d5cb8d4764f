//! Loose-input coercion
//!
//! Record payloads arrive loosely typed (string amounts, missing dates,
//! legacy shapes). Every conversion from raw JSON into numbers or calendar
//! days lives here so the aggregation, goal, streak, and insight logic never
//! re-parses raw input.

use chrono::{NaiveDate, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::Value;

/// Coerce a JSON value to a number, treating anything non-numeric as zero.
///
/// Strings are parsed by their longest leading numeric prefix, so `"12"`,
/// `" 12.5 "` and `"12min"` all yield a value while `"abc"` yields `0.0`.
pub fn number_or_zero(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => leading_f64(s).unwrap_or(0.0),
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// Parse the longest numeric prefix of a string as `f64`.
fn leading_f64(s: &str) -> Option<f64> {
    let t = s.trim();
    let mut best = None;
    for (i, c) in t.char_indices() {
        if c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E') {
            if let Ok(v) = t[..i + c.len_utf8()].parse::<f64>() {
                best = Some(v);
            }
        } else {
            break;
        }
    }
    best
}

/// Today as a calendar day in UTC.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Format a calendar day as the persisted `YYYY-MM-DD` form.
pub fn day_string(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

/// Parse a persisted `YYYY-MM-DD` day string. Junk yields `None`.
pub fn parse_day(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Current instant as an ISO-8601 timestamp string (millisecond precision).
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// JavaScript-style truthiness for raw JSON values, used by migrations that
/// normalize legacy shapes.
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Serde helper: numeric field that tolerates legacy string values
/// (`"100"` reads as `100.0`, junk as `0.0`).
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_or_zero(&value))
}

/// Serde helper: target-day counts clamp to at least one day.
pub(crate) fn lenient_days<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok((number_or_zero(&value).max(1.0)) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_pass_through() {
        assert_eq!(number_or_zero(&json!(42)), 42.0);
        assert_eq!(number_or_zero(&json!(2.5)), 2.5);
    }

    #[test]
    fn strings_parse_leniently() {
        assert_eq!(number_or_zero(&json!("12")), 12.0);
        assert_eq!(number_or_zero(&json!(" 12.5 ")), 12.5);
        assert_eq!(number_or_zero(&json!("7min")), 7.0);
        assert_eq!(number_or_zero(&json!("-3")), -3.0);
    }

    #[test]
    fn junk_is_zero() {
        assert_eq!(number_or_zero(&json!("abc")), 0.0);
        assert_eq!(number_or_zero(&json!(null)), 0.0);
        assert_eq!(number_or_zero(&json!([1, 2])), 0.0);
        assert_eq!(number_or_zero(&json!({"a": 1})), 0.0);
    }

    #[test]
    fn day_round_trip() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();
        assert_eq!(day_string(day), "2024-01-04");
        assert_eq!(parse_day("2024-01-04"), Some(day));
        assert_eq!(parse_day("not-a-day"), None);
    }
}
