//! Display formatting for currency amounts and timestamps.

use chrono::{DateTime, Local, NaiveDateTime};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

const MIN_FRACTION_DIGITS: u32 = 4;
const MAX_FRACTION_DIGITS: u32 = 6;

fn currency_prefix(currency: &str) -> String {
    match currency {
        "EUR" => "€".to_string(),
        "USD" => "$".to_string(),
        "GBP" => "£".to_string(),
        other => format!("{other} "),
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Format a currency amount with 4 to 6 fraction digits and thousands
/// separators, e.g. `€1,234.5678`. Negative amounts render as `-€0.0100`.
pub fn format_currency(amount: f64, currency: &str) -> String {
    match Decimal::from_f64(amount) {
        Some(value) => format_decimal(value, currency),
        None => format!("{}{amount}", currency_prefix(currency)),
    }
}

/// [`format_currency`] for an exact decimal amount.
pub fn format_decimal(value: Decimal, currency: &str) -> String {
    let prefix = currency_prefix(currency);
    let mut value = value
        .round_dp_with_strategy(MAX_FRACTION_DIGITS, RoundingStrategy::MidpointAwayFromZero)
        .normalize();
    if value.scale() < MIN_FRACTION_DIGITS {
        value.rescale(MIN_FRACTION_DIGITS);
    }

    let negative = value.is_sign_negative() && !value.is_zero();
    let text = value.abs().to_string();
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), ""));

    format!(
        "{}{}{}.{}",
        if negative { "-" } else { "" },
        prefix,
        group_thousands(int_part),
        frac_part
    )
}

fn parse_local(timestamp: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

/// Local date and time, `"Never"` when absent, `"Invalid date"` when unparseable.
///
/// Offset-less timestamps are taken as local time.
pub fn format_timestamp(timestamp: Option<&str>) -> String {
    match timestamp.filter(|t| !t.is_empty()) {
        None => "Never".to_string(),
        Some(ts) => match parse_local(ts) {
            Some(dt) => dt.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string(),
            None => "Invalid date".to_string(),
        },
    }
}

/// Local time of day, `"Invalid date"` when unparseable.
pub fn format_time(timestamp: &str) -> String {
    match parse_local(timestamp) {
        Some(dt) => dt.format("%-I:%M:%S %p").to_string(),
        None => "Invalid date".to_string(),
    }
}

/// Progress percentage for display, clamped to 0..=100.
pub fn format_progress(pct: f64) -> String {
    format!("{:.0}%", pct.clamp(0.0, 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_format_decimal_exact_amounts() {
        assert_eq!(format_decimal(dec!(0.074), "EUR"), "€0.0740");
        assert_eq!(format_decimal(dec!(1234567.8), "USD"), "$1,234,567.8000");
        assert_eq!(format_decimal(dec!(0.0000005), "EUR"), "€0.000001");
        assert_eq!(format_decimal(dec!(-2.5), "GBP"), "-£2.5000");
        assert_eq!(format_decimal(dec!(0.00), "CHF"), "CHF 0.0000");
    }

    #[test]
    fn test_currency_min_fraction_digits() {
        assert_eq!(format_currency(0.074, "EUR"), "€0.0740");
        assert_eq!(format_currency(0.0, "EUR"), "€0.0000");
        assert_eq!(format_currency(5.0, "EUR"), "€5.0000");
    }

    #[test]
    fn test_currency_max_fraction_digits() {
        assert_eq!(format_currency(0.425206, "EUR"), "€0.425206");
        assert_eq!(format_currency(0.1234567, "EUR"), "€0.123457");
    }

    #[test]
    fn test_currency_grouping() {
        assert_eq!(format_currency(1234.5678, "EUR"), "€1,234.5678");
        assert_eq!(format_currency(1234567.0, "EUR"), "€1,234,567.0000");
        assert_eq!(format_currency(999.0, "EUR"), "€999.0000");
    }

    #[test]
    fn test_currency_negative_and_other_codes() {
        assert_eq!(format_currency(-0.01, "EUR"), "-€0.0100");
        assert_eq!(format_currency(2.5, "USD"), "$2.5000");
        assert_eq!(format_currency(2.5, "CHF"), "CHF 2.5000");
    }

    #[test]
    fn test_timestamp_never_and_invalid() {
        assert_eq!(format_timestamp(None), "Never");
        assert_eq!(format_timestamp(Some("")), "Never");
        assert_eq!(format_timestamp(Some("not a date")), "Invalid date");
        assert_eq!(format_time("yesterday"), "Invalid date");
    }

    #[test]
    fn test_timestamp_naive_is_local() {
        assert_eq!(
            format_timestamp(Some("2025-01-21T10:00:00.123456")),
            "1/21/2025, 10:00:00 AM"
        );
        assert_eq!(format_time("2025-01-21T15:04:05"), "3:04:05 PM");
    }

    #[test]
    fn test_timestamp_with_offset_parses() {
        let out = format_timestamp(Some("2025-01-21T10:00:00+00:00"));
        assert!(out.ends_with("AM") || out.ends_with("PM"));
        assert!(out.contains("2025"));
    }

    #[test]
    fn test_progress() {
        assert_eq!(format_progress(42.4), "42%");
        assert_eq!(format_progress(140.0), "100%");
    }
}
