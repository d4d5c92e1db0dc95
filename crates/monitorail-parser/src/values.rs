//! Permissive value parsing
//!
//! Every parser returns `None` for input it cannot interpret. The caller
//! counts those and reports them instead of failing the run.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Working hours in one slack day
pub const HOURS_PER_DAY: f64 = 8.0;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];

/// Parse a date or date-time.
///
/// Accepts RFC 3339 (the offset is dropped, local wall time kept), naive
/// ISO date-times, plain dates (midnight), day-first `DD/MM/YYYY` and epoch
/// milliseconds.
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(value, fmt) {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }
    parse_epoch_millis(value)
}

fn parse_epoch_millis(value: &str) -> Option<NaiveDateTime> {
    let digits = value.strip_prefix('-').unwrap_or(value);
    // Shorter runs of digits are more likely years or garbage than timestamps
    if digits.len() < 9 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let millis: i64 = value.parse().ok()?;
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

/// Parse a number, tolerating a decimal comma and a trailing `%`
pub fn parse_number(value: &str) -> Option<f64> {
    let value = value.trim().trim_end_matches('%').trim();
    if value.is_empty() {
        return None;
    }
    let parsed = value
        .parse::<f64>()
        .ok()
        .or_else(|| value.replace(',', ".").parse::<f64>().ok())?;
    parsed.is_finite().then_some(parsed)
}

/// Parse a money amount
pub fn parse_decimal(value: &str) -> Option<Decimal> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .or_else(|_| Decimal::from_str(&value.replace(',', ".")))
        .ok()
}

/// Parse total slack into whole days.
///
/// Plain numbers are days (an optional `d`/`g` suffix is allowed). ISO 8601
/// durations such as `PT16H0M0S` or `-P1DT4H` are converted at
/// [`HOURS_PER_DAY`] working hours per day and rounded.
pub fn parse_slack_days(value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let (negative, body) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };

    let days = if let Some(iso) = body.strip_prefix('P').or_else(|| body.strip_prefix('p')) {
        iso_duration_hours(iso)? / HOURS_PER_DAY
    } else {
        let number = body
            .trim_end_matches(|c: char| c.is_ascii_alphabetic())
            .trim();
        parse_number(number)?
    };

    let days = days.round() as i64;
    Some(if negative { -days } else { days })
}

/// Hours in the part of an ISO 8601 duration following `P`
fn iso_duration_hours(body: &str) -> Option<f64> {
    let mut hours = 0.0;
    let mut in_time = false;
    let mut number = String::new();
    let mut seen_component = false;

    for c in body.chars() {
        match c.to_ascii_uppercase() {
            'T' => in_time = true,
            '0'..='9' | '.' | ',' => number.push(if c == ',' { '.' } else { c }),
            unit => {
                let n: f64 = number.parse().ok()?;
                number.clear();
                seen_component = true;
                hours += match (in_time, unit) {
                    (false, 'W') => n * 5.0 * HOURS_PER_DAY,
                    (false, 'D') => n * HOURS_PER_DAY,
                    (true, 'H') => n,
                    (true, 'M') => n / 60.0,
                    (true, 'S') => n / 3600.0,
                    _ => return None,
                };
            }
        }
    }

    (seen_component && number.is_empty()).then_some(hours)
}
