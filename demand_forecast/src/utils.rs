//! Calendar-month arithmetic and lenient cell parsing

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime};

/// Date formats accepted in source tables
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// First day of the date's month
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Shift a month start by `months` (negative goes back), saturating at the
/// representable calendar range
pub fn add_months(date: NaiveDate, months: i32) -> NaiveDate {
    let start = month_start(date);
    if months >= 0 {
        start
            .checked_add_months(Months::new(months.unsigned_abs()))
            .unwrap_or(NaiveDate::MAX)
    } else {
        start
            .checked_sub_months(Months::new(months.unsigned_abs()))
            .unwrap_or(NaiveDate::MIN)
    }
}

/// Number of whole months from `from` to `to`
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i32 {
    (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32
}

/// Month starts from `start` to `end`, both included
pub fn month_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let count = months_between(start, end);
    if count < 0 {
        return Vec::new();
    }
    (0..=count).map(|i| add_months(start, i)).collect()
}

/// Flu campaign months: September to January
pub fn is_campaign_month(month: u32) -> bool {
    matches!(month, 9..=12 | 1)
}

/// Winter months: November to February
pub fn is_winter_month(month: u32) -> bool {
    matches!(month, 11 | 12 | 1 | 2)
}

/// Parse a date cell and align it to its month start
pub fn parse_month(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(month_start(date));
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(month_start(ts.date()));
        }
    }
    // bare "YYYY-MM"
    NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d").ok()
}

/// Parse a numeric cell, accepting a decimal comma
pub fn parse_number(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let value = match raw.parse::<f64>() {
        Ok(v) => v,
        Err(_) => raw.replace(' ', "").replace(',', ".").parse::<f64>().ok()?,
    };
    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}
