// Event date and time normalization

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AppError, AppResult};

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
];

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

static TIME_INPUT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d{1,2})(?:[:.](\d{2}))?\s*(am|pm)?$").expect("time pattern compiles")
});

/// Parse a loosely formatted date and keep only its calendar date as `YYYY-MM-DD`.
///
/// Time of day and any UTC offset are discarded; the date is the one written in
/// the input, not the date after converting to UTC.
pub fn normalize_date(raw: &str) -> AppResult<String> {
    parse_date(raw.trim())
        .map(|date| date.format("%Y-%m-%d").to_string())
        .ok_or_else(|| AppError::Validation(format!("invalid date: {:?}", raw)))
}

fn parse_date(input: &str) -> Option<NaiveDate> {
    if input.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(input) {
        return Some(dt.date_naive());
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(input, fmt).ok())
        .or_else(|| {
            DATE_TIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Normalize a clock time to zero-padded 24-hour `HH:MM`.
///
/// Accepts `H`, `HH`, `H:MM`, `HH:MM` and `H.MM`, optionally followed by `AM`/`PM`.
/// With a meridiem the hour must be 1-12 (`12 AM` is midnight, `12 PM` is noon),
/// so `13:00 PM` is rejected. Without one the hour must be 0-23.
pub fn normalize_time(raw: &str) -> AppResult<String> {
    let invalid = || AppError::Validation(format!("invalid time: {:?}", raw));
    let caps = TIME_INPUT.captures(raw.trim()).ok_or_else(invalid)?;

    let hour: u32 = caps[1].parse().map_err(|_| invalid())?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().map_err(|_| invalid())?,
        None => 0,
    };
    if minute > 59 {
        return Err(invalid());
    }

    let hour = match caps.get(3).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(meridiem) => {
            if !(1..=12).contains(&hour) {
                return Err(invalid());
            }
            match (meridiem.as_str(), hour) {
                ("am", 12) => 0,
                ("am", h) => h,
                (_, 12) => 12,
                (_, h) => h + 12,
            }
        }
        None if hour > 23 => return Err(invalid()),
        None => hour,
    };

    Ok(format!("{:02}:{:02}", hour, minute))
}
