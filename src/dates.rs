use chrono::{Datelike, Duration, NaiveDate};

use crate::error::{Result, XsmbError};

const DATE_FORMAT: &str = "%Y-%m-%d";

const WEEKDAYS_VN: [&str; 7] = [
    "Chủ Nhật", "Thứ Hai", "Thứ Ba", "Thứ Tư", "Thứ Năm", "Thứ Sáu", "Thứ Bảy",
];

pub fn parse_date(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date.trim(), DATE_FORMAT)
        .map_err(|e| XsmbError::InvalidDate(format!("{}: {}", date, e)))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Moves a `YYYY-MM-DD` date by whole days on the naive calendar.
pub fn shift_date(date: &str, delta_days: i64) -> Result<String> {
    let parsed = parse_date(date)?;
    parsed
        .checked_add_signed(Duration::days(delta_days))
        .map(format_date)
        .ok_or_else(|| XsmbError::InvalidDate(format!("{} shifted by {} days", date, delta_days)))
}

/// e.g. "Thứ Hai, 25/11/2024"
pub fn format_human(date: &str) -> Result<String> {
    let parsed = parse_date(date)?;
    let weekday = WEEKDAYS_VN[parsed.weekday().num_days_from_sunday() as usize];
    Ok(format!(
        "{}, {:02}/{:02}/{}",
        weekday,
        parsed.day(),
        parsed.month(),
        parsed.year()
    ))
}

/// The `dd/mm/yyyy` form used in lookup queries.
pub fn format_for_lookup(date: &str) -> Result<String> {
    let parsed = parse_date(date)?;
    Ok(format!(
        "{:02}/{:02}/{}",
        parsed.day(),
        parsed.month(),
        parsed.year()
    ))
}

/// `today` and the `count - 1` days before it, newest first.
pub fn recent_dates(today: &str, count: usize) -> Result<Vec<String>> {
    let start = parse_date(today)?;
    let mut dates = Vec::with_capacity(count);

    for offset in 0..count {
        if let Some(date) = start.checked_sub_signed(Duration::days(offset as i64)) {
            dates.push(format_date(date));
        }
    }

    Ok(dates)
}

/// Next-day navigation stops at `max_date`.
pub fn can_advance(date: &str, max_date: &str) -> bool {
    match (parse_date(date), parse_date(max_date)) {
        (Ok(date), Ok(max)) => date < max,
        _ => false,
    }
}

/// Moves `date` by `offset` days without going past `max_date`.
pub fn navigate(date: &str, offset: i64, max_date: &str) -> Result<String> {
    parse_date(max_date)?;
    let shifted = shift_date(date, offset)?;

    if can_advance(max_date, &shifted) {
        Ok(max_date.to_string())
    } else {
        Ok(shifted)
    }
}
