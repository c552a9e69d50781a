//! Calendar-month arithmetic shared by the engine, the calculators, and the
//! scenario manager. Every period in CashCow is identified by its month's
//! first day, so the helpers here all key off that convention.

use crate::error::{CashCowError, Result};
use chrono::{Datelike, NaiveDate};

/// First day of the month following `date`'s month.
pub fn next_month_start(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap()
}

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap()
}

/// Ordered list of month-start dates covering `[start, end]` inclusive, one
/// per calendar month touched by the range.
pub fn month_starts_in_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = month_start(start);
    let last = month_start(end);
    while current <= last {
        dates.push(current);
        current = next_month_start(current);
    }
    dates
}

/// Signed number of whole calendar months between two month-start dates
/// (`end - start`, so a positive value means `end` is later).
pub fn months_between(start: NaiveDate, end: NaiveDate) -> i64 {
    let year_diff = end.year() as i64 - start.year() as i64;
    let month_diff = end.month() as i64 - start.month() as i64;
    year_diff * 12 + month_diff
}

pub fn validate_month(month: u32) -> Result<()> {
    if !(1..=12).contains(&month) {
        return Err(CashCowError::InvalidRule(format!(
            "month {} is out of range 1..=12",
            month
        )));
    }
    Ok(())
}
