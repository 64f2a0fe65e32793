//! Calendar arithmetic at day granularity.
//!
//! Month lengths and leap years are computed explicitly instead of relying on
//! date-library overflow (e.g. "day 0 of next month").

use chrono::{Datelike, NaiveDate};

/// Gregorian leap year rule.
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in `month` (1..=12) of `year`.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// Whole days from `from` to `to` (negative when `to` is earlier).
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Calendar months from `from` to `to`, ignoring the day of month.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    let years = i64::from(to.year() - from.year());
    let months = i64::from(to.month()) - i64::from(from.month());
    years * 12 + months
}

/// Day-of-month match with clamp-to-end-of-month.
///
/// An anchor day that does not exist in `day`'s month (the 31st in April,
/// the 29th in a non-leap February) matches that month's last day instead.
pub fn day_of_month_matches(anchor_day: u32, day: NaiveDate) -> bool {
    let last = days_in_month(day.year(), day.month());
    if anchor_day > last {
        day.day() == last
    } else {
        day.day() == anchor_day
    }
}
