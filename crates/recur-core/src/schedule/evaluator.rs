//! Recurrence evaluator: decides whether a rule fires on a given day.
//!
//! Everything here is a pure function of its inputs. "Today" is always passed
//! in by the caller; nothing reads the system clock.

use chrono::{Datelike, NaiveDate};

use super::calendar::{day_of_month_matches, days_between, months_between};
use crate::domain::{Cadence, EndPolicy, RecurrenceRule};

/// Does `rule` fire on `day`?
///
/// # Guards
/// - nothing fires before `start_date`
/// - `On(end)` stops firing after `end` (the end day itself is eligible)
/// - `After(0)` never fires
///
/// # Cadence
/// - day: `days_between(start, day) % every == 0`
/// - week: whole 7-day blocks from `start` aligned to `every`, and `day`'s weekday selected
/// - month: calendar months aligned to `every`, day-of-month clamped to the month's end
/// - year: years aligned to `every`, same month, same clamped day
pub fn should_fire_on(rule: &RecurrenceRule, day: NaiveDate) -> bool {
    let start = rule.start_date;
    if day < start {
        return false;
    }
    match rule.end {
        EndPolicy::On(end) if end < day => return false,
        EndPolicy::After(0) => return false,
        _ => {}
    }

    let every = i64::from(rule.cadence.every().get());
    match rule.cadence {
        Cadence::Daily { .. } => days_between(start, day) % every == 0,
        Cadence::Weekly { weekdays, .. } => {
            let weeks = days_between(start, day) / 7;
            !weekdays.is_empty() && weeks % every == 0 && weekdays.contains(day.weekday())
        }
        Cadence::Monthly { .. } => {
            months_between(start, day) % every == 0 && day_of_month_matches(start.day(), day)
        }
        Cadence::Yearly { .. } => {
            let years = i64::from(day.year() - start.year());
            years % every == 0
                && day.month() == start.month()
                && day_of_month_matches(start.day(), day)
        }
    }
}

/// Rule state after one firing.
///
/// `After(n)` becomes `After(n - 1)`, saturating at 0. Other end policies are unchanged.
pub fn apply_firing(rule: &RecurrenceRule) -> RecurrenceRule {
    match rule.end {
        EndPolicy::After(n) => rule.with_end(EndPolicy::After(n.saturating_sub(1))),
        EndPolicy::Never | EndPolicy::On(_) => *rule,
    }
}

/// Next `count` firing days on or after `from`, consuming occurrences as it goes.
///
/// Scans at most `search_limit_days` days.
pub fn upcoming_firings(
    rule: &RecurrenceRule,
    from: NaiveDate,
    count: usize,
    search_limit_days: u32,
) -> Vec<NaiveDate> {
    let mut rule = *rule;
    let mut firings = Vec::with_capacity(count);
    let first = from.max(rule.start_date);

    for day in first.iter_days().take(search_limit_days as usize) {
        if firings.len() >= count || rule.is_exhausted() {
            break;
        }
        if let EndPolicy::On(end) = rule.end
            && day > end
        {
            break;
        }
        if should_fire_on(&rule, day) {
            firings.push(day);
            rule = apply_firing(&rule);
        }
    }
    firings
}
