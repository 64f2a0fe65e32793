//! RecurrenceRule - 繰り返しルールの型付き表現
//!
//! CRUD 層が保存する payload（`RawRepeatConfig`）は境界で検証され、
//! このモジュールの型に変換されます。評価器は欠けたフィールドから意図を推測しません。
//!
//! # 表現できない組み合わせ
//! - `weekdays` は `Cadence::Weekly` にしか存在しない
//! - `EndPolicy::On` は必ず日付を持ち、`EndPolicy::After` は必ず回数を持つ
//! - `Interval` は 0 になれない

use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Validation failures for a repeat config coming from the CRUD layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("missing or mistyped field `{0}`")]
    MissingField(&'static str),

    #[error("interval must be a positive integer (got {0})")]
    InvalidInterval(i64),

    #[error("unknown interval unit `{0}`; expected day|week|month|year")]
    UnknownUnit(String),

    #[error("unknown weekday label `{0}`; expected Sun..Sat")]
    UnknownWeekday(String),

    #[error("weekly rule selects no weekdays")]
    NoWeekdays,

    #[error("unknown end policy `{0}`; expected never|on|after")]
    UnknownEndPolicy(String),

    #[error("field `{field}` is not a date: `{value}`")]
    InvalidDate { field: &'static str, value: String },
}

/// Multiplier applied to the interval unit (every N days/weeks/...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval(NonZeroU32);

impl Interval {
    pub const ONE: Interval = Interval(NonZeroU32::MIN);

    pub fn new(n: u32) -> Option<Self> {
        NonZeroU32::new(n).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Day,
    Week,
    Month,
    Year,
}

impl IntervalUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            IntervalUnit::Day => "day",
            IntervalUnit::Week => "week",
            IntervalUnit::Month => "month",
            IntervalUnit::Year => "year",
        }
    }
}

impl fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntervalUnit {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(IntervalUnit::Day),
            "week" => Ok(IntervalUnit::Week),
            "month" => Ok(IntervalUnit::Month),
            "year" => Ok(IntervalUnit::Year),
            other => Err(RuleError::UnknownUnit(other.to_string())),
        }
    }
}

/// Weekday labels in the order the UI presents them.
const WEEKDAY_LABELS: [(&str, Weekday); 7] = [
    ("Sun", Weekday::Sun),
    ("Mon", Weekday::Mon),
    ("Tue", Weekday::Tue),
    ("Wed", Weekday::Wed),
    ("Thu", Weekday::Thu),
    ("Fri", Weekday::Fri),
    ("Sat", Weekday::Sat),
];

/// Set of weekdays a weekly rule fires on.
///
/// Bit `i` is set when the weekday with `num_days_from_sunday() == i` is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub const EMPTY: WeekdaySet = WeekdaySet(0);

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= Self::bit(day);
    }

    pub fn contains(self, day: Weekday) -> bool {
        self.0 & Self::bit(day) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Selected weekdays, Sunday first.
    pub fn iter(self) -> impl Iterator<Item = Weekday> {
        WEEKDAY_LABELS
            .into_iter()
            .map(|(_, day)| day)
            .filter(move |day| self.contains(*day))
    }

    /// Labels as stored by the CRUD layer ("Sun".."Sat").
    pub fn labels(self) -> Vec<String> {
        self.iter().map(|day| weekday_label(day).to_string()).collect()
    }

    /// Parses UI labels. Matching is case-insensitive; duplicates collapse.
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Result<Self, RuleError> {
        let mut set = WeekdaySet::EMPTY;
        for label in labels {
            let label = label.as_ref();
            let day = WEEKDAY_LABELS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(label.trim()))
                .map(|(_, day)| *day)
                .ok_or_else(|| RuleError::UnknownWeekday(label.to_string()))?;
            set.insert(day);
        }
        Ok(set)
    }

    fn bit(day: Weekday) -> u8 {
        1 << day.num_days_from_sunday()
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut set = WeekdaySet::EMPTY;
        for day in iter {
            set.insert(day);
        }
        set
    }
}

pub fn weekday_label(day: Weekday) -> &'static str {
    WEEKDAY_LABELS[day.num_days_from_sunday() as usize].0
}

/// How often a rule fires. Unit-specific data lives on its variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Daily { every: Interval },
    Weekly { every: Interval, weekdays: WeekdaySet },
    Monthly { every: Interval },
    Yearly { every: Interval },
}

impl Cadence {
    pub fn every(&self) -> Interval {
        match *self {
            Cadence::Daily { every }
            | Cadence::Weekly { every, .. }
            | Cadence::Monthly { every }
            | Cadence::Yearly { every } => every,
        }
    }

    pub fn unit(&self) -> IntervalUnit {
        match self {
            Cadence::Daily { .. } => IntervalUnit::Day,
            Cadence::Weekly { .. } => IntervalUnit::Week,
            Cadence::Monthly { .. } => IntervalUnit::Month,
            Cadence::Yearly { .. } => IntervalUnit::Year,
        }
    }
}

/// End condition of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndPolicy {
    Never,
    /// Last eligible day (inclusive).
    On(NaiveDate),
    /// Firings left; the rule is exhausted at 0.
    After(u32),
}

impl EndPolicy {
    pub fn occurrences_remaining(self) -> Option<u32> {
        match self {
            EndPolicy::After(n) => Some(n),
            EndPolicy::Never | EndPolicy::On(_) => None,
        }
    }
}

/// Declarative description of how often and until when a task recurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurrenceRule {
    /// First eligible day. Nothing fires before it.
    pub start_date: NaiveDate,
    pub cadence: Cadence,
    pub end: EndPolicy,
}

impl RecurrenceRule {
    pub fn new(start_date: NaiveDate, cadence: Cadence) -> Self {
        Self {
            start_date,
            cadence,
            end: EndPolicy::Never,
        }
    }

    pub fn with_end(mut self, end: EndPolicy) -> Self {
        self.end = end;
        self
    }

    pub fn daily(start_date: NaiveDate, every: Interval) -> Self {
        Self::new(start_date, Cadence::Daily { every })
    }

    pub fn weekly(start_date: NaiveDate, every: Interval, weekdays: WeekdaySet) -> Self {
        Self::new(start_date, Cadence::Weekly { every, weekdays })
    }

    pub fn monthly(start_date: NaiveDate, every: Interval) -> Self {
        Self::new(start_date, Cadence::Monthly { every })
    }

    pub fn yearly(start_date: NaiveDate, every: Interval) -> Self {
        Self::new(start_date, Cadence::Yearly { every })
    }

    /// `After(0)` never fires again.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.end, EndPolicy::After(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_rejects_zero() {
        assert!(Interval::new(0).is_none());
        assert_eq!(Interval::new(3).map(Interval::get), Some(3));
        assert_eq!(Interval::ONE.get(), 1);
    }

    #[test]
    fn weekday_set_parses_ui_labels() {
        let set = WeekdaySet::from_labels(&["Mon", "thu", "Mon"]).unwrap();

        assert_eq!(set.len(), 2);
        assert!(set.contains(Weekday::Mon));
        assert!(set.contains(Weekday::Thu));
        assert!(!set.contains(Weekday::Sun));
        assert_eq!(set.labels(), vec!["Mon".to_string(), "Thu".to_string()]);
    }

    #[test]
    fn weekday_set_rejects_unknown_label() {
        let err = WeekdaySet::from_labels(&["Monday"]).unwrap_err();
        assert_eq!(err, RuleError::UnknownWeekday("Monday".to_string()));
    }

    #[test]
    fn weekday_set_iterates_sunday_first() {
        let set: WeekdaySet = [Weekday::Sat, Weekday::Sun, Weekday::Wed].into_iter().collect();
        let days: Vec<Weekday> = set.iter().collect();
        assert_eq!(days, vec![Weekday::Sun, Weekday::Wed, Weekday::Sat]);
    }

    #[test]
    fn unit_round_trips_through_str() {
        for unit in [
            IntervalUnit::Day,
            IntervalUnit::Week,
            IntervalUnit::Month,
            IntervalUnit::Year,
        ] {
            assert_eq!(unit.as_str().parse::<IntervalUnit>().unwrap(), unit);
        }
        assert!(matches!(
            "fortnight".parse::<IntervalUnit>(),
            Err(RuleError::UnknownUnit(_))
        ));
    }

    #[test]
    fn exhausted_only_for_after_zero() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 20).unwrap();
        let rule = RecurrenceRule::daily(start, Interval::ONE);

        assert!(!rule.is_exhausted());
        assert!(!rule.with_end(EndPolicy::After(1)).is_exhausted());
        assert!(rule.with_end(EndPolicy::After(0)).is_exhausted());
        assert_eq!(rule.end.occurrences_remaining(), None);
    }
}
