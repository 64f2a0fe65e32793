//! RawRepeatConfig - CRUD 層が保存する繰り返し設定（境界用の緩い型）
//!
//! UI はすべてのフィールドを常に保存します（例: `ends = "never"` でも
//! `occurrences = 10` が残る）。このモジュールはその payload を受け取り、
//! `RecurrenceRule` へ検証付きで変換します。
//!
//! # 日付の扱い
//! `startDate` / `endDate` は `YYYY-MM-DD` と RFC 3339 タイムスタンプの両方を受け付け、
//! タイムスタンプの場合は基準タイムゾーンでの日付部分を使います。
//!
//! # 型の揺れ
//! JSON の型が合わないフィールド（`"everyNumber": "2"` など）は `None` として読み、
//! `to_rule` で `RuleError` になります。行の一覧全体のデシリアライズは失敗させません。

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use super::rule::{Cadence, EndPolicy, Interval, IntervalUnit, RecurrenceRule, RuleError, WeekdaySet};

/// Repeat config exactly as the CRUD layer persists it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRepeatConfig {
    #[serde(default, deserialize_with = "lenient")]
    pub every_number: Option<i64>,

    #[serde(default, deserialize_with = "lenient")]
    pub every_unit: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub selected_days: Option<Vec<String>>,

    #[serde(default, deserialize_with = "lenient")]
    pub start_date: Option<String>,

    /// "never" | "on" | "after"; absent means never.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub ends: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub end_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub occurrences: Option<i64>,
}

impl RawRepeatConfig {
    /// Validates the payload and builds a typed rule.
    ///
    /// `offset` is the reference timezone used to take the date part of timestamps.
    pub fn to_rule(&self, offset: FixedOffset) -> Result<RecurrenceRule, RuleError> {
        let every_number = self
            .every_number
            .ok_or(RuleError::MissingField("everyNumber"))?;
        let every = u32::try_from(every_number)
            .ok()
            .and_then(Interval::new)
            .ok_or(RuleError::InvalidInterval(every_number))?;

        let unit: IntervalUnit = self
            .every_unit
            .as_deref()
            .ok_or(RuleError::MissingField("everyUnit"))?
            .parse()?;

        let start_date = parse_day(
            "startDate",
            self.start_date
                .as_deref()
                .ok_or(RuleError::MissingField("startDate"))?,
            offset,
        )?;

        let cadence = match unit {
            IntervalUnit::Day => Cadence::Daily { every },
            IntervalUnit::Week => {
                let labels = self.selected_days.as_deref().unwrap_or_default();
                let weekdays = WeekdaySet::from_labels(labels)?;
                if weekdays.is_empty() {
                    return Err(RuleError::NoWeekdays);
                }
                Cadence::Weekly { every, weekdays }
            }
            IntervalUnit::Month => Cadence::Monthly { every },
            IntervalUnit::Year => Cadence::Yearly { every },
        };

        let end = match self.ends.as_deref() {
            None | Some("never") => EndPolicy::Never,
            Some("on") => {
                let raw = self
                    .end_date
                    .as_deref()
                    .ok_or(RuleError::MissingField("endDate"))?;
                EndPolicy::On(parse_day("endDate", raw, offset)?)
            }
            Some("after") => {
                let n = self
                    .occurrences
                    .ok_or(RuleError::MissingField("occurrences"))?;
                // 負数はすでに使い切ったものとして扱う
                EndPolicy::After(u32::try_from(n.max(0)).unwrap_or(u32::MAX))
            }
            Some(other) => return Err(RuleError::UnknownEndPolicy(other.to_string())),
        };

        Ok(RecurrenceRule {
            start_date,
            cadence,
            end,
        })
    }

    /// Same payload with only `occurrences` replaced.
    ///
    /// Used to persist a decremented rule without touching the fields the
    /// CRUD layer owns (date formats, leftover UI values).
    pub fn with_occurrences(&self, occurrences: u32) -> Self {
        Self {
            occurrences: Some(i64::from(occurrences)),
            ..self.clone()
        }
    }
}

impl From<&RecurrenceRule> for RawRepeatConfig {
    fn from(rule: &RecurrenceRule) -> Self {
        let selected_days = match rule.cadence {
            Cadence::Weekly { weekdays, .. } => Some(weekdays.labels()),
            _ => None,
        };
        let (ends, end_date, occurrences) = match rule.end {
            EndPolicy::Never => ("never", None, None),
            EndPolicy::On(day) => ("on", Some(day.to_string()), None),
            EndPolicy::After(n) => ("after", None, Some(i64::from(n))),
        };
        Self {
            every_number: Some(i64::from(rule.cadence.every().get())),
            every_unit: Some(rule.cadence.unit().to_string()),
            selected_days,
            start_date: Some(rule.start_date.to_string()),
            ends: Some(ends.to_string()),
            end_date,
            occurrences,
        }
    }
}

/// Reads a field of any JSON type; a mismatch becomes `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// `repeat_config` column reader: `null` is "not recurring", anything else is a
/// repeat config. A non-object value becomes an empty config, which fails validation.
pub(crate) fn deserialize_repeat_config<'de, D>(
    deserializer: D,
) -> Result<Option<RawRepeatConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(value).unwrap_or_default()))
}

fn parse_day(field: &'static str, value: &str, offset: FixedOffset) -> Result<NaiveDate, RuleError> {
    let value = value.trim();
    if let Ok(day) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(day);
    }
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&offset).date_naive())
        .map_err(|_| RuleError::InvalidDate {
            field,
            value: value.to_string(),
        })
}
