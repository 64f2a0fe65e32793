//! Environment-driven configuration.
//!
//! # Environment Variables
//!
//! - `RECUR_UTC_OFFSET_MINUTES`: reference timezone offset from UTC (default: 0)
//! - `RECUR_NOTIFY_HORIZONS`: comma-separated minutes (default: "0,5,15")
//! - `RECUR_REOPEN_INTERVAL_SECS`: reopen tick (default: 60)
//! - `RECUR_NOTIFY_INTERVAL_SECS`: notify tick, only 60 is accepted (default: 60)
//! - `RECUR_PAGE_SIZE`: due-task page size, at least 1 (default: 100)
//! - `RECUR_SENDER_LABELS`: comma-separated sender personas, one picked per notify run
//!   (default: "Task Reminder")
//! - `RECUR_NOTIFY_DESTINATION`: notification destination (default: "default")

use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

use crate::app::due::NOTIFY_PERIOD;
use crate::domain::DueHorizon;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurConfig {
    /// Timezone whose calendar day counts as "today".
    pub utc_offset: FixedOffset,
    pub notify_horizons: Vec<DueHorizon>,
    pub reopen_interval: Duration,
    /// Always `NOTIFY_PERIOD`: due tasks are matched to the exact minute.
    pub notify_interval: Duration,
    pub page_size: usize,
    /// Never empty.
    pub sender_labels: Vec<String>,
    pub destination: String,
}

impl Default for RecurConfig {
    fn default() -> Self {
        Self {
            utc_offset: Utc.fix(),
            notify_horizons: vec![
                DueHorizon::NOW,
                DueHorizon::minutes(5),
                DueHorizon::minutes(15),
            ],
            reopen_interval: Duration::from_secs(60),
            notify_interval: NOTIFY_PERIOD,
            page_size: 100,
            sender_labels: vec!["Task Reminder".to_string()],
            destination: "default".to_string(),
        }
    }
}

impl RecurConfig {
    /// Loads `.env` if present, then reads the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Unset keys take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let utc_offset = match lookup("RECUR_UTC_OFFSET_MINUTES") {
            Some(raw) => {
                let minutes: i32 = parse_number("RECUR_UTC_OFFSET_MINUTES", &raw)?;
                minutes
                    .checked_mul(60)
                    .and_then(FixedOffset::east_opt)
                    .ok_or_else(|| invalid("RECUR_UTC_OFFSET_MINUTES", "offset out of range"))?
            }
            None => defaults.utc_offset,
        };

        let notify_horizons = match lookup("RECUR_NOTIFY_HORIZONS") {
            Some(raw) => {
                let horizons = DueHorizon::parse_list(&raw)
                    .map_err(|err| invalid("RECUR_NOTIFY_HORIZONS", err))?;
                if horizons.is_empty() {
                    return Err(invalid("RECUR_NOTIFY_HORIZONS", "at least one horizon is required"));
                }
                horizons
            }
            None => defaults.notify_horizons,
        };

        let reopen_interval = lookup_secs(&lookup, "RECUR_REOPEN_INTERVAL_SECS", defaults.reopen_interval)?;
        let notify_interval = lookup_secs(&lookup, "RECUR_NOTIFY_INTERVAL_SECS", defaults.notify_interval)?;
        if notify_interval != NOTIFY_PERIOD {
            // 他の周期では同じ分を二度通知するか、分を丸ごと取りこぼす
            return Err(invalid(
                "RECUR_NOTIFY_INTERVAL_SECS",
                "due tasks are matched per minute, the notify tick must be 60 seconds",
            ));
        }

        let page_size = match lookup("RECUR_PAGE_SIZE") {
            Some(raw) => match parse_number::<usize>("RECUR_PAGE_SIZE", &raw)? {
                0 => return Err(invalid("RECUR_PAGE_SIZE", "must be at least 1")),
                n => n,
            },
            None => defaults.page_size,
        };

        let sender_labels = match lookup("RECUR_SENDER_LABELS") {
            Some(raw) => {
                let labels: Vec<String> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|label| !label.is_empty())
                    .map(str::to_string)
                    .collect();
                if labels.is_empty() {
                    return Err(invalid("RECUR_SENDER_LABELS", "at least one label is required"));
                }
                labels
            }
            None => defaults.sender_labels,
        };

        Ok(Self {
            utc_offset,
            notify_horizons,
            reopen_interval,
            notify_interval,
            page_size,
            sender_labels,
            destination: lookup("RECUR_NOTIFY_DESTINATION").unwrap_or(defaults.destination),
        })
    }
}

fn lookup_secs<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match parse_number::<u64>(key, &raw)? {
            0 => Err(invalid(key, "must be at least 1 second")),
            secs => Ok(Duration::from_secs(secs)),
        },
        None => Ok(default),
    }
}

fn parse_number<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|err| invalid(key, err))
}

fn invalid(key: &str, message: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
