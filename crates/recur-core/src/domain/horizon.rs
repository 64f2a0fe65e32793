//! Lookahead horizons for due-task notifications.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Offset from "now", in whole minutes, at which a task is announced.
///
/// `0` means "due now"; `15` means "due in 15 minutes".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DueHorizon(u32);

impl DueHorizon {
    pub const NOW: DueHorizon = DueHorizon(0);

    pub fn minutes(minutes: u32) -> Self {
        Self(minutes)
    }

    pub fn offset(self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.0))
    }

    /// Instant a task must be due at (minute precision) to fall in this horizon.
    pub fn target(self, now: DateTime<Utc>) -> DateTime<Utc> {
        minute_floor(now) + self.offset()
    }

    /// Message framing for this horizon.
    pub fn framing(self) -> String {
        match self.0 {
            0 => "is due now".to_string(),
            1 => "is due in 1 minute".to_string(),
            n => format!("is due in {n} minutes"),
        }
    }

    /// Parses a comma-separated list like `"0,5,15"`. Duplicates collapse, order is ascending.
    pub fn parse_list(s: &str) -> Result<Vec<DueHorizon>, std::num::ParseIntError> {
        let mut horizons = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::parse::<DueHorizon>)
            .collect::<Result<Vec<_>, _>>()?;
        horizons.sort_unstable();
        horizons.dedup();
        Ok(horizons)
    }
}

impl fmt::Display for DueHorizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{}m", self.0)
    }
}

impl FromStr for DueHorizon {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(DueHorizon)
    }
}

/// Drops seconds and sub-second components.
pub fn minute_floor(at: DateTime<Utc>) -> DateTime<Utc> {
    at.duration_trunc(TimeDelta::minutes(1)).unwrap_or(at)
}
