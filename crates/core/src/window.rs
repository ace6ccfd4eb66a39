//! Time-window filtering over reading history.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

/// Lower bound for a history query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Since {
    All,
    /// Inclusive lower bound on the server timestamp.
    From(Timestamp),
}

impl Since {
    pub fn admits(&self, timestamp: Timestamp) -> bool {
        match self {
            Since::All => true,
            Since::From(bound) => timestamp >= *bound,
        }
    }
}

/// Named look-back windows offered to dashboards and observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeWindow {
    #[default]
    #[serde(rename = "1h")]
    LastHour,
    #[serde(rename = "3h")]
    LastThreeHours,
    #[serde(rename = "6h")]
    LastSixHours,
    #[serde(rename = "24h")]
    LastDay,
    #[serde(rename = "all")]
    All,
}

impl TimeWindow {
    pub fn duration(self) -> Option<Duration> {
        match self {
            TimeWindow::LastHour => Some(Duration::hours(1)),
            TimeWindow::LastThreeHours => Some(Duration::hours(3)),
            TimeWindow::LastSixHours => Some(Duration::hours(6)),
            TimeWindow::LastDay => Some(Duration::hours(24)),
            TimeWindow::All => None,
        }
    }

    /// The query bound for this window evaluated at `now`.
    pub fn since(self, now: Timestamp) -> Since {
        match self.duration() {
            Some(duration) => Since::From(now - duration),
            None => Since::All,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            TimeWindow::LastHour => "1h",
            TimeWindow::LastThreeHours => "3h",
            TimeWindow::LastSixHours => "6h",
            TimeWindow::LastDay => "24h",
            TimeWindow::All => "all",
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeWindow {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1h" => Ok(TimeWindow::LastHour),
            "3h" => Ok(TimeWindow::LastThreeHours),
            "6h" => Ok(TimeWindow::LastSixHours),
            "24h" => Ok(TimeWindow::LastDay),
            "all" => Ok(TimeWindow::All),
            other => Err(CoreError::Validation(format!(
                "Invalid range '{other}'. Must be one of: 1h, 3h, 6h, 24h, all"
            ))),
        }
    }
}
