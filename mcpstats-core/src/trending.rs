// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::activity::{ActivitySource, CanonicalServerKey};

/// Sliding window used for trending aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrendingWindow {
    #[serde(rename = "24h")]
    Day,
    #[default]
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
}

impl TrendingWindow {
    pub fn hours(&self) -> i64 {
        match self {
            TrendingWindow::Day => 24,
            TrendingWindow::Week => 168,
            TrendingWindow::Month => 720,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TrendingWindow::Day => "24h",
            TrendingWindow::Week => "7d",
            TrendingWindow::Month => "30d",
        }
    }

    /// Oldest timestamp still inside the window ending at `now`.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::hours(self.hours())
    }
}

impl fmt::Display for TrendingWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown trending window {0:?}, expected 24h, 7d or 30d")]
pub struct WindowParseError(pub String);

impl FromStr for TrendingWindow {
    type Err = WindowParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "24h" => Ok(TrendingWindow::Day),
            "7d" => Ok(TrendingWindow::Week),
            "30d" => Ok(TrendingWindow::Month),
            other => Err(WindowParseError(other.to_string())),
        }
    }
}

/// One ranked server. Computed per query and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingResult {
    pub server_key: CanonicalServerKey,
    pub source: ActivitySource,
    /// Installs minus uninstalls; negative when a server is losing users
    pub net_install_count: i64,
    pub tool_call_count: u64,
    pub total_activity_count: u64,
    pub trending_score: i64,
    pub last_activity_at: DateTime<Utc>,
}
