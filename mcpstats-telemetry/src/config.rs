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

//! Telemetry Configuration
//!
//! Remote metrics store location, credentials and flush tuning. Values can be
//! read from `MCPSTATS_*` environment variables for zero-config deployment.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Base URL of the remote metrics store (e.g., "https://metrics.example.com").
    /// Telemetry is disabled when unset.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// HTTP Basic username
    #[serde(default)]
    pub username: String,

    /// HTTP Basic password
    #[serde(default)]
    pub password: String,

    /// Buffered events that trigger an immediate flush
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Idle time after the first buffered event before a partial batch is flushed
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_flush_interval_ms() -> u64 {
    DEFAULT_FLUSH_INTERVAL_MS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            username: String::new(),
            password: String::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl fmt::Debug for TelemetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryConfig")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("batch_size", &self.batch_size)
            .field("flush_interval_ms", &self.flush_interval_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl TelemetryConfig {
    /// Build a config from environment variables, falling back to defaults.
    ///
    /// - MCPSTATS_METRICS_ENDPOINT
    /// - MCPSTATS_METRICS_USER
    /// - MCPSTATS_METRICS_PASSWORD
    /// - MCPSTATS_BATCH_SIZE
    /// - MCPSTATS_FLUSH_INTERVAL_MS
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields whose environment variable is set.
    pub fn apply_env(&mut self) {
        if let Ok(endpoint) = env::var("MCPSTATS_METRICS_ENDPOINT") {
            self.endpoint = Some(endpoint).filter(|e| !e.trim().is_empty());
        }

        if let Ok(user) = env::var("MCPSTATS_METRICS_USER") {
            self.username = user;
        }

        if let Ok(password) = env::var("MCPSTATS_METRICS_PASSWORD") {
            self.password = password;
        }

        if let Some(size) = env::var("MCPSTATS_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.batch_size = size;
        }

        if let Some(ms) = env::var("MCPSTATS_FLUSH_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.flush_interval_ms = ms;
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
