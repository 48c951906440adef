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

use anyhow::Result;
use mcpstats_telemetry::TelemetryConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// mcpstats Server Configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpServerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub activity_log: ActivityLogConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpServerConfig {
    /// HTTP API listen address (e.g., "127.0.0.1:47200")
    #[serde(default = "default_http_addr")]
    pub listen_addr: String,

    /// Enable CORS
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,

    /// Allowed CORS origins (empty = allow all)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ActivityLogConfig {
    /// JSON-lines file appended by the activity recorder.
    /// When unset, trending runs over an empty in-memory log.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_http_addr() -> String {
    "127.0.0.1:47200".to_string()
}

fn default_enable_cors() -> bool {
    true
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_http_addr(),
            enable_cors: default_enable_cors(),
            cors_origins: vec![],
        }
    }
}

impl ServerConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from environment variables
    ///
    /// Supported environment variables:
    /// - MCPSTATS_HTTP_ADDR: HTTP listen address (default: 127.0.0.1:47200)
    /// - MCPSTATS_ENABLE_CORS: Enable CORS (default: true)
    /// - MCPSTATS_ACTIVITY_LOG: Path to the activity log file
    /// - MCPSTATS_METRICS_* and batching variables, see [`TelemetryConfig::from_env`]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Load configuration with priority: env > file > defaults
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let mut config = if let Some(path) = config_file {
            if path.exists() {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            } else {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
        } else {
            Self::default()
        };

        config.apply_env();

        Ok(config)
    }

    /// Override fields whose environment variable is set
    fn apply_env(&mut self) {
        if let Ok(addr) = std::env::var("MCPSTATS_HTTP_ADDR") {
            self.server.listen_addr = addr;
        }

        if let Ok(cors) = std::env::var("MCPSTATS_ENABLE_CORS") {
            self.server.enable_cors = cors.parse().unwrap_or(true);
        }

        if let Ok(path) = std::env::var("MCPSTATS_ACTIVITY_LOG") {
            self.activity_log.path = Some(PathBuf::from(path));
        }

        self.telemetry.apply_env();
    }

    /// Parse listen address as SocketAddr
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(self.server.listen_addr.parse()?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        if self.telemetry.batch_size == 0 {
            anyhow::bail!("telemetry.batch_size must be greater than zero");
        }

        if self.telemetry.flush_interval_ms == 0 {
            anyhow::bail!("telemetry.flush_interval_ms must be greater than zero");
        }

        if let Some(path) = &self.activity_log.path {
            if path.is_dir() {
                anyhow::bail!("activity_log.path {:?} is a directory", path);
            }
        }

        Ok(())
    }
}
