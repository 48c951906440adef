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

//! HTTP client for the remote metrics store's read endpoints.

use chrono::{DateTime, Utc};
use mcpstats_telemetry::TelemetryConfig;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("metrics store is not configured")]
    NotConfigured,

    #[error("invalid metrics store URL: {0}")]
    InvalidUrl(String),

    #[error("metrics store returned HTTP {status}")]
    Http { status: u16 },

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to decode metrics response: {0}")]
    Decode(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Per-server counters kept by the metrics store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerMetrics {
    pub server_id: String,
    pub installs: u64,
    pub uninstalls: u64,
    pub views: u64,
    pub usage_count: u64,
    pub error_count: u64,
    pub shares: u64,
    pub average_rating: Option<f64>,
    pub rating_count: u64,
    pub last_activity_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalMetrics {
    pub total_servers: u64,
    pub total_installs: u64,
    pub total_views: u64,
    pub total_usage: u64,
    pub total_errors: u64,
    pub active_users: u64,
}

/// Trending entry as ranked by the metrics store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteTrendingServer {
    pub server_id: String,
    pub score: f64,
    pub installs: u64,
    pub views: u64,
    pub usage_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PopularServer {
    pub server_id: String,
    pub category: Option<String>,
    pub installs: u64,
    pub average_rating: Option<f64>,
    pub rating_count: u64,
}

/// Read client for `GET /api/metrics/...` with HTTP Basic credentials.
pub struct RemoteMetricsClient {
    client: reqwest::Client,
    base_url: Url,
    username: String,
    password: String,
}

impl RemoteMetricsClient {
    pub fn new(config: &TelemetryConfig) -> Result<Self, RemoteError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or(RemoteError::NotConfigured)?;
        let base_url = Url::parse(endpoint).map_err(|e| RemoteError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::InvalidUrl(endpoint.to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| RemoteError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<T, RemoteError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Http {
                status: status.as_u16(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    /// GET /api/metrics/server/{id}
    pub async fn server_metrics(&self, server_id: &str) -> Result<ServerMetrics, RemoteError> {
        let url = self.url(&["api", "metrics", "server", server_id]);
        self.get_json(url, &[]).await
    }

    /// GET /api/metrics/global
    pub async fn global_metrics(&self) -> Result<GlobalMetrics, RemoteError> {
        let url = self.url(&["api", "metrics", "global"]);
        self.get_json(url, &[]).await
    }

    /// GET /api/metrics/trending?limit=N
    pub async fn trending(&self, limit: usize) -> Result<Vec<RemoteTrendingServer>, RemoteError> {
        let url = self.url(&["api", "metrics", "trending"]);
        self.get_json(url, &[("limit", limit.to_string())]).await
    }

    /// GET /api/metrics/popular?category=&limit=N
    pub async fn popular(
        &self,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<PopularServer>, RemoteError> {
        let url = self.url(&["api", "metrics", "popular"]);
        let mut query = vec![("limit", limit.to_string())];
        if let Some(category) = category {
            query.push(("category", category.to_string()));
        }
        self.get_json(url, &query).await
    }
}
