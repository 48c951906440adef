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

//! Read-side API used by the dashboard
//!
//! Failure policy differs per call:
//! - per-server, trending and popular reads log and return empty results
//! - global metrics return the error so the UI can show an error state
//! - local trending returns activity log errors to the caller
//!
//! Remote trending and local trending are separate rankings over separate
//! data and are never merged.

use mcpstats_core::{ActivitySource, TrendingResult, TrendingWindow};
use tracing::warn;

use crate::activity_log::QueryError;
use crate::remote::{
    GlobalMetrics, PopularServer, RemoteError, RemoteMetricsClient, RemoteTrendingServer,
    ServerMetrics,
};
use crate::trending::TrendingAggregator;

pub struct MetricsFacade {
    remote: Option<RemoteMetricsClient>,
    aggregator: TrendingAggregator,
}

impl MetricsFacade {
    /// `remote` is `None` when no metrics store is configured; remote reads
    /// then behave as failed reads.
    pub fn new(remote: Option<RemoteMetricsClient>, aggregator: TrendingAggregator) -> Self {
        Self { remote, aggregator }
    }

    fn remote(&self) -> Result<&RemoteMetricsClient, RemoteError> {
        self.remote.as_ref().ok_or(RemoteError::NotConfigured)
    }

    pub async fn get_server_metrics(&self, server_id: &str) -> Option<ServerMetrics> {
        let result = match self.remote() {
            Ok(remote) => remote.server_metrics(server_id).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(metrics) => Some(metrics),
            Err(e) => {
                warn!("Failed to fetch metrics for server {}: {}", server_id, e);
                None
            }
        }
    }

    pub async fn get_global_metrics(&self) -> Result<GlobalMetrics, RemoteError> {
        self.remote()?.global_metrics().await
    }

    /// Trending list as ranked by the remote store.
    pub async fn get_trending_servers(&self, limit: usize) -> Vec<RemoteTrendingServer> {
        let result = match self.remote() {
            Ok(remote) => remote.trending(limit).await,
            Err(e) => Err(e),
        };

        result.unwrap_or_else(|e| {
            warn!("Failed to fetch trending servers: {}", e);
            Vec::new()
        })
    }

    pub async fn get_popular_servers(
        &self,
        category: Option<&str>,
        limit: usize,
    ) -> Vec<PopularServer> {
        let result = match self.remote() {
            Ok(remote) => remote.popular(category, limit).await,
            Err(e) => Err(e),
        };

        result.unwrap_or_else(|e| {
            warn!("Failed to fetch popular servers: {}", e);
            Vec::new()
        })
    }

    /// Trending list computed from the local activity log.
    pub async fn local_trending(
        &self,
        source: Option<ActivitySource>,
        window: TrendingWindow,
        limit: usize,
    ) -> Result<Vec<TrendingResult>, QueryError> {
        self.aggregator.compute_trending(source, window, limit).await
    }
}
