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

//! mcpstats Query Engine
//!
//! Trending aggregation over the activity log and read access to the remote
//! metrics store.

pub mod activity_log;
pub mod facade;
pub mod remote;
pub mod trending;

pub use activity_log::{ActivityLog, JsonlActivityLog, MemoryActivityLog, QueryError};
pub use facade::MetricsFacade;
pub use remote::{
    GlobalMetrics, PopularServer, RemoteError, RemoteMetricsClient, RemoteTrendingServer,
    ServerMetrics,
};
pub use trending::{
    rank_entries, recency_multiplier, trending_score, TrendingAggregator, DEFAULT_TRENDING_LIMIT,
};
