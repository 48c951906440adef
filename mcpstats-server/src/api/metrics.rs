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

//! Proxied reads from the remote metrics store

use axum::{
    extract::{Path, Query, State},
    Json,
};
use mcpstats_query::{GlobalMetrics, PopularServer, RemoteTrendingServer, ServerMetrics};
use serde::Deserialize;

use crate::api::{clamp_limit, ApiError, AppState};

const DEFAULT_REMOTE_LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PopularParams {
    pub category: Option<String>,
    pub limit: Option<usize>,
}

/// GET /api/metrics/servers/:id - `null` when the store has nothing or is down
pub async fn server_metrics(
    State(state): State<AppState>,
    Path(server_id): Path<String>,
) -> Json<Option<ServerMetrics>> {
    Json(state.facade.get_server_metrics(&server_id).await)
}

/// GET /api/metrics/global
pub async fn global_metrics(
    State(state): State<AppState>,
) -> Result<Json<GlobalMetrics>, ApiError> {
    let metrics = state.facade.get_global_metrics().await?;
    Ok(Json(metrics))
}

/// GET /api/metrics/trending?limit=N
pub async fn remote_trending(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Json<Vec<RemoteTrendingServer>> {
    let limit = clamp_limit(params.limit, DEFAULT_REMOTE_LIMIT);
    Json(state.facade.get_trending_servers(limit).await)
}

/// GET /api/metrics/popular?category=&limit=N
pub async fn popular_servers(
    State(state): State<AppState>,
    Query(params): Query<PopularParams>,
) -> Json<Vec<PopularServer>> {
    let limit = clamp_limit(params.limit, DEFAULT_REMOTE_LIMIT);
    let category = params.category.as_deref().filter(|c| !c.is_empty());
    Json(state.facade.get_popular_servers(category, limit).await)
}
