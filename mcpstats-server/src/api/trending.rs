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

use axum::{
    extract::{Query, State},
    Json,
};
use mcpstats_core::{ActivitySource, TrendingResult, TrendingWindow};
use mcpstats_query::DEFAULT_TRENDING_LIMIT;
use serde::{Deserialize, Serialize};

use crate::api::{clamp_limit, ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct TrendingParams {
    /// `REGISTRY` or `LOCAL`; all sources when absent
    pub source: Option<String>,
    /// `24h`, `7d` or `30d`
    pub window: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TrendingResponse {
    pub window: TrendingWindow,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ActivitySource>,
    pub servers: Vec<TrendingResult>,
}

/// GET /api/servers/trending?source=&window=&limit=
pub async fn local_trending(
    State(state): State<AppState>,
    Query(params): Query<TrendingParams>,
) -> Result<Json<TrendingResponse>, ApiError> {
    let source = params
        .source
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<ActivitySource>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let window = params
        .window
        .as_deref()
        .filter(|w| !w.is_empty())
        .map(str::parse::<TrendingWindow>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
        .unwrap_or_default();

    let limit = clamp_limit(params.limit, DEFAULT_TRENDING_LIMIT);
    let servers = state.facade.local_trending(source, window, limit).await?;

    Ok(Json(TrendingResponse {
        window,
        source,
        servers,
    }))
}
