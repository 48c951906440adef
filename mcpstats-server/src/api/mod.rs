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

//! HTTP handlers
//!
//! Writes go through the [`TelemetryBuffer`] and never fail because the
//! metrics store is down. Reads go through the [`MetricsFacade`].

mod health;
mod ingest;
mod metrics;
mod trending;

pub use health::{health_check, HealthResponse};
pub use ingest::{ingest_events, IngestResponse};
pub use metrics::{global_metrics, popular_servers, remote_trending, server_metrics};
pub use trending::{local_trending, TrendingResponse};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mcpstats_query::{MetricsFacade, QueryError, RemoteError};
use mcpstats_telemetry::TelemetryBuffer;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Upper bound on `limit` for list endpoints
pub const MAX_LIST_LIMIT: usize = 100;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Metrics store unavailable: {0}")]
    BadGateway(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<RemoteError> for ApiError {
    fn from(err: RemoteError) -> Self {
        ApiError::BadGateway(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub buffer: TelemetryBuffer,
    pub facade: Arc<MetricsFacade>,
}

fn clamp_limit(limit: Option<usize>, default: usize) -> usize {
    limit.unwrap_or(default).min(MAX_LIST_LIMIT)
}
