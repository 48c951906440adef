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

//! Telemetry event ingestion

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::api::AppState;
use mcpstats_telemetry::AcceptOutcome;

/// Response for POST /api/telemetry/events
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub accepted: usize,
    pub rejected: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// POST /api/telemetry/events - Submit one event or an array of events
///
/// ```json
/// [
///   {"kind": "install", "serverId": "srv-1", "userId": "u-1", "source": "registry"},
///   {"kind": "view", "serverId": "srv-1", "source": "detail"}
/// ]
/// ```
///
/// Always answers 202. Invalid events are counted in `rejected` and
/// described in `errors`; they do not fail the request.
#[tracing::instrument(skip_all)]
pub async fn ingest_events(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<IngestResponse>) {
    let candidates = match body {
        Value::Array(items) => items,
        single => vec![single],
    };

    let mut response = IngestResponse {
        accepted: 0,
        rejected: 0,
        errors: Vec::new(),
    };

    for (idx, candidate) in candidates.into_iter().enumerate() {
        match state.buffer.accept_value(candidate) {
            AcceptOutcome::Accepted { .. } => response.accepted += 1,
            AcceptOutcome::Rejected(rejection) => {
                response.rejected += 1;
                response.errors.push(format!("event {}: {}", idx, rejection));
            }
        }
    }

    debug!(
        "Ingested {} events, rejected {}",
        response.accepted, response.rejected
    );
    (StatusCode::ACCEPTED, Json(response))
}
