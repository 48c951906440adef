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
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use mcpstats_core::{ActivityLogEntry, ActivitySource};
use mcpstats_query::{
    ActivityLog, JsonlActivityLog, MemoryActivityLog, MetricsFacade, RemoteMetricsClient,
    TrendingAggregator,
};
use mcpstats_server::{api::AppState, build_router, config::ServerConfig};
use mcpstats_telemetry::{BufferConfig, NoopTransport, TelemetryBuffer, TelemetryConfig};
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use tower::ServiceExt;

fn app(endpoint: Option<String>, log: Arc<dyn ActivityLog>) -> Router {
    let buffer = TelemetryBuffer::new(BufferConfig::default(), Arc::new(NoopTransport));
    let remote = endpoint.map(|endpoint| {
        RemoteMetricsClient::new(&TelemetryConfig {
            endpoint: Some(endpoint),
            ..Default::default()
        })
        .unwrap()
    });
    let state = AppState {
        buffer,
        facade: Arc::new(MetricsFacade::new(remote, TrendingAggregator::new(log))),
    };
    build_router(state, &ServerConfig::default())
}

fn empty_log() -> Arc<dyn ActivityLog> {
    Arc::new(MemoryActivityLog::new())
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    read(response).await
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    read(response).await
}

async fn read(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_ingest_counts_accepted_and_rejected() {
    let app = app(None, empty_log());

    let (status, body) = post_json(
        &app,
        "/api/telemetry/events",
        json!([
            {"kind": "install", "serverId": "srv-1", "userId": "u-1", "source": "registry"},
            {"kind": "rating", "serverId": "srv-1", "userId": "u-1", "rating": 6},
            {"kind": "teleport", "serverId": "srv-1"}
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["accepted"], 1);
    assert_eq!(body["rejected"], 2);
    assert_eq!(body["errors"].as_array().unwrap().len(), 2);

    let (status, health) = get(&app, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["bufferedEvents"], 1);
    assert_eq!(health["telemetry"]["accepted"], 1);
    assert_eq!(health["telemetry"]["rejected"], 2);
    assert_eq!(health["telemetry"]["eventsDropped"], 0);
    assert!(health.get("buffered_events").is_none());
}

#[tokio::test]
async fn test_ingest_single_object() {
    let app = app(None, empty_log());

    let (status, body) = post_json(
        &app,
        "/api/telemetry/events",
        json!({"kind": "view", "serverId": "srv-1", "source": "detail"}),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["accepted"], 1);
    assert_eq!(body["rejected"], 0);
    assert!(body.get("errors").is_none());
}

#[tokio::test]
async fn test_server_metrics_remote_failure_is_null() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/metrics/server/srv-1")
        .with_status(500)
        .create_async()
        .await;
    let app = app(Some(server.url()), empty_log());

    let (status, body) = get(&app, "/api/metrics/servers/srv-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn test_global_metrics_failure_is_bad_gateway() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/metrics/global")
        .with_status(500)
        .create_async()
        .await;
    let app = app(Some(server.url()), empty_log());

    let (status, body) = get(&app, "/api/metrics/global").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("500"));
}

#[tokio::test]
async fn test_global_metrics_without_remote_is_bad_gateway() {
    let app = app(None, empty_log());
    let (status, _) = get(&app, "/api/metrics/global").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_remote_trending_passes_through() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/metrics/trending")
        .match_query(mockito::Matcher::UrlEncoded("limit".into(), "3".into()))
        .with_status(200)
        .with_body(r#"[{"serverId":"srv-9","score":12.5}]"#)
        .create_async()
        .await;
    let app = app(Some(server.url()), empty_log());

    let (status, body) = get(&app, "/api/metrics/trending?limit=3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["serverId"], "srv-9");
}

#[tokio::test]
async fn test_popular_failure_is_empty_list() {
    let app = app(Some("http://127.0.0.1:9".to_string()), empty_log());
    let (status, body) = get(&app, "/api/metrics/popular?category=search").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_local_trending_ranks_activity() {
    let log = Arc::new(MemoryActivityLog::new());
    let recent = Utc::now() - Duration::hours(1);
    for _ in 0..3 {
        log.append(
            ActivityLogEntry::new(ActivitySource::Registry, "1", "install", recent)
                .with_external_id("acme/search"),
        );
    }
    log.append(ActivityLogEntry::new(ActivitySource::Local, "local-1", "tool_call", recent));
    log.append(ActivityLogEntry::new(ActivitySource::Local, "idle", "other", recent));
    let app = app(None, log);

    let (status, body) = get(&app, "/api/servers/trending").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["window"], "7d");

    let servers = body["servers"].as_array().unwrap();
    assert_eq!(servers.len(), 2);
    assert_eq!(servers[0]["serverKey"], "acme/search");
    assert_eq!(servers[0]["source"], "REGISTRY");
    assert_eq!(servers[0]["netInstallCount"], 3);
    assert_eq!(servers[1]["serverKey"], "local-1");

    let (_, body) = get(&app, "/api/servers/trending?source=local&window=24h&limit=5").await;
    assert_eq!(body["source"], "LOCAL");
    let servers = body["servers"].as_array().unwrap();
    assert_eq!(servers.len(), 1);
    assert_eq!(servers[0]["toolCallCount"], 1);
}

#[tokio::test]
async fn test_local_trending_rejects_bad_params() {
    let app = app(None, empty_log());

    let (status, body) = get(&app, "/api/servers/trending?window=1y").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("1y"));

    let (status, _) = get(&app, "/api/servers/trending?source=github").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_local_trending_log_failure_is_internal_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{{not json").unwrap();
    let app = app(None, Arc::new(JsonlActivityLog::new(file.path())));

    let (status, body) = get(&app, "/api/servers/trending").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("line 1"));
}
