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

//! mcpstats HTTP server
//!
//! Telemetry ingestion for MCP server usage events and read endpoints for the
//! dashboard: remote metrics and the locally computed trending ranking.

pub mod api;
pub mod config;

use anyhow::Result;
use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use mcpstats_query::{
    ActivityLog, JsonlActivityLog, MemoryActivityLog, MetricsFacade, RemoteMetricsClient,
    TrendingAggregator,
};
use mcpstats_telemetry::TelemetryBuffer;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::{
    global_metrics, health_check, ingest_events, local_trending, popular_servers,
    remote_trending, server_metrics, AppState,
};
use config::ServerConfig;

/// Install the global tracing subscriber.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mcpstats_server=info,mcpstats_telemetry=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wire the buffer, remote client and activity log from configuration.
///
/// Must be called from within a Tokio runtime.
pub fn build_state(config: &ServerConfig) -> Result<AppState> {
    let buffer = TelemetryBuffer::from_config(&config.telemetry)?;

    let remote = if config.telemetry.is_enabled() {
        Some(RemoteMetricsClient::new(&config.telemetry)?)
    } else {
        tracing::warn!("No metrics endpoint configured, remote metrics reads will be empty");
        None
    };

    let log: Arc<dyn ActivityLog> = match &config.activity_log.path {
        Some(path) => {
            tracing::info!("Reading activity log from {:?}", path);
            Arc::new(JsonlActivityLog::new(path.clone()))
        }
        None => {
            tracing::warn!("No activity log configured, local trending will be empty");
            Arc::new(MemoryActivityLog::new())
        }
    };

    Ok(AppState {
        buffer,
        facade: Arc::new(MetricsFacade::new(remote, TrendingAggregator::new(log))),
    })
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    if !config.server.enable_cors {
        return CorsLayer::new();
    }

    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.server.cors_origins.is_empty() {
        tracing::warn!("CORS: Allowing all origins. Set cors_origins in production!");
        return cors.allow_origin(Any);
    }

    tracing::info!("CORS: Allowing origins: {:?}", config.server.cors_origins);
    let origins: Vec<HeaderValue> = config
        .server
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("CORS: Ignoring invalid origin {:?}", origin);
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/telemetry/events", post(ingest_events))
        .route("/api/metrics/servers/:id", get(server_metrics))
        .route("/api/metrics/global", get(global_metrics))
        .route("/api/metrics/trending", get(remote_trending))
        .route("/api/metrics/popular", get(popular_servers))
        .route("/api/servers/trending", get(local_trending))
        .with_state(state)
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http())
}

pub async fn run_server(config: ServerConfig) -> Result<()> {
    init_tracing();

    tracing::info!("Starting mcpstats server");
    tracing::info!("Configuration: {:#?}", config);

    config.validate()?;

    let state = build_state(&config)?;
    let buffer = state.buffer.clone();
    let app = build_router(state, &config);

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped, draining telemetry buffer");
    buffer.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
