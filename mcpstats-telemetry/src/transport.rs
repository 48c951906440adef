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

//! Batch transport to the remote metrics store
//!
//! One call sends one whole batch. A batch either lands or fails as a unit;
//! callers decide what to do with a failed batch (the buffer drops it).

use async_trait::async_trait;
use mcpstats_core::Event;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::config::TelemetryConfig;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("metrics store returned HTTP {status}")]
    Http { status: u16 },

    #[error("network error: {0}")]
    Network(String),

    #[error("telemetry endpoint is not configured")]
    NotConfigured,

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Sends batches of validated events somewhere.
#[async_trait]
pub trait MetricsTransport: Send + Sync {
    async fn send(&self, batch: &[Event]) -> Result<(), TransportError>;
}

#[derive(Serialize)]
struct BatchBody<'a> {
    events: &'a [Event],
}

/// `POST {endpoint}/api/events/batch` with HTTP Basic credentials.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    username: String,
    password: String,
}

impl HttpTransport {
    pub fn new(config: &TelemetryConfig) -> Result<Self, TransportError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or(TransportError::NotConfigured)?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self {
            client,
            url: format!("{}/api/events/batch", endpoint.trim_end_matches('/')),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }
}

#[async_trait]
impl MetricsTransport for HttpTransport {
    async fn send(&self, batch: &[Event]) -> Result<(), TransportError> {
        let response = self
            .client
            .post(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&BatchBody { events: batch })
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!("Exported {} events to metrics store", batch.len());
            Ok(())
        } else {
            Err(TransportError::Http {
                status: status.as_u16(),
            })
        }
    }
}

/// Used when no remote store is configured; batches are discarded.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTransport;

#[async_trait]
impl MetricsTransport for NoopTransport {
    async fn send(&self, batch: &[Event]) -> Result<(), TransportError> {
        debug!("Telemetry disabled, discarding {} events", batch.len());
        Ok(())
    }
}
