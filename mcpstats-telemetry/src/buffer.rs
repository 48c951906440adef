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

//! Event buffer with size- and time-triggered flushing
//!
//! Validated events are held in memory and handed to a [`MetricsTransport`]
//! in batches, either:
//! - As soon as `batch_size` events are buffered, OR
//! - When `flush_interval` has elapsed since the first event of the cycle
//!
//! A flush swaps the live buffer out in one step, so events accepted while a
//! batch is on the wire start a fresh cycle. Failed batches are dropped, which
//! keeps memory bounded while the metrics store is down.
//!
//! `accept` never blocks and never returns an error to the caller.

use chrono::{DateTime, Utc};
use mcpstats_core::{Event, EventCandidate, Rejection};
use parking_lot::Mutex;
use serde_json::Value;
use std::mem;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::{TelemetryConfig, DEFAULT_BATCH_SIZE, DEFAULT_FLUSH_INTERVAL_MS};
use crate::stats::{TelemetryStats, TelemetryStatsInternal};
use crate::transport::{HttpTransport, MetricsTransport, NoopTransport, TransportError};

/// Flush tuning for a [`TelemetryBuffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferConfig {
    /// Buffered events that trigger an immediate flush
    pub batch_size: usize,

    /// Maximum time the first event of a cycle waits before a partial flush
    pub flush_interval: Duration,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: Duration::from_millis(DEFAULT_FLUSH_INTERVAL_MS),
        }
    }
}

impl From<&TelemetryConfig> for BufferConfig {
    fn from(config: &TelemetryConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            flush_interval: config.flush_interval(),
        }
    }
}

/// Result of [`TelemetryBuffer::accept`]
#[derive(Debug, Clone, PartialEq)]
pub enum AcceptOutcome {
    Accepted {
        /// Live buffer length after this call
        buffered: usize,
        /// Whether this event completed a batch and started a flush
        flushed: bool,
    },
    Rejected(Rejection),
}

impl AcceptOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, AcceptOutcome::Accepted { .. })
    }
}

/// Non-blocking telemetry buffer.
///
/// Cheap to clone; clones share one buffer. Each instance is independent, so
/// tests and separate subsystems can run their own.
#[derive(Clone)]
pub struct TelemetryBuffer {
    inner: Arc<Inner>,
}

struct Inner {
    config: BufferConfig,
    transport: Arc<dyn MetricsTransport>,
    runtime: Handle,
    state: Mutex<BufferState>,
    in_flight: TaskTracker,
    stats: TelemetryStatsInternal,
}

#[derive(Default)]
struct BufferState {
    events: Vec<Event>,
    /// Bumped on every flush; a timer only flushes the cycle it was armed for
    cycle: u64,
    timer: Option<JoinHandle<()>>,
}

impl BufferState {
    fn take_batch(&mut self) -> Vec<Event> {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.cycle = self.cycle.wrapping_add(1);
        mem::take(&mut self.events)
    }
}

impl TelemetryBuffer {
    /// Create a buffer that spawns its tasks on the current Tokio runtime.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: BufferConfig, transport: Arc<dyn MetricsTransport>) -> Self {
        Self::with_runtime(config, transport, Handle::current())
    }

    pub fn with_runtime(
        config: BufferConfig,
        transport: Arc<dyn MetricsTransport>,
        runtime: Handle,
    ) -> Self {
        let config = BufferConfig {
            batch_size: config.batch_size.max(1),
            ..config
        };

        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                runtime,
                state: Mutex::new(BufferState::default()),
                in_flight: TaskTracker::new(),
                stats: TelemetryStatsInternal::default(),
            }),
        }
    }

    /// Build a buffer with an HTTP transport, or a no-op transport when no
    /// endpoint is configured.
    pub fn from_config(config: &TelemetryConfig) -> Result<Self, TransportError> {
        let transport: Arc<dyn MetricsTransport> = if config.is_enabled() {
            Arc::new(HttpTransport::new(config)?)
        } else {
            info!("No metrics endpoint configured, telemetry events will be discarded");
            Arc::new(NoopTransport)
        };

        Ok(Self::new(BufferConfig::from(config), transport))
    }

    /// Validate and enqueue an event.
    pub fn accept(&self, candidate: impl Into<EventCandidate>) -> AcceptOutcome {
        self.accept_at(candidate, Utc::now())
    }

    /// Like [`accept`](Self::accept), with an explicit submission time used to
    /// default a missing timestamp.
    pub fn accept_at(&self, candidate: impl Into<EventCandidate>, now: DateTime<Utc>) -> AcceptOutcome {
        let event = match candidate.into().validate(now) {
            Ok(event) => event,
            Err(rejection) => {
                self.inner.stats.record_rejected();
                debug!("Rejected telemetry event: {}", rejection);
                return AcceptOutcome::Rejected(rejection);
            }
        };
        self.inner.stats.record_accepted();

        let (buffered, full_batch) = {
            let mut state = self.inner.state.lock();
            state.events.push(event);

            if state.events.len() >= self.inner.config.batch_size {
                (0, Some(state.take_batch()))
            } else {
                if state.timer.is_none() {
                    let cycle = state.cycle;
                    state.timer = Some(self.inner.arm_timer(cycle));
                }
                (state.events.len(), None)
            }
        };

        let flushed = full_batch.is_some();
        if let Some(batch) = full_batch {
            debug!("Batch size reached, flushing {} events", batch.len());
            self.inner.dispatch(batch);
        }

        AcceptOutcome::Accepted { buffered, flushed }
    }

    /// Accept a raw JSON candidate as posted by a client.
    pub fn accept_value(&self, value: Value) -> AcceptOutcome {
        match EventCandidate::from_value(value) {
            Ok(candidate) => self.accept(candidate),
            Err(rejection) => {
                self.inner.stats.record_rejected();
                debug!("Rejected telemetry event: {}", rejection);
                AcceptOutcome::Rejected(rejection)
            }
        }
    }

    /// Start sending whatever is buffered without waiting for the result.
    pub fn flush(&self) {
        let batch = self.inner.state.lock().take_batch();
        self.inner.dispatch(batch);
    }

    /// Send whatever is buffered and wait for the transport call to finish.
    pub async fn force_flush(&self) {
        let batch = self.inner.state.lock().take_batch();
        if batch.is_empty() {
            return;
        }
        debug!("Force flushing {} events", batch.len());
        self.inner.send_batch(batch).await;
    }

    /// Drain the buffer and wait for every in-flight batch to settle.
    pub async fn shutdown(&self) {
        self.force_flush().await;
        self.inner.in_flight.close();
        self.inner.in_flight.wait().await;
        self.inner.in_flight.reopen();

        let stats = self.stats();
        info!(
            "Telemetry buffer drained: {} events sent, {} dropped",
            stats.events_sent, stats.events_dropped
        );
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> TelemetryStats {
        self.inner.stats.snapshot()
    }

    pub fn config(&self) -> &BufferConfig {
        &self.inner.config
    }
}

impl Inner {
    fn arm_timer(self: &Arc<Self>, cycle: u64) -> JoinHandle<()> {
        let weak: Weak<Inner> = Arc::downgrade(self);
        let interval = self.config.flush_interval;

        self.runtime.spawn(async move {
            tokio::time::sleep(interval).await;
            if let Some(inner) = weak.upgrade() {
                inner.flush_expired(cycle);
            }
        })
    }

    fn flush_expired(self: &Arc<Self>, cycle: u64) {
        let batch = {
            let mut state = self.state.lock();
            if state.cycle != cycle {
                return;
            }
            // This task is the timer; detach it instead of aborting itself
            state.timer = None;
            state.take_batch()
        };

        if !batch.is_empty() {
            debug!("Flush interval elapsed, flushing {} events", batch.len());
            self.dispatch(batch);
        }
    }

    fn dispatch(self: &Arc<Self>, batch: Vec<Event>) {
        if batch.is_empty() {
            return;
        }

        let inner = Arc::clone(self);
        self.in_flight.spawn_on(
            async move {
                inner.send_batch(batch).await;
            },
            &self.runtime,
        );
    }

    async fn send_batch(&self, batch: Vec<Event>) {
        let count = batch.len();
        match self.transport.send(&batch).await {
            Ok(()) => {
                self.stats.record_sent(count);
                debug!("Delivered telemetry batch of {} events", count);
            }
            Err(e) => {
                // Not requeued: a failed batch is gone
                self.stats.record_failed(count);
                warn!("Dropping telemetry batch of {} events: {}", count, e);
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        if !state.events.is_empty() {
            warn!(
                "Telemetry buffer dropped with {} unflushed events",
                state.events.len()
            );
        }
    }
}
