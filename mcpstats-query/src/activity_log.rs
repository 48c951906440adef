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

//! Read access to the append-only activity log
//!
//! Rows are written by an external recorder. Readers here only ever select;
//! there is no update or delete path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mcpstats_core::{ActivityLogEntry, ActivitySource};
use parking_lot::RwLock;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Failed to read activity log {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed activity log entry at line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Source of activity rows for aggregation.
#[async_trait]
pub trait ActivityLog: Send + Sync {
    /// Rows with `occurred_at >= cutoff`, optionally restricted to one source.
    async fn entries_since(
        &self,
        cutoff: DateTime<Utc>,
        source: Option<ActivitySource>,
    ) -> Result<Vec<ActivityLogEntry>, QueryError>;
}

fn selects(entry: &ActivityLogEntry, cutoff: DateTime<Utc>, source: Option<ActivitySource>) -> bool {
    entry.occurred_at >= cutoff && source.map_or(true, |s| entry.source == s)
}

/// In-process activity log. Append-only.
#[derive(Debug, Default)]
pub struct MemoryActivityLog {
    entries: RwLock<Vec<ActivityLogEntry>>,
}

impl MemoryActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, entry: ActivityLogEntry) {
        self.entries.write().push(entry);
    }

    pub fn extend(&self, entries: impl IntoIterator<Item = ActivityLogEntry>) {
        self.entries.write().extend(entries);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ActivityLog for MemoryActivityLog {
    async fn entries_since(
        &self,
        cutoff: DateTime<Utc>,
        source: Option<ActivitySource>,
    ) -> Result<Vec<ActivityLogEntry>, QueryError> {
        Ok(self
            .entries
            .read()
            .iter()
            .filter(|entry| selects(entry, cutoff, source))
            .cloned()
            .collect())
    }
}

/// Reader over a JSON-lines file maintained by the recorder.
///
/// One [`ActivityLogEntry`] per line, streamed on every query. A missing file
/// reads as an empty log, and an unterminated final line is left for the next
/// read.
#[derive(Debug, Clone)]
pub struct JsonlActivityLog {
    path: PathBuf,
}

impl JsonlActivityLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> QueryError {
        QueryError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl ActivityLog for JsonlActivityLog {
    async fn entries_since(
        &self,
        cutoff: DateTime<Utc>,
        source: Option<ActivitySource>,
    ) -> Result<Vec<ActivityLogEntry>, QueryError> {
        let file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(self.io_error(source)),
        };

        let mut reader = BufReader::new(file);
        let mut line = String::new();
        let mut line_no = 0;
        let mut entries = Vec::new();

        loop {
            line.clear();
            let read = reader
                .read_line(&mut line)
                .await
                .map_err(|source| self.io_error(source))?;
            if read == 0 {
                break;
            }
            line_no += 1;

            // The recorder may be mid-write; an unterminated tail is picked up next read
            if !line.ends_with('\n') {
                debug!("Skipping incomplete activity log line {}", line_no);
                break;
            }

            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            let entry: ActivityLogEntry =
                serde_json::from_str(text).map_err(|e| QueryError::Malformed {
                    line: line_no,
                    reason: e.to_string(),
                })?;
            if selects(&entry, cutoff, source) {
                entries.push(entry);
            }
        }

        Ok(entries)
    }
}
