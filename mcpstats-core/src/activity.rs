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

//! Activity log rows
//!
//! The activity log is append-only and owned by an external recorder. This
//! crate only describes the row shape and how rows map to a canonical server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Catalogue a server was installed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivitySource {
    Registry,
    Local,
}

impl ActivitySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivitySource::Registry => "REGISTRY",
            ActivitySource::Local => "LOCAL",
        }
    }
}

impl fmt::Display for ActivitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown activity source: {0}")]
pub struct SourceParseError(pub String);

impl FromStr for ActivitySource {
    type Err = SourceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "REGISTRY" => Ok(ActivitySource::Registry),
            "LOCAL" => Ok(ActivitySource::Local),
            _ => Err(SourceParseError(s.to_string())),
        }
    }
}

/// Recorded action. Unrecognised actions are kept and count toward totals only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityAction {
    Install,
    Uninstall,
    ToolCall,
    ResourceRead,
    PromptGet,
    Other(String),
}

impl ActivityAction {
    pub fn as_str(&self) -> &str {
        match self {
            ActivityAction::Install => "install",
            ActivityAction::Uninstall => "uninstall",
            ActivityAction::ToolCall => "tool_call",
            ActivityAction::ResourceRead => "resource_read",
            ActivityAction::PromptGet => "prompt_get",
            ActivityAction::Other(name) => name,
        }
    }
}

impl From<String> for ActivityAction {
    fn from(name: String) -> Self {
        match name.as_str() {
            "install" => ActivityAction::Install,
            "uninstall" => ActivityAction::Uninstall,
            "tool_call" => ActivityAction::ToolCall,
            "resource_read" => ActivityAction::ResourceRead,
            "prompt_get" => ActivityAction::PromptGet,
            _ => ActivityAction::Other(name),
        }
    }
}

impl From<&str> for ActivityAction {
    fn from(name: &str) -> Self {
        ActivityAction::from(name.to_string())
    }
}

impl From<ActivityAction> for String {
    fn from(action: ActivityAction) -> Self {
        match action {
            ActivityAction::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

/// Identifier that merges activity recorded under the internal id and the
/// registry's external id for the same logical server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalServerKey(String);

impl CanonicalServerKey {
    /// Registry rows with an external id use that id; everything else uses
    /// the internal server id.
    pub fn derive(source: ActivitySource, server_id: &str, external_id: Option<&str>) -> Self {
        match (source, external_id) {
            (ActivitySource::Registry, Some(external)) if !external.is_empty() => {
                Self(external.to_string())
            }
            _ => Self(server_id.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalServerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of the activity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogEntry {
    pub source: ActivitySource,
    pub server_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub action: ActivityAction,
    pub occurred_at: DateTime<Utc>,
}

impl ActivityLogEntry {
    pub fn new(
        source: ActivitySource,
        server_id: impl Into<String>,
        action: impl Into<ActivityAction>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source,
            server_id: server_id.into(),
            external_id: None,
            action: action.into(),
            occurred_at,
        }
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn canonical_key(&self) -> CanonicalServerKey {
        CanonicalServerKey::derive(self.source, &self.server_id, self.external_id.as_deref())
    }
}
