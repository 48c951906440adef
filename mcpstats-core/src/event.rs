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

//! Telemetry event model
//!
//! Events are usage records for a single MCP server (installs, views, tool
//! usage, ratings, ...). Call sites hand in an [`EventCandidate`], either
//! built from a typed [`EventPayload`] or decoded from untrusted JSON, and
//! [`EventCandidate::validate`] turns it into an immutable [`Event`] or a
//! [`Rejection`]. Validation never panics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Closed set of event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Install,
    Uninstall,
    Usage,
    View,
    Error,
    Rating,
    Claim,
    Share,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::Install,
        EventKind::Uninstall,
        EventKind::Usage,
        EventKind::View,
        EventKind::Error,
        EventKind::Rating,
        EventKind::Claim,
        EventKind::Share,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Install => "install",
            EventKind::Uninstall => "uninstall",
            EventKind::Usage => "usage",
            EventKind::View => "view",
            EventKind::Error => "error",
            EventKind::Rating => "rating",
            EventKind::Claim => "claim",
            EventKind::Share => "share",
        }
    }

    /// Look up a kind by its wire name. Returns `None` outside the closed set.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a server detail view originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewSource {
    Search,
    Detail,
    Profile,
    Discover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareVisibility {
    Public,
    Private,
}

/// Kind-specific event fields
///
/// Serialized with a `kind` tag and camelCase field names, which is the
/// shape the remote metrics store expects inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum EventPayload {
    Install {
        server_id: String,
        user_id: String,
        source: String,
    },
    Uninstall {
        server_id: String,
        user_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Usage {
        server_id: String,
        user_id: String,
        tool_name: String,
        duration_ms: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        success: Option<bool>,
    },
    View {
        server_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        source: ViewSource,
    },
    Error {
        server_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        error: String,
        context: String,
    },
    Rating {
        server_id: String,
        user_id: String,
        rating: u8,
    },
    Claim {
        server_id: String,
        user_id: String,
    },
    Share {
        server_id: String,
        user_id: String,
        visibility: ShareVisibility,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Install { .. } => EventKind::Install,
            EventPayload::Uninstall { .. } => EventKind::Uninstall,
            EventPayload::Usage { .. } => EventKind::Usage,
            EventPayload::View { .. } => EventKind::View,
            EventPayload::Error { .. } => EventKind::Error,
            EventPayload::Rating { .. } => EventKind::Rating,
            EventPayload::Claim { .. } => EventKind::Claim,
            EventPayload::Share { .. } => EventKind::Share,
        }
    }

    pub fn server_id(&self) -> &str {
        match self {
            EventPayload::Install { server_id, .. }
            | EventPayload::Uninstall { server_id, .. }
            | EventPayload::Usage { server_id, .. }
            | EventPayload::View { server_id, .. }
            | EventPayload::Error { server_id, .. }
            | EventPayload::Rating { server_id, .. }
            | EventPayload::Claim { server_id, .. }
            | EventPayload::Share { server_id, .. } => server_id,
        }
    }

    /// Range and emptiness checks that serde cannot express.
    fn check(&self) -> Result<(), Rejection> {
        require("serverId", self.server_id())?;

        match self {
            EventPayload::Install {
                user_id, source, ..
            } => {
                require("userId", user_id)?;
                require("source", source)
            }
            EventPayload::Uninstall { user_id, .. }
            | EventPayload::Claim { user_id, .. }
            | EventPayload::Share { user_id, .. } => require("userId", user_id),
            EventPayload::Usage {
                user_id, tool_name, ..
            } => {
                require("userId", user_id)?;
                require("toolName", tool_name)
            }
            EventPayload::View { user_id, .. } => require_if_present("userId", user_id.as_deref()),
            EventPayload::Error {
                user_id,
                error,
                context,
                ..
            } => {
                require_if_present("userId", user_id.as_deref())?;
                require("error", error)?;
                require("context", context)
            }
            EventPayload::Rating {
                user_id, rating, ..
            } => {
                require("userId", user_id)?;
                if !(MIN_RATING..=MAX_RATING).contains(rating) {
                    return Err(Rejection::OutOfRange {
                        field: "rating",
                        value: i64::from(*rating),
                        min: i64::from(MIN_RATING),
                        max: i64::from(MAX_RATING),
                    });
                }
                Ok(())
            }
        }
    }
}

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

fn require(field: &'static str, value: &str) -> Result<(), Rejection> {
    if value.trim().is_empty() {
        Err(Rejection::EmptyField { field })
    } else {
        Ok(())
    }
}

fn require_if_present(field: &'static str, value: Option<&str>) -> Result<(), Rejection> {
    match value {
        Some(value) => require(field, value),
        None => Ok(()),
    }
}

/// A validated telemetry event.
///
/// Only produced by [`EventCandidate::validate`]; fields are read-only so an
/// event cannot change after it has been accepted into a buffer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    #[serde(flatten)]
    payload: EventPayload,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Map<String, Value>>,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn server_id(&self) -> &str {
        self.payload.server_id()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.metadata.as_ref()
    }
}

/// Why a candidate was not accepted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("event must be a JSON object")]
    NotAnObject,

    #[error("event kind is missing")]
    MissingKind,

    #[error("unknown event kind: {0}")]
    UnknownKind(String),

    #[error("invalid fields for {kind} event: {reason}")]
    InvalidFields { kind: String, reason: String },

    #[error("field {field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("field {field} out of range: {value} not in {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// An unvalidated event as submitted by a call site.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventCandidate {
    pub kind: Option<String>,
    /// RFC 3339 string or epoch milliseconds. Absent means "now".
    pub timestamp: Option<Value>,
    pub metadata: Option<Value>,
    /// Kind-specific fields, camelCase
    pub fields: Map<String, Value>,
}

impl EventCandidate {
    /// Split a JSON object into discriminator, envelope and payload fields.
    pub fn from_value(value: Value) -> Result<Self, Rejection> {
        let Value::Object(mut fields) = value else {
            return Err(Rejection::NotAnObject);
        };

        let kind = match fields.remove("kind") {
            Some(Value::String(kind)) => Some(kind),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };

        Ok(Self {
            kind,
            timestamp: fields.remove("timestamp"),
            metadata: fields.remove("metadata"),
            fields,
        })
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(Value::String(timestamp.to_rfc3339()));
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(Value::Object(metadata));
        self
    }

    /// Validate the candidate, defaulting a missing timestamp to `now`.
    pub fn validate(self, now: DateTime<Utc>) -> Result<Event, Rejection> {
        let kind = match self.kind.as_deref().map(str::trim) {
            None | Some("") => return Err(Rejection::MissingKind),
            Some(name) => EventKind::parse(name)
                .ok_or_else(|| Rejection::UnknownKind(name.to_string()))?,
        };

        let timestamp = parse_timestamp(self.timestamp, now)?;

        let metadata = match self.metadata {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(map),
            Some(_) => {
                return Err(Rejection::InvalidFields {
                    kind: kind.to_string(),
                    reason: "metadata must be an object".to_string(),
                })
            }
        };

        let mut fields = self.fields;
        fields.insert("kind".to_string(), Value::String(kind.as_str().to_string()));
        let payload: EventPayload =
            serde_json::from_value(Value::Object(fields)).map_err(|e| {
                Rejection::InvalidFields {
                    kind: kind.to_string(),
                    reason: e.to_string(),
                }
            })?;
        payload.check()?;

        Ok(Event {
            payload,
            timestamp,
            metadata,
        })
    }
}

impl From<EventPayload> for EventCandidate {
    fn from(payload: EventPayload) -> Self {
        let kind = payload.kind().as_str().to_string();
        let fields = match serde_json::to_value(&payload) {
            Ok(Value::Object(mut map)) => {
                map.remove("kind");
                map
            }
            _ => Map::new(),
        };

        Self {
            kind: Some(kind),
            timestamp: None,
            metadata: None,
            fields,
        }
    }
}

fn parse_timestamp(raw: Option<Value>, now: DateTime<Utc>) -> Result<DateTime<Utc>, Rejection> {
    match raw {
        None | Some(Value::Null) => Ok(now),
        Some(Value::String(text)) => DateTime::parse_from_rfc3339(&text)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| Rejection::InvalidTimestamp(format!("{text}: {e}"))),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .ok_or_else(|| Rejection::InvalidTimestamp(n.to_string())),
        Some(other) => Err(Rejection::InvalidTimestamp(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn candidate(value: Value) -> EventCandidate {
        EventCandidate::from_value(value).unwrap()
    }

    #[test]
    fn test_install_defaults_timestamp_to_now() {
        let event = candidate(json!({
            "kind": "install",
            "serverId": "srv-1",
            "userId": "u-1",
            "source": "search"
        }))
        .validate(now())
        .unwrap();

        assert_eq!(event.kind(), EventKind::Install);
        assert_eq!(event.server_id(), "srv-1");
        assert_eq!(event.timestamp(), now());
        assert!(event.metadata().is_none());
    }

    #[test]
    fn test_explicit_timestamp_is_kept() {
        let ts = Utc.with_ymd_and_hms(2025, 5, 30, 8, 0, 0).unwrap();
        let event = candidate(json!({
            "kind": "claim",
            "serverId": "srv-1",
            "userId": "u-1",
            "timestamp": "2025-05-30T08:00:00Z"
        }))
        .validate(now())
        .unwrap();
        assert_eq!(event.timestamp(), ts);

        let event = candidate(json!({
            "kind": "claim",
            "serverId": "srv-1",
            "userId": "u-1",
            "timestamp": ts.timestamp_millis()
        }))
        .validate(now())
        .unwrap();
        assert_eq!(event.timestamp(), ts);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = candidate(json!({"kind": "teleport", "serverId": "srv-1"}))
            .validate(now())
            .unwrap_err();
        assert_eq!(err, Rejection::UnknownKind("teleport".to_string()));
    }

    #[test]
    fn test_missing_kind_rejected() {
        let err = candidate(json!({"serverId": "srv-1"}))
            .validate(now())
            .unwrap_err();
        assert_eq!(err, Rejection::MissingKind);
    }

    #[test]
    fn test_non_object_rejected() {
        assert_eq!(
            EventCandidate::from_value(json!([1, 2])).unwrap_err(),
            Rejection::NotAnObject
        );
    }

    #[test]
    fn test_rating_range() {
        let rating = |value: u64| {
            candidate(json!({
                "kind": "rating",
                "serverId": "srv-1",
                "userId": "u-1",
                "rating": value
            }))
            .validate(now())
        };

        assert!(rating(1).is_ok());
        assert!(rating(5).is_ok());
        assert!(matches!(
            rating(6),
            Err(Rejection::OutOfRange { field: "rating", value: 6, .. })
        ));
        assert!(matches!(
            rating(0),
            Err(Rejection::OutOfRange { field: "rating", value: 0, .. })
        ));
        // Does not fit the wire type at all
        assert!(matches!(rating(300), Err(Rejection::InvalidFields { .. })));
    }

    #[test]
    fn test_missing_required_field() {
        let err = candidate(json!({
            "kind": "usage",
            "serverId": "srv-1",
            "userId": "u-1",
            "durationMs": 12
        }))
        .validate(now())
        .unwrap_err();

        match err {
            Rejection::InvalidFields { kind, reason } => {
                assert_eq!(kind, "usage");
                assert!(reason.contains("toolName"), "reason was {reason}");
            }
            other => panic!("unexpected rejection: {other:?}"),
        }
    }

    #[test]
    fn test_empty_server_id_rejected() {
        let err = candidate(json!({"kind": "claim", "serverId": "  ", "userId": "u-1"}))
            .validate(now())
            .unwrap_err();
        assert_eq!(err, Rejection::EmptyField { field: "serverId" });
    }

    #[test]
    fn test_view_source_closed_set() {
        let ok = candidate(json!({"kind": "view", "serverId": "srv-1", "source": "discover"}))
            .validate(now())
            .unwrap();
        assert!(matches!(
            ok.payload(),
            EventPayload::View {
                user_id: None,
                source: ViewSource::Discover,
                ..
            }
        ));

        let err = candidate(json!({"kind": "view", "serverId": "srv-1", "source": "email"}))
            .validate(now())
            .unwrap_err();
        assert!(matches!(err, Rejection::InvalidFields { .. }));
    }

    #[test]
    fn test_metadata_must_be_object() {
        let err = candidate(json!({
            "kind": "claim",
            "serverId": "srv-1",
            "userId": "u-1",
            "metadata": "nope"
        }))
        .validate(now())
        .unwrap_err();
        assert!(matches!(err, Rejection::InvalidFields { .. }));
    }

    #[test]
    fn test_typed_payload_serializes_to_wire_shape() {
        let mut metadata = Map::new();
        metadata.insert("plan".to_string(), json!("pro"));

        let event = EventCandidate::from(EventPayload::Usage {
            server_id: "srv-1".to_string(),
            user_id: "u-1".to_string(),
            tool_name: "search".to_string(),
            duration_ms: 42,
            success: Some(true),
        })
        .with_metadata(metadata)
        .validate(now())
        .unwrap();

        let wire = serde_json::to_value(&event).unwrap();
        assert_eq!(wire["kind"], "usage");
        assert_eq!(wire["serverId"], "srv-1");
        assert_eq!(wire["toolName"], "search");
        assert_eq!(wire["durationMs"], 42);
        assert_eq!(wire["success"], true);
        assert_eq!(wire["metadata"]["plan"], "pro");
        assert!(wire["timestamp"].is_string());
    }

    #[test]
    fn test_share_visibility() {
        let event = EventCandidate::from(EventPayload::Share {
            server_id: "srv-1".to_string(),
            user_id: "u-1".to_string(),
            visibility: ShareVisibility::Private,
        })
        .validate(now())
        .unwrap();
        assert_eq!(serde_json::to_value(&event).unwrap()["visibility"], "private");
    }
}
