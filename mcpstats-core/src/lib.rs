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

//! Core types for MCP server telemetry and trending.

pub mod activity;
pub mod event;
pub mod trending;

pub use activity::{
    ActivityAction, ActivityLogEntry, ActivitySource, CanonicalServerKey, SourceParseError,
};
pub use event::{
    Event, EventCandidate, EventKind, EventPayload, Rejection, ShareVisibility, ViewSource,
};
pub use trending::{TrendingResult, TrendingWindow, WindowParseError};
