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

//! Trending ranking over the activity log
//!
//! ## Scoring
//!
//! For every `(canonical server, source)` group inside the window:
//!
//! ```text
//! net_installs = installs - uninstalls
//! activity     = tool_calls + resource_reads + prompt_gets
//! recency      = clamp(1 - hours_since_last_activity / window_hours, 0.5, 1.0)
//! score        = round(net_installs * 40 + activity * 40 + recency * 20)
//! ```
//!
//! A group with no net installs and no activity scores 0 whatever its recency.
//!
//! Groups scoring `<= 0` are dropped. Results are ordered by score
//! descending, then server key and source ascending.

use chrono::{DateTime, Utc};
use mcpstats_core::{
    ActivityAction, ActivityLogEntry, ActivitySource, CanonicalServerKey, TrendingResult,
    TrendingWindow,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::activity_log::{ActivityLog, QueryError};

pub const DEFAULT_TRENDING_LIMIT: usize = 10;

const INSTALL_WEIGHT: f64 = 40.0;
const ACTIVITY_WEIGHT: f64 = 40.0;
const RECENCY_WEIGHT: f64 = 20.0;
const MIN_RECENCY: f64 = 0.5;

#[derive(Debug, Default)]
struct GroupCounts {
    installs: u64,
    uninstalls: u64,
    tool_calls: u64,
    resource_reads: u64,
    prompt_gets: u64,
    total: u64,
    last_activity: Option<DateTime<Utc>>,
}

impl GroupCounts {
    fn record(&mut self, entry: &ActivityLogEntry) {
        match entry.action {
            ActivityAction::Install => self.installs += 1,
            ActivityAction::Uninstall => self.uninstalls += 1,
            ActivityAction::ToolCall => self.tool_calls += 1,
            ActivityAction::ResourceRead => self.resource_reads += 1,
            ActivityAction::PromptGet => self.prompt_gets += 1,
            ActivityAction::Other(_) => {}
        }
        self.total += 1;
        self.last_activity = Some(match self.last_activity {
            Some(last) => last.max(entry.occurred_at),
            None => entry.occurred_at,
        });
    }

    fn net_installs(&self) -> i64 {
        self.installs as i64 - self.uninstalls as i64
    }

    fn activity_score(&self) -> u64 {
        self.tool_calls + self.resource_reads + self.prompt_gets
    }
}

/// Decay factor in `[0.5, 1.0]` for a group last active at `last_activity`.
pub fn recency_multiplier(
    last_activity: DateTime<Utc>,
    now: DateTime<Utc>,
    window: TrendingWindow,
) -> f64 {
    let hours_since = (now - last_activity).num_milliseconds() as f64 / 3_600_000.0;
    (1.0 - hours_since / window.hours() as f64).clamp(MIN_RECENCY, 1.0)
}

/// Weighted score. A group with neither net installs nor usage never ranks on
/// recency alone.
pub fn trending_score(net_installs: i64, activity_score: u64, recency: f64) -> i64 {
    if net_installs == 0 && activity_score == 0 {
        return 0;
    }
    let momentum = net_installs as f64 * INSTALL_WEIGHT + activity_score as f64 * ACTIVITY_WEIGHT;
    (momentum + recency * RECENCY_WEIGHT).round() as i64
}

/// Rank a snapshot of activity rows. Pure function of its inputs.
pub fn rank_entries(
    entries: &[ActivityLogEntry],
    source: Option<ActivitySource>,
    window: TrendingWindow,
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<TrendingResult> {
    let cutoff = window.cutoff(now);
    let mut groups: HashMap<(CanonicalServerKey, ActivitySource), GroupCounts> = HashMap::new();

    for entry in entries {
        if entry.occurred_at < cutoff || source.is_some_and(|s| s != entry.source) {
            continue;
        }
        groups
            .entry((entry.canonical_key(), entry.source))
            .or_default()
            .record(entry);
    }

    let mut ranked: Vec<TrendingResult> = groups
        .into_iter()
        .filter_map(|((server_key, source), counts)| {
            let last_activity_at = counts.last_activity?;
            let recency = recency_multiplier(last_activity_at, now, window);
            let score = trending_score(counts.net_installs(), counts.activity_score(), recency);

            (score > 0).then(|| TrendingResult {
                server_key,
                source,
                net_install_count: counts.net_installs(),
                tool_call_count: counts.tool_calls,
                total_activity_count: counts.total,
                trending_score: score,
                last_activity_at,
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.trending_score
            .cmp(&a.trending_score)
            .then_with(|| a.server_key.cmp(&b.server_key))
            .then_with(|| a.source.cmp(&b.source))
    });
    ranked.truncate(limit);
    ranked
}

/// Computes trending rankings on demand from an [`ActivityLog`].
#[derive(Clone)]
pub struct TrendingAggregator {
    log: Arc<dyn ActivityLog>,
}

impl TrendingAggregator {
    pub fn new(log: Arc<dyn ActivityLog>) -> Self {
        Self { log }
    }

    pub async fn compute_trending(
        &self,
        source: Option<ActivitySource>,
        window: TrendingWindow,
        limit: usize,
    ) -> Result<Vec<TrendingResult>, QueryError> {
        self.compute_trending_at(source, window, limit, Utc::now())
            .await
    }

    pub async fn compute_trending_at(
        &self,
        source: Option<ActivitySource>,
        window: TrendingWindow,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<TrendingResult>, QueryError> {
        let entries = self.log.entries_since(window.cutoff(now), source).await?;
        let ranked = rank_entries(&entries, source, window, now, limit);

        debug!(
            "Ranked {} servers from {} activity rows (window {})",
            ranked.len(),
            entries.len(),
            window
        );
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity_log::MemoryActivityLog;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 8, 12, 0, 0).unwrap()
    }

    fn rows(
        source: ActivitySource,
        server: &str,
        action: &str,
        count: usize,
        at: DateTime<Utc>,
    ) -> Vec<ActivityLogEntry> {
        (0..count)
            .map(|_| ActivityLogEntry::new(source, server, action, at))
            .collect()
    }

    fn server_a() -> Vec<ActivityLogEntry> {
        let at = now() - Duration::hours(12);
        let mut entries = rows(ActivitySource::Registry, "a", "install", 5, at - Duration::hours(1));
        entries.extend(rows(ActivitySource::Registry, "a", "uninstall", 1, at - Duration::hours(2)));
        entries.extend(rows(ActivitySource::Registry, "a", "tool_call", 10, at));
        entries
    }

    #[test]
    fn test_worked_example_scores_579() {
        let ranked = rank_entries(&server_a(), None, TrendingWindow::Week, now(), 10);

        assert_eq!(ranked.len(), 1);
        let a = &ranked[0];
        assert_eq!(a.server_key.as_str(), "a");
        assert_eq!(a.net_install_count, 4);
        assert_eq!(a.tool_call_count, 10);
        assert_eq!(a.total_activity_count, 16);
        assert_eq!(a.trending_score, 579);
        assert_eq!(a.last_activity_at, now() - Duration::hours(12));
    }

    #[test]
    fn test_recency_multiplier_bounds() {
        let week = TrendingWindow::Week;
        let r = recency_multiplier(now() - Duration::hours(12), now(), week);
        assert!((r - (1.0 - 12.0 / 168.0)).abs() < 1e-9);

        assert_eq!(recency_multiplier(now(), now(), week), 1.0);
        assert_eq!(recency_multiplier(now() - Duration::hours(160), now(), week), 0.5);
        // Clock skew never pushes the multiplier above 1
        assert_eq!(recency_multiplier(now() + Duration::hours(3), now(), week), 1.0);
    }

    #[test]
    fn test_no_momentum_is_excluded_regardless_of_recency() {
        let mut entries = rows(ActivitySource::Local, "b", "install", 1, now());
        entries.extend(rows(ActivitySource::Local, "b", "uninstall", 1, now()));
        entries.extend(rows(ActivitySource::Local, "b", "view", 3, now()));

        assert_eq!(trending_score(0, 0, 1.0), 0);
        assert!(rank_entries(&entries, None, TrendingWindow::Day, now(), 10).is_empty());
    }

    #[test]
    fn test_negative_net_installs_can_be_offset_by_usage() {
        let mut entries = rows(ActivitySource::Local, "c", "uninstall", 2, now());
        entries.extend(rows(ActivitySource::Local, "c", "prompt_get", 3, now()));

        let ranked = rank_entries(&entries, None, TrendingWindow::Day, now(), 10);
        assert_eq!(ranked[0].net_install_count, -2);
        // -80 + 120 + 20
        assert_eq!(ranked[0].trending_score, 60);

        let losing = rows(ActivitySource::Local, "d", "uninstall", 1, now());
        assert!(rank_entries(&losing, None, TrendingWindow::Day, now(), 10).is_empty());
    }

    #[test]
    fn test_uninstalls_cancelled_by_usage_rank_on_recency() {
        let at = now() - Duration::hours(1);
        let mut entries = rows(ActivitySource::Local, "e", "uninstall", 2, at);
        entries.extend(rows(ActivitySource::Local, "e", "tool_call", 2, at));

        let ranked = rank_entries(&entries, None, TrendingWindow::Day, now(), 10);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].net_install_count, -2);
        // -80 + 80 + (1 - 1/24) * 20
        assert_eq!(ranked[0].trending_score, 19);
        assert_eq!(trending_score(-2, 2, 0.5), 10);
    }

    #[test]
    fn test_registry_ids_merge_into_one_group() {
        let at = now() - Duration::hours(1);
        let entries = vec![
            ActivityLogEntry::new(ActivitySource::Registry, "42", "install", at)
                .with_external_id("acme/search"),
            ActivityLogEntry::new(ActivitySource::Registry, "acme/search", "tool_call", at),
            // Same external id recorded locally stays separate
            ActivityLogEntry::new(ActivitySource::Local, "42", "install", at)
                .with_external_id("acme/search"),
        ];

        let ranked = rank_entries(&entries, None, TrendingWindow::Day, now(), 10);
        assert_eq!(ranked.len(), 2);

        let registry = ranked
            .iter()
            .find(|r| r.source == ActivitySource::Registry)
            .unwrap();
        assert_eq!(registry.server_key.as_str(), "acme/search");
        assert_eq!(registry.total_activity_count, 2);

        let local = ranked
            .iter()
            .find(|r| r.source == ActivitySource::Local)
            .unwrap();
        assert_eq!(local.server_key.as_str(), "42");
    }

    #[test]
    fn test_rows_outside_window_are_ignored() {
        let mut entries = rows(ActivitySource::Local, "old", "install", 5, now() - Duration::hours(25));
        entries.extend(rows(ActivitySource::Local, "new", "install", 1, now() - Duration::hours(1)));

        let day = rank_entries(&entries, None, TrendingWindow::Day, now(), 10);
        assert_eq!(day.len(), 1);
        assert_eq!(day[0].server_key.as_str(), "new");

        let week = rank_entries(&entries, None, TrendingWindow::Week, now(), 10);
        assert_eq!(week[0].server_key.as_str(), "old");
    }

    #[test]
    fn test_ordering_and_limit() {
        let at = now() - Duration::hours(1);
        let mut entries = Vec::new();
        entries.extend(rows(ActivitySource::Local, "zeta", "install", 2, at));
        entries.extend(rows(ActivitySource::Local, "alpha", "install", 2, at));
        entries.extend(rows(ActivitySource::Local, "top", "install", 5, at));
        entries.extend(rows(ActivitySource::Local, "low", "tool_call", 1, at));

        let ranked = rank_entries(&entries, None, TrendingWindow::Day, now(), 10);
        let keys: Vec<&str> = ranked.iter().map(|r| r.server_key.as_str()).collect();
        assert_eq!(keys, vec!["top", "alpha", "zeta", "low"]);

        let top_two = rank_entries(&entries, None, TrendingWindow::Day, now(), 2);
        assert_eq!(top_two.len(), 2);
        assert_eq!(top_two[1].server_key.as_str(), "alpha");
    }

    #[test]
    fn test_source_filter() {
        let at = now() - Duration::hours(1);
        let mut entries = rows(ActivitySource::Local, "local", "install", 1, at);
        entries.extend(rows(ActivitySource::Registry, "reg", "install", 1, at));

        let ranked = rank_entries(&entries, Some(ActivitySource::Registry), TrendingWindow::Day, now(), 10);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].server_key.as_str(), "reg");
    }

    #[tokio::test]
    async fn test_counts_stable_between_calls() {
        let log = Arc::new(MemoryActivityLog::new());
        log.extend(server_a());
        let aggregator = TrendingAggregator::new(log);

        let first = aggregator
            .compute_trending_at(None, TrendingWindow::Week, 10, now())
            .await
            .unwrap();
        let second = aggregator
            .compute_trending_at(None, TrendingWindow::Week, 10, now() + Duration::seconds(1))
            .await
            .unwrap();

        assert_eq!(first[0].net_install_count, second[0].net_install_count);
        assert_eq!(first[0].tool_call_count, second[0].tool_call_count);
        assert_eq!(first[0].total_activity_count, second[0].total_activity_count);
        assert_eq!(first[0].last_activity_at, second[0].last_activity_at);
    }

    struct BrokenLog;

    #[async_trait]
    impl ActivityLog for BrokenLog {
        async fn entries_since(
            &self,
            _cutoff: DateTime<Utc>,
            _source: Option<ActivitySource>,
        ) -> Result<Vec<ActivityLogEntry>, QueryError> {
            Err(QueryError::Storage("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_log_failure_propagates() {
        let aggregator = TrendingAggregator::new(Arc::new(BrokenLog));
        let err = aggregator
            .compute_trending(None, TrendingWindow::Day, DEFAULT_TRENDING_LIMIT)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Storage(_)));
    }
}
