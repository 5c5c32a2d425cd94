use crate::clock;
use crate::types::{DecoratedEntry, Impact, Status};
use crate::validate::normalize_tag;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Trailing creation window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    Last7Days,
    Last30Days,
    #[default]
    All,
}

impl TimeRange {
    pub fn days(&self) -> Option<i64> {
        match self {
            TimeRange::Last7Days => Some(7),
            TimeRange::Last30Days => Some(30),
            TimeRange::All => None,
        }
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last7days" | "7d" => Ok(TimeRange::Last7Days),
            "last30days" | "30d" => Ok(TimeRange::Last30Days),
            "all" => Ok(TimeRange::All),
            other => Err(format!("unknown time range: {}", other)),
        }
    }
}

/// Compound filter. Unset fields match everything; set fields AND together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceFilter {
    #[serde(default)]
    pub search_text: Option<String>,
    #[serde(default)]
    pub impact: Option<Impact>,
    #[serde(default)]
    pub time_range: TimeRange,
    /// Matches entries carrying any of these tags
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: Option<Status>,
}

impl EvidenceFilter {
    fn search_needle(&self) -> Option<String> {
        self.search_text
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    fn wanted_tags(&self) -> Vec<String> {
        self.tags
            .iter()
            .map(|t| normalize_tag(t))
            .filter(|t| !t.is_empty())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.search_needle().is_none()
            && self.impact.is_none()
            && self.time_range == TimeRange::All
            && self.wanted_tags().is_empty()
            && self.status.is_none()
    }
}

fn matches_search(entry: &DecoratedEntry, needle: &str) -> bool {
    let e = &entry.entry;
    e.title.to_lowercase().contains(needle)
        || e.notes
            .as_deref()
            .is_some_and(|n| n.to_lowercase().contains(needle))
        || e.tags.iter().any(|t| t.to_lowercase().contains(needle))
}

/// Entries of `entries` matching `filter`, in their original order
pub fn apply(
    entries: &[DecoratedEntry],
    filter: &EvidenceFilter,
    now: DateTime<Utc>,
) -> Vec<DecoratedEntry> {
    if filter.is_empty() {
        return entries.to_vec();
    }

    let needle = filter.search_needle();
    let wanted_tags = filter.wanted_tags();
    let since = filter.time_range.days().map(|days| clock::window_start(now, days));

    entries
        .iter()
        .filter(|e| needle.as_deref().map_or(true, |n| matches_search(e, n)))
        .filter(|e| filter.impact.map_or(true, |i| e.entry.impact == i))
        .filter(|e| since.map_or(true, |s| e.entry.created_at >= s))
        .filter(|e| wanted_tags.is_empty() || e.entry.tags.iter().any(|t| wanted_tags.contains(t)))
        .filter(|e| filter.status.map_or(true, |s| e.status == s))
        .cloned()
        .collect()
}
