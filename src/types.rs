use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// How much an entry mattered when it was logged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    #[default]
    Medium,
    High,
}

impl Impact {
    pub const ALL: [Impact; 3] = [Impact::Low, Impact::Medium, Impact::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::Low => "low",
            Impact::Medium => "medium",
            Impact::High => "high",
        }
    }
}

impl FromStr for Impact {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Impact::Low),
            "medium" => Ok(Impact::Medium),
            "high" => Ok(Impact::High),
            other => Err(format!("unknown impact: {}", other)),
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an entry came from. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[default]
    Manual,
    Prompt,
    Ai,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Manual => "manual",
            Source::Prompt => "prompt",
            Source::Ai => "ai",
        }
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" => Ok(Source::Manual),
            "prompt" => Ok(Source::Prompt),
            "ai" => Ok(Source::Ai),
            other => Err(format!("unknown source: {}", other)),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Freshness tier derived from the decayed weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Fresh,
    Stale,
    Old,
    Archive,
}

impl Status {
    pub const ALL: [Status; 4] = [Status::Fresh, Status::Stale, Status::Old, Status::Archive];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Fresh => "FRESH",
            Status::Stale => "STALE",
            Status::Old => "OLD",
            Status::Archive => "ARCHIVE",
        }
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FRESH" => Ok(Status::Fresh),
            "STALE" => Ok(Status::Stale),
            "OLD" => Ok(Status::Old),
            "ARCHIVE" => Ok(Status::Archive),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logged proof point, as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceEntry {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_anchored_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub impact: Impact,
    #[serde(default)]
    pub source: Source,
    pub week_key: String,
}

/// An entry with its decay fields computed against a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecoratedEntry {
    #[serde(flatten)]
    pub entry: EvidenceEntry,
    pub age_days: i64,
    pub weight: f64,
    pub status: Status,
    pub needs_reanchor: bool,
}

/// Input for creating an entry
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvidence {
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub impact: Option<Impact>,
    #[serde(default)]
    pub source: Option<Source>,
}

/// Partial update. Absent fields are left alone; `notes: Some("")` clears notes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidencePatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub impact: Option<Impact>,
    #[serde(default)]
    pub source: Option<Source>,
}

impl EvidencePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.notes.is_none()
            && self.tags.is_none()
            && self.impact.is_none()
            && self.source.is_none()
    }
}

/// Validated field changes that a store applies to one entry in a single step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// `Some(None)` clears the notes
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub notes: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<Impact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
}

/// A field that is present, even as null, counts as a change
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Entry counts per freshness tier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDistribution {
    #[serde(rename = "FRESH")]
    pub fresh: usize,
    #[serde(rename = "STALE")]
    pub stale: usize,
    #[serde(rename = "OLD")]
    pub old: usize,
    #[serde(rename = "ARCHIVE")]
    pub archive: usize,
}

impl StatusDistribution {
    pub fn record(&mut self, status: Status) {
        match status {
            Status::Fresh => self.fresh += 1,
            Status::Stale => self.stale += 1,
            Status::Old => self.old += 1,
            Status::Archive => self.archive += 1,
        }
    }

    pub fn get(&self, status: Status) -> usize {
        match status {
            Status::Fresh => self.fresh,
            Status::Stale => self.stale,
            Status::Old => self.old,
            Status::Archive => self.archive,
        }
    }
}

/// Entry counts per impact level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactDistribution {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

impl ImpactDistribution {
    pub fn record(&mut self, impact: Impact) {
        match impact {
            Impact::Low => self.low += 1,
            Impact::Medium => self.medium += 1,
            Impact::High => self.high += 1,
        }
    }

    pub fn get(&self, impact: Impact) -> usize {
        match impact {
            Impact::Low => self.low,
            Impact::Medium => self.medium,
            Impact::High => self.high,
        }
    }
}

/// Collection-wide decay health
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditPreview {
    pub total_entries: usize,
    pub needs_attention_count: usize,
    pub average_weight: f64,
    pub weighted_total: f64,
    pub status_distribution: StatusDistribution,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

/// Activity over the trailing 30 days
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub total_last30_days: usize,
    pub top_tags: Vec<TagCount>,
    pub impact_distribution: ImpactDistribution,
}
