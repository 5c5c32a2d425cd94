//! Time decay of evidence confidence.
//!
//! ```text
//! weight = clamp(exp(-ln2 * ageDays / 90), 0.2, 1.0)
//! ```
//!
//! The constants are part of the contract, not configuration: every client
//! must classify the same entry the same way.

use crate::types::{DecoratedEntry, EvidenceEntry, Status};
use chrono::{DateTime, Utc};

pub const HALF_LIFE_DAYS: f64 = 90.0;
pub const WEIGHT_FLOOR: f64 = 0.2;
pub const WEIGHT_CEILING: f64 = 1.0;

pub const FRESH_MIN: f64 = 0.8;
pub const STALE_MIN: f64 = 0.5;
pub const OLD_MIN: f64 = 0.3;

/// Below this an entry should be re-anchored
pub const REANCHOR_BELOW: f64 = 0.5;

/// Whole days between the last anchor and `now`. Never negative.
pub fn age_days(last_anchored_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - last_anchored_at).num_days().max(0)
}

/// Decayed weight for an age in days, in `[WEIGHT_FLOOR, WEIGHT_CEILING]`
pub fn weight(age_days: i64) -> f64 {
    let age = age_days.max(0) as f64;
    let raw = (-std::f64::consts::LN_2 * age / HALF_LIFE_DAYS).exp();
    // Rounded so one half-life lands on 0.5 exactly instead of an ulp either side.
    let rounded = (raw * 1_000_000.0).round() / 1_000_000.0;
    rounded.clamp(WEIGHT_FLOOR, WEIGHT_CEILING)
}

pub fn status(weight: f64) -> Status {
    if weight >= FRESH_MIN {
        Status::Fresh
    } else if weight >= STALE_MIN {
        Status::Stale
    } else if weight >= OLD_MIN {
        Status::Old
    } else {
        Status::Archive
    }
}

pub fn needs_reanchor(weight: f64) -> bool {
    weight < REANCHOR_BELOW
}

/// Attach decay fields to a copy of `entry` as seen at `now`
pub fn decorate(entry: &EvidenceEntry, now: DateTime<Utc>) -> DecoratedEntry {
    let age = age_days(entry.last_anchored_at, now);
    let w = weight(age);
    DecoratedEntry {
        entry: entry.clone(),
        age_days: age,
        weight: w,
        status: status(w),
        needs_reanchor: needs_reanchor(w),
    }
}
