use crate::clock;
use crate::types::{DecoratedEntry, ImpactDistribution, Insights, TagCount};
use chrono::{DateTime, Utc};

pub const WINDOW_DAYS: i64 = 30;
pub const TOP_TAGS: usize = 3;

/// Activity over the trailing window. Decay weight plays no part here.
pub fn compute(entries: &[DecoratedEntry], now: DateTime<Utc>) -> Insights {
    let since = clock::window_start(now, WINDOW_DAYS);

    let mut total = 0;
    // First-seen order is kept so the stable sort breaks ties by it
    let mut tag_counts: Vec<TagCount> = Vec::new();
    let mut impact_distribution = ImpactDistribution::default();

    for e in entries.iter().filter(|e| e.entry.created_at >= since) {
        total += 1;
        impact_distribution.record(e.entry.impact);

        for tag in &e.entry.tags {
            match tag_counts.iter_mut().find(|tc| &tc.tag == tag) {
                Some(tc) => tc.count += 1,
                None => tag_counts.push(TagCount {
                    tag: tag.clone(),
                    count: 1,
                }),
            }
        }
    }

    tag_counts.sort_by(|a, b| b.count.cmp(&a.count));
    tag_counts.truncate(TOP_TAGS);

    Insights {
        total_last30_days: total,
        top_tags: tag_counts,
        impact_distribution,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decay;
    use crate::types::{EvidenceEntry, Impact, Source};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 15, 9, 0, 0).unwrap()
    }

    fn entry(days_ago: i64, impact: Impact, tags: &[&str]) -> DecoratedEntry {
        let at = now() - Duration::days(days_ago);
        let e = EvidenceEntry {
            id: format!("{}-{:?}", days_ago, tags),
            created_at: at,
            last_anchored_at: at,
            updated_at: None,
            title: "Handled an escalation".to_string(),
            notes: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            impact,
            source: Source::Manual,
            week_key: String::new(),
        };
        decay::decorate(&e, now())
    }

    #[test]
    fn test_only_old_entries() {
        let entries = vec![entry(31, Impact::High, &["rust"]), entry(400, Impact::Low, &[])];
        let insights = compute(&entries, now());
        assert_eq!(insights.total_last30_days, 0);
        assert!(insights.top_tags.is_empty());
        assert_eq!(insights.impact_distribution, ImpactDistribution::default());
    }

    #[test]
    fn test_empty() {
        assert_eq!(compute(&[], now()), Insights::default());
    }

    #[test]
    fn test_top_tags_with_first_seen_tie_break() {
        let entries = vec![
            entry(1, Impact::High, &["beta", "alpha"]),
            entry(2, Impact::Medium, &["gamma", "alpha"]),
            entry(3, Impact::Medium, &["delta", "beta"]),
            entry(4, Impact::Low, &["gamma"]),
            entry(45, Impact::High, &["delta", "delta2", "zz"]),
        ];
        let insights = compute(&entries, now());

        assert_eq!(insights.total_last30_days, 4);
        let top: Vec<(&str, usize)> = insights
            .top_tags
            .iter()
            .map(|tc| (tc.tag.as_str(), tc.count))
            .collect();
        // beta, alpha and gamma all appear twice; beta was seen first
        assert_eq!(top, vec![("beta", 2), ("alpha", 2), ("gamma", 2)]);

        assert_eq!(insights.impact_distribution.get(Impact::High), 1);
        assert_eq!(insights.impact_distribution.get(Impact::Medium), 2);
        assert_eq!(insights.impact_distribution.get(Impact::Low), 1);
    }

    #[test]
    fn test_window_starts_at_midnight() {
        // 30 days back at 23:00 is still inside the window that opens at 00:00
        let late = now() - Duration::days(30) + Duration::hours(14);
        let early = now() - Duration::days(31) + Duration::hours(14);
        let mut entries = vec![entry(0, Impact::Low, &[]), entry(0, Impact::Low, &[])];
        entries[0].entry.created_at = late;
        entries[1].entry.created_at = early;

        assert_eq!(compute(&entries, now()).total_last30_days, 1);
    }

    #[test]
    fn test_ignores_weight() {
        let mut stale = entry(5, Impact::High, &["rust"]);
        stale.weight = 0.2;
        let insights = compute(&[stale], now());
        assert_eq!(insights.total_last30_days, 1);
    }
}
