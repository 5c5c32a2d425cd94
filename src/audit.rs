use crate::types::{AuditPreview, DecoratedEntry, StatusDistribution};

/// Health of the whole collection. Always computed over every entry, never a filtered view.
pub fn compute(entries: &[DecoratedEntry]) -> AuditPreview {
    let mut status_distribution = StatusDistribution::default();
    let mut needs_attention_count = 0;
    let mut weighted_total = 0.0;

    for e in entries {
        status_distribution.record(e.status);
        if e.needs_reanchor {
            needs_attention_count += 1;
        }
        weighted_total += e.weight;
    }

    let average_weight = if entries.is_empty() {
        0.0
    } else {
        weighted_total / entries.len() as f64
    };

    AuditPreview {
        total_entries: entries.len(),
        needs_attention_count,
        average_weight,
        weighted_total,
        status_distribution,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decay;
    use crate::types::{EvidenceEntry, Impact, Source, Status};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 20, 12, 0, 0).unwrap()
    }

    fn aged(days: i64) -> DecoratedEntry {
        let at = now() - Duration::days(days);
        let e = EvidenceEntry {
            id: days.to_string(),
            created_at: at,
            last_anchored_at: at,
            updated_at: None,
            title: "Mentored a new hire".to_string(),
            notes: None,
            tags: vec![],
            impact: Impact::Medium,
            source: Source::Manual,
            week_key: String::new(),
        };
        decay::decorate(&e, now())
    }

    #[test]
    fn test_empty_collection() {
        let audit = compute(&[]);
        assert_eq!(audit.total_entries, 0);
        assert_eq!(audit.needs_attention_count, 0);
        assert_eq!(audit.average_weight, 0.0);
        assert_eq!(audit.weighted_total, 0.0);
        assert_eq!(audit.status_distribution, StatusDistribution::default());
    }

    #[test]
    fn test_mixed_collection() {
        // fresh, stale (boundary), old, archive
        let entries = vec![aged(0), aged(90), aged(100), aged(365)];
        let audit = compute(&entries);

        assert_eq!(audit.total_entries, 4);
        assert_eq!(audit.needs_attention_count, 2);
        for status in Status::ALL {
            assert_eq!(audit.status_distribution.get(status), 1, "{}", status);
        }

        let expected: f64 = entries.iter().map(|e| e.weight).sum();
        assert!((audit.weighted_total - expected).abs() < 1e-12);
        assert!((audit.average_weight - expected / 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_floor_keeps_weight_positive() {
        let audit = compute(&[aged(5_000), aged(9_000)]);
        assert!((audit.weighted_total - 0.4).abs() < 1e-12);
        assert!((audit.average_weight - 0.2).abs() < 1e-12);
        assert_eq!(audit.status_distribution.archive, 2);
    }
}
