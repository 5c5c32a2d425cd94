use crate::error::{EvidenceError, Result};

pub const TITLE_MIN_CHARS: usize = 5;
pub const TITLE_MAX_CHARS: usize = 120;
pub const NOTES_MAX_CHARS: usize = 1000;
pub const TAG_MIN_CHARS: usize = 2;
pub const TAG_MAX_CHARS: usize = 24;
pub const MAX_TAGS: usize = 5;

/// Trimmed title, 5 to 120 characters
pub fn title(raw: &str) -> Result<String> {
    let title = raw.trim();
    let len = title.chars().count();
    if len < TITLE_MIN_CHARS || len > TITLE_MAX_CHARS {
        return Err(EvidenceError::validation(
            "title",
            format!(
                "must be {}-{} characters, got {}",
                TITLE_MIN_CHARS, TITLE_MAX_CHARS, len
            ),
        ));
    }
    Ok(title.to_string())
}

/// Trimmed notes; blank becomes `None`
pub fn notes(raw: Option<&str>) -> Result<Option<String>> {
    let Some(notes) = raw.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };
    let len = notes.chars().count();
    if len > NOTES_MAX_CHARS {
        return Err(EvidenceError::validation(
            "notes",
            format!("must be at most {} characters, got {}", NOTES_MAX_CHARS, len),
        ));
    }
    Ok(Some(notes.to_string()))
}

pub fn normalize_tag(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Lowercased, trimmed, de-duplicated tags in first-seen order.
/// Blank tags are skipped; anything else out of range is rejected.
pub fn tags(raw: &[String]) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    for tag in raw.iter().map(|t| normalize_tag(t)) {
        if tag.is_empty() || out.contains(&tag) {
            continue;
        }
        let len = tag.chars().count();
        if len < TAG_MIN_CHARS || len > TAG_MAX_CHARS {
            return Err(EvidenceError::validation(
                "tags",
                format!(
                    "tag '{}' must be {}-{} characters",
                    tag, TAG_MIN_CHARS, TAG_MAX_CHARS
                ),
            ));
        }
        out.push(tag);
    }
    if out.len() > MAX_TAGS {
        return Err(EvidenceError::validation(
            "tags",
            format!("at most {} tags allowed, got {}", MAX_TAGS, out.len()),
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn field_of(err: EvidenceError) -> &'static str {
        match err {
            EvidenceError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_title_bounds() {
        assert_eq!(title("  Led the retro  ").unwrap(), "Led the retro");
        assert_eq!(field_of(title("  abc   ").unwrap_err()), "title");
        assert!(title(&"x".repeat(120)).is_ok());
        assert!(title(&"x".repeat(121)).is_err());
    }

    #[test]
    fn test_title_counts_characters_not_bytes() {
        assert!(title("déjà").is_err());
        assert!(title("déjà vu").is_ok());
    }

    #[test]
    fn test_notes() {
        assert_eq!(notes(None).unwrap(), None);
        assert_eq!(notes(Some("   ")).unwrap(), None);
        assert_eq!(notes(Some(" ok ")).unwrap(), Some("ok".to_string()));
        assert_eq!(field_of(notes(Some(&"n".repeat(1001))).unwrap_err()), "notes");
    }

    #[test]
    fn test_tags_normalized_and_deduplicated() {
        let out = tags(&strings(&[" Rust ", "rust", "SQL", "", "  "])).unwrap();
        assert_eq!(out, vec!["rust", "sql"]);
    }

    #[test]
    fn test_tag_length_rejected() {
        assert_eq!(field_of(tags(&strings(&["a"])).unwrap_err()), "tags");
        assert!(tags(&strings(&[&"t".repeat(25)])).is_err());
        assert!(tags(&strings(&[&"t".repeat(24)])).is_ok());
    }

    #[test]
    fn test_too_many_tags() {
        let five = strings(&["aa", "bb", "cc", "dd", "ee"]);
        assert_eq!(tags(&five).unwrap().len(), 5);

        let six = strings(&["aa", "bb", "cc", "dd", "ee", "ff"]);
        assert_eq!(field_of(tags(&six).unwrap_err()), "tags");

        // duplicates don't count toward the limit
        let dup = strings(&["aa", "bb", "cc", "dd", "ee", "AA"]);
        assert_eq!(tags(&dup).unwrap().len(), 5);
    }
}
