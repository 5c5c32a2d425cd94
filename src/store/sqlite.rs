use super::EvidenceStore;
use crate::error::Result;
use crate::types::{EntryChanges, EvidenceEntry};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::time::Duration;

/// How long a writer waits for another process holding the database lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r#"
PRAGMA journal_mode=WAL;

CREATE TABLE IF NOT EXISTS evidence (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    notes TEXT,
    tags_json TEXT NOT NULL DEFAULT '[]',
    impact TEXT NOT NULL DEFAULT 'medium',
    source TEXT NOT NULL DEFAULT 'manual',
    week_key TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_anchored_at TEXT NOT NULL,
    updated_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_evidence_created ON evidence(created_at);
"#;

const COLUMNS: &str = "id, title, notes, tags_json, impact, source, week_key, created_at, last_anchored_at, updated_at";

/// Evidence store backed by SQLite
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open or create the evidence database
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(dir) = db_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }
}

// -----------------------------------------------------------------------------
// Column encoding
// -----------------------------------------------------------------------------

/// Fixed-width RFC 3339 so text ordering matches time ordering
fn encode_time(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conv_err(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, msg)),
    )
}

fn decode_time(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conv_err(idx, format!("invalid timestamp {}: {}", raw, e)))
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<EvidenceEntry> {
    let tags_json: String = row.get(3)?;
    let impact: String = row.get(4)?;
    let source: String = row.get(5)?;
    let created_at: String = row.get(7)?;
    let last_anchored_at: String = row.get(8)?;
    let updated_at: Option<String> = row.get(9)?;

    Ok(EvidenceEntry {
        id: row.get(0)?,
        title: row.get(1)?,
        notes: row.get(2)?,
        tags: serde_json::from_str(&tags_json)
            .map_err(|e| conv_err(3, format!("tags decode: {}", e)))?,
        impact: impact.parse().map_err(|e| conv_err(4, e))?,
        source: source.parse().map_err(|e| conv_err(5, e))?,
        week_key: row.get(6)?,
        created_at: decode_time(7, &created_at)?,
        last_anchored_at: decode_time(8, &last_anchored_at)?,
        updated_at: updated_at
            .map(|raw| decode_time(9, &raw))
            .transpose()?,
    })
}

impl EvidenceStore for SqliteStore {
    fn insert(&self, entry: &EvidenceEntry) -> Result<()> {
        let tags_json = serde_json::to_string(&entry.tags)?;
        self.conn.execute(
            "INSERT INTO evidence (id, title, notes, tags_json, impact, source, week_key, created_at, last_anchored_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                entry.id,
                entry.title,
                entry.notes,
                tags_json,
                entry.impact.as_str(),
                entry.source.as_str(),
                entry.week_key,
                encode_time(&entry.created_at),
                encode_time(&entry.last_anchored_at),
                entry.updated_at.as_ref().map(encode_time),
            ],
        )?;
        tracing::debug!(id = %entry.id, "inserted evidence row");
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<EvidenceEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!("SELECT {} FROM evidence WHERE id = ?1", COLUMNS),
                params![id],
                row_to_entry,
            )
            .optional()?;
        Ok(entry)
    }

    fn all(&self) -> Result<Vec<EvidenceEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM evidence ORDER BY created_at DESC, rowid DESC",
            COLUMNS
        ))?;

        let mut results = Vec::new();
        let mut rows = stmt.query([])?;

        while let Some(row) = rows.next()? {
            results.push(row_to_entry(row)?);
        }

        Ok(results)
    }

    fn save(&self, entry: &EvidenceEntry) -> Result<bool> {
        let tags_json = serde_json::to_string(&entry.tags)?;
        let count = self.conn.execute(
            "UPDATE evidence SET title = ?2, notes = ?3, tags_json = ?4, impact = ?5, source = ?6,
                    week_key = ?7, created_at = ?8, last_anchored_at = ?9, updated_at = ?10
             WHERE id = ?1",
            params![
                entry.id,
                entry.title,
                entry.notes,
                tags_json,
                entry.impact.as_str(),
                entry.source.as_str(),
                entry.week_key,
                encode_time(&entry.created_at),
                encode_time(&entry.last_anchored_at),
                entry.updated_at.as_ref().map(encode_time),
            ],
        )?;
        Ok(count > 0)
    }

    fn update(
        &self,
        id: &str,
        changes: &EntryChanges,
        at: DateTime<Utc>,
    ) -> Result<Option<EvidenceEntry>> {
        let tags_json = changes
            .tags
            .as_ref()
            .map(|tags| serde_json::to_string(tags))
            .transpose()?;

        // One statement, so a concurrent anchor can't be overwritten
        let entry = self
            .conn
            .query_row(
                &format!(
                    "UPDATE evidence SET
                        title = COALESCE(?2, title),
                        notes = CASE WHEN ?3 THEN ?4 ELSE notes END,
                        tags_json = COALESCE(?5, tags_json),
                        impact = COALESCE(?6, impact),
                        source = COALESCE(?7, source),
                        updated_at = ?8
                     WHERE id = ?1
                     RETURNING {}",
                    COLUMNS
                ),
                params![
                    id,
                    changes.title,
                    changes.notes.is_some(),
                    changes.notes.as_ref().and_then(|n| n.as_deref()),
                    tags_json,
                    changes.impact.map(|i| i.as_str()),
                    changes.source.map(|s| s.as_str()),
                    encode_time(&at),
                ],
                row_to_entry,
            )
            .optional()?;
        Ok(entry)
    }

    fn anchor(&self, id: &str, at: DateTime<Utc>) -> Result<Option<EvidenceEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!(
                    "UPDATE evidence SET last_anchored_at = ?2, updated_at = ?2
                     WHERE id = ?1
                     RETURNING {}",
                    COLUMNS
                ),
                params![id, encode_time(&at)],
                row_to_entry,
            )
            .optional()?;
        Ok(entry)
    }

    fn remove(&self, id: &str) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM evidence WHERE id = ?1", params![id])?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Impact, Source};
    use chrono::{Duration, TimeZone};

    fn entry(id: &str, created_at: DateTime<Utc>) -> EvidenceEntry {
        EvidenceEntry {
            id: id.to_string(),
            created_at,
            last_anchored_at: created_at,
            updated_at: None,
            title: format!("Evidence {}", id),
            notes: Some("notes".to_string()),
            tags: vec!["rust".to_string(), "cli".to_string()],
            impact: Impact::High,
            source: Source::Prompt,
            week_key: "2024-W01".to_string(),
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let store = SqliteStore::in_memory().unwrap();
        let e = entry("a", t0());
        store.insert(&e).unwrap();

        assert_eq!(store.get("a").unwrap(), Some(e));
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn test_duplicate_insert_fails() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert(&entry("a", t0())).unwrap();
        let err = store.insert(&entry("a", t0())).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_all_newest_first() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert(&entry("old", t0())).unwrap();
        store.insert(&entry("new", t0() + Duration::days(2))).unwrap();
        store.insert(&entry("mid", t0() + Duration::days(1))).unwrap();

        let ids: Vec<String> = store.all().unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_same_instant_keeps_insert_order_newest_first() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert(&entry("first", t0())).unwrap();
        store.insert(&entry("second", t0())).unwrap();

        let ids: Vec<String> = store.all().unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["second", "first"]);
    }

    #[test]
    fn test_save_and_remove() {
        let store = SqliteStore::in_memory().unwrap();
        let mut e = entry("a", t0());
        store.insert(&e).unwrap();

        e.title = "Edited title".to_string();
        e.notes = None;
        e.updated_at = Some(t0() + Duration::hours(1));
        assert!(store.save(&e).unwrap());
        assert_eq!(store.get("a").unwrap(), Some(e));

        assert!(!store.save(&entry("ghost", t0())).unwrap());

        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert!(store.get("a").unwrap().is_none());
    }

    #[test]
    fn test_update_touches_only_changed_fields() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert(&entry("a", t0())).unwrap();
        let at = t0() + Duration::days(3);

        let updated = store
            .update(
                "a",
                &EntryChanges {
                    title: Some("Renamed".to_string()),
                    impact: Some(Impact::Low),
                    ..Default::default()
                },
                at,
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.impact, Impact::Low);
        assert_eq!(updated.notes.as_deref(), Some("notes"));
        assert_eq!(updated.tags, vec!["rust", "cli"]);
        assert_eq!(updated.source, Source::Prompt);
        assert_eq!(updated.last_anchored_at, t0());
        assert_eq!(updated.updated_at, Some(at));
        assert_eq!(store.get("a").unwrap(), Some(updated));

        let cleared = store
            .update(
                "a",
                &EntryChanges {
                    notes: Some(None),
                    tags: Some(vec!["sql".to_string()]),
                    ..Default::default()
                },
                at,
            )
            .unwrap()
            .unwrap();
        assert_eq!(cleared.notes, None);
        assert_eq!(cleared.tags, vec!["sql"]);

        assert_eq!(store.update("ghost", &EntryChanges::default(), at).unwrap(), None);
    }

    #[test]
    fn test_anchor_resets_only_the_clock() {
        let store = SqliteStore::in_memory().unwrap();
        let e = entry("a", t0());
        store.insert(&e).unwrap();
        let at = t0() + Duration::days(120);

        let anchored = store.anchor("a", at).unwrap().unwrap();
        assert_eq!(anchored.last_anchored_at, at);
        assert_eq!(anchored.updated_at, Some(at));
        assert_eq!(anchored.created_at, t0());
        assert_eq!(anchored.title, e.title);
        assert_eq!(store.anchor("ghost", at).unwrap(), None);
    }

    #[test]
    fn test_two_connections_keep_each_others_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("evidence.db");
        let first = SqliteStore::open(&path).unwrap();
        let second = SqliteStore::open(&path).unwrap();
        first.insert(&entry("a", t0())).unwrap();

        let anchored_at = t0() + Duration::days(100);
        second.anchor("a", anchored_at).unwrap().unwrap();
        let updated = first
            .update(
                "a",
                &EntryChanges {
                    title: Some("Renamed elsewhere".to_string()),
                    ..Default::default()
                },
                anchored_at + Duration::minutes(1),
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.title, "Renamed elsewhere");
        assert_eq!(updated.last_anchored_at, anchored_at);
        assert_eq!(second.get("a").unwrap(), Some(updated));
    }

    #[test]
    fn test_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("evidence.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert(&entry("a", t0())).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.all().unwrap().len(), 1);
    }
}
