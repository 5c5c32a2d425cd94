use crate::audit;
use crate::clock::{self, Clock, SystemClock};
use crate::config::{ProofsConfig, PROOFS_DIR};
use crate::decay;
use crate::error::{EvidenceError, Result};
use crate::insights;
use crate::query::{self, EvidenceFilter};
use crate::store::{open_store, EvidenceStore};
use crate::types::{
    AuditPreview, DecoratedEntry, EntryChanges, EvidenceEntry, EvidencePatch, Insights,
    NewEvidence, Status, TagCount,
};
use crate::validate;
use chrono::{DateTime, SubsecRound, Utc};
use std::fmt;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

type AuditListener = Box<dyn FnMut(&AuditPreview)>;

/// Export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "json" => Ok(ExportFormat::Json),
            "md" | "markdown" => Ok(ExportFormat::Markdown),
            other => Err(format!("Unknown format: {}", other)),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Json => f.write_str("json"),
            ExportFormat::Markdown => f.write_str("md"),
        }
    }
}

/// The evidence engine
pub struct Evidence {
    store: Box<dyn EvidenceStore>,
    clock: Arc<dyn Clock>,
    proofs_path: Option<PathBuf>,
    last_audit: Option<AuditPreview>,
    listeners: Vec<AuditListener>,
}

impl Evidence {
    /// Open the evidence log in a specific .proofs directory
    pub fn open_at(proofs_path: PathBuf) -> Result<Self> {
        if !proofs_path.exists() {
            return Err(EvidenceError::Storage(format!(
                "Path does not exist: {}",
                proofs_path.display()
            )));
        }

        let config = ProofsConfig::new(proofs_path.clone());
        let store = open_store(&config)?;

        let mut evidence = Self::with_store(store, Arc::new(SystemClock));
        evidence.proofs_path = Some(proofs_path);
        Ok(evidence)
    }

    /// Create a .proofs directory under `path` and open it
    pub fn init(path: &Path) -> Result<Self> {
        let proofs_path = path.join(PROOFS_DIR);
        fs::create_dir_all(&proofs_path)?;
        Self::open_at(proofs_path)
    }

    pub fn with_store(store: Box<dyn EvidenceStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            proofs_path: None,
            last_audit: None,
            listeners: Vec::new(),
        }
    }

    pub fn proofs_path(&self) -> Option<&Path> {
        self.proofs_path.as_deref()
    }

    /// Current time at the precision the stores keep
    fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(6)
    }

    // =========================================================================
    // Entry operations
    // =========================================================================

    /// Log a new proof point
    pub fn create(&mut self, data: NewEvidence) -> Result<DecoratedEntry> {
        let title = validate::title(&data.title)?;
        let notes = validate::notes(data.notes.as_deref())?;
        let tags = validate::tags(&data.tags)?;

        let now = self.now();
        let entry = EvidenceEntry {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: now,
            last_anchored_at: now,
            updated_at: None,
            title,
            notes,
            tags,
            impact: data.impact.unwrap_or_default(),
            source: data.source.unwrap_or_default(),
            week_key: clock::week_key(now),
        };

        self.store.insert(&entry)?;
        tracing::info!(id = %entry.id, impact = %entry.impact, "created evidence");
        self.after_mutation();

        Ok(decay::decorate(&entry, now))
    }

    /// All entries, newest first, optionally restricted to one tier
    pub fn get_all(&self, status: Option<Status>) -> Result<Vec<DecoratedEntry>> {
        let now = self.now();
        let entries = self
            .store
            .all()?
            .iter()
            .map(|e| decay::decorate(e, now))
            .filter(|e| status.map_or(true, |s| e.status == s))
            .collect();
        Ok(entries)
    }

    /// `None` when no entry has this id
    pub fn get_by_id(&self, id: &str) -> Result<Option<DecoratedEntry>> {
        let now = self.now();
        Ok(self.store.get(id)?.map(|e| decay::decorate(&e, now)))
    }

    /// Apply the fields present in `patch`. The decay clock is left alone.
    pub fn update(&mut self, id: &str, patch: EvidencePatch) -> Result<DecoratedEntry> {
        let changes = EntryChanges {
            title: patch.title.as_deref().map(validate::title).transpose()?,
            notes: patch
                .notes
                .as_deref()
                .map(|notes| validate::notes(Some(notes)))
                .transpose()?,
            tags: patch.tags.as_deref().map(validate::tags).transpose()?,
            impact: patch.impact,
            source: patch.source,
        };

        let now = self.now();
        let entry = self
            .store
            .update(id, &changes, now)?
            .ok_or_else(|| EvidenceError::NotFound(id.to_string()))?;
        tracing::info!(id = %id, "updated evidence");
        self.after_mutation();

        Ok(decay::decorate(&entry, now))
    }

    /// Remove an entry for good
    pub fn delete(&mut self, id: &str) -> Result<()> {
        if !self.store.remove(id)? {
            return Err(EvidenceError::NotFound(id.to_string()));
        }
        tracing::info!(id = %id, "deleted evidence");
        self.after_mutation();
        Ok(())
    }

    /// Reset the decay clock without touching content
    pub fn anchor(&mut self, id: &str) -> Result<DecoratedEntry> {
        let now = self.now();
        let entry = self
            .store
            .anchor(id, now)?
            .ok_or_else(|| EvidenceError::NotFound(id.to_string()))?;
        tracing::info!(id = %id, "anchored evidence");
        self.after_mutation();

        Ok(decay::decorate(&entry, now))
    }

    // =========================================================================
    // Read-side projections
    // =========================================================================

    pub fn query(&self, filter: &EvidenceFilter) -> Result<Vec<DecoratedEntry>> {
        let entries = self.get_all(None)?;
        Ok(query::apply(&entries, filter, self.now()))
    }

    pub fn audit_preview(&self) -> Result<AuditPreview> {
        Ok(audit::compute(&self.get_all(None)?))
    }

    pub fn insights(&self) -> Result<Insights> {
        let entries = self.get_all(None)?;
        Ok(insights::compute(&entries, self.now()))
    }

    /// Every tag with the number of entries carrying it, most used first
    pub fn tags(&self) -> Result<Vec<TagCount>> {
        let mut counts: Vec<TagCount> = Vec::new();
        for entry in self.store.all()? {
            for tag in entry.tags {
                match counts.iter_mut().find(|tc| tc.tag == tag) {
                    Some(tc) => tc.count += 1,
                    None => counts.push(TagCount { tag, count: 1 }),
                }
            }
        }
        counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
        Ok(counts)
    }

    // =========================================================================
    // Audit snapshot
    // =========================================================================

    /// Register a callback that receives every refreshed audit snapshot
    pub fn subscribe(&mut self, listener: impl FnMut(&AuditPreview) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Snapshot from the most recent successful refresh
    pub fn last_audit(&self) -> Option<&AuditPreview> {
        self.last_audit.as_ref()
    }

    /// Recompute the audit snapshot and notify subscribers
    pub fn refresh_audit(&mut self) -> Result<AuditPreview> {
        let snapshot = self.audit_preview()?;
        for listener in &mut self.listeners {
            listener(&snapshot);
        }
        self.last_audit = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// The mutation already succeeded; a failed refresh must not undo it
    fn after_mutation(&mut self) {
        if let Err(e) = self.refresh_audit() {
            tracing::warn!(error = %e, "audit refresh failed after mutation");
        }
    }

    // =========================================================================
    // Export / import
    // =========================================================================

    pub fn export(&self, format: ExportFormat, out: &mut dyn Write) -> Result<()> {
        let entries = self.get_all(None)?;

        match format {
            ExportFormat::Json => {
                serde_json::to_writer_pretty(&mut *out, &entries)?;
                writeln!(out)?;
            }
            ExportFormat::Markdown => {
                for e in &entries {
                    writeln!(out, "## {}", e.entry.title)?;
                    writeln!(
                        out,
                        "*{} · {} · weight {:.2} · {} · {}*\n",
                        e.status,
                        e.entry.impact,
                        e.weight,
                        e.entry.week_key,
                        e.entry.id
                    )?;
                    if !e.entry.tags.is_empty() {
                        writeln!(out, "Tags: {}\n", e.entry.tags.join(", "))?;
                    }
                    if let Some(notes) = &e.entry.notes {
                        writeln!(out, "{}\n", notes)?;
                    }
                    writeln!(out, "---\n")?;
                }
            }
        }

        Ok(())
    }

    /// Load a JSON array of entries, replacing any with the same id.
    /// Timestamps are kept as recorded. Every record is validated before
    /// the first one is written, so a bad record leaves the store untouched.
    pub fn import_json(&mut self, input: &mut dyn Read) -> Result<usize> {
        let mut data = String::new();
        input.read_to_string(&mut data)?;
        let records: Vec<EvidenceEntry> = serde_json::from_str(&data)
            .map_err(|e| EvidenceError::validation("import", e.to_string()))?;

        let records = records
            .into_iter()
            .map(validate_record)
            .collect::<Result<Vec<_>>>()?;

        let mut count = 0;
        let mut failure = None;
        for entry in &records {
            let written = match self.store.save(entry) {
                Ok(true) => Ok(()),
                Ok(false) => self.store.insert(entry),
                Err(e) => Err(e),
            };
            if let Err(e) = written {
                failure = Some(e);
                break;
            }
            count += 1;
        }

        if count > 0 {
            self.after_mutation();
        }

        match failure {
            Some(e) => {
                tracing::warn!(written = count, total = records.len(), error = %e, "import stopped early");
                Err(e)
            }
            None => {
                tracing::info!(count, "imported evidence");
                Ok(count)
            }
        }
    }
}

/// Normalize an imported record the way `create` would
fn validate_record(mut entry: EvidenceEntry) -> Result<EvidenceEntry> {
    entry.title = validate::title(&entry.title)?;
    entry.notes = validate::notes(entry.notes.as_deref())?;
    entry.tags = validate::tags(&entry.tags)?;
    if entry.week_key.trim().is_empty() {
        entry.week_key = clock::week_key(entry.created_at);
    }
    Ok(entry)
}
