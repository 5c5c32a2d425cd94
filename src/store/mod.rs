use crate::config::ProofsConfig;
use crate::error::{EvidenceError, Result};
use crate::types::{EntryChanges, EvidenceEntry};
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

pub mod socket;
pub mod sqlite;

pub use socket::SocketStore;
pub use sqlite::SqliteStore;

/// Durable collection of evidence entries, keyed by id.
///
/// Implementations persist records verbatim. Validation, timestamps and
/// decay all live above this trait so every backend behaves the same.
pub trait EvidenceStore {
    /// Add a new record. Fails if the id already exists.
    fn insert(&self, entry: &EvidenceEntry) -> Result<()>;

    fn get(&self, id: &str) -> Result<Option<EvidenceEntry>>;

    /// Every record, newest `created_at` first
    fn all(&self) -> Result<Vec<EvidenceEntry>>;

    /// Replace an existing record. Returns false if the id is unknown.
    fn save(&self, entry: &EvidenceEntry) -> Result<bool>;
    /// Apply `changes` and set `updated_at = at` as one atomic step, leaving
    /// every other field as currently stored. `None` if the id is unknown.
    fn update(
        &self,
        id: &str,
        changes: &EntryChanges,
        at: DateTime<Utc>,
    ) -> Result<Option<EvidenceEntry>>;
    /// Set `last_anchored_at = updated_at = at` as one atomic step.
    /// `None` if the id is unknown.
    fn anchor(&self, id: &str, at: DateTime<Utc>) -> Result<Option<EvidenceEntry>>;

    /// Returns false if the id is unknown
    fn remove(&self, id: &str) -> Result<bool>;
}

/// Which store the engine talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// SQLite file inside the `.proofs` directory
    Local,
    /// A `proofs server` process over a Unix socket
    Remote,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "sqlite" => Ok(Backend::Local),
            "remote" | "server" => Ok(Backend::Remote),
            other => Err(format!("unknown backend: {} (expected local or remote)", other)),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Local => f.write_str("local"),
            Backend::Remote => f.write_str("remote"),
        }
    }
}

/// Build the store selected by configuration
pub fn open_store(config: &ProofsConfig) -> Result<Box<dyn EvidenceStore>> {
    let backend: Backend = config
        .backend()
        .parse()
        .map_err(|e: String| EvidenceError::Storage(e))?;

    Ok(match backend {
        Backend::Local => {
            let path = config.db_path();
            tracing::debug!(path = %path.display(), "opening local evidence store");
            Box::new(SqliteStore::open(&path)?)
        }
        Backend::Remote => {
            let socket = config.socket_path();
            tracing::debug!(socket = %socket.display(), "using remote evidence store");
            Box::new(SocketStore::new(socket))
        }
    })
}
