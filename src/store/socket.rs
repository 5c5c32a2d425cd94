use super::EvidenceStore;
use crate::error::{EvidenceError, Result};
use crate::types::{EntryChanges, EvidenceEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Largest response the client will read
const MAX_RESPONSE_BYTES: u64 = 16 * 1024 * 1024;

const READ_TIMEOUT: Duration = Duration::from_secs(30);

pub const KIND_NOT_FOUND: &str = "not_found";
pub const KIND_STORAGE: &str = "storage";

// =============================================================================
// Wire protocol
// =============================================================================

/// One request per connection. The client writes the JSON body and shuts
/// down its write half; the server answers with one `StoreResponse`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum StoreRequest {
    Ping,
    Insert { entry: EvidenceEntry },
    Get { id: String },
    All,
    Save { entry: EvidenceEntry },
    Update {
        id: String,
        changes: EntryChanges,
        at: DateTime<Utc>,
    },
    Anchor { id: String, at: DateTime<Utc> },
    Remove { id: String },
    Stop,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<EvidenceEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<EvidenceEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub found: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl StoreResponse {
    pub fn ok() -> Self {
        Self {
            ok: true,
            ..Default::default()
        }
    }

    pub fn failed(err: &EvidenceError) -> Self {
        let (kind, message) = match err {
            EvidenceError::NotFound(id) => (KIND_NOT_FOUND, id.clone()),
            other => (KIND_STORAGE, other.to_string()),
        };
        Self {
            ok: false,
            error: Some(message),
            kind: Some(kind.to_string()),
            ..Default::default()
        }
    }

    /// Turn a failed response back into the error kind it was raised as
    fn into_result(self) -> Result<Self> {
        if self.ok {
            return Ok(self);
        }
        let message = self.error.unwrap_or_else(|| "unknown server error".to_string());
        match self.kind.as_deref() {
            Some(KIND_NOT_FOUND) => Err(EvidenceError::NotFound(message)),
            _ => Err(EvidenceError::Storage(message)),
        }
    }
}

// =============================================================================
// SocketStore - client for `proofs server`
// =============================================================================

/// Evidence store living in a `proofs server` process
#[derive(Debug, Clone)]
pub struct SocketStore {
    socket_path: PathBuf,
}

impl SocketStore {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    /// Check if a server answers on `socket_path`
    pub fn is_running(socket_path: &Path) -> bool {
        if !socket_path.exists() {
            return false;
        }
        Self::ping(socket_path).is_ok()
    }

    /// Ping the server and get its version
    pub fn ping(socket_path: &Path) -> Result<String> {
        let response = send_request(socket_path, &StoreRequest::Ping)?.into_result()?;
        Ok(response.version.unwrap_or_default())
    }

    /// Ask the server to shut down
    pub fn stop(socket_path: &Path) -> Result<()> {
        send_request(socket_path, &StoreRequest::Stop)?.into_result()?;
        Ok(())
    }

    fn call(&self, request: &StoreRequest) -> Result<StoreResponse> {
        send_request(&self.socket_path, request)?.into_result()
    }
}

impl EvidenceStore for SocketStore {
    fn insert(&self, entry: &EvidenceEntry) -> Result<()> {
        self.call(&StoreRequest::Insert {
            entry: entry.clone(),
        })?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<EvidenceEntry>> {
        let response = self.call(&StoreRequest::Get { id: id.to_string() })?;
        Ok(response.entry)
    }

    fn all(&self) -> Result<Vec<EvidenceEntry>> {
        let response = self.call(&StoreRequest::All)?;
        Ok(response.entries.unwrap_or_default())
    }

    fn save(&self, entry: &EvidenceEntry) -> Result<bool> {
        let response = self.call(&StoreRequest::Save {
            entry: entry.clone(),
        })?;
        Ok(response.found.unwrap_or(false))
    }

    fn update(
        &self,
        id: &str,
        changes: &EntryChanges,
        at: DateTime<Utc>,
    ) -> Result<Option<EvidenceEntry>> {
        let response = self.call(&StoreRequest::Update {
            id: id.to_string(),
            changes: changes.clone(),
            at,
        })?;
        Ok(response.entry)
    }

    fn anchor(&self, id: &str, at: DateTime<Utc>) -> Result<Option<EvidenceEntry>> {
        let response = self.call(&StoreRequest::Anchor {
            id: id.to_string(),
            at,
        })?;
        Ok(response.entry)
    }

    fn remove(&self, id: &str) -> Result<bool> {
        let response = self.call(&StoreRequest::Remove { id: id.to_string() })?;
        Ok(response.found.unwrap_or(false))
    }
}

/// Send a request to the server and parse the response
fn send_request(socket_path: &Path, request: &StoreRequest) -> Result<StoreResponse> {
    let mut stream = UnixStream::connect(socket_path).map_err(|e| {
        EvidenceError::Storage(format!(
            "failed to connect to {}: {}",
            socket_path.display(),
            e
        ))
    })?;

    stream.set_read_timeout(Some(READ_TIMEOUT))?;

    let json = serde_json::to_vec(request)?;
    stream.write_all(&json)?;

    // Shutdown write side to signal end of request
    stream.shutdown(std::net::Shutdown::Write)?;

    let mut buffer = Vec::new();
    stream.take(MAX_RESPONSE_BYTES).read_to_end(&mut buffer)?;

    Ok(serde_json::from_slice(&buffer)?)
}
