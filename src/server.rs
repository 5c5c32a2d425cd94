//! Serves an evidence store to remote clients over a Unix socket.
//!
//! Connections are handled one at a time, so every mutation against the
//! store is serialized no matter how many clients are connected.

use crate::error::{EvidenceError, Result};
use crate::store::socket::{StoreRequest, StoreResponse};
use crate::store::{EvidenceStore, SocketStore};
use std::fs;
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Largest request the server will read
const MAX_REQUEST_BYTES: u64 = 4 * 1024 * 1024;

/// A client that stalls longer than this is dropped so others get served
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Server<S: EvidenceStore> {
    store: S,
    listener: UnixListener,
    socket_path: PathBuf,
    timeout: Duration,
}

impl<S: EvidenceStore> Server<S> {
    /// Bind `socket_path`, replacing a stale socket file left by a dead server
    pub fn bind(socket_path: &Path, store: S) -> Result<Self> {
        if socket_path.exists() {
            if SocketStore::is_running(socket_path) {
                return Err(EvidenceError::Storage(format!(
                    "a server is already listening on {}",
                    socket_path.display()
                )));
            }
            fs::remove_file(socket_path)?;
        }
        if let Some(dir) = socket_path.parent() {
            fs::create_dir_all(dir)?;
        }

        let listener = UnixListener::bind(socket_path)?;
        tracing::info!(socket = %socket_path.display(), "evidence server listening");

        Ok(Self {
            store,
            listener,
            socket_path: socket_path.to_path_buf(),
            timeout: CONNECTION_TIMEOUT,
        })
    }

    #[cfg(test)]
    fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Accept connections until a client sends `stop`
    pub fn serve(self) -> Result<()> {
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => match self.handle(stream) {
                    Ok(true) => break,
                    Ok(false) => {}
                    Err(e) => tracing::warn!(error = %e, "failed to handle connection"),
                },
                Err(e) => tracing::warn!(error = %e, "failed to accept connection"),
            }
        }

        fs::remove_file(&self.socket_path).ok();
        tracing::info!("evidence server stopped");
        Ok(())
    }

    /// Returns true when the client asked the server to stop
    fn handle(&self, mut stream: UnixStream) -> Result<bool> {
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;

        let mut buffer = Vec::new();
        (&mut stream)
            .take(MAX_REQUEST_BYTES)
            .read_to_end(&mut buffer)?;

        let (response, stop) = match serde_json::from_slice::<StoreRequest>(&buffer) {
            Ok(request) => self.dispatch(request),
            Err(e) => (
                StoreResponse::failed(&EvidenceError::Storage(format!("bad request: {}", e))),
                false,
            ),
        };

        let json = serde_json::to_vec(&response)?;
        stream.write_all(&json)?;
        Ok(stop)
    }

    /// Run one request against the store
    pub fn dispatch(&self, request: StoreRequest) -> (StoreResponse, bool) {
        tracing::debug!(?request, "dispatching store request");
        let result = match request {
            StoreRequest::Ping => Ok(StoreResponse {
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
                ..StoreResponse::ok()
            }),
            StoreRequest::Stop => return (StoreResponse::ok(), true),
            StoreRequest::Insert { entry } => self.store.insert(&entry).map(|_| StoreResponse::ok()),
            StoreRequest::Get { id } => self.store.get(&id).map(|entry| StoreResponse {
                entry,
                ..StoreResponse::ok()
            }),
            StoreRequest::All => self.store.all().map(|entries| StoreResponse {
                entries: Some(entries),
                ..StoreResponse::ok()
            }),
            StoreRequest::Save { entry } => self.store.save(&entry).map(|found| StoreResponse {
                found: Some(found),
                ..StoreResponse::ok()
            }),
            StoreRequest::Update { id, changes, at } => {
                self.store.update(&id, &changes, at).map(|entry| StoreResponse {
                    entry,
                    ..StoreResponse::ok()
                })
            }
            StoreRequest::Anchor { id, at } => self.store.anchor(&id, at).map(|entry| StoreResponse {
                entry,
                ..StoreResponse::ok()
            }),
            StoreRequest::Remove { id } => self.store.remove(&id).map(|found| StoreResponse {
                found: Some(found),
                ..StoreResponse::ok()
            }),
        };

        match result {
            Ok(response) => (response, false),
            Err(e) => {
                tracing::warn!(error = %e, retryable = e.is_retryable(), "store request failed");
                (StoreResponse::failed(&e), false)
            }
        }
    }
}
