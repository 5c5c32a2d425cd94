use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// Name of the per-project data directory
pub const PROOFS_DIR: &str = ".proofs";

pub const DEFAULT_BACKEND: &str = "local";

/// A configuration key the tool understands
#[derive(Debug, Clone)]
pub struct KeyInfo {
    pub key: &'static str,
    pub default: &'static str,
    pub env: &'static str,
    pub description: &'static str,
}

pub static KNOWN_KEYS: &[KeyInfo] = &[
    KeyInfo {
        key: "backend",
        default: DEFAULT_BACKEND,
        env: "PROOFS_BACKEND",
        description: "Where entries live: local (SQLite file) or remote (proofs server)",
    },
    KeyInfo {
        key: "socket",
        default: ".proofs/proofs.sock",
        env: "PROOFS_SOCKET",
        description: "Unix socket the server listens on and remote clients dial",
    },
];

/// Unix socket addresses hold at most 108 bytes including the terminator
const MAX_SOCKET_PATH: usize = 100;

/// Default socket for one project: inside its .proofs directory, or under a
/// per-project name in the user's runtime directory when that path is too long
pub fn default_socket_path(proofs_path: &Path) -> PathBuf {
    let local = proofs_path.join("proofs.sock");
    if local.as_os_str().len() <= MAX_SOCKET_PATH {
        return local;
    }

    let mut hasher = DefaultHasher::new();
    proofs_path.hash(&mut hasher);
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(format!("proofs-{:016x}.sock", hasher.finish()))
}

/// Configuration manager for a .proofs directory
pub struct ProofsConfig {
    proofs_path: PathBuf,
    config_file: PathBuf,
    config: HashMap<String, serde_yaml::Value>,
}

impl ProofsConfig {
    pub fn new(proofs_path: PathBuf) -> Self {
        let config_file = proofs_path.join("_config.yaml");
        let mut instance = Self {
            proofs_path,
            config_file,
            config: HashMap::new(),
        };
        instance.load();
        instance
    }

    fn load(&mut self) {
        if !self.config_file.exists() {
            return;
        }
        let parsed = fs::read_to_string(&self.config_file)
            .map_err(|e| e.to_string())
            .and_then(|content| {
                serde_yaml::from_str::<HashMap<String, serde_yaml::Value>>(&content)
                    .map_err(|e| e.to_string())
            });
        match parsed {
            Ok(config) => self.config = config,
            Err(e) => tracing::warn!(
                file = %self.config_file.display(),
                error = %e,
                "ignoring unreadable config file"
            ),
        }
    }

    fn save(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.proofs_path)?;
        let content = serde_yaml::to_string(&self.config)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(&self.config_file, content)
    }

    pub fn proofs_path(&self) -> &PathBuf {
        &self.proofs_path
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).and_then(|v| match v {
            serde_yaml::Value::String(s) => Some(s.clone()),
            serde_yaml::Value::Number(n) => Some(n.to_string()),
            serde_yaml::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    pub fn set(&mut self, key: &str, value: &str) -> std::io::Result<()> {
        self.config
            .insert(key.to_string(), serde_yaml::Value::String(value.to_string()));
        self.save()
    }

    /// Value for `key` with its environment override applied
    fn resolved(&self, key: &str) -> Option<String> {
        KNOWN_KEYS
            .iter()
            .find(|k| k.key == key)
            .and_then(|k| std::env::var(k.env).ok())
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.get(key))
    }

    /// `local` or `remote`
    pub fn backend(&self) -> String {
        self.resolved("backend")
            .unwrap_or_else(|| DEFAULT_BACKEND.to_string())
    }

    pub fn socket_path(&self) -> PathBuf {
        self.resolved("socket")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_socket_path(&self.proofs_path))
    }

    /// SQLite file used by the local backend and by the server
    pub fn db_path(&self) -> PathBuf {
        self.proofs_path.join("evidence.db")
    }
}

/// Find the .proofs directory, searching upward from current directory
pub fn find_proofs_path() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let proofs = current.join(PROOFS_DIR);
        if proofs.is_dir() {
            return Some(proofs);
        }

        if !current.pop() {
            break;
        }
    }

    // Check PROOFS_PATH environment variable
    if let Ok(path) = std::env::var("PROOFS_PATH") {
        let proofs = PathBuf::from(path);
        if proofs.is_dir() {
            return Some(proofs);
        }
    }

    None
}
