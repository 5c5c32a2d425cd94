use thiserror::Error;

/// Failures surfaced by the evidence engine
#[derive(Debug, Error)]
pub enum EvidenceError {
    /// Malformed input, attributable to one field. Re-prompt, don't retry.
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("evidence not found: {0}")]
    NotFound(String),

    /// The store could not complete the read or write. Safe to retry.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl EvidenceError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

impl From<rusqlite::Error> for EvidenceError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<std::io::Error> for EvidenceError {
    fn from(e: std::io::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for EvidenceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Storage(format!("malformed record: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, EvidenceError>;
