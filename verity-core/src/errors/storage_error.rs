use super::ErrorKind;

/// Errors raised by the Memory Store (C1).
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("memory not found: {id}")]
    NotFound { id: String },

    #[error("invalid memory draft: {reason}")]
    InvalidDraft { reason: String },

    #[error("derived_from source not found or retracted: {id}")]
    DanglingDerivedFrom { id: String },

    #[error("invariant violated: {reason}")]
    InvariantViolation { reason: String },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("concurrency error: {0}")]
    Concurrency(String),
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::NotFound { .. } => ErrorKind::NotFound,
            StorageError::InvalidDraft { .. } => ErrorKind::Validation,
            StorageError::DanglingDerivedFrom { .. } => ErrorKind::Validation,
            StorageError::InvariantViolation { .. } => ErrorKind::Conflict,
            StorageError::Sqlite(_) => ErrorKind::TerminalIo,
            StorageError::Serialization(_) => ErrorKind::TerminalIo,
            StorageError::Concurrency(_) => ErrorKind::Conflict,
        }
    }
}
