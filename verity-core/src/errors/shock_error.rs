use super::ErrorKind;

/// Errors raised by the Shock Propagator (C6).
#[derive(Debug, thiserror::Error)]
pub enum ShockError {
    #[error("storage error: {0}")]
    Storage(#[from] super::StorageError),

    #[error("spectral radius failed to contract below 1.0 after {attempts} backtrack attempts")]
    SpectralDivergence { attempts: u32 },

    #[error("graph concurrency error: {0}")]
    Concurrency(String),
}

impl ShockError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ShockError::Storage(e) => e.kind(),
            ShockError::SpectralDivergence { .. } => ErrorKind::Conflict,
            ShockError::Concurrency(_) => ErrorKind::Conflict,
        }
    }
}
