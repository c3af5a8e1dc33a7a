use super::ErrorKind;

/// Errors raised by the Exposure Checker (C5).
#[derive(Debug, thiserror::Error)]
pub enum ExposureError {
    #[error("storage error: {0}")]
    Storage(#[from] super::StorageError),

    #[error("index error: {0}")]
    Index(#[from] super::IndexError),

    #[error("embedding error: {0}")]
    Embedding(#[from] super::EmbeddingError),

    #[error("shock error: {0}")]
    Shock(#[from] super::ShockError),

    #[error("cascade error: {0}")]
    Cascade(#[from] super::CascadeError),

    #[error("events error: {0}")]
    Events(#[from] super::EventsError),

    #[error("cancelled")]
    Cancelled,
}

impl ExposureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExposureError::Storage(e) => e.kind(),
            ExposureError::Index(e) => e.kind(),
            ExposureError::Embedding(e) => e.kind(),
            ExposureError::Shock(e) => e.kind(),
            ExposureError::Cascade(e) => e.kind(),
            ExposureError::Events(e) => e.kind(),
            ExposureError::Cancelled => ErrorKind::Cancelled,
        }
    }
}
