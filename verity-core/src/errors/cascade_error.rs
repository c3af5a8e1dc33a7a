use super::ErrorKind;

/// Errors raised by the Cascade Service (C7).
#[derive(Debug, thiserror::Error)]
pub enum CascadeError {
    #[error("storage error: {0}")]
    Storage(#[from] super::StorageError),

    #[error("events error: {0}")]
    Events(#[from] super::EventsError),
}

impl CascadeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CascadeError::Storage(e) => e.kind(),
            CascadeError::Events(e) => e.kind(),
        }
    }
}
