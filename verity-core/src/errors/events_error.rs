use super::ErrorKind;

/// Errors raised by the Event Queue (C8).
#[derive(Debug, thiserror::Error)]
pub enum EventsError {
    #[error("storage error: {0}")]
    Storage(#[from] super::StorageError),

    #[error("event not found: {id}")]
    NotFound { id: String },

    #[error("claim conflict: event {id} already claimed by {claim_id}")]
    ClaimConflict { id: String, claim_id: String },
}

impl EventsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EventsError::Storage(e) => e.kind(),
            EventsError::NotFound { .. } => ErrorKind::NotFound,
            EventsError::ClaimConflict { .. } => ErrorKind::Conflict,
        }
    }
}
