use super::ErrorKind;

/// Errors raised by the Exposure Intake Queue (C11).
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("exposure error: {0}")]
    Exposure(#[from] super::ExposureError),

    #[error("storage error: {0}")]
    Storage(#[from] super::StorageError),

    #[error("job retries exhausted for memory {memory_id} after {attempts} attempts")]
    RetriesExhausted { memory_id: String, attempts: u32 },

    #[error("queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },
}

impl IntakeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IntakeError::Exposure(e) => e.kind(),
            IntakeError::Storage(e) => e.kind(),
            IntakeError::RetriesExhausted { .. } => ErrorKind::TerminalIo,
            IntakeError::QueueFull { .. } => ErrorKind::TransientIo,
        }
    }
}
