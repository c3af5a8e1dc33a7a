use super::ErrorKind;

/// Errors raised by the Vector Index Façade (C2).
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("unknown index: {name}")]
    UnknownIndex { name: String },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("backend io error: {0}")]
    Io(String),
}

impl IndexError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IndexError::UnknownIndex { .. } => ErrorKind::Validation,
            IndexError::DimensionMismatch { .. } => ErrorKind::Validation,
            IndexError::Io(_) => ErrorKind::TransientIo,
        }
    }
}
