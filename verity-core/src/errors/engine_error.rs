use super::{
    CascadeError, DispatchError, EmbeddingError, ErrorKind, EventsError, ExposureError,
    IndexError, IntakeError, SchedulerError, ShockError, StorageError,
};

/// Top-level error type aggregating every component error. Every component crate's
/// `thiserror` enum converts into this via `#[from]`, so a caller at the top of the
/// stack (the `verity` crate's Creation API) can propagate with a single `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Exposure(#[from] ExposureError),

    #[error(transparent)]
    Shock(#[from] ShockError),

    #[error(transparent)]
    Cascade(#[from] CascadeError),

    #[error(transparent)]
    Events(#[from] EventsError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Crate-wide result alias used throughout the workspace.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// The abstract kind this error maps to, per spec §7, independent of which
    /// concrete component variant produced it.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::Storage(e) => e.kind(),
            EngineError::Index(e) => e.kind(),
            EngineError::Embedding(e) => e.kind(),
            EngineError::Exposure(e) => e.kind(),
            EngineError::Shock(e) => e.kind(),
            EngineError::Cascade(e) => e.kind(),
            EngineError::Events(e) => e.kind(),
            EngineError::Dispatch(e) => e.kind(),
            EngineError::Scheduler(e) => e.kind(),
            EngineError::Intake(e) => e.kind(),
            EngineError::Serialization(_) => ErrorKind::TerminalIo,
        }
    }

    /// HTTP-style status code a thin transport layer would report for this error.
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }
}
