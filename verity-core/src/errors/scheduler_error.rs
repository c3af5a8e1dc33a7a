use super::ErrorKind;

/// Errors raised by the Scheduler Hooks (C10).
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("storage error: {0}")]
    Storage(#[from] super::StorageError),

    #[error("events error: {0}")]
    Events(#[from] super::EventsError),

    #[error("dispatch error: {0}")]
    Dispatch(#[from] super::DispatchError),

    #[error("shock error: {0}")]
    Shock(#[from] super::ShockError),
}

impl SchedulerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchedulerError::Storage(e) => e.kind(),
            SchedulerError::Events(e) => e.kind(),
            SchedulerError::Dispatch(e) => e.kind(),
            SchedulerError::Shock(e) => e.kind(),
        }
    }
}
