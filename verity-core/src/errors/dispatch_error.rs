use super::ErrorKind;

/// Errors raised by the Dispatcher (C9) and its resolver backends.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("events error: {0}")]
    Events(#[from] super::EventsError),

    #[error("webhook returned non-2xx status {status}")]
    WebhookStatus { status: u16 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("issue tracker error: {0}")]
    IssueTracker(String),
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::Events(e) => e.kind(),
            DispatchError::WebhookStatus { .. } => ErrorKind::TransientIo,
            DispatchError::Transport(_) => ErrorKind::TransientIo,
            DispatchError::IssueTracker(_) => ErrorKind::TransientIo,
        }
    }
}
