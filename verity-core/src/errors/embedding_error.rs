use super::ErrorKind;

/// Errors raised by the Embedding Client (C4): text embedding and LLM judge calls.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("judge reply could not be parsed as JSON")]
    JudgeParse,

    #[error("request timed out")]
    Timeout,

    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl EmbeddingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EmbeddingError::Transport(_) => ErrorKind::TransientIo,
            EmbeddingError::JudgeParse => ErrorKind::TransientParse,
            EmbeddingError::Timeout => ErrorKind::TransientIo,
            EmbeddingError::RetriesExhausted { .. } => ErrorKind::TransientIo,
        }
    }
}
