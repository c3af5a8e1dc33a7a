//! Abstract error classification shared across every component error enum.

use serde::{Deserialize, Serialize};

/// The coarse-grained kind an [`EngineError`](super::EngineError) maps to, independent
/// of which component raised it. Callers that need to branch on policy (retry vs.
/// surface to user vs. drop) match on this rather than every concrete variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Bad input, rejected synchronously, no state change.
    Validation,
    /// Referenced entity does not exist.
    NotFound,
    /// An invariant would be violated by the requested mutation.
    Conflict,
    /// Vector index / judge / resolver reachable but the call failed; retry with backoff.
    TransientIo,
    /// A remote reply could not be parsed as the expected JSON shape.
    TransientParse,
    /// Unrecoverable I/O (e.g. local storage corruption).
    TerminalIo,
    /// The operation was cancelled before completing.
    Cancelled,
}

impl ErrorKind {
    /// HTTP-style status code a thin transport layer in front of this library would
    /// use to report the error, per spec §7.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::TransientIo | ErrorKind::TransientParse => 503,
            ErrorKind::TerminalIo => 500,
            ErrorKind::Cancelled => 499,
        }
    }
}
