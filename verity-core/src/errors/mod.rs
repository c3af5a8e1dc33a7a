mod cascade_error;
mod dispatch_error;
mod embedding_error;
mod engine_error;
mod events_error;
mod exposure_error;
mod index_error;
mod intake_error;
mod kind;
mod scheduler_error;
mod shock_error;
mod storage_error;

pub use cascade_error::CascadeError;
pub use dispatch_error::DispatchError;
pub use embedding_error::EmbeddingError;
pub use engine_error::{EngineError, EngineResult};
pub use events_error::EventsError;
pub use exposure_error::ExposureError;
pub use index_error::IndexError;
pub use intake_error::IntakeError;
pub use kind::ErrorKind;
pub use scheduler_error::SchedulerError;
pub use shock_error::ShockError;
pub use storage_error::StorageError;
