//! `verity`: belief-revision knowledge engine (spec §1). Wires the eleven
//! component crates (C1-C11) behind the Creation API described in spec §6.1.
//!
//! ```no_run
//! # async fn demo() -> Result<(), verity_core::errors::EngineError> {
//! use verity::Engine;
//! use verity_core::config::EngineConfig;
//!
//! let engine = Engine::open_in_memory(EngineConfig::default())?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod engine;
pub mod resolver;

pub use api::{
    CreateObservationResult, CreateThoughtResult, Direction, FindHit, FindParams, InsightsReport,
    InsightsView,
};
pub use engine::Engine;
pub use resolver::AnyResolver;
