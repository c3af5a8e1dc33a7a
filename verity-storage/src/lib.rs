//! SQLite persistence for memories, edges, versions, notifications, and system
//! stats (C1, spec §4.1/§6.6). Single write connection guarded by an async mutex,
//! WAL mode, blocking calls issued through `spawn_blocking` (spec §5/§10.5).

pub mod engine;
pub mod migrations;
pub mod queries;

pub use engine::StorageEngine;
