//! Append-only audit trail (spec §3.1 "Version", §6.6 `memory_events` table).
//! Grounded on `cortex-storage/src/queries/version_ops.rs`'s `MemoryVersion` shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Memory,
    Edge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Created,
    Updated,
    Retracted,
    ViolationRecorded,
    ConfirmationRecorded,
    StateTransition,
    EdgeCreated,
    EdgeStrengthUpdated,
    CentralityChanged,
}

/// One append-only audit row. `snapshot` is an opaque document (the full post-mutation
/// memory or edge, serialized) — callers never parse it back into typed state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    pub entity_id: String,
    pub entity_type: EntityType,
    pub change_type: ChangeType,
    pub snapshot: Value,
    pub change_reason: Option<String>,
    pub session_id: Option<String>,
    pub request_id: Option<String>,
    pub at: DateTime<Utc>,
}
