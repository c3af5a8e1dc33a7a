//! Event entity (spec §3.1, §4.8): the unit the Cascade Service and Exposure Checker
//! queue and the Dispatcher drains. Distinct from [`crate::version::Version`] (the
//! audit log) — this is a dispatch-facing notification, not a storage change record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::memory::DamageLevel;

/// The kind of dispatchable event. Cascade/assumption variants carry the upstream
/// memory's derived kind in their own name at emission time (spec §4.7's
/// `<memtype>:cascade_*` convention), so this enum stores the already-formatted
/// string rather than re-deriving it at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventType(pub String);

impl EventType {
    pub const VIOLATION: &'static str = "violation";
    pub const PREDICTION_CONFIRMED: &'static str = "prediction_confirmed";
    pub const PENDING_RESOLUTION: &'static str = "thought:pending_resolution";
    pub const EVIDENCE_VALIDATED: &'static str = "assumption:evidence_validated";
    pub const EVIDENCE_INVALIDATED: &'static str = "assumption:evidence_invalidated";

    pub fn violation() -> Self {
        EventType(Self::VIOLATION.to_string())
    }

    pub fn prediction_confirmed() -> Self {
        EventType(Self::PREDICTION_CONFIRMED.to_string())
    }

    pub fn pending_resolution() -> Self {
        EventType(Self::PENDING_RESOLUTION.to_string())
    }

    pub fn evidence_validated() -> Self {
        EventType(Self::EVIDENCE_VALIDATED.to_string())
    }

    pub fn evidence_invalidated() -> Self {
        EventType(Self::EVIDENCE_INVALIDATED.to_string())
    }

    pub fn cascade(memtype: &str, action: &str) -> Self {
        EventType(format!("{memtype}:cascade_{action}"))
    }

    pub fn is_cascade(&self) -> bool {
        self.0.contains(":cascade_")
    }

    pub fn is_pending_resolution(&self) -> bool {
        self.0 == Self::PENDING_RESOLUTION
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A queued, session-batched notification awaiting dispatch (spec §4.8/§4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub session_id: Option<String>,
    pub event_type: EventType,
    pub memory_id: String,
    pub violated_by: Option<String>,
    pub damage_level: Option<DamageLevel>,
    pub context: Value,
    pub created_at: DateTime<Utc>,
    pub dispatched: bool,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub claim_id: Option<String>,
}
