//! The unified memory/edge data model (spec §3.1). A `Memory` is the only content
//! entity; its kind (`observation` / `thought` / `prediction`) is never stored as a
//! tag — it is derived from field presence at read time (§9 "field-presence typing").

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an observation's content originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Market,
    News,
    Earnings,
    Email,
    Human,
    Tool,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Market => "market",
            Source::News => "news",
            Source::Earnings => "earnings",
            Source::Email => "email",
            Source::Human => "human",
            Source::Tool => "tool",
        }
    }

    /// Fallback prior confidence used when system stats carry no track record yet,
    /// per spec §4.3.
    pub fn default_prior(self) -> f64 {
        match self {
            Source::Market => 0.75,
            Source::Tool => 0.70,
            Source::Earnings => 0.70,
            Source::News => 0.55,
            Source::Email => 0.50,
            Source::Human => 0.50,
        }
    }
}

/// Lifecycle state of a memory, per spec §3.1/§3.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryState {
    Active,
    Confirmed,
    Violated,
    Resolved,
}

/// Terminal outcome of a resolved memory. `Superseded` has no in-spec creation path
/// (§9 open question) — it is an externally-settable value honored only by scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Correct,
    Incorrect,
    Void,
    Superseded,
}

/// Coarse severity of a violation, derived from the violated memory's centrality
/// (spec §4.3 `damage_level`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageLevel {
    Core,
    Peripheral,
}

impl DamageLevel {
    /// `core` iff centrality > 5, per spec §4.3/Glossary.
    pub fn from_centrality(centrality: u32) -> Self {
        if centrality > 5 {
            DamageLevel::Core
        } else {
            DamageLevel::Peripheral
        }
    }
}

/// Whether a recorded violation came from a direct exposure match or from a cascade
/// triggered by a resolution elsewhere in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSource {
    Direct,
    Cascade,
}

/// Stage of the intake pipeline (C11) a memory's exposure job is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureCheckStatus {
    Pending,
    Processing,
    Completed,
    Skipped,
}

/// A single recorded contradiction against a memory's conditions (spec §3.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub condition: String,
    pub timestamp: DateTime<Utc>,
    pub obs_id: String,
    pub damage_level: DamageLevel,
    pub source_type: ViolationSource,
    pub cascade_source_id: Option<String>,
}

/// Tags reserved for resolution bookkeeping; a memory carrying one of these is a
/// resolution artifact and must never re-enter exposure checking (spec §9
/// "feedback-loop prevention").
pub const RESERVED_TAGS: [&str; 3] = ["resolution", "resolver", "auto-resolution"];

pub fn has_reserved_tag(tags: &BTreeSet<String>) -> bool {
    tags.iter().any(|t| RESERVED_TAGS.contains(&t.as_str()))
}

/// Input to `create_memory`; not yet assigned an id or lifecycle defaults.
#[derive(Debug, Clone, Default)]
pub struct MemoryDraft {
    pub content: String,
    pub tags: BTreeSet<String>,
    pub source: Option<Source>,
    pub derived_from: Vec<String>,
    pub invalidates_if: Vec<String>,
    pub confirms_if: Vec<String>,
    pub assumes: Vec<String>,
    pub resolves_by: Option<DateTime<Utc>>,
    pub outcome_condition: Option<String>,
    pub session_id: Option<String>,
    pub request_id: Option<String>,
}

/// The derived kind of a memory, projected (never stored) from field presence,
/// per spec §3.1 and the "field-presence typing" design note (§9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryKind {
    Observation,
    Thought,
    /// A time-bound thought, a.k.a. prediction.
    Prediction,
}

impl MemoryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MemoryKind::Observation => "observation",
            MemoryKind::Thought => "thought",
            MemoryKind::Prediction => "prediction",
        }
    }

    pub fn is_time_bound(self) -> bool {
        matches!(self, MemoryKind::Prediction)
    }
}

/// The full, flat memory record. `kind()` is a pure projection — the variant is
/// never persisted as its own column (spec §3.1, §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    pub content: String,
    pub tags: BTreeSet<String>,

    pub source: Option<Source>,
    pub derived_from: Vec<String>,

    pub invalidates_if: Vec<String>,
    pub confirms_if: Vec<String>,
    pub assumes: Vec<String>,

    pub resolves_by: Option<DateTime<Utc>>,
    pub outcome_condition: Option<String>,

    pub starting_confidence: f64,
    pub confirmations: u32,
    pub times_tested: u32,
    pub contradictions: u32,
    pub centrality: u32,
    pub propagated_confidence: Option<f64>,

    pub state: MemoryState,
    pub outcome: Option<Outcome>,
    pub retracted: bool,
    pub retraction_reason: Option<String>,

    pub exposure_check_status: ExposureCheckStatus,
    pub violations: Vec<Violation>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub retracted_at: Option<DateTime<Utc>>,

    pub session_id: Option<String>,
}

impl Memory {
    /// Derive this memory's kind from field presence, per spec §3.1.
    pub fn kind(&self) -> MemoryKind {
        if self.source.is_some() {
            MemoryKind::Observation
        } else if self.resolves_by.is_some() {
            MemoryKind::Prediction
        } else {
            MemoryKind::Thought
        }
    }

    pub fn is_observation(&self) -> bool {
        self.kind() == MemoryKind::Observation
    }

    pub fn is_time_bound(&self) -> bool {
        self.kind().is_time_bound()
    }

    pub fn has_reserved_tag(&self) -> bool {
        has_reserved_tag(&self.tags)
    }

    /// Whether this memory is still eligible to participate in exposure checking /
    /// hold condition vectors, per spec §3.2 invariant 6.
    pub fn is_indexable_active(&self) -> bool {
        !self.retracted && self.state == MemoryState::Active
    }

    /// Ids this memory's `violations` already cover, for dedup (spec §3.2 invariant 8).
    pub fn violated_obs_ids(&self) -> BTreeSet<&str> {
        self.violations.iter().map(|v| v.obs_id.as_str()).collect()
    }
}
