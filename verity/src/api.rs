//! Request/response shapes for the Creation API (spec §6.1). Plain data, no
//! behavior — `Engine`'s methods build and consume these.

use std::collections::HashMap;

use serde::Serialize;

use verity_core::memory::Memory;

/// Result of `create_observation`, per spec §6.1.
#[derive(Debug, Clone, Serialize)]
pub struct CreateObservationResult {
    pub id: String,
    pub exposure_check: &'static str,
}

/// Result of `create_thought`, per spec §6.1.
#[derive(Debug, Clone, Serialize)]
pub struct CreateThoughtResult {
    pub id: String,
    pub time_bound: bool,
    pub exposure_check: &'static str,
}

/// Direction for `reference` (spec §6.1). `Up` follows a node's outgoing support
/// edges (toward ancestors/parents); `Down` follows incoming ones (toward
/// children); `Both` follows either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Both,
}

/// Parameters for `find` (spec §6.1): a free-text semantic query plus the same
/// `observations_only|thoughts_only|predictions_only` type filter `find_by_query`
/// uses, layered over the MEMORY vector index rather than a flat table scan.
#[derive(Debug, Clone, Default)]
pub struct FindParams {
    pub query: String,
    pub observations_only: bool,
    pub thoughts_only: bool,
    pub predictions_only: bool,
    pub limit: Option<usize>,
    pub min_similarity: Option<f32>,
    pub include_retracted: bool,
}

/// One `find` result: the memory plus its similarity score against the query.
#[derive(Debug, Clone)]
pub struct FindHit {
    pub memory: Memory,
    pub score: f32,
}

/// Which `insights` view to compute (spec §6.1 `insights(view)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsightsView {
    /// Counts of memories by kind and by lifecycle state.
    Overview,
    /// Memories whose exposure check never reached `completed`/`skipped` — the
    /// operator-visible surface for spec §7's "exposure job failure" policy.
    ExposureBacklog,
    /// Distribution of robustness tiers across all active memories.
    Robustness,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum InsightsReport {
    Overview { total: usize, by_kind: HashMap<String, u32>, by_state: HashMap<String, u32> },
    ExposureBacklog { ids: Vec<String> },
    Robustness { tiers: HashMap<String, u32> },
}
