//! Edge entity (spec §3.1): a directed, typed, weighted multigraph connecting
//! memories. Grounded on `cortex-storage/src/queries/causal_ops.rs`'s `CausalEdge`
//! shape, generalized to the spec's three-way `edge_type`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    /// Support edge: target is derived from source. DAG-enforced; observations are
    /// roots and never targets of this edge type (spec §3.2 invariant 1).
    DerivedFrom,
    /// Contradiction edge, injected by the exposure checker and the shock
    /// propagator, source is the violating observation (or seed memory for shock).
    ViolatedBy,
    /// Confirmation edge, injected on `relevantButNotViolation` matches and
    /// auto-confirmation.
    ConfirmedBy,
}

impl EdgeType {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeType::DerivedFrom => "derived_from",
            EdgeType::ViolatedBy => "violated_by",
            EdgeType::ConfirmedBy => "confirmed_by",
        }
    }

    /// "Support" edges are the ones shock propagation and zone-health walk through;
    /// `violated_by` edges are contradiction edges, handled separately (spec §4.6).
    pub fn is_support(self) -> bool {
        matches!(self, EdgeType::DerivedFrom | EdgeType::ConfirmedBy)
    }
}

/// A single directed edge. The triple `(source_id, target_id, edge_type)` is unique;
/// repeated `create_edge` calls merge strengths, clamped at 1.0 (spec §3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub source_id: String,
    pub target_id: String,
    pub edge_type: EdgeType,
    pub strength: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Edge {
    pub fn clamp_strength(s: f64) -> f64 {
        s.clamp(0.0, 1.0)
    }
}
