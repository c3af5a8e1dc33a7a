//! Component seam traits. Grounded on the teacher's `ITemporalEngine`-style async
//! trait idiom (`#[allow(async_fn_in_trait)]`, no `async-trait` crate dependency).
//! Each trait is the contract a concrete crate (`verity-storage`, `verity-index`,
//! `verity-embedding`) implements and every consumer crate depends on only the trait.

use chrono::{DateTime, Utc};

use crate::edge::{Edge, EdgeType};
use crate::errors::{EmbeddingError, EventsError, IndexError, StorageError};
use crate::event::Event;
use crate::memory::{ExposureCheckStatus, Memory, MemoryDraft, Violation};
use crate::notification::Notification;
use crate::stats::SystemStats;
use crate::version::Version;

pub type StorageResult<T> = Result<T, StorageError>;
pub type IndexResult<T> = Result<T, IndexError>;
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;
pub type EventsResult<T> = Result<T, EventsError>;

/// A query against the memory store, per spec §6.1 `find`.
#[derive(Debug, Clone, Default)]
pub struct MemoryQuery {
    pub observations_only: bool,
    pub thoughts_only: bool,
    pub predictions_only: bool,
    pub include_retracted: bool,
    pub limit: Option<usize>,
}

/// The Memory Store (C1) seam. Implemented by `verity-storage::StorageEngine`.
#[allow(async_fn_in_trait)]
pub trait MemoryStorage: Send + Sync {
    async fn create_memory(&self, draft: MemoryDraft) -> StorageResult<Memory>;
    async fn get(&self, id: &str) -> StorageResult<Option<Memory>>;
    async fn retract(&self, id: &str, reason: &str) -> StorageResult<Version>;
    async fn record_violations_batch(
        &self,
        id: &str,
        new_violations: Vec<Violation>,
    ) -> StorageResult<Memory>;
    async fn record_confirmation(&self, id: &str) -> StorageResult<Memory>;
    async fn auto_confirm(&self, id: &str) -> StorageResult<Memory>;
    /// Terminal manual confirmation (spec §3.3, §6.1 `confirm`): `active -> confirmed`.
    async fn mark_confirmed(&self, id: &str) -> StorageResult<Memory>;
    /// Sets `outcome=superseded, state=resolved` (spec §9 open question: the one
    /// creation path the spec names for this outcome is `retract` with a
    /// `correcting_observation_id`).
    async fn mark_superseded(&self, id: &str) -> StorageResult<Memory>;
    async fn increment_centrality(&self, target: &str) -> StorageResult<u32>;
    async fn decrement_centrality(&self, target: &str) -> StorageResult<u32>;
    async fn create_edge(
        &self,
        source_id: &str,
        target_id: &str,
        edge_type: EdgeType,
        strength: f64,
    ) -> StorageResult<Edge>;
    async fn decay_outgoing_support_edges(&self, id: &str, factor: f64) -> StorageResult<usize>;
    async fn boost_outgoing_support_edges(&self, id: &str, factor: f64) -> StorageResult<usize>;
    async fn get_edges(&self, id: &str) -> StorageResult<Vec<Edge>>;
    async fn list_condition_ids(
        &self,
        id: &str,
        inv_cap: usize,
        conf_cap: usize,
    ) -> StorageResult<Vec<String>>;
    async fn set_propagated_confidence(&self, id: &str, value: Option<f64>) -> StorageResult<()>;
    async fn set_exposure_check_status(&self, id: &str, status: ExposureCheckStatus) -> StorageResult<()>;
    async fn find_by_query(&self, query: MemoryQuery) -> StorageResult<Vec<Memory>>;
    async fn insert_notification(&self, notification: Notification) -> StorageResult<()>;
    async fn record_access(&self, memory_id: &str, at: DateTime<Utc>) -> StorageResult<()>;
    async fn system_stats(&self) -> StorageResult<SystemStats>;
    async fn set_system_stats(&self, stats: SystemStats) -> StorageResult<()>;
}

/// Logical index name, per spec §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexName {
    Memory,
    Invalidates,
    Confirms,
}

impl IndexName {
    pub fn as_str(self) -> &'static str {
        match self {
            IndexName::Memory => "MEMORY",
            IndexName::Invalidates => "INVALIDATES",
            IndexName::Confirms => "CONFIRMS",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexFilter {
    pub memory_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IndexHit {
    pub id: String,
    pub score: f32,
    pub meta: serde_json::Value,
}

/// The Vector Index Façade (C2) seam. Implemented by `verity-index`.
#[allow(async_fn_in_trait)]
pub trait VectorIndex: Send + Sync {
    async fn upsert(
        &self,
        index: IndexName,
        id: &str,
        vector: Vec<f32>,
        meta: serde_json::Value,
    ) -> IndexResult<()>;
    async fn query(
        &self,
        index: IndexName,
        vector: &[f32],
        top_k: usize,
        min_sim: f32,
        filter: Option<IndexFilter>,
    ) -> IndexResult<Vec<IndexHit>>;
    async fn delete_by_ids(&self, index: IndexName, ids: &[String]) -> IndexResult<()>;
    async fn get_by_ids(&self, index: IndexName, ids: &[String]) -> IndexResult<Vec<IndexHit>>;
}

/// The Embedding Client (C4) text→vector seam. Implemented by `verity-embedding`.
#[allow(async_fn_in_trait)]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>>;
}

/// LLM judge verdict, per spec §4.4/§6.3's strict JSON contract.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize, Default)]
pub struct JudgeVerdict {
    pub matches: bool,
    pub confidence: f32,
    pub reasoning: Option<String>,
    #[serde(rename = "relevantButNotViolation", default)]
    pub relevant_but_not_violation: bool,
}

/// The kind of condition being judged, selecting the prompt template (spec §4.5/§6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionKind {
    InvalidatesIf,
    ConfirmsIf,
    Assumes,
}

/// The Embedding Client (C4) judge seam.
#[allow(async_fn_in_trait)]
pub trait Judge: Send + Sync {
    async fn judge(
        &self,
        kind: ConditionKind,
        condition: &str,
        candidate_content: &str,
    ) -> EmbeddingResult<JudgeVerdict>;
}

/// The Event Queue (C8) seam. Implemented by `verity-events`.
#[allow(async_fn_in_trait)]
pub trait EventQueue: Send + Sync {
    async fn queue(&self, event: Event) -> EventsResult<()>;
    async fn find_inactive_sessions(&self, inactivity_ms: i64) -> EventsResult<Vec<String>>;
    async fn claim_for_dispatch(
        &self,
        session_id: &str,
        claim_id: &str,
    ) -> EventsResult<Vec<Event>>;
    async fn release_claimed(&self, event_ids: &[String]) -> EventsResult<()>;
    async fn find_overdue_predictions(&self) -> EventsResult<Vec<Memory>>;
    async fn has_pending_resolution(&self, memory_id: &str) -> EventsResult<bool>;
}

/// Resolver backend seam (spec §6.5). Implemented by `verity-dispatch`.
#[allow(async_fn_in_trait)]
pub trait Resolver: Send + Sync {
    async fn dispatch(&self, payload: &serde_json::Value) -> Result<(), crate::errors::DispatchError>;
}
