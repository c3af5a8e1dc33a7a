//! `Engine`: the concrete composition root wiring all eleven components behind
//! the Creation API (spec §6.1). Grounded on the teacher's trait-based engine
//! composition idiom (one struct holding `Arc`s to every component, a `wire`
//! constructor assembling them from a layered config) generalized from the
//! teacher's fixed backend set to this stack's pluggable resolver/judge seams.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;

use verity_core::config::EngineConfig;
use verity_core::edge::EdgeType;
use verity_core::errors::EngineError;
use verity_core::memory::{has_reserved_tag, Memory, MemoryDraft, Source};
use verity_core::stats::SystemStats;
use verity_core::traits::{EmbeddingProvider, IndexFilter, IndexName, MemoryQuery, MemoryStorage, VectorIndex};
use verity_embedding::{EmbeddingClient, HttpClientConfig};
use verity_events::StorageEventQueue;
use verity_exposure::ExposureChecker;
use verity_index::{confirms_id, invalidates_id, InProcessVectorIndex};
use verity_intake::{IntakeJob, IntakeQueue};
use verity_scheduler::{DailyTickReport, MinuteTickReport};
use verity_storage::StorageEngine;

use crate::api::{CreateObservationResult, CreateThoughtResult, Direction, FindHit, FindParams, InsightsReport, InsightsView};
use crate::resolver::AnyResolver;

type Checker = ExposureChecker<StorageEngine, InProcessVectorIndex, EmbeddingClient, StorageEventQueue>;

/// The belief-revision knowledge engine: memory store, vector index, confidence
/// scoring, embedding/judge client, exposure checking, shock propagation, cascade,
/// event queue, dispatch, scheduler hooks and intake queue wired into one façade.
pub struct Engine {
    storage: std::sync::Arc<StorageEngine>,
    index: std::sync::Arc<InProcessVectorIndex>,
    judge: std::sync::Arc<EmbeddingClient>,
    queue: std::sync::Arc<StorageEventQueue>,
    resolver: std::sync::Arc<AnyResolver>,
    checker: std::sync::Arc<Checker>,
    intake: IntakeQueue,
    config: EngineConfig,
}

impl Engine {
    /// Open (creating if necessary) a SQLite-backed engine at `path`. Must be
    /// called from within a running Tokio runtime — it spawns the intake
    /// consumer task (spec §4.11).
    pub fn open(path: &str, config: EngineConfig) -> Result<Self, EngineError> {
        let storage = std::sync::Arc::new(StorageEngine::open(path)?);
        Ok(Self::wire(storage, config))
    }

    /// In-memory engine, for tests and short-lived sessions.
    pub fn open_in_memory(config: EngineConfig) -> Result<Self, EngineError> {
        let storage = std::sync::Arc::new(StorageEngine::open_in_memory()?);
        Ok(Self::wire(storage, config))
    }

    fn wire(storage: std::sync::Arc<StorageEngine>, config: EngineConfig) -> Self {
        let index = std::sync::Arc::new(InProcessVectorIndex::new());
        let http_config = HttpClientConfig {
            base_url: config.embedding.judge_url.clone(),
            api_key: config.embedding.judge_api_key.clone(),
            model: config.embedding.judge_model.clone().or_else(|| config.embedding.embedding_model.clone()),
            retry_attempts: config.embedding.retry_attempts,
            retry_base_ms: config.embedding.retry_base_ms,
            timeout: Duration::from_secs(10),
        };
        let judge = std::sync::Arc::new(EmbeddingClient::new(http_config));
        let queue = std::sync::Arc::new(StorageEventQueue::new(storage.clone()));
        let resolver = std::sync::Arc::new(AnyResolver::from_config(&config.dispatch));
        let checker = std::sync::Arc::new(ExposureChecker::new(
            storage.clone(),
            index.clone(),
            judge.clone(),
            queue.clone(),
            config.exposure.clone(),
            config.shock.clone(),
        ));

        let (intake, receiver) = IntakeQueue::new(&config.intake);
        tokio::spawn(verity_intake::run_consumer(receiver, storage.clone(), checker.clone(), config.intake.clone()));

        Self { storage, index, judge, queue, resolver, checker, intake, config }
    }

    /// Embed `memory`'s content and conditions, upsert them into the relevant
    /// logical indexes, and enqueue its exposure-check job (spec §5 ordering
    /// guarantee: index writes complete before the job is visible to C5).
    /// CONFIRMS vectors are written only for time-bound thoughts (predictions);
    /// INVALIDATES vectors are written for any memory carrying `invalidates_if`,
    /// observations included (spec §6.1 allows observations their own conditions).
    async fn index_and_enqueue(&self, memory: &Memory) -> Result<(), EngineError> {
        let embedding = self.judge.embed(&memory.content).await?;

        self.index
            .upsert(
                IndexName::Memory,
                &memory.id,
                embedding.clone(),
                json!({ "type": memory.kind().as_str(), "memory_id": memory.id }),
            )
            .await
            .map_err(EngineError::Index)?;

        for (i, condition) in memory.invalidates_if.iter().enumerate() {
            let vector = self.judge.embed(condition).await?;
            self.index
                .upsert(IndexName::Invalidates, &invalidates_id(&memory.id, i), vector, json!({ "memory_id": memory.id, "condition": condition }))
                .await
                .map_err(EngineError::Index)?;
        }

        if memory.is_time_bound() {
            for (i, condition) in memory.confirms_if.iter().enumerate() {
                let vector = self.judge.embed(condition).await?;
                self.index
                    .upsert(IndexName::Confirms, &confirms_id(&memory.id, i), vector, json!({ "memory_id": memory.id, "condition": condition }))
                    .await
                    .map_err(EngineError::Index)?;
            }
        }

        let job = IntakeJob {
            memory_id: memory.id.clone(),
            is_observation: memory.is_observation(),
            content: memory.content.clone(),
            embedding,
            invalidates_if: memory.invalidates_if.clone(),
            confirms_if: memory.confirms_if.clone(),
            time_bound: memory.is_time_bound(),
            session_id: memory.session_id.clone(),
            request_id: None,
            timestamp: memory.created_at,
            attempt: 0,
        };
        self.intake.enqueue(job).map_err(EngineError::Intake)
    }

    /// `create_observation(content, source, tags?, invalidates_if?, confirms_if?)`,
    /// spec §6.1.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_observation(
        &self,
        content: String,
        source: Source,
        tags: std::collections::BTreeSet<String>,
        invalidates_if: Vec<String>,
        confirms_if: Vec<String>,
        session_id: Option<String>,
        request_id: Option<String>,
    ) -> Result<CreateObservationResult, EngineError> {
        if content.trim().is_empty() {
            return Err(EngineError::Validation("content must not be empty".to_string()));
        }
        if has_reserved_tag(&tags) {
            return Err(EngineError::Validation("tags must not carry a reserved resolution tag".to_string()));
        }
        let draft = MemoryDraft {
            content,
            tags,
            source: Some(source),
            invalidates_if,
            confirms_if,
            session_id,
            request_id,
            ..Default::default()
        };
        let memory = self.storage.create_memory(draft).await?;
        self.index_and_enqueue(&memory).await?;
        Ok(CreateObservationResult { id: memory.id, exposure_check: "queued" })
    }

    /// `create_thought(content, derived_from[>=1], invalidates_if?, confirms_if?,
    /// assumes?, resolves_by?, outcome_condition?, tags?)`, spec §6.1. Creates one
    /// `derived_from` edge per parent (child -> parent) since `create_memory` only
    /// tracks centrality, not the edge itself.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_thought(
        &self,
        content: String,
        derived_from: Vec<String>,
        invalidates_if: Vec<String>,
        confirms_if: Vec<String>,
        assumes: Vec<String>,
        resolves_by: Option<DateTime<Utc>>,
        outcome_condition: Option<String>,
        tags: std::collections::BTreeSet<String>,
        session_id: Option<String>,
        request_id: Option<String>,
    ) -> Result<CreateThoughtResult, EngineError> {
        if content.trim().is_empty() {
            return Err(EngineError::Validation("content must not be empty".to_string()));
        }
        if derived_from.is_empty() {
            return Err(EngineError::Validation("derived_from must name at least one memory".to_string()));
        }
        if has_reserved_tag(&tags) {
            return Err(EngineError::Validation("tags must not carry a reserved resolution tag".to_string()));
        }
        let draft = MemoryDraft {
            content,
            tags,
            derived_from: derived_from.clone(),
            invalidates_if,
            confirms_if,
            assumes,
            resolves_by,
            outcome_condition,
            session_id,
            request_id,
            ..Default::default()
        };
        let memory = self.storage.create_memory(draft).await?;
        for parent in &derived_from {
            self.storage.create_edge(&memory.id, parent, EdgeType::DerivedFrom, 0.8).await?;
        }
        self.index_and_enqueue(&memory).await?;
        Ok(CreateThoughtResult { id: memory.id.clone(), time_bound: memory.is_time_bound(), exposure_check: "queued" })
    }

    /// `confirm(id, observation_id?, notes?)`: the terminal manual confirmation
    /// (spec §3.3 `active -> confirmed`), distinct from the non-terminal evidence
    /// bump the exposure checker applies on a `relevantButNotViolation` match.
    /// `notes` has no persisted field in the data model (spec §6.6); it is logged
    /// only.
    pub async fn confirm(&self, id: &str, observation_id: Option<&str>, notes: Option<&str>) -> Result<Memory, EngineError> {
        if let Some(notes) = notes {
            tracing::info!(memory_id = %id, notes, "manual confirmation");
        }
        self.checker.record_manual_confirmation(id, observation_id).await?;
        Ok(self.storage.mark_confirmed(id).await?)
    }

    /// `violate(id, condition, observation_id?, notes?)`: an operator-asserted
    /// violation, running the same decay/shock/notify/cascade pipeline an
    /// exposure-discovered one does.
    pub async fn violate(&self, id: &str, condition: &str, observation_id: Option<&str>, notes: Option<&str>, session_id: Option<&str>) -> Result<Memory, EngineError> {
        if let Some(notes) = notes {
            tracing::info!(memory_id = %id, notes, "manual violation");
        }
        Ok(self.checker.record_manual_violation(id, condition, observation_id, session_id).await?)
    }

    /// `retract(id, reason, correcting_observation_id?)`. A `correcting_observation_id`
    /// additionally sets `outcome=superseded, state=resolved` (spec §9 open
    /// question: the one creation path the spec names for that outcome).
    pub async fn retract(&self, id: &str, reason: &str, correcting_observation_id: Option<&str>) -> Result<Memory, EngineError> {
        let memory = self.storage.get(id).await?.ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        self.storage.retract(id, reason).await?;

        // Per spec invariant 6: a retracted memory must no longer be discoverable
        // in MEMORY, nor keep any row in INVALIDATES/CONFIRMS under its id prefix.
        self.index.delete_by_ids(IndexName::Memory, &[id.to_string()]).await?;
        let condition_ids = self
            .storage
            .list_condition_ids(id, memory.invalidates_if.len(), memory.confirms_if.len())
            .await?;
        let inv_ids: Vec<String> = condition_ids.iter().filter(|i| i.contains(":inv:")).cloned().collect();
        let conf_ids: Vec<String> = condition_ids.iter().filter(|i| i.contains(":conf:")).cloned().collect();
        self.index.delete_by_ids(IndexName::Invalidates, &inv_ids).await?;
        self.index.delete_by_ids(IndexName::Confirms, &conf_ids).await?;

        if correcting_observation_id.is_some() {
            return Ok(self.storage.mark_superseded(id).await?);
        }
        self.storage.get(id).await?.ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    /// `find(query, filter?, limit?, min_similarity?, include_retracted?)`: a
    /// semantic search over the MEMORY index, filtered by the requested type and
    /// post-filtered for retraction (the index itself carries no retraction state).
    pub async fn find(&self, params: FindParams) -> Result<Vec<FindHit>, EngineError> {
        let vector = self.judge.embed(&params.query).await?;
        let memory_type = if params.observations_only {
            Some("observation".to_string())
        } else if params.thoughts_only {
            Some("thought".to_string())
        } else if params.predictions_only {
            Some("prediction".to_string())
        } else {
            None
        };
        let limit = params.limit.unwrap_or(20).max(1);
        let min_sim = params.min_similarity.unwrap_or(self.config.exposure.min_similarity);
        // Over-fetch since retracted hits are dropped after the index query.
        let hits = self.index.query(IndexName::Memory, &vector, limit * 4, min_sim, Some(IndexFilter { memory_type })).await?;

        let mut out = Vec::with_capacity(limit);
        for hit in hits {
            let Some(memory) = self.storage.get(&hit.id).await? else { continue };
            if memory.retracted && !params.include_retracted {
                continue;
            }
            out.push(FindHit { memory, score: hit.score });
            if out.len() >= limit {
                break;
            }
        }
        Ok(out)
    }

    /// `recall(id)`: fetch and record an access (spec §6.1/§6.6 `memory_access`).
    pub async fn recall(&self, id: &str) -> Result<Memory, EngineError> {
        let memory = self.storage.get(id).await?.ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        self.storage.record_access(id, Utc::now()).await?;
        Ok(memory)
    }

    /// `reference(id, direction, depth)`: a bounded-depth walk over support edges
    /// (`derived_from`/`confirmed_by`) from `id`.
    pub async fn reference(&self, id: &str, direction: Direction, depth: u32) -> Result<Vec<Memory>, EngineError> {
        let mut visited = HashSet::new();
        visited.insert(id.to_string());
        let mut frontier = vec![id.to_string()];
        let mut out = Vec::new();

        for _ in 0..depth {
            let mut next = Vec::new();
            for node in &frontier {
                let edges = self.storage.get_edges(node).await?;
                for edge in edges {
                    if !edge.edge_type.is_support() {
                        continue;
                    }
                    let neighbor = match direction {
                        Direction::Up if &edge.source_id == node => Some(edge.target_id),
                        Direction::Down if &edge.target_id == node => Some(edge.source_id),
                        Direction::Both if &edge.source_id == node => Some(edge.target_id),
                        Direction::Both if &edge.target_id == node => Some(edge.source_id),
                        _ => None,
                    };
                    if let Some(n) = neighbor {
                        if visited.insert(n.clone()) {
                            next.push(n);
                        }
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            for n in &next {
                if let Some(m) = self.storage.get(n).await? {
                    out.push(m);
                }
            }
            frontier = next;
        }
        Ok(out)
    }

    /// `roots(id)`: walk `derived_from`/`confirmed_by` edges upward until no
    /// further parent exists; returns the terminal nodes (typically observations).
    pub async fn roots(&self, id: &str) -> Result<Vec<Memory>, EngineError> {
        let mut visited = HashSet::new();
        visited.insert(id.to_string());
        let mut frontier = vec![id.to_string()];
        let mut roots = Vec::new();

        while let Some(node) = frontier.pop() {
            let edges = self.storage.get_edges(&node).await?;
            let parents: Vec<String> = edges.iter().filter(|e| e.edge_type.is_support() && e.source_id == node).map(|e| e.target_id.clone()).collect();
            if parents.is_empty() {
                if let Some(m) = self.storage.get(&node).await? {
                    roots.push(m);
                }
            } else {
                for parent in parents {
                    if visited.insert(parent.clone()) {
                        frontier.push(parent);
                    }
                }
            }
        }
        Ok(roots)
    }

    /// `between(ids[>=2], limit)`: the intersection of each id's upward ancestor
    /// closure, capped at `limit` nodes per closure to bound the walk.
    pub async fn between(&self, ids: &[String], limit: usize) -> Result<Vec<Memory>, EngineError> {
        if ids.len() < 2 {
            return Err(EngineError::Validation("between requires at least two ids".to_string()));
        }
        let mut closures = Vec::with_capacity(ids.len());
        for id in ids {
            closures.push(self.ancestor_closure(id, limit.max(1)).await?);
        }
        let mut intersection = closures[0].clone();
        for other in &closures[1..] {
            intersection.retain(|n| other.contains(n));
        }

        let mut out = Vec::new();
        for id in intersection.into_iter().take(limit.max(1)) {
            if let Some(m) = self.storage.get(&id).await? {
                out.push(m);
            }
        }
        Ok(out)
    }

    async fn ancestor_closure(&self, id: &str, cap: usize) -> Result<HashSet<String>, EngineError> {
        let mut visited = HashSet::new();
        visited.insert(id.to_string());
        let mut frontier = vec![id.to_string()];
        while let Some(node) = frontier.pop() {
            if visited.len() >= cap {
                break;
            }
            let edges = self.storage.get_edges(&node).await?;
            for edge in edges {
                if edge.edge_type.is_support() && edge.source_id == node && visited.insert(edge.target_id.clone()) {
                    frontier.push(edge.target_id);
                }
            }
        }
        Ok(visited)
    }

    /// `pending(overdue?)`: predictions not yet resolved, split by whether
    /// `resolves_by` has already passed.
    pub async fn pending(&self, overdue: bool) -> Result<Vec<Memory>, EngineError> {
        let predictions = self.storage.find_by_query(MemoryQuery { predictions_only: true, ..Default::default() }).await?;
        let now = Utc::now();
        Ok(predictions
            .into_iter()
            .filter(|m| m.resolved_at.is_none())
            .filter(|m| match m.resolves_by {
                Some(t) if overdue => t <= now,
                Some(t) => t > now,
                None => false,
            })
            .collect())
    }

    /// `insights(view)`: operator-facing aggregate views (spec §6.1/§7).
    pub async fn insights(&self, view: InsightsView) -> Result<InsightsReport, EngineError> {
        match view {
            InsightsView::Overview => {
                let all = self.storage.find_by_query(MemoryQuery::default()).await?;
                let mut by_kind = HashMap::new();
                let mut by_state = HashMap::new();
                for m in &all {
                    *by_kind.entry(m.kind().as_str().to_string()).or_insert(0u32) += 1;
                    *by_state.entry(format!("{:?}", m.state)).or_insert(0u32) += 1;
                }
                Ok(InsightsReport::Overview { total: all.len(), by_kind, by_state })
            }
            InsightsView::ExposureBacklog => {
                let all = self.storage.find_by_query(MemoryQuery::default()).await?;
                let ids = all
                    .into_iter()
                    .filter(|m| !matches!(m.exposure_check_status, verity_core::memory::ExposureCheckStatus::Completed | verity_core::memory::ExposureCheckStatus::Skipped))
                    .map(|m| m.id)
                    .collect();
                Ok(InsightsReport::ExposureBacklog { ids })
            }
            InsightsView::Robustness => {
                let stats = self.storage.system_stats().await?;
                let all = self.storage.find_by_query(MemoryQuery::default()).await?;
                let mut tiers = HashMap::new();
                for m in &all {
                    let effective = verity_confidence::effective_for_memory(m, &stats);
                    let tier = verity_confidence::robustness(m.times_tested, effective, &self.config.confidence);
                    *tiers.entry(format!("{:?}", tier)).or_insert(0u32) += 1;
                }
                Ok(InsightsReport::Robustness { tiers })
            }
        }
    }

    /// `stats()`: the raw nightly-recomputed system stats (spec §6.1).
    pub async fn stats(&self) -> Result<SystemStats, EngineError> {
        Ok(self.storage.system_stats().await?)
    }

    /// Run the minute-cadence scheduler tick (spec §4.10): dispatch every
    /// inactive session's claimed batch.
    pub async fn run_minute_tick(&self) -> Result<MinuteTickReport, EngineError> {
        Ok(verity_scheduler::run_minute_tick(self.queue.as_ref(), self.resolver.as_ref(), &self.config.scheduler, &self.config.dispatch).await?)
    }

    /// Run the daily-cadence scheduler tick (spec §4.10): recompute track
    /// records, run the whole-graph shock pass, enqueue overdue predictions.
    pub async fn run_daily_tick(&self) -> Result<DailyTickReport, EngineError> {
        Ok(verity_scheduler::run_daily_tick(self.storage.as_ref(), self.queue.as_ref(), &self.config.shock).await?)
    }
}
