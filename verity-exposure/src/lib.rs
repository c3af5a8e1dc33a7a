//! The Exposure Checker (C5, spec §4.5) — the largest component: bidirectional
//! semantic matching between new content and existing conditions, with
//! concurrent candidate pipelines and race-free batched writes. Generic over the
//! four component seams (`MemoryStorage`, `VectorIndex`, the combined
//! `EmbeddingProvider + Judge`, and `EventQueue`) rather than trait objects,
//! since those traits use `async_fn_in_trait` and are not object-safe — this
//! mirrors the teacher's preference for static generic dispatch over `dyn Trait`
//! at hot-path seams.

use std::sync::Arc;

use uuid::Uuid;

use verity_cascade::{propagate_resolution, CascadeOutcome};
use verity_core::config::{ExposureConfig, ShockConfig};
use verity_core::edge::EdgeType;
use verity_core::errors::ExposureError;
use verity_core::event::{Event, EventType};
use verity_core::memory::{DamageLevel, Memory, MemoryState, Violation};
use verity_core::notification::{Notification, NotificationKind};
use verity_core::traits::{
    ConditionKind, EmbeddingProvider, EventQueue, IndexFilter, IndexName, Judge, MemoryStorage, VectorIndex,
};
use verity_storage::queries::memory_ops::make_violation;

/// Outcome summary of one `check_exposures` or `check_exposures_for_new_thought`
/// call, useful for logging/insights.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ExposureOutcome {
    pub violations_recorded: usize,
    pub confirmations_recorded: usize,
    pub auto_confirmed: bool,
}

/// Advisory zone-health summary, per spec §4.5.4. Purely informational.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ZoneHealth {
    pub neighborhood_size: usize,
    pub quality_pct: f64,
    pub balanced: bool,
}

pub struct ExposureChecker<S, I, J, Q> {
    storage: Arc<S>,
    index: Arc<I>,
    judge: Arc<J>,
    queue: Arc<Q>,
    config: ExposureConfig,
    shock_config: ShockConfig,
}

impl<S, I, J, Q> ExposureChecker<S, I, J, Q>
where
    S: MemoryStorage,
    I: VectorIndex,
    J: EmbeddingProvider + Judge,
    Q: EventQueue,
{
    pub fn new(storage: Arc<S>, index: Arc<I>, judge: Arc<J>, queue: Arc<Q>, config: ExposureConfig, shock_config: ShockConfig) -> Self {
        Self { storage, index, judge, queue, config, shock_config }
    }

    /// Observation entry (spec §4.5.1): a newly created observation is matched
    /// against every thought/prediction's `invalidates_if`/`confirms_if` condition
    /// vectors.
    pub async fn check_exposures(
        &self,
        obs_id: &str,
        _content: &str,
        embedding: &[f32],
        session_id: Option<&str>,
    ) -> Result<ExposureOutcome, ExposureError> {
        let obs = self.storage.get(obs_id).await.map_err(ExposureError::Storage)?;
        let Some(obs) = obs else { return Ok(ExposureOutcome::default()) };
        if obs.has_reserved_tag() {
            return Ok(ExposureOutcome::default());
        }

        let (invalidate_hits, confirm_hits) = tokio::join!(
            self.index.query(
                IndexName::Invalidates,
                embedding,
                self.config.max_candidates,
                self.config.min_similarity,
                None::<IndexFilter>,
            ),
            self.index.query(
                IndexName::Confirms,
                embedding,
                self.config.max_candidates,
                self.config.min_similarity,
                None::<IndexFilter>,
            ),
        );
        let invalidate_hits = invalidate_hits.map_err(ExposureError::Index)?;
        let confirm_hits = confirm_hits.map_err(ExposureError::Index)?;

        // Dedup by memory_id; invalidation candidates take precedence.
        let mut seen = std::collections::HashSet::new();
        let mut invalidate_candidates = Vec::new();
        for hit in invalidate_hits {
            let Some(mid) = hit.meta.get("memory_id").and_then(|v| v.as_str()) else { continue };
            if seen.insert(mid.to_string()) {
                invalidate_candidates.push((mid.to_string(), hit));
            }
        }
        let mut confirm_candidates = Vec::new();
        for hit in confirm_hits {
            let Some(mid) = hit.meta.get("memory_id").and_then(|v| v.as_str()) else { continue };
            if seen.insert(mid.to_string()) {
                confirm_candidates.push((mid.to_string(), hit));
            }
        }

        let mut outcome = ExposureOutcome::default();

        for (memory_id, hit) in invalidate_candidates {
            let Some(candidate) = self.fetch_live_candidate(&memory_id).await? else { continue };
            let condition = hit.meta.get("condition").and_then(|v| v.as_str()).unwrap_or_default();
            let verdict = self
                .judge
                .judge(ConditionKind::InvalidatesIf, condition, &obs.content)
                .await
                .map_err(ExposureError::Embedding)?;

            if verdict.matches && verdict.confidence >= self.config.violation_confidence_threshold {
                let damage_level = verity_confidence::damage_level(candidate.centrality);
                let violation = make_violation(
                    condition.to_string(),
                    obs_id.to_string(),
                    damage_level,
                    verity_core::memory::ViolationSource::Direct,
                    None,
                );
                let recorded = self
                    .storage
                    .record_violations_batch(&candidate.id, vec![violation])
                    .await
                    .map_err(ExposureError::Storage)?;
                self.storage
                    .create_edge(obs_id, &candidate.id, EdgeType::ViolatedBy, 1.0)
                    .await
                    .map_err(ExposureError::Storage)?;
                self.finish_violation(&recorded, damage_level, session_id).await?;
                outcome.violations_recorded += 1;
            } else if verdict.relevant_but_not_violation {
                self.confirm(&candidate.id, obs_id).await?;
                outcome.confirmations_recorded += 1;
            }
        }

        for (memory_id, hit) in confirm_candidates {
            let Some(candidate) = self.fetch_live_candidate(&memory_id).await? else { continue };
            let condition = hit.meta.get("condition").and_then(|v| v.as_str()).unwrap_or_default();
            let verdict = self
                .judge
                .judge(ConditionKind::ConfirmsIf, condition, &obs.content)
                .await
                .map_err(ExposureError::Embedding)?;

            if verdict.matches && verdict.confidence >= self.config.confirm_confidence_threshold {
                if candidate.is_time_bound() && candidate.state == MemoryState::Active {
                    self.auto_confirm(&candidate, obs_id, session_id).await?;
                    outcome.auto_confirmed = true;
                } else {
                    self.confirm(&candidate.id, obs_id).await?;
                    outcome.confirmations_recorded += 1;
                }
            }
        }

        Ok(outcome)
    }

    /// Thought entry (spec §4.5.2): a newly created thought/prediction's own
    /// conditions are matched against existing observations.
    pub async fn check_exposures_for_new_thought(
        &self,
        mid: &str,
        invalidates_if: &[String],
        confirms_if: &[String],
        time_bound: bool,
        session_id: Option<&str>,
    ) -> Result<ExposureOutcome, ExposureError> {
        let mut violations: Vec<Violation> = Vec::new();
        let mut confirmations: Vec<String> = Vec::new();
        let mut auto_confirm_obs: Option<String> = None;

        'conditions: for condition in invalidates_if {
            let vector = self.judge.embed(condition).await.map_err(ExposureError::Embedding)?;
            let hits = self
                .index
                .query(
                    IndexName::Memory,
                    &vector,
                    self.config.max_candidates,
                    self.config.min_similarity,
                    Some(IndexFilter { memory_type: Some("observation".to_string()) }),
                )
                .await
                .map_err(ExposureError::Index)?;

            for hit in hits {
                let Some(obs) = self.storage.get(&hit.id).await.map_err(ExposureError::Storage)? else { continue };
                if obs.has_reserved_tag() {
                    continue;
                }
                let verdict = self
                    .judge
                    .judge(ConditionKind::InvalidatesIf, condition, &obs.content)
                    .await
                    .map_err(ExposureError::Embedding)?;

                if verdict.matches && verdict.confidence >= self.config.violation_confidence_threshold {
                    violations.push(make_violation(
                        condition.clone(),
                        obs.id.clone(),
                        DamageLevel::Peripheral, // real damage_level is computed once on `mid` below
                        verity_core::memory::ViolationSource::Direct,
                        None,
                    ));
                    continue 'conditions;
                } else if verdict.relevant_but_not_violation {
                    confirmations.push(obs.id.clone());
                    continue 'conditions;
                }
            }
        }

        if time_bound {
            'confirm_conditions: for condition in confirms_if {
                if auto_confirm_obs.is_some() {
                    break;
                }
                let vector = self.judge.embed(condition).await.map_err(ExposureError::Embedding)?;
                let hits = self
                    .index
                    .query(
                        IndexName::Memory,
                        &vector,
                        self.config.max_candidates,
                        self.config.min_similarity,
                        Some(IndexFilter { memory_type: Some("observation".to_string()) }),
                    )
                    .await
                    .map_err(ExposureError::Index)?;
                for hit in hits {
                    let Some(obs) = self.storage.get(&hit.id).await.map_err(ExposureError::Storage)? else { continue };
                    if obs.has_reserved_tag() {
                        continue;
                    }
                    let verdict = self
                        .judge
                        .judge(ConditionKind::ConfirmsIf, condition, &obs.content)
                        .await
                        .map_err(ExposureError::Embedding)?;
                    if verdict.matches && verdict.confidence >= self.config.confirm_confidence_threshold {
                        auto_confirm_obs = Some(obs.id.clone());
                        continue 'confirm_conditions;
                    }
                }
            }
        }

        let mut outcome = ExposureOutcome::default();

        // Single atomic read-modify-write on `mid` avoids lost-update races
        // between the condition pipelines that ran above.
        if !violations.is_empty() {
            let mid_memory = self.storage.get(mid).await.map_err(ExposureError::Storage)?;
            let damage_level = mid_memory.as_ref().map(|m| verity_confidence::damage_level(m.centrality)).unwrap_or(DamageLevel::Peripheral);
            let violations: Vec<Violation> =
                violations.into_iter().map(|mut v| { v.damage_level = damage_level; v }).collect();
            let n = violations.len();
            let recorded = self.storage.record_violations_batch(mid, violations.clone()).await.map_err(ExposureError::Storage)?;
            for v in &violations {
                self.storage.create_edge(&v.obs_id, mid, EdgeType::ViolatedBy, 1.0).await.map_err(ExposureError::Storage)?;
            }
            self.finish_violation(&recorded, damage_level, session_id).await?;
            outcome.violations_recorded += n;
        }

        for obs_id in &confirmations {
            self.confirm(mid, obs_id).await?;
            outcome.confirmations_recorded += 1;
        }

        if let Some(obs_id) = auto_confirm_obs {
            if let Some(candidate) = self.storage.get(mid).await.map_err(ExposureError::Storage)? {
                self.auto_confirm(&candidate, &obs_id, session_id).await?;
                outcome.auto_confirmed = true;
            }
        }

        Ok(outcome)
    }

    /// Manual terminal violation (spec §6.1 `violate`): an operator asserts a
    /// condition directly, bypassing judge matching. Runs the same side-effect
    /// pipeline as an exposure-discovered violation (decay, shock, notify, cascade).
    pub async fn record_manual_violation(
        &self,
        memory_id: &str,
        condition: &str,
        obs_id: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<Memory, ExposureError> {
        let memory = self
            .storage
            .get(memory_id)
            .await
            .map_err(ExposureError::Storage)?
            .ok_or_else(|| ExposureError::Storage(verity_core::errors::StorageError::NotFound { id: memory_id.to_string() }))?;
        let damage_level = verity_confidence::damage_level(memory.centrality);
        let resolved_obs_id = obs_id.map(|s| s.to_string()).unwrap_or_else(|| format!("manual:{}", Uuid::new_v4()));
        let violation = make_violation(condition.to_string(), resolved_obs_id, damage_level, verity_core::memory::ViolationSource::Direct, None);
        let recorded = self.storage.record_violations_batch(memory_id, vec![violation]).await.map_err(ExposureError::Storage)?;
        if let Some(obs) = obs_id {
            self.storage.create_edge(obs, memory_id, EdgeType::ViolatedBy, 1.0).await.map_err(ExposureError::Storage)?;
        }
        self.finish_violation(&recorded, damage_level, session_id).await?;
        self.storage.get(memory_id).await.map_err(ExposureError::Storage)?.ok_or_else(|| {
            ExposureError::Storage(verity_core::errors::StorageError::NotFound { id: memory_id.to_string() })
        })
    }

    /// Manual non-terminal confirmation bump (spec §6.1 `confirm`'s evidence-count
    /// side effect). Callers that also want the terminal `active -> confirmed`
    /// state transition follow this with `MemoryStorage::mark_confirmed`.
    pub async fn record_manual_confirmation(&self, memory_id: &str, obs_id: Option<&str>) -> Result<Memory, ExposureError> {
        let memory = self.storage.record_confirmation(memory_id).await.map_err(ExposureError::Storage)?;
        if let Some(obs) = obs_id {
            self.storage.create_edge(obs, memory_id, EdgeType::ConfirmedBy, 1.0).await.map_err(ExposureError::Storage)?;
            self.storage.boost_outgoing_support_edges(memory_id, 1.1).await.map_err(ExposureError::Storage)?;
        }
        Ok(memory)
    }

    /// Zone health, spec §4.5.4: a depth-2 `derived_from`/`confirmed_by` walk,
    /// advisory and non-blocking.
    pub async fn zone_health(&self, memory_id: &str) -> Result<ZoneHealth, ExposureError> {
        const MAX_SIZE: usize = 20;
        let mut visited = std::collections::HashSet::new();
        visited.insert(memory_id.to_string());
        let mut frontier = std::collections::VecDeque::new();
        frontier.push_back((memory_id.to_string(), 0u32));
        let mut neighborhood = Vec::new();

        while let Some((id, depth)) = frontier.pop_front() {
            if neighborhood.len() >= MAX_SIZE {
                break;
            }
            if depth >= 2 {
                continue;
            }
            let edges = self.storage.get_edges(&id).await.map_err(ExposureError::Storage)?;
            for e in edges {
                if !e.edge_type.is_support() {
                    continue;
                }
                let other = if e.source_id == id { e.target_id } else { e.source_id };
                if visited.insert(other.clone()) {
                    neighborhood.push(other.clone());
                    frontier.push_back((other, depth + 1));
                    if neighborhood.len() >= MAX_SIZE {
                        break;
                    }
                }
            }
        }

        let stats = self.storage.system_stats().await.map_err(ExposureError::Storage)?;
        let mut violated_count = 0usize;
        let mut quality_count = 0usize;
        for id in &neighborhood {
            let Some(m) = self.storage.get(id).await.map_err(ExposureError::Storage)? else { continue };
            if m.state == MemoryState::Violated {
                violated_count += 1;
            }
            let effective = verity_confidence::effective_for_memory(&m, &stats);
            if effective >= 0.6 {
                quality_count += 1;
            }
        }
        let quality_pct = if neighborhood.is_empty() { 100.0 } else { (quality_count as f64 / neighborhood.len() as f64) * 100.0 };
        let dominant_violated_cluster = !neighborhood.is_empty() && violated_count * 2 > neighborhood.len();
        let balanced = quality_pct >= 50.0 && !dominant_violated_cluster;

        Ok(ZoneHealth { neighborhood_size: neighborhood.len(), quality_pct, balanced })
    }

    async fn fetch_live_candidate(&self, memory_id: &str) -> Result<Option<Memory>, ExposureError> {
        let Some(m) = self.storage.get(memory_id).await.map_err(ExposureError::Storage)? else { return Ok(None) };
        if m.state != MemoryState::Active {
            return Ok(None);
        }
        if self.queue.has_pending_resolution(&m.id).await.map_err(ExposureError::Events)? {
            return Ok(None);
        }
        Ok(Some(m))
    }

    async fn confirm(&self, memory_id: &str, obs_id: &str) -> Result<(), ExposureError> {
        self.storage.record_confirmation(memory_id).await.map_err(ExposureError::Storage)?;
        self.storage.create_edge(obs_id, memory_id, EdgeType::ConfirmedBy, 1.0).await.map_err(ExposureError::Storage)?;
        self.storage.boost_outgoing_support_edges(memory_id, 1.1).await.map_err(ExposureError::Storage)?;
        Ok(())
    }

    async fn auto_confirm(&self, candidate: &Memory, obs_id: &str, session_id: Option<&str>) -> Result<(), ExposureError> {
        self.storage.auto_confirm(&candidate.id).await.map_err(ExposureError::Storage)?;
        self.storage
            .create_edge(obs_id, &candidate.id, EdgeType::ConfirmedBy, 1.0)
            .await
            .map_err(ExposureError::Storage)?;
        self.purge_condition_vectors(candidate).await?;

        let event = Event {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.map(|s| s.to_string()),
            event_type: EventType::prediction_confirmed(),
            memory_id: candidate.id.clone(),
            violated_by: None,
            damage_level: None,
            context: serde_json::json!({ "confirming_obs_id": obs_id }),
            created_at: chrono::Utc::now(),
            dispatched: false,
            dispatched_at: None,
            claim_id: None,
        };
        self.queue.queue(event).await.map_err(ExposureError::Events)?;

        if let Err(err) =
            propagate_resolution(self.storage.as_ref(), self.queue.as_ref(), &candidate.id, CascadeOutcome::Correct, session_id).await
        {
            tracing::error!(memory_id = %candidate.id, error = %err, "cascade propagation failed; continuing without it");
        }
        Ok(())
    }

    async fn purge_condition_vectors(&self, memory: &Memory) -> Result<(), ExposureError> {
        let ids = self
            .storage
            .list_condition_ids(&memory.id, memory.invalidates_if.len(), memory.confirms_if.len())
            .await
            .map_err(ExposureError::Storage)?;
        let inv_ids: Vec<String> = ids.iter().filter(|i| i.contains(":inv:")).cloned().collect();
        let conf_ids: Vec<String> = ids.iter().filter(|i| i.contains(":conf:")).cloned().collect();
        self.index.delete_by_ids(IndexName::Invalidates, &inv_ids).await.map_err(ExposureError::Index)?;
        self.index.delete_by_ids(IndexName::Confirms, &conf_ids).await.map_err(ExposureError::Index)?;
        Ok(())
    }

    /// Side effects common to both entry points once a violation is recorded on
    /// `recorded` (spec §4.5.3).
    async fn finish_violation(&self, recorded: &Memory, damage_level: DamageLevel, session_id: Option<&str>) -> Result<(), ExposureError> {
        self.purge_condition_vectors(recorded).await?;

        let factor = match damage_level {
            DamageLevel::Core => 0.5,
            DamageLevel::Peripheral => 0.25,
        };
        self.storage.decay_outgoing_support_edges(&recorded.id, factor).await.map_err(ExposureError::Storage)?;

        // Shock failure must never block the violation mutation already committed
        // above (spec §7): log and fall back to an empty result for the notification
        // message below rather than propagating, which would otherwise send this
        // whole job back through C11's retry and re-run the non-idempotent decay/
        // event/notification/cascade steps above a second time.
        let shock_result = match verity_shock::apply_shock(self.storage.as_ref(), &recorded.id, damage_level, &self.shock_config).await {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(memory_id = %recorded.id, error = %err, "shock propagation failed; continuing without it");
                verity_shock::ShockResult {
                    affected_count: 0,
                    max_confidence_drop: 0.0,
                    top_affected: Vec::new(),
                    iterations: 0,
                    spectral_radius: 0.0,
                    backtrack_attempts: 0,
                }
            }
        };

        let event = Event {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.map(|s| s.to_string()),
            event_type: EventType::violation(),
            memory_id: recorded.id.clone(),
            violated_by: recorded.violations.last().map(|v| v.obs_id.clone()),
            damage_level: Some(damage_level),
            context: serde_json::json!({}),
            created_at: chrono::Utc::now(),
            dispatched: false,
            dispatched_at: None,
            claim_id: None,
        };
        self.queue.queue(event).await.map_err(ExposureError::Events)?;

        if damage_level == DamageLevel::Core {
            self.storage
                .insert_notification(Notification {
                    id: Uuid::new_v4().to_string(),
                    kind: NotificationKind::CoreViolation,
                    memory_id: recorded.id.clone(),
                    message: format!(
                        "core violation on \"{}\" (affected={}, max_confidence_drop={:.3})",
                        truncate(&recorded.content, 120),
                        shock_result.affected_count,
                        shock_result.max_confidence_drop,
                    ),
                    created_at: chrono::Utc::now(),
                })
                .await
                .map_err(ExposureError::Storage)?;
        } else {
            let health = self.zone_health(&recorded.id).await?;
            if !health.balanced || health.quality_pct < 50.0 {
                self.storage
                    .insert_notification(Notification {
                        id: Uuid::new_v4().to_string(),
                        kind: NotificationKind::PeripheralViolation,
                        memory_id: recorded.id.clone(),
                        message: format!(
                            "peripheral violation on \"{}\" (zone quality={:.1}%)",
                            truncate(&recorded.content, 120),
                            health.quality_pct,
                        ),
                        created_at: chrono::Utc::now(),
                    })
                    .await
                    .map_err(ExposureError::Storage)?;
            }
        }

        // Cascade failure is likewise logged, never blocking (spec §7).
        let outcome = if damage_level == DamageLevel::Core { CascadeOutcome::Incorrect } else { CascadeOutcome::Void };
        if let Err(err) = propagate_resolution(self.storage.as_ref(), self.queue.as_ref(), &recorded.id, outcome, session_id).await {
            tracing::error!(memory_id = %recorded.id, error = %err, "cascade propagation failed; continuing without it");
        }

        Ok(())
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}…", &s[..max])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verity_core::memory::{MemoryDraft, Source};
    use verity_embedding::{EmbeddingClient, HttpClientConfig};
    use verity_events::StorageEventQueue;
    use verity_index::InProcessVectorIndex;
    use verity_storage::StorageEngine;

    fn checker() -> ExposureChecker<StorageEngine, InProcessVectorIndex, EmbeddingClient, StorageEventQueue> {
        let storage = Arc::new(StorageEngine::open_in_memory().unwrap());
        let index = Arc::new(InProcessVectorIndex::new());
        let judge = Arc::new(EmbeddingClient::new(HttpClientConfig::default()));
        let queue = Arc::new(StorageEventQueue::new(storage.clone()));
        ExposureChecker::new(storage, index, judge, queue, ExposureConfig::default(), ShockConfig::default())
    }

    #[tokio::test]
    async fn check_exposures_skips_reserved_tag_observations() {
        let checker = checker();
        let mut tags = std::collections::BTreeSet::new();
        tags.insert("resolution".to_string());
        let obs = checker
            .storage
            .create_memory(MemoryDraft { content: "x".into(), source: Some(Source::Human), tags, ..Default::default() })
            .await
            .unwrap();
        let outcome = checker.check_exposures(&obs.id, "x", &[0.0; 8], None).await.unwrap();
        assert_eq!(outcome.violations_recorded, 0);
        assert_eq!(outcome.confirmations_recorded, 0);
    }

    #[tokio::test]
    async fn check_exposures_for_new_thought_with_no_conditions_is_a_noop() {
        let checker = checker();
        let obs = checker
            .storage
            .create_memory(MemoryDraft { content: "root".into(), source: Some(Source::Human), ..Default::default() })
            .await
            .unwrap();
        let thought = checker
            .storage
            .create_memory(MemoryDraft { content: "derived".into(), derived_from: vec![obs.id.clone()], ..Default::default() })
            .await
            .unwrap();
        let outcome = checker
            .check_exposures_for_new_thought(&thought.id, &[], &[], false, None)
            .await
            .unwrap();
        assert_eq!(outcome.violations_recorded, 0);
    }

    #[tokio::test]
    async fn zone_health_on_isolated_node_is_balanced_with_no_neighbors() {
        let checker = checker();
        let obs = checker
            .storage
            .create_memory(MemoryDraft { content: "root".into(), source: Some(Source::Human), ..Default::default() })
            .await
            .unwrap();
        let health = checker.zone_health(&obs.id).await.unwrap();
        assert_eq!(health.neighborhood_size, 0);
        assert!(health.balanced);
    }
}
