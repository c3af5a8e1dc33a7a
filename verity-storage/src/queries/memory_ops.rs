//! create/get/retract/record_violation/record_confirmation/increment_centrality/
//! create_edge/find_by_query/list_condition_ids — the C1 contract (spec §4.1).
//! Grounded on `queries/memory_crud.rs` (row parsing, diff-based version emission)
//! and `queries/causal_ops.rs` (edge upsert-merge).

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use verity_core::edge::{Edge, EdgeType};
use verity_core::errors::StorageError;
use verity_core::memory::{
    DamageLevel, ExposureCheckStatus, Memory, MemoryDraft, MemoryKind, MemoryState, Outcome,
    Violation,
};
use verity_core::notification::Notification;
use verity_core::stats::SystemStats;
use verity_core::traits::{MemoryQuery, MemoryStorage};
use verity_core::version::{ChangeType, EntityType, Version};

use crate::engine::StorageEngine;
use crate::queries::row::{
    damage_level_to_str, exposure_status_to_str, outcome_to_str, row_to_memory, source_to_str,
    state_to_str, to_storage_err, violation_source_to_str,
};

fn edge_type_str(t: EdgeType) -> &'static str {
    t.as_str()
}

fn parse_edge_type(s: &str) -> EdgeType {
    match s {
        "violated_by" => EdgeType::ViolatedBy,
        "confirmed_by" => EdgeType::ConfirmedBy,
        _ => EdgeType::DerivedFrom,
    }
}

fn insert_version(
    conn: &Connection,
    entity_id: &str,
    entity_type: EntityType,
    change_type: ChangeType,
    snapshot: serde_json::Value,
) -> Result<(), StorageError> {
    let entity_type_s = match entity_type {
        EntityType::Memory => "memory",
        EntityType::Edge => "edge",
    };
    let change_type_s = serde_json::to_value(change_type)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "updated".to_string());
    conn.execute(
        "INSERT INTO memory_events (entity_id, entity_type, change_type, snapshot_json, at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            entity_id,
            entity_type_s,
            change_type_s,
            snapshot.to_string(),
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn get_memory_row(conn: &Connection, id: &str) -> Result<Option<Memory>, StorageError> {
    conn.query_row("SELECT * FROM memories WHERE id = ?1", params![id], row_to_memory)
        .optional()
        .map_err(StorageError::from)
}

fn upsert_edge(
    conn: &Connection,
    source_id: &str,
    target_id: &str,
    edge_type: EdgeType,
    strength: f64,
) -> Result<Edge, StorageError> {
    let now = Utc::now();
    let existing: Option<f64> = conn
        .query_row(
            "SELECT strength FROM edges WHERE source_id=?1 AND target_id=?2 AND edge_type=?3",
            params![source_id, target_id, edge_type_str(edge_type)],
            |r| r.get(0),
        )
        .optional()?;

    let new_strength = match existing {
        Some(old) => Edge::clamp_strength(old + strength).max(old).min(1.0),
        None => Edge::clamp_strength(strength),
    };

    conn.execute(
        "INSERT INTO edges (source_id, target_id, edge_type, strength, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT(source_id, target_id, edge_type)
         DO UPDATE SET strength = ?4, updated_at = ?5",
        params![
            source_id,
            target_id,
            edge_type_str(edge_type),
            new_strength,
            now.to_rfc3339(),
        ],
    )?;

    Ok(Edge {
        source_id: source_id.to_string(),
        target_id: target_id.to_string(),
        edge_type,
        strength: new_strength,
        created_at: now,
        updated_at: now,
    })
}

impl MemoryStorage for StorageEngine {
    async fn create_memory(&self, draft: MemoryDraft) -> Result<Memory, StorageError> {
        // Validation per spec §4.1.
        if draft.source.is_none() && draft.derived_from.is_empty() {
            return Err(StorageError::InvalidDraft {
                reason: "neither source nor non-empty derived_from given".to_string(),
            });
        }
        if draft.resolves_by.is_some() && draft.outcome_condition.is_none() {
            return Err(StorageError::InvalidDraft {
                reason: "resolves_by present without outcome_condition".to_string(),
            });
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let kind = if draft.source.is_some() {
            MemoryKind::Observation
        } else if draft.resolves_by.is_some() {
            MemoryKind::Prediction
        } else {
            MemoryKind::Thought
        };
        let starting_confidence = verity_confidence::starting_confidence(
            kind,
            draft.source,
            &self.system_stats().await?,
        );

        let derived_from = draft.derived_from.clone();
        let derived_from_for_check = derived_from.clone();

        let memory = self
            .with_conn(move |conn| {
                for src in &derived_from_for_check {
                    let row: Option<(i64,)> = conn
                        .query_row(
                            "SELECT retracted FROM memories WHERE id = ?1",
                            params![src],
                            |r| Ok((r.get(0)?,)),
                        )
                        .optional()?;
                    match row {
                        None => {
                            return Err(StorageError::DanglingDerivedFrom { id: src.clone() })
                        }
                        Some((retracted,)) if retracted != 0 => {
                            return Err(StorageError::DanglingDerivedFrom { id: src.clone() })
                        }
                        _ => {}
                    }
                }

                conn.execute(
                    "INSERT INTO memories (
                        id, content, tags_json, source, derived_from_json, invalidates_if_json,
                        confirms_if_json, assumes_json, resolves_by, outcome_condition,
                        starting_confidence, confirmations, times_tested, contradictions,
                        centrality, propagated_confidence, state, outcome, retracted,
                        retraction_reason, exposure_check_status, violations_json,
                        created_at, updated_at, resolved_at, retracted_at, session_id
                    ) VALUES (
                        ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, 0, 0, 0, NULL,
                        'active', NULL, 0, NULL, 'pending', '[]', ?12, ?12, NULL, NULL, ?13
                    )",
                    params![
                        id,
                        draft.content,
                        serde_json::to_string(&draft.tags).unwrap(),
                        draft.source.map(source_to_str),
                        serde_json::to_string(&derived_from).unwrap(),
                        serde_json::to_string(&draft.invalidates_if).unwrap(),
                        serde_json::to_string(&draft.confirms_if).unwrap(),
                        serde_json::to_string(&draft.assumes).unwrap(),
                        draft.resolves_by.map(|t| t.timestamp_millis()),
                        draft.outcome_condition,
                        starting_confidence,
                        now.to_rfc3339(),
                        draft.session_id,
                    ],
                )?;

                for parent in &derived_from {
                    conn.execute(
                        "UPDATE memories SET centrality = centrality + 1 WHERE id = ?1",
                        params![parent],
                    )?;
                }

                let memory = get_memory_row(conn, &id)?
                    .ok_or_else(|| StorageError::NotFound { id: id.clone() })?;

                insert_version(
                    conn,
                    &id,
                    EntityType::Memory,
                    ChangeType::Created,
                    serde_json::to_value(&memory).map_err(StorageError::from)?,
                )?;

                Ok(memory)
            })
            .await?;

        Ok(memory)
    }

    async fn get(&self, id: &str) -> Result<Option<Memory>, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| get_memory_row(conn, &id)).await
    }

    async fn retract(&self, id: &str, reason: &str) -> Result<Version, StorageError> {
        let id = id.to_string();
        let reason = reason.to_string();
        self.with_conn(move |conn| {
            let now = Utc::now();
            let updated = conn.execute(
                "UPDATE memories SET retracted = 1, retraction_reason = ?1, retracted_at = ?2, updated_at = ?2
                 WHERE id = ?3 AND retracted = 0",
                params![reason, now.to_rfc3339(), id],
            )?;
            if updated == 0 && get_memory_row(conn, &id)?.is_none() {
                return Err(StorageError::NotFound { id: id.clone() });
            }
            let memory = get_memory_row(conn, &id)?.ok_or_else(|| StorageError::NotFound { id: id.clone() })?;
            let snapshot = serde_json::to_value(&memory).map_err(StorageError::from)?;
            insert_version(conn, &id, EntityType::Memory, ChangeType::Retracted, snapshot.clone())?;
            Ok(Version {
                entity_id: id.clone(),
                entity_type: EntityType::Memory,
                change_type: ChangeType::Retracted,
                snapshot,
                change_reason: Some(reason.clone()),
                session_id: None,
                request_id: None,
                at: now,
            })
        })
        .await
    }

    async fn record_violations_batch(
        &self,
        id: &str,
        new_violations: Vec<Violation>,
    ) -> Result<Memory, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let mut memory = get_memory_row(conn, &id)?.ok_or_else(|| StorageError::NotFound { id: id.clone() })?;

            let existing_ids: std::collections::BTreeSet<String> =
                memory.violations.iter().map(|v| v.obs_id.clone()).collect();
            let fresh: Vec<Violation> = new_violations
                .into_iter()
                .filter(|v| !existing_ids.contains(&v.obs_id))
                .collect();

            if fresh.is_empty() {
                return Ok(memory);
            }

            let now = Utc::now();
            let has_core = fresh.iter().any(|v| v.damage_level == DamageLevel::Core);
            memory.violations.extend(fresh.clone());
            memory.times_tested += fresh.len() as u32;
            memory.contradictions += fresh.len() as u32;

            let (new_state, new_outcome, resolved_at) = if has_core {
                (MemoryState::Resolved, Some(Outcome::Incorrect), Some(now))
            } else {
                (MemoryState::Violated, memory.outcome, memory.resolved_at)
            };
            memory.state = new_state;
            memory.outcome = new_outcome;
            memory.resolved_at = resolved_at;
            memory.updated_at = now;

            conn.execute(
                "UPDATE memories SET violations_json=?1, times_tested=?2, contradictions=?3,
                 state=?4, outcome=?5, resolved_at=?6, updated_at=?7 WHERE id=?8",
                params![
                    serde_json::to_string(&memory.violations).map_err(StorageError::from)?,
                    memory.times_tested,
                    memory.contradictions,
                    state_to_str(memory.state),
                    memory.outcome.map(outcome_to_str),
                    memory.resolved_at.map(|t| t.to_rfc3339()),
                    now.to_rfc3339(),
                    id,
                ],
            )?;

            insert_version(
                conn,
                &id,
                EntityType::Memory,
                ChangeType::ViolationRecorded,
                serde_json::to_value(&memory).map_err(StorageError::from)?,
            )?;

            Ok(memory)
        })
        .await
    }

    async fn record_confirmation(&self, id: &str) -> Result<Memory, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let now = Utc::now();
            conn.execute(
                "UPDATE memories SET confirmations = confirmations + 1, times_tested = times_tested + 1,
                 updated_at = ?1 WHERE id = ?2",
                params![now.to_rfc3339(), id],
            )?;
            let memory = get_memory_row(conn, &id)?.ok_or_else(|| StorageError::NotFound { id: id.clone() })?;
            insert_version(
                conn,
                &id,
                EntityType::Memory,
                ChangeType::ConfirmationRecorded,
                serde_json::to_value(&memory).map_err(StorageError::from)?,
            )?;
            Ok(memory)
        })
        .await
    }

    async fn auto_confirm(&self, id: &str) -> Result<Memory, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let now = Utc::now();
            conn.execute(
                "UPDATE memories SET confirmations = confirmations + 1, times_tested = times_tested + 1,
                 state = 'resolved', outcome = 'correct', resolved_at = ?1, updated_at = ?1 WHERE id = ?2",
                params![now.to_rfc3339(), id],
            )?;
            let memory = get_memory_row(conn, &id)?.ok_or_else(|| StorageError::NotFound { id: id.clone() })?;
            insert_version(
                conn,
                &id,
                EntityType::Memory,
                ChangeType::StateTransition,
                serde_json::to_value(&memory).map_err(StorageError::from)?,
            )?;
            Ok(memory)
        })
        .await
    }

    async fn mark_confirmed(&self, id: &str) -> Result<Memory, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let now = Utc::now();
            conn.execute(
                "UPDATE memories SET state = 'confirmed', updated_at = ?1 WHERE id = ?2",
                params![now.to_rfc3339(), id],
            )?;
            let memory = get_memory_row(conn, &id)?.ok_or_else(|| StorageError::NotFound { id: id.clone() })?;
            insert_version(
                conn,
                &id,
                EntityType::Memory,
                ChangeType::StateTransition,
                serde_json::to_value(&memory).map_err(StorageError::from)?,
            )?;
            Ok(memory)
        })
        .await
    }

    async fn mark_superseded(&self, id: &str) -> Result<Memory, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let now = Utc::now();
            conn.execute(
                "UPDATE memories SET state = 'resolved', outcome = 'superseded', resolved_at = ?1, updated_at = ?1 WHERE id = ?2",
                params![now.to_rfc3339(), id],
            )?;
            let memory = get_memory_row(conn, &id)?.ok_or_else(|| StorageError::NotFound { id: id.clone() })?;
            insert_version(
                conn,
                &id,
                EntityType::Memory,
                ChangeType::StateTransition,
                serde_json::to_value(&memory).map_err(StorageError::from)?,
            )?;
            Ok(memory)
        })
        .await
    }

    async fn increment_centrality(&self, target: &str) -> Result<u32, StorageError> {
        let target = target.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE memories SET centrality = centrality + 1, updated_at = ?1 WHERE id = ?2",
                params![Utc::now().to_rfc3339(), target],
            )?;
            let c: i64 = conn.query_row(
                "SELECT centrality FROM memories WHERE id = ?1",
                params![target],
                |r| r.get(0),
            )?;
            Ok(c as u32)
        })
        .await
    }

    async fn decrement_centrality(&self, target: &str) -> Result<u32, StorageError> {
        let target = target.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE memories SET centrality = MAX(centrality - 1, 0), updated_at = ?1 WHERE id = ?2",
                params![Utc::now().to_rfc3339(), target],
            )?;
            let c: i64 = conn.query_row(
                "SELECT centrality FROM memories WHERE id = ?1",
                params![target],
                |r| r.get(0),
            )?;
            Ok(c as u32)
        })
        .await
    }

    async fn create_edge(
        &self,
        source_id: &str,
        target_id: &str,
        edge_type: EdgeType,
        strength: f64,
    ) -> Result<Edge, StorageError> {
        let source_id = source_id.to_string();
        let target_id = target_id.to_string();
        self.with_conn(move |conn| {
            let edge = upsert_edge(conn, &source_id, &target_id, edge_type, strength)?;
            insert_version(
                conn,
                &format!("{source_id}->{target_id}"),
                EntityType::Edge,
                ChangeType::EdgeCreated,
                serde_json::to_value(&edge).map_err(StorageError::from)?,
            )?;
            Ok(edge)
        })
        .await
    }

    async fn decay_outgoing_support_edges(&self, id: &str, factor: f64) -> Result<usize, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let now = Utc::now().to_rfc3339();
            let n = conn.execute(
                "UPDATE edges SET strength = strength * (1.0 - ?1), updated_at = ?2
                 WHERE source_id = ?3 AND edge_type IN ('derived_from', 'confirmed_by')",
                params![factor, now, id],
            )?;
            Ok(n)
        })
        .await
    }

    async fn boost_outgoing_support_edges(&self, id: &str, factor: f64) -> Result<usize, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let now = Utc::now().to_rfc3339();
            let n = conn.execute(
                "UPDATE edges SET strength = MIN(strength * ?1, 1.0), updated_at = ?2
                 WHERE source_id = ?3 AND edge_type IN ('derived_from', 'confirmed_by')",
                params![factor, now, id],
            )?;
            Ok(n)
        })
        .await
    }

    async fn get_edges(&self, id: &str) -> Result<Vec<Edge>, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT source_id, target_id, edge_type, strength, created_at, updated_at
                 FROM edges WHERE source_id = ?1 OR target_id = ?1",
            )?;
            let rows = stmt.query_map(params![id], |r| {
                Ok(Edge {
                    source_id: r.get(0)?,
                    target_id: r.get(1)?,
                    edge_type: parse_edge_type(&r.get::<_, String>(2)?),
                    strength: r.get(3)?,
                    created_at: r
                        .get::<_, String>(4)
                        .map(|s| chrono::DateTime::parse_from_rfc3339(&s).unwrap().with_timezone(&Utc))
                        .unwrap_or(Utc::now()),
                    updated_at: r
                        .get::<_, String>(5)
                        .map(|s| chrono::DateTime::parse_from_rfc3339(&s).unwrap().with_timezone(&Utc))
                        .unwrap_or(Utc::now()),
                })
            })?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })
        .await
    }

    async fn list_condition_ids(
        &self,
        id: &str,
        inv_cap: usize,
        conf_cap: usize,
    ) -> Result<Vec<String>, StorageError> {
        let mut ids = Vec::with_capacity(inv_cap + conf_cap);
        for i in 0..inv_cap {
            ids.push(format!("{id}:inv:{i}"));
        }
        for i in 0..conf_cap {
            ids.push(format!("{id}:conf:{i}"));
        }
        Ok(ids)
    }

    async fn set_propagated_confidence(&self, id: &str, value: Option<f64>) -> Result<(), StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE memories SET propagated_confidence = ?1, updated_at = ?2 WHERE id = ?3",
                params![value, Utc::now().to_rfc3339(), id],
            )?;
            Ok(())
        })
        .await
    }

    async fn set_exposure_check_status(&self, id: &str, status: ExposureCheckStatus) -> Result<(), StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE memories SET exposure_check_status = ?1, updated_at = ?2 WHERE id = ?3",
                params![exposure_status_to_str(status), Utc::now().to_rfc3339(), id],
            )?;
            Ok(())
        })
        .await
    }

    async fn find_by_query(&self, query: MemoryQuery) -> Result<Vec<Memory>, StorageError> {
        self.with_conn(move |conn| {
            let mut sql = String::from("SELECT * FROM memories WHERE 1=1");
            if !query.include_retracted {
                sql.push_str(" AND retracted = 0");
            }
            if query.observations_only {
                sql.push_str(" AND source IS NOT NULL");
            } else if query.predictions_only {
                sql.push_str(" AND source IS NULL AND resolves_by IS NOT NULL");
            } else if query.thoughts_only {
                sql.push_str(" AND source IS NULL AND resolves_by IS NULL");
            }
            sql.push_str(" ORDER BY created_at DESC");
            if let Some(limit) = query.limit {
                sql.push_str(&format!(" LIMIT {limit}"));
            }
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], row_to_memory)?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })
        .await
    }

    async fn insert_notification(&self, notification: Notification) -> Result<(), StorageError> {
        self.with_conn(move |conn| {
            let kind_s = match notification.kind {
                verity_core::notification::NotificationKind::CoreViolation => "core_violation",
                verity_core::notification::NotificationKind::PeripheralViolation => {
                    "peripheral_violation"
                }
            };
            conn.execute(
                "INSERT INTO notifications (id, kind, memory_id, message, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    notification.id,
                    kind_s,
                    notification.memory_id,
                    notification.message,
                    notification.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn record_access(&self, memory_id: &str, at: chrono::DateTime<chrono::Utc>) -> Result<(), StorageError> {
        let memory_id = memory_id.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO memory_access (memory_id, at) VALUES (?1, ?2)",
                params![memory_id, at.to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }

    async fn system_stats(&self) -> Result<SystemStats, StorageError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key, value FROM system_stats")?;
            let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, f64>(1)?)))?;
            let mut stats = SystemStats::default();
            for r in rows {
                let (k, v) = r?;
                stats.set(k, v);
            }
            Ok(stats)
        })
        .await
    }

    async fn set_system_stats(&self, stats: SystemStats) -> Result<(), StorageError> {
        self.with_conn(move |conn| {
            let tx = conn.unchecked_transaction()?;
            for (k, v) in stats.values.iter() {
                tx.execute(
                    "INSERT INTO system_stats (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = ?2",
                    params![k, v],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

/// Violation builder helper used by C5/C6 callers that construct a [`Violation`]
/// before handing it to `record_violations_batch`.
pub fn make_violation(
    condition: String,
    obs_id: String,
    damage_level: DamageLevel,
    source_type: verity_core::memory::ViolationSource,
    cascade_source_id: Option<String>,
) -> Violation {
    Violation {
        condition,
        timestamp: Utc::now(),
        obs_id,
        damage_level,
        source_type,
        cascade_source_id,
    }
}

#[allow(dead_code)]
fn _silence_unused(d: DamageLevel, s: verity_core::memory::ViolationSource) -> (&'static str, &'static str) {
    (damage_level_to_str(d), violation_source_to_str(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use verity_core::memory::Source;

    async fn fixture() -> StorageEngine {
        StorageEngine::open_in_memory().unwrap()
    }

    #[tokio::test]
    async fn create_observation_requires_no_derived_from() {
        let store = fixture().await;
        let m = store
            .create_memory(MemoryDraft {
                content: "AAPL closed at 205".into(),
                source: Some(Source::Market),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(m.kind(), MemoryKind::Observation);
        assert_eq!(m.state, MemoryState::Active);
    }

    #[tokio::test]
    async fn create_memory_rejects_missing_source_and_derived_from() {
        let store = fixture().await;
        let err = store
            .create_memory(MemoryDraft {
                content: "orphan".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidDraft { .. }));
    }

    #[tokio::test]
    async fn create_memory_rejects_resolves_by_without_outcome_condition() {
        let store = fixture().await;
        let err = store
            .create_memory(MemoryDraft {
                content: "prediction".into(),
                derived_from: vec!["dummy".into()],
                resolves_by: Some(Utc::now()),
                ..Default::default()
            })
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn derived_from_increments_parent_centrality() {
        let store = fixture().await;
        let parent = store
            .create_memory(MemoryDraft {
                content: "root obs".into(),
                source: Some(Source::Human),
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .create_memory(MemoryDraft {
                content: "child thought".into(),
                derived_from: vec![parent.id.clone()],
                ..Default::default()
            })
            .await
            .unwrap();
        let parent = store.get(&parent.id).await.unwrap().unwrap();
        assert_eq!(parent.centrality, 1);
    }

    #[tokio::test]
    async fn record_violations_batch_dedups_and_transitions_state() {
        let store = fixture().await;
        let parent = store
            .create_memory(MemoryDraft {
                content: "root".into(),
                source: Some(Source::Human),
                ..Default::default()
            })
            .await
            .unwrap();
        let m = store
            .create_memory(MemoryDraft {
                content: "child".into(),
                derived_from: vec![parent.id.clone()],
                ..Default::default()
            })
            .await
            .unwrap();

        let v = make_violation(
            "cond".into(),
            "obs-1".into(),
            DamageLevel::Peripheral,
            verity_core::memory::ViolationSource::Direct,
            None,
        );
        let m1 = store
            .record_violations_batch(&m.id, vec![v.clone()])
            .await
            .unwrap();
        assert_eq!(m1.violations.len(), 1);
        assert_eq!(m1.state, MemoryState::Violated);

        let m2 = store.record_violations_batch(&m.id, vec![v]).await.unwrap();
        assert_eq!(m2.violations.len(), 1, "dedup by obs_id");
    }

    #[tokio::test]
    async fn core_violation_resolves_incorrect() {
        let store = fixture().await;
        let parent = store
            .create_memory(MemoryDraft {
                content: "root".into(),
                source: Some(Source::Human),
                ..Default::default()
            })
            .await
            .unwrap();
        let m = store
            .create_memory(MemoryDraft {
                content: "child".into(),
                derived_from: vec![parent.id.clone()],
                ..Default::default()
            })
            .await
            .unwrap();
        let v = make_violation(
            "cond".into(),
            "obs-core".into(),
            DamageLevel::Core,
            verity_core::memory::ViolationSource::Direct,
            None,
        );
        let m1 = store.record_violations_batch(&m.id, vec![v]).await.unwrap();
        assert_eq!(m1.state, MemoryState::Resolved);
        assert_eq!(m1.outcome, Some(Outcome::Incorrect));
        assert!(m1.resolved_at.is_some());
    }

    #[tokio::test]
    async fn edge_upsert_is_idempotent_on_triple_and_clamped() {
        let store = fixture().await;
        store.create_edge("a", "b", EdgeType::DerivedFrom, 0.9).await.unwrap();
        let e = store.create_edge("a", "b", EdgeType::DerivedFrom, 0.9).await.unwrap();
        assert!(e.strength <= 1.0);
    }
}
