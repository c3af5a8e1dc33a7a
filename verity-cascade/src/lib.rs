//! The Cascade Service (C7, spec §4.7): a single-hop graph walk that turns a
//! memory's resolution into review/boost/damage events for its neighbors. Cascade
//! never mutates target memories directly — it only enqueues events for C8/C9 to
//! carry downstream. The periodic-check idiom (detect something crossed a
//! threshold, act, move on) is grounded on the teacher's
//! `monitoring::auto_tuning::maybe_tune` shape, though the logic itself is new.

use uuid::Uuid;

use verity_core::edge::EdgeType;
use verity_core::errors::CascadeError;
use verity_core::event::{Event, EventType};
use verity_core::memory::{MemoryState, Outcome};
use verity_core::traits::{EventQueue, MemoryStorage};

/// One of the three terminal resolution outcomes a cascade can propagate from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeOutcome {
    Correct,
    Incorrect,
    Void,
}

impl CascadeOutcome {
    pub fn as_outcome(self) -> Outcome {
        match self {
            CascadeOutcome::Correct => Outcome::Correct,
            CascadeOutcome::Incorrect => Outcome::Incorrect,
            CascadeOutcome::Void => Outcome::Void,
        }
    }
}

/// Propagate the resolution of `source_id` to its 1-hop neighbors, per spec §4.7's
/// direction/edge/outcome table. Returns the events queued.
pub async fn propagate_resolution<S, Q>(
    store: &S,
    queue: &Q,
    source_id: &str,
    outcome: CascadeOutcome,
    session_id: Option<&str>,
) -> Result<Vec<Event>, CascadeError>
where
    S: MemoryStorage,
    Q: EventQueue,
{
    let edges = store.get_edges(source_id).await.map_err(CascadeError::Storage)?;
    let mut queued = Vec::new();

    for edge in edges {
        if edge.edge_type == EdgeType::ConfirmedBy || edge.edge_type == EdgeType::ViolatedBy {
            // "already handled" — these are written by the exposure checker directly.
            continue;
        }

        let (neighbor_id, direction) = if edge.target_id == source_id && edge.source_id != source_id {
            (edge.source_id.clone(), Direction::Downstream)
        } else if edge.source_id == source_id && edge.target_id != source_id {
            (edge.target_id.clone(), Direction::Upstream)
        } else {
            continue;
        };

        let Some(neighbor) = store.get(&neighbor_id).await.map_err(CascadeError::Storage)? else {
            continue;
        };
        if neighbor.source.is_some() || neighbor.state == MemoryState::Resolved {
            continue;
        }

        let event_type = match (direction, edge.edge_type, outcome) {
            (Direction::Downstream, EdgeType::DerivedFrom, CascadeOutcome::Correct) => {
                EventType::cascade(neighbor.kind().as_str(), "boost")
            }
            (Direction::Downstream, EdgeType::DerivedFrom, CascadeOutcome::Incorrect) => {
                EventType::cascade(neighbor.kind().as_str(), "damage")
            }
            (Direction::Upstream, EdgeType::DerivedFrom, CascadeOutcome::Correct) => EventType::evidence_validated(),
            (Direction::Upstream, EdgeType::DerivedFrom, CascadeOutcome::Incorrect) => {
                EventType::evidence_invalidated()
            }
            _ => EventType::cascade(neighbor.kind().as_str(), "review"),
        };

        let event = Event {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.map(|s| s.to_string()),
            event_type,
            memory_id: neighbor.id.clone(),
            violated_by: Some(source_id.to_string()),
            damage_level: None,
            context: serde_json::json!({
                "source_id": source_id,
                "outcome": format!("{:?}", outcome.as_outcome()).to_lowercase(),
                "direction": match direction { Direction::Downstream => "downstream", Direction::Upstream => "upstream" },
            }),
            created_at: chrono::Utc::now(),
            dispatched: false,
            dispatched_at: None,
            claim_id: None,
        };

        queue.queue(event.clone()).await.map_err(CascadeError::Events)?;
        queued.push(event);
    }

    Ok(queued)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Downstream,
    Upstream,
}

#[cfg(test)]
mod tests {
    use super::*;
    use verity_core::memory::{MemoryDraft, Source};
    use verity_events::StorageEventQueue;
    use verity_storage::StorageEngine;

    #[tokio::test]
    async fn downstream_correct_resolution_boosts() {
        let store = std::sync::Arc::new(StorageEngine::open_in_memory().unwrap());
        let queue = StorageEventQueue::new(store.clone());

        let root = store
            .create_memory(MemoryDraft { content: "root".into(), source: Some(Source::Human), ..Default::default() })
            .await
            .unwrap();
        let child = store
            .create_memory(MemoryDraft {
                content: "child".into(),
                derived_from: vec![root.id.clone()],
                ..Default::default()
            })
            .await
            .unwrap();
        store.create_edge(&child.id, &root.id, EdgeType::DerivedFrom, 0.8).await.unwrap();

        let events = propagate_resolution(store.as_ref(), &queue, &root.id, CascadeOutcome::Correct, None)
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].event_type.as_str().ends_with(":cascade_boost"));
    }

    #[tokio::test]
    async fn upstream_incorrect_resolution_invalidates_assumption() {
        let store = std::sync::Arc::new(StorageEngine::open_in_memory().unwrap());
        let queue = StorageEventQueue::new(store.clone());

        let root = store
            .create_memory(MemoryDraft { content: "root".into(), source: Some(Source::Human), ..Default::default() })
            .await
            .unwrap();
        let child = store
            .create_memory(MemoryDraft {
                content: "child".into(),
                derived_from: vec![root.id.clone()],
                ..Default::default()
            })
            .await
            .unwrap();
        store.create_edge(&child.id, &root.id, EdgeType::DerivedFrom, 0.8).await.unwrap();

        let events = propagate_resolution(store.as_ref(), &queue, &child.id, CascadeOutcome::Incorrect, None)
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type.as_str(), "assumption:evidence_invalidated");
    }

    #[tokio::test]
    async fn confirmed_by_edges_are_skipped() {
        let store = std::sync::Arc::new(StorageEngine::open_in_memory().unwrap());
        let queue = StorageEventQueue::new(store.clone());

        let a = store
            .create_memory(MemoryDraft { content: "a".into(), source: Some(Source::Human), ..Default::default() })
            .await
            .unwrap();
        let b = store
            .create_memory(MemoryDraft { content: "b".into(), derived_from: vec![a.id.clone()], ..Default::default() })
            .await
            .unwrap();
        store.create_edge(&a.id, &b.id, EdgeType::ConfirmedBy, 0.5).await.unwrap();

        let events = propagate_resolution(store.as_ref(), &queue, &a.id, CascadeOutcome::Correct, None)
            .await
            .unwrap();
        assert!(events.is_empty());
    }
}
