//! The Event Queue (C8, spec §4.8): session-batched events with a claim/release
//! pattern for crash-safe dispatch. A thin `EventQueue` trait implementation over
//! `verity-storage`'s `events` table primitives.

use verity_core::errors::EventsError;
use verity_core::event::Event;
use verity_core::memory::Memory;
use verity_core::traits::EventQueue;
use verity_storage::StorageEngine;

pub struct StorageEventQueue {
    storage: std::sync::Arc<StorageEngine>,
}

impl StorageEventQueue {
    pub fn new(storage: std::sync::Arc<StorageEngine>) -> Self {
        Self { storage }
    }
}

impl EventQueue for StorageEventQueue {
    async fn queue(&self, event: Event) -> Result<(), EventsError> {
        self.storage.queue_event(event).await.map_err(EventsError::Storage)
    }

    async fn find_inactive_sessions(&self, inactivity_ms: i64) -> Result<Vec<String>, EventsError> {
        self.storage
            .find_inactive_session_ids(inactivity_ms)
            .await
            .map_err(EventsError::Storage)
    }

    async fn claim_for_dispatch(&self, session_id: &str, claim_id: &str) -> Result<Vec<Event>, EventsError> {
        self.storage
            .claim_for_dispatch(session_id, claim_id)
            .await
            .map_err(EventsError::Storage)
    }

    async fn release_claimed(&self, event_ids: &[String]) -> Result<(), EventsError> {
        self.storage.release_claimed(event_ids).await.map_err(EventsError::Storage)
    }

    async fn find_overdue_predictions(&self) -> Result<Vec<Memory>, EventsError> {
        self.storage.find_overdue_predictions().await.map_err(EventsError::Storage)
    }

    async fn has_pending_resolution(&self, memory_id: &str) -> Result<bool, EventsError> {
        self.storage
            .has_pending_resolution(memory_id)
            .await
            .map_err(EventsError::Storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use verity_core::event::EventType;

    #[tokio::test]
    async fn queue_then_claim_then_release_roundtrips() {
        let storage = std::sync::Arc::new(StorageEngine::open_in_memory().unwrap());
        let queue = StorageEventQueue::new(storage);

        let ev = Event {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: Some("session-1".to_string()),
            event_type: EventType::violation(),
            memory_id: "m1".to_string(),
            violated_by: None,
            damage_level: None,
            context: json!({}),
            created_at: Utc::now(),
            dispatched: false,
            dispatched_at: None,
            claim_id: None,
        };
        queue.queue(ev.clone()).await.unwrap();

        let claimed = queue.claim_for_dispatch("session-1", "claim-a").await.unwrap();
        assert_eq!(claimed.len(), 1);

        queue
            .release_claimed(&claimed.iter().map(|e| e.id.clone()).collect::<Vec<_>>())
            .await
            .unwrap();

        let reclaimed = queue.claim_for_dispatch("session-1", "claim-b").await.unwrap();
        assert_eq!(reclaimed.len(), 1);
    }

    #[tokio::test]
    async fn has_pending_resolution_reflects_undispatched_events() {
        let storage = std::sync::Arc::new(StorageEngine::open_in_memory().unwrap());
        let queue = StorageEventQueue::new(storage);

        assert!(!queue.has_pending_resolution("m1").await.unwrap());

        let ev = Event {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: None,
            event_type: EventType::pending_resolution(),
            memory_id: "m1".to_string(),
            violated_by: None,
            damage_level: None,
            context: json!({}),
            created_at: Utc::now(),
            dispatched: false,
            dispatched_at: None,
            claim_id: None,
        };
        queue.queue(ev).await.unwrap();

        assert!(queue.has_pending_resolution("m1").await.unwrap());
    }
}
