//! Backing store for the Event Queue (C8, spec §4.8). These are the raw storage
//! primitives; `verity-events::EventQueue` wraps these with the session-grouping
//! and pending-resolution semantics the spec calls for. Grounded on
//! `queries/event_ops.rs`'s raw-row/insert/batch idiom.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use verity_core::errors::StorageError;
use verity_core::event::{Event, EventType};
use verity_core::memory::{DamageLevel, Memory};
use verity_core::traits::MemoryQuery;

use crate::engine::StorageEngine;

fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<Event> {
    let damage_level: Option<String> = row.get("damage_level")?;
    let context_json: String = row.get("context_json")?;
    Ok(Event {
        id: row.get("id")?,
        session_id: row.get("session_id")?,
        event_type: EventType(row.get("event_type")?),
        memory_id: row.get("memory_id")?,
        violated_by: row.get("violated_by")?,
        damage_level: damage_level.map(|d| match d.as_str() {
            "core" => DamageLevel::Core,
            _ => DamageLevel::Peripheral,
        }),
        context: serde_json::from_str(&context_json).unwrap_or(serde_json::Value::Null),
        created_at: row
            .get::<_, String>("created_at")
            .map(|s| chrono::DateTime::parse_from_rfc3339(&s).unwrap().with_timezone(&Utc))
            .unwrap_or(Utc::now()),
        dispatched: row.get::<_, i64>("dispatched")? != 0,
        dispatched_at: row
            .get::<_, Option<String>>("dispatched_at")?
            .map(|s| chrono::DateTime::parse_from_rfc3339(&s).unwrap().with_timezone(&Utc)),
        claim_id: row.get("claim_id")?,
    })
}

impl StorageEngine {
    pub async fn queue_event(&self, event: Event) -> Result<(), StorageError> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO events (id, session_id, event_type, memory_id, violated_by,
                 damage_level, context_json, created_at, dispatched, dispatched_at, claim_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, NULL, NULL)",
                params![
                    event.id,
                    event.session_id,
                    event.event_type.as_str(),
                    event.memory_id,
                    event.violated_by,
                    event.damage_level.map(|d| match d {
                        DamageLevel::Core => "core",
                        DamageLevel::Peripheral => "peripheral",
                    }),
                    event.context.to_string(),
                    event.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Sessions whose newest undispatched event is older than `inactivity_ms`.
    pub async fn find_inactive_session_ids(&self, inactivity_ms: i64) -> Result<Vec<String>, StorageError> {
        self.with_conn(move |conn| {
            let cutoff = Utc::now() - chrono::Duration::milliseconds(inactivity_ms);
            let mut stmt = conn.prepare(
                "SELECT session_id FROM events
                 WHERE dispatched = 0 AND session_id IS NOT NULL
                 GROUP BY session_id
                 HAVING MAX(created_at) < ?1",
            )?;
            let rows = stmt.query_map(params![cutoff.to_rfc3339()], |r| r.get::<_, String>(0))?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })
        .await
    }

    pub async fn claim_for_dispatch(&self, session_id: &str, claim_id: &str) -> Result<Vec<Event>, StorageError> {
        let session_id = session_id.to_string();
        let claim_id = claim_id.to_string();
        self.with_conn(move |conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "UPDATE events SET dispatched = 1, dispatched_at = ?1, claim_id = ?2
                 WHERE session_id = ?3 AND dispatched = 0",
                params![now, claim_id, session_id],
            )?;
            let mut stmt = conn.prepare(
                "SELECT * FROM events WHERE session_id = ?1 AND claim_id = ?2 ORDER BY created_at ASC",
            )?;
            let rows = stmt.query_map(params![session_id, claim_id], row_to_event)?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })
        .await
    }

    pub async fn release_claimed(&self, event_ids: &[String]) -> Result<(), StorageError> {
        let ids = event_ids.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.unchecked_transaction()?;
            for id in &ids {
                tx.execute(
                    "UPDATE events SET dispatched = 0, dispatched_at = NULL, claim_id = NULL WHERE id = ?1",
                    params![id],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Time-bound memories overdue for resolution with no pending resolution event
    /// outstanding (spec §4.8).
    pub async fn find_overdue_predictions(&self) -> Result<Vec<Memory>, StorageError> {
        let memories = self
            .find_by_query(MemoryQuery {
                predictions_only: true,
                ..Default::default()
            })
            .await?;
        let now = Utc::now();
        let mut out = Vec::new();
        for m in memories {
            if m.state != verity_core::memory::MemoryState::Active {
                continue;
            }
            let Some(deadline) = m.resolves_by else { continue };
            if deadline >= now {
                continue;
            }
            if self.has_pending_resolution(&m.id).await? {
                continue;
            }
            out.push(m);
        }
        Ok(out)
    }

    pub async fn has_pending_resolution(&self, memory_id: &str) -> Result<bool, StorageError> {
        let memory_id = memory_id.to_string();
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM events WHERE memory_id = ?1 AND event_type = ?2 AND dispatched = 0",
                params![memory_id, EventType::PENDING_RESOLUTION],
                |r| r.get(0),
            )?;
            Ok(count > 0)
        })
        .await
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn claim_then_release_restores_undispatched() {
        let store = StorageEngine::open_in_memory().unwrap();
        let ev = Event {
            id: "e1".into(),
            session_id: Some("s1".into()),
            event_type: EventType::violation(),
            memory_id: "m1".into(),
            violated_by: None,
            damage_level: None,
            context: json!({}),
            created_at: Utc::now(),
            dispatched: false,
            dispatched_at: None,
            claim_id: None,
        };
        store.queue_event(ev).await.unwrap();
        let claimed = store.claim_for_dispatch("s1", "claim-1").await.unwrap();
        assert_eq!(claimed.len(), 1);
        store
            .release_claimed(&claimed.iter().map(|e| e.id.clone()).collect::<Vec<_>>())
            .await
            .unwrap();
        let reclaimed = store.claim_for_dispatch("s1", "claim-2").await.unwrap();
        assert_eq!(reclaimed.len(), 1);
        assert_eq!(reclaimed[0].claim_id.as_deref(), Some("claim-2"));
    }
}
