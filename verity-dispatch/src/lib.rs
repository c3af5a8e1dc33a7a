//! The Dispatcher (C9, spec §4.9): batch-shapes a claimed session's events into
//! payloads and dispatches them in parallel to the configured resolver backend,
//! retrying transient failures and releasing the claim on terminal failure.
//! Transport/retry shape grounded on the teacher's `cortex_cloud` push client.

use std::time::Duration;

use serde_json::json;

use verity_core::config::{DispatchConfig, ResolverType};
use verity_core::errors::DispatchError;
use verity_core::event::Event;
use verity_core::traits::{EventQueue, Resolver};

/// One payload built from a batch of related events (violations + confirmations +
/// cascades share one payload; each overdue prediction gets its own).
#[derive(Debug, Clone, serde::Serialize)]
pub struct DispatchPayload {
    pub batch_id: String,
    pub kind: &'static str,
    pub event_ids: Vec<String>,
    pub body: serde_json::Value,
}

fn parse_context(raw: &serde_json::Value) -> serde_json::Value {
    if raw.is_object() {
        raw.clone()
    } else {
        tracing::warn!(?raw, "malformed event context; defaulting to {{}}");
        json!({})
    }
}

/// Partition a claimed batch into payloads, per spec §4.9 step 2/3.
pub fn build_payloads(events: &[Event]) -> Vec<DispatchPayload> {
    let mut related: Vec<&Event> = Vec::new();
    let mut overdue: Vec<&Event> = Vec::new();

    for e in events {
        if e.event_type.is_pending_resolution() {
            overdue.push(e);
        } else {
            related.push(e);
        }
    }

    let mut payloads = Vec::new();
    if !related.is_empty() {
        let batch_id = uuid::Uuid::new_v4().to_string();
        let items: Vec<serde_json::Value> = related
            .iter()
            .map(|e| {
                json!({
                    "event_id": e.id,
                    "event_type": e.event_type.as_str(),
                    "memory_id": e.memory_id,
                    "violated_by": e.violated_by,
                    "damage_level": e.damage_level,
                    "context": parse_context(&e.context),
                })
            })
            .collect();
        payloads.push(DispatchPayload {
            batch_id: batch_id.clone(),
            kind: "related",
            event_ids: related.iter().map(|e| e.id.clone()).collect(),
            body: json!({ "batch_id": batch_id, "items": items }),
        });
    }

    for e in overdue {
        let batch_id = uuid::Uuid::new_v4().to_string();
        payloads.push(DispatchPayload {
            batch_id: batch_id.clone(),
            kind: "overdue_prediction",
            event_ids: vec![e.id.clone()],
            body: json!({
                "batch_id": batch_id,
                "memory_id": e.memory_id,
                "context": parse_context(&e.context),
            }),
        });
    }

    payloads
}

/// Dispatch a single session's claimed batch: partition, dispatch all payloads in
/// parallel, retry transient errors, release the claim on final failure.
pub async fn dispatch_claimed_batch<Q, R>(queue: &Q, resolver: &R, events: Vec<Event>, config: &DispatchConfig) -> Result<usize, DispatchError>
where
    Q: EventQueue,
    R: Resolver,
{
    let payloads = build_payloads(&events);
    let mut dispatched = 0usize;
    let futures = payloads.into_iter().map(|payload| dispatch_one(queue, resolver, payload, config));
    let results = futures::future::join_all(futures).await;
    for r in results {
        if r? {
            dispatched += 1;
        }
    }
    Ok(dispatched)
}

async fn dispatch_one<Q, R>(queue: &Q, resolver: &R, payload: DispatchPayload, config: &DispatchConfig) -> Result<bool, DispatchError>
where
    Q: EventQueue,
    R: Resolver,
{
    let body = json!({ "kind": payload.kind, "payload": payload.body });
    let mut last_err = None;
    for attempt in 0..=config.max_retries {
        match resolver.dispatch(&body).await {
            Ok(()) => return Ok(true),
            Err(e) => {
                last_err = Some(e);
                if attempt < config.max_retries {
                    tokio::time::sleep(Duration::from_millis(config.retry_base_ms * 2u64.pow(attempt))).await;
                }
            }
        }
    }
    queue.release_claimed(&payload.event_ids).await?;
    Err(last_err.expect("loop runs at least once"))
}

/// `none` resolver backend: logs and no-ops (spec §4.9/§6.5).
pub struct NoneResolver;

impl Resolver for NoneResolver {
    async fn dispatch(&self, payload: &serde_json::Value) -> Result<(), DispatchError> {
        tracing::info!(%payload, "resolver=none: dropping payload");
        Ok(())
    }
}

/// `webhook` resolver backend: a single POST-JSON.
pub struct WebhookResolver {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl WebhookResolver {
    pub fn new(url: String, token: Option<String>) -> Self {
        Self { http: reqwest::Client::new(), url, token }
    }
}

impl Resolver for WebhookResolver {
    async fn dispatch(&self, payload: &serde_json::Value) -> Result<(), DispatchError> {
        let mut req = self.http.post(&self.url).json(payload);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.map_err(|e| DispatchError::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(DispatchError::WebhookStatus { status: resp.status().as_u16() });
        }
        Ok(())
    }
}

/// `issue_tracker` resolver backend: one issue per payload.
pub struct IssueTrackerResolver {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl IssueTrackerResolver {
    pub fn new(url: String, token: Option<String>) -> Self {
        Self { http: reqwest::Client::new(), url, token }
    }
}

impl Resolver for IssueTrackerResolver {
    async fn dispatch(&self, payload: &serde_json::Value) -> Result<(), DispatchError> {
        let mut req = self.http.post(&self.url).json(&json!({ "issue": payload }));
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.map_err(|e| DispatchError::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(DispatchError::IssueTracker(format!("status {}", resp.status())));
        }
        Ok(())
    }
}

/// Build the configured resolver backend, per spec §6.5. Returns a trait object
/// is not possible (`Resolver` uses `async_fn_in_trait`); callers instead match
/// on `ResolverType` directly when wiring a concrete engine (see `verity::Engine`).
pub fn resolver_type_from_config(config: &DispatchConfig) -> ResolverType {
    config.resolver_type
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use verity_core::event::EventType;

    fn event(event_type: EventType) -> Event {
        Event {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: Some("s1".to_string()),
            event_type,
            memory_id: "m1".to_string(),
            violated_by: None,
            damage_level: None,
            context: json!({}),
            created_at: Utc::now(),
            dispatched: true,
            dispatched_at: Some(Utc::now()),
            claim_id: Some("c1".to_string()),
        }
    }

    #[test]
    fn related_events_share_one_payload() {
        let events = vec![event(EventType::violation()), event(EventType::prediction_confirmed())];
        let payloads = build_payloads(&events);
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].event_ids.len(), 2);
    }

    #[test]
    fn overdue_predictions_each_get_their_own_payload() {
        let events = vec![event(EventType::pending_resolution()), event(EventType::pending_resolution())];
        let payloads = build_payloads(&events);
        assert_eq!(payloads.len(), 2);
        assert!(payloads.iter().all(|p| p.kind == "overdue_prediction"));
    }

    #[test]
    fn malformed_context_defaults_to_empty_object() {
        let parsed = parse_context(&serde_json::Value::String("not an object".to_string()));
        assert_eq!(parsed, json!({}));
    }
}
