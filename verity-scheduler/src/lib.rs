//! Scheduler Hooks (C10, spec §4.10): minute and daily cadence jobs. The minute
//! tick finds inactive sessions and dispatches their claimed batches in parallel;
//! the daily tick recomputes system stats, runs the whole-graph shock pass, and
//! enqueues `thought:pending_resolution` events for newly-overdue predictions.
//! Cadence/claim-dispatch shape grounded on the teacher's worker-pool tick loop.

use std::collections::HashMap;

use verity_core::config::{DispatchConfig, SchedulerConfig, ShockConfig};
use verity_core::errors::SchedulerError;
use verity_core::event::{Event, EventType};
use verity_core::memory::Source;
use verity_core::traits::{EventQueue, MemoryQuery, MemoryStorage, Resolver};

/// Outcome of a single minute tick.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct MinuteTickReport {
    pub sessions_dispatched: usize,
    pub events_dispatched: usize,
}

/// Outcome of a single daily tick.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct DailyTickReport {
    pub sources_scored: usize,
    pub shock_affected: usize,
    pub overdue_predictions_enqueued: usize,
}

/// Find every inactive session and dispatch its claimed batch, one claim per
/// session, all sessions in parallel (spec §4.10 minute cadence).
pub async fn run_minute_tick<Q, R>(queue: &Q, resolver: &R, config: &SchedulerConfig, dispatch_config: &DispatchConfig) -> Result<MinuteTickReport, SchedulerError>
where
    Q: EventQueue,
    R: Resolver,
{
    let sessions = queue.find_inactive_sessions(config.inactivity_ms).await?;
    let futures = sessions.iter().map(|session_id| dispatch_session(queue, resolver, session_id, dispatch_config));
    let results = futures::future::join_all(futures).await;

    let mut report = MinuteTickReport::default();
    for r in results {
        let dispatched = r?;
        report.sessions_dispatched += 1;
        report.events_dispatched += dispatched;
    }
    Ok(report)
}

async fn dispatch_session<Q, R>(queue: &Q, resolver: &R, session_id: &str, dispatch_config: &DispatchConfig) -> Result<usize, SchedulerError>
where
    Q: EventQueue,
    R: Resolver,
{
    let claim_id = uuid::Uuid::new_v4().to_string();
    let events = queue.claim_for_dispatch(session_id, &claim_id).await?;
    if events.is_empty() {
        return Ok(0);
    }
    let dispatched = verity_dispatch::dispatch_claimed_batch(queue, resolver, events, dispatch_config).await?;
    Ok(dispatched)
}

/// Recompute per-source track records and `max_times_tested`/`median_times_tested`,
/// run the whole-graph shock pass, and enqueue overdue-prediction events (spec
/// §4.10 daily cadence).
pub async fn run_daily_tick<S, Q>(store: &S, queue: &Q, shock_config: &ShockConfig) -> Result<DailyTickReport, SchedulerError>
where
    S: MemoryStorage,
    Q: EventQueue,
{
    let mut report = DailyTickReport::default();

    let observations = store
        .find_by_query(MemoryQuery { observations_only: true, thoughts_only: false, predictions_only: false, include_retracted: false, limit: None })
        .await?;

    let mut by_source: HashMap<Source, (u32, u32)> = HashMap::new();
    let mut times_tested_samples: Vec<u32> = Vec::new();
    for obs in &observations {
        times_tested_samples.push(obs.times_tested);
        if let Some(source) = obs.source {
            if obs.times_tested > 0 {
                let entry = by_source.entry(source).or_insert((0, 0));
                entry.0 += obs.confirmations;
                entry.1 += obs.times_tested;
            }
        }
    }

    let mut stats = store.system_stats().await?;
    for (source, (confirmed, tested)) in &by_source {
        if *tested > 0 {
            stats.set_source_track_record(*source, *confirmed as f64 / *tested as f64);
            report.sources_scored += 1;
        }
    }
    if let Some(max) = times_tested_samples.iter().copied().max() {
        stats.set("max_times_tested", max as f64);
    }
    if !times_tested_samples.is_empty() {
        times_tested_samples.sort_unstable();
        let mid = times_tested_samples.len() / 2;
        let median = if times_tested_samples.len() % 2 == 0 {
            (times_tested_samples[mid - 1] + times_tested_samples[mid]) as f64 / 2.0
        } else {
            times_tested_samples[mid] as f64
        };
        stats.set("median_times_tested", median);
    }
    store.set_system_stats(stats).await?;

    let shock_result = verity_shock::propagate_global(store, shock_config).await?;
    report.shock_affected = shock_result.affected_count;

    let overdue = queue.find_overdue_predictions().await?;
    for prediction in &overdue {
        queue
            .queue(Event {
                id: uuid::Uuid::new_v4().to_string(),
                session_id: prediction.session_id.clone(),
                event_type: EventType::pending_resolution(),
                memory_id: prediction.id.clone(),
                violated_by: None,
                damage_level: None,
                context: serde_json::json!({ "resolves_by": prediction.resolves_by }),
                created_at: chrono::Utc::now(),
                dispatched: false,
                dispatched_at: None,
                claim_id: None,
            })
            .await?;
        report.overdue_predictions_enqueued += 1;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use test_fixtures::{observation, storage_fixture};
    use verity_events::StorageEventQueue;

    #[tokio::test]
    async fn daily_tick_on_empty_store_is_a_noop() {
        let store = Arc::new(storage_fixture());
        let queue = StorageEventQueue::new(store.clone());
        let report = run_daily_tick(store.as_ref(), &queue, &ShockConfig::default()).await.unwrap();
        assert_eq!(report.sources_scored, 0);
        assert_eq!(report.shock_affected, 0);
        assert_eq!(report.overdue_predictions_enqueued, 0);
    }

    #[tokio::test]
    async fn daily_tick_scores_sources_with_tested_observations() {
        let store = Arc::new(storage_fixture());
        let queue = StorageEventQueue::new(store.clone());
        let obs = store.create_memory(observation("seed content", Source::Market)).await.unwrap();
        store.record_confirmation(&obs.id).await.unwrap();
        let report = run_daily_tick(store.as_ref(), &queue, &ShockConfig::default()).await.unwrap();
        assert_eq!(report.sources_scored, 1);
    }
}
