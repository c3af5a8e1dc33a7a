//! The Exposure Intake Queue (C11, spec §4.11): a bounded async work queue that
//! feeds the Exposure Checker (C5) on memory creation. `verity::Engine` enqueues a
//! job here only after embedding and index upserts have completed (spec §5
//! ordering guarantee); a background consumer drains the queue, running *both*
//! exposure-checker entry points for every job and merging their outcomes, per
//! spec §4.11.
//!
//! Bounded-queue idiom: a `tokio::sync::mpsc` channel sized from
//! [`IntakeConfig::queue_capacity`], with `try_send` surfacing backpressure as
//! [`IntakeError::QueueFull`] rather than blocking the caller — mirrors the
//! dashmap-backed session/job maps used for concurrent in-flight tracking
//! elsewhere in this workspace (`verity-index`'s `DashMap`-backed logical
//! indexes).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use verity_core::config::IntakeConfig;
use verity_core::errors::IntakeError;
use verity_core::memory::ExposureCheckStatus;
use verity_core::traits::{EmbeddingProvider, EventQueue, Judge, MemoryStorage, VectorIndex};
use verity_exposure::ExposureChecker;

/// A unit of work for C11, per spec §4.11's job shape. Produced by `verity::Engine`
/// immediately after a memory's embedding and index upserts land.
#[derive(Debug, Clone)]
pub struct IntakeJob {
    pub memory_id: String,
    pub is_observation: bool,
    pub content: String,
    pub embedding: Vec<f32>,
    pub invalidates_if: Vec<String>,
    pub confirms_if: Vec<String>,
    pub time_bound: bool,
    pub session_id: Option<String>,
    pub request_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Number of prior attempts; zero on first delivery.
    pub attempt: u32,
}

/// Outcome of a single job run, merging both exposure-checker entry points
/// (spec §4.11 "both are run for all memories ... merged and deduplicated").
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct IntakeOutcome {
    pub violations_recorded: usize,
    pub confirmations_recorded: usize,
    pub auto_confirmed: bool,
}

/// Producer handle: bounded, non-blocking enqueue. Cloneable — every creation
/// request shares one queue.
#[derive(Clone)]
pub struct IntakeQueue {
    sender: mpsc::Sender<IntakeJob>,
    capacity: usize,
}

impl IntakeQueue {
    /// Create the channel pair. The receiver is handed to [`run_consumer`].
    pub fn new(config: &IntakeConfig) -> (Self, mpsc::Receiver<IntakeJob>) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        (Self { sender, capacity: config.queue_capacity.max(1) }, receiver)
    }

    /// Enqueue a job without blocking the caller. Full queue is a transient
    /// condition surfaced to the caller rather than silently dropped (spec §4.11,
    /// §7 "exposure job failure in C11").
    pub fn enqueue(&self, job: IntakeJob) -> Result<(), IntakeError> {
        self.sender.try_send(job).map_err(|_| IntakeError::QueueFull { capacity: self.capacity })
    }
}

/// Drain `receiver`, running every job to completion (with retries) before
/// pulling the next. Per spec §5's cooperative-concurrency model this is one
/// logical consumer task; callers that want more throughput can spawn several
/// consumers sharing the same receiver via a `tokio::sync::Mutex`-wrapped
/// receiver, but a single consumer keeps per-memory ordering simple and is the
/// default wiring in `verity::Engine`.
pub async fn run_consumer<S, I, J, Q>(
    mut receiver: mpsc::Receiver<IntakeJob>,
    storage: Arc<S>,
    checker: Arc<ExposureChecker<S, I, J, Q>>,
    config: IntakeConfig,
) where
    S: MemoryStorage,
    I: VectorIndex,
    J: EmbeddingProvider + Judge,
    Q: EventQueue,
{
    while let Some(job) = receiver.recv().await {
        run_job_with_retries(storage.as_ref(), checker.as_ref(), job, &config).await;
    }
}

/// Run one job, retrying transient exposure-checker failures up to
/// `config.max_retries` times with exponential backoff. Terminal failure leaves
/// `exposure_check_status` at whatever the last attempt set it to (`processing`),
/// visible to an operator via an insights query (spec §4.11, §7).
async fn run_job_with_retries<S, I, J, Q>(storage: &S, checker: &ExposureChecker<S, I, J, Q>, mut job: IntakeJob, config: &IntakeConfig)
where
    S: MemoryStorage,
    I: VectorIndex,
    J: EmbeddingProvider + Judge,
    Q: EventQueue,
{
    loop {
        if let Err(e) = storage.set_exposure_check_status(&job.memory_id, ExposureCheckStatus::Processing).await {
            tracing::error!(memory_id = %job.memory_id, error = %e, "failed to mark exposure check as processing");
            return;
        }

        match process_once(checker, &job).await {
            Ok(outcome) => {
                tracing::debug!(memory_id = %job.memory_id, ?outcome, "exposure intake job completed");
                if let Err(e) = storage.set_exposure_check_status(&job.memory_id, ExposureCheckStatus::Completed).await {
                    tracing::error!(memory_id = %job.memory_id, error = %e, "failed to mark exposure check as completed");
                }
                return;
            }
            Err(e) => {
                job.attempt += 1;
                if job.attempt > config.max_retries {
                    tracing::error!(
                        memory_id = %job.memory_id,
                        attempts = job.attempt,
                        error = %e,
                        "exposure intake job exhausted retries; left pending for operator review",
                    );
                    return;
                }
                tracing::warn!(memory_id = %job.memory_id, attempt = job.attempt, error = %e, "exposure intake job failed, retrying");
                let backoff = Duration::from_millis(100u64.saturating_mul(1u64 << job.attempt.min(10)));
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

/// Run both exposure-checker entry points once for `job`, per spec §4.11: the
/// observation entry matches this memory's own content/embedding against other
/// memories' conditions; the thought entry matches this memory's own conditions
/// (if any — observations may carry `invalidates_if`/`confirms_if` too, per spec
/// §6.1) against other memories' content. Both run unconditionally and their
/// outcomes are merged.
async fn process_once<S, I, J, Q>(checker: &ExposureChecker<S, I, J, Q>, job: &IntakeJob) -> Result<IntakeOutcome, IntakeError>
where
    S: MemoryStorage,
    I: VectorIndex,
    J: EmbeddingProvider + Judge,
    Q: EventQueue,
{
    let observation_outcome = checker
        .check_exposures(&job.memory_id, &job.content, &job.embedding, job.session_id.as_deref())
        .await?;

    let thought_outcome = checker
        .check_exposures_for_new_thought(&job.memory_id, &job.invalidates_if, &job.confirms_if, job.time_bound, job.session_id.as_deref())
        .await?;

    Ok(IntakeOutcome {
        violations_recorded: observation_outcome.violations_recorded + thought_outcome.violations_recorded,
        confirmations_recorded: observation_outcome.confirmations_recorded + thought_outcome.confirmations_recorded,
        auto_confirmed: observation_outcome.auto_confirmed || thought_outcome.auto_confirmed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use verity_core::config::{ExposureConfig, ShockConfig};
    use verity_core::memory::{MemoryDraft, Source};
    use verity_embedding::{EmbeddingClient, HttpClientConfig};
    use verity_events::StorageEventQueue;
    use verity_index::InProcessVectorIndex;
    use verity_storage::StorageEngine;

    fn checker() -> (Arc<StorageEngine>, Arc<ExposureChecker<StorageEngine, InProcessVectorIndex, EmbeddingClient, StorageEventQueue>>) {
        let storage = Arc::new(StorageEngine::open_in_memory().unwrap());
        let index = Arc::new(InProcessVectorIndex::new());
        let judge = Arc::new(EmbeddingClient::new(HttpClientConfig::default()));
        let queue = Arc::new(StorageEventQueue::new(storage.clone()));
        let checker = Arc::new(ExposureChecker::new(storage.clone(), index, judge, queue, ExposureConfig::default(), ShockConfig::default()));
        (storage, checker)
    }

    #[test]
    fn enqueue_respects_bounded_capacity() {
        let config = IntakeConfig { max_retries: 3, queue_capacity: 1 };
        let (queue, _receiver) = IntakeQueue::new(&config);
        let job = IntakeJob {
            memory_id: "m1".into(),
            is_observation: true,
            content: "x".into(),
            embedding: vec![0.0; 8],
            invalidates_if: vec![],
            confirms_if: vec![],
            time_bound: false,
            session_id: None,
            request_id: None,
            timestamp: Utc::now(),
            attempt: 0,
        };
        queue.enqueue(job.clone()).unwrap();
        let err = queue.enqueue(job).unwrap_err();
        assert!(matches!(err, IntakeError::QueueFull { capacity: 1 }));
    }

    #[tokio::test]
    async fn run_job_with_retries_marks_completed_on_success() {
        let (storage, checker) = checker();
        let obs = storage
            .create_memory(MemoryDraft { content: "root".into(), source: Some(Source::Human), ..Default::default() })
            .await
            .unwrap();

        let job = IntakeJob {
            memory_id: obs.id.clone(),
            is_observation: true,
            content: obs.content.clone(),
            embedding: vec![0.0; 8],
            invalidates_if: vec![],
            confirms_if: vec![],
            time_bound: false,
            session_id: None,
            request_id: None,
            timestamp: Utc::now(),
            attempt: 0,
        };
        let config = IntakeConfig::default();
        run_job_with_retries(storage.as_ref(), checker.as_ref(), job, &config).await;

        let reloaded = storage.get(&obs.id).await.unwrap().unwrap();
        assert_eq!(reloaded.exposure_check_status, ExposureCheckStatus::Completed);
    }

    #[tokio::test]
    async fn run_consumer_drains_queued_jobs() {
        let (storage, checker) = checker();
        let obs = storage
            .create_memory(MemoryDraft { content: "root".into(), source: Some(Source::Human), ..Default::default() })
            .await
            .unwrap();

        let config = IntakeConfig::default();
        let (queue, receiver) = IntakeQueue::new(&config);
        queue
            .enqueue(IntakeJob {
                memory_id: obs.id.clone(),
                is_observation: true,
                content: obs.content.clone(),
                embedding: vec![0.0; 8],
                invalidates_if: vec![],
                confirms_if: vec![],
                time_bound: false,
                session_id: None,
                request_id: None,
                timestamp: Utc::now(),
                attempt: 0,
            })
            .unwrap();
        drop(queue);

        run_consumer(receiver, storage.clone(), checker, config).await;

        let reloaded = storage.get(&obs.id).await.unwrap().unwrap();
        assert_eq!(reloaded.exposure_check_status, ExposureCheckStatus::Completed);
    }
}
