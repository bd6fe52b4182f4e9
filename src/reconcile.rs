//! Full-catalog reconciliation sweep: one job per entity of a kind, bounded
//! retries with capped exponential backoff, serialized processing. Retries
//! re-enter the work list at the tail through a timer task and a channel, so
//! the call stack stays flat however often an entity fails. The event path
//! and this sweep share the same processor pipeline; the sweep exists to
//! repair whatever the event path dropped.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

use crate::catalog::CatalogSource;
use crate::config;
use crate::model::{BulkFailure, BulkOutcome, EntityKind, OperationType, SyncJob};
use crate::processor::SyncProcessor;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            backoff_base: Duration::from_millis(1000),
            backoff_cap: Duration::from_millis(10_000),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &config::Sync) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            backoff_base: Duration::from_millis(cfg.backoff_base_ms),
            backoff_cap: Duration::from_millis(cfg.backoff_cap_ms),
        }
    }

    /// Delay before attempt `attempts + 1`: `min(base * 2^(attempts-1), cap)`.
    pub fn backoff_delay(&self, attempts: u32) -> Duration {
        let shift = attempts.saturating_sub(1).min(16);
        let delay = self.backoff_base.saturating_mul(1 << shift);
        delay.min(self.backoff_cap)
    }
}

#[derive(Debug)]
struct WorkItem {
    entity_id: i64,
    attempts: u32,
}

/// Sweep every entity of `kind` through the processor. Processing is
/// deliberately one-at-a-time; the content client's rate limiter spaces the
/// outbound calls.
#[instrument(skip_all, fields(kind = %kind))]
pub async fn run_full_sync(
    kind: EntityKind,
    processor: &SyncProcessor,
    catalog: &dyn CatalogSource,
    policy: &RetryPolicy,
) -> anyhow::Result<BulkOutcome> {
    let ids = catalog.entity_ids(kind).await?;
    let total = ids.len();
    info!(total, "starting full sync");

    let mut queue: VecDeque<WorkItem> = ids
        .into_iter()
        .map(|entity_id| WorkItem {
            entity_id,
            attempts: 0,
        })
        .collect();
    let (retry_tx, mut retry_rx) = mpsc::unbounded_channel::<WorkItem>();

    let mut pending_retries = 0usize;
    let mut processed = 0usize;
    let mut success_count = 0usize;
    let mut errors: Vec<BulkFailure> = Vec::new();

    loop {
        // Fold retries whose backoff already expired back into the tail.
        while let Ok(item) = retry_rx.try_recv() {
            pending_retries -= 1;
            queue.push_back(item);
        }

        let mut item = match queue.pop_front() {
            Some(item) => item,
            None if pending_retries > 0 => match retry_rx.recv().await {
                Some(item) => {
                    pending_retries -= 1;
                    item
                }
                None => break,
            },
            None => break,
        };
        item.attempts += 1;

        let mut job = SyncJob::new(kind, item.entity_id, OperationType::Update);
        job.retry_count = item.attempts - 1;
        let outcome = processor.process(&job).await;

        processed += 1;
        if processed % 10 == 0 {
            info!(
                processed,
                remaining = queue.len() + pending_retries,
                errors = errors.len(),
                "bulk sync progress"
            );
        }

        if outcome.success {
            success_count += 1;
        } else if outcome.is_retryable() && item.attempts < policy.max_attempts {
            let delay = policy.backoff_delay(item.attempts);
            debug!(
                entity_id = item.entity_id,
                attempts = item.attempts,
                delay_ms = delay.as_millis() as u64,
                "scheduling retry"
            );
            pending_retries += 1;
            let tx = retry_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = tx.send(item);
            });
        } else {
            errors.push(BulkFailure {
                entity_id: item.entity_id,
                error: outcome.message,
                attempts: item.attempts,
            });
        }
    }

    let outcome = BulkOutcome {
        success: errors.is_empty(),
        total,
        success_count,
        error_count: errors.len(),
        errors,
    };
    info!(
        total = outcome.total,
        success_count = outcome.success_count,
        error_count = outcome.error_count,
        "full sync finished"
    );
    Ok(outcome)
}
