//! Domain event dispatch: map commerce change notifications to sync jobs and
//! hand them to the queue of the matching entity kind. Each kind has its own
//! bounded queue and worker, so product, variant, and collection jobs move
//! independently. A job that cannot be enqueued is logged and dropped; the
//! periodic reconciliation sweep restores correctness.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::model::{ChangeEvent, ChangedEntity, EntityKind, OperationType, SyncJob};
use crate::processor::SyncProcessor;

pub struct SyncQueues {
    pub product: mpsc::Sender<SyncJob>,
    pub variant: mpsc::Sender<SyncJob>,
    pub collection: mpsc::Sender<SyncJob>,
}

impl SyncQueues {
    fn sender(&self, kind: EntityKind) -> &mpsc::Sender<SyncJob> {
        match kind {
            EntityKind::Product => &self.product,
            EntityKind::Variant => &self.variant,
            EntityKind::Collection => &self.collection,
        }
    }
}

/// Spawn one worker task per entity kind, each draining its queue through the
/// shared processor. Returns the senders to enqueue onto.
pub fn spawn_workers(processor: Arc<SyncProcessor>, capacity: usize) -> SyncQueues {
    SyncQueues {
        product: spawn_worker(EntityKind::Product, processor.clone(), capacity),
        variant: spawn_worker(EntityKind::Variant, processor.clone(), capacity),
        collection: spawn_worker(EntityKind::Collection, processor, capacity),
    }
}

fn spawn_worker(
    kind: EntityKind,
    processor: Arc<SyncProcessor>,
    capacity: usize,
) -> mpsc::Sender<SyncJob> {
    let (tx, mut rx) = mpsc::channel::<SyncJob>(capacity);
    tokio::spawn(async move {
        // Once dequeued a job always runs to a terminal outcome; outcomes are
        // logged by the processor itself.
        while let Some(job) = rx.recv().await {
            let _ = processor.process(&job).await;
        }
        info!(queue = %kind, "sync queue closed");
    });
    tx
}

pub struct EventDispatcher {
    queues: SyncQueues,
}

impl EventDispatcher {
    pub fn new(queues: SyncQueues) -> Self {
        Self { queues }
    }

    /// Drain a change-notification stream until it closes.
    pub async fn run(&self, mut events: mpsc::Receiver<ChangeEvent>) {
        while let Some(event) = events.recv().await {
            self.dispatch(&event);
        }
        info!("change event stream closed");
    }

    /// Map one notification to job(s). Only the entity id travels; the
    /// processor re-fetches state, so a stale event cannot write stale data.
    pub fn dispatch(&self, event: &ChangeEvent) {
        let operation = event.kind.operation();
        match &event.entity {
            ChangedEntity::Product(id) => self.enqueue(EntityKind::Product, *id, operation),
            ChangedEntity::Variants(ids) => {
                for id in ids {
                    self.enqueue(EntityKind::Variant, *id, operation);
                }
            }
            ChangedEntity::Collection(id) => {
                self.enqueue(EntityKind::Collection, *id, operation)
            }
        }
    }

    fn enqueue(&self, kind: EntityKind, entity_id: i64, operation: OperationType) {
        let job = SyncJob::new(kind, entity_id, operation);
        if let Err(err) = self.queues.sender(kind).try_send(job) {
            warn!(
                %kind,
                entity_id,
                %operation,
                "failed to enqueue sync job, dropping; next sweep reconciles: {err}"
            );
        }
    }
}
